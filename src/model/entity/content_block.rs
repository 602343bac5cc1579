use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::model::access::HasOwner;
use crate::model::repo::{PageRequest, ResourceType, ResourceTyped};
use crate::model::{ContentType, ModelManager, error::DatabaseResult, owner_of, repo::CrudRepository};
use crate::web::AuthenticatedUser;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct ContentBlock {
    id: Uuid,
    section_id: Uuid,
    content_type: ContentType,
    content: Option<String>,
    content_url: Option<String>,
    order_index: i32,
    estimated_time_minutes: Option<i32>,
    difficulty_level: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate, utoipa::ToSchema)]
pub struct ContentBlockCreate {
    #[serde(skip)]
    section_id: Uuid,
    pub content_type: ContentType,
    pub content: Option<String>,
    #[validate(url(message = "content url must be a valid url"))]
    pub content_url: Option<String>,
    pub order_index: Option<i32>,
    #[validate(range(min = 0))]
    pub estimated_time_minutes: Option<i32>,
    #[validate(length(max = 50))]
    pub difficulty_level: Option<String>,
}

impl ContentBlockCreate {
    pub fn in_section(mut self, section_id: Uuid) -> Self {
        self.section_id = section_id;
        self
    }
}

impl ResourceTyped for ContentBlock {
    fn get_resource_type() -> ResourceType {
        ResourceType::ContentBlock
    }
}

impl ContentBlock {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn section_id(&self) -> Uuid {
        self.section_id
    }

    pub async fn list_by_section(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        section_id: Uuid,
    ) -> DatabaseResult<Vec<Self>> {
        let result = sqlx::query_as(
            "SELECT * FROM content_blocks WHERE section_id = $1 ORDER BY order_index, created_at",
        )
        .bind(section_id)
        .fetch_all(mm.executor())
        .await?;
        Ok(result)
    }
}

#[async_trait]
impl CrudRepository<ContentBlock, ContentBlockCreate, Uuid> for ContentBlock {
    async fn create(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        data: ContentBlockCreate,
    ) -> DatabaseResult<Self> {
        let result = sqlx::query_as(
            r#"
            INSERT INTO content_blocks (id, section_id, content_type, content, content_url, order_index, estimated_time_minutes, difficulty_level)
            VALUES (
                $1, $2, $3, $4, $5,
                COALESCE($6, (SELECT COALESCE(MAX(order_index) + 1, 0) FROM content_blocks WHERE section_id = $2)),
                $7, $8
            )
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(data.section_id)
        .bind(data.content_type)
        .bind(&data.content)
        .bind(&data.content_url)
        .bind(data.order_index)
        .bind(data.estimated_time_minutes)
        .bind(&data.difficulty_level)
        .fetch_one(mm.executor())
        .await?;
        Ok(result)
    }

    async fn update(
        self,
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        data: ContentBlockCreate,
    ) -> DatabaseResult<Self> {
        let result = sqlx::query_as(
            r#"
            UPDATE content_blocks SET
                content_type = $1, content = $2, content_url = $3, order_index = COALESCE($4, order_index),
                estimated_time_minutes = $5, difficulty_level = $6, updated_at = now()
            WHERE id = $7
            RETURNING *
            "#,
        )
        .bind(data.content_type)
        .bind(&data.content)
        .bind(&data.content_url)
        .bind(data.order_index)
        .bind(data.estimated_time_minutes)
        .bind(&data.difficulty_level)
        .bind(self.id)
        .fetch_one(mm.executor())
        .await?;
        Ok(result)
    }

    async fn delete(self, mm: &ModelManager, _actor: &AuthenticatedUser) -> DatabaseResult<()> {
        sqlx::query("DELETE FROM content_blocks WHERE id = $1")
            .bind(self.id)
            .execute(mm.executor())
            .await?;
        Ok(())
    }

    async fn find_by_id(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        id: Uuid,
    ) -> DatabaseResult<Option<Self>> {
        let result = sqlx::query_as("SELECT * FROM content_blocks WHERE id = $1")
            .bind(id)
            .fetch_optional(mm.executor())
            .await?;
        Ok(result)
    }

    async fn list(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        page: PageRequest,
    ) -> DatabaseResult<Vec<Self>> {
        let result = sqlx::query_as(
            "SELECT * FROM content_blocks ORDER BY section_id, order_index LIMIT $1 OFFSET $2",
        )
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(mm.executor())
        .await?;
        Ok(result)
    }

    async fn count(mm: &ModelManager, _actor: &AuthenticatedUser) -> DatabaseResult<i64> {
        let result: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM content_blocks")
            .fetch_one(mm.executor())
            .await?;
        Ok(result)
    }
}

#[async_trait]
impl HasOwner for ContentBlock {
    async fn get_owner_id(
        &self,
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
    ) -> DatabaseResult<Uuid> {
        owner_of(
            mm,
            r#"
            SELECT m.created_by FROM learning_modules m
            JOIN learning_sections s ON s.module_id = m.id
            WHERE s.id = $1
            "#,
            self.section_id,
            ResourceType::LearningSection,
        )
        .await
    }
}
