use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::model::access::HasOwner;
use crate::model::repo::{PageRequest, ResourceType, ResourceTyped};
use crate::model::{ModelManager, error::DatabaseResult, owner_of, repo::CrudRepository};
use crate::web::AuthenticatedUser;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct LearningSection {
    id: Uuid,
    module_id: Uuid,
    title: String,
    description: Option<String>,
    order_index: i32,
    estimated_time_minutes: Option<i32>,
    is_required: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate, utoipa::ToSchema)]
pub struct LearningSectionCreate {
    #[serde(skip)]
    module_id: Uuid,
    #[validate(length(min = 1, max = 200, message = "title must be 1-200 characters"))]
    pub title: String,
    pub description: Option<String>,
    pub order_index: Option<i32>,
    #[validate(range(min = 0))]
    pub estimated_time_minutes: Option<i32>,
    #[serde(default = "default_required")]
    pub is_required: bool,
}

fn default_required() -> bool {
    true
}

impl LearningSectionCreate {
    pub fn in_module(mut self, module_id: Uuid) -> Self {
        self.module_id = module_id;
        self
    }
}

impl ResourceTyped for LearningSection {
    fn get_resource_type() -> ResourceType {
        ResourceType::LearningSection
    }
}

impl LearningSection {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn module_id(&self) -> Uuid {
        self.module_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub async fn list_by_module(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        module_id: Uuid,
    ) -> DatabaseResult<Vec<Self>> {
        let result = sqlx::query_as(
            "SELECT * FROM learning_sections WHERE module_id = $1 ORDER BY order_index, created_at",
        )
        .bind(module_id)
        .fetch_all(mm.executor())
        .await?;
        Ok(result)
    }
}

#[async_trait]
impl CrudRepository<LearningSection, LearningSectionCreate, Uuid> for LearningSection {
    async fn create(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        data: LearningSectionCreate,
    ) -> DatabaseResult<Self> {
        let result = sqlx::query_as(
            r#"
            INSERT INTO learning_sections (id, module_id, title, description, order_index, estimated_time_minutes, is_required)
            VALUES (
                $1, $2, $3, $4,
                COALESCE($5, (SELECT COALESCE(MAX(order_index) + 1, 0) FROM learning_sections WHERE module_id = $2)),
                $6, $7
            )
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(data.module_id)
        .bind(&data.title)
        .bind(&data.description)
        .bind(data.order_index)
        .bind(data.estimated_time_minutes)
        .bind(data.is_required)
        .fetch_one(mm.executor())
        .await?;
        Ok(result)
    }

    async fn update(
        self,
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        data: LearningSectionCreate,
    ) -> DatabaseResult<Self> {
        let result = sqlx::query_as(
            r#"
            UPDATE learning_sections SET
                title = $1, description = $2, order_index = COALESCE($3, order_index),
                estimated_time_minutes = $4, is_required = $5, updated_at = now()
            WHERE id = $6
            RETURNING *
            "#,
        )
        .bind(&data.title)
        .bind(&data.description)
        .bind(data.order_index)
        .bind(data.estimated_time_minutes)
        .bind(data.is_required)
        .bind(self.id)
        .fetch_one(mm.executor())
        .await?;
        Ok(result)
    }

    async fn delete(self, mm: &ModelManager, _actor: &AuthenticatedUser) -> DatabaseResult<()> {
        sqlx::query("DELETE FROM learning_sections WHERE id = $1")
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
        let result = sqlx::query_as("SELECT * FROM learning_sections WHERE id = $1")
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
            "SELECT * FROM learning_sections ORDER BY module_id, order_index LIMIT $1 OFFSET $2",
        )
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(mm.executor())
        .await?;
        Ok(result)
    }

    async fn count(mm: &ModelManager, _actor: &AuthenticatedUser) -> DatabaseResult<i64> {
        let result: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM learning_sections")
            .fetch_one(mm.executor())
            .await?;
        Ok(result)
    }
}

#[async_trait]
impl HasOwner for LearningSection {
    async fn get_owner_id(
        &self,
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
    ) -> DatabaseResult<Uuid> {
        owner_of(
            mm,
            "SELECT created_by FROM learning_modules WHERE id = $1",
            self.module_id,
            ResourceType::LearningModule,
        )
        .await
    }
}
