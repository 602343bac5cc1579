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
pub struct CourseContent {
    id: Uuid,
    course_id: Uuid,
    title: String,
    content_type: ContentType,
    content_url: Option<String>,
    content_data: Option<String>,
    duration_minutes: Option<i32>,
    order_index: i32,
    is_free: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate, utoipa::ToSchema)]
pub struct CourseContentCreate {
    #[serde(skip)]
    course_id: Uuid,
    #[validate(length(min = 1, max = 200, message = "title must be 1-200 characters"))]
    pub title: String,
    pub content_type: ContentType,
    #[validate(url(message = "content url must be a valid url"))]
    pub content_url: Option<String>,
    pub content_data: Option<String>,
    #[validate(range(min = 0))]
    pub duration_minutes: Option<i32>,
    pub order_index: Option<i32>,
    #[serde(default)]
    pub is_free: bool,
}

impl CourseContentCreate {
    pub fn in_course(mut self, course_id: Uuid) -> Self {
        self.course_id = course_id;
        self
    }
}

impl ResourceTyped for CourseContent {
    fn get_resource_type() -> ResourceType {
        ResourceType::CourseContent
    }
}

impl CourseContent {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn course_id(&self) -> Uuid {
        self.course_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn content_type(&self) -> ContentType {
        self.content_type
    }

    pub fn order_index(&self) -> i32 {
        self.order_index
    }

    pub async fn list_by_course(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        course_id: Uuid,
    ) -> DatabaseResult<Vec<Self>> {
        let result = sqlx::query_as(
            "SELECT * FROM course_contents WHERE course_id = $1 ORDER BY order_index, created_at",
        )
        .bind(course_id)
        .fetch_all(mm.executor())
        .await?;
        Ok(result)
    }
}

#[async_trait]
impl CrudRepository<CourseContent, CourseContentCreate, Uuid> for CourseContent {
    async fn create(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        data: CourseContentCreate,
    ) -> DatabaseResult<Self> {
        // without an explicit index the item goes after the last one
        let result = sqlx::query_as(
            r#"
            INSERT INTO course_contents (
                id, course_id, title, content_type, content_url, content_data,
                duration_minutes, order_index, is_free
            )
            VALUES (
                $1, $2, $3, $4, $5, $6, $7,
                COALESCE($8, (SELECT COALESCE(MAX(order_index) + 1, 0) FROM course_contents WHERE course_id = $2)),
                $9
            )
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(data.course_id)
        .bind(&data.title)
        .bind(data.content_type)
        .bind(&data.content_url)
        .bind(&data.content_data)
        .bind(data.duration_minutes)
        .bind(data.order_index)
        .bind(data.is_free)
        .fetch_one(mm.executor())
        .await?;
        Ok(result)
    }

    async fn update(
        self,
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        data: CourseContentCreate,
    ) -> DatabaseResult<Self> {
        let result = sqlx::query_as(
            r#"
            UPDATE course_contents SET
                title = $1, content_type = $2, content_url = $3, content_data = $4,
                duration_minutes = $5, order_index = COALESCE($6, order_index), is_free = $7,
                updated_at = now()
            WHERE id = $8
            RETURNING *
            "#,
        )
        .bind(&data.title)
        .bind(data.content_type)
        .bind(&data.content_url)
        .bind(&data.content_data)
        .bind(data.duration_minutes)
        .bind(data.order_index)
        .bind(data.is_free)
        .bind(self.id)
        .fetch_one(mm.executor())
        .await?;
        Ok(result)
    }

    async fn delete(self, mm: &ModelManager, _actor: &AuthenticatedUser) -> DatabaseResult<()> {
        sqlx::query("DELETE FROM course_contents WHERE id = $1")
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
        let result = sqlx::query_as("SELECT * FROM course_contents WHERE id = $1")
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
            "SELECT * FROM course_contents ORDER BY course_id, order_index LIMIT $1 OFFSET $2",
        )
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(mm.executor())
        .await?;
        Ok(result)
    }

    async fn count(mm: &ModelManager, _actor: &AuthenticatedUser) -> DatabaseResult<i64> {
        let result: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM course_contents")
            .fetch_one(mm.executor())
            .await?;
        Ok(result)
    }
}

#[async_trait]
impl HasOwner for CourseContent {
    async fn get_owner_id(
        &self,
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
    ) -> DatabaseResult<Uuid> {
        owner_of(
            mm,
            "SELECT instructor_id FROM courses WHERE id = $1",
            self.course_id,
            ResourceType::Course,
        )
        .await
    }
}
