use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, prelude::FromRow};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::model::access::HasOwner;
use crate::model::repo::{PageRequest, ResourceType, ResourceTyped};
use crate::model::{
    DatabaseError, ModelManager, error::DatabaseResult, owner_of, repo::CrudRepository,
};
use crate::web::AuthenticatedUser;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct Assessment {
    id: Uuid,
    course_id: Uuid,
    content_id: Option<Uuid>,
    title: String,
    description: Option<String>,
    time_limit_minutes: Option<i32>,
    max_attempts: Option<i32>,
    passing_score: Option<f64>,
    is_active: bool,
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
    instructions: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate, utoipa::ToSchema)]
#[validate(schema(function = "validate_assessment_window"))]
pub struct AssessmentCreate {
    #[serde(skip)]
    course_id: Uuid,
    pub content_id: Option<Uuid>,
    #[validate(length(min = 1, max = 200, message = "title must be 1-200 characters"))]
    pub title: String,
    pub description: Option<String>,
    #[validate(range(min = 1, message = "time limit must be at least one minute"))]
    pub time_limit_minutes: Option<i32>,
    #[validate(range(min = 1, message = "at least one attempt must be allowed"))]
    pub max_attempts: Option<i32>,
    #[validate(range(min = 0.0, max = 100.0, message = "passing score is a percentage"))]
    pub passing_score: Option<f64>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub instructions: Option<String>,
}

fn default_active() -> bool {
    true
}

fn validate_assessment_window(data: &AssessmentCreate) -> Result<(), ValidationError> {
    match (data.start_date, data.end_date) {
        (Some(start), Some(end)) if end < start => Err(ValidationError::new("end_date")
            .with_message("assessment closes before it opens".into())),
        _ => Ok(()),
    }
}

impl AssessmentCreate {
    pub fn in_course(mut self, course_id: Uuid) -> Self {
        self.course_id = course_id;
        self
    }
}

impl ResourceTyped for Assessment {
    fn get_resource_type() -> ResourceType {
        ResourceType::Assessment
    }
}

impl Assessment {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn course_id(&self) -> Uuid {
        self.course_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn max_attempts(&self) -> Option<i32> {
        self.max_attempts
    }

    pub fn passing_score(&self) -> Option<f64> {
        self.passing_score
    }

    /// Active flag set and `now` inside the optional window.
    pub fn is_currently_active(&self, now: DateTime<Utc>) -> bool {
        self.is_active
            && self.start_date.is_none_or(|start| now >= start)
            && self.end_date.is_none_or(|end| now <= end)
    }

    pub(crate) async fn find_in(conn: &mut PgConnection, id: Uuid) -> DatabaseResult<Self> {
        let result: Option<Self> = sqlx::query_as("SELECT * FROM assessments WHERE id = $1")
            .bind(id)
            .fetch_optional(conn)
            .await?;
        result.ok_or(DatabaseError::NotFound(ResourceType::Assessment))
    }

    pub(crate) async fn instructor_in(conn: &mut PgConnection, id: Uuid) -> DatabaseResult<Uuid> {
        let owner: Option<Uuid> = sqlx::query_scalar(
            "SELECT c.instructor_id FROM courses c JOIN assessments a ON a.course_id = c.id WHERE a.id = $1",
        )
        .bind(id)
        .fetch_optional(conn)
        .await?;
        owner.ok_or(DatabaseError::NotFound(ResourceType::Assessment))
    }

    pub async fn list_by_course(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        course_id: Uuid,
    ) -> DatabaseResult<Vec<Self>> {
        let result =
            sqlx::query_as("SELECT * FROM assessments WHERE course_id = $1 ORDER BY created_at")
                .bind(course_id)
                .fetch_all(mm.executor())
                .await?;
        Ok(result)
    }
}

#[async_trait]
impl CrudRepository<Assessment, AssessmentCreate, Uuid> for Assessment {
    async fn create(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        data: AssessmentCreate,
    ) -> DatabaseResult<Self> {
        let result = sqlx::query_as(
            r#"
            INSERT INTO assessments (
                id, course_id, content_id, title, description, time_limit_minutes, max_attempts,
                passing_score, is_active, start_date, end_date, instructions
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(data.course_id)
        .bind(data.content_id)
        .bind(&data.title)
        .bind(&data.description)
        .bind(data.time_limit_minutes)
        .bind(data.max_attempts)
        .bind(data.passing_score)
        .bind(data.is_active)
        .bind(data.start_date)
        .bind(data.end_date)
        .bind(&data.instructions)
        .fetch_one(mm.executor())
        .await?;
        Ok(result)
    }

    async fn update(
        self,
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        data: AssessmentCreate,
    ) -> DatabaseResult<Self> {
        let result = sqlx::query_as(
            r#"
            UPDATE assessments SET
                content_id = $1, title = $2, description = $3, time_limit_minutes = $4,
                max_attempts = $5, passing_score = $6, is_active = $7, start_date = $8,
                end_date = $9, instructions = $10, updated_at = now()
            WHERE id = $11
            RETURNING *
            "#,
        )
        .bind(data.content_id)
        .bind(&data.title)
        .bind(&data.description)
        .bind(data.time_limit_minutes)
        .bind(data.max_attempts)
        .bind(data.passing_score)
        .bind(data.is_active)
        .bind(data.start_date)
        .bind(data.end_date)
        .bind(&data.instructions)
        .bind(self.id)
        .fetch_one(mm.executor())
        .await?;
        Ok(result)
    }

    async fn delete(self, mm: &ModelManager, _actor: &AuthenticatedUser) -> DatabaseResult<()> {
        sqlx::query("DELETE FROM assessments WHERE id = $1")
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
        let result = sqlx::query_as("SELECT * FROM assessments WHERE id = $1")
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
        let result =
            sqlx::query_as("SELECT * FROM assessments ORDER BY created_at DESC LIMIT $1 OFFSET $2")
                .bind(page.limit())
                .bind(page.offset())
                .fetch_all(mm.executor())
                .await?;
        Ok(result)
    }

    async fn count(mm: &ModelManager, _actor: &AuthenticatedUser) -> DatabaseResult<i64> {
        let result: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM assessments")
            .fetch_one(mm.executor())
            .await?;
        Ok(result)
    }
}

#[async_trait]
impl HasOwner for Assessment {
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

#[cfg(test)]
pub(crate) mod test {
    use chrono::Duration;

    use super::*;

    pub(crate) fn assessment(passing_score: Option<f64>) -> Assessment {
        let now = Utc::now();
        Assessment {
            id: Uuid::new_v4(),
            course_id: Uuid::new_v4(),
            content_id: None,
            title: String::from("Quiz"),
            description: None,
            time_limit_minutes: None,
            max_attempts: None,
            passing_score,
            is_active: true,
            start_date: None,
            end_date: None,
            instructions: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn open_window_is_active() {
        let now = Utc::now();
        assert!(assessment(None).is_currently_active(now));

        let mut closed = assessment(None);
        closed.is_active = false;
        assert!(!closed.is_currently_active(now));
    }

    #[test]
    fn window_bounds_activity() {
        let now = Utc::now();
        let mut a = assessment(None);
        a.start_date = Some(now + Duration::hours(1));
        assert!(!a.is_currently_active(now));

        a.start_date = Some(now - Duration::hours(2));
        a.end_date = Some(now - Duration::hours(1));
        assert!(!a.is_currently_active(now));

        a.end_date = Some(now + Duration::hours(1));
        assert!(a.is_currently_active(now));
    }
}
