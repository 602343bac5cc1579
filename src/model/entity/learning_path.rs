use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, prelude::FromRow};
use uuid::Uuid;
use validator::Validate;

use crate::impl_paginatable_for;
use crate::model::access::HasOwner;
use crate::model::entity::Course;
use crate::model::repo::{Page, PageRequest, ResourceType, ResourceTyped};
use crate::model::{
    DatabaseError, ModelManager, calc, error::{DatabaseResult, is_unique_violation},
    repo::CrudRepository,
};
use crate::web::AuthenticatedUser;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct LearningPath {
    id: Uuid,
    created_by: Uuid,
    title: String,
    description: Option<String>,
    difficulty_level: Option<String>,
    estimated_hours: Option<i32>,
    tags: Vec<String>,
    is_published: bool,
    enrollment_count: i32,
    completion_count: i32,
    version: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate, utoipa::ToSchema)]
pub struct LearningPathCreate {
    #[validate(length(min = 1, max = 200, message = "title must be 1-200 characters"))]
    pub title: String,
    pub description: Option<String>,
    #[validate(length(max = 50))]
    pub difficulty_level: Option<String>,
    #[validate(range(min = 0))]
    pub estimated_hours: Option<i32>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A user's progress through a learning path.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct LearningPathEnrollment {
    id: Uuid,
    user_id: Uuid,
    path_id: Uuid,
    progress_percentage: f64,
    enrolled_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    version: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ResourceTyped for LearningPath {
    fn get_resource_type() -> ResourceType {
        ResourceType::LearningPath
    }
}

impl ResourceTyped for LearningPathEnrollment {
    fn get_resource_type() -> ResourceType {
        ResourceType::LearningPathEnrollment
    }
}

impl LearningPath {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn created_by(&self) -> Uuid {
        self.created_by
    }

    pub fn is_published(&self) -> bool {
        self.is_published
    }

    pub fn enrollment_count(&self) -> i32 {
        self.enrollment_count
    }

    pub fn completion_count(&self) -> i32 {
        self.completion_count
    }

    pub fn completion_rate(&self) -> f64 {
        calc::completion_rate(self.completion_count, self.enrollment_count)
    }

    /// Forgets one enrollment; counters never drop below zero.
    pub fn release_enrollment(&mut self, was_completed: bool) {
        self.enrollment_count = (self.enrollment_count - 1).max(0);
        if was_completed {
            self.completion_count = (self.completion_count - 1).max(0);
        }
    }

    async fn find_in(conn: &mut PgConnection, id: Uuid) -> DatabaseResult<Self> {
        let result: Option<Self> = sqlx::query_as("SELECT * FROM learning_paths WHERE id = $1")
            .bind(id)
            .fetch_optional(conn)
            .await?;
        result.ok_or(DatabaseError::NotFound(ResourceType::LearningPath))
    }

    async fn save_counters(self, conn: &mut PgConnection) -> DatabaseResult<Self> {
        let result: Option<Self> = sqlx::query_as(
            r#"
            UPDATE learning_paths SET
                enrollment_count = $1, completion_count = $2,
                version = version + 1, updated_at = now()
            WHERE id = $3 AND version = $4
            RETURNING *
            "#,
        )
        .bind(self.enrollment_count)
        .bind(self.completion_count)
        .bind(self.id)
        .bind(self.version)
        .fetch_optional(conn)
        .await?;

        result.ok_or(DatabaseError::StaleVersion(ResourceType::LearningPath))
    }
}

#[async_trait]
impl CrudRepository<LearningPath, LearningPathCreate, Uuid> for LearningPath {
    async fn create(
        mm: &ModelManager,
        actor: &AuthenticatedUser,
        data: LearningPathCreate,
    ) -> DatabaseResult<Self> {
        let result = sqlx::query_as(
            r#"
            INSERT INTO learning_paths (id, created_by, title, description, difficulty_level, estimated_hours, tags)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(actor.user_id())
        .bind(&data.title)
        .bind(&data.description)
        .bind(&data.difficulty_level)
        .bind(data.estimated_hours)
        .bind(&data.tags)
        .fetch_one(mm.executor())
        .await?;
        Ok(result)
    }

    async fn update(
        self,
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        data: LearningPathCreate,
    ) -> DatabaseResult<Self> {
        let result: Option<Self> = sqlx::query_as(
            r#"
            UPDATE learning_paths SET
                title = $1, description = $2, difficulty_level = $3, estimated_hours = $4, tags = $5,
                version = version + 1, updated_at = now()
            WHERE id = $6 AND version = $7
            RETURNING *
            "#,
        )
        .bind(&data.title)
        .bind(&data.description)
        .bind(&data.difficulty_level)
        .bind(data.estimated_hours)
        .bind(&data.tags)
        .bind(self.id)
        .bind(self.version)
        .fetch_optional(mm.executor())
        .await?;

        result.ok_or(DatabaseError::StaleVersion(ResourceType::LearningPath))
    }

    async fn delete(self, mm: &ModelManager, _actor: &AuthenticatedUser) -> DatabaseResult<()> {
        sqlx::query("DELETE FROM learning_paths WHERE id = $1")
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
        let result = sqlx::query_as("SELECT * FROM learning_paths WHERE id = $1")
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
            "SELECT * FROM learning_paths ORDER BY created_at DESC LIMIT $1 OFFSET $2",
        )
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(mm.executor())
        .await?;
        Ok(result)
    }

    async fn count(mm: &ModelManager, _actor: &AuthenticatedUser) -> DatabaseResult<i64> {
        let result: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM learning_paths")
            .fetch_one(mm.executor())
            .await?;
        Ok(result)
    }
}

impl_paginatable_for!(LearningPath, LearningPathCreate, Uuid);

#[async_trait]
impl HasOwner for LearningPath {
    async fn get_owner_id(
        &self,
        _mm: &ModelManager,
        _actor: &AuthenticatedUser,
    ) -> DatabaseResult<Uuid> {
        Ok(self.created_by)
    }
}

impl LearningPath {
    pub async fn page_published(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        page: PageRequest,
    ) -> DatabaseResult<Page<Self>> {
        let items = sqlx::query_as(
            "SELECT * FROM learning_paths WHERE is_published ORDER BY created_at DESC LIMIT $1 OFFSET $2",
        )
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(mm.executor())
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM learning_paths WHERE is_published")
            .fetch_one(mm.executor())
            .await?;

        Ok(Page::new(items, total, page))
    }

    /// Published paths whose title, description or tags match `query`.
    pub async fn search(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        query: &str,
        page: PageRequest,
    ) -> DatabaseResult<Page<Self>> {
        let pattern = format!("%{}%", query.trim());
        let filter = r#"is_published AND (
            title ILIKE $1 OR description ILIKE $1
            OR EXISTS (SELECT 1 FROM unnest(tags) t WHERE t ILIKE $1)
        )"#;

        let items = sqlx::query_as(&format!(
            "SELECT * FROM learning_paths WHERE {filter} ORDER BY title LIMIT $2 OFFSET $3"
        ))
        .bind(&pattern)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(mm.executor())
        .await?;

        let total: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM learning_paths WHERE {filter}"))
                .bind(&pattern)
                .fetch_one(mm.executor())
                .await?;

        Ok(Page::new(items, total, page))
    }

    pub async fn set_published(
        self,
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        published: bool,
    ) -> DatabaseResult<Self> {
        let result: Option<Self> = sqlx::query_as(
            r#"
            UPDATE learning_paths SET is_published = $1, version = version + 1, updated_at = now()
            WHERE id = $2 AND version = $3
            RETURNING *
            "#,
        )
        .bind(published)
        .bind(self.id)
        .bind(self.version)
        .fetch_optional(mm.executor())
        .await?;

        result.ok_or(DatabaseError::StaleVersion(ResourceType::LearningPath))
    }

    pub async fn courses(&self, mm: &ModelManager) -> DatabaseResult<Vec<Course>> {
        let result = sqlx::query_as(
            r#"
            SELECT c.* FROM courses c
            JOIN learning_path_courses lpc ON lpc.course_id = c.id
            WHERE lpc.path_id = $1
            ORDER BY lpc.position
            "#,
        )
        .bind(self.id)
        .fetch_all(mm.executor())
        .await?;
        Ok(result)
    }

    /// Appends `course_id` after the last course of the path.
    pub async fn add_course(&self, mm: &ModelManager, course_id: Uuid) -> DatabaseResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO learning_path_courses (path_id, course_id, position)
            VALUES ($1, $2, (SELECT COALESCE(MAX(position) + 1, 0) FROM learning_path_courses WHERE path_id = $1))
            "#,
        )
        .bind(self.id)
        .bind(course_id)
        .execute(mm.executor())
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => {
                Err(DatabaseError::conflict("course is already part of this path"))
            }
            Err(sqlx::Error::Database(db)) if db.is_foreign_key_violation() => {
                Err(DatabaseError::NotFound(ResourceType::Course))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn remove_course(&self, mm: &ModelManager, course_id: Uuid) -> DatabaseResult<()> {
        let result =
            sqlx::query("DELETE FROM learning_path_courses WHERE path_id = $1 AND course_id = $2")
                .bind(self.id)
                .bind(course_id)
                .execute(mm.executor())
                .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(ResourceType::Course));
        }
        Ok(())
    }
}

impl LearningPathEnrollment {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn path_id(&self) -> Uuid {
        self.path_id
    }

    pub fn progress_percentage(&self) -> f64 {
        self.progress_percentage
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Returns `true` when this call completed the path.
    pub fn apply_progress(&mut self, percentage: f64, now: DateTime<Utc>) -> bool {
        if self.completed_at.is_some() {
            return false;
        }

        self.progress_percentage = calc::clamp_percentage(percentage);
        if self.progress_percentage >= 100.0 {
            self.completed_at = Some(now);
            return true;
        }
        false
    }

    async fn save(self, conn: &mut PgConnection) -> DatabaseResult<Self> {
        let result: Option<Self> = sqlx::query_as(
            r#"
            UPDATE learning_path_enrollments SET
                progress_percentage = $1, completed_at = $2,
                version = version + 1, updated_at = now()
            WHERE id = $3 AND version = $4
            RETURNING *
            "#,
        )
        .bind(self.progress_percentage)
        .bind(self.completed_at)
        .bind(self.id)
        .bind(self.version)
        .fetch_optional(conn)
        .await?;

        result.ok_or(DatabaseError::StaleVersion(ResourceType::LearningPathEnrollment))
    }

    /// Takes every enrollment of `user_id` off its path's counters.
    pub(crate) async fn release_for_user_in(
        conn: &mut PgConnection,
        user_id: Uuid,
    ) -> DatabaseResult<()> {
        let enrollments: Vec<Self> =
            sqlx::query_as("SELECT * FROM learning_path_enrollments WHERE user_id = $1")
                .bind(user_id)
                .fetch_all(&mut *conn)
                .await?;

        for enrollment in enrollments {
            let mut path = LearningPath::find_in(conn, enrollment.path_id).await?;
            path.release_enrollment(enrollment.completed_at.is_some());
            path.save_counters(conn).await?;
        }
        Ok(())
    }

    #[tracing::instrument(skip(mm, actor), fields(user = %actor.user_id()))]
    pub async fn enroll(
        mm: &ModelManager,
        actor: &AuthenticatedUser,
        path_id: Uuid,
    ) -> DatabaseResult<Self> {
        let mut tx = mm.begin().await?;

        let mut path = LearningPath::find_in(&mut tx, path_id).await?;
        if !path.is_published {
            return Err(DatabaseError::invalid_state("learning path is not published"));
        }

        let enrollment: Self = sqlx::query_as(
            "INSERT INTO learning_path_enrollments (id, user_id, path_id) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(actor.user_id())
        .bind(path_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| DatabaseError::unique_or(e, "already enrolled in this learning path"))?;

        path.enrollment_count += 1;
        path.save_counters(&mut tx).await?;

        tx.commit().await?;
        Ok(enrollment)
    }

    #[tracing::instrument(skip(mm, actor), fields(user = %actor.user_id()))]
    pub async fn record_progress(
        mm: &ModelManager,
        actor: &AuthenticatedUser,
        path_id: Uuid,
        percentage: f64,
    ) -> DatabaseResult<Self> {
        let mut tx = mm.begin().await?;

        let found: Option<Self> = sqlx::query_as(
            "SELECT * FROM learning_path_enrollments WHERE user_id = $1 AND path_id = $2",
        )
        .bind(actor.user_id())
        .bind(path_id)
        .fetch_optional(&mut *tx)
        .await?;
        let mut enrollment =
            found.ok_or(DatabaseError::NotFound(ResourceType::LearningPathEnrollment))?;

        let completed_now = enrollment.apply_progress(percentage, Utc::now());
        let enrollment = enrollment.save(&mut tx).await?;

        if completed_now {
            let mut path = LearningPath::find_in(&mut tx, path_id).await?;
            path.completion_count += 1;
            path.save_counters(&mut tx).await?;
        }

        tx.commit().await?;
        Ok(enrollment)
    }
}

#[async_trait]
impl HasOwner for LearningPathEnrollment {
    async fn get_owner_id(
        &self,
        _mm: &ModelManager,
        _actor: &AuthenticatedUser,
    ) -> DatabaseResult<Uuid> {
        Ok(self.user_id)
    }
}
