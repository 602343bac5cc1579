use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, prelude::FromRow};
use uuid::Uuid;

use crate::model::access::HasOwner;
use crate::model::entity::{Course, UserEntity};
use crate::model::repo::{Page, PageRequest, ResourceType, ResourceTyped};
use crate::model::{
    CourseStatus, DatabaseError, EnrollmentStatus, ModelManager, calc, error::DatabaseResult,
};
use crate::web::AuthenticatedUser;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct Enrollment {
    id: Uuid,
    student_id: Uuid,
    course_id: Uuid,
    status: EnrollmentStatus,
    enrolled_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    progress_percentage: f64,
    last_accessed: Option<DateTime<Utc>>,
    certificate_url: Option<String>,
    version: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct EnrollmentStatistics {
    pub total_enrollments: i64,
    pub active_enrollments: i64,
    pub completed_enrollments: i64,
    pub dropped_enrollments: i64,
}

impl ResourceTyped for Enrollment {
    fn get_resource_type() -> ResourceType {
        ResourceType::Enrollment
    }
}

impl Enrollment {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn student_id(&self) -> Uuid {
        self.student_id
    }

    pub fn course_id(&self) -> Uuid {
        self.course_id
    }

    pub fn status(&self) -> EnrollmentStatus {
        self.status
    }

    pub fn progress_percentage(&self) -> f64 {
        self.progress_percentage
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn last_accessed(&self) -> Option<DateTime<Utc>> {
        self.last_accessed
    }

    /// Completion is recorded once, later calls keep the first timestamp.
    pub fn mark_completed(&mut self, now: DateTime<Utc>) {
        self.status = EnrollmentStatus::Completed;
        self.progress_percentage = 100.0;
        self.completed_at.get_or_insert(now);
    }

    pub fn apply_progress(&mut self, percentage: f64, now: DateTime<Utc>) -> DatabaseResult<()> {
        match self.status {
            EnrollmentStatus::Active => {}
            EnrollmentStatus::Completed => {
                self.last_accessed = Some(now);
                return Ok(());
            }
            EnrollmentStatus::Dropped | EnrollmentStatus::Suspended => {
                return Err(DatabaseError::invalid_state("enrollment is not active"));
            }
        }

        self.progress_percentage = calc::clamp_percentage(percentage);
        self.last_accessed = Some(now);

        if self.progress_percentage >= 100.0 {
            self.mark_completed(now);
        }
        Ok(())
    }

    pub fn transition_to(&mut self, next: EnrollmentStatus, now: DateTime<Utc>) -> DatabaseResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(DatabaseError::invalid_state(format!(
                "enrollment cannot move from {:?} to {:?}",
                self.status, next
            )));
        }

        match next {
            EnrollmentStatus::Completed => self.mark_completed(now),
            _ => self.status = next,
        }
        Ok(())
    }

    async fn insert(
        conn: &mut PgConnection,
        student_id: Uuid,
        course_id: Uuid,
    ) -> DatabaseResult<Self> {
        sqlx::query_as(
            "INSERT INTO enrollments (id, student_id, course_id) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(student_id)
        .bind(course_id)
        .fetch_one(conn)
        .await
        .map_err(|e| DatabaseError::unique_or(e, "already enrolled in this course"))
    }

    async fn find_in(conn: &mut PgConnection, id: Uuid) -> DatabaseResult<Self> {
        let result: Option<Self> = sqlx::query_as("SELECT * FROM enrollments WHERE id = $1")
            .bind(id)
            .fetch_optional(conn)
            .await?;
        result.ok_or(DatabaseError::NotFound(ResourceType::Enrollment))
    }

    pub(crate) async fn find_for_in(
        conn: &mut PgConnection,
        student_id: Uuid,
        course_id: Uuid,
    ) -> DatabaseResult<Option<Self>> {
        let result =
            sqlx::query_as("SELECT * FROM enrollments WHERE student_id = $1 AND course_id = $2")
                .bind(student_id)
                .bind(course_id)
                .fetch_optional(conn)
                .await?;
        Ok(result)
    }

    async fn save(self, conn: &mut PgConnection) -> DatabaseResult<Self> {
        let result: Option<Self> = sqlx::query_as(
            r#"
            UPDATE enrollments SET
                status = $1, completed_at = $2, progress_percentage = $3, last_accessed = $4,
                version = version + 1, updated_at = now()
            WHERE id = $5 AND version = $6
            RETURNING *
            "#,
        )
        .bind(self.status)
        .bind(self.completed_at)
        .bind(self.progress_percentage)
        .bind(self.last_accessed)
        .bind(self.id)
        .bind(self.version)
        .fetch_optional(conn)
        .await?;

        result.ok_or(DatabaseError::StaleVersion(ResourceType::Enrollment))
    }

    pub async fn find_by_id(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        id: Uuid,
    ) -> DatabaseResult<Option<Self>> {
        let result = sqlx::query_as("SELECT * FROM enrollments WHERE id = $1")
            .bind(id)
            .fetch_optional(mm.executor())
            .await?;
        Ok(result)
    }

    /// Enrolls `actor` into a published course that still has a free seat.
    #[tracing::instrument(skip(mm, actor), fields(student = %actor.user_id()))]
    pub async fn enroll(
        mm: &ModelManager,
        actor: &AuthenticatedUser,
        course_id: Uuid,
    ) -> DatabaseResult<Self> {
        let mut tx = mm.begin().await?;

        let mut course = Course::find_in(&mut tx, course_id).await?;
        if course.status() != CourseStatus::Published {
            return Err(DatabaseError::invalid_state("course is not open for enrollment"));
        }
        if course.is_full() {
            return Err(DatabaseError::conflict("course is full"));
        }

        let enrollment = Self::insert(&mut tx, actor.user_id(), course_id).await?;
        course.increment_enrollment_count();
        course.save_state(&mut tx).await?;

        tx.commit().await?;
        tracing::debug!("enrollment {} created", enrollment.id);
        Ok(enrollment)
    }

    /// Frees the seat of every live enrollment of `student_id`.
    pub(crate) async fn release_seats_in(
        conn: &mut PgConnection,
        student_id: Uuid,
    ) -> DatabaseResult<()> {
        let enrollments: Vec<Self> = sqlx::query_as(
            "SELECT * FROM enrollments WHERE student_id = $1 AND status <> 'DROPPED'",
        )
        .bind(student_id)
        .fetch_all(&mut *conn)
        .await?;

        for enrollment in enrollments {
            let mut course = Course::find_in(conn, enrollment.course_id).await?;
            course.decrement_enrollment_count();
            course.save_state(conn).await?;
        }
        Ok(())
    }

    #[tracing::instrument(skip(mm, actor), fields(student = %actor.user_id()))]
    pub async fn unenroll(
        mm: &ModelManager,
        actor: &AuthenticatedUser,
        course_id: Uuid,
    ) -> DatabaseResult<Self> {
        let mut tx = mm.begin().await?;

        let mut enrollment = Self::find_for_in(&mut tx, actor.user_id(), course_id)
            .await?
            .ok_or(DatabaseError::NotFound(ResourceType::Enrollment))?;
        enrollment.transition_to(EnrollmentStatus::Dropped, Utc::now())?;
        let enrollment = enrollment.save(&mut tx).await?;

        let mut course = Course::find_in(&mut tx, course_id).await?;
        course.decrement_enrollment_count();
        course.save_state(&mut tx).await?;

        tx.commit().await?;
        Ok(enrollment)
    }

    /// Status change by the course owner; dropping frees a seat.
    #[tracing::instrument(skip(mm, actor))]
    pub async fn change_status(
        mm: &ModelManager,
        actor: &AuthenticatedUser,
        id: Uuid,
        next: EnrollmentStatus,
    ) -> DatabaseResult<Self> {
        let mut tx = mm.begin().await?;

        let mut enrollment = Self::find_in(&mut tx, id).await?;
        let mut course = Course::find_in(&mut tx, enrollment.course_id).await?;
        if !actor.is_admin() && course.instructor_id() != actor.user_id() {
            return Err(DatabaseError::Forbidden);
        }

        enrollment.transition_to(next, Utc::now())?;
        let enrollment = enrollment.save(&mut tx).await?;

        if next == EnrollmentStatus::Dropped {
            course.decrement_enrollment_count();
            course.save_state(&mut tx).await?;
        }

        tx.commit().await?;
        Ok(enrollment)
    }

    #[tracing::instrument(skip(mm, actor))]
    pub async fn update_progress(
        mm: &ModelManager,
        actor: &AuthenticatedUser,
        id: Uuid,
        percentage: f64,
    ) -> DatabaseResult<Self> {
        let mut tx = mm.begin().await?;

        let mut enrollment = Self::find_in(&mut tx, id).await?;
        if enrollment.student_id != actor.user_id() {
            return Err(DatabaseError::Forbidden);
        }

        enrollment.apply_progress(percentage, Utc::now())?;
        let enrollment = enrollment.save(&mut tx).await?;

        tx.commit().await?;
        Ok(enrollment)
    }

    pub async fn page_by_student(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        student_id: Uuid,
        page: PageRequest,
    ) -> DatabaseResult<Page<Self>> {
        let items = sqlx::query_as(
            "SELECT * FROM enrollments WHERE student_id = $1 ORDER BY enrolled_at DESC LIMIT $2 OFFSET $3",
        )
        .bind(student_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(mm.executor())
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM enrollments WHERE student_id = $1")
            .bind(student_id)
            .fetch_one(mm.executor())
            .await?;

        Ok(Page::new(items, total, page))
    }

    pub async fn page_by_course(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        course_id: Uuid,
        page: PageRequest,
    ) -> DatabaseResult<Page<Self>> {
        let items = sqlx::query_as(
            "SELECT * FROM enrollments WHERE course_id = $1 ORDER BY enrolled_at DESC LIMIT $2 OFFSET $3",
        )
        .bind(course_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(mm.executor())
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM enrollments WHERE course_id = $1")
            .bind(course_id)
            .fetch_one(mm.executor())
            .await?;

        Ok(Page::new(items, total, page))
    }

    /// Courses the student is currently taking or has completed.
    pub async fn courses_of_student(
        mm: &ModelManager,
        actor: &AuthenticatedUser,
    ) -> DatabaseResult<Vec<Course>> {
        let result = sqlx::query_as(
            r#"
            SELECT c.* FROM courses c
            JOIN enrollments e ON e.course_id = c.id
            WHERE e.student_id = $1 AND e.status <> 'DROPPED'
            ORDER BY e.enrolled_at DESC
            "#,
        )
        .bind(actor.user_id())
        .fetch_all(mm.executor())
        .await?;
        Ok(result)
    }

    pub async fn students_of_course(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        course_id: Uuid,
    ) -> DatabaseResult<Vec<UserEntity>> {
        let result = sqlx::query_as(
            r#"
            SELECT u.* FROM users u
            JOIN enrollments e ON e.student_id = u.id
            WHERE e.course_id = $1 AND e.status <> 'DROPPED'
            ORDER BY u.last_name, u.first_name
            "#,
        )
        .bind(course_id)
        .fetch_all(mm.executor())
        .await?;
        Ok(result)
    }

    pub async fn is_enrolled(
        mm: &ModelManager,
        actor: &AuthenticatedUser,
        course_id: Uuid,
    ) -> DatabaseResult<bool> {
        let result: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM enrollments
                WHERE student_id = $1 AND course_id = $2 AND status <> 'DROPPED'
            )
            "#,
        )
        .bind(actor.user_id())
        .bind(course_id)
        .fetch_one(mm.executor())
        .await?;
        Ok(result)
    }

    pub async fn statistics(mm: &ModelManager) -> DatabaseResult<EnrollmentStatistics> {
        let result = sqlx::query_as(
            r#"
            SELECT
                COUNT(*) AS total_enrollments,
                COUNT(*) FILTER (WHERE status = 'ACTIVE') AS active_enrollments,
                COUNT(*) FILTER (WHERE status = 'COMPLETED') AS completed_enrollments,
                COUNT(*) FILTER (WHERE status = 'DROPPED') AS dropped_enrollments
            FROM enrollments
            "#,
        )
        .fetch_one(mm.executor())
        .await?;
        Ok(result)
    }
}

#[async_trait]
impl HasOwner for Enrollment {
    async fn get_owner_id(
        &self,
        _mm: &ModelManager,
        _actor: &AuthenticatedUser,
    ) -> DatabaseResult<Uuid> {
        Ok(self.student_id)
    }
}

#[cfg(test)]
mod test {
    use chrono::Duration;

    use super::*;

    fn enrollment() -> Enrollment {
        let now = Utc::now();
        Enrollment {
            id: Uuid::new_v4(),
            student_id: Uuid::new_v4(),
            course_id: Uuid::new_v4(),
            status: EnrollmentStatus::Active,
            enrolled_at: now,
            completed_at: None,
            progress_percentage: 0.0,
            last_accessed: None,
            certificate_url: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn progress_is_clamped() {
        let mut e = enrollment();
        e.apply_progress(-10.0, Utc::now()).unwrap();
        assert_eq!(e.progress_percentage(), 0.0);

        e.apply_progress(55.5, Utc::now()).unwrap();
        assert_eq!(e.progress_percentage(), 55.5);
        assert_eq!(e.status(), EnrollmentStatus::Active);
        assert!(e.completed_at().is_none());
    }

    #[test]
    fn full_progress_completes_once() {
        let mut e = enrollment();
        let first = Utc::now();
        e.apply_progress(150.0, first).unwrap();
        assert_eq!(e.progress_percentage(), 100.0);
        assert_eq!(e.status(), EnrollmentStatus::Completed);
        assert_eq!(e.completed_at(), Some(first));

        let later = first + Duration::hours(1);
        e.apply_progress(100.0, later).unwrap();
        e.mark_completed(later);
        assert_eq!(e.completed_at(), Some(first));
        assert_eq!(e.last_accessed(), Some(later));
    }

    #[test]
    fn dropped_enrollment_rejects_progress() {
        let mut e = enrollment();
        e.transition_to(EnrollmentStatus::Dropped, Utc::now()).unwrap();
        assert!(matches!(
            e.apply_progress(10.0, Utc::now()),
            Err(DatabaseError::InvalidState(_))
        ));
        assert!(e.transition_to(EnrollmentStatus::Active, Utc::now()).is_err());
    }

    #[test]
    fn completing_via_status_sets_timestamp() {
        let mut e = enrollment();
        let now = Utc::now();
        e.transition_to(EnrollmentStatus::Completed, now).unwrap();
        assert_eq!(e.progress_percentage(), 100.0);
        assert_eq!(e.completed_at(), Some(now));
    }
}
