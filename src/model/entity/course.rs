use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, prelude::FromRow};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::impl_paginatable_for;
use crate::model::access::HasOwner;
use crate::model::repo::{Page, PageRequest, ResourceType, ResourceTyped};
use crate::model::{
    CourseStatus, DatabaseError, EnrollmentStatus, ModelManager, calc, entity::Enrollment,
    error::DatabaseResult, repo::CrudRepository,
};
use crate::web::AuthenticatedUser;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct Course {
    id: Uuid,
    instructor_id: Uuid,
    title: String,
    description: Option<String>,
    short_description: Option<String>,
    category: Option<String>,
    level: Option<String>,
    language: Option<String>,
    duration_hours: Option<i32>,
    price_cents: i64,
    max_students: Option<i32>,
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
    tags: Vec<String>,
    is_featured: bool,
    status: CourseStatus,
    enrollment_count: i32,
    rating: Option<f64>,
    review_count: i32,
    version: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate, utoipa::ToSchema)]
#[validate(schema(function = "validate_course_dates"))]
pub struct CourseCreate {
    #[validate(length(min = 1, max = 200, message = "title must be 1-200 characters"))]
    pub title: String,
    pub description: Option<String>,
    #[validate(length(max = 500, message = "short description must be at most 500 characters"))]
    pub short_description: Option<String>,
    #[validate(length(max = 100))]
    pub category: Option<String>,
    #[validate(length(max = 50))]
    pub level: Option<String>,
    #[validate(length(max = 50))]
    pub language: Option<String>,
    #[validate(range(min = 0, message = "duration must not be negative"))]
    pub duration_hours: Option<i32>,
    #[serde(default)]
    #[validate(range(min = 0, message = "price must not be negative"))]
    pub price_cents: i64,
    #[validate(range(min = 1, message = "capacity must be at least one student"))]
    pub max_students: Option<i32>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_featured: bool,
    /// Version the client last read. Updates against a newer row are rejected.
    #[serde(default)]
    pub version: Option<i32>,
}

fn validate_course_dates(course: &CourseCreate) -> Result<(), ValidationError> {
    match (course.start_date, course.end_date) {
        (Some(start), Some(end)) if end < start => {
            Err(ValidationError::new("end_date").with_message("end date precedes start date".into()))
        }
        _ => Ok(()),
    }
}

#[derive(Debug, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct CourseStatistics {
    pub total_courses: i64,
    pub published_courses: i64,
    pub draft_courses: i64,
    pub total_enrollments: i64,
}

impl ResourceTyped for Course {
    fn get_resource_type() -> ResourceType {
        ResourceType::Course
    }
}

impl Course {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn instructor_id(&self) -> Uuid {
        self.instructor_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn status(&self) -> CourseStatus {
        self.status
    }

    pub fn max_students(&self) -> Option<i32> {
        self.max_students
    }

    pub fn enrollment_count(&self) -> i32 {
        self.enrollment_count
    }

    pub fn rating(&self) -> Option<f64> {
        self.rating
    }

    pub fn review_count(&self) -> i32 {
        self.review_count
    }

    pub fn price_cents(&self) -> i64 {
        self.price_cents
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    pub fn is_full(&self) -> bool {
        self.max_students
            .is_some_and(|max| self.enrollment_count >= max)
    }

    pub fn increment_enrollment_count(&mut self) {
        self.enrollment_count += 1;
    }

    pub fn decrement_enrollment_count(&mut self) {
        self.enrollment_count = (self.enrollment_count - 1).max(0);
    }

    /// Folds a 1..=5 rating into the running average.
    pub fn apply_rating(&mut self, rating: f64) -> DatabaseResult<()> {
        if !(1.0..=5.0).contains(&rating) {
            return Err(DatabaseError::invalid_state("rating must be between 1 and 5"));
        }

        self.rating = Some(calc::running_average(self.rating, self.review_count, rating));
        self.review_count += 1;
        Ok(())
    }

    pub fn transition_to(&mut self, next: CourseStatus) -> DatabaseResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(DatabaseError::invalid_state(format!(
                "course cannot move from {:?} to {:?}",
                self.status, next
            )));
        }

        self.status = next;
        Ok(())
    }

    pub(crate) async fn find_in(conn: &mut PgConnection, id: Uuid) -> DatabaseResult<Self> {
        let result: Option<Self> = sqlx::query_as("SELECT * FROM courses WHERE id = $1")
            .bind(id)
            .fetch_optional(conn)
            .await?;
        result.ok_or(DatabaseError::NotFound(ResourceType::Course))
    }

    /// Persists status, counters and rating guarded by the version column.
    pub(crate) async fn save_state(self, conn: &mut PgConnection) -> DatabaseResult<Self> {
        let result: Option<Self> = sqlx::query_as(
            r#"
            UPDATE courses SET
                status = $1, enrollment_count = $2, rating = $3, review_count = $4,
                version = version + 1, updated_at = now()
            WHERE id = $5 AND version = $6
            RETURNING *
            "#,
        )
        .bind(self.status)
        .bind(self.enrollment_count)
        .bind(self.rating)
        .bind(self.review_count)
        .bind(self.id)
        .bind(self.version)
        .fetch_optional(conn)
        .await?;

        result.ok_or(DatabaseError::StaleVersion(ResourceType::Course))
    }
}

#[async_trait]
impl CrudRepository<Course, CourseCreate, Uuid> for Course {
    async fn create(
        mm: &ModelManager,
        actor: &AuthenticatedUser,
        data: CourseCreate,
    ) -> DatabaseResult<Self> {
        let result = sqlx::query_as(
            r#"
            INSERT INTO courses (
                id, instructor_id, title, description, short_description, category, level, language,
                duration_hours, price_cents, max_students, start_date, end_date, tags, is_featured
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(actor.user_id())
        .bind(&data.title)
        .bind(&data.description)
        .bind(&data.short_description)
        .bind(&data.category)
        .bind(&data.level)
        .bind(&data.language)
        .bind(data.duration_hours)
        .bind(data.price_cents)
        .bind(data.max_students)
        .bind(data.start_date)
        .bind(data.end_date)
        .bind(&data.tags)
        .bind(data.is_featured)
        .fetch_one(mm.executor())
        .await?;
        Ok(result)
    }

    async fn update(
        self,
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        data: CourseCreate,
    ) -> DatabaseResult<Self> {
        if data.max_students.is_some_and(|max| max < self.enrollment_count) {
            return Err(DatabaseError::conflict(
                "capacity is below the current number of enrollments",
            ));
        }

        let result: Option<Self> = sqlx::query_as(
            r#"
            UPDATE courses SET
                title = $1, description = $2, short_description = $3, category = $4, level = $5,
                language = $6, duration_hours = $7, price_cents = $8, max_students = $9,
                start_date = $10, end_date = $11, tags = $12, is_featured = $13,
                version = version + 1, updated_at = now()
            WHERE id = $14 AND version = $15
            RETURNING *
            "#,
        )
        .bind(&data.title)
        .bind(&data.description)
        .bind(&data.short_description)
        .bind(&data.category)
        .bind(&data.level)
        .bind(&data.language)
        .bind(data.duration_hours)
        .bind(data.price_cents)
        .bind(data.max_students)
        .bind(data.start_date)
        .bind(data.end_date)
        .bind(&data.tags)
        .bind(data.is_featured)
        .bind(self.id)
        .bind(data.version.unwrap_or(self.version))
        .fetch_optional(mm.executor())
        .await?;

        result.ok_or(DatabaseError::StaleVersion(ResourceType::Course))
    }

    async fn delete(self, mm: &ModelManager, _actor: &AuthenticatedUser) -> DatabaseResult<()> {
        sqlx::query("DELETE FROM courses WHERE id = $1")
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
        let result = sqlx::query_as("SELECT * FROM courses WHERE id = $1")
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
            sqlx::query_as("SELECT * FROM courses ORDER BY created_at DESC LIMIT $1 OFFSET $2")
                .bind(page.limit())
                .bind(page.offset())
                .fetch_all(mm.executor())
                .await?;
        Ok(result)
    }

    async fn count(mm: &ModelManager, _actor: &AuthenticatedUser) -> DatabaseResult<i64> {
        let result: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM courses")
            .fetch_one(mm.executor())
            .await?;

        Ok(result)
    }
}

impl_paginatable_for!(Course, CourseCreate, Uuid);

#[async_trait]
impl HasOwner for Course {
    async fn get_owner_id(
        &self,
        _mm: &ModelManager,
        _actor: &AuthenticatedUser,
    ) -> DatabaseResult<Uuid> {
        Ok(self.instructor_id)
    }
}

impl Course {
    /// Pages over `filter`; a `{q}` placeholder in it is bound to the search pattern.
    async fn page_where(
        mm: &ModelManager,
        filter: &str,
        query: Option<&str>,
        page: PageRequest,
    ) -> DatabaseResult<Page<Self>> {
        let list_sql = format!(
            "SELECT * FROM courses WHERE {} ORDER BY created_at DESC LIMIT $1 OFFSET $2",
            filter.replace("{q}", "$3")
        );
        let count_sql = format!(
            "SELECT COUNT(*) FROM courses WHERE {}",
            filter.replace("{q}", "$1")
        );

        let mut list = sqlx::query_as::<_, Self>(&list_sql)
            .bind(page.limit())
            .bind(page.offset());
        let mut count = sqlx::query_scalar::<_, i64>(&count_sql);

        if let Some(query) = query {
            let pattern = format!("%{}%", query.trim());
            list = list.bind(pattern.clone());
            count = count.bind(pattern);
        }

        let items = list.fetch_all(mm.executor()).await?;
        let total = count.fetch_one(mm.executor()).await?;

        Ok(Page::new(items, total, page))
    }

    pub async fn page_published(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        page: PageRequest,
    ) -> DatabaseResult<Page<Self>> {
        Self::page_where(mm, "status = 'PUBLISHED'", None, page).await
    }

    pub async fn page_featured(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        page: PageRequest,
    ) -> DatabaseResult<Page<Self>> {
        Self::page_where(mm, "status = 'PUBLISHED' AND is_featured", None, page).await
    }

    pub async fn search(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        query: &str,
        page: PageRequest,
    ) -> DatabaseResult<Page<Self>> {
        Self::page_where(
            mm,
            "(title ILIKE {q} OR description ILIKE {q} OR category ILIKE {q})",
            Some(query),
            page,
        )
        .await
    }

    pub async fn with_available_slots(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
    ) -> DatabaseResult<Vec<Self>> {
        let result = sqlx::query_as(
            r#"
            SELECT * FROM courses
            WHERE status = 'PUBLISHED'
              AND (max_students IS NULL OR enrollment_count < max_students)
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(mm.executor())
        .await?;
        Ok(result)
    }

    pub async fn statistics(mm: &ModelManager) -> DatabaseResult<CourseStatistics> {
        let result = sqlx::query_as(
            r#"
            SELECT
                COUNT(*) AS total_courses,
                COUNT(*) FILTER (WHERE status = 'PUBLISHED') AS published_courses,
                COUNT(*) FILTER (WHERE status = 'DRAFT') AS draft_courses,
                COALESCE(SUM(enrollment_count), 0)::BIGINT AS total_enrollments
            FROM courses
            "#,
        )
        .fetch_one(mm.executor())
        .await?;
        Ok(result)
    }

    /// Moves the course to `next` inside a transaction.
    #[tracing::instrument(skip(mm, actor))]
    pub async fn change_status(
        mm: &ModelManager,
        actor: &AuthenticatedUser,
        id: Uuid,
        next: CourseStatus,
    ) -> DatabaseResult<Self> {
        let mut tx = mm.begin().await?;

        let mut course = Self::find_in(&mut tx, id).await?;
        if !actor.is_admin() && course.instructor_id != actor.user_id() {
            return Err(DatabaseError::Forbidden);
        }

        course.transition_to(next)?;
        let course = course.save_state(&mut tx).await?;

        tx.commit().await?;
        Ok(course)
    }

    /// Records a review from an enrolled student.
    #[tracing::instrument(skip(mm, actor))]
    pub async fn rate(
        mm: &ModelManager,
        actor: &AuthenticatedUser,
        id: Uuid,
        rating: f64,
    ) -> DatabaseResult<Self> {
        let mut tx = mm.begin().await?;

        let mut course = Self::find_in(&mut tx, id).await?;
        let enrollment = Enrollment::find_for_in(&mut tx, actor.user_id(), id).await?;
        match enrollment {
            Some(e) if e.status() != EnrollmentStatus::Dropped => {}
            _ => return Err(DatabaseError::Forbidden),
        }

        course.apply_rating(rating)?;
        let course = course.save_state(&mut tx).await?;

        tx.commit().await?;
        Ok(course)
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;

    pub(crate) fn course(max_students: Option<i32>, enrollment_count: i32) -> Course {
        let now = Utc::now();
        Course {
            id: Uuid::new_v4(),
            instructor_id: Uuid::new_v4(),
            title: String::from("Rust"),
            description: None,
            short_description: None,
            category: None,
            level: None,
            language: None,
            duration_hours: None,
            price_cents: 0,
            max_students,
            start_date: None,
            end_date: None,
            tags: vec![],
            is_featured: false,
            status: CourseStatus::Published,
            enrollment_count,
            rating: None,
            review_count: 0,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn capacity_limits_enrollment() {
        assert!(!course(None, 1_000).is_full());
        assert!(!course(Some(2), 1).is_full());
        assert!(course(Some(2), 2).is_full());
    }

    #[test]
    fn enrollment_count_never_negative() {
        let mut course = course(None, 1);
        course.decrement_enrollment_count();
        course.decrement_enrollment_count();
        assert_eq!(course.enrollment_count(), 0);

        course.increment_enrollment_count();
        assert_eq!(course.enrollment_count(), 1);
    }

    #[test]
    fn rating_is_mean_of_reviews() {
        let mut course = course(None, 0);
        for rating in [5.0, 4.0, 3.0] {
            course.apply_rating(rating).unwrap();
        }

        assert_eq!(course.review_count(), 3);
        assert!((course.rating().unwrap() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn rating_out_of_range_is_rejected() {
        let mut course = course(None, 0);
        assert!(matches!(
            course.apply_rating(6.0),
            Err(DatabaseError::InvalidState(_))
        ));
        assert!(course.apply_rating(0.5).is_err());
        assert_eq!(course.review_count(), 0);
        assert!(course.rating().is_none());
    }

    #[test]
    fn archived_course_stays_archived() {
        let mut course = course(None, 0);
        course.transition_to(CourseStatus::Archived).unwrap();
        assert!(course.transition_to(CourseStatus::Published).is_err());
        assert_eq!(course.status(), CourseStatus::Archived);
    }

    #[test]
    fn course_dates_are_validated() {
        let now = Utc::now();
        let body = CourseCreate {
            title: String::from("Dates"),
            description: None,
            short_description: None,
            category: None,
            level: None,
            language: None,
            duration_hours: None,
            price_cents: 0,
            max_students: None,
            start_date: Some(now),
            end_date: Some(now - chrono::Duration::days(1)),
            tags: vec![],
            is_featured: false,
            version: None,
        };
        assert!(body.validate().is_err());
    }
}
