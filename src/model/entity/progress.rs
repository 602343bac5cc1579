use async_trait::async_trait;
use chrono::{DateTime, Month, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, prelude::FromRow};
use uuid::Uuid;
use validator::Validate;

use crate::model::access::HasOwner;
use crate::model::repo::{Page, PageRequest, ResourceType, ResourceTyped};
use crate::model::{DatabaseError, ModelManager, calc, error::DatabaseResult};
use crate::web::AuthenticatedUser;

/// Per-user progress on a single course content item.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct Progress {
    id: Uuid,
    user_id: Uuid,
    content_id: Uuid,
    completion_percentage: f64,
    is_completed: bool,
    time_spent_minutes: i32,
    last_accessed: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    notes: Option<String>,
    version: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate, utoipa::ToSchema)]
pub struct ProgressUpdate {
    pub content_id: Uuid,
    pub completion_percentage: Option<f64>,
    #[validate(range(min = 0, message = "time spent must not be negative"))]
    pub time_spent_minutes: Option<i32>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct InstructorStatistics {
    pub distinct_students: i64,
    pub completed_items: i64,
    pub average_progress: f64,
    pub progress_records: i64,
}

/// A progress record joined with the student and content it belongs to.
#[derive(Debug, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct StudentProgressRow {
    pub progress_id: Uuid,
    pub student_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub course_id: Uuid,
    pub content_id: Uuid,
    pub content_title: String,
    pub completion_percentage: f64,
    pub is_completed: bool,
    pub time_spent_minutes: i32,
    pub last_accessed: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct MonthlyCount {
    pub month: String,
    pub count: i64,
}

impl ResourceTyped for Progress {
    fn get_resource_type() -> ResourceType {
        ResourceType::Progress
    }
}

impl Progress {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn content_id(&self) -> Uuid {
        self.content_id
    }

    pub fn completion_percentage(&self) -> f64 {
        self.completion_percentage
    }

    pub fn is_completed(&self) -> bool {
        self.is_completed
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn time_spent_minutes(&self) -> i32 {
        self.time_spent_minutes
    }

    /// Completed items stay at 100 with their first completion timestamp.
    pub fn apply_progress(&mut self, percentage: f64, now: DateTime<Utc>) {
        self.last_accessed = Some(now);
        if self.is_completed {
            return;
        }

        self.completion_percentage = calc::clamp_percentage(percentage);
        if self.completion_percentage >= 100.0 {
            self.is_completed = true;
            self.completed_at.get_or_insert(now);
        }
    }

    pub fn add_time_spent(&mut self, minutes: i32, now: DateTime<Utc>) {
        self.time_spent_minutes = self.time_spent_minutes.saturating_add(minutes.max(0));
        self.last_accessed = Some(now);
    }

    async fn save(self, conn: &mut PgConnection) -> DatabaseResult<Self> {
        let result: Option<Self> = sqlx::query_as(
            r#"
            UPDATE progress SET
                completion_percentage = $1, is_completed = $2, time_spent_minutes = $3,
                last_accessed = $4, completed_at = $5, notes = $6,
                version = version + 1, updated_at = now()
            WHERE id = $7 AND version = $8
            RETURNING *
            "#,
        )
        .bind(self.completion_percentage)
        .bind(self.is_completed)
        .bind(self.time_spent_minutes)
        .bind(self.last_accessed)
        .bind(self.completed_at)
        .bind(&self.notes)
        .bind(self.id)
        .bind(self.version)
        .fetch_optional(conn)
        .await?;

        result.ok_or(DatabaseError::StaleVersion(ResourceType::Progress))
    }

    /// Creates or updates the caller's record for `data.content_id`.
    #[tracing::instrument(skip(mm, actor, data), fields(user = %actor.user_id(), content = %data.content_id))]
    pub async fn record(
        mm: &ModelManager,
        actor: &AuthenticatedUser,
        data: ProgressUpdate,
    ) -> DatabaseResult<Self> {
        let mut tx = mm.begin().await?;

        let content_exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM course_contents WHERE id = $1)")
                .bind(data.content_id)
                .fetch_one(&mut *tx)
                .await?;
        if !content_exists {
            return Err(DatabaseError::NotFound(ResourceType::CourseContent));
        }

        let existing: Option<Self> =
            sqlx::query_as("SELECT * FROM progress WHERE user_id = $1 AND content_id = $2")
                .bind(actor.user_id())
                .bind(data.content_id)
                .fetch_optional(&mut *tx)
                .await?;

        let mut progress = match existing {
            Some(progress) => progress,
            None => sqlx::query_as(
                "INSERT INTO progress (id, user_id, content_id) VALUES ($1, $2, $3) RETURNING *",
            )
            .bind(Uuid::new_v4())
            .bind(actor.user_id())
            .bind(data.content_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| DatabaseError::unique_or(e, "progress was recorded concurrently"))?,
        };

        let now = Utc::now();
        if let Some(percentage) = data.completion_percentage {
            progress.apply_progress(percentage, now);
        }
        if let Some(minutes) = data.time_spent_minutes {
            progress.add_time_spent(minutes, now);
        }
        if data.notes.is_some() {
            progress.notes = data.notes;
        }
        progress.last_accessed = Some(now);

        let progress = progress.save(&mut tx).await?;
        tx.commit().await?;
        Ok(progress)
    }

    pub async fn find_by_id(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        id: Uuid,
    ) -> DatabaseResult<Option<Self>> {
        let result = sqlx::query_as("SELECT * FROM progress WHERE id = $1")
            .bind(id)
            .fetch_optional(mm.executor())
            .await?;
        Ok(result)
    }

    pub async fn delete(self, mm: &ModelManager, _actor: &AuthenticatedUser) -> DatabaseResult<()> {
        sqlx::query("DELETE FROM progress WHERE id = $1")
            .bind(self.id)
            .execute(mm.executor())
            .await?;
        Ok(())
    }

    pub async fn list_for_course(
        mm: &ModelManager,
        actor: &AuthenticatedUser,
        course_id: Uuid,
    ) -> DatabaseResult<Vec<Self>> {
        let result = sqlx::query_as(
            r#"
            SELECT p.* FROM progress p
            JOIN course_contents cc ON cc.id = p.content_id
            WHERE p.user_id = $1 AND cc.course_id = $2
            ORDER BY cc.order_index
            "#,
        )
        .bind(actor.user_id())
        .bind(course_id)
        .fetch_all(mm.executor())
        .await?;
        Ok(result)
    }

    /// Mean completion of the caller's records in the course, 0 without any.
    pub async fn course_percentage(
        mm: &ModelManager,
        actor: &AuthenticatedUser,
        course_id: Uuid,
    ) -> DatabaseResult<f64> {
        let percentages: Vec<f64> = sqlx::query_scalar(
            r#"
            SELECT p.completion_percentage FROM progress p
            JOIN course_contents cc ON cc.id = p.content_id
            WHERE p.user_id = $1 AND cc.course_id = $2
            "#,
        )
        .bind(actor.user_id())
        .bind(course_id)
        .fetch_all(mm.executor())
        .await?;

        Ok(calc::average(&percentages))
    }

    pub async fn instructor_statistics(
        mm: &ModelManager,
        actor: &AuthenticatedUser,
    ) -> DatabaseResult<InstructorStatistics> {
        let result = sqlx::query_as(
            r#"
            SELECT
                COUNT(DISTINCT p.user_id) AS distinct_students,
                COUNT(*) FILTER (WHERE p.is_completed) AS completed_items,
                COALESCE(AVG(p.completion_percentage), 0)::DOUBLE PRECISION AS average_progress,
                COUNT(p.id) AS progress_records
            FROM progress p
            JOIN course_contents cc ON cc.id = p.content_id
            JOIN courses c ON c.id = cc.course_id
            WHERE c.instructor_id = $1
            "#,
        )
        .bind(actor.user_id())
        .fetch_one(mm.executor())
        .await?;
        Ok(result)
    }

    pub async fn page_instructor_students(
        mm: &ModelManager,
        actor: &AuthenticatedUser,
        course_id: Option<Uuid>,
        page: PageRequest,
    ) -> DatabaseResult<Page<StudentProgressRow>> {
        let items = sqlx::query_as(
            r#"
            SELECT
                p.id AS progress_id, u.id AS student_id, u.first_name, u.last_name, u.email,
                c.id AS course_id, cc.id AS content_id, cc.title AS content_title,
                p.completion_percentage, p.is_completed, p.time_spent_minutes, p.last_accessed
            FROM progress p
            JOIN users u ON u.id = p.user_id
            JOIN course_contents cc ON cc.id = p.content_id
            JOIN courses c ON c.id = cc.course_id
            WHERE c.instructor_id = $1 AND ($2::UUID IS NULL OR c.id = $2)
            ORDER BY u.last_name, u.first_name, cc.order_index
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(actor.user_id())
        .bind(course_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(mm.executor())
        .await?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM progress p
            JOIN course_contents cc ON cc.id = p.content_id
            JOIN courses c ON c.id = cc.course_id
            WHERE c.instructor_id = $1 AND ($2::UUID IS NULL OR c.id = $2)
            "#,
        )
        .bind(actor.user_id())
        .bind(course_id)
        .fetch_one(mm.executor())
        .await?;

        Ok(Page::new(items, total, page))
    }

    /// Records created per month of `year`; admins see everything, others their own
    /// records and the records on their courses.
    pub async fn monthly_counts(
        mm: &ModelManager,
        actor: &AuthenticatedUser,
        year: i32,
    ) -> DatabaseResult<Vec<MonthlyCount>> {
        let rows: Vec<(i32, i64)> = sqlx::query_as(
            r#"
            SELECT EXTRACT(MONTH FROM p.created_at)::INT AS month, COUNT(*) AS count
            FROM progress p
            JOIN course_contents cc ON cc.id = p.content_id
            JOIN courses c ON c.id = cc.course_id
            WHERE EXTRACT(YEAR FROM p.created_at)::INT = $1
              AND ($3 OR p.user_id = $2 OR c.instructor_id = $2)
            GROUP BY month
            "#,
        )
        .bind(year)
        .bind(actor.user_id())
        .bind(actor.is_admin())
        .fetch_all(mm.executor())
        .await?;

        Ok(fill_months(&rows))
    }
}

/// Expands sparse `(month, count)` rows to all twelve months in calendar order.
pub fn fill_months(rows: &[(i32, i64)]) -> Vec<MonthlyCount> {
    (1..=12u8)
        .filter_map(|number| Month::try_from(number).ok())
        .map(|month| {
            let number = month.number_from_month() as i32;
            let count = rows
                .iter()
                .find(|(m, _)| *m == number)
                .map(|(_, c)| *c)
                .unwrap_or(0);
            MonthlyCount {
                month: month.name().to_uppercase(),
                count,
            }
        })
        .collect()
}

#[async_trait]
impl HasOwner for Progress {
    async fn get_owner_id(
        &self,
        _mm: &ModelManager,
        _actor: &AuthenticatedUser,
    ) -> DatabaseResult<Uuid> {
        Ok(self.user_id)
    }
}

#[cfg(test)]
mod test {
    use chrono::Duration;

    use super::*;

    fn progress() -> Progress {
        let now = Utc::now();
        Progress {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            content_id: Uuid::new_v4(),
            completion_percentage: 0.0,
            is_completed: false,
            time_spent_minutes: 0,
            last_accessed: None,
            completed_at: None,
            notes: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn progress_clamps_and_completes_once() {
        let mut p = progress();
        p.apply_progress(-3.0, Utc::now());
        assert_eq!(p.completion_percentage(), 0.0);
        assert!(!p.is_completed());

        let first = Utc::now();
        p.apply_progress(250.0, first);
        assert_eq!(p.completion_percentage(), 100.0);
        assert!(p.is_completed());
        assert_eq!(p.completed_at(), Some(first));

        p.apply_progress(30.0, first + Duration::days(1));
        assert_eq!(p.completion_percentage(), 100.0);
        assert_eq!(p.completed_at(), Some(first));
    }

    #[test]
    fn time_spent_accumulates() {
        let mut p = progress();
        p.add_time_spent(15, Utc::now());
        p.add_time_spent(-5, Utc::now());
        p.add_time_spent(10, Utc::now());
        assert_eq!(p.time_spent_minutes(), 25);
    }

    #[test]
    fn months_are_filled_in_order() {
        let months = fill_months(&[(3, 4), (12, 1)]);
        assert_eq!(months.len(), 12);
        assert_eq!(months[0], MonthlyCount { month: String::from("JANUARY"), count: 0 });
        assert_eq!(months[2].count, 4);
        assert_eq!(months[11].month, "DECEMBER");
        assert_eq!(months[11].count, 1);
    }
}
