use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, prelude::FromRow};
use uuid::Uuid;
use validator::Validate;

use crate::model::access::HasOwner;
use crate::model::entity::LearningModule;
use crate::model::repo::{ResourceType, ResourceTyped};
use crate::model::{DatabaseError, ModelManager, calc, error::DatabaseResult};
use crate::web::AuthenticatedUser;

/// Per-student progress through a learning module.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct StudentProgress {
    id: Uuid,
    student_id: Uuid,
    module_id: Uuid,
    current_section_id: Option<Uuid>,
    time_spent_minutes: i32,
    completion_percentage: f64,
    is_completed: bool,
    completed_at: Option<DateTime<Utc>>,
    last_accessed: Option<DateTime<Utc>>,
    version: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, utoipa::ToSchema)]
pub struct ModuleProgressUpdate {
    pub current_section_id: Option<Uuid>,
    pub completion_percentage: Option<f64>,
    #[validate(range(min = 0, message = "time spent must not be negative"))]
    pub time_spent_minutes: Option<i32>,
}

impl ResourceTyped for StudentProgress {
    fn get_resource_type() -> ResourceType {
        ResourceType::StudentProgress
    }
}

impl StudentProgress {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn module_id(&self) -> Uuid {
        self.module_id
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

    async fn save(self, conn: &mut PgConnection) -> DatabaseResult<Self> {
        let result: Option<Self> = sqlx::query_as(
            r#"
            UPDATE student_progress SET
                current_section_id = $1, time_spent_minutes = $2, completion_percentage = $3,
                is_completed = $4, completed_at = $5, last_accessed = $6,
                version = version + 1, updated_at = now()
            WHERE id = $7 AND version = $8
            RETURNING *
            "#,
        )
        .bind(self.current_section_id)
        .bind(self.time_spent_minutes)
        .bind(self.completion_percentage)
        .bind(self.is_completed)
        .bind(self.completed_at)
        .bind(self.last_accessed)
        .bind(self.id)
        .bind(self.version)
        .fetch_optional(conn)
        .await?;

        result.ok_or(DatabaseError::StaleVersion(ResourceType::StudentProgress))
    }

    #[tracing::instrument(skip(mm, actor, data), fields(student = %actor.user_id()))]
    pub async fn record(
        mm: &ModelManager,
        actor: &AuthenticatedUser,
        module_id: Uuid,
        data: ModuleProgressUpdate,
    ) -> DatabaseResult<Self> {
        let mut tx = mm.begin().await?;

        let module: Option<LearningModule> =
            sqlx::query_as("SELECT * FROM learning_modules WHERE id = $1")
                .bind(module_id)
                .fetch_optional(&mut *tx)
                .await?;
        let module = module.ok_or(DatabaseError::NotFound(ResourceType::LearningModule))?;
        if !module.is_visible_to(Some(actor)) {
            return Err(DatabaseError::Forbidden);
        }

        if let Some(section_id) = data.current_section_id {
            let in_module: bool = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM learning_sections WHERE id = $1 AND module_id = $2)",
            )
            .bind(section_id)
            .bind(module_id)
            .fetch_one(&mut *tx)
            .await?;
            if !in_module {
                return Err(DatabaseError::invalid_state(
                    "section does not belong to this module",
                ));
            }
        }

        let existing: Option<Self> =
            sqlx::query_as("SELECT * FROM student_progress WHERE student_id = $1 AND module_id = $2")
                .bind(actor.user_id())
                .bind(module_id)
                .fetch_optional(&mut *tx)
                .await?;

        let mut progress = match existing {
            Some(progress) => progress,
            None => sqlx::query_as(
                "INSERT INTO student_progress (id, student_id, module_id) VALUES ($1, $2, $3) RETURNING *",
            )
            .bind(Uuid::new_v4())
            .bind(actor.user_id())
            .bind(module_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| DatabaseError::unique_or(e, "progress was recorded concurrently"))?,
        };

        let now = Utc::now();
        if let Some(section_id) = data.current_section_id {
            progress.current_section_id = Some(section_id);
        }
        if let Some(minutes) = data.time_spent_minutes {
            progress.time_spent_minutes = progress.time_spent_minutes.saturating_add(minutes);
        }
        if let Some(percentage) = data.completion_percentage {
            progress.apply_progress(percentage, now);
        }
        progress.last_accessed = Some(now);

        let progress = progress.save(&mut tx).await?;
        tx.commit().await?;
        Ok(progress)
    }

    pub async fn list_for_student(
        mm: &ModelManager,
        actor: &AuthenticatedUser,
    ) -> DatabaseResult<Vec<Self>> {
        let result = sqlx::query_as(
            "SELECT * FROM student_progress WHERE student_id = $1 ORDER BY last_accessed DESC NULLS LAST",
        )
        .bind(actor.user_id())
        .fetch_all(mm.executor())
        .await?;
        Ok(result)
    }

    pub async fn find_for_module(
        mm: &ModelManager,
        actor: &AuthenticatedUser,
        module_id: Uuid,
    ) -> DatabaseResult<Option<Self>> {
        let result =
            sqlx::query_as("SELECT * FROM student_progress WHERE student_id = $1 AND module_id = $2")
                .bind(actor.user_id())
                .bind(module_id)
                .fetch_optional(mm.executor())
                .await?;
        Ok(result)
    }
}

#[async_trait]
impl HasOwner for StudentProgress {
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
    use super::*;

    #[test]
    fn module_progress_completes_once() {
        let now = Utc::now();
        let mut p = StudentProgress {
            id: Uuid::new_v4(),
            student_id: Uuid::new_v4(),
            module_id: Uuid::new_v4(),
            current_section_id: None,
            time_spent_minutes: 0,
            completion_percentage: 0.0,
            is_completed: false,
            completed_at: None,
            last_accessed: None,
            version: 0,
            created_at: now,
            updated_at: now,
        };

        p.apply_progress(64.0, now);
        assert_eq!(p.completion_percentage(), 64.0);
        assert!(!p.is_completed());

        p.apply_progress(100.0, now);
        let completed = p.completed_at();
        assert!(p.is_completed());
        assert_eq!(completed, Some(now));

        p.apply_progress(100.0, now + chrono::Duration::minutes(1));
        assert_eq!(p.completed_at(), completed);
    }
}
