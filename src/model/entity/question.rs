use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, prelude::FromRow};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::model::access::HasOwner;
use crate::model::repo::{ResourceType, ResourceTyped};
use crate::model::{
    DatabaseError, ModelManager, QuestionType, error::DatabaseResult, owner_of,
};
use crate::web::AuthenticatedUser;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct Question {
    id: Uuid,
    assessment_id: Uuid,
    question_text: String,
    question_type: QuestionType,
    points: f64,
    order_index: i32,
    explanation: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct QuestionOption {
    id: Uuid,
    question_id: Uuid,
    option_text: String,
    is_correct: bool,
    order_index: i32,
    explanation: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate, utoipa::ToSchema)]
#[validate(schema(function = "validate_question_options"))]
pub struct QuestionCreate {
    #[validate(length(min = 1, message = "question text must not be empty"))]
    pub question_text: String,
    pub question_type: QuestionType,
    #[serde(default = "default_points")]
    #[validate(range(min = 0.0, message = "points must not be negative"))]
    pub points: f64,
    pub order_index: Option<i32>,
    pub explanation: Option<String>,
    #[serde(default)]
    #[validate(nested)]
    pub options: Vec<QuestionOptionCreate>,
}

#[derive(Debug, Clone, Deserialize, Validate, utoipa::ToSchema)]
pub struct QuestionOptionCreate {
    #[validate(length(min = 1, message = "option text must not be empty"))]
    pub option_text: String,
    #[serde(default)]
    pub is_correct: bool,
    pub explanation: Option<String>,
}

fn default_points() -> f64 {
    1.0
}

fn validate_question_options(data: &QuestionCreate) -> Result<(), ValidationError> {
    let correct = data.options.iter().filter(|o| o.is_correct).count();
    let invalid = |message: &'static str| {
        Err(ValidationError::new("options").with_message(message.into()))
    };

    match data.question_type {
        QuestionType::MultipleChoice if data.options.len() < 2 => {
            invalid("multiple choice questions need at least two options")
        }
        QuestionType::TrueFalse if data.options.len() != 2 => {
            invalid("true/false questions need exactly two options")
        }
        QuestionType::MultipleChoice | QuestionType::TrueFalse if correct == 0 => {
            invalid("at least one option must be correct")
        }
        QuestionType::ShortAnswer if !data.options.is_empty() => {
            invalid("short answer questions take no options")
        }
        _ => Ok(()),
    }
}

impl ResourceTyped for Question {
    fn get_resource_type() -> ResourceType {
        ResourceType::Question
    }
}

impl ResourceTyped for QuestionOption {
    fn get_resource_type() -> ResourceType {
        ResourceType::QuestionOption
    }
}

impl Question {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn assessment_id(&self) -> Uuid {
        self.assessment_id
    }

    pub fn question_text(&self) -> &str {
        &self.question_text
    }

    pub fn question_type(&self) -> QuestionType {
        self.question_type
    }

    pub fn points(&self) -> f64 {
        self.points
    }

    pub fn order_index(&self) -> i32 {
        self.order_index
    }

    pub fn explanation(&self) -> Option<&str> {
        self.explanation.as_deref()
    }

    /// Inserts the question and its options in one transaction.
    pub async fn create_with_options(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        assessment_id: Uuid,
        data: QuestionCreate,
    ) -> DatabaseResult<(Self, Vec<QuestionOption>)> {
        let mut tx = mm.begin().await?;

        let question: Self = sqlx::query_as(
            r#"
            INSERT INTO questions (id, assessment_id, question_text, question_type, points, order_index, explanation)
            VALUES (
                $1, $2, $3, $4, $5,
                COALESCE($6, (SELECT COALESCE(MAX(order_index) + 1, 0) FROM questions WHERE assessment_id = $2)),
                $7
            )
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(assessment_id)
        .bind(&data.question_text)
        .bind(data.question_type)
        .bind(data.points)
        .bind(data.order_index)
        .bind(&data.explanation)
        .fetch_one(&mut *tx)
        .await?;

        let mut options = Vec::with_capacity(data.options.len());
        for (index, option) in data.options.into_iter().enumerate() {
            let created: QuestionOption = sqlx::query_as(
                r#"
                INSERT INTO question_options (id, question_id, option_text, is_correct, order_index, explanation)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING *
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(question.id)
            .bind(&option.option_text)
            .bind(option.is_correct)
            .bind(index as i32)
            .bind(&option.explanation)
            .fetch_one(&mut *tx)
            .await?;
            options.push(created);
        }

        tx.commit().await?;
        Ok((question, options))
    }

    pub async fn find_by_id(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        id: Uuid,
    ) -> DatabaseResult<Option<Self>> {
        let result = sqlx::query_as("SELECT * FROM questions WHERE id = $1")
            .bind(id)
            .fetch_optional(mm.executor())
            .await?;
        Ok(result)
    }

    pub async fn delete(self, mm: &ModelManager, _actor: &AuthenticatedUser) -> DatabaseResult<()> {
        sqlx::query("DELETE FROM questions WHERE id = $1")
            .bind(self.id)
            .execute(mm.executor())
            .await?;
        Ok(())
    }

    pub async fn list_by_assessment(
        mm: &ModelManager,
        assessment_id: Uuid,
    ) -> DatabaseResult<Vec<Self>> {
        let mut conn = mm.executor().acquire().await?;
        Self::list_in(&mut conn, assessment_id).await
    }

    pub(crate) async fn list_in(
        conn: &mut PgConnection,
        assessment_id: Uuid,
    ) -> DatabaseResult<Vec<Self>> {
        let result = sqlx::query_as(
            "SELECT * FROM questions WHERE assessment_id = $1 ORDER BY order_index, created_at",
        )
        .bind(assessment_id)
        .fetch_all(conn)
        .await?;
        Ok(result)
    }

    pub(crate) async fn find_in(conn: &mut PgConnection, id: Uuid) -> DatabaseResult<Self> {
        let result: Option<Self> = sqlx::query_as("SELECT * FROM questions WHERE id = $1")
            .bind(id)
            .fetch_optional(conn)
            .await?;
        result.ok_or(DatabaseError::NotFound(ResourceType::Question))
    }
}

impl QuestionOption {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn question_id(&self) -> Uuid {
        self.question_id
    }

    pub fn option_text(&self) -> &str {
        &self.option_text
    }

    pub fn is_correct(&self) -> bool {
        self.is_correct
    }

    pub fn order_index(&self) -> i32 {
        self.order_index
    }

    pub fn explanation(&self) -> Option<&str> {
        self.explanation.as_deref()
    }

    /// Options of every question of the assessment.
    pub async fn list_by_assessment(
        mm: &ModelManager,
        assessment_id: Uuid,
    ) -> DatabaseResult<Vec<Self>> {
        let result = sqlx::query_as(
            r#"
            SELECT o.* FROM question_options o
            JOIN questions q ON q.id = o.question_id
            WHERE q.assessment_id = $1
            ORDER BY o.question_id, o.order_index
            "#,
        )
        .bind(assessment_id)
        .fetch_all(mm.executor())
        .await?;
        Ok(result)
    }

    pub(crate) async fn find_in(conn: &mut PgConnection, id: Uuid) -> DatabaseResult<Self> {
        let result: Option<Self> = sqlx::query_as("SELECT * FROM question_options WHERE id = $1")
            .bind(id)
            .fetch_optional(conn)
            .await?;
        result.ok_or(DatabaseError::NotFound(ResourceType::QuestionOption))
    }
}

#[async_trait]
impl HasOwner for Question {
    async fn get_owner_id(
        &self,
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
    ) -> DatabaseResult<Uuid> {
        owner_of(
            mm,
            r#"
            SELECT c.instructor_id FROM courses c
            JOIN assessments a ON a.course_id = c.id
            WHERE a.id = $1
            "#,
            self.assessment_id,
            ResourceType::Assessment,
        )
        .await
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;

    pub(crate) fn question(question_type: QuestionType, points: f64) -> Question {
        let now = Utc::now();
        Question {
            id: Uuid::new_v4(),
            assessment_id: Uuid::new_v4(),
            question_text: String::from("?"),
            question_type,
            points,
            order_index: 0,
            explanation: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn body(question_type: QuestionType, options: &[bool]) -> QuestionCreate {
        QuestionCreate {
            question_text: String::from("Is Rust memory safe?"),
            question_type,
            points: 1.0,
            order_index: None,
            explanation: None,
            options: options
                .iter()
                .enumerate()
                .map(|(i, correct)| QuestionOptionCreate {
                    option_text: format!("option {i}"),
                    is_correct: *correct,
                    explanation: None,
                })
                .collect(),
        }
    }

    #[test]
    fn option_rules_per_type() {
        assert!(body(QuestionType::MultipleChoice, &[true, false, false]).validate().is_ok());
        assert!(body(QuestionType::MultipleChoice, &[true]).validate().is_err());
        assert!(body(QuestionType::MultipleChoice, &[false, false]).validate().is_err());
        assert!(body(QuestionType::TrueFalse, &[true, false]).validate().is_ok());
        assert!(body(QuestionType::TrueFalse, &[true, false, false]).validate().is_err());
        assert!(body(QuestionType::ShortAnswer, &[]).validate().is_ok());
        assert!(body(QuestionType::ShortAnswer, &[true]).validate().is_err());
    }

    #[test]
    fn empty_option_text_is_rejected() {
        let mut data = body(QuestionType::TrueFalse, &[true, false]);
        data.options[0].option_text.clear();
        assert!(data.validate().is_err());
    }
}
