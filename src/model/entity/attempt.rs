use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, prelude::FromRow};
use uuid::Uuid;
use validator::Validate;

use crate::model::access::HasOwner;
use crate::model::entity::{Assessment, Question, QuestionOption};
use crate::model::repo::{ResourceType, ResourceTyped};
use crate::model::{
    AttemptStatus, DatabaseError, EnrollmentStatus, ModelManager, calc, entity::Enrollment,
    error::DatabaseResult,
};
use crate::web::AuthenticatedUser;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct AssessmentAttempt {
    id: Uuid,
    assessment_id: Uuid,
    student_id: Uuid,
    attempt_number: i32,
    status: AttemptStatus,
    started_at: DateTime<Utc>,
    submitted_at: Option<DateTime<Utc>>,
    score: Option<f64>,
    max_score: Option<f64>,
    percentage: Option<f64>,
    passed: Option<bool>,
    time_taken_minutes: Option<i32>,
    version: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, utoipa::ToSchema)]
pub struct StudentAnswer {
    id: Uuid,
    attempt_id: Uuid,
    question_id: Uuid,
    selected_option_id: Option<Uuid>,
    answer_text: Option<String>,
    is_correct: bool,
    points_earned: f64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate, utoipa::ToSchema)]
pub struct AnswerSubmit {
    pub question_id: Uuid,
    pub selected_option_id: Option<Uuid>,
    #[validate(length(max = 5000))]
    pub answer_text: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, utoipa::ToSchema)]
pub struct AnswerGrade {
    pub is_correct: bool,
    /// Defaults to the full points of the question when correct, 0 otherwise.
    #[validate(range(min = 0.0, message = "points must not be negative"))]
    pub points_earned: Option<f64>,
}

/// Grading outcome of an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, utoipa::ToSchema)]
pub struct AttemptScore {
    pub score: f64,
    pub max_score: f64,
    pub percentage: f64,
    pub passed: bool,
}

impl AttemptScore {
    /// Every question counts towards the maximum, answered or not. A correct answer
    /// earns its recorded points, capped at the question's points.
    pub fn compute(
        questions: &[Question],
        answers: &[StudentAnswer],
        passing_score: Option<f64>,
    ) -> Self {
        let max_score: f64 = questions.iter().map(|q| q.points()).sum();
        let score: f64 = questions
            .iter()
            .filter_map(|q| {
                answers
                    .iter()
                    .find(|a| a.question_id == q.id() && a.is_correct)
                    .map(|a| a.points_earned.clamp(0.0, q.points()))
            })
            .sum();

        let percentage = calc::percentage(score, max_score);
        Self {
            score,
            max_score,
            percentage,
            passed: calc::is_passing(percentage, passing_score),
        }
    }
}

impl ResourceTyped for AssessmentAttempt {
    fn get_resource_type() -> ResourceType {
        ResourceType::AssessmentAttempt
    }
}

impl ResourceTyped for StudentAnswer {
    fn get_resource_type() -> ResourceType {
        ResourceType::StudentAnswer
    }
}

impl AssessmentAttempt {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn assessment_id(&self) -> Uuid {
        self.assessment_id
    }

    pub fn student_id(&self) -> Uuid {
        self.student_id
    }

    pub fn attempt_number(&self) -> i32 {
        self.attempt_number
    }

    pub fn status(&self) -> AttemptStatus {
        self.status
    }

    /// Whether `actor` may see per-answer grading. Students wait for the submit,
    /// anyone else who passed [`Self::check_readable`] is grading the attempt.
    pub fn reveals_grading_to(&self, actor: &AuthenticatedUser) -> bool {
        self.status == AttemptStatus::Submitted || actor.user_id() != self.student_id
    }

    pub fn score(&self) -> Option<f64> {
        self.score
    }

    pub fn percentage(&self) -> Option<f64> {
        self.percentage
    }

    pub fn passed(&self) -> Option<bool> {
        self.passed
    }

    pub fn time_taken_minutes(&self) -> Option<i32> {
        self.time_taken_minutes
    }

    pub fn submit(&mut self, score: AttemptScore, now: DateTime<Utc>) {
        self.status = AttemptStatus::Submitted;
        self.submitted_at = Some(now);
        self.time_taken_minutes = Some((now - self.started_at).num_minutes().max(0) as i32);
        self.apply_score(score);
    }

    fn apply_score(&mut self, score: AttemptScore) {
        self.score = Some(score.score);
        self.max_score = Some(score.max_score);
        self.percentage = Some(score.percentage);
        self.passed = Some(score.passed);
    }

    async fn find_in(conn: &mut PgConnection, id: Uuid) -> DatabaseResult<Self> {
        let result: Option<Self> =
            sqlx::query_as("SELECT * FROM assessment_attempts WHERE id = $1")
                .bind(id)
                .fetch_optional(conn)
                .await?;
        result.ok_or(DatabaseError::NotFound(ResourceType::AssessmentAttempt))
    }

    async fn save(self, conn: &mut PgConnection) -> DatabaseResult<Self> {
        let result: Option<Self> = sqlx::query_as(
            r#"
            UPDATE assessment_attempts SET
                status = $1, submitted_at = $2, score = $3, max_score = $4, percentage = $5,
                passed = $6, time_taken_minutes = $7, version = version + 1, updated_at = now()
            WHERE id = $8 AND version = $9
            RETURNING *
            "#,
        )
        .bind(self.status)
        .bind(self.submitted_at)
        .bind(self.score)
        .bind(self.max_score)
        .bind(self.percentage)
        .bind(self.passed)
        .bind(self.time_taken_minutes)
        .bind(self.id)
        .bind(self.version)
        .fetch_optional(conn)
        .await?;

        result.ok_or(DatabaseError::StaleVersion(ResourceType::AssessmentAttempt))
    }

    async fn score_in(
        &self,
        conn: &mut PgConnection,
        passing_score: Option<f64>,
    ) -> DatabaseResult<AttemptScore> {
        let questions = Question::list_in(&mut *conn, self.assessment_id).await?;
        let answers: Vec<StudentAnswer> =
            sqlx::query_as("SELECT * FROM student_answers WHERE attempt_id = $1")
                .bind(self.id)
                .fetch_all(&mut *conn)
                .await?;
        Ok(AttemptScore::compute(&questions, &answers, passing_score))
    }

    /// Opens a new attempt for an enrolled student while the assessment is active.
    #[tracing::instrument(skip(mm, actor), fields(student = %actor.user_id()))]
    pub async fn start(
        mm: &ModelManager,
        actor: &AuthenticatedUser,
        assessment_id: Uuid,
    ) -> DatabaseResult<Self> {
        let mut tx = mm.begin().await?;

        let assessment = Assessment::find_in(&mut tx, assessment_id).await?;
        if !assessment.is_currently_active(Utc::now()) {
            return Err(DatabaseError::invalid_state("assessment is not currently active"));
        }

        let enrollment =
            Enrollment::find_for_in(&mut tx, actor.user_id(), assessment.course_id()).await?;
        match enrollment.map(|e| e.status()) {
            Some(EnrollmentStatus::Active | EnrollmentStatus::Completed) => {}
            _ => return Err(DatabaseError::Forbidden),
        }

        let taken: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM assessment_attempts WHERE assessment_id = $1 AND student_id = $2",
        )
        .bind(assessment_id)
        .bind(actor.user_id())
        .fetch_one(&mut *tx)
        .await?;

        if let Some(max) = assessment.max_attempts() {
            if taken >= i64::from(max) {
                return Err(DatabaseError::conflict("maximum number of attempts reached"));
            }
        }

        let attempt: Self = sqlx::query_as(
            r#"
            INSERT INTO assessment_attempts (id, assessment_id, student_id, attempt_number)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(assessment_id)
        .bind(actor.user_id())
        .bind(taken as i32 + 1)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| DatabaseError::unique_or(e, "attempt was started concurrently"))?;

        tx.commit().await?;
        Ok(attempt)
    }

    #[tracing::instrument(skip(mm, actor))]
    pub async fn submit_and_grade(
        mm: &ModelManager,
        actor: &AuthenticatedUser,
        id: Uuid,
    ) -> DatabaseResult<Self> {
        let mut tx = mm.begin().await?;

        let mut attempt = Self::find_in(&mut tx, id).await?;
        if attempt.student_id != actor.user_id() {
            return Err(DatabaseError::Forbidden);
        }
        if attempt.status == AttemptStatus::Submitted {
            return Err(DatabaseError::conflict("attempt has already been submitted"));
        }

        let assessment = Assessment::find_in(&mut tx, attempt.assessment_id).await?;
        let score = attempt.score_in(&mut tx, assessment.passing_score()).await?;
        attempt.submit(score, Utc::now());
        let attempt = attempt.save(&mut tx).await?;

        tx.commit().await?;
        tracing::debug!("attempt {} scored {:?}", attempt.id, attempt.percentage);
        Ok(attempt)
    }

    pub async fn find_by_id(
        mm: &ModelManager,
        _actor: &AuthenticatedUser,
        id: Uuid,
    ) -> DatabaseResult<Option<Self>> {
        let result = sqlx::query_as("SELECT * FROM assessment_attempts WHERE id = $1")
            .bind(id)
            .fetch_optional(mm.executor())
            .await?;
        Ok(result)
    }

    pub async fn list_for_student(
        mm: &ModelManager,
        actor: &AuthenticatedUser,
        assessment_id: Uuid,
    ) -> DatabaseResult<Vec<Self>> {
        let result = sqlx::query_as(
            r#"
            SELECT * FROM assessment_attempts
            WHERE assessment_id = $1 AND student_id = $2
            ORDER BY attempt_number
            "#,
        )
        .bind(assessment_id)
        .bind(actor.user_id())
        .fetch_all(mm.executor())
        .await?;
        Ok(result)
    }

    pub async fn answers(&self, mm: &ModelManager) -> DatabaseResult<Vec<StudentAnswer>> {
        let result = sqlx::query_as(
            "SELECT * FROM student_answers WHERE attempt_id = $1 ORDER BY created_at",
        )
        .bind(self.id)
        .fetch_all(mm.executor())
        .await?;
        Ok(result)
    }

    /// The student or the instructor of the course may read an attempt.
    pub async fn check_readable(
        &self,
        mm: &ModelManager,
        actor: &AuthenticatedUser,
    ) -> DatabaseResult<()> {
        if actor.is_admin() || actor.user_id() == self.student_id {
            return Ok(());
        }

        let mut conn = mm.executor().acquire().await?;
        let instructor = Assessment::instructor_in(&mut conn, self.assessment_id).await?;
        if instructor == actor.user_id() {
            Ok(())
        } else {
            Err(DatabaseError::Forbidden)
        }
    }
}

impl StudentAnswer {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn attempt_id(&self) -> Uuid {
        self.attempt_id
    }

    pub fn question_id(&self) -> Uuid {
        self.question_id
    }

    pub fn selected_option_id(&self) -> Option<Uuid> {
        self.selected_option_id
    }

    pub fn answer_text(&self) -> Option<&str> {
        self.answer_text.as_deref()
    }

    pub fn is_correct(&self) -> bool {
        self.is_correct
    }

    pub fn points_earned(&self) -> f64 {
        self.points_earned
    }

    /// Records or replaces the answer to one question while the attempt is open.
    ///
    /// Choice questions are graded on the spot, short answers wait for the instructor.
    #[tracing::instrument(skip(mm, actor, data), fields(question = %data.question_id))]
    pub async fn answer(
        mm: &ModelManager,
        actor: &AuthenticatedUser,
        attempt_id: Uuid,
        data: AnswerSubmit,
    ) -> DatabaseResult<Self> {
        let mut tx = mm.begin().await?;

        let attempt = AssessmentAttempt::find_in(&mut tx, attempt_id).await?;
        if attempt.student_id != actor.user_id() {
            return Err(DatabaseError::Forbidden);
        }
        if attempt.status != AttemptStatus::InProgress {
            return Err(DatabaseError::conflict("attempt has already been submitted"));
        }

        let question = Question::find_in(&mut tx, data.question_id).await?;
        if question.assessment_id() != attempt.assessment_id {
            return Err(DatabaseError::invalid_state(
                "question does not belong to this assessment",
            ));
        }

        let (is_correct, points_earned) = if question.question_type().is_auto_graded() {
            let Some(option_id) = data.selected_option_id else {
                return Err(DatabaseError::invalid_state("an option must be selected"));
            };
            let option = QuestionOption::find_in(&mut tx, option_id).await?;
            if option.question_id() != question.id() {
                return Err(DatabaseError::invalid_state(
                    "option does not belong to this question",
                ));
            }
            let points = if option.is_correct() { question.points() } else { 0.0 };
            (option.is_correct(), points)
        } else {
            (false, 0.0)
        };

        let answer: Self = sqlx::query_as(
            r#"
            INSERT INTO student_answers (id, attempt_id, question_id, selected_option_id, answer_text, is_correct, points_earned)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (attempt_id, question_id) DO UPDATE SET
                selected_option_id = EXCLUDED.selected_option_id,
                answer_text = EXCLUDED.answer_text,
                is_correct = EXCLUDED.is_correct,
                points_earned = EXCLUDED.points_earned,
                updated_at = now()
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(attempt_id)
        .bind(question.id())
        .bind(data.selected_option_id)
        .bind(&data.answer_text)
        .bind(is_correct)
        .bind(points_earned)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(answer)
    }

    /// Manual grading by the course instructor; a submitted attempt is re-scored.
    #[tracing::instrument(skip(mm, actor, data))]
    pub async fn grade(
        mm: &ModelManager,
        actor: &AuthenticatedUser,
        id: Uuid,
        data: AnswerGrade,
    ) -> DatabaseResult<Self> {
        let mut tx = mm.begin().await?;

        let found: Option<Self> = sqlx::query_as("SELECT * FROM student_answers WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        let answer = found.ok_or(DatabaseError::NotFound(ResourceType::StudentAnswer))?;

        let attempt = AssessmentAttempt::find_in(&mut tx, answer.attempt_id).await?;
        let instructor = Assessment::instructor_in(&mut tx, attempt.assessment_id).await?;
        if !actor.is_admin() && instructor != actor.user_id() {
            return Err(DatabaseError::Forbidden);
        }

        let question = Question::find_in(&mut tx, answer.question_id).await?;
        let points = match (data.is_correct, data.points_earned) {
            (false, _) => 0.0,
            (true, Some(points)) => points.clamp(0.0, question.points()),
            (true, None) => question.points(),
        };

        let answer: Self = sqlx::query_as(
            r#"
            UPDATE student_answers SET is_correct = $1, points_earned = $2, updated_at = now()
            WHERE id = $3
            RETURNING *
            "#,
        )
        .bind(data.is_correct)
        .bind(points)
        .bind(answer.id)
        .fetch_one(&mut *tx)
        .await?;

        if attempt.status == AttemptStatus::Submitted {
            let assessment = Assessment::find_in(&mut tx, attempt.assessment_id).await?;
            let mut attempt = attempt;
            let score = attempt.score_in(&mut tx, assessment.passing_score()).await?;
            attempt.apply_score(score);
            attempt.save(&mut tx).await?;
        }

        tx.commit().await?;
        Ok(answer)
    }
}

#[async_trait]
impl HasOwner for AssessmentAttempt {
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
    use crate::model::entity::question::test::question;
    use crate::model::{QuestionType, Role};

    fn answer(question: &Question, is_correct: bool) -> StudentAnswer {
        let now = Utc::now();
        StudentAnswer {
            id: Uuid::new_v4(),
            attempt_id: Uuid::new_v4(),
            question_id: question.id(),
            selected_option_id: None,
            answer_text: None,
            is_correct,
            points_earned: if is_correct { question.points() } else { 0.0 },
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn score_counts_correct_answers_over_all_questions() {
        let q1 = question(QuestionType::MultipleChoice, 2.0);
        let q2 = question(QuestionType::TrueFalse, 1.0);
        let q3 = question(QuestionType::ShortAnswer, 1.0); // unanswered

        let answers = vec![answer(&q1, true), answer(&q2, false)];
        let score = AttemptScore::compute(&[q1, q2, q3], &answers, Some(50.0));

        assert_eq!(score.score, 2.0);
        assert_eq!(score.max_score, 4.0);
        assert_eq!(score.percentage, 50.0);
        assert!(score.passed);
    }

    #[test]
    fn below_threshold_fails() {
        let q1 = question(QuestionType::MultipleChoice, 1.0);
        let q2 = question(QuestionType::MultipleChoice, 3.0);
        let answers = vec![answer(&q1, true), answer(&q2, false)];

        let score = AttemptScore::compute(&[q1, q2], &answers, Some(70.0));
        assert_eq!(score.percentage, 25.0);
        assert!(!score.passed);
    }

    #[test]
    fn empty_assessment_scores_zero_and_passes_without_threshold() {
        let score = AttemptScore::compute(&[], &[], None);
        assert_eq!(score.max_score, 0.0);
        assert_eq!(score.percentage, 0.0);
        assert!(score.passed);
    }

    #[test]
    fn graded_points_give_partial_credit() {
        let essay = question(QuestionType::ShortAnswer, 4.0);
        let quiz = question(QuestionType::TrueFalse, 1.0);
        let mut graded = answer(&essay, true);
        graded.points_earned = 2.5;
        let mut inflated = answer(&quiz, true);
        inflated.points_earned = 9.0;

        let score = AttemptScore::compute(&[essay, quiz], &[graded, inflated], None);
        assert_eq!(score.score, 3.5);
        assert_eq!(score.max_score, 5.0);
        assert_eq!(score.percentage, 70.0);
    }

    fn open_attempt(student_id: Uuid, started: DateTime<Utc>) -> AssessmentAttempt {
        AssessmentAttempt {
            id: Uuid::new_v4(),
            assessment_id: Uuid::new_v4(),
            student_id,
            attempt_number: 1,
            status: AttemptStatus::InProgress,
            started_at: started,
            submitted_at: None,
            score: None,
            max_score: None,
            percentage: None,
            passed: None,
            time_taken_minutes: None,
            version: 0,
            created_at: started,
            updated_at: started,
        }
    }

    #[test]
    fn grading_stays_hidden_from_the_student_until_submit() {
        let student = AuthenticatedUser::new(Uuid::new_v4(), Role::Student);
        let instructor = AuthenticatedUser::new(Uuid::new_v4(), Role::Instructor);
        let mut attempt = open_attempt(student.user_id(), Utc::now());

        assert!(!attempt.reveals_grading_to(&student));
        assert!(attempt.reveals_grading_to(&instructor));
        assert!(attempt.reveals_grading_to(&AuthenticatedUser::admin()));

        let score = AttemptScore { score: 1.0, max_score: 1.0, percentage: 100.0, passed: true };
        attempt.submit(score, Utc::now());
        assert!(attempt.reveals_grading_to(&student));
    }

    #[test]
    fn submit_records_time_taken() {
        let started = Utc::now() - Duration::minutes(42) - Duration::seconds(30);
        let mut attempt = open_attempt(Uuid::new_v4(), started);

        let score = AttemptScore { score: 3.0, max_score: 4.0, percentage: 75.0, passed: true };
        attempt.submit(score, Utc::now());

        assert_eq!(attempt.status(), AttemptStatus::Submitted);
        assert_eq!(attempt.time_taken_minutes(), Some(42));
        assert_eq!(attempt.percentage(), Some(75.0));
        assert_eq!(attempt.passed(), Some(true));
    }
}
