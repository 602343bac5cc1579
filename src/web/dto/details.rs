use serde::Serialize;
use uuid::Uuid;

use crate::model::entity::{
    Assessment, AssessmentAttempt, Course, LearningPath, Question, QuestionOption, StudentAnswer,
};

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct LearningPathDetails {
    #[serde(flatten)]
    pub path: LearningPath,
    pub courses: Vec<Course>,
    pub completion_rate: f64,
}

impl LearningPathDetails {
    pub fn new(path: LearningPath, courses: Vec<Course>) -> Self {
        let completion_rate = path.completion_rate();
        Self {
            path,
            courses,
            completion_rate,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct OptionView {
    pub id: Uuid,
    pub option_text: String,
    pub order_index: i32,
    /// Present for the course owner only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_correct: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl OptionView {
    fn new(option: &QuestionOption, reveal: bool) -> Self {
        Self {
            id: option.id(),
            option_text: option.option_text().to_string(),
            order_index: option.order_index(),
            is_correct: reveal.then(|| option.is_correct()),
            explanation: reveal
                .then(|| option.explanation().map(str::to_string))
                .flatten(),
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct QuestionView {
    #[serde(flatten)]
    pub question: Question,
    pub options: Vec<OptionView>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct AssessmentDetails {
    #[serde(flatten)]
    pub assessment: Assessment,
    pub questions: Vec<QuestionView>,
}

impl AssessmentDetails {
    /// Groups `options` under their questions; `reveal` exposes the answer key.
    pub fn new(
        assessment: Assessment,
        questions: Vec<Question>,
        options: &[QuestionOption],
        reveal: bool,
    ) -> Self {
        let questions = questions
            .into_iter()
            .map(|question| QuestionView {
                options: options
                    .iter()
                    .filter(|o| o.question_id() == question.id())
                    .map(|o| OptionView::new(o, reveal))
                    .collect(),
                question,
            })
            .collect();

        Self {
            assessment,
            questions,
        }
    }
}

/// A freshly created question with its full answer key.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct QuestionDetails {
    #[serde(flatten)]
    pub question: Question,
    pub options: Vec<QuestionOption>,
}

/// An answer as its student sees it; grading shows up once revealed.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct AnswerView {
    pub id: Uuid,
    pub question_id: Uuid,
    pub selected_option_id: Option<Uuid>,
    pub answer_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_correct: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points_earned: Option<f64>,
}

impl AnswerView {
    pub fn new(answer: StudentAnswer, reveal: bool) -> Self {
        Self {
            id: answer.id(),
            question_id: answer.question_id(),
            selected_option_id: answer.selected_option_id(),
            is_correct: reveal.then(|| answer.is_correct()),
            points_earned: reveal.then(|| answer.points_earned()),
            answer_text: answer.answer_text().map(str::to_string),
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct AttemptDetails {
    #[serde(flatten)]
    pub attempt: AssessmentAttempt,
    pub answers: Vec<AnswerView>,
}

impl AttemptDetails {
    pub fn new(attempt: AssessmentAttempt, answers: Vec<StudentAnswer>, reveal: bool) -> Self {
        let answers = answers
            .into_iter()
            .map(|answer| AnswerView::new(answer, reveal))
            .collect();
        Self { attempt, answers }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::QuestionType;

    fn option(question_id: Uuid, is_correct: bool) -> QuestionOption {
        serde_json::from_value(serde_json::json!({
            "id": Uuid::new_v4(),
            "question_id": question_id,
            "option_text": "yes",
            "is_correct": is_correct,
            "order_index": 0,
            "explanation": "because",
            "created_at": "2025-01-01T00:00:00Z",
            "updated_at": "2025-01-01T00:00:00Z",
        }))
        .unwrap()
    }

    fn question() -> Question {
        serde_json::from_value(serde_json::json!({
            "id": Uuid::new_v4(),
            "assessment_id": Uuid::new_v4(),
            "question_text": "Is it?",
            "question_type": QuestionType::TrueFalse,
            "points": 1.0,
            "order_index": 0,
            "explanation": null,
            "created_at": "2025-01-01T00:00:00Z",
            "updated_at": "2025-01-01T00:00:00Z",
        }))
        .unwrap()
    }

    fn assessment() -> Assessment {
        serde_json::from_value(serde_json::json!({
            "id": Uuid::new_v4(),
            "course_id": Uuid::new_v4(),
            "content_id": null,
            "title": "Quiz",
            "description": null,
            "time_limit_minutes": null,
            "max_attempts": null,
            "passing_score": 60.0,
            "is_active": true,
            "start_date": null,
            "end_date": null,
            "instructions": null,
            "created_at": "2025-01-01T00:00:00Z",
            "updated_at": "2025-01-01T00:00:00Z",
        }))
        .unwrap()
    }

    #[test]
    fn answer_key_is_hidden_unless_revealed() {
        let q = question();
        let options = vec![option(q.id(), true), option(q.id(), false), option(Uuid::new_v4(), true)];

        let hidden = AssessmentDetails::new(assessment(), vec![q.clone()], &options, false);
        assert_eq!(hidden.questions[0].options.len(), 2);
        let json = serde_json::to_value(&hidden).unwrap();
        let first = &json["questions"][0]["options"][0];
        assert!(first.get("is_correct").is_none());
        assert!(first.get("explanation").is_none());

        let shown = AssessmentDetails::new(assessment(), vec![q], &options, true);
        assert_eq!(shown.questions[0].options[0].is_correct, Some(true));
    }

    fn student_answer(is_correct: bool) -> StudentAnswer {
        serde_json::from_value(serde_json::json!({
            "id": Uuid::new_v4(),
            "attempt_id": Uuid::new_v4(),
            "question_id": Uuid::new_v4(),
            "selected_option_id": Uuid::new_v4(),
            "answer_text": null,
            "is_correct": is_correct,
            "points_earned": 2.0,
            "created_at": "2025-01-01T00:00:00Z",
            "updated_at": "2025-01-01T00:00:00Z",
        }))
        .unwrap()
    }

    #[test]
    fn open_answers_do_not_carry_grading() {
        let json = serde_json::to_value(AnswerView::new(student_answer(true), false)).unwrap();
        assert!(json.get("is_correct").is_none());
        assert!(json.get("points_earned").is_none());
        assert!(json["selected_option_id"].is_string());

        let json = serde_json::to_value(AnswerView::new(student_answer(false), true)).unwrap();
        assert_eq!(json["is_correct"], false);
        assert_eq!(json["points_earned"], 2.0);
    }
}
