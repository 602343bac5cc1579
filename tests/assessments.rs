mod common;
use axum::http::StatusCode;
use serde_json::{Value, json};

use crate::common::{
    Action, Flow, FlowContext, create_course_action, login_as, publish_course_action,
    register_action, setup_server, setup_test_db,
};

fn option_id(ctx: &FlowContext, question: &str, correct: bool) -> Value {
    ctx.get(question)["options"]
        .as_array()
        .expect("options")
        .iter()
        .find(|o| o["is_correct"] == correct)
        .map(|o| o["id"].clone())
        .expect("matching option")
}

fn start_attempt_action(key: &'static str) -> Action {
    Action::new("start attempt", "POST", "")
        .with_dyn_path(|ctx| format!("/assessments/{}/attempts", ctx.id("quiz")))
        .with_expect(StatusCode::CREATED)
        .with_save_as(key)
}

fn choose_action(attempt: &'static str, correct: bool) -> Action {
    Action::new("choose option", "POST", "")
        .with_dyn_path(move |ctx| format!("/attempts/{}/answers", ctx.id(attempt)))
        .with_dyn_body(move |ctx| {
            json!({
                "question_id": ctx.get("mc")["id"],
                "selected_option_id": option_id(ctx, "mc", correct),
            })
        })
}

fn submit_action(attempt: &'static str) -> Action {
    Action::new("submit", "POST", "")
        .with_dyn_path(move |ctx| format!("/attempts/{}/submit", ctx.id(attempt)))
}

fn attempt_get(attempt: &'static str) -> Action {
    Action::new("get attempt", "GET", "")
        .with_dyn_path(move |ctx| format!("/attempts/{}", ctx.id(attempt)))
}

#[tokio::test]
async fn route_assessment_flow_test() {
    let db = setup_test_db().await;
    let mut server = setup_server(&db).await;

    Flow::new()
        .step(register_action("examiner@example.com", "INSTRUCTOR"))
        .step(create_course_action("Compilers").with_save_as("course"))
        .step(publish_course_action("course"))
        .step(
            Action::new("create assessment", "POST", "")
                .with_dyn_path(|ctx| format!("/courses/{}/assessments", ctx.id("course")))
                .with_body(json!({
                    "title": "Parsing quiz",
                    "max_attempts": 2,
                    "passing_score": 60.0,
                }))
                .with_expect(StatusCode::CREATED)
                .with_save_as("quiz"),
        )
        .step(
            Action::new("invalid question", "POST", "")
                .with_dyn_path(|ctx| format!("/assessments/{}/questions", ctx.id("quiz")))
                .with_body(json!({
                    "question_text": "Pick one",
                    "question_type": "MULTIPLE_CHOICE",
                    "options": [{ "option_text": "only", "is_correct": true }],
                }))
                .with_expect(StatusCode::BAD_REQUEST),
        )
        .step(
            Action::new("multiple choice", "POST", "")
                .with_dyn_path(|ctx| format!("/assessments/{}/questions", ctx.id("quiz")))
                .with_body(json!({
                    "question_text": "Which parser handles left recursion?",
                    "question_type": "MULTIPLE_CHOICE",
                    "points": 2.0,
                    "options": [
                        { "option_text": "LR", "is_correct": true },
                        { "option_text": "Naive recursive descent" },
                        { "option_text": "LL(1)" },
                    ],
                }))
                .with_expect(StatusCode::CREATED)
                .with_save_as("mc")
                .assert_body(|body| assert_eq!(body["options"].as_array().map(Vec::len), Some(3))),
        )
        .step(
            Action::new("short answer", "POST", "")
                .with_dyn_path(|ctx| format!("/assessments/{}/questions", ctx.id("quiz")))
                .with_body(json!({
                    "question_text": "Define a grammar",
                    "question_type": "SHORT_ANSWER",
                    "points": 1.0,
                }))
                .with_expect(StatusCode::CREATED)
                .with_save_as("essay"),
        )
        .step(register_action("examinee@example.com", "STUDENT"))
        .step(
            Action::new("answer key hidden", "GET", "")
                .with_dyn_path(|ctx| format!("/assessments/{}", ctx.id("quiz")))
                .assert_body(|body| {
                    let questions = body["questions"].as_array().expect("questions");
                    assert_eq!(questions.len(), 2);
                    for question in questions {
                        for option in question["options"].as_array().expect("options") {
                            assert!(option.get("is_correct").is_none());
                        }
                    }
                }),
        )
        .step(start_attempt_action("attempt").with_expect(StatusCode::FORBIDDEN))
        .step(
            Action::new("enroll", "POST", "")
                .with_dyn_path(|ctx| format!("/enrollments/enroll/{}", ctx.id("course")))
                .with_expect(StatusCode::CREATED),
        )
        .step(start_attempt_action("attempt").assert_body(|body| {
            assert_eq!(body["attempt_number"], 1);
            assert_eq!(body["status"], "IN_PROGRESS");
        }))
        .step(choose_action("attempt", false))
        .step(choose_action("attempt", true).assert_body(|body| {
            assert!(body["question_id"].is_string());
            assert!(body.get("is_correct").is_none());
            assert!(body.get("points_earned").is_none());
        }))
        .step(
            Action::new("answer essay", "POST", "")
                .with_dyn_path(|ctx| format!("/attempts/{}/answers", ctx.id("attempt")))
                .with_dyn_body(|ctx| {
                    json!({
                        "question_id": ctx.get("essay")["id"],
                        "answer_text": "A set of productions over terminals and nonterminals",
                    })
                })
                .with_save_as("essay_answer")
                .assert_body(|body| assert!(body.get("is_correct").is_none())),
        )
        .step(attempt_get("attempt").assert_body(|body| {
            let answers = body["answers"].as_array().expect("answers");
            assert_eq!(answers.len(), 2);
            for answer in answers {
                assert!(answer.get("is_correct").is_none());
                assert!(answer.get("points_earned").is_none());
            }
        }))
        .step(submit_action("attempt").assert_body(|body| {
            assert_eq!(body["status"], "SUBMITTED");
            assert_eq!(body["score"], 2.0);
            assert_eq!(body["max_score"], 3.0);
            assert_eq!(body["passed"], true);
        }))
        .step(attempt_get("attempt").assert_body(|body| {
            let answers = body["answers"].as_array().expect("answers");
            assert!(answers.iter().any(|a| a["is_correct"] == true && a["points_earned"] == 2.0));
        }))
        .step(submit_action("attempt").with_expect(StatusCode::CONFLICT))
        .step(choose_action("attempt", true).with_expect(StatusCode::CONFLICT))
        .step(start_attempt_action("retry"))
        .step(choose_action("retry", false))
        .step(submit_action("retry").assert_body(|body| {
            assert_eq!(body["score"], 0.0);
            assert_eq!(body["passed"], false);
        }))
        .step(start_attempt_action("third").with_expect(StatusCode::CONFLICT))
        .step(
            Action::new("own attempts", "GET", "")
                .with_dyn_path(|ctx| format!("/assessments/{}/attempts", ctx.id("quiz")))
                .assert_body(|body| {
                    let attempts = body.as_array().expect("attempts");
                    assert_eq!(attempts.len(), 2);
                    assert_eq!(attempts[0]["attempt_number"], 1);
                }),
        )
        .step(
            Action::new("student grading", "PUT", "")
                .with_dyn_path(|ctx| {
                    format!("/attempts/answers/{}/grade", ctx.id("essay_answer"))
                })
                .with_body(json!({ "is_correct": true }))
                .with_expect(StatusCode::FORBIDDEN),
        )
        .step(register_action("peer@example.com", "STUDENT"))
        .step(attempt_get("attempt").with_expect(StatusCode::FORBIDDEN))
        .step(login_as("examiner@example.com"))
        .step(attempt_get("attempt").assert_body(|body| {
            let answers = body["answers"].as_array().expect("answers");
            assert_eq!(answers.len(), 2);
            assert!(answers.iter().all(|a| a["is_correct"].is_boolean()));
        }))
        .step(
            Action::new("grade essay", "PUT", "")
                .with_dyn_path(|ctx| {
                    format!("/attempts/answers/{}/grade", ctx.id("essay_answer"))
                })
                .with_body(json!({ "is_correct": true, "points_earned": 5.0 }))
                .assert_body(|body| assert_eq!(body["points_earned"], 1.0)),
        )
        .step(attempt_get("attempt").assert_body(|body| {
            assert_eq!(body["score"], 3.0);
            assert_eq!(body["percentage"], 100.0);
        }))
        .step(
            Action::new("answer key for owner", "GET", "")
                .with_dyn_path(|ctx| format!("/assessments/{}", ctx.id("quiz")))
                .assert_body(|body| {
                    let options = body["questions"][0]["options"].as_array().expect("options");
                    assert!(options.iter().any(|o| o["is_correct"] == true));
                }),
        )
        .run(&mut server, db)
        .await;
}
