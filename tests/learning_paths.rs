mod common;
use axum::http::StatusCode;
use serde_json::json;

use crate::common::{
    Action, Flow, create_course_action, login_as, register_action, setup_server, setup_test_db,
};

fn path_action(name: &'static str, method: &'static str, suffix: &'static str) -> Action {
    Action::new(name, method, "").with_dyn_path(move |ctx| {
        format!("/learning-paths/{}{}", ctx.id("path"), suffix)
    })
}

fn link_course(method: &'static str, key: &'static str) -> Action {
    Action::new("link course", method, "").with_dyn_path(move |ctx| {
        format!("/learning-paths/{}/courses/{}", ctx.id("path"), ctx.id(key))
    })
}

#[tokio::test]
async fn route_learning_path_courses_test() {
    let db = setup_test_db().await;
    let mut server = setup_server(&db).await;

    Flow::new()
        .step(register_action("curator@example.com", "INSTRUCTOR"))
        .step(create_course_action("Basics").with_save_as("first"))
        .step(create_course_action("Advanced").with_save_as("second"))
        .step(
            Action::new("create path", "POST", "/learning-paths")
                .with_body(json!({
                    "title": "Backend Engineer",
                    "description": "From zero to services",
                    "tags": ["backend", "rust"],
                }))
                .with_expect(StatusCode::CREATED)
                .with_save_as("path")
                .assert_body(|body| {
                    assert_eq!(body["is_published"], false);
                    assert_eq!(body["enrollment_count"], 0);
                }),
        )
        .step(link_course("POST", "second"))
        .step(
            link_course("POST", "first").assert_body(|body| {
                let courses = body["courses"].as_array().expect("courses");
                assert_eq!(courses.len(), 2);
                assert_eq!(courses[0]["title"], "Advanced");
                assert_eq!(courses[1]["title"], "Basics");
            }),
        )
        .step(link_course("POST", "first").with_expect(StatusCode::CONFLICT))
        .step(
            link_course("DELETE", "second").assert_body(|body| {
                let courses = body["courses"].as_array().expect("courses");
                assert_eq!(courses.len(), 1);
                assert_eq!(courses[0]["title"], "Basics");
            }),
        )
        .step(link_course("DELETE", "second").with_expect(StatusCode::NOT_FOUND))
        .step(
            Action::new("unpublished search", "GET", "/learning-paths/search")
                .with_param("query", "rust")
                .assert_body(|body| assert_eq!(body["total"], 0)),
        )
        .step(path_action("publish", "PUT", "/publish").assert_body(|body| {
            assert_eq!(body["is_published"], true);
        }))
        .step(
            Action::new("search by tag", "GET", "/learning-paths/search")
                .with_clear_cookies(true)
                .with_param("query", "rust")
                .assert_body(|body| assert_eq!(body["total"], 1)),
        )
        .step(path_action("public details", "GET", "").assert_body(|body| {
            assert_eq!(body["title"], "Backend Engineer");
            assert_eq!(body["completion_rate"], 0.0);
        }))
        .run(&mut server, db)
        .await;
}

#[tokio::test]
async fn route_learning_path_enrollment_test() {
    let db = setup_test_db().await;
    let mut server = setup_server(&db).await;

    Flow::new()
        .step(register_action("mentor@example.com", "INSTRUCTOR"))
        .step(
            Action::new("create path", "POST", "/learning-paths")
                .with_body(json!({ "title": "Data Engineer" }))
                .with_expect(StatusCode::CREATED)
                .with_save_as("path"),
        )
        .step(register_action("walker@example.com", "STUDENT"))
        .step(path_action("draft is hidden", "GET", "").with_expect(StatusCode::FORBIDDEN))
        .step(path_action("enroll draft", "POST", "/enroll").with_expect(StatusCode::BAD_REQUEST))
        .step(
            path_action("student cannot publish", "PUT", "/publish")
                .with_expect(StatusCode::FORBIDDEN),
        )
        .step(login_as("mentor@example.com"))
        .step(path_action("publish", "PUT", "/publish"))
        .step(login_as("walker@example.com"))
        .step(
            path_action("enroll", "POST", "/enroll")
                .with_expect(StatusCode::CREATED)
                .assert_body(|body| assert_eq!(body["progress_percentage"], 0.0)),
        )
        .step(path_action("enroll twice", "POST", "/enroll").with_expect(StatusCode::CONFLICT))
        .step(
            path_action("halfway", "PUT", "/progress")
                .with_body(json!({ "percentage": 50 }))
                .assert_body(|body| assert!(body["completed_at"].is_null())),
        )
        .step(
            path_action("finish", "PUT", "/progress")
                .with_body(json!({ "percentage": 100 }))
                .assert_body(|body| assert!(body["completed_at"].is_string())),
        )
        .step(path_action("counters", "GET", "").assert_body(|body| {
            assert_eq!(body["enrollment_count"], 1);
            assert_eq!(body["completion_count"], 1);
            assert_eq!(body["completion_rate"], 100.0);
        }))
        .step(register_action("idle@example.com", "STUDENT"))
        .step(
            path_action("progress without enrollment", "PUT", "/progress")
                .with_body(json!({ "percentage": 10 }))
                .with_expect(StatusCode::NOT_FOUND),
        )
        .run(&mut server, db)
        .await;
}
