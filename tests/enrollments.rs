mod common;
use axum::http::StatusCode;

use crate::common::{
    Action, Flow, create_course_action, login_admin_action, login_as, publish_course_action,
    register_action, setup_server, setup_test_db,
};

fn enroll(key: &'static str) -> Action {
    Action::new("enroll", "POST", "")
        .with_dyn_path(move |ctx| format!("/enrollments/enroll/{}", ctx.id(key)))
}

fn course_get(key: &'static str) -> Action {
    Action::new("get course", "GET", "")
        .with_dyn_path(move |ctx| format!("/courses/{}", ctx.id(key)))
}

#[tokio::test]
async fn route_enrollment_capacity_test() {
    let db = setup_test_db().await;
    let mut server = setup_server(&db).await;

    // capacity of the course is two students
    Flow::new()
        .step(register_action("prof@example.com", "INSTRUCTOR"))
        .step(create_course_action("Databases").with_save_as("course"))
        .step(register_action("s1@example.com", "STUDENT"))
        .step(enroll("course").with_expect(StatusCode::BAD_REQUEST))
        .step(login_as("prof@example.com"))
        .step(publish_course_action("course"))
        .step(login_as("s1@example.com"))
        .step(
            enroll("course")
                .with_expect(StatusCode::CREATED)
                .assert_body(|body| {
                    assert_eq!(body["status"], "ACTIVE");
                    assert_eq!(body["progress_percentage"], 0.0);
                }),
        )
        .step(enroll("course").with_expect(StatusCode::CONFLICT))
        .step(register_action("s2@example.com", "STUDENT"))
        .step(enroll("course").with_expect(StatusCode::CREATED))
        .step(register_action("s3@example.com", "STUDENT"))
        .step(enroll("course").with_expect(StatusCode::CONFLICT))
        .step(course_get("course").assert_body(|body| assert_eq!(body["enrollment_count"], 2)))
        .step(
            Action::new("available slots", "GET", "/courses/available-slots")
                .assert_body(|body| assert_eq!(body.as_array().map(Vec::len), Some(0))),
        )
        .step(login_as("s1@example.com"))
        .step(
            Action::new("unenroll", "DELETE", "")
                .with_dyn_path(|ctx| format!("/enrollments/unenroll/{}", ctx.id("course")))
                .assert_body(|body| assert_eq!(body["status"], "DROPPED")),
        )
        .step(course_get("course").assert_body(|body| assert_eq!(body["enrollment_count"], 1)))
        .step(login_as("s3@example.com"))
        .step(enroll("course").with_expect(StatusCode::CREATED))
        .run(&mut server, db)
        .await;
}

#[tokio::test]
async fn route_enrollment_progress_test() {
    let db = setup_test_db().await;
    let mut server = setup_server(&db).await;

    Flow::new()
        .step(register_action("lead@example.com", "INSTRUCTOR"))
        .step(create_course_action("Networking").with_save_as("course"))
        .step(publish_course_action("course"))
        .step(register_action("learner@example.com", "STUDENT").with_save_as("student"))
        .step(enroll("course").with_expect(StatusCode::CREATED).with_save_as("enrollment"))
        .step(
            Action::new("check", "GET", "")
                .with_dyn_path(|ctx| format!("/enrollments/check/{}", ctx.id("course")))
                .assert_body(|body| assert_eq!(*body, serde_json::Value::Bool(true))),
        )
        .step(
            Action::new("my courses", "GET", "/enrollments/my-courses")
                .assert_body(|body| assert_eq!(body.as_array().map(Vec::len), Some(1))),
        )
        .step(
            Action::new("progress", "PUT", "")
                .with_dyn_path(|ctx| format!("/enrollments/{}/progress", ctx.id("enrollment")))
                .with_body(serde_json::json!({ "percentage": 40 }))
                .assert_body(|body| {
                    assert_eq!(body["progress_percentage"], 40.0);
                    assert_eq!(body["status"], "ACTIVE");
                }),
        )
        .step(
            Action::new("progress clamps", "PUT", "")
                .with_dyn_path(|ctx| format!("/enrollments/{}/progress", ctx.id("enrollment")))
                .with_body(serde_json::json!({ "percentage": 140 }))
                .assert_body(|body| {
                    assert_eq!(body["progress_percentage"], 100.0);
                    assert_eq!(body["status"], "COMPLETED");
                    assert!(body["completed_at"].is_string());
                }),
        )
        .step(
            Action::new("completion sticks", "PUT", "")
                .with_dyn_path(|ctx| format!("/enrollments/{}/progress", ctx.id("enrollment")))
                .with_body(serde_json::json!({ "percentage": 10 }))
                .assert_body(|body| assert_eq!(body["status"], "COMPLETED")),
        )
        .step(
            Action::new("own enrollments", "GET", "")
                .with_dyn_path(|ctx| format!("/enrollments/student/{}", ctx.id("student")))
                .assert_body(|body| assert_eq!(body["total"], 1)),
        )
        .step(
            Action::new("statistics need admin", "GET", "/enrollments/statistics")
                .with_expect(StatusCode::FORBIDDEN),
        )
        .step(login_admin_action())
        .step(
            Action::new("statistics", "GET", "/enrollments/statistics").assert_body(|body| {
                assert_eq!(body["total_enrollments"], 1);
                assert_eq!(body["completed_enrollments"], 1);
            }),
        )
        .run(&mut server, db)
        .await;
}

#[tokio::test]
async fn route_enrollment_instructor_views_test() {
    let db = setup_test_db().await;
    let mut server = setup_server(&db).await;

    Flow::new()
        .step(register_action("boss@example.com", "INSTRUCTOR"))
        .step(create_course_action("Compilers").with_save_as("course"))
        .step(publish_course_action("course"))
        .step(register_action("kid@example.com", "STUDENT"))
        .step(enroll("course").with_expect(StatusCode::CREATED).with_save_as("enrollment"))
        .step(
            Action::new("student cannot list course", "GET", "")
                .with_dyn_path(|ctx| format!("/enrollments/course/{}", ctx.id("course")))
                .with_expect(StatusCode::FORBIDDEN),
        )
        .step(login_as("boss@example.com"))
        .step(
            Action::new("course enrollments", "GET", "")
                .with_dyn_path(|ctx| format!("/enrollments/course/{}", ctx.id("course")))
                .assert_body(|body| assert_eq!(body["total"], 1)),
        )
        .step(
            Action::new("course students", "GET", "")
                .with_dyn_path(|ctx| format!("/enrollments/course/{}/students", ctx.id("course")))
                .assert_body(|body| assert_eq!(body[0]["email"], "kid@example.com")),
        )
        .step(
            Action::new("suspend", "PUT", "")
                .with_dyn_path(|ctx| format!("/enrollments/{}/status", ctx.id("enrollment")))
                .with_param("status", "SUSPENDED")
                .assert_body(|body| assert_eq!(body["status"], "SUSPENDED")),
        )
        .step(
            Action::new("suspended cannot complete", "PUT", "")
                .with_dyn_path(|ctx| format!("/enrollments/{}/status", ctx.id("enrollment")))
                .with_param("status", "COMPLETED")
                .with_expect(StatusCode::BAD_REQUEST),
        )
        .step(login_as("kid@example.com"))
        .step(
            Action::new("suspended progress", "PUT", "")
                .with_dyn_path(|ctx| format!("/enrollments/{}/progress", ctx.id("enrollment")))
                .with_body(serde_json::json!({ "percentage": 50 }))
                .with_expect(StatusCode::BAD_REQUEST),
        )
        .run(&mut server, db)
        .await;
}
