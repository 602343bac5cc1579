mod common;
use axum::http::StatusCode;
use serde_json::json;

use crate::common::{
    Action, Flow, create_course_action, login_admin_action, login_as, publish_course_action,
    register_action, setup_server, setup_test_db,
};

fn enroll(key: &'static str) -> Action {
    Action::new("enroll", "POST", "")
        .with_dyn_path(move |ctx| format!("/enrollments/enroll/{}", ctx.id(key)))
}

fn path_action(name: &'static str, method: &'static str, suffix: &'static str) -> Action {
    Action::new(name, method, "")
        .with_dyn_path(move |ctx| format!("/learning-paths/{}{}", ctx.id("path"), suffix))
}

#[tokio::test]
async fn route_user_admin_test() {
    let db = setup_test_db().await;
    let mut server = setup_server(&db).await;

    Flow::new()
        .step(register_action("mentor@example.com", "INSTRUCTOR"))
        .step(register_action("pupil@example.com", "STUDENT").with_save_as("pupil"))
        .step(
            Action::new("student listing users", "GET", "/api/users")
                .with_expect(StatusCode::FORBIDDEN),
        )
        .step(
            Action::new("own profile", "GET", "")
                .with_dyn_path(|ctx| format!("/api/users/{}", ctx.id("pupil"))),
        )
        .step(
            Action::new("promote self", "PUT", "")
                .with_dyn_path(|ctx| format!("/api/users/{}", ctx.id("pupil")))
                .with_body(json!({ "role": "ADMIN" }))
                .with_expect(StatusCode::FORBIDDEN),
        )
        .step(
            Action::new("update own bio", "PUT", "")
                .with_dyn_path(|ctx| format!("/api/users/{}", ctx.id("pupil")))
                .with_body(json!({ "bio": "Learning Rust", "city": "Lisbon" }))
                .assert_body(|body| {
                    assert_eq!(body["bio"], "Learning Rust");
                    assert_eq!(body["role"], "STUDENT");
                }),
        )
        .step(
            Action::new("email exists", "GET", "/api/users/email/pupil@example.com/exists")
                .with_clear_cookies(true)
                .assert_body(|body| assert_eq!(*body, json!(true))),
        )
        .step(
            Action::new("email unknown", "GET", "/api/users/email/nobody@example.com/exists")
                .assert_body(|body| assert_eq!(*body, json!(false))),
        )
        .step(login_as("mentor@example.com"))
        .step(
            Action::new("foreign profile", "GET", "")
                .with_dyn_path(|ctx| format!("/api/users/{}", ctx.id("pupil")))
                .with_expect(StatusCode::FORBIDDEN),
        )
        .step(login_admin_action())
        .step(
            Action::new("list", "GET", "/api/users")
                .assert_body(|body| assert_eq!(body["total"], 3)),
        )
        .step(
            Action::new("by role", "GET", "/api/users/role/INSTRUCTOR").assert_body(|body| {
                assert_eq!(body["total"], 1);
                assert_eq!(body["items"][0]["email"], "mentor@example.com");
            }),
        )
        .step(
            Action::new("search", "GET", "/api/users/search")
                .with_param("name", "stud")
                .assert_body(|body| assert_eq!(body["total"], 1)),
        )
        .step(
            Action::new("statistics", "GET", "/api/users/statistics").assert_body(|body| {
                assert_eq!(body["total_users"], 3);
                assert_eq!(body["students"], 1);
                assert_eq!(body["instructors"], 1);
                assert_eq!(body["admins"], 1);
            }),
        )
        .step(
            Action::new("promote", "PUT", "")
                .with_dyn_path(|ctx| format!("/api/users/{}", ctx.id("pupil")))
                .with_body(json!({ "role": "INSTRUCTOR" }))
                .assert_body(|body| assert_eq!(body["role"], "INSTRUCTOR")),
        )
        .step(
            Action::new("deactivate", "PATCH", "")
                .with_dyn_path(|ctx| format!("/api/users/{}/deactivate", ctx.id("pupil"))),
        )
        .step(
            Action::new("active users", "GET", "/api/users/active")
                .assert_body(|body| assert_eq!(body["total"], 2)),
        )
        .step(
            Action::new("delete", "DELETE", "")
                .with_dyn_path(|ctx| format!("/api/users/{}", ctx.id("pupil")))
                .with_expect(StatusCode::NO_CONTENT),
        )
        .step(
            Action::new("deleted", "GET", "")
                .with_dyn_path(|ctx| format!("/api/users/{}", ctx.id("pupil")))
                .with_expect(StatusCode::NOT_FOUND),
        )
        .run(&mut server, db)
        .await;
}

#[tokio::test]
async fn route_user_delete_releases_seats_test() {
    let db = setup_test_db().await;
    let mut server = setup_server(&db).await;

    // capacity of the course is two students
    Flow::new()
        .step(register_action("owner@example.com", "INSTRUCTOR"))
        .step(create_course_action("Operating Systems").with_save_as("course"))
        .step(publish_course_action("course"))
        .step(
            Action::new("create path", "POST", "/learning-paths")
                .with_body(json!({ "title": "Systems Programmer" }))
                .with_expect(StatusCode::CREATED)
                .with_save_as("path"),
        )
        .step(path_action("publish path", "PUT", "/publish"))
        .step(register_action("leaver@example.com", "STUDENT").with_save_as("leaver"))
        .step(enroll("course").with_expect(StatusCode::CREATED))
        .step(path_action("enroll path", "POST", "/enroll").with_expect(StatusCode::CREATED))
        .step(path_action("finish path", "PUT", "/progress").with_body(json!({ "percentage": 100 })))
        .step(register_action("stayer@example.com", "STUDENT"))
        .step(enroll("course").with_expect(StatusCode::CREATED))
        .step(path_action("enroll path", "POST", "/enroll").with_expect(StatusCode::CREATED))
        .step(register_action("waiting@example.com", "STUDENT"))
        .step(enroll("course").with_expect(StatusCode::CONFLICT))
        .step(login_admin_action())
        .step(
            Action::new("delete leaver", "DELETE", "")
                .with_dyn_path(|ctx| format!("/api/users/{}", ctx.id("leaver")))
                .with_expect(StatusCode::NO_CONTENT),
        )
        .step(
            Action::new("seat released", "GET", "")
                .with_dyn_path(|ctx| format!("/courses/{}", ctx.id("course")))
                .assert_body(|body| assert_eq!(body["enrollment_count"], 1)),
        )
        .step(path_action("path counters", "GET", "").assert_body(|body| {
            assert_eq!(body["enrollment_count"], 1);
            assert_eq!(body["completion_count"], 0);
        }))
        .step(login_as("waiting@example.com"))
        .step(enroll("course").with_expect(StatusCode::CREATED))
        .step(
            Action::new("course full again", "GET", "")
                .with_dyn_path(|ctx| format!("/courses/{}", ctx.id("course")))
                .assert_body(|body| assert_eq!(body["enrollment_count"], 2)),
        )
        .run(&mut server, db)
        .await;
}
