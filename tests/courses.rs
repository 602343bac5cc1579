mod common;
use axum::http::StatusCode;
use serde_json::json;

use crate::common::{
    Action, Flow, create_course_action, login_as, publish_course_action, register_action,
    setup_server, setup_test_db,
};

#[tokio::test]
async fn route_course_lifecycle_test() {
    let db = setup_test_db().await;
    let mut server = setup_server(&db).await;

    Flow::new()
        .step(register_action("teacher@example.com", "INSTRUCTOR").with_save_as("teacher"))
        .step(
            create_course_action("Rust for Beginners")
                .with_save_as("course")
                .assert_body(|body| {
                    assert_eq!(body["status"], "DRAFT");
                    assert_eq!(body["enrollment_count"], 0);
                    assert!(body["rating"].is_null());
                }),
        )
        .step(
            Action::new("drafts are not published", "GET", "/courses/published")
                .with_clear_cookies(true)
                .assert_body(|body| assert_eq!(body["total"], 0)),
        )
        .step(login_as("teacher@example.com"))
        .step(
            publish_course_action("course")
                .assert_body(|body| assert_eq!(body["status"], "PUBLISHED")),
        )
        .step(
            Action::new("update", "PUT", "")
                .with_dyn_path(|ctx| format!("/courses/{}", ctx.id("course")))
                .with_body(json!({
                    "title": "Rust for Everyone",
                    "max_students": 10,
                }))
                .assert_body(|body| {
                    assert_eq!(body["title"], "Rust for Everyone");
                    assert_eq!(body["status"], "PUBLISHED");
                }),
        )
        .step(
            Action::new("published list", "GET", "/courses/published")
                .with_clear_cookies(true)
                .assert_body(|body| {
                    assert_eq!(body["total"], 1);
                    assert_eq!(body["items"][0]["title"], "Rust for Everyone");
                }),
        )
        .step(
            Action::new("search", "GET", "/courses/search")
                .with_param("query", "everyone")
                .assert_body(|body| assert_eq!(body["total"], 1)),
        )
        .step(
            Action::new("search miss", "GET", "/courses/search")
                .with_param("query", "haskell")
                .assert_body(|body| assert_eq!(body["total"], 0)),
        )
        .step(
            Action::new("public get", "GET", "")
                .with_dyn_path(|ctx| format!("/courses/{}", ctx.id("course")))
                .assert_body_ctx(|body, ctx| {
                    assert_eq!(body["instructor_id"].as_str(), Some(ctx.id("teacher").as_str()));
                }),
        )
        .step(
            Action::new("missing course", "GET", "/courses/00000000-0000-0000-0000-000000000001")
                .with_expect(StatusCode::NOT_FOUND)
                .assert_body(|body| assert_eq!(body["status_code"], "404")),
        )
        .run(&mut server, db)
        .await;
}

#[tokio::test]
async fn route_course_permissions_test() {
    let db = setup_test_db().await;
    let mut server = setup_server(&db).await;

    Flow::new()
        .step(register_action("owner@example.com", "INSTRUCTOR"))
        .step(create_course_action("Owned").with_save_as("course"))
        .step(register_action("other@example.com", "INSTRUCTOR"))
        .step(
            Action::new("foreign update", "PUT", "")
                .with_dyn_path(|ctx| format!("/courses/{}", ctx.id("course")))
                .with_body(json!({ "title": "Stolen" }))
                .with_expect(StatusCode::FORBIDDEN),
        )
        .step(publish_course_action("course").with_expect(StatusCode::FORBIDDEN))
        .step(register_action("pupil@example.com", "STUDENT"))
        .step(create_course_action("Not allowed").with_expect(StatusCode::FORBIDDEN))
        .step(
            Action::new("anonymous create", "POST", "/courses")
                .with_clear_cookies(true)
                .with_body(json!({ "title": "Anonymous" }))
                .with_expect(StatusCode::UNAUTHORIZED),
        )
        .step(login_as("owner@example.com"))
        .step(
            Action::new("owner delete", "DELETE", "")
                .with_dyn_path(|ctx| format!("/courses/{}", ctx.id("course")))
                .with_expect(StatusCode::NO_CONTENT),
        )
        .step(
            Action::new("deleted", "GET", "")
                .with_dyn_path(|ctx| format!("/courses/{}", ctx.id("course")))
                .with_expect(StatusCode::NOT_FOUND),
        )
        .run(&mut server, db)
        .await;
}

#[tokio::test]
async fn route_course_contents_and_rating_test() {
    let db = setup_test_db().await;
    let mut server = setup_server(&db).await;

    Flow::new()
        .step(register_action("author@example.com", "INSTRUCTOR"))
        .step(create_course_action("Systems").with_save_as("course"))
        .step(publish_course_action("course"))
        .step(
            Action::new("add content", "POST", "")
                .with_dyn_path(|ctx| format!("/courses/{}/contents", ctx.id("course")))
                .with_body(json!({
                    "title": "Ownership",
                    "content_type": "VIDEO",
                    "content_url": "https://videos.example.com/ownership",
                    "duration_minutes": 12,
                }))
                .with_expect(StatusCode::CREATED)
                .with_save_as("content"),
        )
        .step(
            Action::new("bad content url", "POST", "")
                .with_dyn_path(|ctx| format!("/courses/{}/contents", ctx.id("course")))
                .with_body(json!({
                    "title": "Borrowing",
                    "content_type": "VIDEO",
                    "content_url": "not a url",
                }))
                .with_expect(StatusCode::BAD_REQUEST),
        )
        .step(register_action("learner@example.com", "STUDENT"))
        .step(
            Action::new("rate before enrolling", "POST", "")
                .with_dyn_path(|ctx| format!("/courses/{}/rating", ctx.id("course")))
                .with_body(json!({ "rating": 5 }))
                .with_expect(StatusCode::FORBIDDEN),
        )
        .step(
            Action::new("enroll", "POST", "")
                .with_dyn_path(|ctx| format!("/enrollments/enroll/{}", ctx.id("course")))
                .with_expect(StatusCode::CREATED),
        )
        .step(
            Action::new("rating out of range", "POST", "")
                .with_dyn_path(|ctx| format!("/courses/{}/rating", ctx.id("course")))
                .with_body(json!({ "rating": 6 }))
                .with_expect(StatusCode::BAD_REQUEST),
        )
        .step(
            Action::new("rate", "POST", "")
                .with_dyn_path(|ctx| format!("/courses/{}/rating", ctx.id("course")))
                .with_body(json!({ "rating": 4 }))
                .assert_body(|body| {
                    assert_eq!(body["rating"], 4.0);
                    assert_eq!(body["review_count"], 1);
                }),
        )
        .step(
            Action::new("contents", "GET", "")
                .with_dyn_path(|ctx| format!("/courses/{}/contents", ctx.id("course")))
                .assert_body(|body| {
                    let items = body.as_array().expect("content list");
                    assert_eq!(items.len(), 1);
                    assert_eq!(items[0]["title"], "Ownership");
                }),
        )
        .run(&mut server, db)
        .await;
}

#[tokio::test]
async fn route_course_stale_update_test() {
    let db = setup_test_db().await;
    let mut server = setup_server(&db).await;

    Flow::new()
        .step(register_action("editor@example.com", "INSTRUCTOR"))
        .step(create_course_action("Distributed Systems").with_save_as("course"))
        .step(
            Action::new("first edit", "PUT", "")
                .with_dyn_path(|ctx| format!("/courses/{}", ctx.id("course")))
                .with_dyn_body(|ctx| {
                    json!({ "title": "Distributed Systems I", "version": ctx.get("course")["version"] })
                })
                .assert_body_ctx(|body, ctx| {
                    assert_eq!(body["title"], "Distributed Systems I");
                    assert_ne!(body["version"], ctx.get("course")["version"]);
                }),
        )
        .step(
            Action::new("edit from stale copy", "PUT", "")
                .with_dyn_path(|ctx| format!("/courses/{}", ctx.id("course")))
                .with_dyn_body(|ctx| {
                    json!({ "title": "Lost update", "version": ctx.get("course")["version"] })
                })
                .with_expect(StatusCode::CONFLICT)
                .assert_body(|body| assert_eq!(body["status_code"], "409")),
        )
        .step(
            Action::new("first edit kept", "GET", "")
                .with_dyn_path(|ctx| format!("/courses/{}", ctx.id("course")))
                .assert_body(|body| assert_eq!(body["title"], "Distributed Systems I")),
        )
        .run(&mut server, db)
        .await;
}

#[tokio::test]
async fn route_malformed_parameters_test() {
    let db = setup_test_db().await;
    let mut server = setup_server(&db).await;

    Flow::new()
        .step(register_action("typo@example.com", "INSTRUCTOR"))
        .step(
            Action::new("id is not a uuid", "GET", "/courses/not-a-uuid")
                .with_expect(StatusCode::BAD_REQUEST)
                .assert_body(|body| {
                    assert_eq!(body["status_code"], "400");
                    let message = body["message"].as_str().expect("message");
                    assert!(message.starts_with("Malformed request parameters"));
                }),
        )
        .step(
            Action::new("page is not a number", "GET", "/courses")
                .with_param("page", "first")
                .with_expect(StatusCode::BAD_REQUEST)
                .assert_body(|body| assert_eq!(body["status_code"], "400")),
        )
        .run(&mut server, db)
        .await;
}
