mod common;
use axum::http::StatusCode;
use serde_json::json;

use crate::common::{Action, Flow, login_as, register_action, setup_server, setup_test_db};

fn module_action(name: &'static str, method: &'static str, suffix: &'static str) -> Action {
    Action::new(name, method, "")
        .with_dyn_path(move |ctx| format!("/modules/{}{}", ctx.id("module"), suffix))
}

fn create_module_action() -> Action {
    Action::new("create module", "POST", "/modules")
        .with_body(json!({
            "title": "Async Rust",
            "description": "Futures, executors and pinning",
            "subject": "programming",
            "level": "advanced",
            "estimated_duration_minutes": 90,
            "tags": ["async"],
        }))
        .with_expect(StatusCode::CREATED)
        .with_save_as("module")
}

#[tokio::test]
async fn route_module_visibility_test() {
    let db = setup_test_db().await;
    let mut server = setup_server(&db).await;

    Flow::new()
        .step(register_action("maker@example.com", "INSTRUCTOR"))
        .step(create_module_action().assert_body(|body| assert_eq!(body["is_published"], false)))
        .step(module_action("creator sees draft", "GET", ""))
        .step(
            Action::new("mine", "GET", "/modules/mine")
                .assert_body(|body| assert_eq!(body.as_array().map(Vec::len), Some(1))),
        )
        .step(register_action("reader@example.com", "STUDENT"))
        .step(module_action("draft hidden", "GET", "").with_expect(StatusCode::FORBIDDEN))
        .step(
            module_action("draft sections hidden", "GET", "/sections")
                .with_expect(StatusCode::FORBIDDEN),
        )
        .step(
            Action::new("published list", "GET", "/modules")
                .assert_body(|body| assert_eq!(body["total"], 0)),
        )
        .step(
            module_action("student cannot publish", "PUT", "/publish")
                .with_expect(StatusCode::FORBIDDEN),
        )
        .step(login_as("maker@example.com"))
        .step(module_action("publish", "PUT", "/publish"))
        .step(
            Action::new("anonymous list", "GET", "/modules")
                .with_clear_cookies(true)
                .assert_body(|body| assert_eq!(body["total"], 1)),
        )
        .step(module_action("anonymous get", "GET", ""))
        .step(
            Action::new("search by subject", "GET", "/modules/search")
                .with_param("subject", "programming")
                .with_param("query", "futures")
                .assert_body(|body| assert_eq!(body["total"], 1)),
        )
        .step(
            Action::new("search by level", "GET", "/modules/search")
                .with_param("level", "beginner")
                .assert_body(|body| assert_eq!(body["total"], 0)),
        )
        .step(
            Action::new("subjects", "GET", "/modules/subjects")
                .assert_body(|body| assert_eq!(*body, json!(["programming"]))),
        )
        .step(
            Action::new("levels", "GET", "/modules/levels")
                .assert_body(|body| assert_eq!(*body, json!(["advanced"]))),
        )
        .run(&mut server, db)
        .await;
}

#[tokio::test]
async fn route_module_structure_test() {
    let db = setup_test_db().await;
    let mut server = setup_server(&db).await;

    Flow::new()
        .step(register_action("builder@example.com", "INSTRUCTOR"))
        .step(create_module_action())
        .step(
            module_action("first section", "POST", "/sections")
                .with_body(json!({ "title": "Futures" }))
                .with_expect(StatusCode::CREATED)
                .with_save_as("section")
                .assert_body(|body| {
                    assert_eq!(body["order_index"], 0);
                    assert_eq!(body["is_required"], true);
                }),
        )
        .step(
            module_action("second section", "POST", "/sections")
                .with_body(json!({ "title": "Pinning", "is_required": false }))
                .with_expect(StatusCode::CREATED)
                .assert_body(|body| assert_eq!(body["order_index"], 1)),
        )
        .step(
            Action::new("add block", "POST", "")
                .with_dyn_path(|ctx| format!("/sections/{}/blocks", ctx.id("section")))
                .with_body(json!({
                    "content_type": "TEXT",
                    "content": "A future is a value that may not be ready yet.",
                    "estimated_time_minutes": 5,
                }))
                .with_expect(StatusCode::CREATED)
                .with_save_as("block"),
        )
        .step(
            Action::new("update block", "PUT", "")
                .with_dyn_path(|ctx| format!("/content-blocks/{}", ctx.id("block")))
                .with_body(json!({
                    "content_type": "VIDEO",
                    "content_url": "https://videos.example.com/futures",
                }))
                .assert_body(|body| assert_eq!(body["content_type"], "VIDEO")),
        )
        .step(
            Action::new("rename section", "PUT", "")
                .with_dyn_path(|ctx| format!("/sections/{}", ctx.id("section")))
                .with_body(json!({ "title": "Futures and Streams" }))
                .assert_body(|body| assert_eq!(body["title"], "Futures and Streams")),
        )
        .step(
            module_action("sections", "GET", "/sections").assert_body(|body| {
                let sections = body.as_array().expect("sections");
                assert_eq!(sections.len(), 2);
                assert_eq!(sections[0]["title"], "Futures and Streams");
            }),
        )
        .step(module_action("publish", "PUT", "/publish"))
        .step(register_action("copycat@example.com", "INSTRUCTOR"))
        .step(
            Action::new("foreign section edit", "PUT", "")
                .with_dyn_path(|ctx| format!("/sections/{}", ctx.id("section")))
                .with_body(json!({ "title": "Hijacked" }))
                .with_expect(StatusCode::FORBIDDEN),
        )
        .step(
            Action::new("foreign block delete", "DELETE", "")
                .with_dyn_path(|ctx| format!("/content-blocks/{}", ctx.id("block")))
                .with_expect(StatusCode::FORBIDDEN),
        )
        .step(
            module_action("clone", "POST", "/clone")
                .with_expect(StatusCode::CREATED)
                .with_save_as("copy")
                .assert_body_ctx(|body, ctx| {
                    assert_ne!(body["id"], ctx.get("module")["id"]);
                    assert_eq!(body["title"], "Async Rust (Copy)");
                    assert_eq!(body["is_published"], false);
                }),
        )
        .step(
            Action::new("copied sections", "GET", "")
                .with_dyn_path(|ctx| format!("/modules/{}/sections", ctx.id("copy")))
                .assert_body(|body| assert_eq!(body.as_array().map(Vec::len), Some(2))),
        )
        .step(login_as("builder@example.com"))
        .step(
            Action::new("blocks", "GET", "")
                .with_dyn_path(|ctx| format!("/sections/{}/blocks", ctx.id("section")))
                .assert_body(|body| assert_eq!(body.as_array().map(Vec::len), Some(1))),
        )
        .step(
            Action::new("delete block", "DELETE", "")
                .with_dyn_path(|ctx| format!("/content-blocks/{}", ctx.id("block")))
                .with_expect(StatusCode::NO_CONTENT),
        )
        .step(module_action("delete module", "DELETE", "").with_expect(StatusCode::NO_CONTENT))
        .step(
            Action::new("section gone", "DELETE", "")
                .with_dyn_path(|ctx| format!("/sections/{}", ctx.id("section")))
                .with_expect(StatusCode::NOT_FOUND),
        )
        .run(&mut server, db)
        .await;
}
