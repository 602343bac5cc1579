use crate::web::{AppState, doc::ApiDoc};
use axum::Router;
use tower_cookies::CookieManagerLayer;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod assessments;
pub mod attempts;
pub mod auth;
pub mod content_blocks;
pub mod courses;
pub mod enrollments;
pub mod learning_paths;
pub mod modules;
pub mod progress;
pub mod sections;
pub mod users;

pub fn build_app<S: Send + Sync + Clone + 'static>(state: AppState) -> Router<S> {
    let docs = state.config().app().docs();

    let mut router = Router::new()
        .nest("/auth", auth::routes(state.clone()))
        .nest("/api/users", users::routes(state.clone()))
        .nest("/courses", courses::routes(state.clone()))
        .nest("/enrollments", enrollments::routes(state.clone()))
        .nest("/learning-paths", learning_paths::routes(state.clone()))
        .nest("/modules", modules::routes(state.clone()))
        .nest("/sections", sections::routes(state.clone()))
        .nest("/content-blocks", content_blocks::routes(state.clone()))
        .nest("/progress", progress::routes(state.clone()))
        .nest("/assessments", assessments::routes(state.clone()))
        .nest("/attempts", attempts::routes(state.clone()))
        .layer(CookieManagerLayer::default())
        .layer(CorsLayer::very_permissive())
        .with_state(state);

    if docs {
        router = router.merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()));
    }

    router
}
