use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
};
use uuid::Uuid;

use crate::{
    model::{
        CrudRepository, DatabaseError, Page, PaginatableRepository, ResourceType, check_access,
        entity::{LearningPath, LearningPathCreate, LearningPathEnrollment},
    },
    web::{
        AppState, PaginationQuery, RequestContext, ValidPath, ValidQuery, ValidatedJson, WebError,
        WebResult,
        dto::{LearningPathDetails, PercentageBody, SearchQuery},
        error::ErrorResponse,
        middlewares,
    },
};

pub fn routes<S>(state: AppState) -> Router<S> {
    Router::new()
        .route("/", get(path_list_handler).post(path_create_handler))
        .route("/published", get(path_published_handler))
        .route("/search", get(path_search_handler))
        .route(
            "/{id}",
            get(path_get_handler)
                .put(path_update_handler)
                .delete(path_delete_handler),
        )
        .route("/{id}/publish", put(path_publish_handler))
        .route("/{id}/unpublish", put(path_unpublish_handler))
        .route(
            "/{id}/courses/{course_id}",
            post(path_add_course_handler).delete(path_remove_course_handler),
        )
        .route("/{id}/enroll", post(path_enroll_handler))
        .route("/{id}/progress", put(path_progress_handler))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            middlewares::extract_context_fn,
        ))
        .with_state(state)
}

fn path_error(e: DatabaseError) -> WebError {
    WebError::from_database(ResourceType::LearningPath, e)
}

#[utoipa::path(
    get,
    path = "/learning-paths",
    params(PaginationQuery),
    responses(
        (status = 200, description = "All learning paths", body = Page<LearningPath>),
    ),
    tag = "learning-paths"
)]
pub(crate) async fn path_list_handler(
    ctx: RequestContext,
    ValidQuery(page): ValidQuery<PaginationQuery>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let paths = LearningPath::page(state.pool(), &ctx.actor(), page.into())
        .await
        .map_err(path_error)?;

    Ok((StatusCode::OK, Json(paths)))
}

#[utoipa::path(
    get,
    path = "/learning-paths/published",
    params(PaginationQuery),
    responses(
        (status = 200, description = "Published learning paths", body = Page<LearningPath>),
    ),
    tag = "learning-paths"
)]
pub(crate) async fn path_published_handler(
    ctx: RequestContext,
    ValidQuery(page): ValidQuery<PaginationQuery>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let paths = LearningPath::page_published(state.pool(), &ctx.actor(), page.into())
        .await
        .map_err(path_error)?;

    Ok((StatusCode::OK, Json(paths)))
}

#[utoipa::path(
    get,
    path = "/learning-paths/search",
    params(SearchQuery, PaginationQuery),
    responses(
        (status = 200, description = "Published paths matching title, description or tag", body = Page<LearningPath>),
    ),
    tag = "learning-paths"
)]
pub(crate) async fn path_search_handler(
    ctx: RequestContext,
    ValidQuery(search): ValidQuery<SearchQuery>,
    ValidQuery(page): ValidQuery<PaginationQuery>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let paths = LearningPath::search(state.pool(), &ctx.actor(), &search.query, page.into())
        .await
        .map_err(path_error)?;

    Ok((StatusCode::OK, Json(paths)))
}

async fn find_path(state: &AppState, ctx: &RequestContext, id: Uuid) -> WebResult<LearningPath> {
    LearningPath::find_by_id(state.pool(), &ctx.actor(), id)
        .await
        .map_err(path_error)?
        .ok_or(WebError::resource_not_found(ResourceType::LearningPath))
}

async fn find_owned_path(
    state: &AppState,
    ctx: &RequestContext,
    id: Uuid,
) -> WebResult<LearningPath> {
    let user = ctx.user()?;
    let path = find_path(state, ctx, id).await?;
    check_access(state.pool(), user, &path)
        .await
        .map_err(path_error)?;
    Ok(path)
}

#[utoipa::path(
    get,
    path = "/learning-paths/{id}",
    params(("id" = Uuid, Path, description = "Learning path id")),
    responses(
        (status = 200, description = "Path with its ordered courses", body = LearningPathDetails),
        (status = 403, description = "Unpublished path of another author", body = ErrorResponse),
        (status = 404, description = "Path not found", body = ErrorResponse),
    ),
    tag = "learning-paths"
)]
pub(crate) async fn path_get_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
) -> WebResult<impl IntoResponse> {
    let path = find_path(&state, &ctx, id).await?;
    if !path.is_published() {
        let user = ctx.user()?;
        check_access(state.pool(), user, &path)
            .await
            .map_err(path_error)?;
    }

    let courses = path.courses(state.pool()).await.map_err(path_error)?;
    Ok((StatusCode::OK, Json(LearningPathDetails::new(path, courses))))
}

#[utoipa::path(
    post,
    path = "/learning-paths",
    request_body = LearningPathCreate,
    responses(
        (status = 201, description = "Path created", body = LearningPath),
        (status = 400, description = "Validation failed", body = ErrorResponse),
        (status = 403, description = "Instructors and admins only", body = ErrorResponse),
    ),
    tag = "learning-paths",
    security(("cookie" = []))
)]
pub(crate) async fn path_create_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<LearningPathCreate>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    user.require_author()?;

    let path = LearningPath::create(state.pool(), user, payload)
        .await
        .map_err(path_error)?;

    Ok((StatusCode::CREATED, Json(path)))
}

#[utoipa::path(
    put,
    path = "/learning-paths/{id}",
    params(("id" = Uuid, Path, description = "Learning path id")),
    request_body = LearningPathCreate,
    responses(
        (status = 200, description = "Path updated", body = LearningPath),
        (status = 403, description = "Only the creator or an admin", body = ErrorResponse),
        (status = 404, description = "Path not found", body = ErrorResponse),
    ),
    tag = "learning-paths",
    security(("cookie" = []))
)]
pub(crate) async fn path_update_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
    ValidatedJson(payload): ValidatedJson<LearningPathCreate>,
) -> WebResult<impl IntoResponse> {
    let path = find_owned_path(&state, &ctx, id).await?;
    let updated = path
        .update(state.pool(), ctx.user()?, payload)
        .await
        .map_err(path_error)?;

    Ok((StatusCode::OK, Json(updated)))
}

#[utoipa::path(
    delete,
    path = "/learning-paths/{id}",
    params(("id" = Uuid, Path, description = "Learning path id")),
    responses(
        (status = 204, description = "Path deleted"),
        (status = 403, description = "Only the creator or an admin", body = ErrorResponse),
        (status = 404, description = "Path not found", body = ErrorResponse),
    ),
    tag = "learning-paths",
    security(("cookie" = []))
)]
pub(crate) async fn path_delete_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
) -> WebResult<impl IntoResponse> {
    let path = find_owned_path(&state, &ctx, id).await?;
    path.delete(state.pool(), ctx.user()?)
        .await
        .map_err(path_error)?;

    Ok(StatusCode::NO_CONTENT)
}

async fn set_published(
    state: &AppState,
    ctx: &RequestContext,
    id: Uuid,
    published: bool,
) -> WebResult<LearningPath> {
    let path = find_owned_path(state, ctx, id).await?;
    path.set_published(state.pool(), ctx.user()?, published)
        .await
        .map_err(path_error)
}

#[utoipa::path(
    put,
    path = "/learning-paths/{id}/publish",
    params(("id" = Uuid, Path, description = "Learning path id")),
    responses(
        (status = 200, description = "Path published", body = LearningPath),
        (status = 403, description = "Only the creator or an admin", body = ErrorResponse),
    ),
    tag = "learning-paths",
    security(("cookie" = []))
)]
pub(crate) async fn path_publish_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
) -> WebResult<impl IntoResponse> {
    let path = set_published(&state, &ctx, id, true).await?;
    Ok((StatusCode::OK, Json(path)))
}

#[utoipa::path(
    put,
    path = "/learning-paths/{id}/unpublish",
    params(("id" = Uuid, Path, description = "Learning path id")),
    responses(
        (status = 200, description = "Path unpublished", body = LearningPath),
        (status = 403, description = "Only the creator or an admin", body = ErrorResponse),
    ),
    tag = "learning-paths",
    security(("cookie" = []))
)]
pub(crate) async fn path_unpublish_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
) -> WebResult<impl IntoResponse> {
    let path = set_published(&state, &ctx, id, false).await?;
    Ok((StatusCode::OK, Json(path)))
}

#[utoipa::path(
    post,
    path = "/learning-paths/{id}/courses/{course_id}",
    params(
        ("id" = Uuid, Path, description = "Learning path id"),
        ("course_id" = Uuid, Path, description = "Course to append"),
    ),
    responses(
        (status = 200, description = "Course appended", body = LearningPathDetails),
        (status = 403, description = "Only the creator or an admin", body = ErrorResponse),
        (status = 404, description = "Path or course not found", body = ErrorResponse),
        (status = 409, description = "Course already on the path", body = ErrorResponse),
    ),
    tag = "learning-paths",
    security(("cookie" = []))
)]
pub(crate) async fn path_add_course_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidPath((id, course_id)): ValidPath<(Uuid, Uuid)>,
) -> WebResult<impl IntoResponse> {
    let path = find_owned_path(&state, &ctx, id).await?;
    path.add_course(state.pool(), course_id)
        .await
        .map_err(path_error)?;

    let courses = path.courses(state.pool()).await.map_err(path_error)?;
    Ok((StatusCode::OK, Json(LearningPathDetails::new(path, courses))))
}

#[utoipa::path(
    delete,
    path = "/learning-paths/{id}/courses/{course_id}",
    params(
        ("id" = Uuid, Path, description = "Learning path id"),
        ("course_id" = Uuid, Path, description = "Course to remove"),
    ),
    responses(
        (status = 200, description = "Course removed", body = LearningPathDetails),
        (status = 403, description = "Only the creator or an admin", body = ErrorResponse),
        (status = 404, description = "Course is not on the path", body = ErrorResponse),
    ),
    tag = "learning-paths",
    security(("cookie" = []))
)]
pub(crate) async fn path_remove_course_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidPath((id, course_id)): ValidPath<(Uuid, Uuid)>,
) -> WebResult<impl IntoResponse> {
    let path = find_owned_path(&state, &ctx, id).await?;
    path.remove_course(state.pool(), course_id)
        .await
        .map_err(path_error)?;

    let courses = path.courses(state.pool()).await.map_err(path_error)?;
    Ok((StatusCode::OK, Json(LearningPathDetails::new(path, courses))))
}

#[utoipa::path(
    post,
    path = "/learning-paths/{id}/enroll",
    params(("id" = Uuid, Path, description = "Learning path id")),
    responses(
        (status = 201, description = "Enrolled into the path", body = LearningPathEnrollment),
        (status = 400, description = "Path is not published", body = ErrorResponse),
        (status = 404, description = "Path not found", body = ErrorResponse),
        (status = 409, description = "Already enrolled", body = ErrorResponse),
    ),
    tag = "learning-paths",
    security(("cookie" = []))
)]
pub(crate) async fn path_enroll_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let enrollment = LearningPathEnrollment::enroll(state.pool(), user, id)
        .await
        .map_err(path_error)?;

    Ok((StatusCode::CREATED, Json(enrollment)))
}

#[utoipa::path(
    put,
    path = "/learning-paths/{id}/progress",
    params(("id" = Uuid, Path, description = "Learning path id")),
    request_body = PercentageBody,
    responses(
        (status = 200, description = "Progress recorded", body = LearningPathEnrollment),
        (status = 404, description = "Not enrolled into the path", body = ErrorResponse),
    ),
    tag = "learning-paths",
    security(("cookie" = []))
)]
pub(crate) async fn path_progress_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
    ValidatedJson(payload): ValidatedJson<PercentageBody>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let enrollment = LearningPathEnrollment::record_progress(state.pool(), user, id, payload.percentage)
        .await
        .map_err(path_error)?;

    Ok((StatusCode::OK, Json(enrollment)))
}
