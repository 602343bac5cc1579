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
        CourseStatus, CrudRepository, DatabaseError, Page, PaginatableRepository, ResourceType,
        check_access,
        entity::{
            Assessment, AssessmentCreate, Course, CourseContent, CourseContentCreate, CourseCreate,
            CourseStatistics,
        },
    },
    web::{
        AppState, PaginationQuery, RequestContext, ValidPath, ValidQuery, ValidatedJson, WebError,
        WebResult,
        dto::{RatingBody, SearchQuery, StatusBody},
        error::ErrorResponse,
        middlewares,
    },
};

pub fn routes<S>(state: AppState) -> Router<S> {
    Router::new()
        .route("/", get(course_list_handler).post(course_create_handler))
        .route("/published", get(course_published_handler))
        .route("/featured", get(course_featured_handler))
        .route("/search", get(course_search_handler))
        .route("/available-slots", get(course_available_handler))
        .route("/statistics", get(course_statistics_handler))
        .route(
            "/{id}",
            get(course_get_handler)
                .put(course_update_handler)
                .delete(course_delete_handler),
        )
        .route("/{id}/publish", put(course_publish_handler))
        .route("/{id}/unpublish", put(course_unpublish_handler))
        .route("/{id}/status", put(course_status_handler))
        .route("/{id}/rating", post(course_rating_handler))
        .route(
            "/{id}/contents",
            get(content_list_handler).post(content_create_handler),
        )
        .route(
            "/{id}/contents/{content_id}",
            put(content_update_handler).delete(content_delete_handler),
        )
        .route(
            "/{id}/assessments",
            get(assessment_list_handler).post(assessment_create_handler),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            middlewares::extract_context_fn,
        ))
        .with_state(state)
}

fn course_error(e: DatabaseError) -> WebError {
    WebError::from_database(ResourceType::Course, e)
}

#[utoipa::path(
    get,
    path = "/courses",
    params(PaginationQuery),
    responses(
        (status = 200, description = "All courses", body = Page<Course>),
    ),
    tag = "courses"
)]
pub(crate) async fn course_list_handler(
    ctx: RequestContext,
    ValidQuery(page): ValidQuery<PaginationQuery>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let courses = Course::page(state.pool(), &ctx.actor(), page.into())
        .await
        .map_err(course_error)?;

    Ok((StatusCode::OK, Json(courses)))
}

#[utoipa::path(
    get,
    path = "/courses/published",
    params(PaginationQuery),
    responses(
        (status = 200, description = "Published courses", body = Page<Course>),
    ),
    tag = "courses"
)]
pub(crate) async fn course_published_handler(
    ctx: RequestContext,
    ValidQuery(page): ValidQuery<PaginationQuery>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let courses = Course::page_published(state.pool(), &ctx.actor(), page.into())
        .await
        .map_err(course_error)?;

    Ok((StatusCode::OK, Json(courses)))
}

#[utoipa::path(
    get,
    path = "/courses/featured",
    params(PaginationQuery),
    responses(
        (status = 200, description = "Featured published courses", body = Page<Course>),
    ),
    tag = "courses"
)]
pub(crate) async fn course_featured_handler(
    ctx: RequestContext,
    ValidQuery(page): ValidQuery<PaginationQuery>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let courses = Course::page_featured(state.pool(), &ctx.actor(), page.into())
        .await
        .map_err(course_error)?;

    Ok((StatusCode::OK, Json(courses)))
}

#[utoipa::path(
    get,
    path = "/courses/search",
    params(SearchQuery, PaginationQuery),
    responses(
        (status = 200, description = "Courses matching title, description or category", body = Page<Course>),
    ),
    tag = "courses"
)]
pub(crate) async fn course_search_handler(
    ctx: RequestContext,
    ValidQuery(search): ValidQuery<SearchQuery>,
    ValidQuery(page): ValidQuery<PaginationQuery>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let courses = Course::search(state.pool(), &ctx.actor(), &search.query, page.into())
        .await
        .map_err(course_error)?;

    Ok((StatusCode::OK, Json(courses)))
}

#[utoipa::path(
    get,
    path = "/courses/available-slots",
    responses(
        (status = 200, description = "Published courses with free seats", body = Vec<Course>),
    ),
    tag = "courses"
)]
pub(crate) async fn course_available_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let courses = Course::with_available_slots(state.pool(), &ctx.actor())
        .await
        .map_err(course_error)?;

    Ok((StatusCode::OK, Json(courses)))
}

#[utoipa::path(
    get,
    path = "/courses/statistics",
    responses(
        (status = 200, description = "Course totals", body = CourseStatistics),
    ),
    tag = "courses"
)]
pub(crate) async fn course_statistics_handler(
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let stats = Course::statistics(state.pool()).await.map_err(course_error)?;
    Ok((StatusCode::OK, Json(stats)))
}

async fn find_course(state: &AppState, ctx: &RequestContext, id: Uuid) -> WebResult<Course> {
    Course::find_by_id(state.pool(), &ctx.actor(), id)
        .await
        .map_err(course_error)?
        .ok_or(WebError::resource_not_found(ResourceType::Course))
}

/// Loads the course and makes sure the caller owns it.
async fn find_owned_course(state: &AppState, ctx: &RequestContext, id: Uuid) -> WebResult<Course> {
    let user = ctx.user()?;
    let course = find_course(state, ctx, id).await?;
    check_access(state.pool(), user, &course)
        .await
        .map_err(course_error)?;
    Ok(course)
}

#[utoipa::path(
    get,
    path = "/courses/{id}",
    params(("id" = Uuid, Path, description = "Course id")),
    responses(
        (status = 200, description = "Course", body = Course),
        (status = 404, description = "Course not found", body = ErrorResponse),
    ),
    tag = "courses"
)]
pub(crate) async fn course_get_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
) -> WebResult<impl IntoResponse> {
    let course = find_course(&state, &ctx, id).await?;
    Ok((StatusCode::OK, Json(course)))
}

#[utoipa::path(
    post,
    path = "/courses",
    request_body = CourseCreate,
    description = "Creates a draft course owned by the caller",
    responses(
        (status = 201, description = "Course created", body = Course),
        (status = 400, description = "Validation failed", body = ErrorResponse),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 403, description = "Instructors and admins only", body = ErrorResponse),
    ),
    tag = "courses",
    security(("cookie" = []))
)]
pub(crate) async fn course_create_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<CourseCreate>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    user.require_author()?;

    let course = Course::create(state.pool(), user, payload)
        .await
        .map_err(course_error)?;

    tracing::info!("course {} created by {}", course.id(), user.user_id());
    Ok((StatusCode::CREATED, Json(course)))
}

#[utoipa::path(
    put,
    path = "/courses/{id}",
    params(("id" = Uuid, Path, description = "Course id")),
    request_body = CourseCreate,
    responses(
        (status = 200, description = "Course updated", body = Course),
        (status = 403, description = "Only the instructor or an admin", body = ErrorResponse),
        (status = 404, description = "Course not found", body = ErrorResponse),
        (status = 409, description = "Capacity below enrollments or concurrent update", body = ErrorResponse),
    ),
    tag = "courses",
    security(("cookie" = []))
)]
pub(crate) async fn course_update_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
    ValidatedJson(payload): ValidatedJson<CourseCreate>,
) -> WebResult<impl IntoResponse> {
    let course = find_owned_course(&state, &ctx, id).await?;
    let updated = course
        .update(state.pool(), ctx.user()?, payload)
        .await
        .map_err(course_error)?;

    Ok((StatusCode::OK, Json(updated)))
}

#[utoipa::path(
    delete,
    path = "/courses/{id}",
    params(("id" = Uuid, Path, description = "Course id")),
    responses(
        (status = 204, description = "Course deleted"),
        (status = 403, description = "Only the instructor or an admin", body = ErrorResponse),
        (status = 404, description = "Course not found", body = ErrorResponse),
    ),
    tag = "courses",
    security(("cookie" = []))
)]
pub(crate) async fn course_delete_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
) -> WebResult<impl IntoResponse> {
    let course = find_owned_course(&state, &ctx, id).await?;
    course
        .delete(state.pool(), ctx.user()?)
        .await
        .map_err(course_error)?;

    Ok(StatusCode::NO_CONTENT)
}

async fn change_status(
    state: &AppState,
    ctx: &RequestContext,
    id: Uuid,
    next: CourseStatus,
) -> WebResult<Course> {
    let user = ctx.user()?;
    Course::change_status(state.pool(), user, id, next)
        .await
        .map_err(course_error)
}

#[utoipa::path(
    put,
    path = "/courses/{id}/publish",
    params(("id" = Uuid, Path, description = "Course id")),
    responses(
        (status = 200, description = "Course published", body = Course),
        (status = 400, description = "Transition not allowed", body = ErrorResponse),
        (status = 403, description = "Only the instructor or an admin", body = ErrorResponse),
    ),
    tag = "courses",
    security(("cookie" = []))
)]
pub(crate) async fn course_publish_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
) -> WebResult<impl IntoResponse> {
    let course = change_status(&state, &ctx, id, CourseStatus::Published).await?;
    Ok((StatusCode::OK, Json(course)))
}

#[utoipa::path(
    put,
    path = "/courses/{id}/unpublish",
    params(("id" = Uuid, Path, description = "Course id")),
    responses(
        (status = 200, description = "Course back in draft", body = Course),
        (status = 400, description = "Transition not allowed", body = ErrorResponse),
        (status = 403, description = "Only the instructor or an admin", body = ErrorResponse),
    ),
    tag = "courses",
    security(("cookie" = []))
)]
pub(crate) async fn course_unpublish_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
) -> WebResult<impl IntoResponse> {
    let course = change_status(&state, &ctx, id, CourseStatus::Draft).await?;
    Ok((StatusCode::OK, Json(course)))
}

#[utoipa::path(
    put,
    path = "/courses/{id}/status",
    params(("id" = Uuid, Path, description = "Course id")),
    request_body = StatusBody,
    responses(
        (status = 200, description = "Status changed", body = Course),
        (status = 400, description = "Transition not allowed", body = ErrorResponse),
        (status = 403, description = "Only the instructor or an admin", body = ErrorResponse),
        (status = 404, description = "Course not found", body = ErrorResponse),
    ),
    tag = "courses",
    security(("cookie" = []))
)]
pub(crate) async fn course_status_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
    ValidatedJson(payload): ValidatedJson<StatusBody>,
) -> WebResult<impl IntoResponse> {
    let course = change_status(&state, &ctx, id, payload.status).await?;
    Ok((StatusCode::OK, Json(course)))
}

#[utoipa::path(
    post,
    path = "/courses/{id}/rating",
    params(("id" = Uuid, Path, description = "Course id")),
    request_body = RatingBody,
    responses(
        (status = 200, description = "Rating recorded", body = Course),
        (status = 400, description = "Rating out of range", body = ErrorResponse),
        (status = 403, description = "Only enrolled students", body = ErrorResponse),
        (status = 404, description = "Course not found", body = ErrorResponse),
    ),
    tag = "courses",
    security(("cookie" = []))
)]
pub(crate) async fn course_rating_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
    ValidatedJson(payload): ValidatedJson<RatingBody>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let course = Course::rate(state.pool(), user, id, payload.rating)
        .await
        .map_err(course_error)?;

    Ok((StatusCode::OK, Json(course)))
}

fn content_error(e: DatabaseError) -> WebError {
    WebError::from_database(ResourceType::CourseContent, e)
}

#[utoipa::path(
    get,
    path = "/courses/{id}/contents",
    params(("id" = Uuid, Path, description = "Course id")),
    responses(
        (status = 200, description = "Course contents in order", body = Vec<CourseContent>),
        (status = 404, description = "Course not found", body = ErrorResponse),
    ),
    tag = "courses"
)]
pub(crate) async fn content_list_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
) -> WebResult<impl IntoResponse> {
    let course = find_course(&state, &ctx, id).await?;
    let contents = CourseContent::list_by_course(state.pool(), &ctx.actor(), course.id())
        .await
        .map_err(content_error)?;

    Ok((StatusCode::OK, Json(contents)))
}

#[utoipa::path(
    post,
    path = "/courses/{id}/contents",
    params(("id" = Uuid, Path, description = "Course id")),
    request_body = CourseContentCreate,
    responses(
        (status = 201, description = "Content added", body = CourseContent),
        (status = 403, description = "Only the instructor or an admin", body = ErrorResponse),
        (status = 404, description = "Course not found", body = ErrorResponse),
    ),
    tag = "courses",
    security(("cookie" = []))
)]
pub(crate) async fn content_create_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
    ValidatedJson(payload): ValidatedJson<CourseContentCreate>,
) -> WebResult<impl IntoResponse> {
    let course = find_owned_course(&state, &ctx, id).await?;
    let content = CourseContent::create(state.pool(), ctx.user()?, payload.in_course(course.id()))
        .await
        .map_err(content_error)?;

    Ok((StatusCode::CREATED, Json(content)))
}

async fn find_owned_content(
    state: &AppState,
    ctx: &RequestContext,
    course_id: Uuid,
    content_id: Uuid,
) -> WebResult<CourseContent> {
    let user = ctx.user()?;
    let content = CourseContent::find_by_id(state.pool(), user, content_id)
        .await
        .map_err(content_error)?
        .filter(|c| c.course_id() == course_id)
        .ok_or(WebError::resource_not_found(ResourceType::CourseContent))?;

    check_access(state.pool(), user, &content)
        .await
        .map_err(content_error)?;
    Ok(content)
}

#[utoipa::path(
    put,
    path = "/courses/{id}/contents/{content_id}",
    params(
        ("id" = Uuid, Path, description = "Course id"),
        ("content_id" = Uuid, Path, description = "Content id"),
    ),
    request_body = CourseContentCreate,
    responses(
        (status = 200, description = "Content updated", body = CourseContent),
        (status = 403, description = "Only the instructor or an admin", body = ErrorResponse),
        (status = 404, description = "Content not found", body = ErrorResponse),
    ),
    tag = "courses",
    security(("cookie" = []))
)]
pub(crate) async fn content_update_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidPath((id, content_id)): ValidPath<(Uuid, Uuid)>,
    ValidatedJson(payload): ValidatedJson<CourseContentCreate>,
) -> WebResult<impl IntoResponse> {
    let content = find_owned_content(&state, &ctx, id, content_id).await?;
    let updated = content
        .update(state.pool(), ctx.user()?, payload.in_course(id))
        .await
        .map_err(content_error)?;

    Ok((StatusCode::OK, Json(updated)))
}

#[utoipa::path(
    delete,
    path = "/courses/{id}/contents/{content_id}",
    params(
        ("id" = Uuid, Path, description = "Course id"),
        ("content_id" = Uuid, Path, description = "Content id"),
    ),
    responses(
        (status = 204, description = "Content removed"),
        (status = 403, description = "Only the instructor or an admin", body = ErrorResponse),
        (status = 404, description = "Content not found", body = ErrorResponse),
    ),
    tag = "courses",
    security(("cookie" = []))
)]
pub(crate) async fn content_delete_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidPath((id, content_id)): ValidPath<(Uuid, Uuid)>,
) -> WebResult<impl IntoResponse> {
    let content = find_owned_content(&state, &ctx, id, content_id).await?;
    content
        .delete(state.pool(), ctx.user()?)
        .await
        .map_err(content_error)?;

    Ok(StatusCode::NO_CONTENT)
}

fn assessment_error(e: DatabaseError) -> WebError {
    WebError::from_database(ResourceType::Assessment, e)
}

#[utoipa::path(
    get,
    path = "/courses/{id}/assessments",
    params(("id" = Uuid, Path, description = "Course id")),
    responses(
        (status = 200, description = "Assessments of the course", body = Vec<Assessment>),
        (status = 404, description = "Course not found", body = ErrorResponse),
    ),
    tag = "assessments"
)]
pub(crate) async fn assessment_list_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
) -> WebResult<impl IntoResponse> {
    let course = find_course(&state, &ctx, id).await?;
    let assessments = Assessment::list_by_course(state.pool(), &ctx.actor(), course.id())
        .await
        .map_err(assessment_error)?;

    Ok((StatusCode::OK, Json(assessments)))
}

#[utoipa::path(
    post,
    path = "/courses/{id}/assessments",
    params(("id" = Uuid, Path, description = "Course id")),
    request_body = AssessmentCreate,
    responses(
        (status = 201, description = "Assessment created", body = Assessment),
        (status = 400, description = "Validation failed", body = ErrorResponse),
        (status = 403, description = "Only the instructor or an admin", body = ErrorResponse),
        (status = 404, description = "Course not found", body = ErrorResponse),
    ),
    tag = "assessments",
    security(("cookie" = []))
)]
pub(crate) async fn assessment_create_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
    ValidatedJson(payload): ValidatedJson<AssessmentCreate>,
) -> WebResult<impl IntoResponse> {
    let course = find_owned_course(&state, &ctx, id).await?;
    let assessment = Assessment::create(state.pool(), ctx.user()?, payload.in_course(course.id()))
        .await
        .map_err(assessment_error)?;

    Ok((StatusCode::CREATED, Json(assessment)))
}
