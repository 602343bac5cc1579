use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{delete, get, post},
};
use uuid::Uuid;

use crate::{
    model::{
        DatabaseError, Page, ResourceType, check_access,
        entity::{
            InstructorStatistics, ModuleProgressUpdate, MonthlyCount, Progress, ProgressUpdate,
            StudentProgress, StudentProgressRow,
        },
    },
    web::{
        AppState, PaginationQuery, RequestContext, ValidPath, ValidQuery, ValidatedJson, WebError,
        WebResult,
        dto::{CourseFilterQuery, PercentageBody},
        error::ErrorResponse,
        middlewares,
    },
};

pub fn routes<S>(state: AppState) -> Router<S> {
    Router::new()
        .route("/", post(progress_record_handler))
        .route("/course/{course_id}", get(progress_course_handler))
        .route(
            "/course/{course_id}/percentage",
            get(progress_course_percentage_handler),
        )
        .route("/modules", get(progress_modules_handler))
        .route(
            "/modules/{module_id}",
            get(progress_module_get_handler).post(progress_module_record_handler),
        )
        .route(
            "/instructor/statistics",
            get(progress_instructor_statistics_handler),
        )
        .route(
            "/instructor/students",
            get(progress_instructor_students_handler),
        )
        .route("/analytics/monthly/{year}", get(progress_monthly_handler))
        .route("/{id}", delete(progress_delete_handler))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            middlewares::extract_context_fn,
        ))
        .with_state(state)
}

fn progress_error(e: DatabaseError) -> WebError {
    WebError::from_database(ResourceType::Progress, e)
}

fn module_progress_error(e: DatabaseError) -> WebError {
    WebError::from_database(ResourceType::StudentProgress, e)
}

#[utoipa::path(
    post,
    path = "/progress",
    request_body = ProgressUpdate,
    responses(
        (status = 200, description = "Progress recorded", body = Progress),
        (status = 400, description = "Validation failed", body = ErrorResponse),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 404, description = "Content not found", body = ErrorResponse),
    ),
    tag = "progress",
    security(("cookie" = []))
)]
pub(crate) async fn progress_record_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<ProgressUpdate>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let progress = Progress::record(state.pool(), user, payload)
        .await
        .map_err(progress_error)?;

    Ok((StatusCode::OK, Json(progress)))
}

#[utoipa::path(
    get,
    path = "/progress/course/{course_id}",
    params(("course_id" = Uuid, Path, description = "Course id")),
    responses(
        (status = 200, description = "Caller's progress on the course contents", body = Vec<Progress>),
        (status = 401, description = "Not signed in", body = ErrorResponse),
    ),
    tag = "progress",
    security(("cookie" = []))
)]
pub(crate) async fn progress_course_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidPath(course_id): ValidPath<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let progress = Progress::list_for_course(state.pool(), user, course_id)
        .await
        .map_err(progress_error)?;

    Ok((StatusCode::OK, Json(progress)))
}

#[utoipa::path(
    get,
    path = "/progress/course/{course_id}/percentage",
    params(("course_id" = Uuid, Path, description = "Course id")),
    responses(
        (status = 200, description = "Average completion over the caller's records", body = PercentageBody),
        (status = 401, description = "Not signed in", body = ErrorResponse),
    ),
    tag = "progress",
    security(("cookie" = []))
)]
pub(crate) async fn progress_course_percentage_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidPath(course_id): ValidPath<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let percentage = Progress::course_percentage(state.pool(), user, course_id)
        .await
        .map_err(progress_error)?;

    Ok((StatusCode::OK, Json(PercentageBody { percentage })))
}

#[utoipa::path(
    get,
    path = "/progress/modules",
    responses(
        (status = 200, description = "Caller's progress on learning modules", body = Vec<StudentProgress>),
        (status = 401, description = "Not signed in", body = ErrorResponse),
    ),
    tag = "progress",
    security(("cookie" = []))
)]
pub(crate) async fn progress_modules_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let progress = StudentProgress::list_for_student(state.pool(), user)
        .await
        .map_err(module_progress_error)?;

    Ok((StatusCode::OK, Json(progress)))
}

#[utoipa::path(
    get,
    path = "/progress/modules/{module_id}",
    params(("module_id" = Uuid, Path, description = "Module id")),
    responses(
        (status = 200, description = "Caller's progress on the module", body = StudentProgress),
        (status = 404, description = "No progress recorded yet", body = ErrorResponse),
    ),
    tag = "progress",
    security(("cookie" = []))
)]
pub(crate) async fn progress_module_get_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidPath(module_id): ValidPath<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let progress = StudentProgress::find_for_module(state.pool(), user, module_id)
        .await
        .map_err(module_progress_error)?
        .ok_or(WebError::resource_not_found(ResourceType::StudentProgress))?;

    Ok((StatusCode::OK, Json(progress)))
}

#[utoipa::path(
    post,
    path = "/progress/modules/{module_id}",
    params(("module_id" = Uuid, Path, description = "Module id")),
    request_body = ModuleProgressUpdate,
    responses(
        (status = 200, description = "Module progress recorded", body = StudentProgress),
        (status = 400, description = "Validation failed", body = ErrorResponse),
        (status = 403, description = "Module is not visible to the caller", body = ErrorResponse),
        (status = 404, description = "Module not found", body = ErrorResponse),
    ),
    tag = "progress",
    security(("cookie" = []))
)]
pub(crate) async fn progress_module_record_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidPath(module_id): ValidPath<Uuid>,
    ValidatedJson(payload): ValidatedJson<ModuleProgressUpdate>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let progress = StudentProgress::record(state.pool(), user, module_id, payload)
        .await
        .map_err(module_progress_error)?;

    Ok((StatusCode::OK, Json(progress)))
}

#[utoipa::path(
    get,
    path = "/progress/instructor/statistics",
    responses(
        (status = 200, description = "Progress totals over the caller's courses", body = InstructorStatistics),
        (status = 403, description = "Instructors and admins only", body = ErrorResponse),
    ),
    tag = "progress",
    security(("cookie" = []))
)]
pub(crate) async fn progress_instructor_statistics_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    user.require_author()?;

    let stats = Progress::instructor_statistics(state.pool(), user)
        .await
        .map_err(progress_error)?;
    Ok((StatusCode::OK, Json(stats)))
}

#[utoipa::path(
    get,
    path = "/progress/instructor/students",
    params(CourseFilterQuery, PaginationQuery),
    responses(
        (status = 200, description = "Student progress on the caller's courses", body = Page<StudentProgressRow>),
        (status = 403, description = "Instructors and admins only", body = ErrorResponse),
    ),
    tag = "progress",
    security(("cookie" = []))
)]
pub(crate) async fn progress_instructor_students_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidQuery(filter): ValidQuery<CourseFilterQuery>,
    ValidQuery(page): ValidQuery<PaginationQuery>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    user.require_author()?;

    let rows = Progress::page_instructor_students(state.pool(), user, filter.course_id, page.into())
        .await
        .map_err(progress_error)?;
    Ok((StatusCode::OK, Json(rows)))
}

#[utoipa::path(
    get,
    path = "/progress/analytics/monthly/{year}",
    params(("year" = i32, Path, description = "Calendar year")),
    responses(
        (status = 200, description = "Progress records created per month, January to December", body = Vec<MonthlyCount>),
        (status = 401, description = "Not signed in", body = ErrorResponse),
    ),
    tag = "progress",
    security(("cookie" = []))
)]
pub(crate) async fn progress_monthly_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidPath(year): ValidPath<i32>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let months = Progress::monthly_counts(state.pool(), user, year)
        .await
        .map_err(progress_error)?;

    Ok((StatusCode::OK, Json(months)))
}

#[utoipa::path(
    delete,
    path = "/progress/{id}",
    params(("id" = Uuid, Path, description = "Progress id")),
    responses(
        (status = 204, description = "Progress deleted"),
        (status = 403, description = "Only the owner or an admin", body = ErrorResponse),
        (status = 404, description = "Progress not found", body = ErrorResponse),
    ),
    tag = "progress",
    security(("cookie" = []))
)]
pub(crate) async fn progress_delete_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let progress = Progress::find_by_id(state.pool(), user, id)
        .await
        .map_err(progress_error)?
        .ok_or(WebError::resource_not_found(ResourceType::Progress))?;

    check_access(state.pool(), user, &progress)
        .await
        .map_err(progress_error)?;
    progress
        .delete(state.pool(), user)
        .await
        .map_err(progress_error)?;

    Ok(StatusCode::NO_CONTENT)
}
