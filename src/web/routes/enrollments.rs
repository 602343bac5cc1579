use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use uuid::Uuid;

use crate::{
    model::{
        CrudRepository, DatabaseError, Page, ResourceType, check_access,
        entity::{Course, Enrollment, EnrollmentStatistics, UserEntity},
    },
    web::{
        AppState, PaginationQuery, RequestContext, ValidPath, ValidQuery, ValidatedJson, WebError,
        WebResult,
        dto::{PercentageBody, StatusQuery},
        error::ErrorResponse,
        middlewares,
    },
};

pub fn routes<S>(state: AppState) -> Router<S> {
    Router::new()
        .route("/enroll/{course_id}", post(enrollment_enroll_handler))
        .route("/unenroll/{course_id}", delete(enrollment_unenroll_handler))
        .route("/my-courses", get(enrollment_my_courses_handler))
        .route("/check/{course_id}", get(enrollment_check_handler))
        .route("/statistics", get(enrollment_statistics_handler))
        .route("/student/{student_id}", get(enrollment_by_student_handler))
        .route("/course/{course_id}", get(enrollment_by_course_handler))
        .route(
            "/course/{course_id}/students",
            get(enrollment_students_handler),
        )
        .route("/{id}/status", put(enrollment_status_handler))
        .route("/{id}/progress", put(enrollment_progress_handler))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            middlewares::extract_context_fn,
        ))
        .with_state(state)
}

fn enrollment_error(e: DatabaseError) -> WebError {
    WebError::from_database(ResourceType::Enrollment, e)
}

#[utoipa::path(
    post,
    path = "/enrollments/enroll/{course_id}",
    params(("course_id" = Uuid, Path, description = "Course id")),
    responses(
        (status = 201, description = "Enrolled", body = Enrollment),
        (status = 400, description = "Course is not published", body = ErrorResponse),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 404, description = "Course not found", body = ErrorResponse),
        (status = 409, description = "Already enrolled or course is full", body = ErrorResponse),
    ),
    tag = "enrollments",
    security(("cookie" = []))
)]
pub(crate) async fn enrollment_enroll_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidPath(course_id): ValidPath<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let enrollment = Enrollment::enroll(state.pool(), user, course_id)
        .await
        .map_err(enrollment_error)?;

    Ok((StatusCode::CREATED, Json(enrollment)))
}

#[utoipa::path(
    delete,
    path = "/enrollments/unenroll/{course_id}",
    params(("course_id" = Uuid, Path, description = "Course id")),
    responses(
        (status = 200, description = "Enrollment dropped", body = Enrollment),
        (status = 400, description = "Enrollment cannot be dropped", body = ErrorResponse),
        (status = 404, description = "Not enrolled", body = ErrorResponse),
    ),
    tag = "enrollments",
    security(("cookie" = []))
)]
pub(crate) async fn enrollment_unenroll_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidPath(course_id): ValidPath<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let enrollment = Enrollment::unenroll(state.pool(), user, course_id)
        .await
        .map_err(enrollment_error)?;

    Ok((StatusCode::OK, Json(enrollment)))
}

#[utoipa::path(
    get,
    path = "/enrollments/my-courses",
    responses(
        (status = 200, description = "Courses the caller is enrolled in", body = Vec<Course>),
        (status = 401, description = "Not signed in", body = ErrorResponse),
    ),
    tag = "enrollments",
    security(("cookie" = []))
)]
pub(crate) async fn enrollment_my_courses_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let courses = Enrollment::courses_of_student(state.pool(), user)
        .await
        .map_err(enrollment_error)?;

    Ok((StatusCode::OK, Json(courses)))
}

#[utoipa::path(
    get,
    path = "/enrollments/check/{course_id}",
    params(("course_id" = Uuid, Path, description = "Course id")),
    responses(
        (status = 200, description = "Whether the caller is enrolled", body = bool),
        (status = 401, description = "Not signed in", body = ErrorResponse),
    ),
    tag = "enrollments",
    security(("cookie" = []))
)]
pub(crate) async fn enrollment_check_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidPath(course_id): ValidPath<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let enrolled = Enrollment::is_enrolled(state.pool(), user, course_id)
        .await
        .map_err(enrollment_error)?;

    Ok((StatusCode::OK, Json(enrolled)))
}

#[utoipa::path(
    get,
    path = "/enrollments/statistics",
    responses(
        (status = 200, description = "Enrollment totals", body = EnrollmentStatistics),
        (status = 403, description = "Admins only", body = ErrorResponse),
    ),
    tag = "enrollments",
    security(("cookie" = []))
)]
pub(crate) async fn enrollment_statistics_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    ctx.user()?.require_admin()?;

    let stats = Enrollment::statistics(state.pool())
        .await
        .map_err(enrollment_error)?;
    Ok((StatusCode::OK, Json(stats)))
}

#[utoipa::path(
    get,
    path = "/enrollments/student/{student_id}",
    params(
        ("student_id" = Uuid, Path, description = "Student id"),
        PaginationQuery,
    ),
    responses(
        (status = 200, description = "Enrollments of the student", body = Page<Enrollment>),
        (status = 403, description = "Only the student or an admin", body = ErrorResponse),
    ),
    tag = "enrollments",
    security(("cookie" = []))
)]
pub(crate) async fn enrollment_by_student_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidPath(student_id): ValidPath<Uuid>,
    ValidQuery(page): ValidQuery<PaginationQuery>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    if !user.is_admin() && user.user_id() != student_id {
        return Err(WebError::resource_forbidden(ResourceType::Enrollment));
    }

    let enrollments = Enrollment::page_by_student(state.pool(), user, student_id, page.into())
        .await
        .map_err(enrollment_error)?;

    Ok((StatusCode::OK, Json(enrollments)))
}

async fn find_owned_course(
    state: &AppState,
    ctx: &RequestContext,
    course_id: Uuid,
) -> WebResult<Course> {
    let user = ctx.user()?;
    let course = Course::find_by_id(state.pool(), user, course_id)
        .await
        .map_err(enrollment_error)?
        .ok_or(WebError::resource_not_found(ResourceType::Course))?;

    check_access(state.pool(), user, &course)
        .await
        .map_err(enrollment_error)?;
    Ok(course)
}

#[utoipa::path(
    get,
    path = "/enrollments/course/{course_id}",
    params(
        ("course_id" = Uuid, Path, description = "Course id"),
        PaginationQuery,
    ),
    responses(
        (status = 200, description = "Enrollments of the course", body = Page<Enrollment>),
        (status = 403, description = "Only the instructor or an admin", body = ErrorResponse),
        (status = 404, description = "Course not found", body = ErrorResponse),
    ),
    tag = "enrollments",
    security(("cookie" = []))
)]
pub(crate) async fn enrollment_by_course_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidPath(course_id): ValidPath<Uuid>,
    ValidQuery(page): ValidQuery<PaginationQuery>,
) -> WebResult<impl IntoResponse> {
    let course = find_owned_course(&state, &ctx, course_id).await?;
    let enrollments = Enrollment::page_by_course(state.pool(), ctx.user()?, course.id(), page.into())
        .await
        .map_err(enrollment_error)?;

    Ok((StatusCode::OK, Json(enrollments)))
}

#[utoipa::path(
    get,
    path = "/enrollments/course/{course_id}/students",
    params(("course_id" = Uuid, Path, description = "Course id")),
    responses(
        (status = 200, description = "Students enrolled in the course", body = Vec<UserEntity>),
        (status = 403, description = "Only the instructor or an admin", body = ErrorResponse),
        (status = 404, description = "Course not found", body = ErrorResponse),
    ),
    tag = "enrollments",
    security(("cookie" = []))
)]
pub(crate) async fn enrollment_students_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidPath(course_id): ValidPath<Uuid>,
) -> WebResult<impl IntoResponse> {
    let course = find_owned_course(&state, &ctx, course_id).await?;
    let students = Enrollment::students_of_course(state.pool(), ctx.user()?, course.id())
        .await
        .map_err(enrollment_error)?;

    Ok((StatusCode::OK, Json(students)))
}

#[utoipa::path(
    put,
    path = "/enrollments/{id}/status",
    params(
        ("id" = Uuid, Path, description = "Enrollment id"),
        StatusQuery,
    ),
    responses(
        (status = 200, description = "Status changed", body = Enrollment),
        (status = 400, description = "Transition not allowed", body = ErrorResponse),
        (status = 403, description = "Only the instructor or an admin", body = ErrorResponse),
        (status = 404, description = "Enrollment not found", body = ErrorResponse),
    ),
    tag = "enrollments",
    security(("cookie" = []))
)]
pub(crate) async fn enrollment_status_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
    ValidQuery(query): ValidQuery<StatusQuery>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let enrollment = Enrollment::change_status(state.pool(), user, id, query.status)
        .await
        .map_err(enrollment_error)?;

    Ok((StatusCode::OK, Json(enrollment)))
}

#[utoipa::path(
    put,
    path = "/enrollments/{id}/progress",
    params(("id" = Uuid, Path, description = "Enrollment id")),
    request_body = PercentageBody,
    responses(
        (status = 200, description = "Progress recorded", body = Enrollment),
        (status = 400, description = "Enrollment is not active", body = ErrorResponse),
        (status = 403, description = "Only the enrolled student", body = ErrorResponse),
        (status = 404, description = "Enrollment not found", body = ErrorResponse),
    ),
    tag = "enrollments",
    security(("cookie" = []))
)]
pub(crate) async fn enrollment_progress_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
    ValidatedJson(payload): ValidatedJson<PercentageBody>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let enrollment = Enrollment::update_progress(state.pool(), user, id, payload.percentage)
        .await
        .map_err(enrollment_error)?;

    Ok((StatusCode::OK, Json(enrollment)))
}
