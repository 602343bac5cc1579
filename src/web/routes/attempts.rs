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
        DatabaseError, ResourceType,
        entity::{AnswerGrade, AnswerSubmit, AssessmentAttempt, StudentAnswer},
    },
    web::{
        AppState, RequestContext, ValidPath, ValidatedJson, WebError, WebResult,
        dto::{AnswerView, AttemptDetails},
        error::ErrorResponse,
        middlewares,
    },
};

pub fn routes<S>(state: AppState) -> Router<S> {
    Router::new()
        .route("/{id}", get(attempt_get_handler))
        .route("/{id}/answers", post(attempt_answer_handler))
        .route("/{id}/submit", post(attempt_submit_handler))
        .route("/answers/{answer_id}/grade", put(answer_grade_handler))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            middlewares::extract_context_fn,
        ))
        .with_state(state)
}

fn attempt_error(e: DatabaseError) -> WebError {
    WebError::from_database(ResourceType::AssessmentAttempt, e)
}

fn answer_error(e: DatabaseError) -> WebError {
    WebError::from_database(ResourceType::StudentAnswer, e)
}

#[utoipa::path(
    get,
    path = "/attempts/{id}",
    params(("id" = Uuid, Path, description = "Attempt id")),
    responses(
        (status = 200, description = "Attempt with its answers, graded fields hidden from the student until submit", body = AttemptDetails),
        (status = 403, description = "Only the student, the instructor or an admin", body = ErrorResponse),
        (status = 404, description = "Attempt not found", body = ErrorResponse),
    ),
    tag = "assessments",
    security(("cookie" = []))
)]
pub(crate) async fn attempt_get_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let attempt = AssessmentAttempt::find_by_id(state.pool(), user, id)
        .await
        .map_err(attempt_error)?
        .ok_or(WebError::resource_not_found(ResourceType::AssessmentAttempt))?;

    attempt
        .check_readable(state.pool(), user)
        .await
        .map_err(attempt_error)?;
    let answers = attempt.answers(state.pool()).await.map_err(answer_error)?;
    let reveal = attempt.reveals_grading_to(user);

    Ok((
        StatusCode::OK,
        Json(AttemptDetails::new(attempt, answers, reveal)),
    ))
}

#[utoipa::path(
    post,
    path = "/attempts/{id}/answers",
    params(("id" = Uuid, Path, description = "Attempt id")),
    request_body = AnswerSubmit,
    responses(
        (status = 200, description = "Answer recorded, grading stays hidden until submit", body = AnswerView),
        (status = 400, description = "Question or option does not match the attempt", body = ErrorResponse),
        (status = 403, description = "Attempt of another student", body = ErrorResponse),
        (status = 404, description = "Attempt, question or option not found", body = ErrorResponse),
        (status = 409, description = "Attempt already submitted", body = ErrorResponse),
    ),
    tag = "assessments",
    security(("cookie" = []))
)]
pub(crate) async fn attempt_answer_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
    ValidatedJson(payload): ValidatedJson<AnswerSubmit>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let answer = StudentAnswer::answer(state.pool(), user, id, payload)
        .await
        .map_err(answer_error)?;

    Ok((StatusCode::OK, Json(AnswerView::new(answer, false))))
}

#[utoipa::path(
    post,
    path = "/attempts/{id}/submit",
    params(("id" = Uuid, Path, description = "Attempt id")),
    responses(
        (status = 200, description = "Attempt submitted and scored", body = AssessmentAttempt),
        (status = 403, description = "Attempt of another student", body = ErrorResponse),
        (status = 404, description = "Attempt not found", body = ErrorResponse),
        (status = 409, description = "Attempt already submitted", body = ErrorResponse),
    ),
    tag = "assessments",
    security(("cookie" = []))
)]
pub(crate) async fn attempt_submit_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let attempt = AssessmentAttempt::submit_and_grade(state.pool(), user, id)
        .await
        .map_err(attempt_error)?;

    Ok((StatusCode::OK, Json(attempt)))
}

#[utoipa::path(
    put,
    path = "/attempts/answers/{answer_id}/grade",
    params(("answer_id" = Uuid, Path, description = "Answer id")),
    request_body = AnswerGrade,
    responses(
        (status = 200, description = "Answer graded", body = StudentAnswer),
        (status = 403, description = "Only the instructor or an admin", body = ErrorResponse),
        (status = 404, description = "Answer not found", body = ErrorResponse),
    ),
    tag = "assessments",
    security(("cookie" = []))
)]
pub(crate) async fn answer_grade_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidPath(answer_id): ValidPath<Uuid>,
    ValidatedJson(payload): ValidatedJson<AnswerGrade>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let answer = StudentAnswer::grade(state.pool(), user, answer_id, payload)
        .await
        .map_err(answer_error)?;

    Ok((StatusCode::OK, Json(answer)))
}
