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
        CrudRepository, DatabaseError, ResourceType, check_access,
        entity::{
            Assessment, AssessmentAttempt, AssessmentCreate, Question, QuestionCreate,
            QuestionOption,
        },
    },
    web::{
        AppState, RequestContext, ValidPath, ValidatedJson, WebError, WebResult,
        dto::{AssessmentDetails, QuestionDetails},
        error::ErrorResponse,
        middlewares,
    },
};

pub fn routes<S>(state: AppState) -> Router<S> {
    Router::new()
        .route(
            "/{id}",
            get(assessment_get_handler)
                .put(assessment_update_handler)
                .delete(assessment_delete_handler),
        )
        .route("/{id}/questions", post(question_create_handler))
        .route("/questions/{question_id}", delete(question_delete_handler))
        .route(
            "/{id}/attempts",
            get(attempt_list_handler).post(attempt_start_handler),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            middlewares::extract_context_fn,
        ))
        .with_state(state)
}

fn assessment_error(e: DatabaseError) -> WebError {
    WebError::from_database(ResourceType::Assessment, e)
}

fn question_error(e: DatabaseError) -> WebError {
    WebError::from_database(ResourceType::Question, e)
}

fn attempt_error(e: DatabaseError) -> WebError {
    WebError::from_database(ResourceType::AssessmentAttempt, e)
}

async fn find_assessment(
    state: &AppState,
    ctx: &RequestContext,
    id: Uuid,
) -> WebResult<Assessment> {
    let user = ctx.user()?;
    Assessment::find_by_id(state.pool(), user, id)
        .await
        .map_err(assessment_error)?
        .ok_or(WebError::resource_not_found(ResourceType::Assessment))
}

async fn find_owned_assessment(
    state: &AppState,
    ctx: &RequestContext,
    id: Uuid,
) -> WebResult<Assessment> {
    let assessment = find_assessment(state, ctx, id).await?;
    check_access(state.pool(), ctx.user()?, &assessment)
        .await
        .map_err(assessment_error)?;
    Ok(assessment)
}

#[utoipa::path(
    get,
    path = "/assessments/{id}",
    params(("id" = Uuid, Path, description = "Assessment id")),
    description = "Answer keys are only included for the course instructor and admins",
    responses(
        (status = 200, description = "Assessment with its questions", body = AssessmentDetails),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 404, description = "Assessment not found", body = ErrorResponse),
    ),
    tag = "assessments",
    security(("cookie" = []))
)]
pub(crate) async fn assessment_get_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let assessment = find_assessment(&state, &ctx, id).await?;

    let reveal = match check_access(state.pool(), user, &assessment).await {
        Ok(()) => true,
        Err(DatabaseError::Forbidden) => false,
        Err(e) => return Err(assessment_error(e)),
    };

    let questions = Question::list_by_assessment(state.pool(), assessment.id())
        .await
        .map_err(question_error)?;
    let options = QuestionOption::list_by_assessment(state.pool(), assessment.id())
        .await
        .map_err(question_error)?;

    Ok((
        StatusCode::OK,
        Json(AssessmentDetails::new(assessment, questions, &options, reveal)),
    ))
}

#[utoipa::path(
    put,
    path = "/assessments/{id}",
    params(("id" = Uuid, Path, description = "Assessment id")),
    request_body = AssessmentCreate,
    responses(
        (status = 200, description = "Assessment updated", body = Assessment),
        (status = 400, description = "Validation failed", body = ErrorResponse),
        (status = 403, description = "Only the instructor or an admin", body = ErrorResponse),
        (status = 404, description = "Assessment not found", body = ErrorResponse),
    ),
    tag = "assessments",
    security(("cookie" = []))
)]
pub(crate) async fn assessment_update_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
    ValidatedJson(payload): ValidatedJson<AssessmentCreate>,
) -> WebResult<impl IntoResponse> {
    let assessment = find_owned_assessment(&state, &ctx, id).await?;
    let course_id = assessment.course_id();
    let updated = assessment
        .update(state.pool(), ctx.user()?, payload.in_course(course_id))
        .await
        .map_err(assessment_error)?;

    Ok((StatusCode::OK, Json(updated)))
}

#[utoipa::path(
    delete,
    path = "/assessments/{id}",
    params(("id" = Uuid, Path, description = "Assessment id")),
    responses(
        (status = 204, description = "Assessment deleted with its questions and attempts"),
        (status = 403, description = "Only the instructor or an admin", body = ErrorResponse),
        (status = 404, description = "Assessment not found", body = ErrorResponse),
    ),
    tag = "assessments",
    security(("cookie" = []))
)]
pub(crate) async fn assessment_delete_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
) -> WebResult<impl IntoResponse> {
    let assessment = find_owned_assessment(&state, &ctx, id).await?;
    assessment
        .delete(state.pool(), ctx.user()?)
        .await
        .map_err(assessment_error)?;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/assessments/{id}/questions",
    params(("id" = Uuid, Path, description = "Assessment id")),
    request_body = QuestionCreate,
    responses(
        (status = 201, description = "Question created with its options", body = QuestionDetails),
        (status = 400, description = "Validation failed", body = ErrorResponse),
        (status = 403, description = "Only the instructor or an admin", body = ErrorResponse),
        (status = 404, description = "Assessment not found", body = ErrorResponse),
    ),
    tag = "assessments",
    security(("cookie" = []))
)]
pub(crate) async fn question_create_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
    ValidatedJson(payload): ValidatedJson<QuestionCreate>,
) -> WebResult<impl IntoResponse> {
    let assessment = find_owned_assessment(&state, &ctx, id).await?;
    let (question, options) =
        Question::create_with_options(state.pool(), ctx.user()?, assessment.id(), payload)
            .await
            .map_err(question_error)?;

    Ok((StatusCode::CREATED, Json(QuestionDetails { question, options })))
}

#[utoipa::path(
    delete,
    path = "/assessments/questions/{question_id}",
    params(("question_id" = Uuid, Path, description = "Question id")),
    responses(
        (status = 204, description = "Question deleted"),
        (status = 403, description = "Only the instructor or an admin", body = ErrorResponse),
        (status = 404, description = "Question not found", body = ErrorResponse),
    ),
    tag = "assessments",
    security(("cookie" = []))
)]
pub(crate) async fn question_delete_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidPath(question_id): ValidPath<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let question = Question::find_by_id(state.pool(), user, question_id)
        .await
        .map_err(question_error)?
        .ok_or(WebError::resource_not_found(ResourceType::Question))?;

    check_access(state.pool(), user, &question)
        .await
        .map_err(question_error)?;
    question
        .delete(state.pool(), user)
        .await
        .map_err(question_error)?;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/assessments/{id}/attempts",
    params(("id" = Uuid, Path, description = "Assessment id")),
    responses(
        (status = 201, description = "Attempt started", body = AssessmentAttempt),
        (status = 400, description = "Assessment is not currently active", body = ErrorResponse),
        (status = 403, description = "Caller is not enrolled in the course", body = ErrorResponse),
        (status = 404, description = "Assessment not found", body = ErrorResponse),
        (status = 409, description = "Maximum number of attempts reached", body = ErrorResponse),
    ),
    tag = "assessments",
    security(("cookie" = []))
)]
pub(crate) async fn attempt_start_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let attempt = AssessmentAttempt::start(state.pool(), user, id)
        .await
        .map_err(attempt_error)?;

    Ok((StatusCode::CREATED, Json(attempt)))
}

#[utoipa::path(
    get,
    path = "/assessments/{id}/attempts",
    params(("id" = Uuid, Path, description = "Assessment id")),
    responses(
        (status = 200, description = "Caller's attempts in order", body = Vec<AssessmentAttempt>),
        (status = 401, description = "Not signed in", body = ErrorResponse),
    ),
    tag = "assessments",
    security(("cookie" = []))
)]
pub(crate) async fn attempt_list_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let attempts = AssessmentAttempt::list_for_student(state.pool(), user, id)
        .await
        .map_err(attempt_error)?;

    Ok((StatusCode::OK, Json(attempts)))
}
