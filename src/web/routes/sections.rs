use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, put},
};
use uuid::Uuid;

use crate::{
    model::{
        CrudRepository, DatabaseError, ResourceType, check_access,
        entity::{ContentBlock, ContentBlockCreate, LearningModule, LearningSection, LearningSectionCreate},
    },
    web::{
        AppState, RequestContext, ValidPath, ValidatedJson, WebError, WebResult,
        error::ErrorResponse,
        middlewares,
    },
};

pub fn routes<S>(state: AppState) -> Router<S> {
    Router::new()
        .route(
            "/{id}",
            put(section_update_handler).delete(section_delete_handler),
        )
        .route(
            "/{id}/blocks",
            get(section_blocks_handler).post(section_block_create_handler),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            middlewares::extract_context_fn,
        ))
        .with_state(state)
}

fn section_error(e: DatabaseError) -> WebError {
    WebError::from_database(ResourceType::LearningSection, e)
}

fn block_error(e: DatabaseError) -> WebError {
    WebError::from_database(ResourceType::ContentBlock, e)
}

async fn find_section(
    state: &AppState,
    ctx: &RequestContext,
    id: Uuid,
) -> WebResult<LearningSection> {
    LearningSection::find_by_id(state.pool(), &ctx.actor(), id)
        .await
        .map_err(section_error)?
        .ok_or(WebError::resource_not_found(ResourceType::LearningSection))
}

async fn find_owned_section(
    state: &AppState,
    ctx: &RequestContext,
    id: Uuid,
) -> WebResult<LearningSection> {
    let user = ctx.user()?;
    let section = find_section(state, ctx, id).await?;
    check_access(state.pool(), user, &section)
        .await
        .map_err(section_error)?;
    Ok(section)
}

#[utoipa::path(
    put,
    path = "/sections/{id}",
    params(("id" = Uuid, Path, description = "Section id")),
    request_body = LearningSectionCreate,
    responses(
        (status = 200, description = "Section updated", body = LearningSection),
        (status = 403, description = "Only the module creator or an admin", body = ErrorResponse),
        (status = 404, description = "Section not found", body = ErrorResponse),
    ),
    tag = "modules",
    security(("cookie" = []))
)]
pub(crate) async fn section_update_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
    ValidatedJson(payload): ValidatedJson<LearningSectionCreate>,
) -> WebResult<impl IntoResponse> {
    let section = find_owned_section(&state, &ctx, id).await?;
    let module_id = section.module_id();
    let updated = section
        .update(state.pool(), ctx.user()?, payload.in_module(module_id))
        .await
        .map_err(section_error)?;

    Ok((StatusCode::OK, Json(updated)))
}

#[utoipa::path(
    delete,
    path = "/sections/{id}",
    params(("id" = Uuid, Path, description = "Section id")),
    responses(
        (status = 204, description = "Section deleted with its blocks"),
        (status = 403, description = "Only the module creator or an admin", body = ErrorResponse),
        (status = 404, description = "Section not found", body = ErrorResponse),
    ),
    tag = "modules",
    security(("cookie" = []))
)]
pub(crate) async fn section_delete_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
) -> WebResult<impl IntoResponse> {
    let section = find_owned_section(&state, &ctx, id).await?;
    section
        .delete(state.pool(), ctx.user()?)
        .await
        .map_err(section_error)?;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/sections/{id}/blocks",
    params(("id" = Uuid, Path, description = "Section id")),
    responses(
        (status = 200, description = "Content blocks in order", body = Vec<ContentBlock>),
        (status = 403, description = "Section of an unpublished module", body = ErrorResponse),
        (status = 404, description = "Section not found", body = ErrorResponse),
    ),
    tag = "modules"
)]
pub(crate) async fn section_blocks_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
) -> WebResult<impl IntoResponse> {
    let actor = ctx.actor();
    let section = find_section(&state, &ctx, id).await?;

    let module = LearningModule::find_by_id(state.pool(), &actor, section.module_id())
        .await
        .map_err(section_error)?
        .ok_or(WebError::resource_not_found(ResourceType::LearningModule))?;
    if !module.is_visible_to(ctx.maybe_user()) {
        return Err(WebError::resource_forbidden(ResourceType::LearningSection));
    }

    let blocks = ContentBlock::list_by_section(state.pool(), &actor, section.id())
        .await
        .map_err(block_error)?;

    Ok((StatusCode::OK, Json(blocks)))
}

#[utoipa::path(
    post,
    path = "/sections/{id}/blocks",
    params(("id" = Uuid, Path, description = "Section id")),
    request_body = ContentBlockCreate,
    responses(
        (status = 201, description = "Block appended", body = ContentBlock),
        (status = 400, description = "Validation failed", body = ErrorResponse),
        (status = 403, description = "Only the module creator or an admin", body = ErrorResponse),
        (status = 404, description = "Section not found", body = ErrorResponse),
    ),
    tag = "modules",
    security(("cookie" = []))
)]
pub(crate) async fn section_block_create_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
    ValidatedJson(payload): ValidatedJson<ContentBlockCreate>,
) -> WebResult<impl IntoResponse> {
    let section = find_owned_section(&state, &ctx, id).await?;
    let block = ContentBlock::create(state.pool(), ctx.user()?, payload.in_section(section.id()))
        .await
        .map_err(block_error)?;

    Ok((StatusCode::CREATED, Json(block)))
}
