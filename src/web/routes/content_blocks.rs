use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::put,
};
use uuid::Uuid;

use crate::{
    model::{
        CrudRepository, DatabaseError, ResourceType, check_access,
        entity::{ContentBlock, ContentBlockCreate},
    },
    web::{
        AppState, RequestContext, ValidPath, ValidatedJson, WebError, WebResult,
        error::ErrorResponse,
        middlewares,
    },
};

pub fn routes<S>(state: AppState) -> Router<S> {
    Router::new()
        .route("/{id}", put(block_update_handler).delete(block_delete_handler))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            middlewares::extract_context_fn,
        ))
        .with_state(state)
}

fn block_error(e: DatabaseError) -> WebError {
    WebError::from_database(ResourceType::ContentBlock, e)
}

async fn find_owned_block(
    state: &AppState,
    ctx: &RequestContext,
    id: Uuid,
) -> WebResult<ContentBlock> {
    let user = ctx.user()?;
    let block = ContentBlock::find_by_id(state.pool(), user, id)
        .await
        .map_err(block_error)?
        .ok_or(WebError::resource_not_found(ResourceType::ContentBlock))?;

    check_access(state.pool(), user, &block)
        .await
        .map_err(block_error)?;
    Ok(block)
}

#[utoipa::path(
    put,
    path = "/content-blocks/{id}",
    params(("id" = Uuid, Path, description = "Content block id")),
    request_body = ContentBlockCreate,
    responses(
        (status = 200, description = "Block updated", body = ContentBlock),
        (status = 400, description = "Validation failed", body = ErrorResponse),
        (status = 403, description = "Only the module creator or an admin", body = ErrorResponse),
        (status = 404, description = "Block not found", body = ErrorResponse),
    ),
    tag = "modules",
    security(("cookie" = []))
)]
pub(crate) async fn block_update_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
    ValidatedJson(payload): ValidatedJson<ContentBlockCreate>,
) -> WebResult<impl IntoResponse> {
    let block = find_owned_block(&state, &ctx, id).await?;
    let section_id = block.section_id();
    let updated = block
        .update(state.pool(), ctx.user()?, payload.in_section(section_id))
        .await
        .map_err(block_error)?;

    Ok((StatusCode::OK, Json(updated)))
}

#[utoipa::path(
    delete,
    path = "/content-blocks/{id}",
    params(("id" = Uuid, Path, description = "Content block id")),
    responses(
        (status = 204, description = "Block deleted"),
        (status = 403, description = "Only the module creator or an admin", body = ErrorResponse),
        (status = 404, description = "Block not found", body = ErrorResponse),
    ),
    tag = "modules",
    security(("cookie" = []))
)]
pub(crate) async fn block_delete_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
) -> WebResult<impl IntoResponse> {
    let block = find_owned_block(&state, &ctx, id).await?;
    block
        .delete(state.pool(), ctx.user()?)
        .await
        .map_err(block_error)?;

    Ok(StatusCode::NO_CONTENT)
}
