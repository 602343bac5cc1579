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
        entity::{
            LearningModule, LearningModuleCreate, LearningSection, LearningSectionCreate,
            ModuleSearch,
        },
    },
    web::{
        AppState, PaginationQuery, RequestContext, ValidPath, ValidQuery, ValidatedJson, WebError,
        WebResult,
        error::ErrorResponse, middlewares,
    },
};

pub fn routes<S>(state: AppState) -> Router<S> {
    Router::new()
        .route("/", get(module_list_handler).post(module_create_handler))
        .route("/mine", get(module_mine_handler))
        .route("/search", get(module_search_handler))
        .route("/subjects", get(module_subjects_handler))
        .route("/levels", get(module_levels_handler))
        .route(
            "/{id}",
            get(module_get_handler)
                .put(module_update_handler)
                .delete(module_delete_handler),
        )
        .route("/{id}/publish", put(module_publish_handler))
        .route("/{id}/unpublish", put(module_unpublish_handler))
        .route("/{id}/clone", post(module_clone_handler))
        .route(
            "/{id}/sections",
            get(module_sections_handler).post(module_section_create_handler),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            middlewares::extract_context_fn,
        ))
        .with_state(state)
}

fn module_error(e: DatabaseError) -> WebError {
    WebError::from_database(ResourceType::LearningModule, e)
}

fn section_error(e: DatabaseError) -> WebError {
    WebError::from_database(ResourceType::LearningSection, e)
}

#[utoipa::path(
    get,
    path = "/modules",
    params(PaginationQuery),
    responses(
        (status = 200, description = "Published modules", body = Page<LearningModule>),
    ),
    tag = "modules"
)]
pub(crate) async fn module_list_handler(
    ctx: RequestContext,
    ValidQuery(page): ValidQuery<PaginationQuery>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let modules = LearningModule::page(state.pool(), &ctx.actor(), page.into())
        .await
        .map_err(module_error)?;

    Ok((StatusCode::OK, Json(modules)))
}

#[utoipa::path(
    get,
    path = "/modules/mine",
    responses(
        (status = 200, description = "Modules created by the caller, drafts included", body = Vec<LearningModule>),
        (status = 401, description = "Not signed in", body = ErrorResponse),
    ),
    tag = "modules",
    security(("cookie" = []))
)]
pub(crate) async fn module_mine_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let modules = LearningModule::list_by_creator(state.pool(), user)
        .await
        .map_err(module_error)?;

    Ok((StatusCode::OK, Json(modules)))
}

#[utoipa::path(
    get,
    path = "/modules/search",
    params(ModuleSearch, PaginationQuery),
    responses(
        (status = 200, description = "Published modules matching the filters", body = Page<LearningModule>),
    ),
    tag = "modules"
)]
pub(crate) async fn module_search_handler(
    ctx: RequestContext,
    ValidQuery(search): ValidQuery<ModuleSearch>,
    ValidQuery(page): ValidQuery<PaginationQuery>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let modules = LearningModule::search(state.pool(), &ctx.actor(), &search, page.into())
        .await
        .map_err(module_error)?;

    Ok((StatusCode::OK, Json(modules)))
}

#[utoipa::path(
    get,
    path = "/modules/subjects",
    responses(
        (status = 200, description = "Distinct subjects of published modules", body = Vec<String>),
    ),
    tag = "modules"
)]
pub(crate) async fn module_subjects_handler(
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let subjects = LearningModule::subjects(state.pool())
        .await
        .map_err(module_error)?;
    Ok((StatusCode::OK, Json(subjects)))
}

#[utoipa::path(
    get,
    path = "/modules/levels",
    responses(
        (status = 200, description = "Distinct levels of published modules", body = Vec<String>),
    ),
    tag = "modules"
)]
pub(crate) async fn module_levels_handler(
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let levels = LearningModule::levels(state.pool())
        .await
        .map_err(module_error)?;
    Ok((StatusCode::OK, Json(levels)))
}

/// Loads a module the caller is allowed to see.
async fn find_visible_module(
    state: &AppState,
    ctx: &RequestContext,
    id: Uuid,
) -> WebResult<LearningModule> {
    let module = LearningModule::find_by_id(state.pool(), &ctx.actor(), id)
        .await
        .map_err(module_error)?
        .ok_or(WebError::resource_not_found(ResourceType::LearningModule))?;

    if !module.is_visible_to(ctx.maybe_user()) {
        return Err(WebError::resource_forbidden(ResourceType::LearningModule));
    }
    Ok(module)
}

async fn find_owned_module(
    state: &AppState,
    ctx: &RequestContext,
    id: Uuid,
) -> WebResult<LearningModule> {
    let user = ctx.user()?;
    let module = LearningModule::find_by_id(state.pool(), user, id)
        .await
        .map_err(module_error)?
        .ok_or(WebError::resource_not_found(ResourceType::LearningModule))?;

    check_access(state.pool(), user, &module)
        .await
        .map_err(module_error)?;
    Ok(module)
}

#[utoipa::path(
    get,
    path = "/modules/{id}",
    params(("id" = Uuid, Path, description = "Module id")),
    responses(
        (status = 200, description = "Module", body = LearningModule),
        (status = 403, description = "Draft of another author", body = ErrorResponse),
        (status = 404, description = "Module not found", body = ErrorResponse),
    ),
    tag = "modules"
)]
pub(crate) async fn module_get_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
) -> WebResult<impl IntoResponse> {
    let module = find_visible_module(&state, &ctx, id).await?;
    Ok((StatusCode::OK, Json(module)))
}

#[utoipa::path(
    post,
    path = "/modules",
    request_body = LearningModuleCreate,
    responses(
        (status = 201, description = "Module created as a draft", body = LearningModule),
        (status = 400, description = "Validation failed", body = ErrorResponse),
        (status = 403, description = "Instructors and admins only", body = ErrorResponse),
    ),
    tag = "modules",
    security(("cookie" = []))
)]
pub(crate) async fn module_create_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<LearningModuleCreate>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    user.require_author()?;

    let module = LearningModule::create(state.pool(), user, payload)
        .await
        .map_err(module_error)?;

    Ok((StatusCode::CREATED, Json(module)))
}

#[utoipa::path(
    put,
    path = "/modules/{id}",
    params(("id" = Uuid, Path, description = "Module id")),
    request_body = LearningModuleCreate,
    responses(
        (status = 200, description = "Module updated", body = LearningModule),
        (status = 403, description = "Only the creator or an admin", body = ErrorResponse),
        (status = 404, description = "Module not found", body = ErrorResponse),
    ),
    tag = "modules",
    security(("cookie" = []))
)]
pub(crate) async fn module_update_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
    ValidatedJson(payload): ValidatedJson<LearningModuleCreate>,
) -> WebResult<impl IntoResponse> {
    let module = find_owned_module(&state, &ctx, id).await?;
    let updated = module
        .update(state.pool(), ctx.user()?, payload)
        .await
        .map_err(module_error)?;

    Ok((StatusCode::OK, Json(updated)))
}

#[utoipa::path(
    delete,
    path = "/modules/{id}",
    params(("id" = Uuid, Path, description = "Module id")),
    responses(
        (status = 204, description = "Module deleted with its sections and blocks"),
        (status = 403, description = "Only the creator or an admin", body = ErrorResponse),
        (status = 404, description = "Module not found", body = ErrorResponse),
    ),
    tag = "modules",
    security(("cookie" = []))
)]
pub(crate) async fn module_delete_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
) -> WebResult<impl IntoResponse> {
    let module = find_owned_module(&state, &ctx, id).await?;
    module
        .delete(state.pool(), ctx.user()?)
        .await
        .map_err(module_error)?;

    Ok(StatusCode::NO_CONTENT)
}

async fn set_published(
    state: &AppState,
    ctx: &RequestContext,
    id: Uuid,
    published: bool,
) -> WebResult<LearningModule> {
    let module = find_owned_module(state, ctx, id).await?;
    module
        .set_published(state.pool(), ctx.user()?, published)
        .await
        .map_err(module_error)
}

#[utoipa::path(
    put,
    path = "/modules/{id}/publish",
    params(("id" = Uuid, Path, description = "Module id")),
    responses(
        (status = 200, description = "Module published", body = LearningModule),
        (status = 403, description = "Only the creator or an admin", body = ErrorResponse),
    ),
    tag = "modules",
    security(("cookie" = []))
)]
pub(crate) async fn module_publish_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
) -> WebResult<impl IntoResponse> {
    let module = set_published(&state, &ctx, id, true).await?;
    Ok((StatusCode::OK, Json(module)))
}

#[utoipa::path(
    put,
    path = "/modules/{id}/unpublish",
    params(("id" = Uuid, Path, description = "Module id")),
    responses(
        (status = 200, description = "Module back to draft", body = LearningModule),
        (status = 403, description = "Only the creator or an admin", body = ErrorResponse),
    ),
    tag = "modules",
    security(("cookie" = []))
)]
pub(crate) async fn module_unpublish_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
) -> WebResult<impl IntoResponse> {
    let module = set_published(&state, &ctx, id, false).await?;
    Ok((StatusCode::OK, Json(module)))
}

#[utoipa::path(
    post,
    path = "/modules/{id}/clone",
    params(("id" = Uuid, Path, description = "Module id")),
    responses(
        (status = 201, description = "Unpublished copy owned by the caller", body = LearningModule),
        (status = 403, description = "Module is not visible to the caller", body = ErrorResponse),
        (status = 404, description = "Module not found", body = ErrorResponse),
    ),
    tag = "modules",
    security(("cookie" = []))
)]
pub(crate) async fn module_clone_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    user.require_author()?;

    let module = find_visible_module(&state, &ctx, id).await?;
    let copy = module
        .clone_for(state.pool(), user)
        .await
        .map_err(module_error)?;

    Ok((StatusCode::CREATED, Json(copy)))
}

#[utoipa::path(
    get,
    path = "/modules/{id}/sections",
    params(("id" = Uuid, Path, description = "Module id")),
    responses(
        (status = 200, description = "Sections in order", body = Vec<LearningSection>),
        (status = 403, description = "Draft of another author", body = ErrorResponse),
        (status = 404, description = "Module not found", body = ErrorResponse),
    ),
    tag = "modules"
)]
pub(crate) async fn module_sections_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
) -> WebResult<impl IntoResponse> {
    let module = find_visible_module(&state, &ctx, id).await?;
    let sections = LearningSection::list_by_module(state.pool(), &ctx.actor(), module.id())
        .await
        .map_err(section_error)?;

    Ok((StatusCode::OK, Json(sections)))
}

#[utoipa::path(
    post,
    path = "/modules/{id}/sections",
    params(("id" = Uuid, Path, description = "Module id")),
    request_body = LearningSectionCreate,
    responses(
        (status = 201, description = "Section appended", body = LearningSection),
        (status = 400, description = "Validation failed", body = ErrorResponse),
        (status = 403, description = "Only the creator or an admin", body = ErrorResponse),
        (status = 404, description = "Module not found", body = ErrorResponse),
    ),
    tag = "modules",
    security(("cookie" = []))
)]
pub(crate) async fn module_section_create_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
    ValidatedJson(payload): ValidatedJson<LearningSectionCreate>,
) -> WebResult<impl IntoResponse> {
    let module = find_owned_module(&state, &ctx, id).await?;
    let section = LearningSection::create(state.pool(), ctx.user()?, payload.in_module(module.id()))
        .await
        .map_err(section_error)?;

    Ok((StatusCode::CREATED, Json(section)))
}
