use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, patch},
};
use uuid::Uuid;

use crate::{
    auth::hash_password,
    model::{
        CrudRepository, DatabaseError, Page, PaginatableRepository, ResourceType, Role,
        check_access,
        entity::{UserEntity, UserEntityCreateUpdate, UserStatistics},
    },
    web::{
        AppState, PaginationQuery, RequestContext, ValidPath, ValidQuery, ValidatedJson, WebError,
        WebResult,
        dto::{NameQuery, RegisterBody, UserUpdateBody},
        error::ErrorResponse,
        middlewares,
    },
};

pub fn routes<S>(state: AppState) -> Router<S> {
    Router::new()
        .route("/", get(user_list_handler).post(user_create_handler))
        .route("/active", get(user_active_handler))
        .route("/search", get(user_search_handler))
        .route("/statistics", get(user_statistics_handler))
        .route("/role/{role}", get(user_by_role_handler))
        .route("/email/{email}/exists", get(user_email_exists_handler))
        .route(
            "/{id}",
            get(user_get_handler)
                .put(user_update_handler)
                .delete(user_delete_handler),
        )
        .route("/{id}/activate", patch(user_activate_handler))
        .route("/{id}/deactivate", patch(user_deactivate_handler))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            middlewares::extract_context_fn,
        ))
        .with_state(state)
}

fn user_error(e: DatabaseError) -> WebError {
    WebError::from_database(ResourceType::User, e)
}

#[utoipa::path(
    post,
    path = "/api/users",
    request_body = RegisterBody,
    description = "Creates a user with any role",
    responses(
        (status = 201, description = "User created", body = UserEntity),
        (status = 400, description = "Validation failed", body = ErrorResponse),
        (status = 403, description = "Admins only", body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse),
    ),
    tag = "users",
    security(("cookie" = []))
)]
pub(crate) async fn user_create_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<RegisterBody>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    user.require_admin()?;

    let hash = hash_password(&payload.password).map_err(WebError::server_crypt_error)?;
    let created = UserEntity::create(state.pool(), user, payload.into_entity(hash))
        .await
        .map_err(user_error)?;

    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    get,
    path = "/api/users",
    params(PaginationQuery),
    responses(
        (status = 200, description = "Returns requested page", body = Page<UserEntity>),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 403, description = "Admins only", body = ErrorResponse),
    ),
    tag = "users",
    security(("cookie" = []))
)]
pub(crate) async fn user_list_handler(
    ctx: RequestContext,
    ValidQuery(page): ValidQuery<PaginationQuery>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    user.require_admin()?;

    let users = UserEntity::page(state.pool(), user, page.into())
        .await
        .map_err(user_error)?;

    Ok((StatusCode::OK, Json(users)))
}

#[utoipa::path(
    get,
    path = "/api/users/active",
    params(PaginationQuery),
    responses(
        (status = 200, description = "Active users", body = Page<UserEntity>),
        (status = 403, description = "Admins only", body = ErrorResponse),
    ),
    tag = "users",
    security(("cookie" = []))
)]
pub(crate) async fn user_active_handler(
    ctx: RequestContext,
    ValidQuery(page): ValidQuery<PaginationQuery>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    user.require_admin()?;

    let users = UserEntity::page_active(state.pool(), user, page.into())
        .await
        .map_err(user_error)?;

    Ok((StatusCode::OK, Json(users)))
}

#[utoipa::path(
    get,
    path = "/api/users/search",
    params(NameQuery, PaginationQuery),
    responses(
        (status = 200, description = "Users matching the name", body = Page<UserEntity>),
        (status = 403, description = "Admins only", body = ErrorResponse),
    ),
    tag = "users",
    security(("cookie" = []))
)]
pub(crate) async fn user_search_handler(
    ctx: RequestContext,
    ValidQuery(search): ValidQuery<NameQuery>,
    ValidQuery(page): ValidQuery<PaginationQuery>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    user.require_admin()?;

    let users = UserEntity::search_by_name(state.pool(), user, &search.name, page.into())
        .await
        .map_err(user_error)?;

    Ok((StatusCode::OK, Json(users)))
}

#[utoipa::path(
    get,
    path = "/api/users/statistics",
    responses(
        (status = 200, description = "User totals", body = UserStatistics),
        (status = 403, description = "Admins only", body = ErrorResponse),
    ),
    tag = "users",
    security(("cookie" = []))
)]
pub(crate) async fn user_statistics_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    ctx.user()?.require_admin()?;

    let stats = UserEntity::statistics(state.pool()).await.map_err(user_error)?;
    Ok((StatusCode::OK, Json(stats)))
}

#[utoipa::path(
    get,
    path = "/api/users/role/{role}",
    params(
        ("role" = Role, Path, description = "INSTRUCTOR, STUDENT or ADMIN"),
        PaginationQuery,
    ),
    responses(
        (status = 200, description = "Users with the role", body = Page<UserEntity>),
        (status = 403, description = "Admins only", body = ErrorResponse),
    ),
    tag = "users",
    security(("cookie" = []))
)]
pub(crate) async fn user_by_role_handler(
    ctx: RequestContext,
    ValidPath(role): ValidPath<Role>,
    ValidQuery(page): ValidQuery<PaginationQuery>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    user.require_admin()?;

    let users = UserEntity::page_by_role(state.pool(), user, role, page.into())
        .await
        .map_err(user_error)?;

    Ok((StatusCode::OK, Json(users)))
}

#[utoipa::path(
    get,
    path = "/api/users/email/{email}/exists",
    params(("email" = String, Path, description = "Email to look up")),
    responses(
        (status = 200, description = "Whether the email is registered", body = bool),
    ),
    tag = "users"
)]
pub(crate) async fn user_email_exists_handler(
    ValidPath(email): ValidPath<String>,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let exists = UserEntity::exists_by_email(state.pool(), &email)
        .await
        .map_err(user_error)?;

    Ok((StatusCode::OK, Json(exists)))
}

async fn find_user(state: &AppState, ctx: &RequestContext, id: Uuid) -> WebResult<UserEntity> {
    let user = ctx.user()?;
    let found = UserEntity::find_by_id(state.pool(), user, id)
        .await
        .map_err(user_error)?
        .ok_or(WebError::resource_not_found(ResourceType::User))?;

    check_access(state.pool(), user, &found)
        .await
        .map_err(user_error)?;

    Ok(found)
}

#[utoipa::path(
    get,
    path = "/api/users/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "User", body = UserEntity),
        (status = 403, description = "Only the user or an admin", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
    ),
    tag = "users",
    security(("cookie" = []))
)]
pub(crate) async fn user_get_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
) -> WebResult<impl IntoResponse> {
    let found = find_user(&state, &ctx, id).await?;
    Ok((StatusCode::OK, Json(found)))
}

#[utoipa::path(
    put,
    path = "/api/users/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = UserUpdateBody,
    responses(
        (status = 200, description = "User updated successfully", body = UserEntity),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 403, description = "Only the user or an admin; role changes are admin only", body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse),
    ),
    tag = "users",
    security(("cookie" = []))
)]
pub(crate) async fn user_update_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
    ValidatedJson(payload): ValidatedJson<UserUpdateBody>,
) -> WebResult<impl IntoResponse> {
    let found = find_user(&state, &ctx, id).await?;
    let user = ctx.user()?;

    if payload.role.is_some_and(|role| role != found.role()) {
        user.require_admin()?;
    }

    let password_hash = match &payload.password {
        Some(password) => Some(hash_password(password).map_err(WebError::server_crypt_error)?),
        None => None,
    };

    let data = UserEntityCreateUpdate {
        first_name: payload.first_name.unwrap_or_else(|| found.first_name().to_string()),
        last_name: payload.last_name.unwrap_or_else(|| found.last_name().to_string()),
        email: payload.email.unwrap_or_else(|| found.email().to_string()),
        password_hash,
        role: payload.role.unwrap_or(found.role()),
        bio: payload.bio.or_else(|| found.bio().map(str::to_string)),
        phone: payload.phone.or_else(|| found.phone().map(str::to_string)),
        city: payload.city.or_else(|| found.city().map(str::to_string)),
        country: payload.country.or_else(|| found.country().map(str::to_string)),
    };

    let updated = found
        .update(state.pool(), user, data)
        .await
        .map_err(user_error)?;

    Ok((StatusCode::OK, Json(updated)))
}

#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    description = "Deletes specified user",
    responses(
        (status = 204, description = "User deleted successfully"),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 403, description = "Only the user or an admin", body = ErrorResponse),
    ),
    tag = "users",
    security(("cookie" = []))
)]
pub(crate) async fn user_delete_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
) -> WebResult<impl IntoResponse> {
    let found = find_user(&state, &ctx, id).await?;

    found
        .delete(state.pool(), ctx.user()?)
        .await
        .map_err(user_error)?;

    Ok(StatusCode::NO_CONTENT)
}

async fn set_active(
    ctx: RequestContext,
    state: AppState,
    id: Uuid,
    active: bool,
) -> WebResult<UserEntity> {
    let user = ctx.user()?;
    user.require_admin()?;

    let found = find_user(&state, &ctx, id).await?;
    found
        .set_active(state.pool(), user, active)
        .await
        .map_err(user_error)
}

#[utoipa::path(
    patch,
    path = "/api/users/{id}/activate",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "User activated", body = UserEntity),
        (status = 403, description = "Admins only", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
    ),
    tag = "users",
    security(("cookie" = []))
)]
pub(crate) async fn user_activate_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
) -> WebResult<impl IntoResponse> {
    let updated = set_active(ctx, state, id, true).await?;
    Ok((StatusCode::OK, Json(updated)))
}

#[utoipa::path(
    patch,
    path = "/api/users/{id}/deactivate",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "User deactivated", body = UserEntity),
        (status = 403, description = "Admins only", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
    ),
    tag = "users",
    security(("cookie" = []))
)]
pub(crate) async fn user_deactivate_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
) -> WebResult<impl IntoResponse> {
    let updated = set_active(ctx, state, id, false).await?;
    Ok((StatusCode::OK, Json(updated)))
}
