use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use tower_cookies::{Cookie, Cookies};

use crate::{
    auth::{self, UserClaims, hash_password, verify_password},
    model::{CrudRepository, ResourceType, Role, entity::UserEntity},
    web::{
        AppState, AuthenticatedUser, RequestContext, ValidatedJson, WebError, WebResult,
        dto::{LoginBody, MessageResponse, RegisterBody},
        error::ErrorResponse,
        middlewares::{self, AUTH_TOKEN, session_cookie},
    },
};

pub fn routes<S>(state: AppState) -> Router<S> {
    let with_context = Router::new()
        .route("/me", get(auth_me_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            middlewares::extract_context_fn,
        ));

    Router::new()
        .route("/register", post(auth_register_handler))
        .route("/login", post(auth_login_handler))
        .route("/logout", post(auth_logout_handler))
        .merge(with_context)
        .with_state(state)
}

fn issue_cookie(state: &AppState, cookies: &Cookies, user: &UserEntity) -> WebResult<()> {
    let app = state.config().app();
    let claims = UserClaims::for_user(user.id(), app.token_ttl_hours());
    let token = auth::generate_token(claims, app.jwt())
        .map_err(|e| WebError::server_crypt_error(e.into()))?;

    cookies.add(session_cookie(token));
    Ok(())
}

#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterBody,
    description = "Registers a new account and signs it in",
    responses(
        (status = 201, description = "User registered", body = UserEntity),
        (status = 400, description = "Validation failed", body = ErrorResponse),
        (status = 403, description = "Role cannot be self-assigned", body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "auth"
)]
pub(crate) async fn auth_register_handler(
    State(state): State<AppState>,
    cookies: Cookies,
    ValidatedJson(payload): ValidatedJson<RegisterBody>,
) -> WebResult<impl IntoResponse> {
    if payload.role == Some(Role::Admin) {
        return Err(WebError::registration_role_forbidden());
    }

    let admin = AuthenticatedUser::admin();
    let exists = UserEntity::exists_by_email(state.pool(), &payload.email)
        .await
        .map_err(|e| WebError::resource_fetch_error(ResourceType::User, e))?;
    if exists {
        return Err(WebError::registration_conflict());
    }

    let hash = hash_password(&payload.password).map_err(WebError::server_crypt_error)?;
    let created = UserEntity::create(state.pool(), &admin, payload.into_entity(hash))
        .await
        .map_err(|e| WebError::from_database(ResourceType::User, e))?;

    issue_cookie(&state, &cookies, &created)?;
    tracing::info!("registered user {}", created.id());

    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    description = "Signs in with email and password",
    request_body = LoginBody,
    responses(
        (status = 200, description = "User signed in", body = UserEntity),
        (status = 401, description = "Credentials invalid", body = ErrorResponse),
        (status = 403, description = "Account is deactivated", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "auth",
)]
pub(crate) async fn auth_login_handler(
    State(state): State<AppState>,
    cookies: Cookies,
    ValidatedJson(payload): ValidatedJson<LoginBody>,
) -> WebResult<impl IntoResponse> {
    let admin = AuthenticatedUser::admin();
    let found = UserEntity::find_by_email(state.pool(), &admin, &payload.email)
        .await
        .map_err(|e| WebError::resource_fetch_error(ResourceType::User, e))?
        .ok_or(WebError::auth_invalid_credentials())?;

    let is_verified =
        verify_password(found.hash(), &payload.password).map_err(WebError::server_crypt_error)?;
    if !is_verified {
        return Err(WebError::auth_invalid_credentials());
    }

    if !found.is_active() {
        return Err(WebError::auth_account_disabled());
    }

    issue_cookie(&state, &cookies, &found)?;
    Ok((StatusCode::OK, Json(found)))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    description = "Drops the session cookie",
    responses(
        (status = 200, description = "Signed out", body = MessageResponse),
    ),
    tag = "auth",
)]
pub(crate) async fn auth_logout_handler(cookies: Cookies) -> WebResult<impl IntoResponse> {
    let mut cookie = Cookie::from(AUTH_TOKEN);
    cookie.set_path("/");
    cookies.remove(cookie);

    Ok((StatusCode::OK, Json(MessageResponse::new("Signed out"))))
}

#[utoipa::path(
    get,
    path = "/auth/me",
    description = "Returns the signed in user",
    responses(
        (status = 200, description = "Current user", body = UserEntity),
        (status = 401, description = "Not signed in", body = ErrorResponse),
    ),
    tag = "auth",
    security(
        ("cookie" = [])
    )
)]
pub(crate) async fn auth_me_handler(
    ctx: RequestContext,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let found = UserEntity::find_by_id(state.pool(), user, user.user_id())
        .await
        .map_err(|e| WebError::resource_fetch_error(ResourceType::User, e))?
        .ok_or(WebError::auth_required())?;

    Ok((StatusCode::OK, Json(found)))
}
