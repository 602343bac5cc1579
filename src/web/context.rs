//! Request context, e.g. user id, its role, etc.
//!

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::{
    model::Role,
    web::{WebResult, error::WebError},
};

#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    user_id: uuid::Uuid,
    role: Role,
}

impl AuthenticatedUser {
    pub fn new(user_id: uuid::Uuid, role: Role) -> Self {
        Self { user_id, role }
    }

    /// System actor used for lookups that happen before anyone is signed in.
    pub fn admin() -> Self {
        Self {
            role: Role::Admin,
            user_id: uuid::Uuid::max(),
        }
    }

    pub fn user_id(&self) -> uuid::Uuid {
        self.user_id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_admin(&self) -> WebResult<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(WebError::role_forbidden())
        }
    }

    pub fn require_author(&self) -> WebResult<()> {
        if self.role.can_author() {
            Ok(())
        } else {
            Err(WebError::role_forbidden())
        }
    }
}

#[derive(Debug, Clone)]
pub struct RequestContext {
    maybe_user: Option<AuthenticatedUser>,
}

impl RequestContext {
    pub fn new(maybe_user: Option<AuthenticatedUser>) -> Self {
        Self { maybe_user }
    }

    pub fn admin() -> Self {
        Self::new(Some(AuthenticatedUser::admin()))
    }

    pub fn maybe_user(&self) -> Option<&AuthenticatedUser> {
        self.maybe_user.as_ref()
    }

    pub fn user(&self) -> WebResult<&AuthenticatedUser> {
        self.maybe_user.as_ref().ok_or(WebError::auth_required())
    }

    /// Signed-in user or the anonymous system actor for public reads.
    pub fn actor(&self) -> AuthenticatedUser {
        self.maybe_user
            .clone()
            .unwrap_or_else(|| AuthenticatedUser::new(uuid::Uuid::nil(), Role::Student))
    }
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = WebError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ctx = parts.extensions.get::<RequestContext>();
        if let Some(ctx) = ctx {
            Ok(ctx.clone())
        } else {
            Ok(RequestContext::new(None))
        }
    }
}
