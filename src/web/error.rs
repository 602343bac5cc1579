use std::collections::HashMap;

use axum::{Json, http::StatusCode, response::IntoResponse};
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    auth::CryptError,
    error::log_error,
    model::{DatabaseError, ResourceType},
};

pub type WebResult<T> = std::result::Result<T, WebError>;

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("RegistrationUserConflict")]
    RegistrationUserConflict,

    #[error("RegistrationRoleForbidden")]
    RegistrationRoleForbidden,
}

#[derive(Debug, Error)]
pub enum AuthenticationError {
    #[error("AuthenticationCookieInvalid, cookie: {cookie}. Error: {error}")]
    AuthenticationCookieInvalid {
        cookie: String,
        error: jsonwebtoken::errors::Error,
    },

    #[error("AuthenticationRequired")]
    AuthenticationRequired,

    #[error("AuthenticationInvalidCredentials")]
    AuthenticationInvalidCredentials,

    #[error("AuthenticationAccountDisabled")]
    AuthenticationAccountDisabled,

    #[error("AuthenticationRoleForbidden")]
    AuthenticationRoleForbidden,
}

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("ResourceNotFound: {resource_type:?}")]
    ResourceNotFound { resource_type: ResourceType },

    #[error("ResourceForbidden: {resource_type:?}")]
    ResourceForbidden { resource_type: ResourceType },

    #[error("ResourceFetchError: {resource_type:?}. Error: {error}")]
    ResourceFetchError {
        resource_type: ResourceType,
        error: DatabaseError,
    },

    #[error("ResourceBadRequest: {resource_type:?}, {reason}")]
    ResourceBadRequest {
        resource_type: ResourceType,
        reason: String,
    },

    #[error("ResourceConflict: {resource_type:?}, {reason}")]
    ResourceConflict {
        resource_type: ResourceType,
        reason: String,
    },
}

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("RequestValidationFailed: {0}")]
    RequestValidationFailed(#[from] validator::ValidationErrors),

    #[error("RequestMalformedBody: {0}")]
    RequestMalformedBody(String),

    #[error("RequestMalformedParameters: {0}")]
    RequestMalformedParameters(String),
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("ServerCryptError: {0}")]
    ServerCryptError(#[from] CryptError),
}

impl ServerError {
    pub fn status_code(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }

    pub fn client_display(&self) -> String {
        String::from("Internal server error.")
    }
}

impl RegistrationError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::RegistrationUserConflict => StatusCode::CONFLICT,
            Self::RegistrationRoleForbidden => StatusCode::FORBIDDEN,
        }
    }

    pub fn client_display(&self) -> String {
        match self {
            Self::RegistrationUserConflict => {
                String::from("Registration error, email is already registered.")
            }
            Self::RegistrationRoleForbidden => {
                String::from("Registration error, this role cannot be self-assigned.")
            }
        }
    }
}

impl AuthenticationError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::AuthenticationRequired => StatusCode::UNAUTHORIZED,
            Self::AuthenticationInvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::AuthenticationCookieInvalid { .. } => StatusCode::UNAUTHORIZED,
            Self::AuthenticationAccountDisabled => StatusCode::FORBIDDEN,
            Self::AuthenticationRoleForbidden => StatusCode::FORBIDDEN,
        }
    }

    pub fn client_display(&self) -> String {
        match self {
            Self::AuthenticationCookieInvalid { .. } => {
                String::from("Authentication error, cookie invalid.")
            }
            Self::AuthenticationRequired => String::from("Authentication required."),
            Self::AuthenticationInvalidCredentials => {
                String::from("Authentication error, invalid email or password.")
            }
            Self::AuthenticationAccountDisabled => {
                String::from("Authentication error, account is deactivated.")
            }
            Self::AuthenticationRoleForbidden => {
                String::from("Your role is not allowed to do this.")
            }
        }
    }
}

impl ResourceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ResourceNotFound { .. } => StatusCode::NOT_FOUND,
            Self::ResourceForbidden { .. } => StatusCode::FORBIDDEN,
            Self::ResourceFetchError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ResourceBadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::ResourceConflict { .. } => StatusCode::CONFLICT,
        }
    }

    pub fn client_display(&self) -> String {
        match self {
            Self::ResourceNotFound { resource_type } => {
                format!("Resource error, {resource_type:?} not found.")
            }
            Self::ResourceForbidden { .. } => String::from("Resource error, resource forbidden."),
            Self::ResourceFetchError { .. } => {
                String::from("Resource error, unable to fetch resource.")
            }
            Self::ResourceBadRequest { reason, .. } => format!("Bad request, {reason}."),
            Self::ResourceConflict { reason, .. } => format!("Conflict, {reason}."),
        }
    }
}

impl RequestError {
    pub fn status_code(&self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }

    pub fn client_display(&self) -> String {
        match self {
            Self::RequestValidationFailed(_) => String::from("Validation failed"),
            Self::RequestMalformedBody(reason) => format!("Malformed request body: {reason}"),
            Self::RequestMalformedParameters(reason) => {
                format!("Malformed request parameters: {reason}")
            }
        }
    }

    /// Field name to first message, for validation failures only.
    pub fn field_errors(&self) -> Option<HashMap<String, String>> {
        let Self::RequestValidationFailed(errors) = self else {
            return None;
        };

        let mut fields = HashMap::new();
        collect_field_errors(errors, "", &mut fields);
        Some(fields)
    }
}

fn collect_field_errors(
    errors: &validator::ValidationErrors,
    prefix: &str,
    out: &mut HashMap<String, String>,
) {
    use validator::ValidationErrorsKind;

    for (field, kind) in errors.errors() {
        let name = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };

        match kind {
            ValidationErrorsKind::Field(list) => {
                if let Some(first) = list.first() {
                    let message = first
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| first.code.to_string());
                    out.insert(name, message);
                }
            }
            ValidationErrorsKind::Struct(nested) => collect_field_errors(nested, &name, out),
            ValidationErrorsKind::List(items) => {
                for (index, nested) in items {
                    collect_field_errors(nested, &format!("{name}[{index}]"), out);
                }
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum WebError {
    #[error("ResourceError - {0}")]
    ResourceError(#[from] ResourceError),
    #[error("AuthenticationError - {0}")]
    AuthenticationError(#[from] AuthenticationError),
    #[error("RegistrationError - {0}")]
    RegistrationError(#[from] RegistrationError),
    #[error("RequestError - {0}")]
    RequestError(#[from] RequestError),
    #[error("ServerError - {0}")]
    ServerError(#[from] ServerError),
}

impl WebError {
    pub fn resource_not_found(r#type: ResourceType) -> Self {
        Self::ResourceError(ResourceError::ResourceNotFound {
            resource_type: r#type,
        })
    }

    pub fn resource_forbidden(r#type: ResourceType) -> Self {
        Self::ResourceError(ResourceError::ResourceForbidden {
            resource_type: r#type,
        })
    }

    pub fn resource_fetch_error(r#type: ResourceType, error: DatabaseError) -> Self {
        Self::ResourceError(ResourceError::ResourceFetchError {
            resource_type: r#type,
            error,
        })
    }

    pub fn resource_bad_request<S: Into<String>>(r#type: ResourceType, reason: S) -> Self {
        Self::ResourceError(ResourceError::ResourceBadRequest {
            resource_type: r#type,
            reason: reason.into(),
        })
    }

    pub fn resource_conflict<S: Into<String>>(r#type: ResourceType, reason: S) -> Self {
        Self::ResourceError(ResourceError::ResourceConflict {
            resource_type: r#type,
            reason: reason.into(),
        })
    }

    /// Maps a model error onto the status bucket it belongs to.
    pub fn from_database(r#type: ResourceType, error: DatabaseError) -> Self {
        match error {
            DatabaseError::NotFound(resource_type) => Self::resource_not_found(resource_type),
            DatabaseError::Forbidden => Self::resource_forbidden(r#type),
            DatabaseError::Conflict(reason) => Self::resource_conflict(r#type, reason),
            DatabaseError::StaleVersion(resource_type) => Self::resource_conflict(
                resource_type,
                "resource was modified concurrently, reload and retry",
            ),
            DatabaseError::InvalidState(reason) => Self::resource_bad_request(r#type, reason),
            error => Self::resource_fetch_error(r#type, error),
        }
    }

    pub fn auth_cookie_invalid<S: Into<String>>(
        cookie: S,
        error: jsonwebtoken::errors::Error,
    ) -> Self {
        Self::AuthenticationError(AuthenticationError::AuthenticationCookieInvalid {
            cookie: cookie.into(),
            error,
        })
    }

    pub fn auth_required() -> Self {
        Self::AuthenticationError(AuthenticationError::AuthenticationRequired)
    }

    pub fn auth_invalid_credentials() -> Self {
        Self::AuthenticationError(AuthenticationError::AuthenticationInvalidCredentials)
    }

    pub fn auth_account_disabled() -> Self {
        Self::AuthenticationError(AuthenticationError::AuthenticationAccountDisabled)
    }

    pub fn role_forbidden() -> Self {
        Self::AuthenticationError(AuthenticationError::AuthenticationRoleForbidden)
    }

    pub fn registration_conflict() -> Self {
        Self::RegistrationError(RegistrationError::RegistrationUserConflict)
    }

    pub fn registration_role_forbidden() -> Self {
        Self::RegistrationError(RegistrationError::RegistrationRoleForbidden)
    }

    pub fn validation(errors: validator::ValidationErrors) -> Self {
        Self::RequestError(RequestError::RequestValidationFailed(errors))
    }

    pub fn malformed_body<S: Into<String>>(reason: S) -> Self {
        Self::RequestError(RequestError::RequestMalformedBody(reason.into()))
    }

    pub fn malformed_parameters<S: Into<String>>(reason: S) -> Self {
        Self::RequestError(RequestError::RequestMalformedParameters(reason.into()))
    }

    pub fn server_crypt_error(e: CryptError) -> Self {
        Self::ServerError(ServerError::ServerCryptError(e))
    }

    pub fn status_code(&self) -> axum::http::StatusCode {
        match self {
            Self::ResourceError(e) => e.status_code(),
            Self::RegistrationError(e) => e.status_code(),
            Self::AuthenticationError(e) => e.status_code(),
            Self::RequestError(e) => e.status_code(),
            Self::ServerError(e) => e.status_code(),
        }
    }

    pub fn client_display(&self) -> String {
        match self {
            Self::ResourceError(e) => e.client_display(),
            Self::RegistrationError(e) => e.client_display(),
            Self::AuthenticationError(e) => e.client_display(),
            Self::RequestError(e) => e.client_display(),
            Self::ServerError(e) => e.client_display(),
        }
    }
}

#[derive(serde::Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    /// Human-readable message for the client
    pub message: String,
    /// HTTP status code (stringified)
    pub status_code: String,
    pub timestamp: DateTime<Utc>,
    /// Optional debug details (only in debug mode)
    pub details: Option<String>,
    /// Field errors of a failed validation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<HashMap<String, String>>,
}

impl IntoResponse for WebError {
    fn into_response(self) -> axum::response::Response {
        let status_code = self.status_code();
        if status_code.is_server_error() {
            log_error(&self);
        } else {
            tracing::debug!("request rejected: {}", self);
        }

        let errors = match &self {
            Self::RequestError(e) => e.field_errors(),
            _ => None,
        };

        let body = ErrorResponse {
            message: self.client_display(),
            status_code: status_code.as_str().to_string(),
            timestamp: Utc::now(),
            details: if cfg!(debug_assertions) {
                Some(self.to_string())
            } else {
                None
            },
            errors,
        };

        (status_code, Json(body)).into_response()
    }
}

#[cfg(test)]
mod test {
    use validator::Validate;

    use super::*;

    #[derive(Validate)]
    struct Body {
        #[validate(length(min = 3, message = "too short"))]
        name: String,
    }

    #[test]
    fn database_errors_map_to_status() {
        let cases = [
            (DatabaseError::NotFound(ResourceType::Course), StatusCode::NOT_FOUND),
            (DatabaseError::Forbidden, StatusCode::FORBIDDEN),
            (DatabaseError::conflict("full"), StatusCode::CONFLICT),
            (DatabaseError::StaleVersion(ResourceType::Course), StatusCode::CONFLICT),
            (DatabaseError::invalid_state("draft"), StatusCode::BAD_REQUEST),
        ];

        for (error, status) in cases {
            let web = WebError::from_database(ResourceType::Course, error);
            assert_eq!(web.status_code(), status);
        }
    }

    #[test]
    fn validation_errors_are_listed_per_field() {
        let errors = Body { name: "ab".into() }.validate().unwrap_err();
        let web = WebError::validation(errors);
        assert_eq!(web.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(web.client_display(), "Validation failed");

        let WebError::RequestError(request) = web else {
            panic!("expected request error");
        };
        let fields = request.field_errors().unwrap();
        assert_eq!(fields.get("name").map(String::as_str), Some("too short"));
    }

    #[test]
    fn server_errors_hide_details() {
        let kind = jsonwebtoken::errors::ErrorKind::InvalidKeyFormat;
        let web = WebError::server_crypt_error(CryptError::JwtError(kind.into()));
        assert_eq!(web.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(web.client_display(), "Internal server error.");
    }
}
