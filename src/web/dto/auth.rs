use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::model::{Role, entity::UserEntityCreateUpdate};

/// Registration and admin user creation share one shape.
#[derive(Debug, Clone, Deserialize, Validate, utoipa::ToSchema)]
pub struct RegisterBody {
    #[validate(length(min = 1, max = 100, message = "first name must be 1-100 characters"))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100, message = "last name must be 1-100 characters"))]
    pub last_name: String,
    #[validate(email(message = "email is not valid"))]
    pub email: String,
    #[validate(length(min = 6, max = 128, message = "password must be at least 6 characters"))]
    pub password: String,
    pub role: Option<Role>,
    #[validate(length(max = 1000))]
    pub bio: Option<String>,
    #[validate(length(max = 30))]
    pub phone: Option<String>,
    #[validate(length(max = 100))]
    pub city: Option<String>,
    #[validate(length(max = 100))]
    pub country: Option<String>,
}

impl RegisterBody {
    pub fn into_entity(self, password_hash: String) -> UserEntityCreateUpdate {
        UserEntityCreateUpdate {
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            password_hash: Some(password_hash),
            role: self.role.unwrap_or_default(),
            bio: self.bio,
            phone: self.phone,
            city: self.city,
            country: self.country,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate, utoipa::ToSchema)]
pub struct LoginBody {
    #[validate(length(min = 1, message = "email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

/// Profile update; fields left out keep their value.
#[derive(Debug, Clone, Default, Deserialize, Validate, utoipa::ToSchema)]
pub struct UserUpdateBody {
    #[validate(length(min = 1, max = 100))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub last_name: Option<String>,
    #[validate(email(message = "email is not valid"))]
    pub email: Option<String>,
    #[validate(length(min = 6, max = 128, message = "password must be at least 6 characters"))]
    pub password: Option<String>,
    pub role: Option<Role>,
    #[validate(length(max = 1000))]
    pub bio: Option<String>,
    #[validate(length(max = 30))]
    pub phone: Option<String>,
    #[validate(length(max = 100))]
    pub city: Option<String>,
    #[validate(length(max = 100))]
    pub country: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn body() -> RegisterBody {
        RegisterBody {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: "ada@example.com".into(),
            password: "secret1".into(),
            role: None,
            bio: None,
            phone: None,
            city: None,
            country: None,
        }
    }

    #[test]
    fn register_defaults_to_student() {
        let body = body();
        assert!(body.validate().is_ok());
        assert_eq!(body.into_entity("hash".into()).role, Role::Student);
    }

    #[test]
    fn register_rejects_bad_email_and_short_password() {
        let mut bad = body();
        bad.email = "not-an-email".into();
        bad.password = "123".into();

        let errors = bad.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("password"));
    }
}
