//! API models for user registration, login and account updates.

use serde::{Deserialize, Serialize};

use crate::api::models::{FieldErrors, is_valid_email};
use crate::db::models::users::UserDBResponse;
use crate::errors::Error;
use crate::types::UserId;

pub const MIN_USERNAME_LEN: usize = 4;
pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_FIELD_LEN: usize = 255;

/// The authenticated user as handlers see it (no password hash)
#[derive(Debug, Clone, Serialize)]
pub struct CurrentUser {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub bio: String,
    pub image: Option<String>,
}

impl From<UserDBResponse> for CurrentUser {
    fn from(user: UserDBResponse) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            bio: user.bio,
            image: user.image,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub user: RegisterFields,
}

#[derive(Debug, Deserialize)]
pub struct RegisterFields {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl RegisterFields {
    pub fn validate(&self) -> Result<(), Error> {
        let mut errors = FieldErrors::default();

        if self.username.chars().count() < MIN_USERNAME_LEN {
            errors.push("username", format!("must be at least {MIN_USERNAME_LEN} characters"));
        }
        if self.username.chars().count() > MAX_FIELD_LEN {
            errors.push("username", format!("must be at most {MAX_FIELD_LEN} characters"));
        }
        if !is_valid_email(&self.email) {
            errors.push("email", "is not a valid email address");
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            errors.push("password", format!("must be at least {MIN_PASSWORD_LEN} characters"));
        }

        errors.into_result()
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub user: LoginFields,
}

#[derive(Debug, Deserialize)]
pub struct LoginFields {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct UserUpdateRequest {
    pub user: UserUpdateFields,
}

/// Partial account update. Omitted *and* empty-string fields both mean
/// "leave unchanged", matching what existing clients send.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UserUpdateFields {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub bio: Option<String>,
    pub image: Option<String>,
}

impl UserUpdateFields {
    /// Collapse empty strings into `None` so the update layer only sees
    /// fields that actually change.
    pub fn normalized(self) -> Self {
        let keep = |v: Option<String>| v.filter(|s| !s.is_empty());
        Self {
            username: keep(self.username),
            email: keep(self.email),
            password: keep(self.password),
            bio: keep(self.bio),
            image: keep(self.image),
        }
    }

    /// Validate whatever fields are present; call on the normalized form.
    pub fn validate(&self) -> Result<(), Error> {
        let mut errors = FieldErrors::default();

        if let Some(username) = &self.username {
            if username.chars().count() < MIN_USERNAME_LEN {
                errors.push("username", format!("must be at least {MIN_USERNAME_LEN} characters"));
            }
        }
        if let Some(email) = &self.email {
            if !is_valid_email(email) {
                errors.push("email", "is not a valid email address");
            }
        }
        if let Some(password) = &self.password {
            if password.chars().count() < MIN_PASSWORD_LEN {
                errors.push("password", format!("must be at least {MIN_PASSWORD_LEN} characters"));
            }
        }

        errors.into_result()
    }
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user: UserView,
}

#[derive(Debug, Serialize)]
pub struct UserView {
    pub username: String,
    pub email: String,
    pub bio: String,
    pub image: Option<String>,
    pub token: String,
}

impl UserView {
    pub fn new(user: &CurrentUser, token: String) -> Self {
        Self {
            username: user.username.clone(),
            email: user.email.clone(),
            bio: user.bio.clone(),
            image: user.image.clone(),
            token,
        }
    }
}

impl UserResponse {
    pub fn new(user: &CurrentUser, token: String) -> Self {
        Self {
            user: UserView::new(user, token),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_validation_collects_all_failures() {
        let fields = RegisterFields {
            username: "ab".to_string(),
            email: "not-an-email".to_string(),
            password: "short".to_string(),
        };

        let err = fields.validate().unwrap_err();
        match err {
            Error::Validation { errors } => {
                assert!(errors.contains_key("username"));
                assert!(errors.contains_key("email"));
                assert!(errors.contains_key("password"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn register_validation_accepts_good_input() {
        let fields = RegisterFields {
            username: "jacob".to_string(),
            email: "jake@jake.jake".to_string(),
            password: "jakejake".to_string(),
        };
        assert!(fields.validate().is_ok());
    }

    #[test]
    fn update_normalization_drops_empty_strings() {
        let fields = UserUpdateFields {
            username: Some(String::new()),
            email: None,
            password: Some("newpassword".to_string()),
            bio: Some(String::new()),
            image: None,
        };

        let normalized = fields.normalized();
        assert!(normalized.username.is_none());
        assert!(normalized.bio.is_none());
        assert_eq!(normalized.password.as_deref(), Some("newpassword"));
    }

    #[test]
    fn update_validation_only_checks_present_fields() {
        let fields = UserUpdateFields {
            bio: Some("anything goes in a bio".to_string()),
            ..Default::default()
        };
        assert!(fields.validate().is_ok());

        let fields = UserUpdateFields {
            password: Some("short".to_string()),
            ..Default::default()
        };
        assert!(fields.validate().is_err());
    }
}
