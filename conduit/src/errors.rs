use crate::db::errors::DbError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Authentication required but not provided or not valid
    #[error("Not authenticated")]
    Unauthenticated { message: Option<String> },

    /// Login with an unknown email or a wrong password. Deliberately opaque:
    /// the response never says which of the two failed.
    #[error("Login rejected")]
    LoginRejected,

    /// Request payload failed validation; field name -> messages
    #[error("Validation failed")]
    Validation { errors: BTreeMap<String, Vec<String>> },

    /// Requested resource not found
    #[error("{resource} {id} not found")]
    NotFound { resource: String, id: String },

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Database operation error
    #[error(transparent)]
    Database(#[from] DbError),

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Single-field validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = BTreeMap::new();
        errors.insert(field.into(), vec![message.into()]);
        Error::Validation { errors }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            Error::LoginRejected => StatusCode::FORBIDDEN,
            Error::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Database(db_err) => match db_err {
                DbError::NotFound => StatusCode::NOT_FOUND,
                DbError::UniqueViolation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                DbError::ForeignKeyViolation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                DbError::CheckViolation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                DbError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// User-safe error body, without leaking internal implementation details.
    /// Always the `{field: [messages]}` shape so clients can render it uniformly.
    pub fn error_body(&self) -> Value {
        match self {
            Error::Unauthenticated { message } => {
                let msg = message.clone().unwrap_or_else(|| "authentication required".to_string());
                json!({ "auth": [msg] })
            }
            Error::LoginRejected => {
                json!({ "login": ["not registered email or invalid password"] })
            }
            Error::Validation { errors } => json!(errors),
            Error::NotFound { resource, id } => {
                let mut map = serde_json::Map::new();
                map.insert(resource.clone(), json!([format!("{id} not found")]));
                Value::Object(map)
            }
            Error::Internal { .. } | Error::Other(_) => {
                json!({ "server": ["internal server error"] })
            }
            Error::Database(db_err) => match db_err {
                DbError::NotFound => json!({ "database": ["resource not found"] }),
                DbError::UniqueViolation { constraint, table, .. } => {
                    // Friendly messages for the constraints clients actually race on
                    match (table.as_deref(), constraint.as_deref()) {
                        (Some("users"), Some(c)) if c.contains("email") => {
                            json!({ "email": ["an account with this email address already exists"] })
                        }
                        (Some("users"), Some(c)) if c.contains("username") => {
                            json!({ "username": ["this username is already taken"] })
                        }
                        (Some("articles"), Some(c)) if c.contains("slug") => {
                            json!({ "slug": ["an article with this slug already exists"] })
                        }
                        _ => json!({ "database": ["resource already exists"] }),
                    }
                }
                DbError::ForeignKeyViolation { .. } => {
                    json!({ "database": ["invalid reference to related resource"] })
                }
                DbError::CheckViolation { .. } => {
                    json!({ "database": ["invalid data provided"] })
                }
                DbError::Other(_) => json!({ "server": ["internal server error"] }),
            },
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        match &self {
            Error::Database(DbError::Other(_)) | Error::Internal { .. } | Error::Other(_) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::Database(_) => {
                tracing::warn!("Database constraint error: {}", self);
            }
            Error::Unauthenticated { .. } | Error::LoginRejected => {
                tracing::info!("Authorization error: {}", self);
            }
            Error::Validation { .. } | Error::NotFound { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let status = self.status_code();
        let body = json!({ "errors": self.error_body() });

        (status, Json(body)).into_response()
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;
