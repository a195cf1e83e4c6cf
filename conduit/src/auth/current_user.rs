//! Request extractors for the authenticated user.

use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::{instrument, trace};

use crate::{
    AppState,
    api::models::users::CurrentUser,
    auth::token,
    db::{
        errors::DbError,
        handlers::{Repository, Users},
    },
    errors::{Error, Result},
};

/// An authenticated user plus the session the request was made under.
///
/// Extraction fails with 401 unless the Authorization header carries a token
/// whose signature verifies, whose session record is still alive in Redis,
/// and whose user still exists.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: CurrentUser,
    pub session_id: String,
}

/// Optional authentication for endpoints that render differently for viewers
/// and for anonymous requests. Missing or invalid credentials become `None`;
/// infrastructure failures still propagate.
#[derive(Debug, Clone)]
pub struct MaybeAuthUser(pub Option<AuthUser>);

impl MaybeAuthUser {
    pub fn user_id(&self) -> Option<crate::types::UserId> {
        self.0.as_ref().map(|auth| auth.user.id)
    }
}

/// Pull the raw token out of the Authorization header. `Token ` and
/// `Bearer ` prefixes are stripped case-insensitively; anything else is
/// treated as a bare token.
fn extract_token(parts: &Parts) -> Option<String> {
    let header = parts.headers.get(axum::http::header::AUTHORIZATION)?;
    let value = header.to_str().ok()?.trim();
    if value.is_empty() {
        return None;
    }

    let mut words = value.split_whitespace();
    let first = words.next()?;
    if first.eq_ignore_ascii_case("token") || first.eq_ignore_ascii_case("bearer") {
        return words.next().map(|t| t.to_string());
    }

    Some(value.to_string())
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = Error;

    #[instrument(skip(parts, state))]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let token = extract_token(parts).ok_or(Error::Unauthenticated { message: None })?;

        let claims = token::verify_token(&token, &state.config)?;

        // A valid signature is not enough: the session record must still exist
        let session = state
            .sessions
            .get_by_id(&claims.session_id)
            .await?
            .ok_or_else(|| Error::Unauthenticated {
                message: Some("session expired or revoked".to_string()),
            })?;

        let mut conn = state.db.acquire().await.map_err(|e| Error::Database(DbError::from(e)))?;
        let mut users = Users::new(&mut conn);
        let user = users
            .get_by_id(claims.id)
            .await
            .map_err(Error::Database)?
            .ok_or(Error::Unauthenticated { message: None })?;

        Ok(AuthUser {
            user: CurrentUser::from(user),
            session_id: session.session_id,
        })
    }
}

impl FromRequestParts<AppState> for MaybeAuthUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        match AuthUser::from_request_parts(parts, state).await {
            Ok(auth) => Ok(MaybeAuthUser(Some(auth))),
            Err(Error::Unauthenticated { .. }) => {
                trace!("no valid credentials, continuing as anonymous");
                Ok(MaybeAuthUser(None))
            }
            Err(e) => Err(e),
        }
    }
}
