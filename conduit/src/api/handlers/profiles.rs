//! Public profile handlers: lookup, follow and unfollow.

use axum::{
    Json,
    extract::{Path, State},
};

use crate::{
    AppState,
    api::models::{enrichment::ViewComposer, profiles::ProfileResponse},
    auth::current_user::{AuthUser, MaybeAuthUser},
    db::handlers::Users,
    errors::{Error, Result},
};

/// `GET /api/profiles/{username}`
#[tracing::instrument(skip(state, viewer))]
pub async fn get_profile(
    State(state): State<AppState>,
    viewer: MaybeAuthUser,
    Path(username): Path<String>,
) -> Result<Json<ProfileResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let user = Users::new(&mut conn)
        .get_user_by_username(&username)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "profile".to_string(),
            id: username.clone(),
        })?;

    let profile = ViewComposer::new(&mut conn, viewer.user_id()).profile(&user).await?;
    Ok(Json(ProfileResponse { profile }))
}

/// `POST /api/profiles/{username}/follow`
///
/// Idempotent: following an already-followed profile answers the same way.
#[tracing::instrument(skip(state, auth))]
pub async fn follow_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(username): Path<String>,
) -> Result<Json<ProfileResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let target = Users::new(&mut conn)
        .get_user_by_username(&username)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "profile".to_string(),
            id: username.clone(),
        })?;

    Users::new(&mut conn).follow(target.id, auth.user.id).await?;

    let profile = ViewComposer::new(&mut conn, Some(auth.user.id)).profile(&target).await?;
    Ok(Json(ProfileResponse { profile }))
}

/// `DELETE /api/profiles/{username}/follow`
#[tracing::instrument(skip(state, auth))]
pub async fn unfollow_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(username): Path<String>,
) -> Result<Json<ProfileResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let target = Users::new(&mut conn)
        .get_user_by_username(&username)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "profile".to_string(),
            id: username.clone(),
        })?;

    Users::new(&mut conn).unfollow(target.id, auth.user.id).await?;

    let profile = ViewComposer::new(&mut conn, Some(auth.user.id)).profile(&target).await?;
    Ok(Json(ProfileResponse { profile }))
}
