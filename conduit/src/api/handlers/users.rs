//! Account handlers: registration, login, logout and the current user.
//!
//! Registration and email-changing updates take the per-email distributed
//! lock before writing, so two requests racing on the same address serialize
//! instead of both passing the pre-insert checks. The unique index on
//! `users.email` still backs the lock up when it could not be obtained.

use axum::{Json, extract::State, http::StatusCode};

use crate::{
    AppState,
    api::models::users::{
        CurrentUser, LoginRequest, RegisterRequest, UserResponse, UserUpdateRequest,
    },
    auth::{current_user::AuthUser, password},
    db::{
        handlers::{Repository, Users},
        models::users::{UserCreateDBRequest, UserDBResponse, UserUpdateDBRequest},
    },
    errors::{Error, Result},
};

/// Hash a password on a blocking thread; argon2 is deliberately slow and
/// would stall the async runtime otherwise.
async fn hash_password(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || password::hash_string(&password))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password hashing task: {e}"),
        })?
}

async fn insert_user(state: &AppState, request: &UserCreateDBRequest) -> Result<UserDBResponse> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut users = Users::new(&mut conn);
    Ok(users.create(request).await?)
}

/// `POST /api/users`
#[tracing::instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>)> {
    let fields = request.user;
    fields.validate()?;

    let password_hash = hash_password(fields.password.clone()).await?;

    let create_request = UserCreateDBRequest {
        username: fields.username,
        email: fields.email,
        bio: String::new(),
        image: None,
        password_hash,
    };

    // Serialize concurrent registrations on the same address
    let lease = state.locker.acquire(&format!("user:email-{}", create_request.email)).await?;
    let created = insert_user(&state, &create_request).await;
    state.locker.release(lease).await;
    let created = created?;

    let session = state.sessions.create(created.id, &state.config).await?;
    let user = CurrentUser::from(created);

    Ok((StatusCode::CREATED, Json(UserResponse::new(&user, session.token))))
}

/// `POST /api/users/login`
///
/// Unknown email and wrong password both answer with the same opaque
/// rejection.
#[tracing::instrument(skip_all)]
pub async fn login(State(state): State<AppState>, Json(request): Json<LoginRequest>) -> Result<Json<UserResponse>> {
    let fields = request.user;

    let user = {
        let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
        let mut users = Users::new(&mut conn);
        users.get_user_by_email(&fields.email).await?.ok_or(Error::LoginRejected)?
    };

    let hash = user.password_hash.clone();
    let is_valid = tokio::task::spawn_blocking(move || password::verify_string(&fields.password, &hash))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password verification task: {e}"),
        })??;

    if !is_valid {
        return Err(Error::LoginRejected);
    }

    // Every login gets a fresh session; earlier sessions stay valid until
    // they expire or are logged out
    let session = state.sessions.create(user.id, &state.config).await?;
    let user = CurrentUser::from(user);

    Ok(Json(UserResponse::new(&user, session.token)))
}

/// `POST /api/users/logout`
///
/// Revokes the session the request was authenticated under. The token keeps
/// a valid signature but no longer passes the session check.
#[tracing::instrument(skip_all)]
pub async fn logout(State(state): State<AppState>, auth: AuthUser) -> Result<StatusCode> {
    state.sessions.delete_by_id(&auth.session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/user`
#[tracing::instrument(skip_all)]
pub async fn current_user(State(state): State<AppState>, auth: AuthUser) -> Result<Json<UserResponse>> {
    // Echo back the token of the session this request rode in on
    let session = state
        .sessions
        .get_by_id(&auth.session_id)
        .await?
        .ok_or(Error::Unauthenticated { message: None })?;

    Ok(Json(UserResponse::new(&auth.user, session.token)))
}

async fn apply_user_update(state: &AppState, auth: &AuthUser, update: &UserUpdateDBRequest) -> Result<UserDBResponse> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut users = Users::new(&mut conn);
    Ok(users.update(auth.user.id, update).await?)
}

/// `PUT /api/user`
///
/// Partial update: omitted and empty-string fields are left unchanged. The
/// per-email lock covers the address the row will hold after the update.
#[tracing::instrument(skip_all)]
pub async fn update_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<UserUpdateRequest>,
) -> Result<Json<UserResponse>> {
    let fields = request.user.normalized();
    fields.validate()?;

    let password_hash = match fields.password {
        Some(password) => Some(hash_password(password).await?),
        None => None,
    };

    let target_email = fields.email.clone().unwrap_or_else(|| auth.user.email.clone());
    let update = UserUpdateDBRequest {
        username: fields.username,
        email: fields.email,
        bio: fields.bio,
        image: fields.image,
        password_hash,
    };

    let lease = state.locker.acquire(&format!("user:email-{target_email}")).await?;
    let updated = apply_user_update(&state, &auth, &update).await;
    state.locker.release(lease).await;
    let updated = updated?;

    let session = state
        .sessions
        .get_by_id(&auth.session_id)
        .await?
        .ok_or(Error::Unauthenticated { message: None })?;
    let user = CurrentUser::from(updated);

    Ok(Json(UserResponse::new(&user, session.token)))
}
