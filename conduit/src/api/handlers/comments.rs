//! Comment handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde_json::{Value, json};

use crate::{
    AppState,
    api::models::{
        comments::{CommentCreateRequest, CommentListResponse, CommentResponse},
        enrichment::ViewComposer,
    },
    auth::current_user::{AuthUser, MaybeAuthUser},
    db::{
        handlers::{Articles, Comments},
        models::comments::CommentCreateDBRequest,
    },
    errors::{Error, Result},
    types::CommentId,
};

fn article_not_found(slug: &str) -> Error {
    Error::NotFound {
        resource: "article".to_string(),
        id: slug.to_string(),
    }
}

/// `GET /api/articles/{slug}/comments`
#[tracing::instrument(skip(state, viewer))]
pub async fn list_comments(
    State(state): State<AppState>,
    viewer: MaybeAuthUser,
    Path(slug): Path<String>,
) -> Result<Json<CommentListResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let article = Articles::new(&mut conn)
        .get_by_slug(&slug)
        .await?
        .ok_or_else(|| article_not_found(&slug))?;

    let rows = Comments::new(&mut conn).list_for_article(article.id).await?;
    let comments = ViewComposer::new(&mut conn, viewer.user_id()).comments(rows).await?;

    Ok(Json(CommentListResponse { comments }))
}

/// `POST /api/articles/{slug}/comments`
#[tracing::instrument(skip(state, auth, request))]
pub async fn add_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(slug): Path<String>,
    Json(request): Json<CommentCreateRequest>,
) -> Result<(StatusCode, Json<CommentResponse>)> {
    let fields = request.comment;
    fields.validate()?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let article = Articles::new(&mut conn)
        .get_by_slug(&slug)
        .await?
        .ok_or_else(|| article_not_found(&slug))?;

    let created = Comments::new(&mut conn)
        .create(&CommentCreateDBRequest {
            article_id: article.id,
            author_id: auth.user.id,
            body: fields.body,
        })
        .await?;

    let comment = ViewComposer::new(&mut conn, Some(auth.user.id)).comment(created).await?;
    Ok((StatusCode::CREATED, Json(CommentResponse { comment })))
}

/// `DELETE /api/articles/{slug}/comments/{id}`
///
/// Deletion is not scoped to the comment's author; any authenticated caller
/// can remove any comment. Missing ids answer with the same success message.
#[tracing::instrument(skip(state, _auth))]
pub async fn delete_comment(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path((_slug, id)): Path<(String, CommentId)>,
) -> Result<Json<Value>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    Comments::new(&mut conn).delete_by_ids(&[id]).await?;

    Ok(Json(json!({ "comment": "Delete success" })))
}
