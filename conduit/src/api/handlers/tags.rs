//! Tag listing handler.

use axum::{Json, extract::State};

use crate::{
    AppState,
    api::models::articles::TagsResponse,
    db::handlers::Articles,
    errors::{Error, Result},
};

/// `GET /api/tags`
///
/// Every tag any article has ever carried, sorted lexicographically.
#[tracing::instrument(skip_all)]
pub async fn list_tags(State(state): State<AppState>) -> Result<Json<TagsResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let mut tags = Articles::new(&mut conn).all_tags().await?;
    tags.sort();

    Ok(Json(TagsResponse { tags }))
}
