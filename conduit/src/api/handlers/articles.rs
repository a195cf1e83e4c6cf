//! Article handlers: listing, feed, CRUD and favorites.
//!
//! Slug-affecting writes (create, update, delete) take the per-slug
//! distributed lock around the database work and release it on every exit
//! path. The lock scopes to the slug the row will hold after the write; for
//! updates that recompute the slug from a new title, that is the new slug.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde_json::{Value, json};
use slug::slugify;

use crate::{
    AppState,
    api::models::{
        articles::{
            ArticleCreateRequest, ArticleListResponse, ArticleResponse, ArticleUpdateRequest, ListArticlesQuery,
        },
        enrichment::ViewComposer,
        pagination::Pagination,
    },
    auth::current_user::{AuthUser, MaybeAuthUser},
    db::{
        handlers::{ArticleFilter, ArticleFilterKind, Articles, Repository},
        models::articles::{ArticleCreateDBRequest, ArticleDBResponse, ArticleUpdateDBRequest},
    },
    errors::{Error, Result},
};

fn article_not_found(slug: &str) -> Error {
    Error::NotFound {
        resource: "article".to_string(),
        id: slug.to_string(),
    }
}

/// `GET /api/articles`
///
/// At most one filter applies, in priority order tag, author, favorited.
#[tracing::instrument(skip(state, viewer))]
pub async fn list_articles(
    State(state): State<AppState>,
    viewer: MaybeAuthUser,
    Query(query): Query<ListArticlesQuery>,
) -> Result<Json<ArticleListResponse>> {
    let kind = if let Some(tag) = &query.tag {
        ArticleFilterKind::Tag(tag.clone())
    } else if let Some(author) = &query.author {
        ArticleFilterKind::Author(author.clone())
    } else if let Some(favorited) = &query.favorited {
        ArticleFilterKind::FavoritedBy(favorited.clone())
    } else {
        ArticleFilterKind::All
    };

    let (skip, limit) = query.pagination().params();
    let filter = ArticleFilter { kind, skip, limit };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Articles::new(&mut conn);
    let rows = repo.list(&filter).await?;
    let count = repo.count(&filter).await?;

    let articles = ViewComposer::new(&mut conn, viewer.user_id()).articles(rows).await?;

    Ok(Json(ArticleListResponse {
        articles,
        articles_count: count,
    }))
}

/// `GET /api/articles/feed`
///
/// Articles by authors the caller follows, most recently updated first.
#[tracing::instrument(skip(state, auth))]
pub async fn feed_articles(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(pagination): Query<Pagination>,
) -> Result<Json<ArticleListResponse>> {
    let (skip, limit) = pagination.params();

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let (rows, count) = Articles::new(&mut conn).feed(auth.user.id, skip, limit).await?;

    let articles = ViewComposer::new(&mut conn, Some(auth.user.id)).articles(rows).await?;

    Ok(Json(ArticleListResponse {
        articles,
        articles_count: count,
    }))
}

/// `GET /api/articles/{slug}`
#[tracing::instrument(skip(state, viewer))]
pub async fn get_article(
    State(state): State<AppState>,
    viewer: MaybeAuthUser,
    Path(slug): Path<String>,
) -> Result<Json<ArticleResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let article = Articles::new(&mut conn)
        .get_by_slug(&slug)
        .await?
        .ok_or_else(|| article_not_found(&slug))?;

    let article = ViewComposer::new(&mut conn, viewer.user_id()).article(article).await?;
    Ok(Json(ArticleResponse { article }))
}

async fn insert_article(state: &AppState, request: &ArticleCreateDBRequest) -> Result<ArticleDBResponse> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Articles::new(&mut conn);
    Ok(repo.create(request).await?)
}

/// `POST /api/articles`
#[tracing::instrument(skip_all)]
pub async fn create_article(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<ArticleCreateRequest>,
) -> Result<(StatusCode, Json<ArticleResponse>)> {
    let fields = request.article;
    fields.validate()?;

    let slug = slugify(&fields.title);
    let create_request = ArticleCreateDBRequest {
        slug: slug.clone(),
        title: fields.title,
        description: fields.description,
        body: fields.body,
        author_id: auth.user.id,
        tag_names: fields.tag_list,
    };

    let lease = state.locker.acquire(&format!("article:slug-{slug}")).await?;
    let created = insert_article(&state, &create_request).await;
    state.locker.release(lease).await;
    let created = created?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let article = ViewComposer::new(&mut conn, Some(auth.user.id)).article(created).await?;

    Ok((StatusCode::CREATED, Json(ArticleResponse { article })))
}

async fn apply_article_update(
    state: &AppState,
    slug: &str,
    update: &ArticleUpdateDBRequest,
) -> Result<ArticleDBResponse> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Articles::new(&mut conn);
    let existing = repo.get_by_slug(slug).await?.ok_or_else(|| article_not_found(slug))?;
    Ok(repo.update(existing.id, update).await?)
}

/// `PUT /api/articles/{slug}`
///
/// Partial update: omitted and empty-string fields are left unchanged. A new
/// title regenerates the slug; an omitted tag list keeps the current tags.
#[tracing::instrument(skip(state, auth, request))]
pub async fn update_article(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(slug): Path<String>,
    Json(request): Json<ArticleUpdateRequest>,
) -> Result<Json<ArticleResponse>> {
    let fields = request.article.normalized();
    fields.validate()?;

    let existing = {
        let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
        Articles::new(&mut conn)
            .get_by_slug(&slug)
            .await?
            .ok_or_else(|| article_not_found(&slug))?
    };

    let new_slug = fields.title.as_deref().map(slugify);
    let target_slug = new_slug.clone().unwrap_or_else(|| existing.slug.clone());
    let update = ArticleUpdateDBRequest {
        slug: new_slug,
        title: fields.title,
        description: fields.description,
        body: fields.body,
        tag_names: fields.tag_list.unwrap_or_else(|| existing.tags.clone()),
    };

    let lease = state.locker.acquire(&format!("article:slug-{target_slug}")).await?;
    let updated = apply_article_update(&state, &slug, &update).await;
    state.locker.release(lease).await;
    let updated = updated?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let article = ViewComposer::new(&mut conn, Some(auth.user.id)).article(updated).await?;

    Ok(Json(ArticleResponse { article }))
}

async fn remove_article(state: &AppState, slug: &str) -> Result<()> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Articles::new(&mut conn);
    let existing = repo.get_by_slug(slug).await?.ok_or_else(|| article_not_found(slug))?;
    repo.delete(existing.id).await?;
    Ok(())
}

/// `DELETE /api/articles/{slug}`
///
/// Hard delete; comments, favorites and tag links go with the article.
#[tracing::instrument(skip(state, _auth))]
pub async fn delete_article(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(slug): Path<String>,
) -> Result<Json<Value>> {
    let lease = state.locker.acquire(&format!("article:slug-{slug}")).await?;
    let deleted = remove_article(&state, &slug).await;
    state.locker.release(lease).await;
    deleted?;

    Ok(Json(json!({ "article": "Delete success" })))
}

/// `POST /api/articles/{slug}/favorite`
///
/// Idempotent: favoriting twice answers the same way.
#[tracing::instrument(skip(state, auth))]
pub async fn favorite_article(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(slug): Path<String>,
) -> Result<Json<ArticleResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let article = {
        let mut repo = Articles::new(&mut conn);
        let article = repo.get_by_slug(&slug).await?.ok_or_else(|| article_not_found(&slug))?;
        repo.set_favorite(article.id, auth.user.id).await?;
        article
    };

    let article = ViewComposer::new(&mut conn, Some(auth.user.id)).article(article).await?;
    Ok(Json(ArticleResponse { article }))
}

/// `DELETE /api/articles/{slug}/favorite`
#[tracing::instrument(skip(state, auth))]
pub async fn unfavorite_article(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(slug): Path<String>,
) -> Result<Json<ArticleResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let article = {
        let mut repo = Articles::new(&mut conn);
        let article = repo.get_by_slug(&slug).await?.ok_or_else(|| article_not_found(&slug))?;
        repo.remove_favorite(article.id, auth.user.id).await?;
        article
    };

    let article = ViewComposer::new(&mut conn, Some(auth.user.id)).article(article).await?;
    Ok(Json(ArticleResponse { article }))
}
