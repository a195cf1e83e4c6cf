//! Database models for comments.

use crate::types::{ArticleId, CommentId, UserId};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database request for creating a comment
#[derive(Debug, Clone)]
pub struct CommentCreateDBRequest {
    pub article_id: ArticleId,
    pub author_id: UserId,
    pub body: String,
}

/// Database response for a comment
#[derive(Debug, Clone, FromRow)]
pub struct CommentDBResponse {
    pub id: CommentId,
    pub article_id: ArticleId,
    pub author_id: UserId,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
