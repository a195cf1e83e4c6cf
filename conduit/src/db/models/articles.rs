//! Database models for articles.

use crate::types::{ArticleId, UserId};
use chrono::{DateTime, Utc};

/// Database request for creating a new article
#[derive(Debug, Clone)]
pub struct ArticleCreateDBRequest {
    pub slug: String,
    pub title: String,
    pub description: String,
    pub body: String,
    pub author_id: UserId,
    pub tag_names: Vec<String>,
}

/// Database request for updating an article. `None` fields are left
/// unchanged; `tag_names` always replaces the article's tag set.
#[derive(Debug, Clone, Default)]
pub struct ArticleUpdateDBRequest {
    pub slug: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub body: Option<String>,
    pub tag_names: Vec<String>,
}

/// Database response for an article, tags included
#[derive(Debug, Clone)]
pub struct ArticleDBResponse {
    pub id: ArticleId,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub body: String,
    pub author_id: UserId,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
