//! API models for articles and tags.

use serde::{Deserialize, Serialize};

use crate::api::models::{FieldErrors, profiles::ProfileView};
use crate::errors::Error;

pub const MIN_TITLE_LEN: usize = 4;
pub const MAX_TEXT_LEN: usize = 2048;

#[derive(Debug, Deserialize)]
pub struct ArticleCreateRequest {
    pub article: ArticleCreateFields,
}

#[derive(Debug, Deserialize)]
pub struct ArticleCreateFields {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub body: String,
    #[serde(default, rename = "tagList")]
    pub tag_list: Vec<String>,
}

impl ArticleCreateFields {
    pub fn validate(&self) -> Result<(), Error> {
        let mut errors = FieldErrors::default();

        if self.title.chars().count() < MIN_TITLE_LEN {
            errors.push("title", format!("must be at least {MIN_TITLE_LEN} characters"));
        }
        if self.description.chars().count() > MAX_TEXT_LEN {
            errors.push("description", format!("must be at most {MAX_TEXT_LEN} characters"));
        }
        if self.body.chars().count() > MAX_TEXT_LEN {
            errors.push("body", format!("must be at most {MAX_TEXT_LEN} characters"));
        }

        errors.into_result()
    }
}

#[derive(Debug, Deserialize)]
pub struct ArticleUpdateRequest {
    pub article: ArticleUpdateFields,
}

/// Partial article update. Omitted and empty-string fields mean "leave
/// unchanged"; an omitted tag list keeps the existing tags.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ArticleUpdateFields {
    pub title: Option<String>,
    pub description: Option<String>,
    pub body: Option<String>,
    #[serde(rename = "tagList")]
    pub tag_list: Option<Vec<String>>,
}

impl ArticleUpdateFields {
    /// Collapse empty strings into `None`
    pub fn normalized(self) -> Self {
        let keep = |v: Option<String>| v.filter(|s| !s.is_empty());
        Self {
            title: keep(self.title),
            description: keep(self.description),
            body: keep(self.body),
            tag_list: self.tag_list,
        }
    }

    /// Validate whatever fields are present; call on the normalized form.
    pub fn validate(&self) -> Result<(), Error> {
        let mut errors = FieldErrors::default();

        if let Some(title) = &self.title {
            if title.chars().count() < MIN_TITLE_LEN {
                errors.push("title", format!("must be at least {MIN_TITLE_LEN} characters"));
            }
        }
        if let Some(description) = &self.description {
            if description.chars().count() > MAX_TEXT_LEN {
                errors.push("description", format!("must be at most {MAX_TEXT_LEN} characters"));
            }
        }
        if let Some(body) = &self.body {
            if body.chars().count() > MAX_TEXT_LEN {
                errors.push("body", format!("must be at most {MAX_TEXT_LEN} characters"));
            }
        }

        errors.into_result()
    }
}

/// An article as clients see it: author profile attached, tags sorted,
/// favorite state resolved for the viewer, timestamps in the fixed wire
/// format.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleView {
    pub slug: String,
    pub title: String,
    pub description: String,
    pub body: String,
    pub tag_list: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
    pub favorited: bool,
    pub favorites_count: i64,
    pub author: ProfileView,
}

#[derive(Debug, Serialize)]
pub struct ArticleResponse {
    pub article: ArticleView,
}

#[derive(Debug, Serialize)]
pub struct ArticleListResponse {
    pub articles: Vec<ArticleView>,
    #[serde(rename = "articlesCount")]
    pub articles_count: i64,
}

#[derive(Debug, Serialize)]
pub struct TagsResponse {
    pub tags: Vec<String>,
}

/// Query parameters for `GET /api/articles`. At most one of the filters is
/// honored, in this priority order: tag, author, favorited.
///
/// Pagination params are inlined rather than `#[serde(flatten)]`ed: the
/// urlencoded deserializer cannot parse numbers out of flattened structs.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ListArticlesQuery {
    pub tag: Option<String>,
    pub author: Option<String>,
    pub favorited: Option<String>,
    pub page: Option<i64>,
    pub size: Option<i64>,
}

impl ListArticlesQuery {
    pub fn pagination(&self) -> crate::api::models::pagination::Pagination {
        crate::api::models::pagination::Pagination {
            page: self.page,
            size: self.size,
        }
    }
}
