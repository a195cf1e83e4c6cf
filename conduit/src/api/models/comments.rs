//! API models for comments.

use serde::{Deserialize, Serialize};

use crate::api::models::{FieldErrors, articles::MAX_TEXT_LEN, profiles::ProfileView};
use crate::errors::Error;
use crate::types::CommentId;

#[derive(Debug, Deserialize)]
pub struct CommentCreateRequest {
    pub comment: CommentCreateFields,
}

#[derive(Debug, Deserialize)]
pub struct CommentCreateFields {
    pub body: String,
}

impl CommentCreateFields {
    pub fn validate(&self) -> Result<(), Error> {
        let mut errors = FieldErrors::default();

        if self.body.is_empty() {
            errors.push("body", "cannot be empty");
        }
        if self.body.chars().count() > MAX_TEXT_LEN {
            errors.push("body", format!("must be at most {MAX_TEXT_LEN} characters"));
        }

        errors.into_result()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    pub id: CommentId,
    pub body: String,
    pub created_at: String,
    pub updated_at: String,
    pub author: ProfileView,
}

#[derive(Debug, Serialize)]
pub struct CommentResponse {
    pub comment: CommentView,
}

#[derive(Debug, Serialize)]
pub struct CommentListResponse {
    pub comments: Vec<CommentView>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_oversized_bodies_are_rejected() {
        assert!(CommentCreateFields { body: String::new() }.validate().is_err());
        assert!(
            CommentCreateFields {
                body: "x".repeat(MAX_TEXT_LEN + 1)
            }
            .validate()
            .is_err()
        );
        assert!(CommentCreateFields { body: "nice post".to_string() }.validate().is_ok());
    }
}
