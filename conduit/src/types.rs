//! Shared identifier types.
//!
//! Every entity is keyed by a UUID; the aliases exist so signatures say which
//! entity an id refers to.

use uuid::Uuid;

pub type UserId = Uuid;
pub type ArticleId = Uuid;
pub type CommentId = Uuid;
pub type TagId = Uuid;
