//! Repository implementations for CRUD operations.

pub mod articles;
pub mod comments;
pub mod repository;
pub mod users;

pub use articles::{ArticleFilter, ArticleFilterKind, Articles};
pub use comments::Comments;
pub use repository::Repository;
pub use users::Users;
