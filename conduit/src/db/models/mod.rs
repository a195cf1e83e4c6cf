//! Database record structures matching table schemas.

pub mod articles;
pub mod comments;
pub mod users;
