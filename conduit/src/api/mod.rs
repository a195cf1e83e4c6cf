//! HTTP API surface: request handlers and wire-format models.

pub mod handlers;
pub mod models;
