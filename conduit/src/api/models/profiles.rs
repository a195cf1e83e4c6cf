//! API models for public profiles.

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct ProfileView {
    pub username: String,
    pub bio: String,
    pub image: Option<String>,
    /// Whether the viewer follows this user; always false for anonymous viewers
    pub following: bool,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub profile: ProfileView,
}
