//! Shared pagination types for API query parameters.
//!
//! List endpoints take `page` and `size` query parameters. For compatibility
//! with existing clients, `page` is a raw row *offset*, not a page number;
//! `size` is the page size, defaulting to 10 and clamped to 100.

use serde::Deserialize;

/// Default number of items to return per page.
pub const DEFAULT_LIMIT: i64 = 10;

/// Maximum number of items that can be requested per page.
pub const MAX_LIMIT: i64 = 100;

#[derive(Debug, Default, Deserialize)]
pub struct Pagination {
    /// Number of items to skip (an offset, despite the name; default: 0)
    pub page: Option<i64>,

    /// Maximum number of items to return (default: 10, max: 100)
    pub size: Option<i64>,
}

impl Pagination {
    /// Get the offset, defaulting to 0 if not specified.
    #[inline]
    pub fn skip(&self) -> i64 {
        self.page.unwrap_or(0).max(0)
    }

    /// Get the page size, clamped between 1 and MAX_LIMIT.
    /// Defaults to DEFAULT_LIMIT if not specified.
    #[inline]
    pub fn limit(&self) -> i64 {
        self.size.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    /// Get both skip and limit as a tuple, useful for destructuring.
    #[inline]
    pub fn params(&self) -> (i64, i64) {
        (self.skip(), self.limit())
    }
}
