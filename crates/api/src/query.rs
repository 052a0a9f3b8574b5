//! Shared query parameter types for API handlers.

use serde::Deserialize;

use homelab_store::{clamp_limit, clamp_offset};

/// Generic pagination parameters (`?page=&per_page=`).
///
/// `page` is 1-based. Values are clamped in [`Self::to_limit_offset`]:
/// `per_page` defaults to 50 and is capped at 100.
#[derive(Debug, Default, Deserialize)]
pub struct PaginationParams {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl PaginationParams {
    /// Convert to the `(limit, offset)` pair the repositories consume.
    pub fn to_limit_offset(&self) -> (i64, i64) {
        let limit = clamp_limit(self.per_page);
        let page = self.page.unwrap_or(1).max(1);
        let offset = clamp_offset(Some((page - 1).saturating_mul(limit)));
        (limit, offset)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
