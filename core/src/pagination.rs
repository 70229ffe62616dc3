//! Page requests for list queries.

use crate::error::{DomainError, Result};

/// Largest page a caller may request.
pub const MAX_PAGE_SIZE: i64 = 25;
/// Page size used when the requested one is out of range.
pub const DEFAULT_PAGE_SIZE: i64 = 10;

/// Resolved `LIMIT`/`OFFSET` pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageRequest {
    limit: i64,
    offset: i64,
}

impl PageRequest {
    /// Resolve a one-based `page` of `size` items.
    ///
    /// A size outside `1..=25` falls back to 10; page 0 and page 1 both start
    /// at the first item.
    ///
    /// # Errors
    ///
    /// Returns a validation error for negative inputs.
    pub fn new(size: i64, page: i64) -> Result<Self> {
        if size < 0 || page < 0 {
            return Err(DomainError::invalid("page request", "must not be negative"));
        }
        let limit = if (1..=MAX_PAGE_SIZE).contains(&size) {
            size
        } else {
            DEFAULT_PAGE_SIZE
        };
        let offset = if page > 0 { (page - 1).saturating_mul(limit) } else { 0 };
        Ok(Self { limit, offset })
    }

    /// Rows to return.
    #[must_use]
    pub const fn limit(&self) -> i64 {
        self.limit
    }

    /// Rows to skip.
    #[must_use]
    pub const fn offset(&self) -> i64 {
        self.offset
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }
}
