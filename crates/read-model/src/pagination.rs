use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::ReadModelError;

/// Raw paging parameters as supplied by a caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct PageRequest {
    #[serde(default)]
    #[validate(range(min = 0, message = "Offset must be >= 0"))]
    pub offset: i64,

    #[serde(default = "default_limit")]
    #[validate(range(min = 1, message = "Limit must be at least 1"))]
    pub limit: i64,
}

fn default_limit() -> i64 {
    100
}

impl PageRequest {
    pub fn new(offset: i64, limit: i64) -> Self {
        Self { offset, limit }
    }
}

/// A validated window over one-row-per-root results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    offset: i64,
    limit: i64,
}

impl Page {
    pub fn offset(&self) -> i64 {
        self.offset
    }

    pub fn limit(&self) -> i64 {
        self.limit
    }

    /// The sub-sequence starting at `offset` with at most `limit` entries.
    /// An offset past the end yields an empty vector.
    pub fn slice<T>(&self, items: Vec<T>) -> Vec<T> {
        items
            .into_iter()
            .skip(self.offset as usize)
            .take(self.limit as usize)
            .collect()
    }
}

/// Validates page requests against a maximum page size
#[derive(Debug, Clone)]
pub struct Paginator {
    max_limit: i64,
}

impl Paginator {
    pub const DEFAULT_MAX_LIMIT: i64 = 1000;

    pub fn new(max_limit: i64) -> Self {
        Self {
            max_limit: max_limit.max(1),
        }
    }

    /// Reject a negative offset or a limit below one; clamp oversized limits
    pub fn page(&self, offset: i64, limit: i64) -> Result<Page, ReadModelError> {
        self.validate(PageRequest::new(offset, limit))
    }

    pub fn validate(&self, request: PageRequest) -> Result<Page, ReadModelError> {
        request
            .validate()
            .map_err(|e| ReadModelError::InvalidPagination(e.to_string()))?;

        Ok(Page {
            offset: request.offset,
            limit: request.limit.min(self.max_limit),
        })
    }
}

impl Default for Paginator {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_limit_is_rejected() {
        let err = Paginator::default().page(0, 0).unwrap_err();
        assert!(matches!(err, ReadModelError::InvalidPagination(_)));
    }

    #[test]
    fn test_negative_offset_is_rejected() {
        let err = Paginator::default().page(-1, 10).unwrap_err();
        assert!(matches!(err, ReadModelError::InvalidPagination(_)));
    }

    #[test]
    fn test_limit_is_clamped_to_maximum() {
        let page = Paginator::new(1000).page(0, 5000).unwrap();
        assert_eq!(page.limit(), 1000);
    }

    #[test]
    fn test_slice_windows_items() {
        let page = Paginator::default().page(1, 2).unwrap();
        assert_eq!(page.slice(vec![1, 2, 3, 4]), vec![2, 3]);
    }

    #[test]
    fn test_offset_past_end_is_empty() {
        let page = Paginator::default().page(10, 5).unwrap();
        assert!(page.slice(vec![1, 2, 3]).is_empty());
    }

    #[test]
    fn test_page_request_defaults() {
        let request: PageRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(request, PageRequest::new(0, 100));
    }
}
