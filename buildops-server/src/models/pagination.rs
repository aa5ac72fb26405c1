//! Page requests and the list envelope
//!
//! Every `*.list` procedure takes optional `page` / `page_size` fields and
//! answers with [`Paginated`]. Out-of-range requests are clamped rather than
//! rejected: `page` 0 reads as page 1 and `page_size` is held to
//! `1..=MAX_PAGE_SIZE`. A page past the end is an empty `items` list that
//! still reports the full `total`.

use serde::{Deserialize, Serialize};

const MAX_PAGE_SIZE: u32 = 100;

/// Page size for lists that do not pick their own (tasks use 50).
const DEFAULT_PAGE_SIZE: u32 = 20;

/// A clamped page request, 1-indexed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
}

impl Pagination {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// Rows skipped before this page; bound as `OFFSET`.
    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * self.limit()
    }

    /// Bound as `LIMIT`.
    pub fn limit(&self) -> i64 {
        i64::from(self.page_size)
    }

    /// Envelope for `items` out of `total` matching rows.
    pub fn wrap<T>(&self, items: Vec<T>, total: i64) -> Paginated<T> {
        Paginated {
            items,
            total,
            page: self.page,
            page_size: self.page_size,
            total_pages: page_count(total, self.page_size),
        }
    }
}

/// `ceil(total / page_size)`; an empty result has zero pages, not one.
fn page_count(total: i64, page_size: u32) -> u32 {
    match u64::try_from(total) {
        Ok(0) | Err(_) => 0,
        Ok(total) => u32::try_from(total.div_ceil(u64::from(page_size))).unwrap_or(u32::MAX),
    }
}

/// List response: `{items, total, page, page_size, total_pages}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    /// Matching rows across every page
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
}

/// `page` / `page_size` as they arrive in list inputs, usually `#[serde(flatten)]`ed
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PaginationParams {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl PaginationParams {
    pub fn with_default_size(self, default_size: u32) -> Pagination {
        Pagination::new(self.page.unwrap_or(1), self.page_size.unwrap_or(default_size))
    }
}

impl From<PaginationParams> for Pagination {
    fn from(params: PaginationParams) -> Self {
        params.with_default_size(DEFAULT_PAGE_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_99_of_a_small_list() {
        let page = Pagination::new(99, 20);
        assert_eq!((page.limit(), page.offset()), (20, 1960));

        let listed = page.wrap(Vec::<()>::new(), 3);
        assert_eq!(listed.total, 3);
        assert_eq!(listed.total_pages, 1);
        assert_eq!(listed.page, 99);
    }

    #[test]
    fn out_of_range_requests_are_clamped() {
        assert_eq!(Pagination::new(0, 10), Pagination::new(1, 10));
        assert_eq!(Pagination::new(1, 0).page_size, 1);
        assert_eq!(Pagination::new(1, 999).page_size, MAX_PAGE_SIZE);
    }

    #[test]
    fn page_count_rounds_up() {
        assert_eq!(page_count(0, 10), 0);
        assert_eq!(page_count(1, 10), 1);
        assert_eq!(page_count(25, 10), 3);
        assert_eq!(page_count(100, 10), 10);
        assert_eq!(page_count(-5, 10), 0);
    }

    #[test]
    fn list_inputs_pick_their_default_size() {
        let homeowners: Pagination = PaginationParams::default().into();
        assert_eq!(homeowners, Pagination::new(1, DEFAULT_PAGE_SIZE));

        let tasks = PaginationParams::default().with_default_size(50);
        assert_eq!(tasks.page_size, 50);

        let params: PaginationParams = serde_json::from_str(r#"{"page": 3}"#).unwrap();
        assert_eq!(params.with_default_size(20).offset(), 40);
    }
}
