//! Pagination models.
//!
//! Out-of-range pages are not clamped: a page beyond the last one yields an
//! empty item list with the true totals.

use crate::error::{DbError, DbResult};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde::{Deserialize, Serialize as SerializeDerive};

/// Default page number.
pub const DEFAULT_PAGE: u64 = 1;

/// Default items per page.
pub const DEFAULT_PER_PAGE: u64 = 24;

/// Requested page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, SerializeDerive, Deserialize)]
pub struct PageRequest {
    pub page: u64,
    pub per_page: u64,
}

impl PageRequest {
    pub fn new(page: u64, per_page: u64) -> Self {
        Self { page, per_page }
    }

    /// Reject a zero page or page size.
    pub fn validate(&self) -> DbResult<()> {
        if self.page == 0 {
            return Err(DbError::invalid_params("page must be at least 1"));
        }
        if self.per_page == 0 {
            return Err(DbError::invalid_params("per_page must be at least 1"));
        }
        Ok(())
    }

    /// Row offset of the first item on this page.
    pub fn offset(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.per_page)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE, DEFAULT_PER_PAGE)
    }
}

/// Pagination metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, SerializeDerive, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: u64,
    pub per_page: u64,
    pub total_items: u64,
    pub total_pages: u64,
}

impl Pagination {
    /// Compute the metadata for `request` over `total_items` rows.
    pub fn new(total_items: u64, request: PageRequest) -> Self {
        let total_pages = total_items.div_ceil(request.per_page.max(1)).max(1);
        Self {
            current_page: request.page,
            per_page: request.per_page,
            total_items,
            total_pages,
        }
    }

    pub fn offset(&self) -> u64 {
        PageRequest::new(self.current_page, self.per_page).offset()
    }

    pub fn has_next(&self) -> bool {
        self.current_page < self.total_pages
    }
}

/// One page of items, serialized as `{"pagination": ..., "<key>": [...]}`.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub pagination: Pagination,
    /// camelCase root table name
    pub key: String,
    pub items: Vec<T>,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            pagination: self.pagination,
            key: self.key,
            items: self.items.into_iter().map(f).collect(),
        }
    }
}

impl<T: Serialize> Serialize for Page<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("pagination", &self.pagination)?;
        map.serialize_entry(&self.key, &self.items)?;
        map.end()
    }
}
