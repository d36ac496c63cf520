//! Pagination envelope and paged result container.

use serde::{Deserialize, Serialize};

/// Pagination metadata, carried by the backend in the `Pagination` response
/// header as a JSON envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: u32,
    pub total_pages: u32,
    pub items_per_page: u32,
    pub total_items: u64,
}

/// One page of results plus its pagination envelope.
///
/// Cache entries hold whole `PagedResult`s and are only ever replaced
/// wholesale, never merged field-by-field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PagedResult<T> {
    pub items: Vec<T>,
    pub pagination: Option<Pagination>,
}

impl<T> Default for PagedResult<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            pagination: None,
        }
    }
}

impl<T> PagedResult<T> {
    pub fn new(items: Vec<T>, pagination: Option<Pagination>) -> Self {
        Self { items, pagination }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
