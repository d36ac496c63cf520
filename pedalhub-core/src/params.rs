//! Query parameter objects and canonical cache keys.
//!
//! Each entity kind has one parameter object: pagination plus its filter
//! fields and an `orderBy`. Two parameter values are equal for caching
//! purposes iff they serialize identically (`QueryKey::cache_key`).

use serde::{Deserialize, Serialize};

/// Pagination slice of a query: 1-based page number and a positive page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageParams {
    pub page_number: u32,
    pub page_size: u32,
}

impl Default for PageParams {
    fn default() -> Self {
        Self {
            page_number: 1,
            page_size: 20,
        }
    }
}

/// Canonical serialization of a query parameter object, used as the cache
/// key. Deterministic: equal values always yield the same key, and any field
/// difference (including nested pagination) yields a different key.
pub trait QueryKey {
    fn cache_key(&self) -> String;
}

impl<T: Serialize> QueryKey for T {
    fn cache_key(&self) -> String {
        // serde_json emits struct fields in declaration order, so the
        // serialization is canonical for any given type.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Access to the pagination slice of a parameter object. The stores use this
/// for guarded page changes.
pub trait Paged {
    fn page(&self) -> &PageParams;
    fn page_mut(&mut self) -> &mut PageParams;
}

impl Paged for PageParams {
    fn page(&self) -> &PageParams {
        self
    }

    fn page_mut(&mut self) -> &mut PageParams {
        self
    }
}

/// Catalog query parameters for bikes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BikeFilter {
    #[serde(flatten)]
    pub paging: PageParams,
    pub brand: String,
    pub model: String,
    #[serde(rename = "type")]
    pub bike_type: String,
    pub year: i32,
    pub min_price: f64,
    pub max_price: f64,
    pub is_available: bool,
    pub order_by: String,
}

impl Default for BikeFilter {
    fn default() -> Self {
        Self {
            paging: PageParams::default(),
            brand: String::new(),
            model: String::new(),
            bike_type: String::new(),
            year: 0,
            min_price: 0.0,
            max_price: 0.0,
            is_available: true,
            order_by: "lastActive".to_string(),
        }
    }
}

impl Paged for BikeFilter {
    fn page(&self) -> &PageParams {
        &self.paging
    }

    fn page_mut(&mut self) -> &mut PageParams {
        &mut self.paging
    }
}

/// Member listing query parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberFilter {
    #[serde(flatten)]
    pub paging: PageParams,
    pub min_age: u32,
    pub max_age: u32,
    pub gender: String,
    pub order_by: String,
}

impl Default for MemberFilter {
    fn default() -> Self {
        Self {
            paging: PageParams::default(),
            min_age: 18,
            max_age: 99,
            gender: String::new(),
            order_by: "lastActive".to_string(),
        }
    }
}

impl Paged for MemberFilter {
    fn page(&self) -> &PageParams {
        &self.paging
    }

    fn page_mut(&mut self) -> &mut PageParams {
        &mut self.paging
    }
}
