//! Keyed read-through cache for paged query results.
//!
//! Each distinct parameter set maps to one canonical key (see
//! [`pedalhub_core::QueryKey`]) and one cached [`PagedResult`]. Concurrent
//! misses on the same key are collapsed: the first caller fetches while the
//! rest wait on a per-key guard and then read the freshly inserted entry,
//! so a burst of identical queries costs one network round trip.

use crate::error::ClientResult;
use dashmap::DashMap;
use pedalhub_core::PagedResult;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;

pub struct QueryCache<T> {
    entries: DashMap<String, PagedResult<T>>,
    inflight: DashMap<String, Arc<Mutex<()>>>,
}

impl<T> Default for QueryCache<T> {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
            inflight: DashMap::new(),
        }
    }
}

impl<T: Clone> QueryCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<PagedResult<T>> {
        self.entries.get(key).map(|entry| entry.clone())
    }

    pub fn insert(&self, key: String, value: PagedResult<T>) {
        self.entries.insert(key, value);
    }

    /// Drops every cached page. In-flight fetches are unaffected; they will
    /// repopulate their key when they complete.
    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Read-through lookup. `forced` skips the cache read (both before and
    /// after the guard) but still stores the fetched page for later hits.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        key: &str,
        forced: bool,
        fetch: F,
    ) -> ClientResult<PagedResult<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ClientResult<PagedResult<T>>>,
    {
        if !forced {
            if let Some(hit) = self.get(key) {
                tracing::debug!(key, "cache hit");
                return Ok(hit);
            }
        }

        let guard = self
            .inflight
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _held = guard.lock().await;

        // Another task may have filled this key while we waited on the guard.
        if !forced {
            if let Some(hit) = self.get(key) {
                tracing::debug!(key, "cache hit after single-flight wait");
                return Ok(hit);
            }
        }

        tracing::debug!(key, forced, "cache miss, fetching");
        let page = fetch().await?;
        self.insert(key.to_string(), page.clone());
        Ok(page)
    }
}
