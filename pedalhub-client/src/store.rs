//! Generic reactive store over one paged endpoint.
//!
//! An [`EntityStore`] owns the current filter parameters, a [`QueryCache`],
//! and a watch channel carrying the latest committed page. Every load runs
//! the same pipeline: bump the generation counter, snapshot the params,
//! consult the cache (single-flight on miss), then commit the result only if
//! no newer load started in the meantime. A superseded load's result is
//! dropped rather than cancelled, so rapid filter changes can never publish
//! a stale page over a newer one.
//!
//! A failed load keeps the previously committed page in place; the error is
//! returned to the caller instead of blanking the channel.

use crate::cache::QueryCache;
use crate::error::ClientResult;
use async_trait::async_trait;
use pedalhub_core::{Paged, PagedResult, QueryKey};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

/// The network seam: one async call that turns params into a page.
#[async_trait]
pub trait PageFetcher<T, P>: Send + Sync {
    async fn fetch_page(&self, params: &P) -> ClientResult<PagedResult<T>>;
}

pub struct EntityStore<T, P> {
    fetcher: Arc<dyn PageFetcher<T, P>>,
    cache: QueryCache<T>,
    params: Mutex<P>,
    generation: AtomicU64,
    result_tx: watch::Sender<PagedResult<T>>,
}

impl<T, P> EntityStore<T, P>
where
    T: Clone + Send + Sync + 'static,
    P: Paged + QueryKey + Default + Clone + Send + Sync + 'static,
{
    pub fn new(fetcher: Arc<dyn PageFetcher<T, P>>) -> Self {
        let (result_tx, _) = watch::channel(PagedResult::default());
        Self {
            fetcher,
            cache: QueryCache::new(),
            params: Mutex::new(P::default()),
            generation: AtomicU64::new(0),
            result_tx,
        }
    }

    /// Latest committed page. Starts empty until the first successful load.
    pub fn current(&self) -> PagedResult<T> {
        self.result_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PagedResult<T>> {
        self.result_tx.subscribe()
    }

    pub fn params(&self) -> P {
        self.params
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }

    /// Replaces the whole parameter set and loads the matching page.
    pub async fn set_params(&self, params: P) -> ClientResult<()> {
        if let Ok(mut current) = self.params.lock() {
            *current = params;
        }
        self.reload().await
    }

    /// Cache-friendly load of the current params.
    pub async fn reload(&self) -> ClientResult<()> {
        self.run(false).await
    }

    /// Skips the cache read and refreshes the entry for the current params.
    pub async fn reload_forced(&self) -> ClientResult<()> {
        self.run(true).await
    }

    /// Moves to `page_number`. Asking for the page already shown is a no-op;
    /// the cached entry is already on the channel and a refetch would only
    /// add churn.
    pub async fn change_page(&self, page_number: u32) -> ClientResult<()> {
        let changed = match self.params.lock() {
            Ok(mut params) => {
                if params.page().page_number == page_number {
                    false
                } else {
                    params.page_mut().page_number = page_number;
                    true
                }
            }
            Err(_) => false,
        };
        if changed {
            self.reload().await
        } else {
            Ok(())
        }
    }

    /// Changes the page size and returns to page 1, where the resized pages
    /// start over. Same size is a no-op.
    pub async fn change_page_size(&self, page_size: u32) -> ClientResult<()> {
        let changed = match self.params.lock() {
            Ok(mut params) => {
                if params.page().page_size == page_size {
                    false
                } else {
                    params.page_mut().page_size = page_size;
                    params.page_mut().page_number = 1;
                    true
                }
            }
            Err(_) => false,
        };
        if changed {
            self.reload().await
        } else {
            Ok(())
        }
    }

    /// Back to default filters and loads the first page.
    pub async fn reset_filters(&self) -> ClientResult<()> {
        self.set_params(P::default()).await
    }

    /// Drops every cached page for this store. Mutators that change what the
    /// backend would return call this before reloading.
    pub fn invalidate(&self) {
        self.cache.clear();
    }

    async fn run(&self, forced: bool) -> ClientResult<()> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let params = self.params();
        let key = params.cache_key();

        let outcome = self
            .cache
            .get_or_fetch(&key, forced, || self.fetcher.fetch_page(&params))
            .await;

        match outcome {
            Ok(page) => {
                if self.generation.load(Ordering::SeqCst) == generation {
                    self.result_tx.send_replace(page);
                    Ok(())
                } else {
                    // A newer load owns the channel now.
                    tracing::debug!(key, generation, "load superseded, dropping result");
                    Ok(())
                }
            }
            Err(err) => {
                tracing::warn!(key, %err, "page load failed, keeping previous result");
                Err(err)
            }
        }
    }
}

// Blanket adapter so stores can be wired from a plain async closure in tests
// and from one-off endpoints without a named fetcher type.
pub struct FnFetcher<F>(pub F);

#[async_trait]
impl<T, P, F, Fut> PageFetcher<T, P> for FnFetcher<F>
where
    T: Send + Sync + 'static,
    P: Clone + Send + Sync + 'static,
    F: Fn(P) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = ClientResult<PagedResult<T>>> + Send,
{
    async fn fetch_page(&self, params: &P) -> ClientResult<PagedResult<T>> {
        (self.0)(params.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;
    use pedalhub_core::{BikeFilter, PageParams};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    type CountedFetch = Arc<AtomicUsize>;

    fn counting_store(
        delay_ms: u64,
    ) -> (Arc<EntityStore<u32, BikeFilter>>, CountedFetch) {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_inner = calls.clone();
        let fetcher = FnFetcher(move |params: BikeFilter| {
            let calls = calls_inner.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                if delay_ms > 0 {
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
                Ok(PagedResult::new(vec![params.paging.page_number], None))
            }
        });
        (Arc::new(EntityStore::new(Arc::new(fetcher))), calls)
    }

    #[tokio::test]
    async fn test_same_params_fetch_once() {
        let (store, calls) = counting_store(0);
        store.reload().await.unwrap();
        store.reload().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.current().items, vec![1]);
    }

    #[tokio::test]
    async fn test_forced_reload_bypasses_cache() {
        let (store, calls) = counting_store(0);
        store.reload().await.unwrap();
        store.reload_forced().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_change_page_to_current_is_noop() {
        let (store, calls) = counting_store(0);
        store.reload().await.unwrap();
        store.change_page(1).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        store.change_page(2).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.current().items, vec![2]);
    }

    #[tokio::test]
    async fn test_change_page_size_resets_to_first_page() {
        let (store, _) = counting_store(0);
        store.change_page(3).await.unwrap();
        store.change_page_size(50).await.unwrap();

        let params = store.params();
        assert_eq!(params.paging.page_size, 50);
        assert_eq!(params.paging.page_number, 1);
    }

    #[tokio::test]
    async fn test_newer_load_wins_over_slower_older_one() {
        // Old load is slow, new load is instant. The old result arrives last
        // but must not overwrite the newer page.
        let slow = Arc::new(AtomicUsize::new(0));
        let slow_inner = slow.clone();
        let fetcher = FnFetcher(move |params: BikeFilter| {
            let slow = slow_inner.clone();
            async move {
                let n = params.paging.page_number;
                if n == 1 {
                    slow.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(40)).await;
                }
                Ok(PagedResult::new(vec![n], None))
            }
        });
        let store: Arc<EntityStore<u32, BikeFilter>> =
            Arc::new(EntityStore::new(Arc::new(fetcher)));

        let old = {
            let store = store.clone();
            tokio::spawn(async move { store.reload().await })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        store.change_page(2).await.unwrap();

        old.await.unwrap().unwrap();
        assert_eq!(slow.load(Ordering::SeqCst), 1);
        assert_eq!(store.current().items, vec![2]);
    }

    #[tokio::test]
    async fn test_error_keeps_previous_result() {
        let healthy = Arc::new(std::sync::atomic::AtomicBool::new(true));
        let healthy_inner = healthy.clone();
        let fetcher = FnFetcher(move |params: BikeFilter| {
            let healthy = healthy_inner.clone();
            async move {
                if healthy.load(Ordering::SeqCst) {
                    Ok(PagedResult::new(vec![params.paging.page_number], None))
                } else {
                    Err(ClientError::Server {
                        status: 500,
                        body: "boom".to_string(),
                    })
                }
            }
        });
        let store: EntityStore<u32, BikeFilter> = EntityStore::new(Arc::new(fetcher));

        store.reload().await.unwrap();
        assert_eq!(store.current().items, vec![1]);

        healthy.store(false, Ordering::SeqCst);
        let err = store.change_page(2).await.unwrap_err();
        assert!(matches!(err, ClientError::Server { status: 500, .. }));
        assert_eq!(store.current().items, vec![1]);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let (store, calls) = counting_store(0);
        store.reload().await.unwrap();
        store.invalidate();
        store.reload().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_reset_filters_returns_to_defaults() {
        let (store, _) = counting_store(0);
        let mut custom = BikeFilter::default();
        custom.brand = "Trek".to_string();
        custom.paging = PageParams {
            page_number: 4,
            page_size: 10,
        };
        store.set_params(custom).await.unwrap();

        store.reset_filters().await.unwrap();
        let params = store.params();
        assert_eq!(params.brand, "");
        assert_eq!(params.paging.page_number, 1);
    }

    #[tokio::test]
    async fn test_subscribers_see_committed_pages() {
        let (store, _) = counting_store(0);
        let mut rx = store.subscribe();
        assert!(rx.borrow().items.is_empty());

        store.reload().await.unwrap();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().items, vec![1]);
    }
}
