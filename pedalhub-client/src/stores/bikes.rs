//! Bike catalog store: the paged listing plus single-bike detail state.

use crate::api_client::RestClient;
use crate::error::ClientResult;
use crate::store::{EntityStore, PageFetcher};
use async_trait::async_trait;
use pedalhub_core::{Bike, BikeFilter, PagedResult};
use std::sync::Arc;
use tokio::sync::watch;

struct BikeListFetcher {
    client: RestClient,
}

#[async_trait]
impl PageFetcher<Bike, BikeFilter> for BikeListFetcher {
    async fn fetch_page(&self, params: &BikeFilter) -> ClientResult<PagedResult<Bike>> {
        self.client.get_bikes(params).await
    }
}

pub struct BikeStore {
    client: RestClient,
    list: EntityStore<Bike, BikeFilter>,
    detail_tx: watch::Sender<Option<Bike>>,
}

impl BikeStore {
    pub fn new(client: RestClient) -> Self {
        let fetcher = Arc::new(BikeListFetcher {
            client: client.clone(),
        });
        Self::with_fetcher(client, fetcher)
    }

    fn with_fetcher(client: RestClient, fetcher: Arc<dyn PageFetcher<Bike, BikeFilter>>) -> Self {
        let (detail_tx, _) = watch::channel(None);
        Self {
            client,
            list: EntityStore::new(fetcher),
            detail_tx,
        }
    }

    /// The paged catalog listing.
    pub fn list(&self) -> &EntityStore<Bike, BikeFilter> {
        &self.list
    }

    pub fn detail(&self) -> Option<Bike> {
        self.detail_tx.borrow().clone()
    }

    pub fn subscribe_detail(&self) -> watch::Receiver<Option<Bike>> {
        self.detail_tx.subscribe()
    }

    /// Loads one bike into the detail slot. The listing tries to serve the
    /// bike from its committed page first to avoid a round trip.
    pub async fn load_bike(&self, id: i64) -> ClientResult<Bike> {
        if let Some(bike) = self
            .list
            .current()
            .items
            .iter()
            .find(|b| b.id == id)
            .cloned()
        {
            self.detail_tx.send_replace(Some(bike.clone()));
            return Ok(bike);
        }

        let bike = self.client.get_bike(id).await?;
        self.detail_tx.send_replace(Some(bike.clone()));
        Ok(bike)
    }

    /// Persists an edited bike, then drops stale pages and refreshes the
    /// listing so every subscriber sees the new values.
    pub async fn update_bike(&self, bike: &Bike) -> ClientResult<()> {
        self.client.update_bike(bike).await?;
        self.set_detail_if_current(bike);
        self.refresh_after_mutation().await
    }

    /// Replaces the detail slot when it holds the given bike.
    pub fn set_detail_if_current(&self, bike: &Bike) {
        let holds_bike = self
            .detail_tx
            .borrow()
            .as_ref()
            .map(|current| current.id == bike.id)
            .unwrap_or(false);
        if holds_bike {
            self.detail_tx.send_replace(Some(bike.clone()));
        }
    }

    /// Invalidate-then-reload after any mutation that changes what the
    /// catalog queries would return (edits, rentals, returns).
    pub async fn refresh_after_mutation(&self) -> ClientResult<()> {
        self.list.invalidate();
        self.list.reload_forced().await
    }
}
