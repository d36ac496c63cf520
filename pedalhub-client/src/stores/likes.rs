//! Likes: the signed-in user's liked-bike id set plus the liked-bikes page.
//!
//! The id set answers "is this bike liked?" for every catalog card without
//! a request per card. Toggling goes to the server first; the local set is
//! only flipped once the server accepts.

use crate::api_client::RestClient;
use crate::error::ClientResult;
use crate::store::{EntityStore, PageFetcher};
use crate::stores::bikes::BikeStore;
use async_trait::async_trait;
use pedalhub_core::{Bike, PageParams, PagedResult};
use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::Arc;

struct LikedBikesFetcher {
    client: RestClient,
}

#[async_trait]
impl PageFetcher<Bike, PageParams> for LikedBikesFetcher {
    async fn fetch_page(&self, params: &PageParams) -> ClientResult<PagedResult<Bike>> {
        self.client.get_liked_bikes(params).await
    }
}

pub struct LikesStore {
    client: RestClient,
    liked_ids: Mutex<HashSet<i64>>,
    list: EntityStore<Bike, PageParams>,
}

impl LikesStore {
    pub fn new(client: RestClient) -> Self {
        let fetcher = Arc::new(LikedBikesFetcher {
            client: client.clone(),
        });
        Self {
            client,
            liked_ids: Mutex::new(HashSet::new()),
            list: EntityStore::new(fetcher),
        }
    }

    /// The signed-in user's liked bikes as a paged listing.
    pub fn list(&self) -> &EntityStore<Bike, PageParams> {
        &self.list
    }

    pub fn is_liked(&self, bike_id: i64) -> bool {
        self.liked_ids
            .lock()
            .map(|ids| ids.contains(&bike_id))
            .unwrap_or(false)
    }

    pub fn liked_ids(&self) -> HashSet<i64> {
        self.liked_ids.lock().map(|ids| ids.clone()).unwrap_or_default()
    }

    /// Fetches the id set for `username`, replacing the local one.
    pub async fn load_like_ids(&self, username: &str) -> ClientResult<()> {
        let ids = self.client.get_like_ids(username).await?;
        if let Ok(mut liked) = self.liked_ids.lock() {
            *liked = ids.into_iter().collect();
        }
        Ok(())
    }

    /// Likes or unlikes a bike. On success the local id set flips, the
    /// liked listing drops its pages, and the catalog is refreshed since
    /// like counts ride along with bike cards.
    pub async fn toggle_like(&self, bike_id: i64, bikes: &BikeStore) -> ClientResult<bool> {
        self.client.toggle_like(bike_id).await?;

        let now_liked = match self.liked_ids.lock() {
            Ok(mut ids) => {
                if ids.remove(&bike_id) {
                    false
                } else {
                    ids.insert(bike_id);
                    true
                }
            }
            Err(_) => false,
        };

        self.list.invalidate();
        bikes.refresh_after_mutation().await?;
        Ok(now_liked)
    }

    /// Dropped on logout; a fresh sign-in reloads from the server.
    pub fn clear(&self) {
        if let Ok(mut ids) = self.liked_ids.lock() {
            ids.clear();
        }
        self.list.invalidate();
    }
}

/// When the session pushes a user change outward, a vanished user takes
/// the liked-id set with it. A new user's ids are loaded asynchronously by
/// the caller; stale ids from the previous user must not linger either way.
impl crate::session::UserSink for LikesStore {
    fn set_user(&self, _user: Option<pedalhub_core::User>) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::session::SessionStore;
    use crate::storage::Storage;

    fn offline_store() -> LikesStore {
        let session = Arc::new(SessionStore::new(Storage::in_memory()));
        let client = RestClient::new(&ClientConfig::for_tests(), session).unwrap();
        LikesStore::new(client)
    }

    #[test]
    fn test_unknown_bike_is_not_liked() {
        let store = offline_store();
        assert!(!store.is_liked(42));
        assert!(store.liked_ids().is_empty());
    }

    #[test]
    fn test_clear_empties_id_set() {
        let store = offline_store();
        if let Ok(mut ids) = store.liked_ids.lock() {
            ids.insert(1);
            ids.insert(2);
        }
        assert!(store.is_liked(1));

        store.clear();
        assert!(!store.is_liked(1));
        assert!(store.liked_ids().is_empty());
    }
}
