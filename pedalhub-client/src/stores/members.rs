//! Member directory store: the paged listing plus per-username detail state.

use crate::api_client::RestClient;
use crate::error::ClientResult;
use crate::photos::PhotoMutationService;
use crate::session::SessionStore;
use crate::store::{EntityStore, PageFetcher};
use async_trait::async_trait;
use pedalhub_core::{Member, MemberFilter, PagedResult};
use std::sync::Arc;
use tokio::sync::watch;

struct MemberListFetcher {
    client: RestClient,
}

#[async_trait]
impl PageFetcher<Member, MemberFilter> for MemberListFetcher {
    async fn fetch_page(&self, params: &MemberFilter) -> ClientResult<PagedResult<Member>> {
        self.client.get_members(params).await
    }
}

pub struct MemberStore {
    client: RestClient,
    session: Arc<SessionStore>,
    list: EntityStore<Member, MemberFilter>,
    detail_tx: watch::Sender<Option<Member>>,
}

impl MemberStore {
    pub fn new(client: RestClient, session: Arc<SessionStore>) -> Self {
        let fetcher = Arc::new(MemberListFetcher {
            client: client.clone(),
        });
        Self::with_fetcher(client, session, fetcher)
    }

    fn with_fetcher(
        client: RestClient,
        session: Arc<SessionStore>,
        fetcher: Arc<dyn PageFetcher<Member, MemberFilter>>,
    ) -> Self {
        let (detail_tx, _) = watch::channel(None);
        Self {
            client,
            session,
            list: EntityStore::new(fetcher),
            detail_tx,
        }
    }

    pub fn list(&self) -> &EntityStore<Member, MemberFilter> {
        &self.list
    }

    pub fn detail(&self) -> Option<Member> {
        self.detail_tx.borrow().clone()
    }

    pub fn subscribe_detail(&self) -> watch::Receiver<Option<Member>> {
        self.detail_tx.subscribe()
    }

    /// Loads one member into the detail slot, serving from the committed
    /// listing page when possible.
    pub async fn load_member(&self, username: &str) -> ClientResult<Member> {
        if let Some(member) = self
            .list
            .current()
            .items
            .iter()
            .find(|m| m.username == username)
            .cloned()
        {
            self.detail_tx.send_replace(Some(member.clone()));
            return Ok(member);
        }

        let member = self.client.get_member(username).await?;
        self.detail_tx.send_replace(Some(member.clone()));
        Ok(member)
    }

    /// Persists an edited profile. Editing only applies to the signed-in
    /// member, so the session user's display fields follow.
    pub async fn update_member(&self, member: &Member) -> ClientResult<()> {
        self.client.update_member(member).await?;

        if let Some(mut user) = self.session.current_user() {
            if user.username == member.username {
                user.known_as = member.known_as.clone();
                self.session.set_current_user(Some(user));
            }
        }

        self.apply_member(member);
        self.list.invalidate();
        self.list.reload_forced().await
    }

    /// Swaps an externally mutated member (e.g. after a photo change) into
    /// the detail slot and drops stale listing pages. The caller decides
    /// when to reload the listing.
    pub fn apply_member(&self, member: &Member) {
        let holds_member = self
            .detail_tx
            .borrow()
            .as_ref()
            .map(|current| current.username == member.username)
            .unwrap_or(false);
        if holds_member {
            self.detail_tx.send_replace(Some(member.clone()));
        }
        self.list.invalidate();
    }

    /// Uploads a profile photo through the shared photo service and applies
    /// the updated member locally.
    pub async fn upload_photo(
        &self,
        photos: &PhotoMutationService,
        member: &Member,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> ClientResult<Member> {
        let updated = photos.upload(member, file_name, bytes).await?;
        self.apply_member(&updated);
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::storage::Storage;
    use crate::store::FnFetcher;

    fn member(username: &str) -> Member {
        Member {
            id: 1,
            username: username.to_string(),
            known_as: username.to_string(),
            email: format!("{}@test.local", username),
            photo_url: String::new(),
            age: 28,
            gender: "male".to_string(),
            city: "Utrecht".to_string(),
            created: chrono::Utc::now(),
            last_active: chrono::Utc::now(),
            user_photos: vec![],
        }
    }

    fn store_with(members: Vec<Member>) -> (MemberStore, Arc<SessionStore>) {
        let session = Arc::new(SessionStore::new(Storage::in_memory()));
        let config = ClientConfig::for_tests();
        let client = RestClient::new(&config, session.clone()).unwrap();
        let fetcher = FnFetcher(move |_: MemberFilter| {
            let members = members.clone();
            async move { Ok(PagedResult::new(members, None)) }
        });
        (
            MemberStore::with_fetcher(client, session.clone(), Arc::new(fetcher)),
            session,
        )
    }

    #[tokio::test]
    async fn test_load_member_served_from_committed_page() {
        let (store, _) = store_with(vec![member("anna"), member("ben")]);
        store.list().reload().await.unwrap();

        let loaded = store.load_member("ben").await.unwrap();
        assert_eq!(loaded.username, "ben");
        assert_eq!(store.detail().unwrap().username, "ben");
    }

    #[tokio::test]
    async fn test_apply_member_updates_detail_and_drops_cache() {
        let (store, _) = store_with(vec![member("anna")]);
        store.list().reload().await.unwrap();
        store.load_member("anna").await.unwrap();

        let mut changed = member("anna");
        changed.city = "Leiden".to_string();
        store.apply_member(&changed);

        assert_eq!(store.detail().unwrap().city, "Leiden");
    }

    #[tokio::test]
    async fn test_apply_member_ignores_other_detail() {
        let (store, _) = store_with(vec![member("anna"), member("ben")]);
        store.list().reload().await.unwrap();
        store.load_member("anna").await.unwrap();

        store.apply_member(&member("ben"));
        assert_eq!(store.detail().unwrap().username, "anna");
    }
}
