//! Top-level wiring: one call builds the session, the REST client, and
//! every store from a validated [`ClientConfig`].

use crate::api_client::RestClient;
use crate::config::ClientConfig;
use crate::error::ClientResult;
use crate::notifications::{Notification, Notifier};
use crate::photos::PhotoMutationService;
use crate::session::SessionStore;
use crate::storage::Storage;
use crate::stores::{
    AccountService, AdminService, BikeStore, LikesStore, MemberStore, RentalService,
};
use std::sync::Arc;
use tokio::sync::mpsc;

pub struct PedalHubClient {
    pub session: Arc<SessionStore>,
    pub rest: RestClient,
    pub notifier: Notifier,
    pub account: AccountService,
    pub bikes: BikeStore,
    pub members: MemberStore,
    pub likes: Arc<LikesStore>,
    pub rentals: RentalService,
    pub admin: AdminService,
    pub photos: PhotoMutationService,
}

impl std::fmt::Debug for PedalHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PedalHubClient").finish_non_exhaustive()
    }
}

impl PedalHubClient {
    /// Builds the full client. The returned receiver carries user-facing
    /// notifications from every store; the caller drains and renders them.
    pub fn connect(config: &ClientConfig) -> ClientResult<(Self, mpsc::UnboundedReceiver<Notification>)> {
        config.validate()?;
        let storage = Storage::file_backed(config.storage_path.clone());
        let session = Arc::new(SessionStore::new(storage));
        let rest = RestClient::new(config, session.clone())?;
        let (notifier, notifications) = Notifier::channel();

        let client = Self {
            account: AccountService::new(rest.clone(), session.clone(), notifier.clone()),
            bikes: BikeStore::new(rest.clone()),
            members: MemberStore::new(rest.clone(), session.clone()),
            likes: Arc::new(LikesStore::new(rest.clone())),
            rentals: RentalService::new(rest.clone(), notifier.clone()),
            admin: AdminService::new(rest.clone(), notifier.clone()),
            photos: PhotoMutationService::new(
                Arc::new(rest.clone()),
                session.clone(),
                notifier.clone(),
            ),
            session,
            rest,
            notifier,
        };
        Ok((client, notifications))
    }

    /// Signs out everywhere: purges the session and resets per-user stores.
    pub fn logout(&self) {
        self.account.logout();
        self.likes.clear();
    }

    /// Re-derives the signed-in user from persisted tokens, mirroring the
    /// result into the likes store so a vanished user drops their liked ids.
    pub fn refresh_session(&self) {
        self.session
            .refresh_current_user(Some(self.likes.as_ref()));
    }
}
