//! Admin operations: role management and the photo moderation queue.
//!
//! The moderation queue is a regular paged store over members whose photos
//! await review. Approving or rejecting a photo changes the queue's
//! contents, so both mutations invalidate and refresh it.

use crate::api_client::RestClient;
use crate::error::ClientResult;
use crate::notifications::Notifier;
use crate::store::{EntityStore, PageFetcher};
use async_trait::async_trait;
use pedalhub_core::{Member, MemberFilter, PagedResult, UserWithRoles};
use std::sync::Arc;
use tokio::sync::watch;

struct ModerationQueueFetcher {
    client: RestClient,
}

#[async_trait]
impl PageFetcher<Member, MemberFilter> for ModerationQueueFetcher {
    async fn fetch_page(&self, params: &MemberFilter) -> ClientResult<PagedResult<Member>> {
        self.client.photos_to_moderate(params).await
    }
}

pub struct AdminService {
    client: RestClient,
    notifier: Notifier,
    moderation_queue: EntityStore<Member, MemberFilter>,
    users_tx: watch::Sender<Vec<UserWithRoles>>,
}

impl AdminService {
    pub fn new(client: RestClient, notifier: Notifier) -> Self {
        let fetcher = Arc::new(ModerationQueueFetcher {
            client: client.clone(),
        });
        let (users_tx, _) = watch::channel(Vec::new());
        Self {
            client,
            notifier,
            moderation_queue: EntityStore::new(fetcher),
            users_tx,
        }
    }

    pub fn moderation_queue(&self) -> &EntityStore<Member, MemberFilter> {
        &self.moderation_queue
    }

    pub fn users(&self) -> Vec<UserWithRoles> {
        self.users_tx.borrow().clone()
    }

    pub fn subscribe_users(&self) -> watch::Receiver<Vec<UserWithRoles>> {
        self.users_tx.subscribe()
    }

    pub async fn users_with_roles(&self) -> ClientResult<Vec<UserWithRoles>> {
        let users = self.client.users_with_roles().await?;
        self.users_tx.send_replace(users.clone());
        Ok(users)
    }

    /// Replaces a user's role set; the locally held list is patched with
    /// the roles as the server now holds them.
    pub async fn edit_roles(
        &self,
        username: &str,
        roles: &[String],
    ) -> ClientResult<Vec<String>> {
        let updated = self.client.edit_roles(username, roles).await?;

        let patched = patch_roles(&self.users_tx.borrow(), username, &updated);
        self.users_tx.send_replace(patched);

        self.notifier.success(format!("Roles updated for {}", username));
        Ok(updated)
    }

    pub async fn approve_photo(&self, photo_id: i64) -> ClientResult<()> {
        self.client.approve_photo(photo_id).await?;
        self.notifier.success("Photo approved");
        self.refresh_queue().await
    }

    pub async fn reject_photo(&self, photo_id: i64) -> ClientResult<()> {
        self.client.reject_photo(photo_id).await?;
        self.notifier.success("Photo rejected");
        self.refresh_queue().await
    }

    async fn refresh_queue(&self) -> ClientResult<()> {
        self.moderation_queue.invalidate();
        self.moderation_queue.reload_forced().await
    }
}

/// Immutable patch of one user's roles in the cached listing.
fn patch_roles(rows: &[UserWithRoles], username: &str, roles: &[String]) -> Vec<UserWithRoles> {
    rows.iter()
        .map(|row| {
            if row.username == username {
                UserWithRoles {
                    username: row.username.clone(),
                    roles: roles.to_vec(),
                }
            } else {
                row.clone()
            }
        })
        .collect()
}
