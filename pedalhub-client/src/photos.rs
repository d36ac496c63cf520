//! Photo mutations over any photo-carrying entity.
//!
//! Member and bike photo galleries share the same lifecycle: upload,
//! promote one photo to main, delete. [`PhotoEntity`] abstracts the three
//! things the service needs from an entity (its route identifier, its photo
//! collection, its primary photo URL) so one [`PhotoMutationService`]
//! serves both.
//!
//! Every mutation returns an updated copy of the entity; the input is never
//! modified in place. Callers swap the copy into their store after the call
//! succeeds.

use crate::api_client::RestClient;
use crate::error::{ClientError, ClientResult};
use crate::notifications::Notifier;
use crate::session::SessionStore;
use async_trait::async_trait;
use pedalhub_core::{Bike, Member, Photo};
use std::path::Path;
use std::sync::Arc;

/// An entity whose photos can be managed through the shared photo endpoints.
pub trait PhotoEntity: Clone + Send + Sync {
    /// Route segment for this entity kind, e.g. `user` or `bike`.
    const PATH: &'static str;

    /// Path identifier of this specific entity.
    fn identifier(&self) -> String;

    fn photos(&self) -> &[Photo];
    fn photos_mut(&mut self) -> &mut Vec<Photo>;

    /// Denormalized URL of the main photo; empty when none is set.
    fn primary_photo_url(&self) -> &str;
    fn set_primary_photo_url(&mut self, url: String);
}

impl PhotoEntity for Member {
    const PATH: &'static str = "user";

    fn identifier(&self) -> String {
        self.username.clone()
    }

    fn photos(&self) -> &[Photo] {
        &self.user_photos
    }

    fn photos_mut(&mut self) -> &mut Vec<Photo> {
        &mut self.user_photos
    }

    fn primary_photo_url(&self) -> &str {
        &self.photo_url
    }

    fn set_primary_photo_url(&mut self, url: String) {
        self.photo_url = url;
    }
}

impl PhotoEntity for Bike {
    const PATH: &'static str = "bike";

    fn identifier(&self) -> String {
        self.id.to_string()
    }

    fn photos(&self) -> &[Photo] {
        &self.bike_photos
    }

    fn photos_mut(&mut self) -> &mut Vec<Photo> {
        &mut self.bike_photos
    }

    fn primary_photo_url(&self) -> &str {
        &self.photo_url
    }

    fn set_primary_photo_url(&mut self, url: String) {
        self.photo_url = url;
    }
}

/// Wire seam for photo endpoints, so the mutation logic can be exercised
/// without a live backend.
#[async_trait]
pub trait PhotoTransport: Send + Sync {
    async fn upload(
        &self,
        path: &str,
        entity_id: &str,
        file_name: &str,
        bytes: Vec<u8>,
        token: &str,
    ) -> ClientResult<Photo>;

    async fn set_main(&self, path: &str, entity_id: &str, photo_id: i64) -> ClientResult<()>;

    async fn delete(&self, path: &str, entity_id: &str, photo_id: i64) -> ClientResult<()>;
}

#[async_trait]
impl PhotoTransport for RestClient {
    async fn upload(
        &self,
        path: &str,
        entity_id: &str,
        file_name: &str,
        bytes: Vec<u8>,
        token: &str,
    ) -> ClientResult<Photo> {
        self.upload_photo(path, entity_id, file_name, bytes, token)
            .await
    }

    async fn set_main(&self, path: &str, entity_id: &str, photo_id: i64) -> ClientResult<()> {
        self.set_main_photo(path, entity_id, photo_id).await
    }

    async fn delete(&self, path: &str, entity_id: &str, photo_id: i64) -> ClientResult<()> {
        self.delete_photo(path, entity_id, photo_id).await
    }
}

pub struct PhotoMutationService {
    transport: Arc<dyn PhotoTransport>,
    session: Arc<SessionStore>,
    notifier: Notifier,
}

impl PhotoMutationService {
    pub fn new(
        transport: Arc<dyn PhotoTransport>,
        session: Arc<SessionStore>,
        notifier: Notifier,
    ) -> Self {
        Self {
            transport,
            session,
            notifier,
        }
    }

    /// Uploads one file and returns the entity with the new photo appended.
    /// If the backend marks the uploaded photo as main (it does for the first
    /// photo of a gallery), the primary URL follows.
    pub async fn upload<E: PhotoEntity>(
        &self,
        entity: &E,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> ClientResult<E> {
        let token = self
            .session
            .access_token()
            .ok_or_else(|| ClientError::Unauthorized("no active session".to_string()))?;
        let photo = self
            .transport
            .upload(E::PATH, &entity.identifier(), file_name, bytes, &token)
            .await?;

        let mut updated = entity.clone();
        apply_uploaded(&mut updated, photo);
        self.propagate_primary_url(&updated);
        Ok(updated)
    }

    /// Reads a file from disk and uploads it under its own file name.
    pub async fn upload_file<E: PhotoEntity>(&self, entity: &E, path: &Path) -> ClientResult<E> {
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                ClientError::BadRequest(format!("{} has no usable file name", path.display()))
            })?;
        let bytes = tokio::fs::read(path).await?;
        self.upload(entity, file_name, bytes).await
    }

    /// Uploads files one at a time, carrying the evolving entity forward so
    /// each success lands on the previous result. A failed file is recorded
    /// and skipped; the batch continues.
    pub async fn upload_batch<E: PhotoEntity>(
        &self,
        entity: &E,
        files: Vec<(String, Vec<u8>)>,
    ) -> (E, Vec<(String, ClientError)>) {
        let mut current = entity.clone();
        let mut failures = Vec::new();

        for (file_name, bytes) in files {
            match self.upload(&current, &file_name, bytes).await {
                Ok(updated) => current = updated,
                Err(err) => {
                    tracing::error!(file_name, %err, "photo upload failed, continuing batch");
                    self.notifier.error(format!("Upload failed for {}", file_name));
                    failures.push((file_name, err));
                }
            }
        }

        (current, failures)
    }

    /// Promotes `photo_id` to main. Exactly one photo carries `is_main`
    /// afterwards, and the primary URL points at it.
    pub async fn set_main<E: PhotoEntity>(&self, entity: &E, photo_id: i64) -> ClientResult<E> {
        let target_url = entity
            .photos()
            .iter()
            .find(|p| p.id == photo_id)
            .map(|p| p.url.clone())
            .ok_or(ClientError::NotFound)?;

        self.transport
            .set_main(E::PATH, &entity.identifier(), photo_id)
            .await?;

        let mut updated = entity.clone();
        apply_set_main(&mut updated, photo_id, target_url);
        self.propagate_primary_url(&updated);
        Ok(updated)
    }

    /// Removes `photo_id`. Deleting the main photo promotes nothing and
    /// leaves the primary URL as it was; consumers prompt for a new main.
    pub async fn delete<E: PhotoEntity>(&self, entity: &E, photo_id: i64) -> ClientResult<E> {
        if !entity.photos().iter().any(|p| p.id == photo_id) {
            return Err(ClientError::NotFound);
        }

        self.transport
            .delete(E::PATH, &entity.identifier(), photo_id)
            .await?;

        let mut updated = entity.clone();
        apply_deleted(&mut updated, photo_id);
        self.propagate_primary_url(&updated);
        Ok(updated)
    }

    /// When the mutated entity is the signed-in member, the session's avatar
    /// URL follows the entity's primary photo.
    fn propagate_primary_url<E: PhotoEntity>(&self, entity: &E) {
        if E::PATH != Member::PATH {
            return;
        }
        let Some(user) = self.session.current_user() else {
            return;
        };
        if user.username == entity.identifier() && user.photo_url != entity.primary_photo_url() {
            self.session.set_photo_url(entity.primary_photo_url());
        }
    }
}

fn apply_uploaded<E: PhotoEntity>(entity: &mut E, photo: Photo) {
    if photo.is_main {
        for existing in entity.photos_mut().iter_mut() {
            existing.is_main = false;
        }
        entity.set_primary_photo_url(photo.url.clone());
    }
    entity.photos_mut().push(photo);
}

fn apply_set_main<E: PhotoEntity>(entity: &mut E, photo_id: i64, url: String) {
    for photo in entity.photos_mut().iter_mut() {
        photo.is_main = photo.id == photo_id;
    }
    entity.set_primary_photo_url(url);
}

fn apply_deleted<E: PhotoEntity>(entity: &mut E, photo_id: i64) {
    entity.photos_mut().retain(|p| p.id != photo_id);
}
