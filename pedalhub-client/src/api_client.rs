//! REST client for the PedalHub backend.
//!
//! One typed method per endpoint, shared JSON helpers, and a single
//! `parse_response` that maps backend failures onto the client error
//! taxonomy. Pagination travels in `pageNumber`/`pageSize` query parameters
//! on the way out and a JSON envelope in the `Pagination` response header on
//! the way back.
//!
//! Mutations here are plain request/response calls. They are never routed
//! through the cache/trigger pipeline: superseded-and-ignored semantics are
//! only safe for idempotent GETs.

use crate::config::ClientConfig;
use crate::error::{map_status, ClientResult};
use crate::session::SessionStore;
use pedalhub_core::{
    Bike, BikeFilter, BikeRentalHistory, CustomerRentalHistory, Member, MemberFilter, PageParams,
    PagedResult, Pagination, Photo, Rental, User, UserWithRoles,
};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::multipart::{Form, Part};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

const PAGINATION_HEADER: &str = "Pagination";

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub known_as: String,
    pub email: String,
    pub password: String,
}

#[derive(Clone)]
pub struct RestClient {
    client: reqwest::Client,
    base_url: String,
    session: Arc<SessionStore>,
}

impl RestClient {
    pub fn new(config: &ClientConfig, session: Arc<SessionStore>) -> ClientResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;
        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            session,
        })
    }

    fn auth_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(token) = self.session.access_token() {
            let value = format!("Bearer {}", token);
            if let Ok(value) = HeaderValue::from_str(&value) {
                headers.insert(AUTHORIZATION, value);
            }
        }
        headers
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    // ------------------------------------------------------------------------
    // Account
    // ------------------------------------------------------------------------

    pub async fn login(&self, request: &LoginRequest) -> ClientResult<User> {
        self.post_json("account/login", request).await
    }

    pub async fn register(&self, request: &RegisterRequest) -> ClientResult<User> {
        self.post_json("account/register", request).await
    }

    pub async fn email_exists(&self, email: &str) -> ClientResult<bool> {
        let response = self
            .client
            .get(self.url("account/emailExists"))
            .query(&[("email", email)])
            .headers(self.auth_headers())
            .send()
            .await?;
        self.parse_response(response).await
    }

    // ------------------------------------------------------------------------
    // Bikes
    // ------------------------------------------------------------------------

    pub async fn get_bikes(&self, filter: &BikeFilter) -> ClientResult<PagedResult<Bike>> {
        self.get_paged("bike/list", filter).await
    }

    pub async fn get_bike(&self, id: i64) -> ClientResult<Bike> {
        self.get_json(&format!("bike/{}", id)).await
    }

    pub async fn update_bike(&self, bike: &Bike) -> ClientResult<()> {
        let response = self
            .client
            .put(self.url(&format!("bike/{}", bike.id)))
            .headers(self.auth_headers())
            .json(bike)
            .send()
            .await?;
        self.expect_success(response).await
    }

    // ------------------------------------------------------------------------
    // Members
    // ------------------------------------------------------------------------

    pub async fn get_members(&self, filter: &MemberFilter) -> ClientResult<PagedResult<Member>> {
        self.get_paged("user", filter).await
    }

    pub async fn get_member(&self, username: &str) -> ClientResult<Member> {
        self.get_json(&format!("user/{}", username)).await
    }

    pub async fn update_member(&self, member: &Member) -> ClientResult<()> {
        let response = self
            .client
            .put(self.url("user"))
            .headers(self.auth_headers())
            .json(member)
            .send()
            .await?;
        self.expect_success(response).await
    }

    // ------------------------------------------------------------------------
    // Likes
    // ------------------------------------------------------------------------

    pub async fn toggle_like(&self, bike_id: i64) -> ClientResult<()> {
        let response = self
            .client
            .post(self.url(&format!("likes/{}", bike_id)))
            .headers(self.auth_headers())
            .send()
            .await?;
        self.expect_success(response).await
    }

    pub async fn get_liked_bikes(&self, params: &PageParams) -> ClientResult<PagedResult<Bike>> {
        self.get_paged("likes", params).await
    }

    pub async fn get_like_ids(&self, username: &str) -> ClientResult<Vec<i64>> {
        self.get_json(&format!("likes/list/{}", username)).await
    }

    // ------------------------------------------------------------------------
    // Rentals
    // ------------------------------------------------------------------------

    pub async fn rent_bike(&self, bike_id: i64) -> ClientResult<()> {
        let response = self
            .client
            .post(self.url(&format!("rental/{}", bike_id)))
            .headers(self.auth_headers())
            .send()
            .await?;
        self.expect_success(response).await
    }

    pub async fn return_bike(&self, bike_id: i64) -> ClientResult<()> {
        let response = self
            .client
            .put(self.url(&format!("rental/return/{}", bike_id)))
            .headers(self.auth_headers())
            .send()
            .await?;
        self.expect_success(response).await
    }

    pub async fn bike_rental_history(&self, bike_id: i64) -> ClientResult<BikeRentalHistory> {
        self.get_json(&format!("rental/bike/{}", bike_id)).await
    }

    /// One customer's rentals of one bike.
    pub async fn bike_customer_rentals(
        &self,
        bike_id: i64,
        username: &str,
    ) -> ClientResult<Vec<Rental>> {
        let response = self
            .client
            .get(self.url(&format!("rental/bike/{}", bike_id)))
            .query(&[("customer", username)])
            .headers(self.auth_headers())
            .send()
            .await?;
        self.parse_response(response).await
    }

    pub async fn customer_rental_history(
        &self,
        username: &str,
    ) -> ClientResult<CustomerRentalHistory> {
        self.get_json(&format!("rental/customer/{}/history", username))
            .await
    }

    // ------------------------------------------------------------------------
    // Admin
    // ------------------------------------------------------------------------

    pub async fn users_with_roles(&self) -> ClientResult<Vec<UserWithRoles>> {
        self.get_json("admin/users-with-roles").await
    }

    pub async fn edit_roles(&self, username: &str, roles: &[String]) -> ClientResult<Vec<String>> {
        let response = self
            .client
            .post(self.url(&format!("admin/edit-roles/{}", username)))
            .query(&[("roles", roles.join(","))])
            .headers(self.auth_headers())
            .send()
            .await?;
        self.parse_response(response).await
    }

    pub async fn photos_to_moderate(
        &self,
        filter: &MemberFilter,
    ) -> ClientResult<PagedResult<Member>> {
        self.get_paged("admin/userPhotos-to-moderate", filter).await
    }

    pub async fn approve_photo(&self, photo_id: i64) -> ClientResult<()> {
        let response = self
            .client
            .put(self.url(&format!("admin/approve-photo/{}", photo_id)))
            .headers(self.auth_headers())
            .send()
            .await?;
        self.expect_success(response).await
    }

    pub async fn reject_photo(&self, photo_id: i64) -> ClientResult<()> {
        let response = self
            .client
            .put(self.url(&format!("admin/reject-photo/{}", photo_id)))
            .headers(self.auth_headers())
            .send()
            .await?;
        self.expect_success(response).await
    }

    // ------------------------------------------------------------------------
    // Photos
    // ------------------------------------------------------------------------

    /// Multipart upload of one file to `{path}/{entity_id}/photos`.
    /// The bearer token is passed explicitly so the upload stays valid even
    /// while the session is being replaced mid-batch.
    pub async fn upload_photo(
        &self,
        path: &str,
        entity_id: &str,
        file_name: &str,
        bytes: Vec<u8>,
        token: &str,
    ) -> ClientResult<Photo> {
        let part = Part::bytes(bytes).file_name(file_name.to_string());
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(self.url(&format!("{}/{}/photos", path, entity_id)))
            .header(AUTHORIZATION, format!("Bearer {}", token))
            .multipart(form)
            .send()
            .await?;
        self.parse_response(response).await
    }

    pub async fn set_main_photo(
        &self,
        path: &str,
        entity_id: &str,
        photo_id: i64,
    ) -> ClientResult<()> {
        let response = self
            .client
            .put(self.url(&format!("{}/{}/set-main-photo/{}", path, entity_id, photo_id)))
            .headers(self.auth_headers())
            .send()
            .await?;
        self.expect_success(response).await
    }

    pub async fn delete_photo(
        &self,
        path: &str,
        entity_id: &str,
        photo_id: i64,
    ) -> ClientResult<()> {
        let response = self
            .client
            .delete(self.url(&format!("{}/delete-photo/{}", path, entity_id)))
            .query(&[("photoId", photo_id)])
            .headers(self.auth_headers())
            .send()
            .await?;
        self.expect_success(response).await
    }

    // ------------------------------------------------------------------------
    // Shared helpers
    // ------------------------------------------------------------------------

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        let response = self
            .client
            .get(self.url(path))
            .headers(self.auth_headers())
            .send()
            .await?;
        self.parse_response(response).await
    }

    async fn post_json<T, B>(&self, path: &str, body: &B) -> ClientResult<T>
    where
        T: serde::de::DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let response = self
            .client
            .post(self.url(path))
            .headers(self.auth_headers())
            .json(body)
            .send()
            .await?;
        self.parse_response(response).await
    }

    /// Paged GET: query parameters from the filter (which flattens its
    /// `pageNumber`/`pageSize`), body is the item list, pagination envelope
    /// in the `Pagination` header.
    async fn get_paged<T, Q>(&self, path: &str, query: &Q) -> ClientResult<PagedResult<T>>
    where
        T: serde::de::DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let response = self
            .client
            .get(self.url(path))
            .query(query)
            .headers(self.auth_headers())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_status(status.as_u16(), &body));
        }

        let pagination = parse_pagination_header(response.headers());
        let items = response.json::<Vec<T>>().await?;
        Ok(PagedResult::new(items, pagination))
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> ClientResult<T> {
        let status = response.status();
        if status.is_success() {
            Ok(response.json::<T>().await?)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(map_status(status.as_u16(), &body))
        }
    }

    async fn expect_success(&self, response: reqwest::Response) -> ClientResult<()> {
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(map_status(status.as_u16(), &body))
        }
    }
}

fn parse_pagination_header(headers: &HeaderMap) -> Option<Pagination> {
    let raw = headers.get(PAGINATION_HEADER)?.to_str().ok()?;
    match serde_json::from_str(raw) {
        Ok(pagination) => Some(pagination),
        Err(err) => {
            tracing::warn!(%err, "malformed Pagination header, treating as absent");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_header_parsed() {
        let mut headers = HeaderMap::new();
        headers.insert(
            PAGINATION_HEADER,
            HeaderValue::from_static(
                r#"{"currentPage":1,"totalPages":3,"itemsPerPage":20,"totalItems":55}"#,
            ),
        );
        let pagination = parse_pagination_header(&headers).unwrap();
        assert_eq!(pagination.total_pages, 3);
    }

    #[test]
    fn test_malformed_pagination_header_is_absent() {
        let mut headers = HeaderMap::new();
        headers.insert(PAGINATION_HEADER, HeaderValue::from_static("nonsense"));
        assert!(parse_pagination_header(&headers).is_none());
    }

    #[test]
    fn test_missing_pagination_header_is_absent() {
        assert!(parse_pagination_header(&HeaderMap::new()).is_none());
    }
}
