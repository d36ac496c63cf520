//! PedalHub client library exports.

pub mod api_client;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod notifications;
pub mod photos;
pub mod presence;
pub mod session;
pub mod sso;
pub mod storage;
pub mod store;
pub mod stores;

pub use client::PedalHubClient;
pub use error::{ClientError, ClientResult};
