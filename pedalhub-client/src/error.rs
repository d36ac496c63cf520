//! Error types for the PedalHub client.
//!
//! Backend failures are mapped onto a small taxonomy at the response-parsing
//! boundary; store pipelines never crash on them. The trigger returns to
//! idle and the previous result is retained.

use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// HTTP 400 carrying a field-error map, flattened into one list for the
    /// triggering form.
    #[error("validation failed: {0:?}")]
    Validation(Vec<String>),

    /// HTTP 400 without a field-error map.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// HTTP 401. Surfaced as a notification; no automatic redirect.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// HTTP 404. Consumers route to the not-found view.
    #[error("not found")]
    NotFound,

    /// HTTP 5xx. The payload travels with the error as navigation state.
    #[error("server error {status}: {body}")]
    Server { status: u16, body: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(String),

    /// The SSO popup handshake did not complete within its wait window.
    #[error("external login timed out")]
    SsoTimeout,

    #[error("external login message from untrusted origin: {0}")]
    SsoOriginRejected(String),

    #[error("unexpected response: {0}")]
    InvalidResponse(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for ClientError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(err))
    }
}

impl From<crate::config::ConfigError> for ClientError {
    fn from(err: crate::config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

/// Body shape of a 400 response carrying per-field validation errors.
#[derive(Debug, Deserialize)]
pub(crate) struct ValidationBody {
    #[serde(default)]
    pub errors: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Map a non-success HTTP status and body onto the client taxonomy.
pub(crate) fn map_status(status: u16, body: &str) -> ClientError {
    match status {
        400 => match serde_json::from_str::<ValidationBody>(body) {
            Ok(parsed) if !parsed.errors.is_empty() => {
                let flat = parsed.errors.into_values().flatten().collect();
                ClientError::Validation(flat)
            }
            Ok(parsed) => ClientError::BadRequest(parsed.message.unwrap_or_else(|| body.to_string())),
            Err(_) => ClientError::BadRequest(body.to_string()),
        },
        401 => ClientError::Unauthorized(body.to_string()),
        404 => ClientError::NotFound,
        500..=599 => ClientError::Server {
            status,
            body: body.to_string(),
        },
        _ => ClientError::InvalidResponse(format!("HTTP {}: {}", status, body)),
    }
}
