//! External (popup) sign-in handshake.
//!
//! The host shell opens the identity provider in a popup and forwards any
//! message it posts back over a channel. This module waits for exactly one
//! trusted message carrying a token, installs it in the session, and
//! returns the signed-in user. An untrusted origin aborts the handshake;
//! silence beyond the wait window times it out.

use crate::error::{ClientError, ClientResult};
use crate::session::SessionStore;
use pedalhub_core::User;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::mpsc;

/// How long the popup gets to complete the round trip.
pub const SSO_WAIT: Duration = Duration::from_secs(60);

pub const EXTERNAL_AUTH_TYPE: &str = "external_auth";

/// A message posted back by the popup, as relayed by the host shell.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalAuthMessage {
    /// Origin of the posting window, as observed by the shell.
    pub origin: String,
    #[serde(rename = "type")]
    pub message_type: String,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    /// Full user object, when the provider round trip returns one.
    pub user: Option<User>,
}

/// Waits for the popup handshake and signs the session in from its token.
pub async fn await_external_auth(
    rx: &mut mpsc::Receiver<ExternalAuthMessage>,
    allowed_origins: &[String],
    session: &SessionStore,
) -> ClientResult<User> {
    await_external_auth_within(rx, allowed_origins, session, SSO_WAIT).await
}

async fn await_external_auth_within(
    rx: &mut mpsc::Receiver<ExternalAuthMessage>,
    allowed_origins: &[String],
    session: &SessionStore,
    wait: Duration,
) -> ClientResult<User> {
    let message = tokio::time::timeout(wait, rx.recv())
        .await
        .map_err(|_| ClientError::SsoTimeout)?
        .ok_or_else(|| ClientError::InvalidResponse("auth channel closed".to_string()))?;

    if !allowed_origins.iter().any(|o| o == &message.origin) {
        tracing::warn!(origin = %message.origin, "rejecting external login message");
        return Err(ClientError::SsoOriginRejected(message.origin));
    }
    if message.message_type != EXTERNAL_AUTH_TYPE {
        return Err(ClientError::InvalidResponse(format!(
            "unexpected auth message type: {}",
            message.message_type
        )));
    }

    let token = message
        .access_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ClientError::InvalidResponse("auth message carried no token".to_string()))?;

    session.set_tokens(Some(token), message.refresh_token);
    if let Some(user) = message.user {
        // The provider's user object wins over what the token decodes to.
        session.set_current_user(Some(user));
    }
    session
        .current_user()
        .ok_or_else(|| ClientError::InvalidResponse("token did not decode to a user".to_string()))
}
