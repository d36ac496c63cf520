//! Presence manager: who is online right now, over a WebSocket with
//! reconnect backoff.
//!
//! The connection authenticates with the current access token. While the
//! session is anonymous the manager idles and retries, so signing in is
//! enough to bring presence up without extra wiring.

use crate::config::ClientConfig;
use crate::error::ClientResult;
use crate::notifications::Notifier;
use crate::session::SessionStore;
use futures_util::StreamExt;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type PresenceStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// One connection attempt, with the tungstenite error mapped into the
/// client taxonomy.
async fn connect(url: &str) -> ClientResult<PresenceStream> {
    let (stream, _response) = connect_async(url).await?;
    Ok(stream)
}

/// Server-to-client presence frames.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PresenceMessage {
    /// Full snapshot sent right after connecting.
    OnlineUsers { usernames: Vec<String> },
    UserOnline { username: String },
    UserOffline { username: String },
}

/// Applies one frame to the online set. Returns the username to announce
/// when somebody newly came online.
fn apply_message(online: &mut HashSet<String>, message: PresenceMessage) -> Option<String> {
    match message {
        PresenceMessage::OnlineUsers { usernames } => {
            *online = usernames.into_iter().collect();
            None
        }
        PresenceMessage::UserOnline { username } => {
            if online.insert(username.clone()) {
                Some(username)
            } else {
                None
            }
        }
        PresenceMessage::UserOffline { username } => {
            online.remove(&username);
            None
        }
    }
}

/// Spawns the presence loop; the returned receiver always holds the current
/// online set. The set empties whenever the connection drops.
pub fn spawn_presence_manager(
    config: &ClientConfig,
    session: Arc<SessionStore>,
    notifier: Notifier,
) -> watch::Receiver<HashSet<String>> {
    let (online_tx, online_rx) = watch::channel(HashSet::new());
    let endpoint = config.ws_endpoint.clone();
    let reconnect = config.reconnect.clone();

    tokio::spawn(async move {
        let mut backoff = reconnect.initial_ms;
        loop {
            let Some(token) = session.access_token() else {
                tokio::time::sleep(Duration::from_millis(backoff)).await;
                continue;
            };

            let url = format!("{}?access_token={}", endpoint, token);
            match connect(&url).await {
                Ok(mut stream) => {
                    tracing::debug!("presence connected");
                    backoff = reconnect.initial_ms;
                    let mut online = HashSet::new();

                    while let Some(message) = stream.next().await {
                        match message {
                            Ok(Message::Text(text)) => {
                                match serde_json::from_str::<PresenceMessage>(&text) {
                                    Ok(frame) => {
                                        if let Some(username) = apply_message(&mut online, frame) {
                                            notifier.info(format!("{} is online", username));
                                        }
                                        let _ = online_tx.send(online.clone());
                                    }
                                    Err(err) => {
                                        tracing::warn!(%err, "presence decode error");
                                    }
                                }
                            }
                            Ok(Message::Close(_)) => break,
                            Ok(_) => {}
                            Err(err) => {
                                tracing::warn!(%err, "presence stream error");
                                break;
                            }
                        }
                    }

                    tracing::debug!("presence disconnected");
                    let _ = online_tx.send(HashSet::new());
                }
                Err(err) => {
                    tracing::warn!(%err, "presence connect failed");
                }
            }

            let delay = jittered_backoff(backoff, reconnect.jitter_ms);
            tokio::time::sleep(Duration::from_millis(delay)).await;

            let next = (backoff as f64 * reconnect.multiplier) as u64;
            backoff = next.min(reconnect.max_ms);
        }
    });

    online_rx
}

fn jittered_backoff(base_ms: u64, jitter_ms: u64) -> u64 {
    if jitter_ms == 0 {
        return base_ms;
    }
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_nanos(0))
        .subsec_nanos() as u64;
    base_ms.saturating_add(nanos % jitter_ms)
}
