//! Session store: the single authoritative view of "who is logged in".
//!
//! Hydrated at startup from the most durable available source (auth cookie,
//! then durable storage), kept consistent by being the only writer of session
//! state. Consumers observe the current user through a watch channel.
//!
//! Token claims are extracted without signature verification, since the
//! backend verifies; the client only needs the identity payload. A malformed
//! token is never an error here: it logs a warning and yields an anonymous
//! session.

use crate::storage::{
    Storage, COOKIE_ACCESS_TOKEN, KEY_ACCESS_TOKEN, KEY_REFRESH_TOKEN, KEY_USER,
};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use pedalhub_core::User;
use serde::Deserialize;
use std::sync::Mutex;
use tokio::sync::watch;

/// Role claim: backends emit either a scalar or an array.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RoleClaim {
    One(String),
    Many(Vec<String>),
}

/// The claims the client cares about. Everything optional; missing fields
/// degrade gracefully.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenClaims {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub unique_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, rename = "photoUrl")]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub role: Option<RoleClaim>,
    #[serde(default)]
    pub roles: Option<Vec<String>>,
    #[serde(default)]
    pub exp: Option<i64>,
}

impl TokenClaims {
    /// `role ?? roles ?? []`, with a scalar claim normalized to one element.
    pub fn role_names(&self) -> Vec<String> {
        match (&self.role, &self.roles) {
            (Some(RoleClaim::One(role)), _) => vec![role.clone()],
            (Some(RoleClaim::Many(roles)), _) => roles.clone(),
            (None, Some(roles)) => roles.clone(),
            (None, None) => Vec::new(),
        }
    }
}

/// Decode the payload segment of a JWT without verifying the signature.
/// Returns `None` on any malformation (missing segment, bad base64url,
/// non-JSON payload); the failure is logged at warning level.
pub fn decode_claims(token: &str) -> Option<TokenClaims> {
    let mut segments = token.split('.');
    let _header = segments.next()?;
    let payload = match segments.next() {
        Some(p) if !p.is_empty() => p,
        _ => {
            tracing::warn!("token has no payload segment");
            return None;
        }
    };

    let trimmed = payload.trim_end_matches('=');
    let bytes = match URL_SAFE_NO_PAD.decode(trimmed) {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::warn!(%err, "token payload is not valid base64url");
            return None;
        }
    };

    match serde_json::from_slice::<TokenClaims>(&bytes) {
        Ok(claims) => Some(claims),
        Err(err) => {
            tracing::warn!(%err, "token payload is not valid JSON");
            None
        }
    }
}

/// Build a minimal `User` from an access token's claims.
/// Username falls back `unique_name` -> `username` -> local part of the email.
pub fn user_from_token(token: &str) -> Option<User> {
    let claims = decode_claims(token)?;
    let email = claims.email.clone().unwrap_or_default();
    let username = claims
        .unique_name
        .clone()
        .or_else(|| claims.username.clone())
        .or_else(|| email.split('@').next().map(String::from))
        .unwrap_or_default();

    Some(User {
        known_as: username.clone(),
        username,
        email,
        photo_url: claims.photo_url.clone().unwrap_or_default(),
        roles: claims.role_names(),
        token: token.to_string(),
    })
}

/// One-shot sink the session writes the refreshed user into. Breaks the
/// session-store/account-facade ownership cycle: the facade is passed in at
/// the call site, never stored.
pub trait UserSink {
    fn set_user(&self, user: Option<User>);
}

struct Tokens {
    access: Option<String>,
    refresh: Option<String>,
}

pub struct SessionStore {
    storage: Storage,
    tokens: Mutex<Tokens>,
    user_tx: watch::Sender<Option<User>>,
}

impl SessionStore {
    /// Create the store and hydrate it from persisted state. Entity stores
    /// must not issue their first request before this has run.
    pub fn new(storage: Storage) -> Self {
        let (user_tx, _) = watch::channel(None);
        let store = Self {
            storage,
            tokens: Mutex::new(Tokens {
                access: None,
                refresh: None,
            }),
            user_tx,
        };
        store.hydrate();
        store
    }

    /// Hydration: auth cookie first, then durable storage. Decode failures
    /// fall back to anonymous.
    fn hydrate(&self) {
        let token = self
            .storage
            .cookies
            .get(COOKIE_ACCESS_TOKEN)
            .or_else(|| self.storage.durable.get(KEY_ACCESS_TOKEN));

        if let Some(token) = token {
            if let Some(user) = user_from_token(&token) {
                if let Ok(mut tokens) = self.tokens.lock() {
                    tokens.access = Some(token);
                }
                let _ = self.user_tx.send(Some(user));
                return;
            }
        }
        let _ = self.user_tx.send(None);
    }

    /// Current user snapshot.
    pub fn current_user(&self) -> Option<User> {
        self.user_tx.borrow().clone()
    }

    /// Observe user changes.
    pub fn subscribe(&self) -> watch::Receiver<Option<User>> {
        self.user_tx.subscribe()
    }

    pub fn access_token(&self) -> Option<String> {
        self.tokens.lock().ok().and_then(|t| t.access.clone())
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.tokens.lock().ok().and_then(|t| t.refresh.clone())
    }

    /// Roles of the current user; empty when anonymous.
    pub fn roles(&self) -> Vec<String> {
        self.current_user().map(|u| u.roles).unwrap_or_default()
    }

    /// Replace both tokens, persist them (or remove the persisted copy when
    /// `None`), and re-derive the current user from the new access token.
    pub fn set_tokens(&self, access: Option<String>, refresh: Option<String>) {
        match &access {
            Some(token) => self.storage.durable.set(KEY_ACCESS_TOKEN, token),
            None => self.storage.durable.remove(KEY_ACCESS_TOKEN),
        }
        match &refresh {
            Some(token) => self.storage.durable.set(KEY_REFRESH_TOKEN, token),
            None => self.storage.durable.remove(KEY_REFRESH_TOKEN),
        }

        if let Ok(mut tokens) = self.tokens.lock() {
            tokens.access = access.clone();
            tokens.refresh = refresh;
        }

        if let Some(token) = access {
            if let Some(user) = user_from_token(&token) {
                let _ = self.user_tx.send(Some(user));
            }
        }
    }

    /// Explicit override after login/register responses that carry a full
    /// user object. Persists the serialized user for recovery across
    /// reloads; `None` clears all persisted copies.
    pub fn set_current_user(&self, user: Option<User>) {
        match &user {
            Some(user) => {
                if let Ok(serialized) = serde_json::to_string(user) {
                    self.storage.durable.set(KEY_USER, &serialized);
                    self.storage.session.set(KEY_USER, &serialized);
                }
                if !user.token.is_empty() {
                    self.storage.durable.set(KEY_ACCESS_TOKEN, &user.token);
                    if let Ok(mut tokens) = self.tokens.lock() {
                        tokens.access = Some(user.token.clone());
                    }
                }
            }
            None => {
                self.storage.durable.remove(KEY_USER);
                self.storage.session.remove(KEY_USER);
            }
        }
        let _ = self.user_tx.send(user);
    }

    /// Re-derive the current user from whatever token is persisted right
    /// now, optionally mirroring the result into a caller-supplied sink.
    pub fn refresh_current_user(&self, sink: Option<&dyn UserSink>) {
        let token = self
            .storage
            .cookies
            .get(COOKIE_ACCESS_TOKEN)
            .or_else(|| self.storage.durable.get(KEY_ACCESS_TOKEN));

        let user = token.as_deref().and_then(user_from_token);
        if user.is_some() {
            if let Ok(mut tokens) = self.tokens.lock() {
                tokens.access = token;
            }
        }
        if let Some(sink) = sink {
            sink.set_user(user.clone());
        }
        let _ = self.user_tx.send(user);
    }

    /// Refresh the cached avatar URL without a server round trip. Used by
    /// the photo service when the user's own main photo changes.
    pub fn set_photo_url(&self, url: &str) {
        let updated = self.current_user().map(|mut user| {
            user.photo_url = url.to_string();
            user
        });
        if let Some(user) = updated {
            self.set_current_user(Some(user));
        }
    }

    /// Full logout: drop in-memory state and purge every persisted copy
    /// (durable, session-scoped, cookies). Idempotent.
    pub fn logout(&self) {
        if let Ok(mut tokens) = self.tokens.lock() {
            tokens.access = None;
            tokens.refresh = None;
        }
        self.storage.purge_session_keys();
        let _ = self.user_tx.send(None);
    }
}


#[cfg(test)]
mod tests {
    use super::test_tokens::token_with_payload;
    use super::*;
    use serde_json::json;

    // ========================================================================
    // Claim decoding
    // ========================================================================

    #[test]
    fn test_scalar_role_normalized_to_one_element() {
        let token = token_with_payload(&json!({ "unique_name": "bob", "role": "Member" }));
        let user = user_from_token(&token).unwrap();
        assert_eq!(user.roles, vec!["Member".to_string()]);
    }

    #[test]
    fn test_array_role_claim_unchanged() {
        let token =
            token_with_payload(&json!({ "unique_name": "bob", "role": ["Admin", "Moderator"] }));
        let user = user_from_token(&token).unwrap();
        assert_eq!(user.roles, vec!["Admin".to_string(), "Moderator".to_string()]);
    }

    #[test]
    fn test_missing_role_claim_is_empty() {
        let token = token_with_payload(&json!({ "unique_name": "bob" }));
        let user = user_from_token(&token).unwrap();
        assert!(user.roles.is_empty());
    }

    #[test]
    fn test_roles_field_used_when_role_absent() {
        let token = token_with_payload(&json!({ "unique_name": "bob", "roles": ["Member"] }));
        let user = user_from_token(&token).unwrap();
        assert_eq!(user.roles, vec!["Member".to_string()]);
    }

    #[test]
    fn test_username_falls_back_to_email_local_part() {
        let token = token_with_payload(&json!({ "email": "alice@example.com" }));
        let user = user_from_token(&token).unwrap();
        assert_eq!(user.username, "alice");
    }

    #[test]
    fn test_malformed_tokens_yield_none() {
        assert!(user_from_token("").is_none());
        assert!(user_from_token("onlyonepart").is_none());
        assert!(user_from_token("a.!!!not-base64!!!.c").is_none());

        let not_json = format!("h.{}.s", URL_SAFE_NO_PAD.encode(b"plain text"));
        assert!(user_from_token(&not_json).is_none());
    }

    #[test]
    fn test_padded_base64url_payload_accepted() {
        // Some encoders emit padded base64url; decode must tolerate it.
        let body = URL_SAFE_NO_PAD.encode(json!({ "unique_name": "pad" }).to_string().as_bytes());
        let padded = format!("h.{}==.s", body);
        let user = user_from_token(&padded).unwrap();
        assert_eq!(user.username, "pad");
    }

    // ========================================================================
    // Hydration and persistence
    // ========================================================================

    fn store_with_durable_token(payload: serde_json::Value) -> SessionStore {
        let storage = Storage::in_memory();
        storage
            .durable
            .set(KEY_ACCESS_TOKEN, &token_with_payload(&payload));
        SessionStore::new(storage)
    }

    #[test]
    fn test_hydrates_from_durable_storage() {
        let session = store_with_durable_token(json!({ "unique_name": "carol", "role": "Member" }));
        let user = session.current_user().unwrap();
        assert_eq!(user.username, "carol");
        assert_eq!(session.roles(), vec!["Member".to_string()]);
    }

    #[test]
    fn test_cookie_takes_priority_over_durable_storage() {
        let storage = Storage::in_memory();
        storage
            .durable
            .set(KEY_ACCESS_TOKEN, &token_with_payload(&json!({ "unique_name": "stale" })));
        storage
            .cookies
            .set(COOKIE_ACCESS_TOKEN, &token_with_payload(&json!({ "unique_name": "fresh" })));

        let session = SessionStore::new(storage);
        assert_eq!(session.current_user().unwrap().username, "fresh");
    }

    #[test]
    fn test_invalid_persisted_token_yields_anonymous() {
        let storage = Storage::in_memory();
        storage.durable.set(KEY_ACCESS_TOKEN, "garbage");
        let session = SessionStore::new(storage);
        assert!(session.current_user().is_none());
    }

    #[test]
    fn test_set_tokens_re_derives_user_and_persists() {
        let session = SessionStore::new(Storage::in_memory());
        let token = token_with_payload(&json!({ "unique_name": "dave" }));

        session.set_tokens(Some(token.clone()), Some("refresh-1".to_string()));

        assert_eq!(session.current_user().unwrap().username, "dave");
        assert_eq!(session.access_token(), Some(token.clone()));
        assert_eq!(session.storage.durable.get(KEY_ACCESS_TOKEN), Some(token));
        assert_eq!(
            session.storage.durable.get(KEY_REFRESH_TOKEN),
            Some("refresh-1".to_string())
        );
    }

    #[test]
    fn test_set_tokens_none_removes_persisted_copies() {
        let session = store_with_durable_token(json!({ "unique_name": "erin" }));
        session.set_tokens(None, None);
        assert_eq!(session.storage.durable.get(KEY_ACCESS_TOKEN), None);
        assert_eq!(session.storage.durable.get(KEY_REFRESH_TOKEN), None);
    }

    #[test]
    fn test_logout_then_hydrate_is_anonymous() {
        let session = store_with_durable_token(json!({ "unique_name": "frank" }));
        session.storage.session.set(KEY_USER, "{}");
        session.storage.cookies.set(COOKIE_ACCESS_TOKEN, "tok");

        session.logout();
        session.logout(); // idempotent

        assert!(session.current_user().is_none());
        assert_eq!(session.storage.durable.get(KEY_ACCESS_TOKEN), None);
        assert_eq!(session.storage.session.get(KEY_USER), None);
        assert_eq!(session.storage.cookies.get(COOKIE_ACCESS_TOKEN), None);

        // Re-hydrating from the purged storage stays anonymous.
        session.refresh_current_user(None);
        assert!(session.current_user().is_none());
    }

    // ========================================================================
    // Sink and propagation
    // ========================================================================

    struct RecordingSink(Mutex<Option<Option<User>>>);

    impl UserSink for RecordingSink {
        fn set_user(&self, user: Option<User>) {
            if let Ok(mut slot) = self.0.lock() {
                *slot = Some(user);
            }
        }
    }

    #[test]
    fn test_refresh_writes_into_sink_without_back_reference() {
        let session = store_with_durable_token(json!({ "unique_name": "gina" }));
        let sink = RecordingSink(Mutex::new(None));

        session.refresh_current_user(Some(&sink));

        let recorded = sink.0.lock().unwrap().clone().unwrap();
        assert_eq!(recorded.unwrap().username, "gina");
    }

    #[test]
    fn test_set_photo_url_updates_user_and_persists() {
        let session = store_with_durable_token(json!({ "unique_name": "hugo" }));
        session.set_photo_url("https://cdn.example.com/p/1.jpg");

        assert_eq!(
            session.current_user().unwrap().photo_url,
            "https://cdn.example.com/p/1.jpg"
        );
        let persisted = session.storage.durable.get(KEY_USER).unwrap();
        assert!(persisted.contains("cdn.example.com"));
    }

    #[test]
    fn test_watch_subscribers_see_login_and_logout() {
        let session = SessionStore::new(Storage::in_memory());
        let rx = session.subscribe();
        assert!(rx.borrow().is_none());

        session.set_tokens(
            Some(token_with_payload(&json!({ "unique_name": "ivan" }))),
            None,
        );
        assert_eq!(rx.borrow().as_ref().unwrap().username, "ivan");

        session.logout();
        assert!(rx.borrow().is_none());
    }
}
