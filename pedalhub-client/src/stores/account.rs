//! Account facade: login, registration, and sign-out glue between the REST
//! client and the session store. The session never holds a reference back
//! to this facade.

use crate::api_client::{LoginRequest, RegisterRequest, RestClient};
use crate::error::ClientResult;
use crate::notifications::Notifier;
use crate::session::SessionStore;
use pedalhub_core::User;
use std::sync::Arc;

pub struct AccountService {
    client: RestClient,
    session: Arc<SessionStore>,
    notifier: Notifier,
}

impl AccountService {
    pub fn new(client: RestClient, session: Arc<SessionStore>, notifier: Notifier) -> Self {
        Self {
            client,
            session,
            notifier,
        }
    }

    /// Signs in and installs the returned user (and its token) as the
    /// current session.
    pub async fn login(&self, username: &str, password: &str) -> ClientResult<User> {
        let request = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let user = self.client.login(&request).await?;
        self.session.set_current_user(Some(user.clone()));
        self.notifier
            .success(format!("Welcome back, {}", user.known_as));
        Ok(user)
    }

    /// Registers a new account; the backend signs the new user in directly.
    pub async fn register(&self, request: RegisterRequest) -> ClientResult<User> {
        let user = self.client.register(&request).await?;
        self.session.set_current_user(Some(user.clone()));
        self.notifier
            .success(format!("Welcome, {}", user.known_as));
        Ok(user)
    }

    /// Availability check used by the registration form.
    pub async fn email_exists(&self, email: &str) -> ClientResult<bool> {
        self.client.email_exists(email).await
    }

    /// Signs out: all persisted session state is purged and every
    /// subscriber sees the anonymous user.
    pub fn logout(&self) {
        self.session.logout();
        self.notifier.info("Signed out");
    }
}
