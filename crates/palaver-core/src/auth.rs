//! Authentication state: token and user identity, persisted across restarts.

use std::sync::Arc;

use palaver_session::{KeyValueStore, read_json, write_json};
use palaver_types::{ApiError, AuthUser, IdentityProvider, LoginRequest, RegisterRequest};

/// Key holding the raw bearer token.
pub const TOKEN_KEY: &str = "token";

/// Key holding the serialized [`AuthUser`] snapshot.
pub const USER_KEY: &str = "user";

/// Coarse authentication status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStatus {
    /// Initial resume from storage has not finished yet.
    Loading,
    Unauthenticated,
    Authenticated,
}

/// Snapshot of the authentication state.
#[derive(Debug, Clone, Default)]
pub struct AuthState {
    pub token: Option<String>,
    pub user: Option<AuthUser>,
    pub loading: bool,
}

impl AuthState {
    /// Authenticated exactly when a token is held.
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    pub fn status(&self) -> AuthStatus {
        if self.loading {
            AuthStatus::Loading
        } else if self.is_authenticated() {
            AuthStatus::Authenticated
        } else {
            AuthStatus::Unauthenticated
        }
    }
}

/// Owns the process's token and user identity.
///
/// Every change is written through to the key-value store; persistence
/// failures are logged and do not undo the in-memory change.
pub struct AuthSession {
    provider: Arc<dyn IdentityProvider>,
    kv: Arc<dyn KeyValueStore>,
    state: AuthState,
}

impl AuthSession {
    /// Create a session in the `Loading` state. Call [`AuthSession::resume`] next.
    pub fn new(provider: Arc<dyn IdentityProvider>, kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            provider,
            kv,
            state: AuthState {
                loading: true,
                ..AuthState::default()
            },
        }
    }

    pub fn state(&self) -> &AuthState {
        &self.state
    }

    pub fn status(&self) -> AuthStatus {
        self.state.status()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.is_authenticated()
    }

    pub fn user(&self) -> Option<&AuthUser> {
        self.state.user.as_ref()
    }

    /// Restore credentials persisted by an earlier run.
    ///
    /// A cached user snapshot is trusted without a network call. A token with
    /// no snapshot is validated by fetching the profile; if that fails the
    /// stored credentials are cleared. Only the first call does anything.
    pub async fn resume(&mut self) {
        if !self.state.loading {
            return;
        }

        let token = self.stored_token();
        let user = self.stored_user();

        match (token, user) {
            (Some(token), Some(user)) => {
                tracing::debug!("Resuming session for {} from cache", user.username);
                self.attach(token, user);
            }
            (Some(token), None) => {
                self.provider.set_bearer_token(Some(token.clone()));
                self.state.token = Some(token);
                if let Err(e) = self.fetch_profile().await {
                    tracing::warn!("Stored session is no longer valid: {e}");
                }
            }
            (None, user) => {
                if user.is_some() {
                    self.forget(USER_KEY);
                }
            }
        }

        self.state.loading = false;
    }

    /// Log in with a username or email and password.
    ///
    /// On failure the state is left unchanged and the error is returned.
    pub async fn login(&mut self, identifier: &str, password: &str) -> Result<AuthUser, ApiError> {
        let request = LoginRequest {
            identifier: identifier.to_string(),
            password: password.to_string(),
        };
        let response = self.provider.login(&request).await.inspect_err(|e| {
            tracing::warn!("Login failed for {identifier}: {e}");
        })?;
        self.persist(&response.jwt, &response.user);
        self.attach(response.jwt, response.user.clone());
        Ok(response.user)
    }

    /// Create an account and log in as it. Same contract as [`AuthSession::login`].
    pub async fn register(
        &mut self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthUser, ApiError> {
        let request = RegisterRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        };
        let response = self.provider.register(&request).await.inspect_err(|e| {
            tracing::warn!("Registration failed for {username}: {e}");
        })?;
        self.persist(&response.jwt, &response.user);
        self.attach(response.jwt, response.user.clone());
        Ok(response.user)
    }

    /// Drop the credentials everywhere. No network call.
    pub fn logout(&mut self) {
        self.forget(TOKEN_KEY);
        self.forget(USER_KEY);
        self.provider.set_bearer_token(None);
        self.state.token = None;
        self.state.user = None;
        tracing::debug!("Logged out");
    }

    /// Refresh the user profile with the attached token.
    ///
    /// Any failure is taken to mean the session is invalid and logs out.
    pub async fn fetch_profile(&mut self) -> Result<AuthUser, ApiError> {
        match self.provider.fetch_me().await {
            Ok(user) => {
                if let Err(e) = write_json(self.kv.as_ref(), USER_KEY, &user) {
                    tracing::warn!("Failed to persist user profile: {e}");
                }
                self.state.user = Some(user.clone());
                Ok(user)
            }
            Err(e) => {
                tracing::warn!("Error fetching user profile: {e}");
                self.logout();
                Err(e)
            }
        }
    }

    fn attach(&mut self, token: String, user: AuthUser) {
        self.provider.set_bearer_token(Some(token.clone()));
        self.state.token = Some(token);
        self.state.user = Some(user);
    }

    fn persist(&self, token: &str, user: &AuthUser) {
        if let Err(e) = self.kv.set(TOKEN_KEY, token) {
            tracing::warn!("Failed to persist token: {e}");
        }
        if let Err(e) = write_json(self.kv.as_ref(), USER_KEY, user) {
            tracing::warn!("Failed to persist user profile: {e}");
        }
    }

    fn forget(&self, key: &str) {
        if let Err(e) = self.kv.remove(key) {
            tracing::warn!("Failed to clear stored {key}: {e}");
        }
    }

    fn stored_token(&self) -> Option<String> {
        match self.kv.get(TOKEN_KEY) {
            Ok(token) => token.filter(|t| !t.trim().is_empty()),
            Err(e) => {
                tracing::warn!("Failed to read stored token: {e}");
                None
            }
        }
    }

    fn stored_user(&self) -> Option<AuthUser> {
        read_json::<AuthUser>(self.kv.as_ref(), USER_KEY).unwrap_or_else(|e| {
            tracing::warn!("Ignoring unreadable stored user: {e}");
            None
        })
    }
}
