//! Screen routing with an authentication guard.

use crate::auth::AuthState;

/// A screen the client can show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Login,
    Register,
    Chat,
}

impl Route {
    pub fn path(self) -> &'static str {
        match self {
            Route::Login => "/login",
            Route::Register => "/register",
            Route::Chat => "/",
        }
    }

    pub fn from_path(path: &str) -> Option<Self> {
        match path {
            "/login" => Some(Route::Login),
            "/register" => Some(Route::Register),
            "/" | "" => Some(Route::Chat),
            _ => None,
        }
    }

    pub fn requires_auth(self) -> bool {
        matches!(self, Route::Chat)
    }

    /// The route to actually show for `self` given the auth state.
    ///
    /// Protected routes redirect to login until authenticated. While auth is
    /// still loading the route is returned as is; callers should wait for
    /// [`AuthState::loading`] to clear before resolving.
    pub fn resolve(self, auth: &AuthState) -> Route {
        if self.requires_auth() && !auth.loading && !auth.is_authenticated() {
            tracing::debug!("Redirecting {} to {}", self.path(), Route::Login.path());
            return Route::Login;
        }
        self
    }
}
