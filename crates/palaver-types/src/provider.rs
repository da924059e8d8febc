//! Identity provider trait.

use crate::{ApiError, AuthResponse, AuthUser, LoginRequest, RegisterRequest};
use std::future::Future;
use std::pin::Pin;

/// A boxed future resolving to an identity service result.
pub type IdentityFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ApiError>> + Send + 'a>>;

/// Trait for the remote identity service.
///
/// Implementations own the outbound bearer token: once set, every request
/// carries `Authorization: Bearer <token>` until it is cleared.
/// Dyn-compatible so the auth session works with `Arc<dyn IdentityProvider>`.
pub trait IdentityProvider: Send + Sync {
    fn login<'a>(&'a self, request: &'a LoginRequest) -> IdentityFuture<'a, AuthResponse>;

    fn register<'a>(&'a self, request: &'a RegisterRequest) -> IdentityFuture<'a, AuthResponse>;

    /// Fetch the profile of the user the current token belongs to.
    fn fetch_me(&self) -> IdentityFuture<'_, AuthUser>;

    /// Attach (`Some`) or detach (`None`) the bearer token for later requests.
    fn set_bearer_token(&self, token: Option<String>);
}
