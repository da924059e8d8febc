//! Auth session and chat controller orchestration for Palaver.

pub mod auth;
pub mod controller;
pub mod route;

pub use auth::{AuthSession, AuthState, AuthStatus, TOKEN_KEY, USER_KEY};
pub use controller::ChatController;
pub use route::Route;
