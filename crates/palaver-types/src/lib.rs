//! Shared types and error hierarchy for Palaver.

pub mod auth;
pub mod error;
pub mod message;
pub mod provider;
pub mod util;

pub use auth::*;
pub use error::{ApiError, ConfigError, PalaverError};
pub use message::*;
pub use provider::IdentityProvider;
pub use util::{one_line_preview, truncate_str};
