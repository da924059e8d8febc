//! Error hierarchy for Palaver.

use thiserror::Error;

/// Top-level error type for all Palaver operations.
#[derive(Debug, Error)]
pub enum PalaverError {
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Not authenticated")]
    NotAuthenticated,
}

/// Errors from the remote identity service.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Authentication failed: {message}")]
    Auth { message: String },

    #[error("Bad request: {message}")]
    BadRequest { message: String },

    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    #[error("Server error: {status} {message}")]
    Server { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Request timeout")]
    Timeout,
}

impl ApiError {
    /// Whether the identity service rejected the caller's credentials or token.
    pub fn is_credential_error(&self) -> bool {
        matches!(
            self,
            ApiError::Auth { .. } | ApiError::BadRequest { .. } | ApiError::Forbidden { .. }
        )
    }
}

/// Errors from configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}
