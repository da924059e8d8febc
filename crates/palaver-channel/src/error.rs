//! Channel error types.

use thiserror::Error;

/// Errors raised while opening a channel. They are logged by the client,
/// never returned to callers of `connect`.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Invalid channel endpoint '{0}': expected a ws:// or wss:// URL")]
    InvalidEndpoint(String),

    #[error("Failed to connect to '{endpoint}': {source}")]
    Connect {
        endpoint: String,
        source: Box<tokio_tungstenite::tungstenite::Error>,
    },
}
