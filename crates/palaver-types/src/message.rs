//! Chat message types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sender recorded for every frame that arrives over the channel.
pub const SERVER_SENDER: &str = "server";

/// A single line of a chat transcript.
///
/// Messages are immutable once created; their position in the owning
/// session's transcript is their order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Sender username, or [`SERVER_SENDER`] for inbound frames.
    pub user: String,
    pub message: String,
    pub time: DateTime<Utc>,
}

impl ChatMessage {
    /// A message typed by `username`, stamped with the current time.
    pub fn outbound(username: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            user: username.into(),
            message: text.into(),
            time: Utc::now(),
        }
    }

    /// A message received from the relay server, stamped with the current time.
    pub fn inbound(text: impl Into<String>) -> Self {
        Self {
            user: SERVER_SENDER.to_string(),
            message: text.into(),
            time: Utc::now(),
        }
    }

    pub fn is_inbound(&self) -> bool {
        self.user == SERVER_SENDER
    }
}
