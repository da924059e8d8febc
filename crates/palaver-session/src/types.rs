//! Session data types.

use chrono::{DateTime, Utc};
use palaver_types::{ChatMessage, one_line_preview};
use serde::{Deserialize, Serialize};

/// Session identifier: the creation time in milliseconds since the epoch.
pub type SessionId = i64;

/// A persisted chat transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: SessionId,
    pub time: DateTime<Utc>,
    pub messages: Vec<ChatMessage>,
}

impl ChatSession {
    /// Create an empty session created at `time`.
    pub fn new(id: SessionId, time: DateTime<Utc>) -> Self {
        Self {
            id,
            time,
            messages: Vec::new(),
        }
    }

    /// Label from the first message the local user sent, if any.
    pub fn label(&self) -> Option<String> {
        self.messages
            .iter()
            .find(|m| !m.is_inbound() && !m.message.trim().is_empty())
            .map(|m| one_line_preview(&m.message, 60).into_owned())
    }

    /// Build a summary for listing.
    pub fn to_summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id,
            time: self.time,
            message_count: self.messages.len(),
            label: self.label(),
        }
    }
}

/// Lightweight summary for session listing.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub id: SessionId,
    pub time: DateTime<Utc>,
    pub message_count: usize,
    pub label: Option<String>,
}

impl SessionSummary {
    /// Human-readable age string (e.g. "2h ago", "3d ago").
    pub fn age(&self) -> String {
        let minutes = (Utc::now() - self.time).num_minutes();
        if minutes < 1 {
            "just now".to_string()
        } else if minutes < 60 {
            format!("{minutes}m ago")
        } else if minutes < 1440 {
            format!("{}h ago", minutes / 60)
        } else {
            format!("{}d ago", minutes / 1440)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn label_skips_server_messages() {
        let mut session = ChatSession::new(1, Utc::now());
        session.messages.push(ChatMessage::inbound("welcome"));
        session
            .messages
            .push(ChatMessage::outbound("alice", "Where is the standup?"));
        assert_eq!(session.label().as_deref(), Some("Where is the standup?"));
    }

    #[test]
    fn label_none_for_empty_session() {
        let session = ChatSession::new(1, Utc::now());
        assert!(session.label().is_none());
        assert_eq!(session.to_summary().message_count, 0);
    }

    #[test]
    fn label_truncates_long_first_message() {
        let mut session = ChatSession::new(1, Utc::now());
        session
            .messages
            .push(ChatMessage::outbound("alice", "x".repeat(200)));
        let label = session.label().unwrap();
        assert!(label.len() <= 60);
        assert!(label.ends_with("..."));
    }

    #[test]
    fn summary_age_buckets() {
        let mut summary = ChatSession::new(1, Utc::now()).to_summary();
        assert_eq!(summary.age(), "just now");
        summary.time = Utc::now() - Duration::minutes(5);
        assert_eq!(summary.age(), "5m ago");
        summary.time = Utc::now() - Duration::hours(3);
        assert_eq!(summary.age(), "3h ago");
        summary.time = Utc::now() - Duration::days(2);
        assert_eq!(summary.age(), "2d ago");
    }

    #[test]
    fn serialized_shape_matches_persisted_layout() {
        let session = ChatSession::new(42, Utc::now());
        let value = serde_json::to_value(&session).unwrap();
        assert_eq!(value["id"], 42);
        assert!(value["time"].is_string());
        assert!(value["messages"].as_array().unwrap().is_empty());
    }
}
