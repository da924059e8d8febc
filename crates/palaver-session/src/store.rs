//! Persistent chat session storage on top of a key-value slot.
//!
//! The whole collection lives under a single key and every mutation rewrites
//! it. Two processes writing at once can lose each other's updates.

use crate::error::StoreError;
use crate::kv::{KeyValueStore, read_json, write_json};
use crate::types::{ChatSession, SessionId, SessionSummary};
use chrono::Utc;
use palaver_types::ChatMessage;
use std::sync::Arc;

/// Key holding the serialized session collection.
pub const SESSIONS_KEY: &str = "chatSessions";

/// Durable, ordered collection of chat sessions.
#[derive(Clone)]
pub struct SessionStore {
    kv: Arc<dyn KeyValueStore>,
}

impl SessionStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Read every persisted session in creation order.
    ///
    /// Unreadable or malformed data is logged and treated as an empty collection.
    pub fn list_sessions(&self) -> Vec<ChatSession> {
        match read_json::<Vec<ChatSession>>(self.kv.as_ref(), SESSIONS_KEY) {
            Ok(Some(sessions)) => sessions,
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!("Failed to read persisted sessions: {e}");
                Vec::new()
            }
        }
    }

    /// Create and persist a new empty session.
    pub fn create_session(&self) -> Result<ChatSession, StoreError> {
        let mut sessions = self.list_sessions();
        let now = Utc::now();

        // Two sessions created within the same millisecond must still differ
        let mut id = now.timestamp_millis();
        if let Some(max) = sessions.iter().map(|s| s.id).max() {
            if id <= max {
                id = max + 1;
            }
        }

        let session = ChatSession::new(id, now);
        sessions.push(session.clone());
        self.save(&sessions)?;
        tracing::debug!("Created session {id}");
        Ok(session)
    }

    /// Look up a session by id.
    pub fn get_session(&self, id: SessionId) -> Option<ChatSession> {
        self.list_sessions().into_iter().find(|s| s.id == id)
    }

    /// Append `message` to session `id` and persist.
    ///
    /// Returns `Ok(false)` without touching storage when no session has that id.
    pub fn append_message(&self, id: SessionId, message: ChatMessage) -> Result<bool, StoreError> {
        let mut sessions = self.list_sessions();
        let Some(session) = sessions.iter_mut().find(|s| s.id == id) else {
            tracing::debug!("Dropping message for unknown session {id}");
            return Ok(false);
        };
        session.messages.push(message);
        self.save(&sessions)?;
        Ok(true)
    }

    /// Summaries of every session, in creation order.
    pub fn summaries(&self) -> Vec<SessionSummary> {
        self.list_sessions()
            .iter()
            .map(ChatSession::to_summary)
            .collect()
    }

    fn save(&self, sessions: &[ChatSession]) -> Result<(), StoreError> {
        write_json(self.kv.as_ref(), SESSIONS_KEY, sessions)
    }
}
