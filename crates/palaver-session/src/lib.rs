//! Local key-value persistence and chat session storage for Palaver.

pub mod error;
pub mod kv;
pub mod store;
pub mod types;

pub use error::StoreError;
pub use kv::{FileStore, KeyValueStore, MemoryStore, read_json, write_json};
pub use store::{SESSIONS_KEY, SessionStore};
pub use types::{ChatSession, SessionId, SessionSummary};
