//! Storage error types.

use thiserror::Error;

/// Errors that can occur while reading or writing persisted state.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid storage key '{key}': only ASCII letters, digits, '-' and '_' are allowed")]
    InvalidKey { key: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<StoreError> for palaver_types::PalaverError {
    fn from(err: StoreError) -> Self {
        palaver_types::PalaverError::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use palaver_types::PalaverError;

    #[test]
    fn converts_into_storage_error() {
        let err: PalaverError = StoreError::InvalidKey {
            key: "../x".into(),
        }
        .into();
        match err {
            PalaverError::Storage(message) => assert!(message.contains("'../x'")),
            other => panic!("Expected Storage, got {other:?}"),
        }
    }
}
