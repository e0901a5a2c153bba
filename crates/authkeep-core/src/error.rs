use crate::persistence::BackendType;

/// Errors surfaced by session persistence.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backend's underlying medium could not be read or written.
    #[error("{backend} storage unavailable: {message}")]
    StorageUnavailable { backend: BackendType, message: String },

    /// A stored snapshot was rejected by its reviver. The stored value is
    /// left in place.
    #[error("failed to revive stored value: {0}")]
    Deserialization(#[from] ReviveError),

    /// A snapshot could not be converted into its stored form.
    #[error("failed to serialize value: {0}")]
    Serialization(#[source] serde_json::Error),

    #[error("config error in {}: {message}", .file.display())]
    Config { file: std::path::PathBuf, message: String },
}

impl StoreError {
    pub fn unavailable(backend: BackendType, message: impl std::fmt::Display) -> Self {
        StoreError::StorageUnavailable {
            backend,
            message: message.to_string(),
        }
    }

    /// Whether this is a storage-medium failure rather than a data failure.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::StorageUnavailable { .. })
    }
}

/// Error returned by a reviver when the raw stored form does not describe a
/// valid snapshot.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ReviveError {
    pub message: String,
}

impl ReviveError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for ReviveError {
    fn from(e: serde_json::Error) -> Self {
        Self::new(e.to_string())
    }
}

pub type Result<T, E = StoreError> = std::result::Result<T, E>;
