use thiserror::Error;

/// Local key/value store failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Write would exceed the store's byte quota
    #[error("Storage quota exceeded (requested: {requested} bytes, available: {available} bytes)")]
    QuotaExceeded { requested: usize, available: usize },

    /// Backend I/O or database error
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// Stored value could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<sled::Error> for StorageError {
    fn from(err: sled::Error) -> Self {
        StorageError::Backend(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

/// Remote content store failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteStoreError {
    /// No API key configured
    #[error("Remote store not configured")]
    NotConfigured,

    /// Health check failed
    #[error("Remote store unavailable: {0}")]
    Unavailable(String),

    /// Non-success HTTP status
    #[error("Remote store returned {status}: {message}")]
    Http { status: u16, message: String },

    /// Connection or timeout failure
    #[error("Remote store transport error: {0}")]
    Transport(String),

    /// Request could not be built
    #[error("Invalid remote store request: {0}")]
    InvalidRequest(String),

    /// Success status with an unusable body
    #[error("Invalid remote store response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for RemoteStoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            RemoteStoreError::InvalidResponse(err.to_string())
        } else {
            RemoteStoreError::Transport(err.to_string())
        }
    }
}

/// Envelope encode/decode failures
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Invalid envelope: {0}")]
    Envelope(#[from] serde_json::Error),
}
