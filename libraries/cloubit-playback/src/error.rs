//! Error types for the playback session

use thiserror::Error;

/// Playback errors
///
/// Collaborators (resolver, engine, store, notifier) report failures with this
/// type. The session itself absorbs them: they are logged and turned into
/// no-ops or skips rather than returned to the command surface.
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// Track URL resolution failed
    #[error("Resolver error: {0}")]
    Resolver(String),

    /// Playback engine failed to build or drive a handle
    #[error("Engine error: {0}")]
    Engine(String),

    /// Persisted state store failure
    #[error("Store error: {0}")]
    Store(String),

    /// Configuration could not be loaded
    #[error("Config error: {0}")]
    Config(String),

    /// Invalid operation
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PlaybackError {
    pub fn engine(message: impl Into<String>) -> Self {
        Self::Engine(message.into())
    }

    pub fn resolver(message: impl Into<String>) -> Self {
        Self::Resolver(message.into())
    }

    pub fn store(message: impl Into<String>) -> Self {
        Self::Store(message.into())
    }
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;
