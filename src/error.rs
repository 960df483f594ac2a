//! Error types for cache operations
//!
//! Every failure is scoped to the key that produced it. Errors are `Clone` so
//! they can live inside cached cells and be broadcast to many observers.

use std::sync::Arc;
use thiserror::Error;

/// Main error type for spree operations
#[derive(Error, Debug, Clone)]
pub enum SpreeError {
    /// Argument tuple could not be turned into a cache key
    #[error("Hash error: {0}")]
    Hash(#[from] HashError),

    /// The loader's future rejected
    #[error("Load error: {0}")]
    Load(Arc<anyhow::Error>),

    /// A mutation commit rejected
    #[error("Mutation error: {0}")]
    Mutation(Arc<anyhow::Error>),

    /// The task driving a loader panicked or was cancelled
    #[error("Loader task aborted: {0}")]
    Aborted(String),

    /// No async runtime was available to drive a loader
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl SpreeError {
    /// Wrap a loader failure
    pub fn load(error: anyhow::Error) -> Self {
        SpreeError::Load(Arc::new(error))
    }

    /// Wrap a mutation commit failure
    pub fn mutation(error: anyhow::Error) -> Self {
        SpreeError::Mutation(Arc::new(error))
    }
}

/// Raised when an argument tuple contains a value that cannot be serialized
/// deterministically (for example a map with non-string keys, or a type whose
/// `Serialize` impl refuses, such as a wrapped callback).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot hash arguments: {message}")]
pub struct HashError {
    message: String,
}

impl HashError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<serde_json::Error> for HashError {
    fn from(e: serde_json::Error) -> Self {
        HashError::new(e.to_string())
    }
}

/// Result type alias for spree operations
pub type Result<T> = std::result::Result<T, SpreeError>;
