//! Error types for the core library

use thiserror::Error;

/// Core error type for configuration and preview operations
#[derive(Error, Debug)]
pub enum Error {
    /// JSON encoding of generated text failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// Preview requested for a project type we have no template for
    #[error("Unknown project type: {name}")]
    UnknownProjectType { name: String },

    /// Preview parameters that cannot produce a usable build spec
    #[error("Invalid preview parameters: {reason}")]
    InvalidPreview { reason: String },
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError { message: message.into() }
    }
}
