//! Docker-specific error types

use std::path::PathBuf;

use thiserror::Error;

/// Docker-specific error type
#[derive(Error, Debug)]
pub enum DockerError {
    /// Engine could not be reached
    #[error("Docker engine unavailable: {reason}")]
    Unavailable { reason: String },

    /// Build context could not be packaged
    #[error("Failed to archive {}: {reason}", path.display())]
    Archive { path: PathBuf, reason: String },

    /// Engine rejected or failed the build request
    #[error("Docker build failed: {reason}")]
    BuildFailed { reason: String },

    /// Build response body failed mid-transfer
    #[error("Docker stream error: {reason}")]
    StreamError { reason: String },

    /// Build response contained a malformed record
    #[error("Malformed build event after {records_processed} records: {reason}")]
    Decode { records_processed: usize, reason: String },
}

impl DockerError {
    /// Create an archive error for a path
    pub fn archive(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Archive { path: path.into(), reason: reason.to_string() }
    }
}

/// Result type alias for Docker operations
pub type Result<T> = std::result::Result<T, DockerError>;
