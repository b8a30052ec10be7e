//! Error types for the build orchestration module

use std::path::PathBuf;

use csvc_docker::DockerError;
use thiserror::Error;

/// Terminal build errors
///
/// Every variant aborts the remaining pipeline steps. Records the engine
/// sends with an unexpected shape are not errors at this level; they are
/// rendered with a fallback layout and the build continues.
#[derive(Error, Debug)]
pub enum BuildError {
    /// No connection to the build engine
    #[error("Build engine unavailable: {reason}")]
    EngineUnavailable { reason: String },

    /// Build spec could not be written into the source tree
    #[error("Failed to write build spec {}: {source}", path.display())]
    SpecWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Source tree could not be packaged
    #[error("Failed to create build context from {}: {reason}", path.display())]
    Archive { path: PathBuf, reason: String },

    /// Engine rejected or failed the build request
    #[error("Failed to build image: {reason}")]
    BuildInvocation { reason: String },

    /// Progress feed broke off with a malformed record
    #[error("Error decoding build event after {records_processed} records: {reason}")]
    StreamDecode { records_processed: usize, reason: String },
}

/// Result type alias for build operations
pub type Result<T> = std::result::Result<T, BuildError>;

impl BuildError {
    /// Map an archiver failure, keeping the offending path
    pub fn archive(err: DockerError, root: impl Into<PathBuf>) -> Self {
        match err {
            DockerError::Archive { path, reason } => Self::Archive { path, reason },
            other => Self::Archive { path: root.into(), reason: other.to_string() },
        }
    }

    /// Map a progress feed failure, keeping the decoded record count
    pub fn stream_decode(err: DockerError, records_processed: usize) -> Self {
        match err {
            DockerError::Decode { records_processed, reason } => {
                Self::StreamDecode { records_processed, reason }
            }
            other => Self::StreamDecode { records_processed, reason: other.to_string() },
        }
    }

    /// Short machine-readable kind, used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EngineUnavailable { .. } => "engine_unavailable",
            Self::SpecWrite { .. } => "spec_write",
            Self::Archive { .. } => "archive",
            Self::BuildInvocation { .. } => "build_invocation",
            Self::StreamDecode { .. } => "stream_decode",
        }
    }
}
