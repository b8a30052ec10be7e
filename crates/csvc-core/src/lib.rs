//! Core types and errors for the container build service
//!
//! This crate provides the data structures shared by the engine adapter,
//! the build pipeline and the front-ends.

pub mod error;
pub mod event;
pub mod job;

pub use error::{Error, Result};
pub use event::{BuildEventRecord, EngineEvent, ErrorDetail, ProgressDetail, TIMESTAMP_FORMAT};
pub use job::{BuildJob, BuildOutcome, DEFAULT_SPEC_FILE_NAME};
