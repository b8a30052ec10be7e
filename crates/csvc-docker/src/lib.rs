//! Docker integration for the container build service
//!
//! This crate packages build contexts, submits them to the Docker engine
//! and decodes the engine's build progress feed.

pub mod archive;
pub mod client;
pub mod engine;
pub mod error;
pub mod events;

pub use archive::{archive_directory, check_context_root};
pub use client::{DockerConfig, DockerConnector, DockerService};
pub use engine::{BuildEngine, BuildRequest, ByteStream, EngineConnector};
pub use error::{DockerError, Result};
pub use events::{classify_record, interpret_event, EventStreamDecoder, InterpretationError};
