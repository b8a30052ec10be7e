//! Build engine seam
//!
//! The orchestrator talks to the container engine only through these
//! traits, so tests can substitute a scripted engine for the Docker daemon.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::Result;

/// Raw response body of a build: byte chunks in arrival order
pub type ByteStream<'a> = Pin<Box<dyn Stream<Item = Result<Vec<u8>>> + Send + 'a>>;

/// Parameters of one image build submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    /// Tag applied to the built image
    pub tag: String,
    /// Build-spec file name inside the archive
    pub spec_file_name: String,
    /// Remove intermediate containers after a successful build
    pub remove_intermediate: bool,
}

/// Container engine able to build an image from a packaged context
#[async_trait]
pub trait BuildEngine: Send + Sync {
    /// Submit the archive and return the live progress feed.
    ///
    /// An error here means the request itself was rejected; failures while
    /// the feed is being read surface as stream items instead.
    async fn build_image<'a>(
        &'a self,
        request: &BuildRequest,
        archive: Vec<u8>,
    ) -> Result<ByteStream<'a>>;
}

/// Factory for engine handles, one per build
#[async_trait]
pub trait EngineConnector: Send + Sync {
    /// Open a handle to the engine
    async fn connect(&self) -> Result<Box<dyn BuildEngine>>;
}
