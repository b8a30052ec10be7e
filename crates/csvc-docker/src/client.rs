//! Docker client wrapper

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use bollard::errors::Error as BollardError;
use bollard::image::BuildImageOptions;
use bollard::models::{BuildInfo, ErrorDetail, ImageId, ProgressDetail};
use bollard::Docker;
use futures::{stream, StreamExt};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::engine::{BuildEngine, BuildRequest, ByteStream, EngineConnector};
use crate::error::{DockerError, Result};

/// Docker service configuration
#[derive(Debug, Clone)]
pub struct DockerConfig {
    /// Socket path (None for default)
    pub socket_path: Option<PathBuf>,
    /// Operation timeout
    pub timeout: Duration,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self { socket_path: None, timeout: Duration::from_secs(120) }
    }
}

/// High-level Docker service wrapper
pub struct DockerService {
    client: Docker,
}

impl DockerService {
    /// Connect to the daemon and verify it answers
    pub async fn new(config: &DockerConfig) -> Result<Self> {
        let client = match &config.socket_path {
            Some(path) => Docker::connect_with_socket(
                &path.to_string_lossy(),
                config.timeout.as_secs(),
                bollard::API_DEFAULT_VERSION,
            ),
            None => Docker::connect_with_local_defaults().map(|c| c.with_timeout(config.timeout)),
        }
        .map_err(|e| DockerError::Unavailable { reason: e.to_string() })?;

        // Test connection
        client
            .ping()
            .await
            .map_err(|e| DockerError::Unavailable { reason: e.to_string() })?;

        debug!("Connected to Docker engine");
        Ok(Self { client })
    }
}

/// One progress record in the daemon's wire layout
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FeedLine<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    progress: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    progress_detail: Option<&'a ProgressDetail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_detail: Option<&'a ErrorDetail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    aux: Option<&'a ImageId>,
}

impl<'a> From<&'a BuildInfo> for FeedLine<'a> {
    fn from(info: &'a BuildInfo) -> Self {
        Self {
            id: info.id.as_deref(),
            stream: info.stream.as_deref(),
            status: info.status.as_deref(),
            progress: info.progress.as_deref(),
            progress_detail: info.progress_detail.as_ref(),
            error: info.error.as_deref(),
            error_detail: info.error_detail.as_ref(),
            aux: info.aux.as_ref(),
        }
    }
}

/// Whether a feed error is a record the daemon sent, as opposed to a
/// failure of the request or the transport
fn is_feed_record(err: &BollardError) -> bool {
    matches!(
        err,
        BollardError::DockerStreamError { .. }
            | BollardError::JsonDataError { .. }
            | BollardError::JsonSerdeError { .. }
    )
}

fn is_json_object(text: &str) -> bool {
    serde_json::from_str::<Map<String, Value>>(text).is_ok()
}

/// Turn one item of bollard's typed feed back into a JSON line.
///
/// bollard lifts records carrying `error` out of the feed as
/// `DockerStreamError`; those go back in as `{"error": ...}` so they render
/// like any other engine event. A record that is a JSON object but does not
/// fit `BuildInfo` is passed through verbatim.
fn feed_line(item: std::result::Result<BuildInfo, BollardError>) -> Result<Vec<u8>> {
    let encoded = match item {
        Ok(info) => serde_json::to_vec(&FeedLine::from(&info)),
        Err(BollardError::DockerStreamError { error }) => {
            serde_json::to_vec(&serde_json::json!({ "error": error }))
        }
        Err(BollardError::JsonDataError { contents, .. }) if is_json_object(&contents) => {
            // The typed feed ends after a decode error
            warn!("Unexpected build record from the daemon, later records are unavailable");
            Ok(contents.trim_end().as_bytes().to_vec())
        }
        Err(e) => return Err(DockerError::StreamError { reason: e.to_string() }),
    };

    let mut line = encoded.map_err(|e| DockerError::StreamError { reason: e.to_string() })?;
    line.push(b'\n');
    Ok(line)
}

#[async_trait]
impl BuildEngine for DockerService {
    async fn build_image<'a>(
        &'a self,
        request: &BuildRequest,
        archive: Vec<u8>,
    ) -> Result<ByteStream<'a>> {
        info!("Building Docker image: {}", request.tag);

        let options = BuildImageOptions {
            t: request.tag.clone(),
            dockerfile: request.spec_file_name.clone(),
            rm: request.remove_intermediate,
            ..Default::default()
        };

        let mut feed = self.client.build_image(options, None, Some(archive.into())).boxed();

        // A rejected request arrives as the first item of the feed
        let first = match feed.next().await {
            Some(Err(e)) if !is_feed_record(&e) => {
                return Err(DockerError::BuildFailed { reason: e.to_string() });
            }
            first => first,
        };

        let body = stream::iter(first).chain(feed).map(feed_line);

        Ok(Box::pin(body))
    }
}

/// Connector opening a fresh [`DockerService`] per build
#[derive(Debug, Clone, Default)]
pub struct DockerConnector {
    config: DockerConfig,
}

impl DockerConnector {
    /// Create a connector with the given configuration
    pub fn new(config: DockerConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl EngineConnector for DockerConnector {
    async fn connect(&self) -> Result<Box<dyn BuildEngine>> {
        let service = DockerService::new(&self.config).await?;
        Ok(Box::new(service))
    }
}
