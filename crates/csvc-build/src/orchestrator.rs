//! Build orchestration logic

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use csvc_config::BuildSettings;
use csvc_core::{BuildJob, BuildOutcome};
use csvc_docker::{
    archive_directory, check_context_root, BuildRequest, EngineConnector, EventStreamDecoder,
};
use futures::StreamExt;
use tracing::{debug, info, warn};

use crate::{
    error::{BuildError, Result},
    metrics::MetricsRecorder,
    render::{EventRenderer, EventSink, TracingSink},
};

/// Status message of a successful build
pub const BUILD_COMPLETE_MESSAGE: &str = "image build complete";

/// Outcome of a successful build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    /// Human-readable status
    pub status_message: String,
    /// Aggregate build log
    pub log: String,
    /// Records decoded from the engine feed
    pub records: usize,
}

/// Outcome of a failed build, with the log gathered up to the failure
#[derive(Debug)]
pub struct BuildFailure {
    /// What stopped the build
    pub error: BuildError,
    /// Aggregate build log up to the failure point
    pub log: String,
}

impl fmt::Display for BuildFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.error, f)
    }
}

impl std::error::Error for BuildFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Runs image builds against the engine.
///
/// Each call to [`Self::build`] is one sequential attempt: write the build
/// spec, package the source tree, submit it and consume the progress feed.
/// Concurrent calls share only the metrics recorder. Builds for the same
/// tag are not serialized; callers that need that must coordinate
/// themselves.
pub struct BuildOrchestrator {
    connector: Arc<dyn EngineConnector>,
    metrics: Arc<dyn MetricsRecorder>,
    settings: BuildSettings,
}

impl BuildOrchestrator {
    /// Create a new build orchestrator
    pub fn new(
        connector: Arc<dyn EngineConnector>,
        metrics: Arc<dyn MetricsRecorder>,
        settings: BuildSettings,
    ) -> Self {
        Self { connector, metrics, settings }
    }

    /// Run one build, echoing progress lines to the tracing log
    pub async fn build(&self, job: &BuildJob) -> std::result::Result<BuildReport, BuildFailure> {
        self.build_with_sinks(job, vec![Box::new(TracingSink)]).await
    }

    /// Run one build, echoing progress lines to the given live sinks
    pub async fn build_with_sinks(
        &self,
        job: &BuildJob,
        sinks: Vec<Box<dyn EventSink>>,
    ) -> std::result::Result<BuildReport, BuildFailure> {
        let started = Instant::now();
        self.metrics.record(BuildOutcome::Started);
        info!("Starting build of {} from {}", job.image_tag, job.source_path.display());

        let mut renderer = EventRenderer::new();
        for sink in sinks {
            renderer.add_sink(sink);
        }

        let result = self.run(job, &mut renderer).await;

        self.metrics.observe_duration(started.elapsed());
        let log = renderer.into_log();

        match result {
            Ok(records) => {
                self.metrics.record(BuildOutcome::Success);
                info!("Build of {} completed ({} records)", job.image_tag, records);
                Ok(BuildReport { status_message: BUILD_COMPLETE_MESSAGE.to_string(), log, records })
            }
            Err(error) => {
                self.metrics.record(BuildOutcome::Failure);
                warn!("Build of {} failed [{}]: {}", job.image_tag, error.kind(), error);
                Err(BuildFailure { error, log })
            }
        }
    }

    /// Pipeline steps; returns the number of records decoded
    async fn run(&self, job: &BuildJob, renderer: &mut EventRenderer) -> Result<usize> {
        let engine = self
            .connector
            .connect()
            .await
            .map_err(|e| BuildError::EngineUnavailable { reason: e.to_string() })?;

        check_context_root(&job.source_path)
            .map_err(|e| BuildError::archive(e, &job.source_path))?;

        let spec_path =
            write_build_spec(&job.source_path, &self.settings.spec_file_name, &job.build_spec_text)?;
        debug!("Wrote build spec to {}", spec_path.display());

        let archive = archive_directory(&job.source_path)
            .map_err(|e| BuildError::archive(e, &job.source_path))?;

        let request = BuildRequest {
            tag: job.image_tag.clone(),
            spec_file_name: self.settings.spec_file_name.clone(),
            remove_intermediate: self.settings.remove_intermediate,
        };

        let body = engine
            .build_image(&request, archive)
            .await
            .map_err(|e| BuildError::BuildInvocation { reason: e.to_string() })?;

        let mut decoder = EventStreamDecoder::new(body);
        while let Some(item) = decoder.next().await {
            match item {
                Ok(record) => renderer.render(&record),
                Err(e) => {
                    let processed = decoder.records_processed();
                    return Err(BuildError::stream_decode(e, processed));
                }
            }
        }

        Ok(decoder.records_processed())
    }
}

/// Write the build spec at the root of the source tree, replacing any
/// existing file of that name
fn write_build_spec(source_path: &Path, file_name: &str, text: &str) -> Result<PathBuf> {
    let path = source_path.join(file_name);
    std::fs::write(&path, text).map_err(|source| BuildError::SpecWrite { path: path.clone(), source })?;
    Ok(path)
}
