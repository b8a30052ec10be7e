//! Build command implementation

use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;

use color_eyre::eyre::{eyre, Context, Result};
use csvc_build::{
    BuildMetrics, BuildOrchestrator, EventSink, MetricsExporter, MetricsRecorder, NoopMetrics,
    SpinnerSink, StdoutSink,
};
use csvc_config::Config;
use csvc_core::BuildJob;
use csvc_docker::{DockerConfig, DockerConnector};
use tracing::{info, warn};

use super::load_config;

/// Where the build spec text comes from
#[derive(Debug, Clone)]
pub enum SpecSource {
    File(PathBuf),
    Text(String),
}

impl SpecSource {
    fn read(&self) -> Result<String> {
        match self {
            Self::File(path) => std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read build spec {}", path.display())),
            Self::Text(text) => Ok(text.clone()),
        }
    }
}

/// Build command implementation
pub struct BuildCommand {
    config_path: Option<PathBuf>,
    tag: String,
    source: PathBuf,
    spec: SpecSource,
}

impl BuildCommand {
    pub fn new(config_path: Option<PathBuf>, tag: String, source: PathBuf, spec: SpecSource) -> Self {
        Self { config_path, tag, source, spec }
    }

    pub async fn execute(&self) -> Result<()> {
        let config = load_config(self.config_path.as_deref())?;
        let spec_text = self.spec.read()?;
        if spec_text.trim().is_empty() {
            return Err(eyre!("Build spec is empty"));
        }

        let mut _exporter = None;
        let metrics: Arc<dyn MetricsRecorder> = if config.metrics.enabled {
            let metrics = Arc::new(BuildMetrics::new().context("Failed to set up build metrics")?);
            _exporter = start_exporter(&config, &metrics);
            metrics
        } else {
            Arc::new(NoopMetrics)
        };

        let connector = DockerConnector::new(DockerConfig {
            socket_path: config.docker.socket_path.clone(),
            timeout: config.docker.timeout(),
        });
        let orchestrator = BuildOrchestrator::new(
            Arc::new(connector),
            metrics,
            config.build.clone(),
        );

        let job = BuildJob::new(&self.tag, &self.source, spec_text);
        let interactive = std::io::stdout().is_terminal();
        let sink: Box<dyn EventSink> = if interactive {
            Box::new(SpinnerSink::new(self.tag.clone()))
        } else {
            Box::new(StdoutSink)
        };

        info!("Building {} from {}", self.tag, self.source.display());
        match orchestrator.build_with_sinks(&job, vec![sink]).await {
            Ok(report) => {
                println!("✓ {}: {}", self.tag, report.status_message);
                Ok(())
            }
            Err(failure) => {
                // The spinner only ever showed the latest line
                if interactive && !failure.log.is_empty() {
                    eprintln!("Build log up to the failure:");
                    eprint!("{}", failure.log);
                }
                Err(eyre!("Build of {} failed: {}", self.tag, failure.error))
            }
        }
    }
}

/// Start the metrics endpoint; a bind failure does not stop the build
fn start_exporter(config: &Config, metrics: &Arc<BuildMetrics>) -> Option<MetricsExporter> {
    match MetricsExporter::start(&config.metrics.listen_addr, Arc::clone(metrics)) {
        Ok(exporter) => Some(exporter),
        Err(e) => {
            warn!("Metrics endpoint not started on {}: {}", config.metrics.listen_addr, e);
            None
        }
    }
}
