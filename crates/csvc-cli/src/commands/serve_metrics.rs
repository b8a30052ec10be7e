//! Serve-metrics command implementation

use std::path::PathBuf;
use std::sync::Arc;

use color_eyre::eyre::{Context, Result};
use csvc_build::{BuildMetrics, MetricsExporter};
use tracing::info;

use super::load_config;

/// Runs only the metrics endpoint until Ctrl-C.
///
/// The registry served here is this process's own and no build runs in it,
/// so every series stays at zero. It is for checking the listen address and
/// the scrape target; live build counts are exported by `csvc build` while
/// it runs.
pub struct ServeMetricsCommand {
    config_path: Option<PathBuf>,
    listen: Option<String>,
}

impl ServeMetricsCommand {
    pub fn new(config_path: Option<PathBuf>, listen: Option<String>) -> Self {
        Self { config_path, listen }
    }

    pub async fn execute(&self) -> Result<()> {
        let config = load_config(self.config_path.as_deref())?;
        let addr = self.listen.clone().unwrap_or(config.metrics.listen_addr);

        let metrics = BuildMetrics::new().context("Failed to set up build metrics")?;
        let exporter = MetricsExporter::start(&addr, Arc::new(metrics))
            .with_context(|| format!("Failed to start metrics endpoint on {addr}"))?;
        println!("✓ Serving metrics at {}/metrics (Ctrl-C to stop)", exporter.url());
        println!("  No builds run in this process; all series read zero");

        tokio::signal::ctrl_c().await.context("Failed to wait for Ctrl-C")?;

        info!("Shutting down metrics endpoint");
        tokio::task::spawn_blocking(move || exporter.shutdown())
            .await
            .context("Metrics endpoint shutdown failed")?;

        Ok(())
    }
}
