//! CLI command implementations

use std::path::Path;

use color_eyre::eyre::{Context, Result};
use csvc_config::{Config, DEFAULT_CONFIG_FILE};

pub mod build;
pub mod init;
pub mod preview;
pub mod serve_metrics;

pub use build::{BuildCommand, SpecSource};
pub use init::InitCommand;
pub use preview::PreviewCommand;
pub use serve_metrics::ServeMetricsCommand;

/// Load the configuration named on the command line, or the default file
/// when present
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    match explicit {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Config::load_or_default(DEFAULT_CONFIG_FILE)
            .with_context(|| format!("Failed to load config from {DEFAULT_CONFIG_FILE}")),
    }
}
