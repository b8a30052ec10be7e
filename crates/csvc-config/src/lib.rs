//! Configuration management for the container build service
//!
//! This crate handles YAML configuration parsing, validation,
//! and environment variable substitution.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use csvc_core::error::{Error, Result};
use csvc_core::DEFAULT_SPEC_FILE_NAME;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "csvc.yaml";

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Docker engine connection
    #[serde(default)]
    pub docker: DockerSettings,

    /// Build request defaults
    #[serde(default)]
    pub build: BuildSettings,

    /// Metrics endpoint
    #[serde(default)]
    pub metrics: MetricsSettings,
}

/// Docker engine connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DockerSettings {
    /// Socket path (None for the platform default)
    #[serde(default)]
    pub socket_path: Option<PathBuf>,

    /// Connection timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Build request settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildSettings {
    /// Name of the build-spec file written at the root of the source tree
    #[serde(default = "default_spec_file_name")]
    pub spec_file_name: String,

    /// Remove intermediate containers after a successful build
    #[serde(default)]
    pub remove_intermediate: bool,
}

/// Metrics endpoint settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSettings {
    /// Serve the metrics endpoint
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,

    /// Listen address for the endpoint
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

impl Default for DockerSettings {
    fn default() -> Self {
        Self { socket_path: None, timeout_secs: default_timeout_secs() }
    }
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self { spec_file_name: default_spec_file_name(), remove_intermediate: false }
    }
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self { enabled: default_metrics_enabled(), listen_addr: default_listen_addr() }
    }
}

impl DockerSettings {
    /// Connection timeout as a duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl MetricsSettings {
    /// Parsed listen address
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.listen_addr.parse().map_err(|e| Error::ConfigError {
            message: format!("Invalid metrics listen address {:?}: {e}", self.listen_addr),
        })
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| Error::ConfigError {
            message: format!("Failed to read config file {path:?}: {e}"),
        })?;

        Self::from_yaml_str(&content)
    }

    /// Parse, expand and validate configuration from YAML text
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let mut config: Config = serde_yaml::from_str(content)
            .map_err(|e| Error::ConfigError { message: format!("Failed to parse YAML: {e}") })?;

        config.expand_env_vars()?;
        config.validate()?;

        Ok(config)
    }

    /// Load the file if it exists, otherwise fall back to defaults
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Expand environment variables in paths
    fn expand_env_vars(&mut self) -> Result<()> {
        if let Some(ref mut socket_path) = self.docker.socket_path {
            *socket_path = expand_path(socket_path)?;
        }

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let name = &self.build.spec_file_name;
        if name.is_empty() {
            return Err(Error::config("build.spec_file_name cannot be empty"));
        }
        if name.contains('/') || name.contains('\\') || name == "." || name == ".." {
            return Err(Error::ConfigError {
                message: format!("build.spec_file_name must be a plain file name: {name:?}"),
            });
        }

        if self.docker.timeout_secs == 0 {
            return Err(Error::config("docker.timeout_secs must be at least 1"));
        }

        if self.metrics.enabled {
            self.metrics.socket_addr()?;
        }

        Ok(())
    }
}

/// Expand environment variables in a path
fn expand_path(path: &Path) -> Result<PathBuf> {
    let path_str = path.to_string_lossy();
    let env_var_re = Regex::new(r"\$\{([^}]+)\}|\$([A-Za-z_][A-Za-z0-9_]*)")
        .map_err(|e| Error::config(format!("Invalid expansion pattern: {e}")))?;

    let mut result = path_str.to_string();
    for cap in env_var_re.captures_iter(&path_str) {
        let Some(var_name) = cap.get(1).or_else(|| cap.get(2)).map(|m| m.as_str()) else {
            continue;
        };
        let var_value = std::env::var(var_name).map_err(|_| Error::ConfigError {
            message: format!("Environment variable not found: {var_name}"),
        })?;

        result = result.replace(&cap[0], &var_value);
    }

    Ok(PathBuf::from(result))
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_spec_file_name() -> String {
    DEFAULT_SPEC_FILE_NAME.to_string()
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_listen_addr() -> String {
    "0.0.0.0:2112".to_string()
}

#[cfg(test)]
mod tests {
    use std::env;

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_expand_path() {
        env::set_var("CSVC_TEST_DOCKER_DIR", "/run/user/1000");

        let path = PathBuf::from("${CSVC_TEST_DOCKER_DIR}/docker.sock");
        let expanded = expand_path(&path).unwrap();
        assert_eq!(expanded, PathBuf::from("/run/user/1000/docker.sock"));

        let path = PathBuf::from("$CSVC_TEST_DOCKER_DIR/docker.sock");
        let expanded = expand_path(&path).unwrap();
        assert_eq!(expanded, PathBuf::from("/run/user/1000/docker.sock"));
    }

    #[test]
    fn test_expand_path_missing_var() {
        let path = PathBuf::from("${CSVC_TEST_SURELY_UNSET_VAR}/docker.sock");
        assert!(expand_path(&path).is_err());
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_yaml_str("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.build.spec_file_name, "Dockerfile");
        assert!(!config.build.remove_intermediate);
        assert_eq!(config.metrics.listen_addr, "0.0.0.0:2112");
        assert_eq!(config.docker.timeout(), Duration::from_secs(120));
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.build.spec_file_name = "sub/Dockerfile".to_string();
        assert!(config.validate().is_err());

        config.build.spec_file_name = "Containerfile".to_string();
        config.metrics.listen_addr = "not an address".to_string();
        assert!(config.validate().is_err());

        config.metrics.enabled = false;
        assert!(config.validate().is_ok());

        config.docker.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("csvc.yaml");
        std::fs::write(
            &path,
            "build:\n  spec_file_name: Containerfile\nmetrics:\n  enabled: false\n",
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.build.spec_file_name, "Containerfile");
        assert!(!config.metrics.enabled);
        assert_eq!(config.docker.timeout_secs, 120);

        let missing = temp_dir.path().join("missing.yaml");
        assert!(Config::from_file(&missing).is_err());
        assert_eq!(Config::load_or_default(&missing).unwrap(), Config::default());
    }
}
