//! Build-spec previews for common project types
//!
//! A preview is the Dockerfile text the service would build a project
//! with, generated from a handful of user-facing settings. Nothing is
//! written to disk here; callers decide what to do with the text.

use std::fmt;
use std::str::FromStr;

use csvc_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Project types with a preview template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectType {
    /// NodeJS project built into static files served by nginx
    Javascript,
    /// Python project run directly
    Python,
}

impl ProjectType {
    /// Name used on the command line and in requests
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Javascript => "javascript",
            Self::Python => "python",
        }
    }
}

impl fmt::Display for ProjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "javascript" => Ok(Self::Javascript),
            "python" => Ok(Self::Python),
            other => Err(Error::UnknownProjectType { name: other.to_string() }),
        }
    }
}

/// Settings of a NodeJS preview
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodePreview {
    /// Node major version or tag, e.g. `20`
    pub node_version: String,
    pub install_command: String,
    pub build_command: String,
    /// Build output directory, relative to the project root
    pub output_directory: String,
    /// Raw `ENV` arguments, e.g. `NODE_ENV=production`; empty for none
    #[serde(default)]
    pub environment_vars: String,
}

impl Default for NodePreview {
    fn default() -> Self {
        Self {
            node_version: "20".to_string(),
            install_command: "npm install".to_string(),
            build_command: "npm run build".to_string(),
            output_directory: "dist".to_string(),
            environment_vars: String::new(),
        }
    }
}

/// Settings of a Python preview
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PythonPreview {
    pub install_command: String,
    pub expose_port: u16,
    /// Command line the container runs, split on whitespace
    pub deploy_command: String,
    /// Raw `ENV` arguments; empty for none
    #[serde(default)]
    pub environment_vars: String,
}

impl Default for PythonPreview {
    fn default() -> Self {
        Self {
            install_command: "pip install -r requirements.txt".to_string(),
            expose_port: 8000,
            deploy_command: "python main.py".to_string(),
            environment_vars: String::new(),
        }
    }
}

/// Optional `ENV` line, including its leading newline
fn env_line(environment_vars: &str) -> String {
    let vars = environment_vars.trim();
    if vars.is_empty() {
        String::new()
    } else {
        format!("\nENV {vars}")
    }
}

fn require(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::InvalidPreview { reason: format!("{field} cannot be empty") });
    }
    Ok(())
}

/// Generate the Dockerfile of a NodeJS project.
///
/// The project is built in a `node` stage and its output directory is
/// served by `nginx` on port 80.
pub fn nodejs_dockerfile(preview: &NodePreview) -> Result<String> {
    require(&preview.node_version, "node version")?;
    require(&preview.install_command, "install command")?;
    require(&preview.build_command, "build command")?;
    require(&preview.output_directory, "output directory")?;

    let output = preview.output_directory.trim().trim_start_matches("./");
    if output.starts_with('/') || output.split('/').any(|part| part == "..") {
        return Err(Error::InvalidPreview {
            reason: format!("output directory must stay inside the project: {output}"),
        });
    }

    Ok(format!(
        "FROM node:{version}-alpine AS builder{env}
WORKDIR /app
COPY package*.json ./
RUN {install}
COPY . ./
RUN chmod -R a+x node_modules
RUN {build}

FROM nginx:alpine
COPY --from=builder /app/{output} /usr/share/nginx/html
EXPOSE 80
CMD [\"nginx\", \"-g\", \"daemon off;\"]",
        version = preview.node_version.trim(),
        env = env_line(&preview.environment_vars),
        install = preview.install_command.trim(),
        build = preview.build_command.trim(),
    ))
}

/// Generate the Dockerfile of a Python project
pub fn python_dockerfile(preview: &PythonPreview) -> Result<String> {
    require(&preview.install_command, "install command")?;
    require(&preview.deploy_command, "deploy command")?;

    Ok(format!(
        "FROM python:alpine{env}
WORKDIR /app
COPY requirements.txt ./
RUN {install}
COPY . ./
EXPOSE {port}
CMD {cmd}",
        env = env_line(&preview.environment_vars),
        install = preview.install_command.trim(),
        port = preview.expose_port,
        cmd = exec_form(&preview.deploy_command)?,
    ))
}

/// Exec-form `CMD` argument: a JSON array of the command's words
fn exec_form(command: &str) -> Result<String> {
    let words = command
        .split_whitespace()
        .map(serde_json::to_string)
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(format!("[{}]", words.join(", ")))
}
