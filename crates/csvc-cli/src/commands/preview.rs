//! Preview command implementation

use color_eyre::eyre::{Context, Result};
use csvc_preview::{nodejs_dockerfile, python_dockerfile, NodePreview, ProjectType, PythonPreview};

/// Preview command implementation; unset options keep the template defaults
pub struct PreviewCommand {
    pub project_type: ProjectType,
    pub node_version: Option<String>,
    pub install_command: Option<String>,
    pub build_command: Option<String>,
    pub output_directory: Option<String>,
    pub port: Option<u16>,
    pub deploy_command: Option<String>,
    pub env: Option<String>,
}

impl PreviewCommand {
    pub fn execute(self) -> Result<()> {
        let text = self.render()?;
        println!("{text}");
        Ok(())
    }

    fn render(self) -> Result<String> {
        let text = match self.project_type {
            ProjectType::Javascript => {
                let defaults = NodePreview::default();
                nodejs_dockerfile(&NodePreview {
                    node_version: self.node_version.unwrap_or(defaults.node_version),
                    install_command: self.install_command.unwrap_or(defaults.install_command),
                    build_command: self.build_command.unwrap_or(defaults.build_command),
                    output_directory: self.output_directory.unwrap_or(defaults.output_directory),
                    environment_vars: self.env.unwrap_or_default(),
                })
            }
            ProjectType::Python => {
                let defaults = PythonPreview::default();
                python_dockerfile(&PythonPreview {
                    install_command: self.install_command.unwrap_or(defaults.install_command),
                    expose_port: self.port.unwrap_or(defaults.expose_port),
                    deploy_command: self.deploy_command.unwrap_or(defaults.deploy_command),
                    environment_vars: self.env.unwrap_or_default(),
                })
            }
        };

        text.context("Failed to generate preview")
    }
}
