//! Init command implementation

use std::path::PathBuf;

use color_eyre::eyre::{eyre, Context, Result};
use csvc_config::Config;
use tracing::info;

/// Init command implementation
pub struct InitCommand {
    output_path: PathBuf,
    force: bool,
}

impl InitCommand {
    pub fn new(output_path: PathBuf, force: bool) -> Self {
        Self { output_path, force }
    }

    pub fn execute(&self) -> Result<()> {
        self.write_config()?;

        println!("✓ Created configuration file: {}", self.output_path.display());
        println!("\nNext steps:");
        println!("1. Point docker.socket_path at your engine if it is not the local default");
        println!(
            "2. Run 'csvc build -c {} --tag <TAG> --source <DIR> --spec-file <FILE>'",
            self.output_path.display()
        );

        Ok(())
    }

    fn write_config(&self) -> Result<()> {
        info!("Initializing configuration file at {}", self.output_path.display());

        if self.output_path.exists() && !self.force {
            return Err(eyre!(
                "Configuration file already exists: {}. Use --force to overwrite.",
                self.output_path.display()
            ));
        }

        let yaml_content = serde_yaml::to_string(&Config::default())
            .context("Failed to serialize config to YAML")?;

        std::fs::write(&self.output_path, yaml_content)
            .with_context(|| format!("Failed to write config to {}", self.output_path.display()))
    }
}
