//! Main CLI entry point for the container build service

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use csvc_config::DEFAULT_CONFIG_FILE;
use csvc_preview::ProjectType;
use tracing_subscriber::EnvFilter;

mod commands;

/// Container build service - build tagged images from source trees
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    quiet: u8,

    /// Configuration file path (global option)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build an image from a source tree
    Build {
        /// Tag applied to the built image
        #[arg(short, long, value_name = "TAG")]
        tag: String,

        /// Source tree used as the build context
        #[arg(short, long, value_name = "DIR")]
        source: PathBuf,

        /// Read the build spec from a file
        #[arg(long, value_name = "FILE", conflicts_with = "spec_text", required_unless_present = "spec_text")]
        spec_file: Option<PathBuf>,

        /// Build spec given inline
        #[arg(long, value_name = "TEXT")]
        spec_text: Option<String>,
    },

    /// Print a build-spec preview for a project type
    Preview {
        /// Project type: javascript or python
        #[arg(value_name = "TYPE")]
        project_type: ProjectType,

        /// Node version (javascript)
        #[arg(long, value_name = "VERSION")]
        node_version: Option<String>,

        /// Dependency install command
        #[arg(long, value_name = "CMD")]
        install_command: Option<String>,

        /// Build command (javascript)
        #[arg(long, value_name = "CMD")]
        build_command: Option<String>,

        /// Build output directory (javascript)
        #[arg(long, value_name = "DIR")]
        output_directory: Option<String>,

        /// Exposed port (python)
        #[arg(long, value_name = "PORT")]
        port: Option<u16>,

        /// Command the container runs (python)
        #[arg(long, value_name = "CMD")]
        deploy_command: Option<String>,

        /// Environment variables for the ENV line, e.g. "A=1 B=2"
        #[arg(long, value_name = "VARS")]
        env: Option<String>,
    },

    /// Serve the metrics endpoint until interrupted
    ServeMetrics {
        /// Override the configured listen address
        #[arg(short, long, value_name = "ADDR")]
        listen: Option<String>,
    },

    /// Initialize a new configuration file
    Init {
        /// Output path for configuration file
        #[arg(short, long, value_name = "FILE", default_value = DEFAULT_CONFIG_FILE)]
        output: PathBuf,

        /// Force overwrite existing file
        #[arg(short, long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Install color-eyre for better error reports
    color_eyre::install()?;

    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet)?;

    let result = match cli.command {
        Commands::Build { tag, source, spec_file, spec_text } => {
            let spec = match (spec_file, spec_text) {
                (Some(path), _) => commands::SpecSource::File(path),
                (None, Some(text)) => commands::SpecSource::Text(text),
                (None, None) => commands::SpecSource::Text(String::new()),
            };
            let command = commands::BuildCommand::new(cli.config, tag, source, spec);
            command.execute().await
        }

        Commands::Preview {
            project_type,
            node_version,
            install_command,
            build_command,
            output_directory,
            port,
            deploy_command,
            env,
        } => {
            let command = commands::PreviewCommand {
                project_type,
                node_version,
                install_command,
                build_command,
                output_directory,
                port,
                deploy_command,
                env,
            };
            command.execute()
        }

        Commands::ServeMetrics { listen } => {
            let command = commands::ServeMetricsCommand::new(cli.config, listen);
            command.execute().await
        }

        Commands::Init { output, force } => {
            let command = commands::InitCommand::new(output, force);
            command.execute()
        }
    };

    if let Err(e) = result {
        tracing::error!("Command failed: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

fn setup_logging(verbose: u8, quiet: u8) -> Result<()> {
    let log_level = match (verbose, quiet) {
        (0, 0) => "info",
        (1, 0) => "debug",
        (_, 0) => "trace",
        (0, 1) => "warn",
        (0, 2) => "error",
        (0, _) => "off",
        _ => "info",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}
