use anyhow::{Context, Result};
use clap::Parser;
use pframe_config::RuntimeConfig;
use std::path::PathBuf;

/// Run a declarative table workflow
#[derive(Parser)]
#[command(name = "pframe")]
#[command(version)]
#[command(about = "Run declarative table workflows and write partitioned frames", long_about = None)]
struct Cli {
    /// Workflow file (JSON)
    #[arg(value_name = "WORKFLOW")]
    workflow: PathBuf,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory holding frames (overrides config file)
    #[arg(short, long, value_name = "DIR")]
    frame_folder: Option<PathBuf>,

    /// Base directory for relative file paths (overrides config file)
    #[arg(short, long, value_name = "DIR")]
    root_folder: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error
    #[arg(short = 'v', long, value_name = "LEVEL")]
    log_level: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Step 1: Load base configuration
    let mut config = if let Some(config_path) = &cli.config {
        RuntimeConfig::load_from_path(config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?
    } else {
        RuntimeConfig::load().context("Failed to load configuration")?
    };

    // Step 2: Apply CLI overrides (highest priority)
    apply_cli_overrides(&mut config, &cli);
    config.validate()?;

    pframe::init_tracing(&config.logging);

    let tables = pframe::run_workflow_file(&config, &cli.workflow)?;
    tracing::info!(tables = ?tables, "Workflow finished");
    Ok(())
}

fn apply_cli_overrides(config: &mut RuntimeConfig, cli: &Cli) {
    if let Some(frames) = &cli.frame_folder {
        config.workflow.frame_folder = Some(frames.clone());
    }
    if let Some(root) = &cli.root_folder {
        config.workflow.root_folder = root.clone();
    }
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
}
