// Configuration validation
//
// Validates that values are sensible before any workflow step runs

use crate::*;
use anyhow::{bail, Result};
use tracing::warn;

pub fn validate_config(config: &RuntimeConfig) -> Result<()> {
    validate_workflow_config(&config.workflow)?;
    validate_parquet_config(&config.parquet)?;
    validate_logging_config(&config.logging)?;
    Ok(())
}

fn validate_workflow_config(config: &WorkflowConfig) -> Result<()> {
    if config.root_folder.as_os_str().is_empty() {
        bail!("workflow.root_folder must not be empty");
    }

    if let Some(frames) = &config.frame_folder {
        if frames.as_os_str().is_empty() {
            bail!("workflow.frame_folder must not be empty when set");
        }
    }

    Ok(())
}

fn validate_parquet_config(config: &ParquetConfig) -> Result<()> {
    if config.row_group_size == 0 {
        bail!("parquet.row_group_size must be greater than 0");
    }

    // Warn about very large row groups
    if config.row_group_size > 10_000_000 {
        warn!(
            row_group_size = config.row_group_size,
            "parquet.row_group_size is very large; may cause memory issues"
        );
    }

    Ok(())
}

fn validate_logging_config(config: &LoggingConfig) -> Result<()> {
    if config.level.trim().is_empty() {
        bail!("logging.level must not be empty");
    }
    Ok(())
}
