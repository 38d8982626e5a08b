// pframe - run declarative table workflows
//
// Thin layer over pframe-writer: turns a loaded RuntimeConfig into global
// settings and executes a workflow file with the local Parquet backend.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use pframe_config::RuntimeConfig;
use pframe_writer::{GlobalSettings, LocalParquetBackend, Workflow};

mod init;

pub use init::init_tracing;

/// Execute the workflow stored at `workflow_path` and report the tables it produced.
pub fn run_workflow_file(config: &RuntimeConfig, workflow_path: &Path) -> Result<Vec<String>> {
    let workflow = Workflow::from_file(workflow_path)
        .with_context(|| format!("Failed to load workflow {}", workflow_path.display()))?;

    tracing::info!(
        path = %workflow_path.display(),
        steps = workflow.workflow.len(),
        "Running workflow"
    );

    let settings = GlobalSettings::from_config(config);
    let tables = workflow
        .execute(settings, HashMap::new(), &LocalParquetBackend::new())
        .with_context(|| format!("Workflow {} failed", workflow_path.display()))?;

    let mut names: Vec<String> = tables.into_keys().collect();
    names.sort();
    Ok(names)
}
