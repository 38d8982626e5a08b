//! Declarative workflows: an ordered list of steps over named tables

use std::collections::HashMap;
use std::path::Path;

use pframe_core::Table;
use serde::{Deserialize, Serialize};

use crate::backend::ColumnarBackend;
use crate::context::ExecutionContext;
use crate::error::{FrameError, Result};
use crate::settings::GlobalSettings;
use crate::steps::Step;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub workflow: Vec<Step>,
}

impl Workflow {
    pub fn new(steps: Vec<Step>) -> Self {
        Self { workflow: steps }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| FrameError::invalid_request(format!("invalid workflow: {}", e)))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| FrameError::io(path, e))?;
        Self::from_json_str(&json)
    }

    /// Run every step eagerly and return the context with its deferred
    /// sinks and chained tasks still pending.
    ///
    /// When a step fails, work queued by earlier steps is abandoned.
    pub fn execute_lazy(
        &self,
        settings: GlobalSettings,
        initial_tables: HashMap<String, Table>,
        backend: &dyn ColumnarBackend,
    ) -> Result<ExecutionContext> {
        let mut ctx = ExecutionContext::with_tables(settings, initial_tables);
        for (index, step) in self.workflow.iter().enumerate() {
            tracing::debug!(step = index, kind = step.kind(), "Executing step");
            if let Err(e) = step.execute(&mut ctx, backend) {
                tracing::error!(step = index, kind = step.kind(), error = %e, "Step failed");
                ctx.abandon();
                return Err(e);
            }
        }
        Ok(ctx)
    }

    /// Run all steps, then all sinks, then all chained tasks.
    pub fn execute(
        &self,
        settings: GlobalSettings,
        initial_tables: HashMap<String, Table>,
        backend: &dyn ColumnarBackend,
    ) -> Result<HashMap<String, Table>> {
        let ctx = self.execute_lazy(settings, initial_tables, backend)?;
        tracing::info!(
            steps = self.workflow.len(),
            sinks = ctx.pending_sinks().len(),
            tasks = ctx.pending_task_labels().len(),
            "Running deferred work"
        );
        ctx.finish(backend)
    }
}
