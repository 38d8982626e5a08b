//! Execution context: named table space plus deferred work
//!
//! Steps run eagerly but may queue two kinds of deferred work:
//! - sinks, which materialize a table into a file, and
//! - chained tasks, which run strictly after every queued sink has landed,
//!   in the order they were registered.
//!
//! `finish` drains both queues. The first failure aborts everything queued
//! behind it; scratch files registered by steps are removed on every exit
//! path. Output directories claimed by steps are removed again when a run
//! fails while they are still empty, so a retry does not trip over them.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::csv::WriterBuilder;
use pframe_core::{ParquetOptions, Table};

use crate::backend::ColumnarBackend;
use crate::error::{FrameError, Result};
use crate::settings::GlobalSettings;

/// Post-sink action; receives the backend explicitly.
pub type ChainedTask = Box<dyn FnOnce(&dyn ColumnarBackend) -> Result<()> + Send>;

/// Output format of a deferred write
#[derive(Debug, Clone)]
pub enum SinkFormat {
    Parquet(ParquetOptions),
    Csv { delimiter: u8 },
}

/// A table waiting to be written to a file
#[derive(Debug, Clone)]
pub struct DeferredWrite {
    pub table: Table,
    pub target: PathBuf,
    pub format: SinkFormat,
}

impl DeferredWrite {
    pub fn parquet(table: Table, target: impl Into<PathBuf>, options: ParquetOptions) -> Self {
        Self {
            table,
            target: target.into(),
            format: SinkFormat::Parquet(options),
        }
    }

    pub fn csv(table: Table, target: impl Into<PathBuf>, delimiter: u8) -> Self {
        Self {
            table,
            target: target.into(),
            format: SinkFormat::Csv { delimiter },
        }
    }

    /// Write the table; a partially written target is removed on failure.
    pub fn run(self, backend: &dyn ColumnarBackend) -> Result<()> {
        let result = match &self.format {
            SinkFormat::Parquet(options) => backend
                .write(&self.table, &self.target, options)
                .map(|_| ()),
            SinkFormat::Csv { delimiter } => write_csv(&self.table, &self.target, *delimiter),
        };

        if result.is_err() {
            remove_scratch_file(&self.target);
        }
        result
    }
}

fn write_csv(table: &Table, path: &Path, delimiter: u8) -> Result<()> {
    let file = File::create(path).map_err(|e| FrameError::io(path, e))?;
    let mut buffered = BufWriter::new(file);
    {
        let mut writer = WriterBuilder::new()
            .with_header(true)
            .with_delimiter(delimiter)
            .build(&mut buffered);
        for batch in table.batches() {
            writer
                .write(batch)
                .map_err(|e| FrameError::backend(format!("writing '{}'", path.display()), e))?;
        }
    }
    buffered.flush().map_err(|e| FrameError::io(path, e))?;

    tracing::debug!(path = %path.display(), rows = table.num_rows(), "Wrote CSV file");
    Ok(())
}

/// Remove a scratch file, logging instead of failing.
pub(crate) fn remove_scratch_file(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "Removed scratch file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "Failed to remove scratch file"),
    }
}

/// Remove a claimed directory if nothing was written into it.
fn release_empty_dir(path: &Path) {
    match fs::remove_dir(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "Released empty output directory"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::debug!(path = %path.display(), error = %e, "Kept output directory"),
    }
}

/// Deferred work split out of a context
pub struct ContextParts {
    pub tables: HashMap<String, Table>,
    pub sinks: Vec<DeferredWrite>,
    pub tasks: Vec<(String, ChainedTask)>,
    pub scratch_files: Vec<PathBuf>,
    pub claimed_dirs: Vec<PathBuf>,
}

/// Table space and deferred work of one workflow run
pub struct ExecutionContext {
    settings: Arc<GlobalSettings>,
    tables: HashMap<String, Table>,
    sinks: Vec<DeferredWrite>,
    tasks: Vec<(String, ChainedTask)>,
    scratch_files: Vec<PathBuf>,
    claimed_dirs: Vec<PathBuf>,
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let task_labels: Vec<&str> = self.tasks.iter().map(|(label, _)| label.as_str()).collect();
        f.debug_struct("ExecutionContext")
            .field("tables", &self.table_names())
            .field("sinks", &self.sinks.len())
            .field("tasks", &task_labels)
            .finish()
    }
}

impl ExecutionContext {
    pub fn new(settings: GlobalSettings) -> Self {
        Self::with_tables(settings, HashMap::new())
    }

    pub fn with_tables(settings: GlobalSettings, tables: HashMap<String, Table>) -> Self {
        Self {
            settings: Arc::new(settings),
            tables,
            sinks: Vec::new(),
            tasks: Vec::new(),
            scratch_files: Vec::new(),
            claimed_dirs: Vec::new(),
        }
    }

    pub fn settings(&self) -> &GlobalSettings {
        &self.settings
    }

    /// Look up a table; unknown names list what is available.
    pub fn get_table(&self, name: &str) -> Result<Table> {
        self.tables.get(name).cloned().ok_or_else(|| {
            FrameError::workflow(format!(
                "Table '{}' not found. Available tables: {:?}",
                name,
                self.table_names()
            ))
        })
    }

    pub fn put_table(&mut self, name: impl Into<String>, table: Table) {
        self.tables.insert(name.into(), table);
    }

    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn add_sink(&mut self, sink: DeferredWrite) {
        self.sinks.push(sink);
    }

    pub fn chain_task<F>(&mut self, label: impl Into<String>, task: F)
    where
        F: FnOnce(&dyn ColumnarBackend) -> Result<()> + Send + 'static,
    {
        self.tasks.push((label.into(), Box::new(task)));
    }

    /// Register a file that must not survive the run.
    pub fn register_scratch_file(&mut self, path: impl Into<PathBuf>) {
        self.scratch_files.push(path.into());
    }

    /// Register a directory created by a step; it is removed again if the
    /// run fails and the directory is still empty.
    pub fn register_claimed_dir(&mut self, path: impl Into<PathBuf>) {
        self.claimed_dirs.push(path.into());
    }

    pub fn pending_sinks(&self) -> &[DeferredWrite] {
        &self.sinks
    }

    pub fn pending_task_labels(&self) -> Vec<&str> {
        self.tasks.iter().map(|(label, _)| label.as_str()).collect()
    }

    pub fn into_parts(self) -> ContextParts {
        ContextParts {
            tables: self.tables,
            sinks: self.sinks,
            tasks: self.tasks,
            scratch_files: self.scratch_files,
            claimed_dirs: self.claimed_dirs,
        }
    }

    /// Run all sinks, then all chained tasks, and return the table space.
    pub fn finish(self, backend: &dyn ColumnarBackend) -> Result<HashMap<String, Table>> {
        let parts = self.into_parts();
        let result = run_deferred(parts.sinks, parts.tasks, backend);
        for path in &parts.scratch_files {
            remove_scratch_file(path);
        }
        if result.is_err() {
            parts.claimed_dirs.iter().for_each(|dir| release_empty_dir(dir));
        }
        result.map(|()| parts.tables)
    }

    /// Drop all deferred work without running it, for a run that failed
    /// before `finish` was reached.
    pub fn abandon(self) {
        let parts = self.into_parts();
        tracing::debug!(
            sinks = parts.sinks.len(),
            tasks = parts.tasks.len(),
            "Abandoning deferred work"
        );
        for path in &parts.scratch_files {
            remove_scratch_file(path);
        }
        parts.claimed_dirs.iter().for_each(|dir| release_empty_dir(dir));
    }
}

fn run_deferred(
    sinks: Vec<DeferredWrite>,
    tasks: Vec<(String, ChainedTask)>,
    backend: &dyn ColumnarBackend,
) -> Result<()> {
    let sink_count = sinks.len();
    for sink in sinks {
        let target = sink.target.clone();
        sink.run(backend).inspect_err(|e| {
            tracing::error!(path = %target.display(), error = %e, "Sink failed");
        })?;
    }
    tracing::debug!(sinks = sink_count, "All sinks completed");

    for (label, task) in tasks {
        tracing::debug!(task = %label, "Running chained task");
        task(backend).inspect_err(|e| {
            tracing::error!(task = %label, error = %e, "Chained task failed");
        })?;
    }
    Ok(())
}
