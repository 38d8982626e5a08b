//! WriteFrame: materialize a table as a partitioned, content-addressed frame
//!
//! The step itself only validates the request, shapes the table (cast,
//! null-key filter, sort) and creates the frame directory. The shaped table
//! is queued as a sink to an intermediate file; a chained task then splits
//! it into partitions, hashes them and commits the per-column metadata.
//!
//! The directory is claimed while steps run, so a second write to the same
//! frame fails at once with E003. If the run fails before anything lands in
//! it, the context removes the empty directory again.

use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;

use arrow::array::{Array, RecordBatch};
use pframe_core::{
    encode_part_key, kernels, AxisSpec, AxisValue, ColumnSpec, ColumnSpecFile,
    FrameMetadataBuilder, ParquetOptions, Table,
};
use pframe_core::table::column_by_name;
use serde::{Deserialize, Serialize};

use crate::backend::ColumnarBackend;
use crate::context::{remove_scratch_file, DeferredWrite, ExecutionContext};
use crate::error::{FrameError, Result};
use crate::layout::{
    create_frame_dir, datainfo_path, spec_path, validate_column_id, validate_frame_name,
    write_atomic,
};
use crate::partition::{describe_partition, split_partitions, FrameLayout};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteFrame {
    pub input_table: String,
    /// Bare directory name inside the frame folder
    pub frame_name: String,
    pub axes: Vec<AxisSpec>,
    pub columns: Vec<ColumnSpec>,
    #[serde(default)]
    pub partition_key_length: usize,
    /// Fail on null axis values instead of dropping those rows
    #[serde(default)]
    pub strict: bool,
}

impl WriteFrame {
    /// Reject malformed requests before any I/O happens.
    pub fn validate(&self) -> Result<()> {
        validate_frame_name(&self.frame_name)?;

        if self.axes.is_empty() {
            return Err(FrameError::invalid_request("at least one axis is required"));
        }
        if self.columns.is_empty() {
            return Err(FrameError::invalid_request("at least one column is required"));
        }

        let ids = self
            .axes
            .iter()
            .map(|a| &a.id)
            .chain(self.columns.iter().map(|c| &c.id));
        let mut seen = BTreeSet::new();
        let mut duplicates = BTreeSet::new();
        for id in ids {
            if id.is_empty() {
                return Err(FrameError::invalid_request(
                    "axis and column identifiers must not be empty",
                ));
            }
            if !seen.insert(id.as_str()) {
                duplicates.insert(id.as_str());
            }
        }
        for column in &self.columns {
            if !column.id.is_empty() {
                validate_column_id(&column.id)?;
            }
        }
        if !duplicates.is_empty() {
            return Err(FrameError::invalid_request(format!(
                "axis and column identifiers must be unique; duplicates: {:?}",
                duplicates
            )));
        }

        if self.partition_key_length >= self.axes.len() {
            return Err(FrameError::invalid_request(format!(
                "partition_key_length ({}) must be less than the number of axes ({})",
                self.partition_key_length,
                self.axes.len()
            )));
        }

        Ok(())
    }

    fn layout(&self) -> FrameLayout {
        FrameLayout {
            axes: self.axes.clone(),
            columns: self.columns.clone(),
            partition_key_length: self.partition_key_length,
        }
    }

    pub fn execute(&self, ctx: &mut ExecutionContext) -> Result<()> {
        self.validate()?;

        let frame_dir = ctx.settings().frame_dir(&self.frame_name)?;
        let layout = self.layout();
        let source = ctx.get_table(&self.input_table)?;
        let shaped = shape_table(&source, &layout, self.strict)?;

        create_frame_dir(&frame_dir)?;
        ctx.register_claimed_dir(&frame_dir);
        if let Some(spill) = &ctx.settings().spill_folder {
            fs::create_dir_all(spill).map_err(|e| FrameError::io(spill, e))?;
        }

        let intermediate = ctx.settings().intermediate_path(&self.frame_name, &frame_dir);
        let options = ctx.settings().parquet.clone();

        tracing::info!(
            frame = %self.frame_name,
            rows = shaped.num_rows(),
            partition_key_length = self.partition_key_length,
            strict = self.strict,
            "Frame write queued"
        );

        ctx.register_scratch_file(&intermediate);
        ctx.add_sink(DeferredWrite::parquet(
            shaped,
            intermediate.clone(),
            options.clone(),
        ));

        let finalize = FinalizeFrame {
            frame_name: self.frame_name.clone(),
            frame_dir,
            intermediate,
            layout,
            strict: self.strict,
            options,
        };
        ctx.chain_task(format!("write_frame:{}", self.frame_name), move |backend| {
            finalize.run(backend)
        });
        Ok(())
    }
}

/// Project and cast to `axes ++ columns`, drop null keys unless strict, and
/// sort by the full axis tuple.
fn shape_table(source: &Table, layout: &FrameLayout, strict: bool) -> Result<Table> {
    let batch = kernels::project_and_cast(&source.concat()?, &layout.axes, &layout.columns)?;
    let axis_ids = layout.axis_ids();
    let batch = if strict {
        batch
    } else {
        kernels::drop_null_keys(&batch, &axis_ids)?
    };
    let batch = kernels::sort_by(&batch, &axis_ids)?;
    reject_repeated_keys(&batch, layout)?;
    Ok(Table::from_batch(batch))
}

/// Every row must have its own axis tuple. Strict-mode nulls are left for
/// the post-sink null check, which names the offending axis.
fn reject_repeated_keys(batch: &RecordBatch, layout: &FrameLayout) -> Result<()> {
    let axis_ids = layout.axis_ids();
    for id in &axis_ids {
        if column_by_name(batch, id)?.null_count() > 0 {
            return Ok(());
        }
    }

    if let Some((row, count)) = kernels::repeated_keys(batch, &axis_ids)? {
        let key = layout
            .axes
            .iter()
            .map(|axis| {
                let column = column_by_name(batch, &axis.id)?;
                AxisValue::from_array(column.as_ref(), row, &axis.id)
            })
            .collect::<pframe_core::Result<Vec<_>>>()?;
        return Err(FrameError::duplicate_axis_key(encode_part_key(&key), count));
    }
    Ok(())
}

/// Post-sink phase of a frame write
struct FinalizeFrame {
    frame_name: String,
    frame_dir: PathBuf,
    intermediate: PathBuf,
    layout: FrameLayout,
    strict: bool,
    options: ParquetOptions,
}

impl FinalizeFrame {
    /// Commit the frame; the intermediate file is removed whatever happens.
    fn run(self, backend: &dyn ColumnarBackend) -> Result<()> {
        let result = self.commit(backend);
        remove_scratch_file(&self.intermediate);
        result
    }

    fn commit(&self, backend: &dyn ColumnarBackend) -> Result<()> {
        if self.strict {
            self.check_axis_nulls(backend)?;
        }

        let partitions = split_partitions(
            backend,
            &self.intermediate,
            &self.frame_dir,
            &self.layout,
            &self.options,
        )?;

        let mut builder =
            FrameMetadataBuilder::new(self.layout.partition_key_length, &self.layout.columns);
        for partition in &partitions {
            let parts = describe_partition(backend, &self.frame_dir, partition, &self.layout)?;
            builder.add_partition(&partition.part_key(), parts)?;
        }

        // Encode everything before touching the directory so a failure
        // leaves no metadata behind.
        let files = builder
            .finish()
            .into_iter()
            .map(|(column, info)| -> Result<_> {
                let spec = ColumnSpecFile {
                    column: column.clone(),
                    axes: self.layout.axes.clone(),
                };
                Ok((column, info.to_json_bytes()?, spec.to_json_bytes()?))
            })
            .collect::<Result<Vec<_>>>()?;

        for (column, datainfo, spec) in &files {
            write_atomic(&spec_path(&self.frame_dir, &column.id), spec)?;
            write_atomic(&datainfo_path(&self.frame_dir, &column.id), datainfo)?;
        }

        tracing::info!(
            frame = %self.frame_name,
            partitions = partitions.len(),
            columns = files.len(),
            "Frame metadata committed"
        );
        Ok(())
    }

    fn check_axis_nulls(&self, backend: &dyn ColumnarBackend) -> Result<()> {
        let metadata = backend.read_metadata(&self.intermediate)?;
        for axis in &self.layout.axes {
            let null_count = match metadata.column(&axis.id)?.null_count {
                Some(count) => count,
                None => backend.scan_null_count(&self.intermediate, &axis.id)?,
            };
            if null_count > 0 {
                return Err(FrameError::null_axis_values(&axis.id, null_count));
            }
        }
        Ok(())
    }
}
