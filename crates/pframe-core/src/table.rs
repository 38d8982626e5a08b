//! Cheaply cloneable in-memory table handle

use std::sync::Arc;

use arrow::array::{ArrayRef, RecordBatch};
use arrow::datatypes::{Schema, SchemaRef};

use crate::error::{CoreError, Result};

/// Named tables passed between workflow steps.
///
/// Holds one or more record batches sharing a schema. Cloning only bumps
/// reference counts.
#[derive(Debug, Clone)]
pub struct Table {
    schema: SchemaRef,
    batches: Arc<Vec<RecordBatch>>,
}

impl Table {
    /// Build a table, checking that every batch matches `schema`.
    pub fn try_new(schema: SchemaRef, batches: Vec<RecordBatch>) -> Result<Self> {
        if let Some(batch) = batches.iter().find(|b| b.schema() != schema) {
            return Err(CoreError::arrow(
                "all batches must share the same schema",
                arrow::error::ArrowError::SchemaError(format!(
                    "expected {:?}, found {:?}",
                    schema,
                    batch.schema()
                )),
            ));
        }
        Ok(Self {
            schema,
            batches: Arc::new(batches),
        })
    }

    pub fn from_batch(batch: RecordBatch) -> Self {
        Self {
            schema: batch.schema(),
            batches: Arc::new(vec![batch]),
        }
    }

    pub fn empty(schema: SchemaRef) -> Self {
        Self {
            schema,
            batches: Arc::new(Vec::new()),
        }
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    pub fn batches(&self) -> &[RecordBatch] {
        &self.batches
    }

    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(RecordBatch::num_rows).sum()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.schema
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }

    /// Concatenate all batches into one (an empty batch when there are none).
    pub fn concat(&self) -> Result<RecordBatch> {
        arrow::compute::concat_batches(&self.schema, self.batches.iter())
            .map_err(|e| CoreError::arrow("failed to concatenate batches", e))
    }

    /// Look up a column of the concatenated table by name.
    pub fn column(&self, name: &str) -> Result<ArrayRef> {
        let batch = self.concat()?;
        column_by_name(&batch, name).cloned()
    }
}

/// Column lookup that reports the available names on failure.
pub fn column_by_name<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a ArrayRef> {
    batch
        .column_by_name(name)
        .ok_or_else(|| missing_column(batch.schema_ref(), name))
}

pub(crate) fn missing_column(schema: &Schema, name: &str) -> CoreError {
    CoreError::MissingColumn {
        column: name.to_string(),
        available: schema.fields().iter().map(|f| f.name().clone()).collect(),
    }
}
