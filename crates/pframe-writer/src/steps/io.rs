//! CSV read and write steps

use std::fs::File;
use std::io::{BufReader, Seek, SeekFrom};
use std::sync::Arc;

use arrow::csv::reader::Format;
use arrow::csv::ReaderBuilder;
use pframe_core::{kernels, Table};
use serde::{Deserialize, Serialize};

use super::delimiter_byte;
use crate::context::{DeferredWrite, ExecutionContext};
use crate::error::{FrameError, Result};

/// Load a CSV file into the table space, inferring column types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadCsv {
    pub file: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<char>,
}

impl ReadCsv {
    pub fn execute(&self, ctx: &mut ExecutionContext) -> Result<()> {
        let path = ctx.settings().resolve(&self.file);
        let context = || format!("reading CSV '{}'", path.display());

        let mut file = File::open(&path).map_err(|e| FrameError::io(&path, e))?;
        let format = Format::default()
            .with_header(true)
            .with_delimiter(delimiter_byte(self.delimiter)?);
        let (schema, _) = format
            .infer_schema(BufReader::new(&mut file), None)
            .map_err(|e| FrameError::backend(context(), e))?;
        file.seek(SeekFrom::Start(0))
            .map_err(|e| FrameError::io(&path, e))?;

        let schema = Arc::new(schema);
        let reader = ReaderBuilder::new(Arc::clone(&schema))
            .with_format(format)
            .build(BufReader::new(file))
            .map_err(|e| FrameError::backend(context(), e))?;
        let batches = reader
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| FrameError::backend(context(), e))?;

        let table = Table::try_new(schema, batches)?;
        tracing::debug!(
            table = %self.name,
            path = %path.display(),
            rows = table.num_rows(),
            "Read CSV"
        );
        ctx.put_table(&self.name, table);
        Ok(())
    }
}

/// Queue a table (optionally projected) to be written as CSV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteCsv {
    pub table: String,
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<char>,
}

impl WriteCsv {
    pub fn execute(&self, ctx: &mut ExecutionContext) -> Result<()> {
        let delimiter = delimiter_byte(self.delimiter)?;
        let table = ctx.get_table(&self.table)?;
        let table = match &self.columns {
            Some(columns) => Table::from_batch(kernels::select(&table.concat()?, columns)?),
            None => table,
        };

        let target = ctx.settings().resolve(&self.file);
        ctx.add_sink(DeferredWrite::csv(table, target, delimiter));
        Ok(())
    }
}
