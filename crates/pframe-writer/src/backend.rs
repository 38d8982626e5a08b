//! Columnar file backend
//!
//! Frame writing only needs a handful of operations from the file layer:
//! write a table, read it back (optionally projected), inspect the footer,
//! and run typed equality/projection/sort queries. `LocalParquetBackend`
//! implements them on the local filesystem with the `parquet` crate.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use arrow::record_batch::RecordBatchReader;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ProjectionMask;
use parquet::file::reader::{FileReader, SerializedFileReader};
use pframe_core::encoding::write_parquet_into;
use pframe_core::{kernels, AxisValue, ParquetOptions, Table};

use crate::error::{FrameError, Result};

/// Footer facts about a single column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnChunkSummary {
    pub name: String,
    /// Compressed on-disk size summed over row groups
    pub compressed_bytes: u64,
    /// Null count summed over row groups; `None` when any row group lacks statistics
    pub null_count: Option<u64>,
}

/// Footer facts about a columnar file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
    pub row_count: u64,
    pub columns: Vec<ColumnChunkSummary>,
}

impl FileMetadata {
    pub fn column(&self, name: &str) -> Result<&ColumnChunkSummary> {
        self.columns.iter().find(|c| c.name == name).ok_or_else(|| {
            FrameError::backend(
                "reading file metadata",
                format!("column '{}' is not present in the file", name),
            )
        })
    }
}

/// Typed query over a single file: equality filters, then sort, then projection.
///
/// Filter values are carried as typed scalars so string keys containing
/// quotes or separators are compared exactly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileQuery {
    pub filters: Vec<(String, AxisValue)>,
    pub projection: Vec<String>,
    pub sort_by: Vec<String>,
}

impl FileQuery {
    pub fn select(projection: Vec<String>) -> Self {
        Self {
            projection,
            ..Default::default()
        }
    }

    pub fn filter_eq(mut self, column: impl Into<String>, value: AxisValue) -> Self {
        self.filters.push((column.into(), value));
        self
    }

    pub fn sort_by(mut self, keys: Vec<String>) -> Self {
        self.sort_by = keys;
        self
    }

    /// Every column the query touches, in first-use order.
    fn referenced_columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = Vec::new();
        let candidates = self
            .projection
            .iter()
            .chain(self.filters.iter().map(|(c, _)| c))
            .chain(self.sort_by.iter());
        for column in candidates {
            if !columns.contains(column) {
                columns.push(column.clone());
            }
        }
        columns
    }
}

/// Operations the frame writer and reader need from the file layer
pub trait ColumnarBackend: Send + Sync {
    /// Write `table` to `path` and return the resulting footer facts.
    fn write(&self, table: &Table, path: &Path, options: &ParquetOptions) -> Result<FileMetadata>;

    /// Read a file, optionally restricted to the named columns (in that order).
    fn read(&self, path: &Path, columns: Option<&[String]>) -> Result<Table>;

    /// Inspect the footer of a file without reading its data pages.
    fn read_metadata(&self, path: &Path) -> Result<FileMetadata>;

    /// Run a typed query against a file.
    fn query(&self, path: &Path, query: &FileQuery) -> Result<Table> {
        let table = self.read(path, Some(&query.referenced_columns()))?;
        let batch = table.concat()?;
        let batch = kernels::filter_equal(&batch, &query.filters)?;
        let batch = kernels::sort_by(&batch, &query.sort_by)?;
        let batch = kernels::select(&batch, &query.projection)?;
        Ok(Table::from_batch(batch))
    }

    /// Distinct tuples over the named columns, ascending.
    fn distinct(&self, path: &Path, columns: &[String]) -> Result<Vec<Vec<AxisValue>>> {
        let table = self.read(path, Some(columns))?;
        Ok(kernels::distinct_tuples(&table.concat()?, columns)?)
    }

    /// Count nulls in a column by scanning it.
    fn scan_null_count(&self, path: &Path, column: &str) -> Result<u64> {
        let table = self.read(path, Some(&[column.to_string()]))?;
        Ok(table
            .batches()
            .iter()
            .map(|b| b.column(0).null_count() as u64)
            .sum())
    }
}

/// Parquet files on the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalParquetBackend;

impl LocalParquetBackend {
    pub fn new() -> Self {
        Self
    }
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| FrameError::io(path, e))
}

impl ColumnarBackend for LocalParquetBackend {
    fn write(&self, table: &Table, path: &Path, options: &ParquetOptions) -> Result<FileMetadata> {
        let file = File::create(path).map_err(|e| FrameError::io(path, e))?;
        let mut writer = BufWriter::new(file);
        write_parquet_into(table, &mut writer, options)?;
        writer.flush().map_err(|e| FrameError::io(path, e))?;

        tracing::debug!(
            path = %path.display(),
            rows = table.num_rows(),
            "Wrote parquet file"
        );

        self.read_metadata(path)
    }

    fn read(&self, path: &Path, columns: Option<&[String]>) -> Result<Table> {
        let context = || format!("reading '{}'", path.display());
        let builder = ParquetRecordBatchReaderBuilder::try_new(open(path)?)
            .map_err(|e| FrameError::backend(context(), e))?;

        let builder = match columns {
            Some(names) => {
                let file_schema = builder.schema().clone();
                let indices = names
                    .iter()
                    .map(|name| {
                        file_schema.index_of(name).map_err(|_| {
                            FrameError::backend(
                                context(),
                                format!("column '{}' is not present in the file", name),
                            )
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                let mask = ProjectionMask::roots(builder.parquet_schema(), indices);
                builder.with_projection(mask)
            }
            None => builder,
        };

        let reader = builder
            .build()
            .map_err(|e| FrameError::backend(context(), e))?;
        let schema = reader.schema();
        let batches = reader
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| FrameError::backend(context(), e))?;
        let table = Table::try_new(schema, batches)?;

        // The projection mask keeps file order; restore the requested order.
        match columns {
            Some(names) if table.column_names() != names => {
                let batch = kernels::select(&table.concat()?, names)?;
                Ok(Table::from_batch(batch))
            }
            _ => Ok(table),
        }
    }

    fn read_metadata(&self, path: &Path) -> Result<FileMetadata> {
        let reader = SerializedFileReader::new(open(path)?)
            .map_err(|e| FrameError::backend(format!("reading footer of '{}'", path.display()), e))?;
        let metadata = reader.metadata();

        let mut columns: Vec<ColumnChunkSummary> = metadata
            .file_metadata()
            .schema_descr()
            .columns()
            .iter()
            .map(|descr| ColumnChunkSummary {
                name: descr.name().to_string(),
                compressed_bytes: 0,
                null_count: Some(0),
            })
            .collect();

        for row_group in metadata.row_groups() {
            for (summary, chunk) in columns.iter_mut().zip(row_group.columns()) {
                summary.compressed_bytes += chunk.compressed_size().max(0) as u64;
                let nulls = chunk.statistics().and_then(|s| s.null_count_opt());
                summary.null_count = match (summary.null_count, nulls) {
                    (Some(total), Some(n)) => Some(total + n),
                    _ => None,
                };
            }
        }

        Ok(FileMetadata {
            row_count: metadata.file_metadata().num_rows().max(0) as u64,
            columns,
        })
    }
}
