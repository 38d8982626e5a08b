//! Parquet writer configuration and encoding of tables
//!
//! Uses dictionary encoding and page-level statistics so partition files
//! carry null counts and per-column sizes in their footers.

use std::io::Write;

use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::{EnabledStatistics, WriterProperties};
use parquet::format::KeyValue;

use crate::error::{CoreError, Result};
use crate::hash::DIGEST_ALGORITHM;
use crate::table::Table;

pub const DEFAULT_ROW_GROUP_SIZE: usize = 32 * 1024;

/// Compression codec for partition and intermediate files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParquetCompression {
    Uncompressed,
    Snappy,
    #[default]
    Zstd,
}

/// Options forwarded to the columnar file writer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParquetOptions {
    pub row_group_size: usize,
    pub compression: ParquetCompression,
}

impl Default for ParquetOptions {
    fn default() -> Self {
        Self {
            row_group_size: DEFAULT_ROW_GROUP_SIZE,
            compression: ParquetCompression::default(),
        }
    }
}

impl ParquetOptions {
    fn compression_setting(&self) -> Compression {
        match self.compression {
            ParquetCompression::Uncompressed => Compression::UNCOMPRESSED,
            ParquetCompression::Snappy => Compression::SNAPPY,
            ParquetCompression::Zstd => {
                let level = ZstdLevel::try_new(2).unwrap_or_default();
                Compression::ZSTD(level)
            }
        }
    }

    /// Writer properties for these options
    ///
    /// - Dictionary encoding enabled
    /// - Page statistics (null counts feed the strict-mode axis check)
    /// - Writer version and digest layout embedded as key/value metadata
    pub fn writer_properties(&self) -> WriterProperties {
        let metadata = vec![
            KeyValue {
                key: "pframe.version".to_string(),
                value: Some(env!("CARGO_PKG_VERSION").to_string()),
            },
            KeyValue {
                key: "pframe.digest".to_string(),
                value: Some(DIGEST_ALGORITHM.to_string()),
            },
        ];

        WriterProperties::builder()
            .set_dictionary_enabled(true)
            .set_statistics_enabled(EnabledStatistics::Page)
            .set_compression(self.compression_setting())
            .set_data_page_size_limit(256 * 1024)
            .set_write_batch_size(32 * 1024)
            .set_max_row_group_size(self.row_group_size.max(1))
            .set_dictionary_page_size_limit(128 * 1024)
            .set_key_value_metadata(Some(metadata))
            .build()
    }
}

/// Write a table into an arbitrary `Write` sink.
///
/// A table without batches still produces a valid file carrying the schema.
pub fn write_parquet_into<W>(table: &Table, writer: W, options: &ParquetOptions) -> Result<()>
where
    W: Write + Send,
{
    let parquet_error = |context: &str, e: parquet::errors::ParquetError| {
        CoreError::arrow(context, arrow::error::ArrowError::ExternalError(Box::new(e)))
    };

    let mut arrow_writer = ArrowWriter::try_new(
        writer,
        table.schema().clone(),
        Some(options.writer_properties()),
    )
    .map_err(|e| parquet_error("failed to create Arrow writer", e))?;

    for batch in table.batches() {
        arrow_writer
            .write(batch)
            .map_err(|e| parquet_error("failed to write batch", e))?;
    }
    arrow_writer
        .close()
        .map_err(|e| parquet_error("failed to close writer", e))?;

    Ok(())
}
