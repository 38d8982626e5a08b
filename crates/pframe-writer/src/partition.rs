//! Partition splitting, hashing and per-partition stats
//!
//! The intermediate file holds the whole projected table sorted by the full
//! axis tuple. The first `k` axes select which partition file a row lands
//! in; the remaining axes and all value columns are stored inside it,
//! sorted by the remaining axes.

use std::path::Path;

use pframe_core::{
    data_digest, encode_part_key, hash_rows, AxisSpec, AxisValue, ByteStats,
    ColumnSpec, DataInfoPart, ParquetOptions, PartStats,
};

use crate::backend::{ColumnarBackend, FileMetadata, FileQuery};
use crate::error::Result;
use crate::layout::partition_file_name;

/// Shape of a frame: its axes, value columns and partition key length
#[derive(Debug, Clone)]
pub struct FrameLayout {
    pub axes: Vec<AxisSpec>,
    pub columns: Vec<ColumnSpec>,
    pub partition_key_length: usize,
}

impl FrameLayout {
    pub fn partition_axes(&self) -> &[AxisSpec] {
        &self.axes[..self.partition_key_length]
    }

    /// Axes stored inside each partition file
    pub fn stored_axes(&self) -> &[AxisSpec] {
        &self.axes[self.partition_key_length..]
    }

    pub fn axis_ids(&self) -> Vec<String> {
        self.axes.iter().map(|a| a.id.clone()).collect()
    }

    fn stored_axis_ids(&self) -> Vec<String> {
        self.stored_axes().iter().map(|a| a.id.clone()).collect()
    }

    /// Columns of a partition file: stored axes, then value columns.
    fn stored_columns(&self) -> Vec<String> {
        let mut names = self.stored_axis_ids();
        names.extend(self.columns.iter().map(|c| c.id.clone()));
        names
    }
}

/// A partition file that has been written to the frame directory
#[derive(Debug, Clone)]
pub struct WrittenPartition {
    pub file_name: String,
    pub key: Vec<AxisValue>,
    pub metadata: FileMetadata,
}

impl WrittenPartition {
    pub fn part_key(&self) -> String {
        encode_part_key(&self.key)
    }
}

/// Split the intermediate file into partition files inside `frame_dir`.
///
/// Partitions are numbered in ascending order of their key tuples. With
/// `k == 0` an empty intermediate file yields no partition at all.
pub fn split_partitions(
    backend: &dyn ColumnarBackend,
    intermediate: &Path,
    frame_dir: &Path,
    layout: &FrameLayout,
    options: &ParquetOptions,
) -> Result<Vec<WrittenPartition>> {
    let keys = if layout.partition_key_length == 0 {
        if backend.read_metadata(intermediate)?.row_count == 0 {
            return Ok(Vec::new());
        }
        vec![Vec::new()]
    } else {
        let key_columns: Vec<String> = layout
            .partition_axes()
            .iter()
            .map(|a| a.id.clone())
            .collect();
        backend.distinct(intermediate, &key_columns)?
    };

    let mut written = Vec::with_capacity(keys.len());
    for (index, key) in keys.into_iter().enumerate() {
        let mut query = FileQuery::select(layout.stored_columns()).sort_by(layout.stored_axis_ids());
        for (axis, value) in layout.partition_axes().iter().zip(&key) {
            query = query.filter_eq(axis.id.clone(), value.clone());
        }

        let table = backend.query(intermediate, &query)?;
        let file_name = partition_file_name(index);
        let metadata = backend.write(&table, &frame_dir.join(&file_name), options)?;

        tracing::debug!(
            partition = %file_name,
            key = %encode_part_key(&key),
            rows = metadata.row_count,
            "Wrote partition"
        );

        written.push(WrittenPartition {
            file_name,
            key,
            metadata,
        });
    }

    Ok(written)
}

/// Hash a written partition and build one `DataInfoPart` per value column.
///
/// The axes digest and axis byte sizes are computed once and shared by
/// every column of the partition.
pub fn describe_partition(
    backend: &dyn ColumnarBackend,
    frame_dir: &Path,
    partition: &WrittenPartition,
    layout: &FrameLayout,
) -> Result<Vec<DataInfoPart>> {
    let batch = backend
        .read(&frame_dir.join(&partition.file_name), None)?
        .concat()?;

    let stored_axes = layout.stored_axis_ids();
    let axis_arrays = stored_axes
        .iter()
        .map(|id| pframe_core::table::column_by_name(&batch, id))
        .collect::<pframe_core::Result<Vec<_>>>()?;
    let axes_hash = hash_rows(&axis_arrays)?;

    let axis_bytes = stored_axes
        .iter()
        .map(|id| -> Result<u64> { Ok(partition.metadata.column(id)?.compressed_bytes) })
        .collect::<Result<Vec<_>>>()?;

    layout
        .columns
        .iter()
        .map(|column| -> Result<DataInfoPart> {
            let values = pframe_core::table::column_by_name(&batch, &column.id)?;
            let column_hash = hash_rows(&[values])?;
            let digest = data_digest(&axes_hash, &column_hash);

            tracing::debug!(
                partition = %partition.file_name,
                column = %column.id,
                digest = %digest,
                "Hashed column"
            );

            Ok(DataInfoPart {
                data: partition.file_name.clone(),
                axes: layout.stored_axes().to_vec(),
                column: column.clone(),
                data_digest: digest,
                stats: PartStats {
                    number_of_rows: partition.metadata.row_count,
                    number_of_bytes: ByteStats {
                        axes: axis_bytes.clone(),
                        column: partition.metadata.column(&column.id)?.compressed_bytes,
                    },
                },
            })
        })
        .collect()
}
