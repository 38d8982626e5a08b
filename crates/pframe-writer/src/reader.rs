//! Frame reader: rebuild a table from a frame directory
//!
//! Each requested column is loaded from its own partitions, with the
//! partitioning axes restored from the part keys. Columns are then
//! full-outer-joined on the complete axis tuple; a tuple missing from a
//! column yields null there. Output rows are ordered by the axis tuple.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{new_null_array, Array, ArrayRef, Int32Array, Int64Array, RecordBatch, StringArray};
use arrow::compute::interleave;
use arrow::datatypes::{Field, Schema};
use pframe_core::{decode_part_key, encode_part_key, AxisSpec, AxisType, AxisValue, ColumnSpecFile, DataInfo, Table};

use crate::backend::ColumnarBackend;
use crate::error::{FrameError, Result};
use crate::layout::{datainfo_path, spec_path, validate_column_id};

/// One column loaded from all of its partitions
struct LoadedColumn {
    spec: ColumnSpecFile,
    partition_key_length: usize,
    /// Value arrays, one per partition file
    pieces: Vec<ArrayRef>,
    /// Full axis tuple -> (piece, row)
    rows: BTreeMap<Vec<AxisValue>, (usize, usize)>,
}

fn read_json_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| FrameError::io(path, e))
}

/// Read `columns` from the frame at `frame_dir`.
pub fn read_frame(
    backend: &dyn ColumnarBackend,
    frame_dir: &Path,
    columns: &[String],
) -> Result<Table> {
    if columns.is_empty() {
        return Err(FrameError::invalid_request(
            "at least one column must be requested",
        ));
    }
    for column in columns {
        validate_column_id(column)?;
    }
    if !frame_dir.is_dir() {
        return Err(FrameError::workflow(format!(
            "'{}' is not an existing directory",
            frame_dir.display()
        )));
    }

    let loaded = columns
        .iter()
        .map(|column| load_column(backend, frame_dir, column))
        .collect::<Result<Vec<_>>>()?;

    let axes = loaded[0].spec.axes.clone();
    if let Some(other) = loaded.iter().find(|c| c.spec.axes != axes) {
        return Err(FrameError::workflow(format!(
            "column '{}' does not share the axes of column '{}'",
            other.spec.column.id, loaded[0].spec.column.id
        )));
    }
    let partition_key_length = loaded[0].partition_key_length;
    if let Some(other) = loaded
        .iter()
        .find(|c| c.partition_key_length != partition_key_length)
    {
        return Err(FrameError::workflow(format!(
            "column '{}' has partition key length {} but column '{}' has {}",
            other.spec.column.id,
            other.partition_key_length,
            loaded[0].spec.column.id,
            partition_key_length
        )));
    }

    let keys: BTreeSet<&Vec<AxisValue>> = loaded.iter().flat_map(|c| c.rows.keys()).collect();

    let mut fields = Vec::with_capacity(axes.len() + loaded.len());
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(axes.len() + loaded.len());
    for (position, axis) in axes.iter().enumerate() {
        fields.push(Field::new(&axis.id, axis.axis_type.data_type(), true));
        arrays.push(axis_array(axis, keys.iter().map(|key| &key[position]))?);
    }
    for column in &loaded {
        let spec = &column.spec.column;
        let data_type = spec.value_type.data_type();
        fields.push(Field::new(&spec.id, data_type.clone(), true));

        // The trailing one-element null array stands in for missing tuples.
        let missing = new_null_array(&data_type, 1);
        let mut sources: Vec<&dyn Array> = column.pieces.iter().map(|p| p.as_ref()).collect();
        let null_source = sources.len();
        sources.push(missing.as_ref());

        let indices: Vec<(usize, usize)> = keys
            .iter()
            .map(|key| column.rows.get(*key).copied().unwrap_or((null_source, 0)))
            .collect();
        let values = interleave(&sources, &indices).map_err(|e| {
            FrameError::backend(format!("joining column '{}'", spec.id), e)
        })?;
        arrays.push(values);
    }

    let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)
        .map_err(|e| FrameError::backend("assembling frame table", e))?;

    tracing::debug!(
        frame = %frame_dir.display(),
        columns = loaded.len(),
        rows = batch.num_rows(),
        "Read frame"
    );
    Ok(Table::from_batch(batch))
}

fn load_column(
    backend: &dyn ColumnarBackend,
    frame_dir: &Path,
    column: &str,
) -> Result<LoadedColumn> {
    let spec = ColumnSpecFile::from_json_slice(&read_json_file(&spec_path(frame_dir, column))?)?;
    let info = DataInfo::from_json_slice(&read_json_file(&datainfo_path(frame_dir, column))?)?;

    let k = info.partition_key_length;
    if k >= spec.axes.len() {
        return Err(FrameError::workflow(format!(
            "column '{}' has partition key length {} but only {} axes",
            column,
            k,
            spec.axes.len()
        )));
    }
    let (partition_axes, stored_axes) = spec.axes.split_at(k);

    let mut pieces = Vec::with_capacity(info.parts.len());
    let mut rows = BTreeMap::new();
    for (part_key, part) in &info.parts {
        let prefix = decode_part_key(part_key, partition_axes)?;

        let mut names: Vec<String> = stored_axes.iter().map(|a| a.id.clone()).collect();
        names.push(column.to_string());
        let batch = backend
            .read(&frame_dir.join(&part.data), Some(&names))?
            .concat()?;

        let piece = pieces.len();
        for row in 0..batch.num_rows() {
            let mut key = prefix.clone();
            for (index, axis) in stored_axes.iter().enumerate() {
                key.push(AxisValue::from_array(batch.column(index).as_ref(), row, &axis.id)?);
            }
            match rows.entry(key) {
                Entry::Vacant(slot) => {
                    slot.insert((piece, row));
                }
                Entry::Occupied(slot) => {
                    return Err(FrameError::duplicate_axis_key(encode_part_key(slot.key()), 1));
                }
            }
        }
        pieces.push(Arc::clone(batch.column(stored_axes.len())));
    }

    Ok(LoadedColumn {
        spec,
        partition_key_length: k,
        pieces,
        rows,
    })
}

fn axis_array<'a>(
    axis: &AxisSpec,
    values: impl Iterator<Item = &'a AxisValue>,
) -> Result<ArrayRef> {
    let mismatch = |value: &AxisValue| {
        FrameError::from(pframe_core::CoreError::AxisTypeMismatch {
            axis: axis.id.clone(),
            found: format!("{:?}", value),
        })
    };

    let array: ArrayRef = match axis.axis_type {
        AxisType::Int => Arc::new(
            values
                .map(|v| match v {
                    AxisValue::Int(i) => Ok(Some(*i)),
                    other => Err(mismatch(other)),
                })
                .collect::<Result<Int32Array>>()?,
        ),
        AxisType::Long => Arc::new(
            values
                .map(|v| match v {
                    AxisValue::Long(i) => Ok(Some(*i)),
                    other => Err(mismatch(other)),
                })
                .collect::<Result<Int64Array>>()?,
        ),
        AxisType::String => Arc::new(
            values
                .map(|v| match v {
                    AxisValue::String(s) => Ok(Some(s.as_str())),
                    other => Err(mismatch(other)),
                })
                .collect::<Result<StringArray>>()?,
        ),
    };
    Ok(array)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::LocalParquetBackend;
    use crate::error::ErrorCode;
    use arrow::array::Float64Array;
    use pframe_core::{ByteStats, ColumnSpec, ColumnType, DataInfoPart, ParquetOptions, PartStats};

    fn long(id: &str) -> AxisSpec {
        AxisSpec::new(id, AxisType::Long)
    }

    fn value(id: &str) -> ColumnSpec {
        ColumnSpec::new(id, ColumnType::Double)
    }

    fn part(data: &str, axes: Vec<AxisSpec>, column: ColumnSpec) -> DataInfoPart {
        DataInfoPart {
            data: data.to_string(),
            axes,
            column,
            data_digest: "0".repeat(64),
            stats: PartStats {
                number_of_rows: 0,
                number_of_bytes: ByteStats {
                    axes: vec![0],
                    column: 0,
                },
            },
        }
    }

    fn write_metadata(frame_dir: &Path, column: &ColumnSpec, axes: &[AxisSpec], info: &DataInfo) {
        let spec = ColumnSpecFile {
            column: column.clone(),
            axes: axes.to_vec(),
        };
        fs::write(spec_path(frame_dir, &column.id), spec.to_json_bytes().unwrap()).unwrap();
        fs::write(datainfo_path(frame_dir, &column.id), info.to_json_bytes().unwrap()).unwrap();
    }

    fn read(frame_dir: &Path, columns: &[&str]) -> Result<Table> {
        let columns: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
        read_frame(&LocalParquetBackend::new(), frame_dir, &columns)
    }

    #[test]
    fn test_columns_must_share_axes() {
        let dir = tempfile::tempdir().unwrap();
        write_metadata(dir.path(), &value("a"), &[long("x")], &DataInfo::new(0));
        write_metadata(dir.path(), &value("b"), &[long("y")], &DataInfo::new(0));

        let err = read(dir.path(), &["a", "b"]).unwrap_err();
        assert_eq!(err.code(), ErrorCode::E006Workflow);
        assert!(err
            .to_string()
            .contains("column 'b' does not share the axes of column 'a'"));
    }

    #[test]
    fn test_columns_must_share_partition_key_length() {
        let dir = tempfile::tempdir().unwrap();
        let axes = [long("x"), long("y")];
        write_metadata(dir.path(), &value("a"), &axes, &DataInfo::new(0));
        write_metadata(dir.path(), &value("b"), &axes, &DataInfo::new(1));

        let err = read(dir.path(), &["a", "b"]).unwrap_err();
        assert_eq!(err.code(), ErrorCode::E006Workflow);
        assert!(err
            .to_string()
            .contains("column 'b' has partition key length 1 but column 'a' has 0"));
    }

    #[test]
    fn test_partition_key_length_must_leave_an_axis() {
        let dir = tempfile::tempdir().unwrap();
        write_metadata(dir.path(), &value("a"), &[long("x")], &DataInfo::new(1));

        let err = read(dir.path(), &["a"]).unwrap_err();
        assert_eq!(err.code(), ErrorCode::E006Workflow);
        assert!(err.to_string().contains("partition key length 1 but only 1 axes"));
    }

    #[test]
    fn test_undecodable_part_key() {
        let dir = tempfile::tempdir().unwrap();
        let mut info = DataInfo::new(1);
        info.parts.insert(
            r#"["text"]"#.to_string(),
            part("partition_0.parquet", vec![long("y")], value("a")),
        );
        write_metadata(dir.path(), &value("a"), &[long("x"), long("y")], &info);

        let err = read(dir.path(), &["a"]).unwrap_err();
        assert_eq!(err.code(), ErrorCode::E005Backend);
        assert!(err.to_string().contains(r#"invalid part key '["text"]'"#));
    }

    #[test]
    fn test_repeated_axis_tuple_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let schema = Arc::new(Schema::new(vec![
            Field::new("x", arrow::datatypes::DataType::Int64, true),
            Field::new("a", arrow::datatypes::DataType::Float64, true),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(vec![1, 1])),
                Arc::new(Float64Array::from(vec![1.0, 2.0])),
            ],
        )
        .unwrap();
        LocalParquetBackend::new()
            .write(
                &Table::from_batch(batch),
                &dir.path().join("partition_0.parquet"),
                &ParquetOptions::default(),
            )
            .unwrap();

        let mut info = DataInfo::new(0);
        info.parts.insert(
            "[]".to_string(),
            part("partition_0.parquet", vec![long("x")], value("a")),
        );
        write_metadata(dir.path(), &value("a"), &[long("x")], &info);

        let err = read(dir.path(), &["a"]).unwrap_err();
        assert_eq!(err.code(), ErrorCode::E002DataIntegrity);
        assert!(err.to_string().contains("[1]"));
    }

    #[test]
    fn test_column_names_are_checked_before_io() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent");

        let err = read(&missing, &["../escaped"]).unwrap_err();
        assert_eq!(err.code(), ErrorCode::E001InvalidRequest);

        let err = read(&missing, &[]).unwrap_err();
        assert_eq!(err.code(), ErrorCode::E001InvalidRequest);

        let err = read(&missing, &["a"]).unwrap_err();
        assert!(err.to_string().contains("is not an existing directory"));
    }
}
