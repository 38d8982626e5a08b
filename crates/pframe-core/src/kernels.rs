//! Arrow kernels used to shape a table before and while it is partitioned
//!
//! Every function takes a single `RecordBatch` and returns a new one; the
//! caller concatenates multi-batch tables first.

use std::collections::BTreeSet;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, BooleanArray, RecordBatch, UInt32Array};
use arrow::compute::kernels::cmp::eq;
use arrow::compute::{
    and, cast_with_options, filter_record_batch, is_not_null, lexsort_to_indices, partition,
    take, CastOptions, SortColumn, SortOptions,
};
use arrow::datatypes::{DataType, Field, Schema};

use crate::error::{CoreError, Result};
use crate::table::column_by_name;
use crate::types::{AxisSpec, AxisValue, ColumnSpec};

/// Select `axes ++ columns` from `batch`, casting each to its declared type.
///
/// Axis casts are strict and fail on the first unconvertible value. Column
/// casts are lenient: values that cannot be converted become null.
pub fn project_and_cast(
    batch: &RecordBatch,
    axes: &[AxisSpec],
    columns: &[ColumnSpec],
) -> Result<RecordBatch> {
    let mut fields = Vec::with_capacity(axes.len() + columns.len());
    let mut arrays = Vec::with_capacity(axes.len() + columns.len());

    let strict = CastOptions {
        safe: false,
        ..Default::default()
    };
    let lenient = CastOptions {
        safe: true,
        ..Default::default()
    };

    for axis in axes {
        let target = axis.axis_type.data_type();
        arrays.push(cast_column(batch, &axis.id, &target, &strict)?);
        fields.push(Field::new(&axis.id, target, true));
    }
    for column in columns {
        let target = column.value_type.data_type();
        arrays.push(cast_column(batch, &column.id, &target, &lenient)?);
        fields.push(Field::new(&column.id, target, true));
    }

    RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)
        .map_err(|e| CoreError::arrow("failed to assemble projected batch", e))
}

fn cast_column(
    batch: &RecordBatch,
    name: &str,
    target: &DataType,
    options: &CastOptions<'_>,
) -> Result<ArrayRef> {
    let source = column_by_name(batch, name)?;
    cast_with_options(source, target, options).map_err(|source| CoreError::Cast {
        column: name.to_string(),
        target: target.to_string(),
        source,
    })
}

/// Drop every row holding a null in any of the named key columns.
pub fn drop_null_keys(batch: &RecordBatch, keys: &[String]) -> Result<RecordBatch> {
    let mut mask: Option<BooleanArray> = None;
    for key in keys {
        let column = column_by_name(batch, key)?;
        if column.null_count() == 0 {
            continue;
        }
        let present = is_not_null(column.as_ref())
            .map_err(|e| CoreError::arrow(format!("null check on '{}'", key), e))?;
        mask = Some(match mask {
            Some(acc) => and(&acc, &present)
                .map_err(|e| CoreError::arrow("combining null masks", e))?,
            None => present,
        });
    }

    match mask {
        Some(mask) => filter_record_batch(batch, &mask)
            .map_err(|e| CoreError::arrow("failed to drop rows with null keys", e)),
        None => Ok(batch.clone()),
    }
}

/// Sort ascending by the named columns, nulls last.
pub fn sort_by(batch: &RecordBatch, keys: &[String]) -> Result<RecordBatch> {
    if keys.is_empty() || batch.num_rows() < 2 {
        return Ok(batch.clone());
    }

    let sort_columns = keys
        .iter()
        .map(|key| {
            Ok(SortColumn {
                values: Arc::clone(column_by_name(batch, key)?),
                options: Some(SortOptions {
                    descending: false,
                    nulls_first: false,
                }),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let indices = lexsort_to_indices(&sort_columns, None)
        .map_err(|e| CoreError::arrow("failed to compute sort order", e))?;

    reorder(batch, &indices)
}

fn reorder(batch: &RecordBatch, indices: &UInt32Array) -> Result<RecordBatch> {
    let columns = batch
        .columns()
        .iter()
        .map(|c| take(c.as_ref(), indices, None))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| CoreError::arrow("failed to apply sort permutation", e))?;

    RecordBatch::try_new(batch.schema(), columns)
        .map_err(|e| CoreError::arrow("failed to build sorted batch", e))
}

/// Find rows of a batch sorted by `keys` whose key repeats the previous row.
///
/// Returns the first repeating row and how many rows repeat, or `None` when
/// every key tuple is unique. Nulls compare equal to each other.
pub fn repeated_keys(batch: &RecordBatch, keys: &[String]) -> Result<Option<(usize, usize)>> {
    if keys.is_empty() || batch.num_rows() < 2 {
        return Ok(None);
    }

    let columns = keys
        .iter()
        .map(|key| column_by_name(batch, key).map(Arc::clone))
        .collect::<Result<Vec<ArrayRef>>>()?;
    let runs = partition(&columns)
        .map_err(|e| CoreError::arrow("failed to find equal key runs", e))?;

    let mut first = None;
    let mut count = 0;
    for run in runs.ranges() {
        if run.len() > 1 {
            first.get_or_insert(run.start + 1);
            count += run.len() - 1;
        }
    }
    Ok(first.map(|row| (row, count)))
}

/// Keep rows where every `(column, value)` pair compares equal.
///
/// Values are compared as typed scalars, never spliced into query text.
pub fn filter_equal(batch: &RecordBatch, predicates: &[(String, AxisValue)]) -> Result<RecordBatch> {
    let mut mask: Option<BooleanArray> = None;
    for (name, value) in predicates {
        let column = column_by_name(batch, name)?;
        let matches = eq(column, &value.to_scalar())
            .map_err(|e| CoreError::arrow(format!("equality filter on '{}'", name), e))?;
        mask = Some(match mask {
            Some(acc) => {
                and(&acc, &matches).map_err(|e| CoreError::arrow("combining filters", e))?
            }
            None => matches,
        });
    }

    match mask {
        Some(mask) => filter_record_batch(batch, &mask)
            .map_err(|e| CoreError::arrow("failed to apply equality filter", e)),
        None => Ok(batch.clone()),
    }
}

/// Project the named columns, in the given order.
pub fn select(batch: &RecordBatch, names: &[String]) -> Result<RecordBatch> {
    let schema = batch.schema();
    let indices = names
        .iter()
        .map(|name| {
            schema
                .index_of(name)
                .map_err(|_| crate::table::missing_column(&schema, name))
        })
        .collect::<Result<Vec<_>>>()?;

    batch
        .project(&indices)
        .map_err(|e| CoreError::arrow("failed to project columns", e))
}

/// Distinct key tuples over the named columns, in ascending tuple order.
pub fn distinct_tuples(batch: &RecordBatch, names: &[String]) -> Result<Vec<Vec<AxisValue>>> {
    let columns = names
        .iter()
        .map(|name| column_by_name(batch, name))
        .collect::<Result<Vec<_>>>()?;

    let mut tuples = BTreeSet::new();
    for row in 0..batch.num_rows() {
        let tuple = columns
            .iter()
            .zip(names)
            .map(|(column, name)| AxisValue::from_array(column.as_ref(), row, name))
            .collect::<Result<Vec<_>>>()?;
        tuples.insert(tuple);
    }

    Ok(tuples.into_iter().collect())
}
