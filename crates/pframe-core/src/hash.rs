//! Content digests for partition data
//!
//! Algorithm `pframe-digest-v1`:
//! - each value is cast to its Arrow UTF-8 string form, null is the single
//!   byte `0x00`;
//! - fields of a row are separated by `0x1F` and each row ends with `0x1E`;
//! - `axes_hash` covers the non-partitioning axes of a partition,
//!   `column_hash` covers one value column;
//! - `data_digest = hex(blake3(axes_hash ‖ column_hash))` over the raw
//!   32-byte hashes.
//!
//! Readers comparing digests across frames must agree on this exact layout.

use arrow::array::{Array, ArrayRef, AsArray, StringArray};
use arrow::compute::cast;
use arrow::datatypes::DataType;

use crate::error::{CoreError, Result};
use crate::types::Blake3Hash;

/// Identifier of the digest layout written into frame metadata
pub const DIGEST_ALGORITHM: &str = "pframe-digest-v1";

const NULL_MARKER: u8 = 0x00;
const FIELD_SEPARATOR: u8 = 0x1F;
const ROW_TERMINATOR: u8 = 0x1E;

/// Hash the row-wise concatenation of the given columns.
///
/// All columns must have the same length.
pub fn hash_rows(columns: &[&ArrayRef]) -> Result<Blake3Hash> {
    let strings = columns
        .iter()
        .map(|column| {
            cast(column.as_ref(), &DataType::Utf8)
                .map_err(|e| CoreError::arrow("failed to cast column to string for hashing", e))
        })
        .collect::<Result<Vec<_>>>()?;
    let strings: Vec<&StringArray> = strings.iter().map(|s| s.as_string::<i32>()).collect();

    let num_rows = strings.first().map(|s| s.len()).unwrap_or(0);
    if let Some(short) = strings.iter().find(|s| s.len() != num_rows) {
        return Err(CoreError::arrow(
            "columns hashed together must have equal length",
            arrow::error::ArrowError::InvalidArgumentError(format!(
                "expected {} rows, found {}",
                num_rows,
                short.len()
            )),
        ));
    }

    let mut hasher = blake3::Hasher::new();
    for row in 0..num_rows {
        for (i, column) in strings.iter().enumerate() {
            if i > 0 {
                hasher.update(&[FIELD_SEPARATOR]);
            }
            if column.is_null(row) {
                hasher.update(&[NULL_MARKER]);
            } else {
                hasher.update(column.value(row).as_bytes());
            }
        }
        hasher.update(&[ROW_TERMINATOR]);
    }

    Ok(Blake3Hash::new(*hasher.finalize().as_bytes()))
}

/// Combine an axes hash and a column hash into the digest stored in metadata.
pub fn data_digest(axes_hash: &Blake3Hash, column_hash: &Blake3Hash) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(axes_hash.as_bytes());
    hasher.update(column_hash.as_bytes());
    hex::encode(hasher.finalize().as_bytes())
}
