//! Per-column frame metadata (`<column>.datainfo`) and spec sidecars
//!
//! The JSON layout is fixed: struct fields serialize in declaration order
//! and `parts` is a `BTreeMap`, so equal content always encodes to equal
//! bytes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::types::{AxisSpec, AxisValue, ColumnSpec};

/// File extension of per-column metadata files
pub const DATAINFO_EXTENSION: &str = "datainfo";
/// File extension of per-column spec sidecars
pub const SPEC_EXTENSION: &str = "spec";

/// Metadata of one value column: how its data is spread over partition files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataInfo {
    pub partition_key_length: usize,
    pub parts: BTreeMap<String, DataInfoPart>,
}

/// Reference to one partition file from a column's point of view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataInfoPart {
    /// Partition file name, relative to the frame directory
    pub data: String,
    /// Non-partitioning axes stored inside the partition file
    pub axes: Vec<AxisSpec>,
    pub column: ColumnSpec,
    pub data_digest: String,
    pub stats: PartStats,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartStats {
    pub number_of_rows: u64,
    pub number_of_bytes: ByteStats,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByteStats {
    pub axes: Vec<u64>,
    pub column: u64,
}

impl DataInfo {
    pub fn new(partition_key_length: usize) -> Self {
        Self {
            partition_key_length,
            parts: BTreeMap::new(),
        }
    }

    pub fn to_json_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_json_slice(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Sidecar describing a column together with the frame's full axis list.
///
/// Datainfo only records non-partitioning axes, so readers need this to
/// restore the types of partitioning axis values from part keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpecFile {
    pub column: ColumnSpec,
    pub axes: Vec<AxisSpec>,
}

impl ColumnSpecFile {
    pub fn to_json_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_json_slice(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Encode partition key values as a compact JSON array (`[]` for no key).
pub fn encode_part_key(values: &[AxisValue]) -> String {
    let json = serde_json::Value::Array(values.iter().map(AxisValue::to_json).collect());
    json.to_string()
}

/// Decode a part key, typing each element by the matching partitioning axis.
pub fn decode_part_key(key: &str, axes: &[AxisSpec]) -> Result<Vec<AxisValue>> {
    let invalid = |reason: String| CoreError::InvalidPartKey {
        key: key.to_string(),
        reason,
    };

    let elements: Vec<serde_json::Value> =
        serde_json::from_str(key).map_err(|e| invalid(e.to_string()))?;
    if elements.len() != axes.len() {
        return Err(invalid(format!(
            "expected {} elements, found {}",
            axes.len(),
            elements.len()
        )));
    }

    elements
        .iter()
        .zip(axes)
        .map(|(element, axis)| {
            AxisValue::from_json(element, axis.axis_type).ok_or_else(|| {
                invalid(format!(
                    "value {} does not fit axis '{}' of type {:?}",
                    element, axis.id, axis.axis_type
                ))
            })
        })
        .collect()
}

/// Accumulates parts for every value column of a frame.
#[derive(Debug)]
pub struct FrameMetadataBuilder {
    columns: Vec<(ColumnSpec, DataInfo)>,
}

impl FrameMetadataBuilder {
    pub fn new(partition_key_length: usize, columns: &[ColumnSpec]) -> Self {
        Self {
            columns: columns
                .iter()
                .map(|c| (c.clone(), DataInfo::new(partition_key_length)))
                .collect(),
        }
    }

    /// Register one partition: `parts` holds one entry per value column, in
    /// column order.
    pub fn add_partition(&mut self, part_key: &str, parts: Vec<DataInfoPart>) -> Result<()> {
        if parts.len() != self.columns.len() {
            return Err(CoreError::PartMismatch {
                key: part_key.to_string(),
                reason: format!(
                    "expected {} column part(s), got {}",
                    self.columns.len(),
                    parts.len()
                ),
            });
        }
        for ((spec, info), part) in self.columns.iter_mut().zip(parts) {
            if part.column.id != spec.id {
                return Err(CoreError::PartMismatch {
                    key: part_key.to_string(),
                    reason: format!("part for '{}' given in place of '{}'", part.column.id, spec.id),
                });
            }
            info.parts.insert(part_key.to_string(), part);
        }
        Ok(())
    }

    pub fn finish(self) -> Vec<(ColumnSpec, DataInfo)> {
        self.columns
    }
}
