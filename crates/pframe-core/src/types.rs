//! Shared types describing frame axes, value columns and key values

use std::fmt;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, Int32Array, Int64Array, Scalar, StringArray};
use arrow::datatypes::{DataType, Int32Type, Int64Type};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Primitive type of an axis (key) column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AxisType {
    Int,
    Long,
    String,
}

impl AxisType {
    pub fn data_type(&self) -> DataType {
        match self {
            Self::Int => DataType::Int32,
            Self::Long => DataType::Int64,
            Self::String => DataType::Utf8,
        }
    }
}

/// Primitive type of a value column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    Int,
    Long,
    Float,
    Double,
    String,
}

impl ColumnType {
    pub fn data_type(&self) -> DataType {
        match self {
            Self::Int => DataType::Int32,
            Self::Long => DataType::Int64,
            Self::Float => DataType::Float32,
            Self::Double => DataType::Float64,
            Self::String => DataType::Utf8,
        }
    }
}

/// Axis identifier plus type. Axis order inside a frame is significant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AxisSpec {
    pub id: String,
    #[serde(rename = "type")]
    pub axis_type: AxisType,
}

impl AxisSpec {
    pub fn new(id: impl Into<String>, axis_type: AxisType) -> Self {
        Self {
            id: id.into(),
            axis_type,
        }
    }
}

/// Value column identifier plus type
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub id: String,
    #[serde(rename = "type")]
    pub value_type: ColumnType,
}

impl ColumnSpec {
    pub fn new(id: impl Into<String>, value_type: ColumnType) -> Self {
        Self {
            id: id.into(),
            value_type,
        }
    }
}

/// A single non-null axis value.
///
/// Ordering follows the natural order of the wrapped value, which is also
/// the order partitions are enumerated in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AxisValue {
    Int(i32),
    Long(i64),
    String(String),
}

impl AxisValue {
    /// Read the value at `row` of an axis array.
    pub fn from_array(array: &dyn Array, row: usize, axis: &str) -> Result<Self> {
        if array.is_null(row) {
            return Err(CoreError::NullAxisValue {
                axis: axis.to_string(),
                row,
            });
        }

        match array.data_type() {
            DataType::Int32 => Ok(Self::Int(array.as_primitive::<Int32Type>().value(row))),
            DataType::Int64 => Ok(Self::Long(array.as_primitive::<Int64Type>().value(row))),
            DataType::Utf8 => Ok(Self::String(array.as_string::<i32>().value(row).to_string())),
            DataType::LargeUtf8 => Ok(Self::String(
                array.as_string::<i64>().value(row).to_string(),
            )),
            other => Err(CoreError::AxisTypeMismatch {
                axis: axis.to_string(),
                found: other.to_string(),
            }),
        }
    }

    /// Decode a JSON part key element according to the axis type.
    pub fn from_json(value: &serde_json::Value, axis_type: AxisType) -> Option<Self> {
        match axis_type {
            AxisType::Int => value
                .as_i64()
                .and_then(|v| i32::try_from(v).ok())
                .map(Self::Int),
            AxisType::Long => value.as_i64().map(Self::Long),
            AxisType::String => value.as_str().map(|s| Self::String(s.to_string())),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Int(v) => serde_json::Value::from(*v),
            Self::Long(v) => serde_json::Value::from(*v),
            Self::String(v) => serde_json::Value::String(v.clone()),
        }
    }

    /// One-element scalar usable as the right-hand side of comparison kernels.
    pub fn to_scalar(&self) -> Scalar<ArrayRef> {
        let array: ArrayRef = match self {
            Self::Int(v) => Arc::new(Int32Array::from(vec![*v])),
            Self::Long(v) => Arc::new(Int64Array::from(vec![*v])),
            Self::String(v) => Arc::new(StringArray::from(vec![v.as_str()])),
        };
        Scalar::new(array)
    }
}

impl fmt::Display for AxisValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{}", v),
            Self::Long(v) => write!(f, "{}", v),
            Self::String(v) => write!(f, "{:?}", v),
        }
    }
}

/// Blake3 content hash for deduplication
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Blake3Hash([u8; 32]);

impl Blake3Hash {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}
