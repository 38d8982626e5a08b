//! Error types for the pure frame logic

use arrow::error::ArrowError;
use thiserror::Error;

/// Errors raised while shaping tables, hashing partitions or handling metadata
#[derive(Debug, Error)]
pub enum CoreError {
    /// A referenced column is not part of the table schema
    #[error("column '{column}' not found; available columns: {available:?}")]
    MissingColumn {
        column: String,
        available: Vec<String>,
    },

    /// Strict cast of a column failed
    #[error("failed to cast column '{column}' to {target}: {source}")]
    Cast {
        column: String,
        target: String,
        #[source]
        source: ArrowError,
    },

    /// Any other Arrow kernel failure
    #[error("{context}: {source}")]
    Arrow {
        context: String,
        #[source]
        source: ArrowError,
    },

    /// An axis value was null where a key was required
    #[error("axis '{axis}' has a null value at row {row}")]
    NullAxisValue { axis: String, row: usize },

    /// Array type does not match the declared axis type
    #[error("axis '{axis}' has unexpected data type {found}")]
    AxisTypeMismatch { axis: String, found: String },

    /// Part key could not be decoded
    #[error("invalid part key '{key}': {reason}")]
    InvalidPartKey { key: String, reason: String },

    /// Partition parts do not line up with the frame's value columns
    #[error("parts for key '{key}' do not match the frame columns: {reason}")]
    PartMismatch { key: String, reason: String },

    /// Metadata (de)serialization failure
    #[error("metadata encoding failed: {0}")]
    Metadata(#[from] serde_json::Error),
}

impl CoreError {
    pub(crate) fn arrow(context: impl Into<String>, source: ArrowError) -> Self {
        Self::Arrow {
            context: context.into(),
            source,
        }
    }
}

/// Result type alias for CoreError
pub type Result<T> = std::result::Result<T, CoreError>;
