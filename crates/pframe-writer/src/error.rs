//! Error types for frame writing and workflow execution

use pframe_core::CoreError;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error codes for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// E001: Request rejected before any I/O
    E001InvalidRequest,
    /// E002: Axis data unusable as keys (strict-mode nulls, repeated tuples)
    E002DataIntegrity,
    /// E003: Target frame directory already exists
    E003FrameExists,
    /// E004: Filesystem operation failed
    E004Io,
    /// E005: Columnar backend or metadata encoding failed
    E005Backend,
    /// E006: Workflow or table space misuse
    E006Workflow,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::E001InvalidRequest => "E001",
            Self::E002DataIntegrity => "E002",
            Self::E003FrameExists => "E003",
            Self::E004Io => "E004",
            Self::E005Backend => "E005",
            Self::E006Workflow => "E006",
        }
    }
}

/// Errors that can occur while executing workflow steps
#[derive(Debug, Error)]
pub enum FrameError {
    /// Configuration error in a step request
    #[error("[{code}] Invalid request: {message}")]
    InvalidRequest { code: &'static str, message: String },

    /// Strict mode found null values in an axis column
    #[error("[{code}] Axis '{axis}' contains {null_count} null value(s)")]
    NullAxisValues {
        code: &'static str,
        axis: String,
        null_count: u64,
    },

    /// Several rows share one full axis tuple
    #[error("[{code}] {count} row(s) repeat an axis key; first repeated key: {key}")]
    DuplicateAxisKey {
        code: &'static str,
        key: String,
        count: usize,
    },

    /// Frame directory already exists
    #[error("[{code}] Frame directory '{}' already exists", path.display())]
    FrameExists { code: &'static str, path: PathBuf },

    /// Filesystem failure
    #[error("[{code}] I/O failure on '{}': {source}", path.display())]
    Io {
        code: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Columnar backend failure
    #[error("[{code}] Backend failure while {context}: {reason}")]
    Backend {
        code: &'static str,
        context: String,
        reason: String,
    },

    /// Workflow or table space misuse
    #[error("[{code}] Workflow error: {message}")]
    Workflow { code: &'static str, message: String },

    /// Failure inside the pure table/metadata logic
    #[error("[E005] {0}")]
    Core(#[from] CoreError),
}

impl FrameError {
    /// Create an invalid request error with error code
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            code: ErrorCode::E001InvalidRequest.as_str(),
            message: message.into(),
        }
    }

    /// Create a null axis error with error code
    pub fn null_axis_values(axis: impl Into<String>, null_count: u64) -> Self {
        Self::NullAxisValues {
            code: ErrorCode::E002DataIntegrity.as_str(),
            axis: axis.into(),
            null_count,
        }
    }

    /// Create a duplicate axis key error with error code
    pub fn duplicate_axis_key(key: impl Into<String>, count: usize) -> Self {
        Self::DuplicateAxisKey {
            code: ErrorCode::E002DataIntegrity.as_str(),
            key: key.into(),
            count,
        }
    }

    /// Create a frame exists error with error code
    pub fn frame_exists(path: impl Into<PathBuf>) -> Self {
        Self::FrameExists {
            code: ErrorCode::E003FrameExists.as_str(),
            path: path.into(),
        }
    }

    /// Create an I/O error with error code
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            code: ErrorCode::E004Io.as_str(),
            path: path.to_path_buf(),
            source,
        }
    }

    /// Create a backend error with error code
    pub fn backend(context: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Backend {
            code: ErrorCode::E005Backend.as_str(),
            context: context.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a workflow error with error code
    pub fn workflow(message: impl Into<String>) -> Self {
        Self::Workflow {
            code: ErrorCode::E006Workflow.as_str(),
            message: message.into(),
        }
    }

    /// Error code for programmatic handling
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidRequest { .. } => ErrorCode::E001InvalidRequest,
            Self::NullAxisValues { .. } | Self::DuplicateAxisKey { .. } => {
                ErrorCode::E002DataIntegrity
            }
            Self::FrameExists { .. } => ErrorCode::E003FrameExists,
            Self::Io { .. } => ErrorCode::E004Io,
            Self::Backend { .. } | Self::Core(_) => ErrorCode::E005Backend,
            Self::Workflow { .. } => ErrorCode::E006Workflow,
        }
    }
}

/// Result type alias for FrameError
pub type Result<T> = std::result::Result<T, FrameError>;
