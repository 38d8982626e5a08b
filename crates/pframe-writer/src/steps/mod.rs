//! Workflow steps
//!
//! A closed set of step kinds, deserialized from JSON objects tagged by
//! `"type"` and dispatched by `match`.

mod io;
mod read_frame;
mod write_frame;

pub use io::{ReadCsv, WriteCsv};
pub use read_frame::ReadFrame;
pub use write_frame::WriteFrame;

use serde::{Deserialize, Serialize};

use crate::backend::ColumnarBackend;
use crate::context::ExecutionContext;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Step {
    ReadCsv(ReadCsv),
    WriteCsv(WriteCsv),
    WriteFrame(WriteFrame),
    ReadFrame(ReadFrame),
}

impl Step {
    pub fn kind(&self) -> &'static str {
        match self {
            Step::ReadCsv(_) => "read_csv",
            Step::WriteCsv(_) => "write_csv",
            Step::WriteFrame(_) => "write_frame",
            Step::ReadFrame(_) => "read_frame",
        }
    }

    /// Run the eager part of the step; deferred work lands in `ctx`.
    pub fn execute(&self, ctx: &mut ExecutionContext, backend: &dyn ColumnarBackend) -> Result<()> {
        match self {
            Step::ReadCsv(step) => step.execute(ctx),
            Step::WriteCsv(step) => step.execute(ctx),
            Step::WriteFrame(step) => step.execute(ctx),
            Step::ReadFrame(step) => step.execute(ctx, backend),
        }
    }
}

/// Convert a configured delimiter to the single byte the CSV codec expects.
fn delimiter_byte(delimiter: Option<char>) -> Result<u8> {
    let delimiter = delimiter.unwrap_or(',');
    if delimiter.is_ascii() {
        Ok(delimiter as u8)
    } else {
        Err(crate::error::FrameError::invalid_request(format!(
            "delimiter '{}' must be a single ASCII character",
            delimiter
        )))
    }
}
