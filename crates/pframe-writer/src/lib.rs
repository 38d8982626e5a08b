// pframe-writer - Partitioned frame storage and workflow execution
//
// Owns everything that touches the filesystem: the columnar file backend,
// the execution context with its deferred sinks and chained tasks, the
// workflow steps, the frame writer (validation, shaping, partition split,
// hashing, metadata commit) and the paired frame reader.

pub mod backend;
pub mod context;
pub mod error;
pub mod layout;
pub mod partition;
pub mod reader;
pub mod settings;
pub mod steps;
pub mod workflow;

// Re-export commonly used types
pub use backend::{ColumnChunkSummary, ColumnarBackend, FileMetadata, FileQuery, LocalParquetBackend};
pub use context::{ChainedTask, DeferredWrite, ExecutionContext, SinkFormat};
pub use error::{ErrorCode, FrameError, Result};
pub use reader::read_frame;
pub use settings::GlobalSettings;
pub use steps::{ReadCsv, ReadFrame, Step, WriteCsv, WriteFrame};
pub use workflow::Workflow;

pub use pframe_core::{AxisSpec, AxisType, ColumnSpec, ColumnType, DataInfo, Table};
