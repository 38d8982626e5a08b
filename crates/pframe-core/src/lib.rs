// pframe-core - Pure logic for partitioned columnar frames
//
// Axis/column specs, the in-memory table handle, the Arrow kernels that
// shape a table before it is partitioned, the content digest algorithm and
// the per-column metadata model. No filesystem access lives here; the
// writer crate owns directories, files and step orchestration.

pub mod datainfo;
pub mod encoding;
pub mod error;
pub mod hash;
pub mod kernels;
pub mod table;
pub mod types;

// Re-export commonly used types
pub use datainfo::{
    decode_part_key, encode_part_key, ByteStats, ColumnSpecFile, DataInfo, DataInfoPart,
    FrameMetadataBuilder, PartStats,
};
pub use encoding::{ParquetCompression, ParquetOptions};
pub use error::{CoreError, Result};
pub use hash::{data_digest, hash_rows, DIGEST_ALGORITHM};
pub use table::Table;
pub use types::{AxisSpec, AxisType, AxisValue, Blake3Hash, ColumnSpec, ColumnType};
