//! ReadFrame: load columns of an existing frame into the table space

use serde::{Deserialize, Serialize};

use crate::backend::ColumnarBackend;
use crate::context::ExecutionContext;
use crate::error::Result;
use crate::layout::validate_frame_name;
use crate::reader::read_frame;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadFrame {
    /// Name of the resulting table
    pub name: String,
    pub frame_name: String,
    pub columns: Vec<String>,
}

impl ReadFrame {
    pub fn execute(&self, ctx: &mut ExecutionContext, backend: &dyn ColumnarBackend) -> Result<()> {
        let frame_folder = ctx.settings().frame_folder()?;
        validate_frame_name(&self.frame_name)?;
        let frame_dir = frame_folder.join(&self.frame_name);

        let table = read_frame(backend, &frame_dir, &self.columns)?;
        tracing::info!(
            frame = %self.frame_name,
            table = %self.name,
            rows = table.num_rows(),
            "Frame loaded"
        );
        ctx.put_table(&self.name, table);
        Ok(())
    }
}
