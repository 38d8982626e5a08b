//! Folders and writer options shared by every step of a workflow run

use std::path::{Path, PathBuf};

use pframe_config::{CompressionCodec, RuntimeConfig};
use pframe_core::{ParquetCompression, ParquetOptions};

use crate::error::{FrameError, Result};

/// Name of the intermediate file when no spill folder is configured
pub const INTERMEDIATE_FILE_NAME: &str = "_intermediate.parquet";

#[derive(Debug, Clone)]
pub struct GlobalSettings {
    /// Base for relative paths in CSV steps
    pub root_folder: PathBuf,
    /// Directory containing frames
    pub frame_folder: Option<PathBuf>,
    /// Scratch directory for intermediate files
    pub spill_folder: Option<PathBuf>,
    pub parquet: ParquetOptions,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            root_folder: PathBuf::from("."),
            frame_folder: None,
            spill_folder: None,
            parquet: ParquetOptions::default(),
        }
    }
}

impl GlobalSettings {
    pub fn from_config(config: &RuntimeConfig) -> Self {
        let compression = match config.parquet.compression {
            CompressionCodec::Uncompressed => ParquetCompression::Uncompressed,
            CompressionCodec::Snappy => ParquetCompression::Snappy,
            CompressionCodec::Zstd => ParquetCompression::Zstd,
        };

        Self {
            root_folder: config.workflow.root_folder.clone(),
            frame_folder: config.workflow.frame_folder.clone(),
            spill_folder: config.workflow.spill_folder.clone(),
            parquet: ParquetOptions {
                row_group_size: config.parquet.row_group_size,
                compression,
            },
        }
    }

    pub fn with_frame_folder(mut self, folder: impl Into<PathBuf>) -> Self {
        self.frame_folder = Some(folder.into());
        self
    }

    pub fn with_spill_folder(mut self, folder: impl Into<PathBuf>) -> Self {
        self.spill_folder = Some(folder.into());
        self
    }

    pub fn with_root_folder(mut self, folder: impl Into<PathBuf>) -> Self {
        self.root_folder = folder.into();
        self
    }

    /// Resolve a step file path against the root folder.
    pub fn resolve(&self, file: &str) -> PathBuf {
        let path = Path::new(file);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root_folder.join(path)
        }
    }

    pub fn frame_folder(&self) -> Result<&Path> {
        self.frame_folder
            .as_deref()
            .ok_or_else(|| FrameError::workflow("Frame folder is not set"))
    }

    pub fn frame_dir(&self, frame_name: &str) -> Result<PathBuf> {
        Ok(self.frame_folder()?.join(frame_name))
    }

    /// Location of the full-table scratch file for a frame write.
    pub fn intermediate_path(&self, frame_name: &str, frame_dir: &Path) -> PathBuf {
        match &self.spill_folder {
            Some(spill) => spill.join(format!("{}-{}.parquet", frame_name, uuid::Uuid::new_v4())),
            None => frame_dir.join(INTERMEDIATE_FILE_NAME),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_folder_required() {
        let settings = GlobalSettings::default();
        let err = settings.frame_dir("f").unwrap_err();
        assert!(err.to_string().contains("Frame folder is not set"));
    }

    #[test]
    fn test_intermediate_path_prefers_spill_folder() {
        let settings = GlobalSettings::default().with_frame_folder("/frames");
        let dir = settings.frame_dir("f").unwrap();
        assert_eq!(
            settings.intermediate_path("f", &dir),
            PathBuf::from("/frames/f/_intermediate.parquet")
        );

        let settings = settings.with_spill_folder("/spill");
        let path = settings.intermediate_path("f", &dir);
        assert!(path.starts_with("/spill"));
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("f-") && name.ends_with(".parquet"));
    }

    #[test]
    fn test_from_config_maps_parquet_options() {
        let mut config = RuntimeConfig::default();
        config.parquet.row_group_size = 10;
        config.parquet.compression = CompressionCodec::Snappy;
        config.workflow.frame_folder = Some(PathBuf::from("/frames"));

        let settings = GlobalSettings::from_config(&config);
        assert_eq!(settings.parquet.row_group_size, 10);
        assert_eq!(settings.parquet.compression, ParquetCompression::Snappy);
        assert_eq!(settings.frame_folder().unwrap(), Path::new("/frames"));
    }
}
