// pframe-config - Runtime configuration for workflow execution
//
// Supports configuration from multiple sources:
// 1. Environment variables (highest priority, PFRAME_ prefix)
// 2. Explicit config file path (CLI --config)
// 3. Config file path from PFRAME_CONFIG env var
// 4. Default config file location (./pframe.toml)
// 5. Built-in defaults (lowest priority)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub mod env_overrides;
mod sources;
mod validation;

pub use env_overrides::{EnvSource, ENV_PREFIX};

/// Main runtime configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub workflow: WorkflowConfig,

    #[serde(default)]
    pub parquet: ParquetConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Folders used while executing a workflow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Base directory for relative file paths in read/write steps
    #[serde(default = "default_root_folder")]
    pub root_folder: PathBuf,

    /// Directory holding frames; frame steps fail when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_folder: Option<PathBuf>,

    /// Scratch directory for intermediate files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spill_folder: Option<PathBuf>,
}

fn default_root_folder() -> PathBuf {
    PathBuf::from(".")
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            root_folder: default_root_folder(),
            frame_folder: None,
            spill_folder: None,
        }
    }
}

/// Columnar file writer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParquetConfig {
    #[serde(default = "default_row_group_size")]
    pub row_group_size: usize,

    #[serde(default)]
    pub compression: CompressionCodec,
}

fn default_row_group_size() -> usize {
    32 * 1024
}

impl Default for ParquetConfig {
    fn default() -> Self {
        Self {
            row_group_size: default_row_group_size(),
            compression: CompressionCodec::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionCodec {
    Uncompressed,
    Snappy,
    #[default]
    Zstd,
}

impl std::fmt::Display for CompressionCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompressionCodec::Uncompressed => write!(f, "uncompressed"),
            CompressionCodec::Snappy => write!(f, "snappy"),
            CompressionCodec::Zstd => write!(f, "zstd"),
        }
    }
}

impl std::str::FromStr for CompressionCodec {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "uncompressed" | "none" => Ok(CompressionCodec::Uncompressed),
            "snappy" => Ok(CompressionCodec::Snappy),
            "zstd" => Ok(CompressionCodec::Zstd),
            _ => anyhow::bail!(
                "Unsupported compression codec: {}. Supported: uncompressed, snappy, zstd",
                s
            ),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

impl RuntimeConfig {
    /// Load configuration from the default sources with priority
    pub fn load() -> Result<Self> {
        sources::load_config()
    }

    /// Load configuration starting from an explicit file
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        sources::load_from_file_path(path)
    }

    /// Parse a TOML document without consulting the environment
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }
}
