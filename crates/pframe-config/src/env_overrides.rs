use super::{CompressionCodec, LogFormat, RuntimeConfig};
use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;

pub const ENV_PREFIX: &str = "PFRAME_";

/// Abstraction over environment-variable lookups so tests can supply their
/// own source of overrides.
pub trait EnvSource {
    /// Get a variable by its name without the `PFRAME_` prefix
    fn get(&self, key: &str) -> Option<String>;
}

/// Apply environment-variable overrides (highest priority) to the runtime config.
pub fn apply_env_overrides<E: EnvSource>(config: &mut RuntimeConfig, env: &E) -> Result<()> {
    // Workflow folders
    if let Some(path) = get_env_path(env, "ROOT_FOLDER") {
        config.workflow.root_folder = path;
    }
    if let Some(path) = get_env_path(env, "FRAME_FOLDER") {
        config.workflow.frame_folder = Some(path);
    }
    if let Some(path) = get_env_path(env, "SPILL_FOLDER") {
        config.workflow.spill_folder = Some(path);
    }

    // Parquet writer
    if let Some(val) = get_env_usize(env, "ROW_GROUP_SIZE")? {
        config.parquet.row_group_size = val;
    }
    if let Some(codec) = env.get("COMPRESSION") {
        config.parquet.compression = codec
            .parse::<CompressionCodec>()
            .context("Invalid PFRAME_COMPRESSION value")?;
    }

    // Logging
    if let Some(level) = env.get("LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(format) = env.get("LOG_FORMAT") {
        config.logging.format = match format.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        };
    }

    Ok(())
}

fn get_env_path<E: EnvSource>(env: &E, key: &str) -> Option<PathBuf> {
    env.get(key).filter(|v| !v.is_empty()).map(PathBuf::from)
}

fn get_env_usize<E: EnvSource>(env: &E, key: &str) -> Result<Option<usize>> {
    match env.get(key) {
        Some(val) => {
            let parsed = val
                .parse::<usize>()
                .map_err(|e| anyhow!("Failed to parse {}{}: {}", ENV_PREFIX, key, e))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}
