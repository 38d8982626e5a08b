//! On-disk layout of a frame directory
//!
//! ```text
//! <frame_name>/
//!   partition_0.parquet, partition_1.parquet, ...
//!   <column_id>.datainfo
//!   <column_id>.spec
//! ```

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use pframe_core::datainfo::{DATAINFO_EXTENSION, SPEC_EXTENSION};

use crate::error::{FrameError, Result};

pub fn partition_file_name(index: usize) -> String {
    format!("partition_{}.parquet", index)
}

pub fn datainfo_path(frame_dir: &Path, column_id: &str) -> PathBuf {
    frame_dir.join(format!("{}.{}", column_id, DATAINFO_EXTENSION))
}

pub fn spec_path(frame_dir: &Path, column_id: &str) -> PathBuf {
    frame_dir.join(format!("{}.{}", column_id, SPEC_EXTENSION))
}

/// A frame name must be a bare directory name.
pub fn validate_frame_name(name: &str) -> Result<()> {
    validate_plain_name("frame name", name)
}

/// Column ids name their metadata files, so they follow the same rule.
pub fn validate_column_id(id: &str) -> Result<()> {
    validate_plain_name("column id", id)
}

fn validate_plain_name(kind: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(FrameError::invalid_request(format!("{} must not be empty", kind)));
    }
    let is_basename = Path::new(name)
        .file_name()
        .is_some_and(|base| base == name);
    if !is_basename || name == "." || name == ".." {
        return Err(FrameError::invalid_request(format!(
            "{} '{}' must be a plain file name, not a path",
            kind, name
        )));
    }
    Ok(())
}

/// Create the frame directory, failing if it already exists.
///
/// The frame folder itself is created on demand.
pub fn create_frame_dir(frame_dir: &Path) -> Result<()> {
    if let Some(parent) = frame_dir.parent() {
        fs::create_dir_all(parent).map_err(|e| FrameError::io(parent, e))?;
    }
    fs::create_dir(frame_dir).map_err(|e| match e.kind() {
        ErrorKind::AlreadyExists => FrameError::frame_exists(frame_dir),
        _ => FrameError::io(frame_dir, e),
    })
}

/// Write a file via a temporary sibling and rename, so readers never see a
/// half-written metadata file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);

    fs::write(&tmp, bytes).map_err(|e| FrameError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        FrameError::io(path, e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_frame_name_validation() {
        assert!(validate_frame_name("frame").is_ok());
        assert!(validate_frame_name("my.frame").is_ok());

        for bad in ["", "a/b", "../x", "..", ".", "/abs"] {
            let err = validate_frame_name(bad).unwrap_err();
            assert_eq!(err.code(), ErrorCode::E001InvalidRequest, "{bad}");
        }
    }

    #[test]
    fn test_column_id_validation() {
        assert!(validate_column_id("value").is_ok());
        for bad in ["../escaped", "a/b", ".."] {
            let err = validate_column_id(bad).unwrap_err();
            assert_eq!(err.code(), ErrorCode::E001InvalidRequest, "{bad}");
            assert!(err.to_string().contains("column id"));
        }
    }

    #[test]
    fn test_create_frame_dir_is_exclusive() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("frames").join("f");
        create_frame_dir(&dir).unwrap();
        assert!(dir.is_dir());

        let err = create_frame_dir(&dir).unwrap_err();
        assert_eq!(err.code(), ErrorCode::E003FrameExists);
    }

    #[test]
    fn test_write_atomic_leaves_no_tmp() {
        let root = tempfile::tempdir().unwrap();
        let path = datainfo_path(root.path(), "value");
        write_atomic(&path, b"{}").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"{}");
        assert_eq!(fs::read_dir(root.path()).unwrap().count(), 1);
        assert_eq!(partition_file_name(3), "partition_3.parquet");
        assert!(spec_path(root.path(), "value").ends_with("value.spec"));
    }
}
