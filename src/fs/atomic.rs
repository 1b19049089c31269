//! Atomic file writes.
//!
//! Content goes to a temporary file in the target's directory, is synced,
//! then renamed over the target. Rename is atomic when source and
//! destination share a filesystem, which holds because they share a parent.

use crate::error::{Result, SwarmError};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Atomically write a string to `path`.
///
/// The parent directory must already exist; instance directories are
/// created by the config builder before anything is written into them.
pub fn atomic_write_file<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
    let path = path.as_ref();
    let parent = path.parent().ok_or_else(|| {
        SwarmError::ConfigBuild(format!("invalid file path '{}'", path.display()))
    })?;

    let mut temp = NamedTempFile::new_in(parent).map_err(|e| {
        SwarmError::ConfigBuild(format!(
            "failed to create temporary file in '{}': {}",
            parent.display(),
            e
        ))
    })?;

    temp.write_all(content.as_bytes()).map_err(|e| {
        SwarmError::ConfigBuild(format!("failed to write to temporary file: {}", e))
    })?;

    temp.as_file().sync_all().map_err(|e| {
        SwarmError::ConfigBuild(format!("failed to sync temporary file to disk: {}", e))
    })?;

    // The temp file is removed automatically if persist fails.
    temp.persist(path).map_err(|e| {
        SwarmError::ConfigBuild(format!(
            "failed to atomically replace '{}': {}",
            path.display(),
            e.error
        ))
    })?;

    Ok(())
}
