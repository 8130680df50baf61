use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::Path;

use crate::error::QuotaError;

/// Writes pretty JSON through a temp file in the destination directory and
/// renames it into place, so readers see either the old or the new file.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), QuotaError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|err| QuotaError::filesystem(parent, err))?;

    let data = serde_json::to_string_pretty(value)
        .map_err(|err| QuotaError::filesystem(path, err.into()))?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".quotawatch-")
        .suffix(".tmp")
        .tempfile_in(parent)
        .map_err(|err| QuotaError::filesystem(parent, err))?;
    tmp.write_all(format!("{data}\n").as_bytes())
        .map_err(|err| QuotaError::filesystem(tmp.path(), err))?;
    tmp.as_file()
        .sync_all()
        .map_err(|err| QuotaError::filesystem(tmp.path(), err))?;
    tmp.persist(path)
        .map_err(|err| QuotaError::filesystem(path, err.error))?;
    Ok(())
}
