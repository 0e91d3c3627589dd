//! Atomic output writes

use crate::error::IoError;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Write `contents` to `path` through a temporary file in the same directory
///
/// Readers see either the previous file or the complete new one, never a
/// partial write. The parent directory must exist.
pub fn write_atomic(path: &Path, contents: &str) -> Result<(), IoError> {
    let failure = |source| IoError::WriteFailure {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut file = NamedTempFile::new_in(dir).map_err(failure)?;
    file.write_all(contents.as_bytes()).map_err(failure)?;
    file.as_file().sync_all().map_err(failure)?;
    file.persist(path).map_err(|e| failure(e.error))?;

    Ok(())
}
