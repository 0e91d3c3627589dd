//! Error types for archive operations.

use thiserror::Error;

/// Errors that can occur while staging an archive.
#[derive(Debug, Error)]
pub enum BundleError {
    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// ZIP archive error.
    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Entry whose path would land outside the staging directory.
    #[error("Unsafe path in archive: {0}")]
    UnsafePath(String),

    /// Missing required file in archive.
    #[error("Missing required file: {0}")]
    MissingFile(String),
}
