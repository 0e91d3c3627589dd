//! Archive extraction into a staging directory.
//!
//! Each archive is extracted into `<staging_root>/<archive stem>/`, replacing
//! whatever an earlier delivery of the same archive left there.

use crate::{BundleError, BundleResult};
use protogen_core::CONFIG_FILE;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;
use zip::ZipArchive;

/// Result of staging one archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedArchive {
    /// Directory the archive was extracted into.
    pub root: PathBuf,

    /// Every `config.json` found beneath `root`, sorted.
    pub configs: Vec<PathBuf>,
}

/// Extracts schema archives beneath a staging root.
#[derive(Debug, Clone)]
pub struct ArchiveStager {
    staging_root: PathBuf,
}

impl ArchiveStager {
    pub fn new(staging_root: impl Into<PathBuf>) -> Self {
        Self {
            staging_root: staging_root.into(),
        }
    }

    pub fn staging_root(&self) -> &Path {
        &self.staging_root
    }

    /// Extract `archive_path` and locate its configuration files.
    ///
    /// Fails with [`BundleError::UnsafePath`] before writing anything if an
    /// entry would escape the staging directory, and with
    /// [`BundleError::MissingFile`] if the archive holds no `config.json`.
    pub fn stage(&self, archive_path: impl AsRef<Path>) -> BundleResult<StagedArchive> {
        let archive_path = archive_path.as_ref();
        let stem = archive_path
            .file_stem()
            .ok_or_else(|| BundleError::UnsafePath(archive_path.display().to_string()))?;
        let root = self.staging_root.join(stem);

        let mut archive = ZipArchive::new(File::open(archive_path)?)?;

        // Validate every entry before touching the file system
        let mut entries = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let entry = archive.by_index(index)?;
            let relative = entry
                .enclosed_name()
                .ok_or_else(|| BundleError::UnsafePath(entry.name().to_string()))?;
            entries.push((index, relative, entry.is_dir()));
        }

        if root.exists() {
            fs::remove_dir_all(&root)?;
        }
        fs::create_dir_all(&root)?;

        for (index, relative, is_dir) in entries {
            let target = root.join(relative);
            if is_dir {
                fs::create_dir_all(&target)?;
                continue;
            }
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut entry = archive.by_index(index)?;
            let mut output = File::create(&target)?;
            io::copy(&mut entry, &mut output)?;
        }

        let configs = find_configs(&root)?;
        if configs.is_empty() {
            return Err(BundleError::MissingFile(format!(
                "{CONFIG_FILE} not found in {}",
                archive_path.display()
            )));
        }

        debug!(
            archive = %archive_path.display(),
            root = %root.display(),
            configs = configs.len(),
            "archive staged"
        );
        Ok(StagedArchive { root, configs })
    }
}

/// Whether `path` names a zip archive, judged by extension.
pub fn is_zip(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"))
}

/// Every `config.json` beneath `dir`, sorted by path. Symbolic links are
/// not followed.
pub fn find_configs(dir: &Path) -> BundleResult<Vec<PathBuf>> {
    let mut configs = Vec::new();

    for entry in WalkDir::new(dir).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        if entry.file_type().is_file() && entry.file_name() == CONFIG_FILE {
            configs.push(entry.into_path());
        }
    }

    Ok(configs)
}
