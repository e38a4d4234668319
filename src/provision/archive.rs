//! Transient WordPress archive handling.

use anyhow::{Context, Result};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::core::WptlError;

/// Owns the path of a downloaded archive and deletes it when dropped.
///
/// The guard is created before the download starts, so the archive is gone
/// after the pipeline returns no matter which step failed.
pub struct ArchiveGuard {
    path: PathBuf,
}

impl ArchiveGuard {
    /// Guards `path`. The file does not have to exist yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
        }
    }

    /// Location of the archive.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ArchiveGuard {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove {}: {}", self.path.display(), e),
        }
    }
}

/// Extracts the zip archive at `archive` into `dest`.
///
/// # Errors
///
/// Returns [`WptlError::ExtractFailed`] for unreadable or corrupt archives.
pub async fn extract_zip(archive: &Path, dest: &Path) -> Result<()> {
    let archive_path = archive.to_path_buf();
    let dest = dest.to_path_buf();

    tokio::task::spawn_blocking(move || -> Result<()> {
        let extract = || -> Result<usize> {
            let file = File::open(&archive_path)?;
            let mut zip = zip::ZipArchive::new(file)?;
            let entries = zip.len();
            zip.extract(&dest)?;
            Ok(entries)
        };

        let entries = extract().map_err(|e| WptlError::ExtractFailed {
            archive: archive_path.display().to_string(),
            reason: format!("{e:#}"),
        })?;
        debug!("Extracted {} entries from {} into {}", entries, archive_path.display(), dest.display());
        Ok(())
    })
    .await
    .context("Failed to spawn blocking task for archive extraction")?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::write_zip;
    use tempfile::TempDir;

    #[test]
    fn test_guard_removes_file_on_drop() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("wordpress.zip");
        std::fs::write(&path, b"zip").unwrap();

        {
            let guard = ArchiveGuard::new(&path);
            assert_eq!(guard.path(), path);
        }

        assert!(!path.exists());
    }

    #[test]
    fn test_guard_tolerates_missing_file() {
        let temp = TempDir::new().unwrap();
        drop(ArchiveGuard::new(temp.path().join("never-downloaded.zip")));
    }

    #[tokio::test]
    async fn test_extract_zip() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("wordpress.zip");
        write_zip(&archive, &[("wordpress/index.php", "<?php"), ("wordpress/wp-load.php", "<?php")]);

        extract_zip(&archive, temp.path()).await.unwrap();

        assert_eq!(std::fs::read_to_string(temp.path().join("wordpress/index.php")).unwrap(), "<?php");
    }

    #[tokio::test]
    async fn test_extract_corrupt_archive_fails() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("wordpress.zip");
        std::fs::write(&archive, b"<html>404</html>").unwrap();

        let err = extract_zip(&archive, temp.path()).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<WptlError>(), Some(WptlError::ExtractFailed { .. })));
    }
}
