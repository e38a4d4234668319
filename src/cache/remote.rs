//! Remote content cache keyed by composite string keys.
//!
//! [`RemoteCache`] takes the workspace root as an explicit argument: the
//! paths being restored or saved are always relative to it, and nothing in
//! the process environment is touched.
//!
//! [`DirectoryCache`] is a backend rooted at a directory (typically a shared
//! mount). Each entry is one zip archive named after the SHA-256 of its key:
//!
//! ```text
//! <store>/
//! ├── .locks/<sha256>.lock
//! └── <sha256>.zip
//! ```

use anyhow::{Context, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;

use super::lock::CacheLock;
use crate::core::WptlError;

/// A network- or volume-backed cache addressed by string keys.
#[async_trait]
pub trait RemoteCache: Send + Sync {
    /// Restores the entry for `key` into `workspace`.
    ///
    /// Returns `Ok(true)` on a hit, `Ok(false)` on a clean miss and an error
    /// when the backend itself failed.
    async fn restore(&self, workspace: &Path, paths: &[String], key: &str) -> Result<bool>;

    /// Saves `paths` (relative to `workspace`) under `key`.
    ///
    /// Saving a key that already exists is a no-op.
    async fn save(&self, workspace: &Path, paths: &[String], key: &str) -> Result<()>;
}

/// [`RemoteCache`] storing zip archives in a directory.
#[derive(Debug, Clone)]
pub struct DirectoryCache {
    root: PathBuf,
}

impl DirectoryCache {
    /// Creates a cache stored under `root`. The directory is created lazily.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
        }
    }

    /// Entry name for `key`: the lowercase hex SHA-256 of the key.
    #[must_use]
    pub fn entry_name(key: &str) -> String {
        hex::encode(Sha256::digest(key.as_bytes()))
    }

    /// Archive location of the entry for `key`.
    pub fn entry_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.zip", Self::entry_name(key)))
    }

    async fn save_entry(&self, workspace: &Path, paths: &[String], key: &str) -> Result<()> {
        let entry = self.entry_path(key);
        if tokio::fs::metadata(&entry).await.is_ok() {
            debug!(target: "cache", "Entry for {} already exists, not saving", key);
            return Ok(());
        }

        let _lock = CacheLock::acquire(&self.root, &Self::entry_name(key)).await?;

        // Another job may have saved the entry while we waited for the lock.
        if tokio::fs::metadata(&entry).await.is_ok() {
            debug!(target: "cache", "Entry for {} was created concurrently, not saving", key);
            return Ok(());
        }

        let root = self.root.clone();
        let workspace = workspace.to_path_buf();
        let paths = paths.to_vec();
        let dest = entry.clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let temp = tempfile::NamedTempFile::new_in(&root)
                .with_context(|| format!("Failed to create temp file in {}", root.display()))?;
            write_archive(temp.as_file(), &workspace, &paths)?;
            temp.persist(&dest)
                .with_context(|| format!("Failed to move archive to {}", dest.display()))?;
            Ok(())
        })
        .await
        .context("Failed to spawn blocking task for cache save")??;

        debug!(target: "cache", "Saved {} to {}", key, entry.display());
        Ok(())
    }

    async fn restore_entry(&self, workspace: &Path, key: &str) -> Result<bool> {
        let entry = self.entry_path(key);
        if tokio::fs::metadata(&entry).await.is_err() {
            debug!(target: "cache", "No entry for {}", key);
            return Ok(false);
        }

        let workspace = workspace.to_path_buf();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let file = File::open(&entry)
                .with_context(|| format!("Failed to open {}", entry.display()))?;
            let mut archive = zip::ZipArchive::new(file)
                .with_context(|| format!("Corrupt cache entry {}", entry.display()))?;
            archive
                .extract(&workspace)
                .with_context(|| format!("Failed to extract {}", entry.display()))?;
            Ok(())
        })
        .await
        .context("Failed to spawn blocking task for cache restore")??;

        Ok(true)
    }
}

fn backend_error(operation: &str, error: &anyhow::Error) -> anyhow::Error {
    WptlError::CacheBackendError {
        operation: operation.to_string(),
        reason: format!("{error:#}"),
    }
    .into()
}

#[async_trait]
impl RemoteCache for DirectoryCache {
    async fn restore(&self, workspace: &Path, _paths: &[String], key: &str) -> Result<bool> {
        self.restore_entry(workspace, key).await.map_err(|e| backend_error("restore", &e))
    }

    async fn save(&self, workspace: &Path, paths: &[String], key: &str) -> Result<()> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("Failed to create cache store {}", self.root.display()))
            .map_err(|e| backend_error("save", &e))?;
        self.save_entry(workspace, paths, key).await.map_err(|e| backend_error("save", &e))
    }
}

/// Writes `paths` (relative to `workspace`) into a zip archive.
///
/// Symbolic links are followed, so a tree linked in from the tool cache is
/// archived by content.
fn write_archive(file: &File, workspace: &Path, paths: &[String]) -> Result<()> {
    let mut zip = zip::ZipWriter::new(BufWriter::new(file));
    let base_options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for path in paths {
        let top = workspace.join(path);
        if std::fs::metadata(&top).is_err() {
            anyhow::bail!("Path {} does not exist", top.display());
        }

        for entry in WalkDir::new(&top).follow_links(true) {
            let entry = entry.with_context(|| format!("Failed to walk {}", top.display()))?;
            let relative = entry.path().strip_prefix(workspace).with_context(|| {
                format!("{} is outside {}", entry.path().display(), workspace.display())
            })?;
            let name = relative.to_string_lossy().replace('\\', "/");
            let options = with_permissions(base_options, &entry)?;

            if entry.file_type().is_dir() {
                zip.add_directory(format!("{name}/"), options)?;
            } else if entry.file_type().is_file() {
                zip.start_file(name, options)?;
                let mut source = File::open(entry.path())
                    .with_context(|| format!("Failed to open {}", entry.path().display()))?;
                std::io::copy(&mut source, &mut zip)?;
            }
        }
    }

    zip.finish()?.flush()?;
    Ok(())
}

#[cfg(unix)]
fn with_permissions(options: SimpleFileOptions, entry: &walkdir::DirEntry) -> Result<SimpleFileOptions> {
    use std::os::unix::fs::PermissionsExt;

    let mode = entry.metadata()?.permissions().mode();
    Ok(options.unix_permissions(mode))
}

#[cfg(not(unix))]
fn with_permissions(options: SimpleFileOptions, _entry: &walkdir::DirEntry) -> Result<SimpleFileOptions> {
    Ok(options)
}
