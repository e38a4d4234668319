//! Process-safe file locks for remote cache entries.
//!
//! Two jobs sharing one cache store may try to save the same key at the same
//! time; the entry lock serializes them so only the first writer creates the
//! entry and the second observes it and skips.

use anyhow::{Context, Result};
use fs4::fs_std::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// An exclusive lock on one cache entry, released on drop.
pub struct CacheLock {
    file: File,
    path: PathBuf,
}

impl CacheLock {
    /// Acquires an exclusive lock named `name` under `<store>/.locks/`.
    ///
    /// Blocks (on a blocking-pool thread) until any other holder releases the
    /// lock. The lock file itself is left in place for reuse.
    ///
    /// # Errors
    ///
    /// Fails if the locks directory or lock file cannot be created, or if the
    /// file system does not support locking.
    pub async fn acquire(store: &Path, name: &str) -> Result<Self> {
        let locks_dir = store.join(".locks");
        tokio::fs::create_dir_all(&locks_dir).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::PermissionDenied {
                anyhow::anyhow!(
                    "Permission denied: cannot create locks directory at {}",
                    locks_dir.display()
                )
            } else {
                anyhow::anyhow!("Failed to create directory {}: {}", locks_dir.display(), e)
            }
        })?;

        let lock_path = locks_dir.join(format!("{name}.lock"));
        let lock_path_clone = lock_path.clone();
        let name = name.to_string();

        let file = tokio::task::spawn_blocking(move || -> Result<File> {
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&lock_path_clone)
                .with_context(|| {
                    format!("Failed to open lock file: {}", lock_path_clone.display())
                })?;

            file.lock_exclusive().with_context(|| format!("Failed to acquire lock for: {name}"))?;

            Ok(file)
        })
        .await
        .context("Failed to spawn blocking task for lock acquisition")??;

        tracing::trace!(target: "cache", "Acquired lock {}", lock_path.display());
        Ok(Self {
            file,
            path: lock_path,
        })
    }
}

impl Drop for CacheLock {
    fn drop(&mut self) {
        #[allow(unstable_name_collisions)]
        if let Err(e) = self.file.unlock() {
            tracing::warn!(target: "cache", "Failed to unlock {}: {}", self.path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_lock_creates_lock_file() {
        let temp = TempDir::new().unwrap();

        let lock = CacheLock::acquire(temp.path(), "entry").await.unwrap();

        assert!(temp.path().join(".locks").join("entry.lock").exists());
        drop(lock);
    }

    #[tokio::test]
    async fn test_lock_is_exclusive() {
        let temp = TempDir::new().unwrap();
        let store = temp.path().to_path_buf();

        let first = CacheLock::acquire(&store, "entry").await.unwrap();
        let acquired = Arc::new(AtomicBool::new(false));

        let flag = acquired.clone();
        let store_clone = store.clone();
        let waiter = tokio::spawn(async move {
            let _second = CacheLock::acquire(&store_clone, "entry").await.unwrap();
            flag.store(true, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!acquired.load(Ordering::SeqCst));

        drop(first);
        waiter.await.unwrap();
        assert!(acquired.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_distinct_names_do_not_contend() {
        let temp = TempDir::new().unwrap();

        let _a = CacheLock::acquire(temp.path(), "a").await.unwrap();
        let _b = tokio::time::timeout(
            Duration::from_secs(5),
            CacheLock::acquire(temp.path(), "b"),
        )
        .await
        .unwrap()
        .unwrap();
    }
}
