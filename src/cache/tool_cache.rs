//! Machine-local tool cache.
//!
//! Layout follows the runner convention:
//!
//! ```text
//! <RUNNER_TOOL_CACHE>/
//! └── wordpress/
//!     └── 6.4.3/
//!         ├── x64/            # cached tree
//!         └── x64.complete    # written last; entries without it are ignored
//! ```

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::utils::fs::{copy_dir, ensure_dir, remove_path};
use crate::utils::platform::tool_cache_arch;

/// A cache scoped to one execution host, addressed by tool name and version.
#[async_trait]
pub trait ToolCache: Send + Sync {
    /// Returns the cached tree for `(tool, version)`, if a complete one exists.
    async fn find(&self, tool: &str, version: &str) -> Result<Option<PathBuf>>;

    /// Copies `source` into the cache as `(tool, version)` and returns the
    /// cached location.
    async fn cache_dir(&self, source: &Path, tool: &str, version: &str) -> Result<PathBuf>;
}

/// [`ToolCache`] rooted at a directory on the local file system.
#[derive(Debug, Clone)]
pub struct LocalToolCache {
    root: PathBuf,
    arch: String,
}

impl LocalToolCache {
    /// Creates a tool cache rooted at `root` for the host architecture.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            arch: tool_cache_arch().to_string(),
        }
    }

    /// Overrides the architecture directory name.
    #[must_use]
    pub fn with_arch(mut self, arch: impl Into<String>) -> Self {
        self.arch = arch.into();
        self
    }

    fn version_dir(&self, tool: &str, version: &str) -> PathBuf {
        self.root.join(tool).join(version)
    }

    fn entry_dir(&self, tool: &str, version: &str) -> PathBuf {
        self.version_dir(tool, version).join(&self.arch)
    }

    fn marker(&self, tool: &str, version: &str) -> PathBuf {
        self.version_dir(tool, version).join(format!("{}.complete", self.arch))
    }
}

#[async_trait]
impl ToolCache for LocalToolCache {
    async fn find(&self, tool: &str, version: &str) -> Result<Option<PathBuf>> {
        let entry = self.entry_dir(tool, version);
        let marker = self.marker(tool, version);

        if tokio::fs::metadata(&marker).await.is_ok() && crate::utils::fs::is_dir(&entry).await {
            debug!(target: "cache", "Tool cache hit for {}@{}: {}", tool, version, entry.display());
            return Ok(Some(entry));
        }

        debug!(target: "cache", "Tool cache miss for {}@{}", tool, version);
        Ok(None)
    }

    async fn cache_dir(&self, source: &Path, tool: &str, version: &str) -> Result<PathBuf> {
        let entry = self.entry_dir(tool, version);
        let marker = self.marker(tool, version);

        remove_path(&marker).await?;
        remove_path(&entry).await?;

        let (src, dst) = (source.to_path_buf(), entry.clone());
        tokio::task::spawn_blocking(move || -> Result<()> {
            ensure_dir(&dst)?;
            copy_dir(&src, &dst)
        })
        .await
        .context("Failed to spawn blocking task for tool cache copy")??;

        tokio::fs::write(&marker, b"")
            .await
            .with_context(|| format!("Failed to write {}", marker.display()))?;

        debug!(target: "cache", "Cached {} as {}@{} in {}", source.display(), tool, version, entry.display());
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_cache_dir_then_find() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("src");
        std::fs::create_dir_all(source.join("wp-includes")).unwrap();
        std::fs::write(source.join("wp-includes/version.php"), "<?php").unwrap();

        let cache = LocalToolCache::new(temp.path().join("tools")).with_arch("x64");
        let cached = cache.cache_dir(&source, "wordpress", "6.4.3").await.unwrap();

        assert_eq!(cached, temp.path().join("tools/wordpress/6.4.3/x64"));
        assert!(cached.join("wp-includes/version.php").exists());
        assert!(temp.path().join("tools/wordpress/6.4.3/x64.complete").exists());
        assert_eq!(cache.find("wordpress", "6.4.3").await.unwrap(), Some(cached));
    }

    #[tokio::test]
    async fn test_find_ignores_incomplete_entries() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("wordpress/6.4.3/x64")).unwrap();

        let cache = LocalToolCache::new(temp.path()).with_arch("x64");

        assert!(cache.find("wordpress", "6.4.3").await.unwrap().is_none());
        assert!(cache.find("wordpress", "6.5.0").await.unwrap().is_none());
    }
}
