//! Ordered cache lookup for one artifact.
//!
//! The chain holds one [`CacheStrategy`] per available cache, in priority
//! order (machine-local tool cache, then remote cache). Each strategy answers
//! with a [`CacheOutcome`]; the first [`CacheOutcome::Hit`] wins.

use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use super::remote::RemoteCache;
use super::tool_cache::ToolCache;
use super::{CacheOutcome, cache_key};
use crate::core::WptlError;
use crate::state::PendingPersist;
use crate::wordpress::Artifact;

/// One artifact lookup.
#[derive(Debug, Clone, Copy)]
pub struct LookupRequest<'a> {
    /// Artifact being looked up
    pub artifact: Artifact,
    /// Normalized semantic version shared by both artifacts of the run
    pub semver: &'a str,
    /// Target directory (workspace root for remote restores)
    pub target_dir: &'a Path,
    /// Caller-supplied key prefix, possibly empty
    pub prefix: &'a str,
}

/// One cache consulted by the [`CacheLookupChain`].
#[async_trait]
pub trait CacheStrategy: Send + Sync {
    /// Short name for log lines.
    fn name(&self) -> &'static str;

    /// Looks the artifact up, materializing it into the target directory on a hit.
    ///
    /// Only fatal failures are returned as errors.
    async fn lookup(&self, request: &LookupRequest<'_>) -> Result<CacheOutcome>;
}

/// Tool cache strategy: a hit is linked into the target directory.
pub struct ToolCacheStrategy {
    cache: Arc<dyn ToolCache>,
}

impl ToolCacheStrategy {
    /// Wraps a tool cache.
    pub fn new(cache: Arc<dyn ToolCache>) -> Self {
        Self {
            cache,
        }
    }
}

#[async_trait]
impl CacheStrategy for ToolCacheStrategy {
    fn name(&self) -> &'static str {
        "tool cache"
    }

    async fn lookup(&self, request: &LookupRequest<'_>) -> Result<CacheOutcome> {
        let found = match self.cache.find(request.artifact.name(), request.semver).await {
            Ok(found) => found,
            Err(e) => {
                warn!("Tool cache lookup for {} failed: {:#}", request.artifact, e);
                None
            }
        };

        let Some(cached) = found else {
            return Ok(CacheOutcome::Miss {
                pending: None,
            });
        };

        let cached = std::path::absolute(&cached).unwrap_or(cached);
        let link = request.target_dir.join(request.artifact.name());
        info!("🚀 Using cached {} from {}", request.artifact.display_name(), cached.display());
        symlink_dir(&cached, &link).await.map_err(|e| WptlError::SymlinkFailed {
            from: cached.display().to_string(),
            to: link.display().to_string(),
            reason: e.to_string(),
        })?;

        Ok(CacheOutcome::Hit)
    }
}

#[cfg(unix)]
async fn symlink_dir(original: &Path, link: &Path) -> std::io::Result<()> {
    tokio::fs::symlink(original, link).await
}

#[cfg(windows)]
async fn symlink_dir(original: &Path, link: &Path) -> std::io::Result<()> {
    tokio::fs::symlink_dir(original, link).await
}

/// Remote cache strategy: a miss is recorded for the finalize run.
pub struct RemoteCacheStrategy {
    cache: Arc<dyn RemoteCache>,
}

impl RemoteCacheStrategy {
    /// Wraps a remote cache.
    pub fn new(cache: Arc<dyn RemoteCache>) -> Self {
        Self {
            cache,
        }
    }
}

#[async_trait]
impl CacheStrategy for RemoteCacheStrategy {
    fn name(&self) -> &'static str {
        "remote cache"
    }

    async fn lookup(&self, request: &LookupRequest<'_>) -> Result<CacheOutcome> {
        let name = request.artifact.name();
        let key = cache_key(request.prefix, request.artifact, request.semver);
        let pending = PendingPersist {
            artifact: request.artifact,
            directory: request.target_dir.to_path_buf(),
            key: key.clone(),
        };

        info!("ℹ️ Checking cache key {} for {}…", key, name);
        match self.cache.restore(request.target_dir, &[name.to_string()], &key).await {
            Ok(true) => {
                info!("🚀 Using cached {}, key is {}", request.artifact.display_name(), key);
                Ok(CacheOutcome::Hit)
            }
            Ok(false) => Ok(CacheOutcome::Miss {
                pending: Some(pending),
            }),
            Err(e) => {
                warn!("Failed to restore {} from cache: {:#}", name, e);
                Ok(CacheOutcome::Failed {
                    pending: Some(pending),
                    reason: format!("{e:#}"),
                })
            }
        }
    }
}

/// Priority-ordered list of cache strategies.
#[derive(Default)]
pub struct CacheLookupChain {
    strategies: Vec<Box<dyn CacheStrategy>>,
}

impl CacheLookupChain {
    /// An empty chain; every lookup is [`CacheOutcome::Unavailable`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a strategy with the lowest priority so far.
    #[must_use]
    pub fn with_strategy(mut self, strategy: Box<dyn CacheStrategy>) -> Self {
        self.strategies.push(strategy);
        self
    }

    /// Builds the chain from whichever caches are available.
    pub fn from_caches(
        tool_cache: Option<Arc<dyn ToolCache>>,
        remote_cache: Option<Arc<dyn RemoteCache>>,
    ) -> Self {
        let mut chain = Self::new();
        if let Some(cache) = tool_cache {
            chain = chain.with_strategy(Box::new(ToolCacheStrategy::new(cache)));
        }
        if let Some(cache) = remote_cache {
            chain = chain.with_strategy(Box::new(RemoteCacheStrategy::new(cache)));
        }
        chain
    }

    /// Consults each strategy in order until one hits.
    ///
    /// Misses and backend failures both fall through to the next strategy,
    /// keeping the last pending record produced; the final outcome is the
    /// last such answer. [`CacheOutcome::Unavailable`] answers are skipped.
    ///
    /// # Errors
    ///
    /// Propagates fatal strategy errors, such as a failed tool-cache link.
    pub async fn lookup(&self, request: &LookupRequest<'_>) -> Result<CacheOutcome> {
        let mut outcome = CacheOutcome::Unavailable;

        for strategy in &self.strategies {
            match strategy.lookup(request).await? {
                CacheOutcome::Hit => {
                    tracing::debug!("{} hit for {}", strategy.name(), request.artifact);
                    return Ok(CacheOutcome::Hit);
                }
                CacheOutcome::Unavailable => {}
                answer => {
                    tracing::debug!("{} miss for {}", strategy.name(), request.artifact);
                    outcome = answer.or_pending(outcome.into_pending());
                }
            }
        }

        Ok(outcome)
    }
}
