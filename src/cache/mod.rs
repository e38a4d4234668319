//! Layered caching of provisioned trees.
//!
//! Two caches can satisfy an artifact before anything is fetched:
//!
//! 1. the machine-local tool cache ([`ToolCache`], [`LocalToolCache`]); a hit
//!    is linked into the target directory
//! 2. the remote cache ([`RemoteCache`], [`DirectoryCache`]); a hit is
//!    extracted into the target directory, a miss is recorded so the
//!    finalize run can save the freshly fetched tree
//!
//! [`CacheLookupChain`] runs them in that order. Remote entries are addressed
//! by [`cache_key`].

pub mod chain;
pub mod lock;
pub mod remote;
pub mod tool_cache;

pub use chain::{CacheLookupChain, CacheStrategy, LookupRequest};
pub use lock::CacheLock;
pub use remote::{DirectoryCache, RemoteCache};
pub use tool_cache::{LocalToolCache, ToolCache};

use crate::constants::CACHE_SCHEMA_VERSION;
use crate::state::PendingPersist;
use crate::wordpress::Artifact;

/// Result of consulting a cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheOutcome {
    /// The artifact is now present in the target directory
    Hit,
    /// The cache was consulted and did not have the artifact
    Miss {
        /// Save request for the finalize run, when the cache accepts saves
        pending: Option<PendingPersist>,
    },
    /// The cache backend failed; provisioning continues as on a miss
    Failed {
        /// Save request for the finalize run, when the cache accepts saves
        pending: Option<PendingPersist>,
        /// Backend error, for the log
        reason: String,
    },
    /// No cache could be consulted
    Unavailable,
}

impl CacheOutcome {
    /// `true` for [`CacheOutcome::Hit`].
    pub const fn is_hit(&self) -> bool {
        matches!(self, Self::Hit)
    }

    /// Consumes the outcome, returning its pending record if any.
    pub fn into_pending(self) -> Option<PendingPersist> {
        match self {
            Self::Miss {
                pending,
            }
            | Self::Failed {
                pending,
                ..
            } => pending,
            Self::Hit | Self::Unavailable => None,
        }
    }

    /// Uses `fallback` as the pending record when this outcome has none.
    #[must_use]
    pub fn or_pending(self, fallback: Option<PendingPersist>) -> Self {
        match self {
            Self::Miss {
                pending,
            } => Self::Miss {
                pending: pending.or(fallback),
            },
            Self::Failed {
                pending,
                reason,
            } => Self::Failed {
                pending: pending.or(fallback),
                reason,
            },
            other => other,
        }
    }
}

/// Remote cache key: `<schema>:<prefix>:<artifact>:<semver>`.
///
/// ```rust
/// use setup_wptl::cache::cache_key;
/// use setup_wptl::wordpress::Artifact;
///
/// assert_eq!(cache_key("", Artifact::WordPress, "6.4.3"), "1::wordpress:6.4.3");
/// ```
#[must_use]
pub fn cache_key(prefix: &str, artifact: Artifact, semver: &str) -> String {
    format!("{CACHE_SCHEMA_VERSION}:{prefix}:{}:{semver}", artifact.name())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_cache_key_format() {
        assert_eq!(cache_key("", Artifact::WordPress, "6.4.3"), "1::wordpress:6.4.3");
        assert_eq!(
            cache_key("php8.2", Artifact::TestLibrary, "6.4.3"),
            "1:php8.2:wordpress-tests-lib:6.4.3"
        );
    }

    #[test]
    fn test_into_pending() {
        let pending = PendingPersist {
            artifact: Artifact::WordPress,
            directory: PathBuf::from("/w"),
            key: "k".to_string(),
        };

        assert_eq!(
            CacheOutcome::Miss {
                pending: Some(pending.clone()),
            }
            .into_pending(),
            Some(pending)
        );
        assert!(CacheOutcome::Hit.into_pending().is_none());
        assert!(CacheOutcome::Hit.is_hit());
        assert!(CacheOutcome::Unavailable.into_pending().is_none());
    }

    #[test]
    fn test_failed_keeps_pending_and_is_not_a_hit() {
        let pending = PendingPersist {
            artifact: Artifact::TestLibrary,
            directory: PathBuf::from("/w"),
            key: "k".to_string(),
        };
        let failed = CacheOutcome::Failed {
            pending: None,
            reason: "store offline".to_string(),
        }
        .or_pending(Some(pending.clone()));

        assert!(!failed.is_hit());
        assert_eq!(failed.into_pending(), Some(pending));
    }
}
