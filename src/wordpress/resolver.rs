//! Resolution of version specifiers to concrete WordPress versions.
//!
//! | Specifier | Result |
//! |---|---|
//! | `nightly`, `trunk` | the `nightly` sentinel, no network access |
//! | `latest` | newest published offer |
//! | `6.x`, `6.4.x` | numerically greatest offer starting with `6` / `6.4` |
//! | anything else | returned verbatim |
//!
//! Literal versions are deliberately not validated; a mistyped version fails
//! later with a 404 from the archive download.

use anyhow::Result;
use tracing::debug;

use super::api::ReleaseFeed;
use crate::constants::{BRANCH_SUFFIX, LATEST, NIGHTLY, TRUNK};
use crate::core::WptlError;
use crate::version::VersionComparator;

/// Resolves specifiers against a [`ReleaseFeed`].
pub struct VersionResolver<'a> {
    feed: &'a dyn ReleaseFeed,
}

impl<'a> VersionResolver<'a> {
    /// Creates a resolver that consults `feed` for relative specifiers.
    pub fn new(feed: &'a dyn ReleaseFeed) -> Self {
        Self {
            feed,
        }
    }

    /// Resolves `specifier` to one concrete version or the `nightly` sentinel.
    ///
    /// # Errors
    ///
    /// - [`WptlError::VersionFeedFailed`] when the feed is unreachable
    /// - [`WptlError::NoMatchingVersion`] when a branch wildcard matches nothing
    pub async fn resolve(&self, specifier: &str) -> Result<String> {
        if specifier == NIGHTLY || specifier == TRUNK {
            return Ok(NIGHTLY.to_string());
        }

        if specifier == LATEST {
            return self.feed.latest_version().await;
        }

        if let Some(prefix) = specifier.strip_suffix(BRANCH_SUFFIX) {
            return self.latest_in_branch(specifier, prefix).await;
        }

        Ok(specifier.to_string())
    }

    async fn latest_in_branch(&self, specifier: &str, prefix: &str) -> Result<String> {
        let mut candidates: Vec<String> = self
            .feed
            .versions()
            .await?
            .into_iter()
            .filter(|version| version.starts_with(prefix))
            .collect();
        debug!("Offers matching '{}': {:?}", prefix, candidates);

        VersionComparator::sort_descending(&mut candidates);
        candidates.into_iter().next().ok_or_else(|| {
            WptlError::NoMatchingVersion {
                specifier: specifier.to_string(),
            }
            .into()
        })
    }
}
