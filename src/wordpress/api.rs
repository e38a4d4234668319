//! Client for the WordPress version-check feed.

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use crate::constants::{LATEST_VERSION_FEED_URL, VERSION_FEED_URL};
use crate::core::WptlError;
use crate::http::HttpTransport;

/// One release offer of the version-check feed.
///
/// The feed carries download links, PHP/MySQL requirements and locale data
/// per offer; only the version is needed for resolution.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Offer {
    /// Release number, e.g. `6.4.3`
    pub version: String,
}

/// Body of the version-check response.
#[derive(Debug, Clone, Deserialize)]
pub struct VersionCheckResponse {
    /// Published offers, newest first when unfiltered
    #[serde(default)]
    pub offers: Vec<Offer>,
}

/// Source of published WordPress releases.
#[async_trait]
pub trait ReleaseFeed: Send + Sync {
    /// Returns the single newest published release.
    async fn latest_version(&self) -> Result<String>;

    /// Returns the versions of every offer currently published.
    async fn versions(&self) -> Result<Vec<String>>;
}

/// [`ReleaseFeed`] backed by `api.wordpress.org`.
#[derive(Clone)]
pub struct WordPressApi {
    http: Arc<dyn HttpTransport>,
}

impl WordPressApi {
    /// Creates a feed client over the given transport.
    pub fn new(http: Arc<dyn HttpTransport>) -> Self {
        Self {
            http,
        }
    }

    async fn fetch(&self, url: &str) -> Result<VersionCheckResponse> {
        let body = self.http.get_text(url).await.map_err(|e| feed_error(url, &e))?;
        serde_json::from_str(&body).map_err(|e| {
            WptlError::VersionFeedFailed {
                url: url.to_string(),
                reason: format!("invalid response: {e}"),
            }
            .into()
        })
    }
}

fn feed_error(url: &str, error: &anyhow::Error) -> anyhow::Error {
    let reason = match error.downcast_ref::<WptlError>() {
        Some(WptlError::DownloadFailed {
            status: Some(code),
            ..
        }) => format!("error {code}"),
        Some(WptlError::DownloadFailed {
            reason,
            ..
        }) => reason.clone(),
        _ => format!("{error:#}"),
    };

    WptlError::VersionFeedFailed {
        url: url.to_string(),
        reason,
    }
    .into()
}

#[async_trait]
impl ReleaseFeed for WordPressApi {
    async fn latest_version(&self) -> Result<String> {
        let response = self.fetch(LATEST_VERSION_FEED_URL).await?;
        let latest = response.offers.into_iter().next().ok_or_else(|| {
            WptlError::VersionFeedFailed {
                url: LATEST_VERSION_FEED_URL.to_string(),
                reason: "the feed returned no offers".to_string(),
            }
        })?;

        debug!("Latest offer: {}", latest.version);
        Ok(latest.version)
    }

    async fn versions(&self) -> Result<Vec<String>> {
        let response = self.fetch(VERSION_FEED_URL).await?;
        Ok(response.offers.into_iter().map(|offer| offer.version).collect())
    }
}
