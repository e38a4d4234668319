//! HTTP access for version metadata, archives and the config template.
//!
//! Network access goes through the [`HttpTransport`] trait so the resolver
//! and the provisioning pipeline can be exercised against in-memory fakes.
//! [`ReqwestTransport`] is the production implementation.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tokio_retry::RetryIf;
use tokio_retry::strategy::ExponentialBackoff;
use tracing::debug;

use crate::constants::{
    MAX_BACKOFF_DELAY, STARTING_BACKOFF_DELAY_MS, TEXT_DOWNLOAD_RETRIES, USER_AGENT,
};
use crate::core::WptlError;

/// Minimal HTTP surface needed by a provisioning run.
///
/// Implementations must report a non-success status as
/// [`WptlError::DownloadFailed`] carrying the status code.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Fetches `url` and returns the body as text.
    async fn get_text(&self, url: &str) -> Result<String>;

    /// Streams `url` into the file at `dest`, creating or truncating it.
    async fn download(&self, url: &str, dest: &Path) -> Result<()>;
}

/// [`HttpTransport`] backed by a shared `reqwest` client.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Builds a transport with the crate user agent.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
        })
    }

    async fn get_checked(&self, url: &str) -> Result<reqwest::Response> {
        debug!("GET {}", url);
        let response = self.client.get(url).send().await.map_err(|e| WptlError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
            status: None,
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(WptlError::DownloadFailed {
                url: url.to_string(),
                reason: format!("error {}", status.as_u16()),
                status: Some(status.as_u16()),
            }
            .into());
        }

        Ok(response)
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get_text(&self, url: &str) -> Result<String> {
        let response = self.get_checked(url).await?;
        response.text().await.map_err(|e| {
            WptlError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
                status: None,
            }
            .into()
        })
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<()> {
        let mut response = self.get_checked(url).await?;
        let mut file = tokio::fs::File::create(dest)
            .await
            .with_context(|| format!("Failed to create {}", dest.display()))?;

        let mut written: u64 = 0;
        while let Some(chunk) = response.chunk().await.map_err(|e| WptlError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
            status: None,
        })? {
            file.write_all(&chunk)
                .await
                .with_context(|| format!("Failed to write {}", dest.display()))?;
            written += chunk.len() as u64;
        }

        file.flush().await.with_context(|| format!("Failed to flush {}", dest.display()))?;
        debug!("Downloaded {} bytes from {} to {}", written, url, dest.display());
        Ok(())
    }
}

/// Returns `true` for failures worth retrying: transport errors, 429 and 5xx.
#[must_use]
pub fn is_transient(error: &anyhow::Error) -> bool {
    match error.downcast_ref::<WptlError>() {
        Some(WptlError::DownloadFailed {
            status: None,
            ..
        }) => true,
        Some(WptlError::DownloadFailed {
            status: Some(code),
            ..
        }) => *code >= 500 || *code == 429,
        _ => false,
    }
}

/// Downloads `url` as text, retrying transient failures with exponential backoff.
///
/// Client errors such as 404 fail on the first attempt.
pub async fn download_as_text(transport: &dyn HttpTransport, url: &str) -> Result<String> {
    let strategy = ExponentialBackoff::from_millis(STARTING_BACKOFF_DELAY_MS)
        .max_delay(MAX_BACKOFF_DELAY)
        .take(TEXT_DOWNLOAD_RETRIES);

    RetryIf::spawn(
        strategy,
        || async {
            transport.get_text(url).await.inspect_err(|e| {
                debug!("Fetching {} failed: {:#}", url, e);
            })
        },
        is_transient,
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::FakeHttp;

    #[test]
    fn test_is_transient() {
        let not_found: anyhow::Error = WptlError::DownloadFailed {
            url: "u".to_string(),
            reason: "error 404".to_string(),
            status: Some(404),
        }
        .into();
        let unavailable: anyhow::Error = WptlError::DownloadFailed {
            url: "u".to_string(),
            reason: "error 503".to_string(),
            status: Some(503),
        }
        .into();
        let reset: anyhow::Error = WptlError::DownloadFailed {
            url: "u".to_string(),
            reason: "connection reset".to_string(),
            status: None,
        }
        .into();

        let throttled: anyhow::Error = WptlError::DownloadFailed {
            url: "u".to_string(),
            reason: "error 429".to_string(),
            status: Some(429),
        }
        .into();

        assert!(!is_transient(&not_found));
        assert!(is_transient(&throttled));
        assert!(is_transient(&unavailable));
        assert!(is_transient(&reset));
        assert!(!is_transient(&anyhow::anyhow!("other")));
    }

    #[tokio::test]
    async fn test_download_as_text_retries_server_errors() {
        let http = FakeHttp::new();
        http.fail_text_times("https://example.test/t", 503, 2);
        http.add_text("https://example.test/t", "body");

        let text = download_as_text(&http, "https://example.test/t").await.unwrap();

        assert_eq!(text, "body");
        assert_eq!(http.text_requests("https://example.test/t"), 3);
    }

    #[tokio::test]
    async fn test_download_as_text_does_not_retry_not_found() {
        let http = FakeHttp::new();

        let err = download_as_text(&http, "https://example.test/missing").await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<WptlError>(),
            Some(WptlError::DownloadFailed {
                status: Some(404),
                ..
            })
        ));
        assert_eq!(http.text_requests("https://example.test/missing"), 1);
    }
}
