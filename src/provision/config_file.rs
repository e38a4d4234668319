//! Generation of `wp-tests-config.php` from the published sample.
//!
//! The sample contains one placeholder per setting. Each placeholder is
//! replaced exactly once, at its first occurrence, in a fixed order:
//!
//! | Marker | Value |
//! |---|---|
//! | `youremptytestdbnamehere` | database name |
//! | `yourusernamehere` | database user |
//! | `yourpasswordhere` | database password |
//! | `localhost` | database host |
//! | `dirname( __FILE__ ) . '/src/'` | `'<dir>/wordpress/'` |
//!
//! Later occurrences are left untouched: the sample mentions `localhost`
//! again in comments and `WP_TESTS_DOMAIN`, and those must keep their value.

use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::DatabaseSettings;
use crate::core::WptlError;
use crate::http::{HttpTransport, download_as_text};

/// Marker of the WordPress source directory in the sample.
pub const SOURCE_DIR_MARKER: &str = "dirname( __FILE__ ) . '/src/'";

/// Where the configuration template comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    /// Fetched over HTTP, with bounded retries
    Url(String),
    /// Read from a local file
    File(PathBuf),
}

impl TemplateSource {
    fn location(&self) -> String {
        match self {
            Self::Url(url) => url.clone(),
            Self::File(path) => path.display().to_string(),
        }
    }
}

/// Ordered `(marker, value)` pairs for the given settings.
pub fn substitutions(database: &DatabaseSettings, wordpress_dir: &Path) -> Vec<(&'static str, String)> {
    let source_dir = format!("'{}/'", wordpress_dir.display());
    vec![
        ("youremptytestdbnamehere", database.name.clone()),
        ("yourusernamehere", database.user.clone()),
        ("yourpasswordhere", database.password.clone()),
        ("localhost", database.host.clone()),
        (SOURCE_DIR_MARKER, source_dir),
    ]
}

/// Replaces the first occurrence of each marker, in order.
///
/// Not a global replace; see the module documentation.
#[must_use]
pub fn replace_first_occurrences(template: &str, substitutions: &[(&str, String)]) -> String {
    substitutions
        .iter()
        .fold(template.to_string(), |text, (marker, value)| text.replacen(marker, value, 1))
}

/// Turns a template into the test configuration file.
pub struct ConfigMaterializer<'a> {
    http: &'a dyn HttpTransport,
}

impl<'a> ConfigMaterializer<'a> {
    /// Fetches remote templates through `http`.
    pub fn new(http: &'a dyn HttpTransport) -> Self {
        Self {
            http,
        }
    }

    async fn template(&self, source: &TemplateSource) -> Result<String> {
        let text = match source {
            TemplateSource::Url(url) => download_as_text(self.http, url).await,
            TemplateSource::File(path) => tokio::fs::read_to_string(path).await.map_err(Into::into),
        };

        text.map_err(|e| {
            WptlError::TemplateUnavailable {
                location: source.location(),
                reason: format!("{e:#}"),
            }
            .into()
        })
    }

    /// Writes the configuration generated from `source` to `dest`.
    ///
    /// # Errors
    ///
    /// - [`WptlError::TemplateUnavailable`] when the template cannot be obtained
    /// - [`WptlError::FileSystemError`] when `dest` cannot be written
    pub async fn materialize(
        &self,
        source: &TemplateSource,
        database: &DatabaseSettings,
        wordpress_dir: &Path,
        dest: &Path,
    ) -> Result<()> {
        let template = self.template(source).await?;
        let config = replace_first_occurrences(&template, &substitutions(database, wordpress_dir));

        tokio::fs::write(dest, config).await.map_err(|e| WptlError::FileSystemError {
            operation: format!("write configuration: {e}"),
            path: dest.display().to_string(),
        })?;

        debug!("Wrote {}", dest.display());
        Ok(())
    }
}
