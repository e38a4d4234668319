//! WordPress-specific knowledge: the two provisioned artifacts, their
//! upstream locations and version resolution.

pub mod api;
pub mod resolver;

pub use api::{Offer, ReleaseFeed, WordPressApi};
pub use resolver::VersionResolver;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::{NIGHTLY, NIGHTLY_BUILD_URL, SVN_BASE_URL, WORDPRESS_DOWNLOAD_PREFIX};

/// One of the two trees provisioned into the target directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Artifact {
    /// The WordPress core distribution
    #[serde(rename = "wordpress")]
    WordPress,
    /// The PHPUnit scaffold (`includes/`, `data/`, generated config)
    #[serde(rename = "wordpress-tests-lib")]
    TestLibrary,
}

impl Artifact {
    /// Both artifacts, in the order they are persisted.
    pub const ALL: [Self; 2] = [Self::WordPress, Self::TestLibrary];

    /// Logical name, also used as subdirectory name and cache tool name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::WordPress => "wordpress",
            Self::TestLibrary => "wordpress-tests-lib",
        }
    }

    /// Human-readable name for log lines.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::WordPress => "WordPress",
            Self::TestLibrary => "WordPress Test Library",
        }
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Archive URL for a resolved version.
#[must_use]
pub fn download_url(version: &str) -> String {
    if version == NIGHTLY {
        return NIGHTLY_BUILD_URL.to_string();
    }

    format!("{WORDPRESS_DOWNLOAD_PREFIX}{version}.zip")
}

/// Base URL of the develop repository snapshot matching a resolved version.
#[must_use]
pub fn test_library_base_url(version: &str) -> String {
    let tag = if version == NIGHTLY {
        "trunk".to_string()
    } else {
        format!("tags/{version}")
    };
    format!("{SVN_BASE_URL}{tag}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_url() {
        assert_eq!(download_url("6.4.3"), "https://wordpress.org/wordpress-6.4.3.zip");
        assert_eq!(
            download_url("nightly"),
            "https://wordpress.org/nightly-builds/wordpress-latest.zip"
        );
    }

    #[test]
    fn test_test_library_base_url() {
        assert_eq!(test_library_base_url("6.4.3"), "https://develop.svn.wordpress.org/tags/6.4.3");
        assert_eq!(test_library_base_url("nightly"), "https://develop.svn.wordpress.org/trunk");
    }

    #[test]
    fn test_artifact_names_roundtrip_through_serde() {
        assert_eq!(Artifact::TestLibrary.to_string(), "wordpress-tests-lib");
        let json = serde_json::to_string(&Artifact::TestLibrary).unwrap();
        assert_eq!(json, "\"wordpress-tests-lib\"");
        let back: Artifact = serde_json::from_str("\"wordpress\"").unwrap();
        assert_eq!(back, Artifact::WordPress);
    }
}
