//! Global constants used throughout the setup-wptl codebase.
//!
//! Endpoint URLs, on-disk names, cache key schema and retry/timeout values
//! live here so that the provisioning code never hard-codes them inline.

use std::time::Duration;

/// Version-check feed used to resolve `latest`.
///
/// The plain-http variant of the endpoint returns the unfiltered offer list,
/// with the newest published release at index 0.
pub const LATEST_VERSION_FEED_URL: &str = "http://api.wordpress.org/core/version-check/1.7/";

/// Version-check feed used to resolve branch wildcards such as `6.4.x`.
pub const VERSION_FEED_URL: &str = "https://api.wordpress.org/core/version-check/1.7/";

/// Archive URL for the rolling development build.
pub const NIGHTLY_BUILD_URL: &str = "https://wordpress.org/nightly-builds/wordpress-latest.zip";

/// Prefix of versioned release archives; the full URL is `{prefix}{version}.zip`.
pub const WORDPRESS_DOWNLOAD_PREFIX: &str = "https://wordpress.org/wordpress-";

/// Base URL of the WordPress develop Subversion repository.
pub const SVN_BASE_URL: &str = "https://develop.svn.wordpress.org/";

/// Resolved version sentinel for the rolling development build.
pub const NIGHTLY: &str = "nightly";

/// Specifier alias of [`NIGHTLY`].
pub const TRUNK: &str = "trunk";

/// Specifier resolved through the version feed.
pub const LATEST: &str = "latest";

/// Suffix marking a branch wildcard specifier.
pub const BRANCH_SUFFIX: &str = ".x";

/// Name of the transient archive downloaded into the target directory.
pub const WORDPRESS_ARCHIVE_NAME: &str = "wordpress.zip";

/// Subtree of the test library holding the PHPUnit bootstrap code.
pub const TESTS_INCLUDES_PATH: &str = "tests/phpunit/includes/";

/// Subtree of the test library holding the PHPUnit fixtures.
pub const TESTS_DATA_PATH: &str = "tests/phpunit/data/";

/// Configuration template published at the root of the test library tag.
pub const CONFIG_TEMPLATE_NAME: &str = "wp-tests-config-sample.php";

/// Generated configuration file written into the test library directory.
pub const CONFIG_FILE_NAME: &str = "wp-tests-config.php";

/// Version-control metadata directory removed after every checkout.
pub const SVN_METADATA_DIR: &str = ".svn";

/// Schema tag prepended to every remote cache key.
///
/// Bump it whenever the layout of cached trees changes so older entries are
/// never restored into a newer layout.
pub const CACHE_SCHEMA_VERSION: &str = "1";

/// Environment variable exported for downstream steps.
pub const WP_TESTS_DIR_ENV: &str = "WP_TESTS_DIR";

/// Environment variable pointing at the machine-local tool cache.
pub const RUNNER_TOOL_CACHE_ENV: &str = "RUNNER_TOOL_CACHE";

/// Environment variable naming the server the job runs against.
pub const SERVER_URL_ENV: &str = "GITHUB_SERVER_URL";

/// Hostname of the default (hosted) deployment.
pub const DEFAULT_SERVER_HOST: &str = "github.com";

/// Environment variable pointing at the runner's per-job temp directory.
pub const RUNNER_TEMP_ENV: &str = "RUNNER_TEMP";

/// File name prefix of the two-phase state file.
///
/// The full name is `{prefix}{hash of the target directory}.json`.
pub const STATE_FILE_PREFIX: &str = "setup-wptl-state-";

/// Number of retries for the configuration template download.
pub const TEXT_DOWNLOAD_RETRIES: usize = 3;

/// Base of the exponential backoff between download retries (ms).
///
/// Successive delays are 10ms, 100ms, 1s.
pub const STARTING_BACKOFF_DELAY_MS: u64 = 10;

/// Maximum backoff delay between download retries.
pub const MAX_BACKOFF_DELAY: Duration = Duration::from_secs(5);

/// Timeout for the `svn --version` availability check.
///
/// Checkouts themselves are never bounded.
pub const SVN_VERSION_TIMEOUT: Duration = Duration::from_secs(30);

/// User agent sent with every HTTP request.
pub const USER_AGENT: &str = concat!("setup-wptl/", env!("CARGO_PKG_VERSION"));
