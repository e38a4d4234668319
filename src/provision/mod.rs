//! The provisioning pipeline of a setup run.
//!
//! A run goes through these phases:
//!
//! 1. check that the target directory exists (before any I/O)
//! 2. resolve the version specifier
//! 3. normalize the resolved version and derive [`RunState`]
//! 4. purge stale trees and archives from previous runs
//! 5. provision WordPress and the test library concurrently, each through
//!    the cache chain first and a fresh fetch second
//! 6. generate `wp-tests-config.php`
//!
//! Nothing is reported as an output until every phase has completed; see
//! [`crate::outputs`].

pub mod archive;
pub mod config_file;

pub use archive::{ArchiveGuard, extract_zip};
pub use config_file::{ConfigMaterializer, TemplateSource};

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::cache::{CacheLookupChain, CacheOutcome, LookupRequest, RemoteCache, ToolCache};
use crate::config::{CacheAvailability, SetupConfig};
use crate::constants::{
    CONFIG_FILE_NAME, CONFIG_TEMPLATE_NAME, NIGHTLY, SVN_METADATA_DIR, TESTS_DATA_PATH,
    TESTS_INCLUDES_PATH, WORDPRESS_ARCHIVE_NAME,
};
use crate::core::WptlError;
use crate::http::HttpTransport;
use crate::state::PendingPersist;
use crate::svn::Checkout;
use crate::utils::fs::{ensure_dir, is_dir, remove_path};
use crate::version::coerce;
use crate::wordpress::{Artifact, ReleaseFeed, VersionResolver, download_url, test_library_base_url};

/// State of one provisioning run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunState {
    /// Absolute target directory
    pub dir: PathBuf,
    /// Resolved version or the `nightly` sentinel
    pub version: String,
    /// Normalized `MAJOR.MINOR.PATCH`, when the version has one
    pub semver: Option<String>,
    /// Caches that may be consulted
    pub caches: CacheAvailability,
    /// Remote-cache misses to be saved by the finalize run
    pub pending: Vec<PendingPersist>,
}

impl RunState {
    /// Derives the run state for a resolved version.
    ///
    /// Caching is disabled for the whole run when the version has no
    /// semantic form, and for the rolling build even when it has one.
    pub fn new(dir: PathBuf, version: String, detected: CacheAvailability) -> Self {
        let semver = coerce(&version).map(|v| v.to_string());
        let caches = if semver.is_none() || version == NIGHTLY {
            CacheAvailability::disabled()
        } else {
            detected
        };

        Self {
            dir,
            version,
            semver,
            caches,
            pending: Vec::new(),
        }
    }

    /// Directory of `artifact` inside the target directory.
    pub fn artifact_dir(&self, artifact: Artifact) -> PathBuf {
        self.dir.join(artifact.name())
    }

    /// Base URL of the test library snapshot for this version.
    pub fn test_library_url(&self) -> String {
        test_library_base_url(&self.version)
    }
}

/// Result of a completed provisioning run.
#[derive(Debug, Clone)]
pub struct Provisioned {
    /// Final run state, including pending cache saves
    pub state: RunState,
    /// The WordPress tree
    pub wordpress_dir: PathBuf,
    /// The test library tree
    pub test_library_dir: PathBuf,
}

/// Runs the provisioning pipeline against injected collaborators.
pub struct Provisioner {
    http: Arc<dyn HttpTransport>,
    feed: Arc<dyn ReleaseFeed>,
    svn: Arc<dyn Checkout>,
    tool_cache: Option<Arc<dyn ToolCache>>,
    remote_cache: Option<Arc<dyn RemoteCache>>,
}

impl Provisioner {
    /// Creates a provisioner without caches.
    pub fn new(
        http: Arc<dyn HttpTransport>,
        feed: Arc<dyn ReleaseFeed>,
        svn: Arc<dyn Checkout>,
    ) -> Self {
        Self {
            http,
            feed,
            svn,
            tool_cache: None,
            remote_cache: None,
        }
    }

    /// Adds the machine-local tool cache.
    #[must_use]
    pub fn with_tool_cache(mut self, cache: Arc<dyn ToolCache>) -> Self {
        self.tool_cache = Some(cache);
        self
    }

    /// Adds the remote cache.
    #[must_use]
    pub fn with_remote_cache(mut self, cache: Arc<dyn RemoteCache>) -> Self {
        self.remote_cache = Some(cache);
        self
    }

    /// Caches configured on this provisioner.
    pub const fn configured_caches(&self) -> CacheAvailability {
        CacheAvailability {
            tool_cache: self.tool_cache.is_some(),
            remote_cache: self.remote_cache.is_some(),
        }
    }

    fn chain(&self, caches: CacheAvailability) -> CacheLookupChain {
        CacheLookupChain::from_caches(
            self.tool_cache.clone().filter(|_| caches.tool_cache),
            self.remote_cache.clone().filter(|_| caches.remote_cache),
        )
    }

    /// Runs every phase for `config`.
    ///
    /// `detected` is the cache availability computed from the runner
    /// environment; it is narrowed to the caches actually configured.
    ///
    /// # Errors
    ///
    /// Any failure aborts the run. The transient archive is removed on every
    /// path; partially populated trees are left for the next run to purge.
    pub async fn run(&self, config: &SetupConfig, detected: CacheAvailability) -> Result<Provisioned> {
        if !is_dir(&config.dir).await {
            return Err(WptlError::DirectoryNotFound {
                path: config.dir.display().to_string(),
            }
            .into());
        }

        info!("🤔 Determining WordPress version…");
        let version = VersionResolver::new(self.feed.as_ref()).resolve(&config.version).await?;
        info!("ℹ️ WordPress version: {}", version);

        let configured = self.configured_caches();
        let detected = CacheAvailability {
            tool_cache: detected.tool_cache && configured.tool_cache,
            remote_cache: detected.remote_cache && configured.remote_cache,
        };
        let mut state = RunState::new(config.dir.clone(), version, detected);
        debug!("Semantic version: {:?}", state.semver);

        purge_stale(&state.dir).await?;

        info!("ℹ️ Cache is available: {}", yes_no(state.caches.remote_cache));
        info!("ℹ️ Tool cache is available: {}", yes_no(state.caches.tool_cache));

        let chain = self.chain(state.caches);
        let (wordpress, test_library) = tokio::join!(
            self.provision_wordpress(&state, &chain, &config.cache_prefix),
            self.provision_test_library(&state, &chain, &config.cache_prefix),
        );
        state.pending.extend(wordpress?);
        state.pending.extend(test_library?);

        info!("⚙️ Configuring WordPress…");
        let wordpress_dir = state.artifact_dir(Artifact::WordPress);
        let test_library_dir = state.artifact_dir(Artifact::TestLibrary);
        let source = match &config.config_template {
            Some(path) => TemplateSource::File(path.clone()),
            None => TemplateSource::Url(format!("{}/{CONFIG_TEMPLATE_NAME}", state.test_library_url())),
        };
        ConfigMaterializer::new(self.http.as_ref())
            .materialize(
                &source,
                &config.database,
                &wordpress_dir,
                &test_library_dir.join(CONFIG_FILE_NAME),
            )
            .await?;

        Ok(Provisioned {
            state,
            wordpress_dir,
            test_library_dir,
        })
    }

    async fn lookup(
        &self,
        artifact: Artifact,
        state: &RunState,
        chain: &CacheLookupChain,
        prefix: &str,
    ) -> Result<CacheOutcome> {
        let Some(semver) = state.semver.as_deref() else {
            return Ok(CacheOutcome::Unavailable);
        };

        chain
            .lookup(&LookupRequest {
                artifact,
                semver,
                target_dir: &state.dir,
                prefix,
            })
            .await
    }

    async fn seed_tool_cache(&self, state: &RunState, artifact: Artifact) -> Result<()> {
        let (Some(cache), Some(semver)) = (&self.tool_cache, state.semver.as_deref()) else {
            return Ok(());
        };
        if !state.caches.tool_cache {
            return Ok(());
        }

        cache.cache_dir(&state.artifact_dir(artifact), artifact.name(), semver).await?;
        Ok(())
    }

    /// Provisions the WordPress tree, returning its pending cache save.
    pub async fn provision_wordpress(
        &self,
        state: &RunState,
        chain: &CacheLookupChain,
        prefix: &str,
    ) -> Result<Option<PendingPersist>> {
        let archive = ArchiveGuard::new(state.dir.join(WORDPRESS_ARCHIVE_NAME));

        let outcome = self.lookup(Artifact::WordPress, state, chain, prefix).await?;
        if outcome.is_hit() {
            return Ok(None);
        }

        info!("📥 Downloading WordPress…");
        self.http.download(&download_url(&state.version), archive.path()).await?;
        extract_zip(archive.path(), &state.dir).await?;
        self.seed_tool_cache(state, Artifact::WordPress).await?;

        Ok(outcome.into_pending())
    }

    /// Provisions the test library tree, returning its pending cache save.
    pub async fn provision_test_library(
        &self,
        state: &RunState,
        chain: &CacheLookupChain,
        prefix: &str,
    ) -> Result<Option<PendingPersist>> {
        let outcome = self.lookup(Artifact::TestLibrary, state, chain, prefix).await?;
        if outcome.is_hit() {
            return Ok(None);
        }

        self.svn.ensure_available()?;

        info!("📥 Downloading WordPress Test Library…");
        let dir = state.artifact_dir(Artifact::TestLibrary);
        ensure_dir(&dir)?;

        let base = state.test_library_url();
        let includes = dir.join("includes");
        let data = dir.join("data");
        let includes_url = format!("{base}/{TESTS_INCLUDES_PATH}");
        let data_url = format!("{base}/{TESTS_DATA_PATH}");
        tokio::try_join!(
            self.svn.checkout(&includes_url, &includes),
            self.svn.checkout(&data_url, &data),
        )?;
        let includes_svn = includes.join(SVN_METADATA_DIR);
        let data_svn = data.join(SVN_METADATA_DIR);
        tokio::try_join!(remove_path(&includes_svn), remove_path(&data_svn))?;

        self.seed_tool_cache(state, Artifact::TestLibrary).await?;

        Ok(outcome.into_pending())
    }
}

/// Removes both artifact trees and the transient archive of a previous run.
pub async fn purge_stale(dir: &Path) -> Result<()> {
    let [wordpress, test_library] = Artifact::ALL.map(|artifact| dir.join(artifact.name()));
    let archive = dir.join(WORDPRESS_ARCHIVE_NAME);
    tokio::try_join!(
        remove_path(&wordpress),
        remove_path(&test_library),
        remove_path(&archive),
    )?;
    Ok(())
}

const fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RawInputs;
    use crate::constants::NIGHTLY_BUILD_URL;
    use crate::test_utils::{
        FakeCheckout, FakeFeed, FakeHttp, FakeRemoteCache, FakeToolCache, write_zip,
    };
    use tempfile::TempDir;

    const SAMPLE: &str = "define( 'ABSPATH', dirname( __FILE__ ) . '/src/' );
define( 'DB_NAME', 'youremptytestdbnamehere' );
define( 'DB_USER', 'yourusernamehere' );
define( 'DB_PASSWORD', 'yourpasswordhere' );
define( 'DB_HOST', 'localhost' );
";

    const ALL_CACHES: CacheAvailability = CacheAvailability {
        tool_cache: true,
        remote_cache: true,
    };

    struct Fixture {
        temp: TempDir,
        http: Arc<FakeHttp>,
        svn: Arc<FakeCheckout>,
        tool: Arc<FakeToolCache>,
        remote: Arc<FakeRemoteCache>,
    }

    impl Fixture {
        fn new(version: &str) -> Self {
            let temp = TempDir::new().unwrap();
            let http = Arc::new(FakeHttp::new());
            let zip_path = temp.path().join("upstream.zip");
            write_zip(&zip_path, &[("wordpress/index.php", "<?php // wp")]);
            http.add_file(&download_url(version), std::fs::read(&zip_path).unwrap());
            http.add_text(
                &format!("{}/{CONFIG_TEMPLATE_NAME}", test_library_base_url(version)),
                SAMPLE,
            );

            Self {
                temp,
                http,
                svn: Arc::new(FakeCheckout::new()),
                tool: Arc::new(FakeToolCache::new()),
                remote: Arc::new(FakeRemoteCache::new()),
            }
        }

        fn target(&self) -> PathBuf {
            let dir = self.temp.path().join("target");
            std::fs::create_dir_all(&dir).unwrap();
            dir
        }

        fn provisioner(&self, feed: FakeFeed) -> Provisioner {
            Provisioner::new(self.http.clone(), Arc::new(feed), self.svn.clone())
                .with_tool_cache(self.tool.clone())
                .with_remote_cache(self.remote.clone())
        }

        fn config(&self, version: &str) -> SetupConfig {
            SetupConfig::from_inputs(RawInputs {
                version: Some(version.to_string()),
                dir: Some(self.target().display().to_string()),
                cache_prefix: Some("ci".to_string()),
                ..RawInputs::default()
            })
            .unwrap()
        }
    }

    fn feed() -> FakeFeed {
        FakeFeed::new("6.4.3", &["6.4.3", "6.3.3"])
    }

    #[test]
    fn test_run_state_disables_caches_without_semver() {
        let state = RunState::new(PathBuf::from("/w"), "nightly".to_string(), ALL_CACHES);
        assert!(state.semver.is_none());
        assert!(!state.caches.any());

        let state = RunState::new(PathBuf::from("/w"), "6.4".to_string(), ALL_CACHES);
        assert_eq!(state.semver.as_deref(), Some("6.4.0"));
        assert_eq!(state.caches, ALL_CACHES);
    }

    #[tokio::test]
    async fn test_missing_directory_fails_before_any_io() {
        let fixture = Fixture::new("6.4.3");
        let feed = feed();
        let mut config = fixture.config("latest");
        config.dir = fixture.temp.path().join("does-not-exist");

        let err = Provisioner::new(fixture.http.clone(), Arc::new(feed.clone()), fixture.svn.clone())
            .run(&config, ALL_CACHES)
            .await
            .unwrap_err();

        assert!(matches!(err.downcast_ref::<WptlError>(), Some(WptlError::DirectoryNotFound { .. })));
        assert!(err.to_string().ends_with("does not exist"));
        assert_eq!(feed.calls(), 0);
        assert_eq!(fixture.http.total_requests(), 0);
    }

    #[tokio::test]
    async fn test_fresh_run_provisions_both_artifacts() {
        let fixture = Fixture::new("6.4.3");
        let config = fixture.config("latest");

        let provisioned = fixture.provisioner(feed()).run(&config, ALL_CACHES).await.unwrap();

        assert_eq!(provisioned.state.version, "6.4.3");
        assert!(provisioned.wordpress_dir.join("index.php").exists());
        assert!(provisioned.test_library_dir.join("includes").is_dir());
        assert!(provisioned.test_library_dir.join("data").is_dir());
        assert!(!provisioned.test_library_dir.join("includes/.svn").exists());
        assert!(!config.dir.join(WORDPRESS_ARCHIVE_NAME).exists());

        let generated =
            std::fs::read_to_string(provisioned.test_library_dir.join(CONFIG_FILE_NAME)).unwrap();
        assert!(generated.contains("'DB_HOST', '127.0.0.1'"));
        assert!(generated.contains(&format!("'{}/'", provisioned.wordpress_dir.display())));

        assert_eq!(
            fixture.svn.checkouts(),
            vec![
                "https://develop.svn.wordpress.org/tags/6.4.3/tests/phpunit/data/".to_string(),
                "https://develop.svn.wordpress.org/tags/6.4.3/tests/phpunit/includes/".to_string(),
            ]
        );
        assert!(fixture.tool.contains("wordpress", "6.4.3"));
        assert!(fixture.tool.contains("wordpress-tests-lib", "6.4.3"));
    }

    #[tokio::test]
    async fn test_pending_keys_share_the_semantic_version() {
        let fixture = Fixture::new("6.4.3");
        let config = fixture.config("6.4.3");

        let provisioned = fixture.provisioner(feed()).run(&config, ALL_CACHES).await.unwrap();

        let keys: Vec<_> = provisioned.state.pending.iter().map(|p| p.key.as_str()).collect();
        assert_eq!(keys, vec!["1:ci:wordpress:6.4.3", "1:ci:wordpress-tests-lib:6.4.3"]);
        assert!(provisioned.state.pending.iter().all(|p| p.directory == config.dir));
    }

    #[tokio::test]
    async fn test_nightly_never_touches_caches() {
        let fixture = Fixture::new("nightly");
        let config = fixture.config("trunk");

        let provisioned = fixture.provisioner(feed()).run(&config, ALL_CACHES).await.unwrap();

        assert_eq!(provisioned.state.version, "nightly");
        assert!(!provisioned.state.caches.any());
        assert!(provisioned.state.pending.is_empty());
        assert_eq!(fixture.remote.restore_calls(), 0);
        assert_eq!(fixture.tool.find_calls(), 0);
        assert_eq!(fixture.http.file_requests(NIGHTLY_BUILD_URL), 1);
        assert_eq!(
            fixture.svn.checkouts()[0],
            "https://develop.svn.wordpress.org/trunk/tests/phpunit/data/"
        );
    }

    #[tokio::test]
    async fn test_remote_hit_skips_fetch() {
        let fixture = Fixture::new("6.4.3");
        let config = fixture.config("6.4.3");
        fixture.remote.insert("1:ci:wordpress:6.4.3");
        fixture.remote.insert("1:ci:wordpress-tests-lib:6.4.3");

        let provisioned = fixture.provisioner(feed()).run(&config, ALL_CACHES).await.unwrap();

        assert!(provisioned.state.pending.is_empty());
        assert_eq!(fixture.http.file_requests(&download_url("6.4.3")), 0);
        assert!(fixture.svn.checkouts().is_empty());
    }

    #[tokio::test]
    async fn test_stale_trees_are_purged() {
        let fixture = Fixture::new("6.4.3");
        let config = fixture.config("6.4.3");
        std::fs::create_dir_all(config.dir.join("wordpress")).unwrap();
        std::fs::write(config.dir.join("wordpress/stale.php"), "old").unwrap();
        std::fs::write(config.dir.join(WORDPRESS_ARCHIVE_NAME), "old").unwrap();

        let provisioned = fixture
            .provisioner(feed())
            .run(&config, CacheAvailability::disabled())
            .await
            .unwrap();

        assert!(!provisioned.wordpress_dir.join("stale.php").exists());
        assert!(provisioned.wordpress_dir.join("index.php").exists());
    }

    #[tokio::test]
    async fn test_extract_failure_removes_archive() {
        let fixture = Fixture::new("6.4.3");
        fixture.http.add_file(&download_url("6.4.3"), b"<html>not a zip</html>".to_vec());
        let config = fixture.config("6.4.3");

        let err = fixture.provisioner(feed()).run(&config, ALL_CACHES).await.unwrap_err();

        assert!(matches!(err.downcast_ref::<WptlError>(), Some(WptlError::ExtractFailed { .. })));
        assert!(!config.dir.join(WORDPRESS_ARCHIVE_NAME).exists());
    }

    #[tokio::test]
    async fn test_download_failure_fails_the_run() {
        let fixture = Fixture::new("6.4.3");
        let config = fixture.config("6.9.9");

        let err = fixture
            .provisioner(feed())
            .run(&config, CacheAvailability::disabled())
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<WptlError>(),
            Some(WptlError::DownloadFailed { status: Some(404), .. })
        ));
        assert!(!config.dir.join(WORDPRESS_ARCHIVE_NAME).exists());
    }

    #[tokio::test]
    async fn test_missing_svn_fails_the_run() {
        let fixture = Fixture::new("6.4.3");
        fixture.svn.set_available(false);
        let config = fixture.config("6.4.3");

        let err = fixture
            .provisioner(feed())
            .run(&config, CacheAvailability::disabled())
            .await
            .unwrap_err();

        assert!(matches!(err.downcast_ref::<WptlError>(), Some(WptlError::SvnNotFound)));
    }

    #[tokio::test]
    async fn test_feed_failure_is_a_resolution_error() {
        let fixture = Fixture::new("6.4.3");
        let config = fixture.config("latest");

        let err = fixture
            .provisioner(FakeFeed::unreachable())
            .run(&config, ALL_CACHES)
            .await
            .unwrap_err();

        assert!(matches!(err.downcast_ref::<WptlError>(), Some(WptlError::VersionFeedFailed { .. })));
        assert_eq!(fixture.http.total_requests(), 0);
    }
}
