//! Test utilities for setup-wptl
//!
//! In-memory implementations of the collaborator traits so the provisioning
//! pipeline, the cache chain and the finalize step can be exercised without
//! network access, Subversion or a runner environment:
//!
//! - [`FakeHttp`] for [`HttpTransport`]
//! - [`FakeFeed`] for [`ReleaseFeed`]
//! - [`FakeCheckout`] for [`Checkout`]
//! - [`FakeToolCache`] for [`ToolCache`]
//! - [`FakeRemoteCache`] for [`RemoteCache`]
//!
//! Every fake records the calls it receives so tests can assert on them.
//!
//! # Example
//!
//! ```rust,no_run
//! use setup_wptl::test_utils::FakeFeed;
//! use setup_wptl::wordpress::VersionResolver;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let feed = FakeFeed::new("6.4.3", &["6.4.3", "6.3.3"]);
//! let version = VersionResolver::new(&feed).resolve("6.x").await?;
//! assert_eq!(version, "6.4.3");
//! # Ok(())
//! # }
//! ```

use anyhow::Result;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::cache::{RemoteCache, ToolCache};
use crate::core::WptlError;
use crate::http::HttpTransport;
use crate::svn::Checkout;
use crate::wordpress::ReleaseFeed;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Respects `RUST_LOG` when no level is given; without either, logging stays
/// off.
///
/// ```bash
/// RUST_LOG=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .with_ansi(true)
            .try_init();
    });
}

/// Writes a zip archive containing `(name, content)` file entries.
pub fn write_zip(path: &Path, entries: &[(&str, &str)]) {
    let file = std::fs::File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default();
    for (name, content) in entries {
        zip.start_file(*name, options).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
}

fn not_found(url: &str) -> anyhow::Error {
    WptlError::DownloadFailed {
        url: url.to_string(),
        reason: "error 404".to_string(),
        status: Some(404),
    }
    .into()
}

#[derive(Default)]
struct FakeHttpState {
    texts: HashMap<String, String>,
    files: HashMap<String, Vec<u8>>,
    failures: HashMap<String, (u16, usize)>,
    text_requests: HashMap<String, usize>,
    file_requests: HashMap<String, usize>,
}

/// [`HttpTransport`] serving registered bodies; unknown URLs answer 404.
#[derive(Default)]
pub struct FakeHttp {
    state: Mutex<FakeHttpState>,
}

impl FakeHttp {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `body` for text requests to `url`.
    pub fn add_text(&self, url: &str, body: &str) {
        self.state.lock().unwrap().texts.insert(url.to_string(), body.to_string());
    }

    /// Serves `bytes` for downloads of `url`.
    pub fn add_file(&self, url: &str, bytes: Vec<u8>) {
        self.state.lock().unwrap().files.insert(url.to_string(), bytes);
    }

    /// Fails the next `times` text requests to `url` with `status`.
    pub fn fail_text_times(&self, url: &str, status: u16, times: usize) {
        self.state.lock().unwrap().failures.insert(url.to_string(), (status, times));
    }

    /// Number of text requests made to `url`.
    pub fn text_requests(&self, url: &str) -> usize {
        self.state.lock().unwrap().text_requests.get(url).copied().unwrap_or(0)
    }

    /// Number of downloads of `url`.
    pub fn file_requests(&self, url: &str) -> usize {
        self.state.lock().unwrap().file_requests.get(url).copied().unwrap_or(0)
    }

    /// Number of requests of any kind.
    pub fn total_requests(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.text_requests.values().sum::<usize>() + state.file_requests.values().sum::<usize>()
    }
}

#[async_trait]
impl HttpTransport for FakeHttp {
    async fn get_text(&self, url: &str) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        *state.text_requests.entry(url.to_string()).or_default() += 1;

        if let Some((status, remaining)) = state.failures.get_mut(url) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(WptlError::DownloadFailed {
                    url: url.to_string(),
                    reason: format!("error {status}"),
                    status: Some(*status),
                }
                .into());
            }
        }

        state.texts.get(url).cloned().ok_or_else(|| not_found(url))
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<()> {
        let bytes = {
            let mut state = self.state.lock().unwrap();
            *state.file_requests.entry(url.to_string()).or_default() += 1;
            state.files.get(url).cloned().ok_or_else(|| not_found(url))?
        };

        tokio::fs::write(dest, bytes).await?;
        Ok(())
    }
}

/// [`ReleaseFeed`] with a fixed offer list. Clones share the call counter.
#[derive(Clone)]
pub struct FakeFeed {
    latest: String,
    versions: Vec<String>,
    reachable: bool,
    calls: Arc<AtomicUsize>,
}

impl FakeFeed {
    /// A feed whose newest offer is `latest` and whose full list is `versions`.
    pub fn new(latest: &str, versions: &[&str]) -> Self {
        Self {
            latest: latest.to_string(),
            versions: versions.iter().map(|v| (*v).to_string()).collect(),
            reachable: true,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A feed that fails every request.
    pub fn unreachable() -> Self {
        Self {
            reachable: false,
            ..Self::new("", &[])
        }
    }

    /// Number of feed requests made.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn request(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.reachable {
            Ok(())
        } else {
            Err(WptlError::VersionFeedFailed {
                url: "https://api.wordpress.org/core/version-check/1.7/".to_string(),
                reason: "error 503".to_string(),
            }
            .into())
        }
    }
}

#[async_trait]
impl ReleaseFeed for FakeFeed {
    async fn latest_version(&self) -> Result<String> {
        self.request()?;
        Ok(self.latest.clone())
    }

    async fn versions(&self) -> Result<Vec<String>> {
        self.request()?;
        Ok(self.versions.clone())
    }
}

/// [`Checkout`] that creates a small tree with version-control metadata.
pub struct FakeCheckout {
    available: AtomicBool,
    checkouts: Mutex<Vec<String>>,
}

impl Default for FakeCheckout {
    fn default() -> Self {
        Self {
            available: AtomicBool::new(true),
            checkouts: Mutex::new(Vec::new()),
        }
    }
}

impl FakeCheckout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates a missing or present client.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// URLs checked out so far, sorted (checkouts run concurrently).
    pub fn checkouts(&self) -> Vec<String> {
        let mut urls = self.checkouts.lock().unwrap().clone();
        urls.sort();
        urls
    }
}

#[async_trait]
impl Checkout for FakeCheckout {
    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn checkout(&self, url: &str, target: &Path) -> Result<()> {
        self.checkouts.lock().unwrap().push(url.to_string());
        tokio::fs::create_dir_all(target.join(".svn")).await?;
        tokio::fs::write(target.join(".svn/wc.db"), b"").await?;
        tokio::fs::write(target.join("bootstrap.php"), b"<?php").await?;
        Ok(())
    }
}

/// [`ToolCache`] backed by a map; cached trees are not copied.
#[derive(Default)]
pub struct FakeToolCache {
    entries: Mutex<HashMap<(String, String), PathBuf>>,
    find_calls: AtomicUsize,
}

impl FakeToolCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `path` as the cached tree of `(tool, version)`.
    pub fn insert(&self, tool: &str, version: &str, path: &Path) {
        self.entries
            .lock()
            .unwrap()
            .insert((tool.to_string(), version.to_string()), path.to_path_buf());
    }

    /// `true` when `(tool, version)` has been cached.
    pub fn contains(&self, tool: &str, version: &str) -> bool {
        self.entries.lock().unwrap().contains_key(&(tool.to_string(), version.to_string()))
    }

    /// Number of lookups made.
    pub fn find_calls(&self) -> usize {
        self.find_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ToolCache for FakeToolCache {
    async fn find(&self, tool: &str, version: &str) -> Result<Option<PathBuf>> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.entries.lock().unwrap().get(&(tool.to_string(), version.to_string())).cloned())
    }

    async fn cache_dir(&self, source: &Path, tool: &str, version: &str) -> Result<PathBuf> {
        self.insert(tool, version, source);
        Ok(source.to_path_buf())
    }
}

/// [`RemoteCache`] holding a set of keys.
///
/// A hit materializes each requested path as an empty directory.
#[derive(Default)]
pub struct FakeRemoteCache {
    keys: Mutex<HashSet<String>>,
    saved: Mutex<Vec<(PathBuf, String)>>,
    failing_saves: Mutex<HashSet<String>>,
    fail_restores: AtomicBool,
    restore_calls: AtomicUsize,
}

impl FakeRemoteCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `key` a hit.
    pub fn insert(&self, key: &str) {
        self.keys.lock().unwrap().insert(key.to_string());
    }

    /// Makes every restore fail with a backend error.
    pub fn fail_restores(&self) {
        self.fail_restores.store(true, Ordering::SeqCst);
    }

    /// Makes saves of `key` fail with a backend error.
    pub fn fail_save(&self, key: &str) {
        self.failing_saves.lock().unwrap().insert(key.to_string());
    }

    /// Number of restores attempted.
    pub fn restore_calls(&self) -> usize {
        self.restore_calls.load(Ordering::SeqCst)
    }

    /// Successful saves as `(workspace, key)`, in call order.
    pub fn saved(&self) -> Vec<(PathBuf, String)> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteCache for FakeRemoteCache {
    async fn restore(&self, workspace: &Path, paths: &[String], key: &str) -> Result<bool> {
        self.restore_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_restores.load(Ordering::SeqCst) {
            return Err(WptlError::CacheBackendError {
                operation: "restore".to_string(),
                reason: "service unavailable".to_string(),
            }
            .into());
        }

        if !self.keys.lock().unwrap().contains(key) {
            return Ok(false);
        }
        for path in paths {
            tokio::fs::create_dir_all(workspace.join(path)).await?;
        }
        Ok(true)
    }

    async fn save(&self, workspace: &Path, _paths: &[String], key: &str) -> Result<()> {
        if self.failing_saves.lock().unwrap().contains(key) {
            return Err(WptlError::CacheBackendError {
                operation: "save".to_string(),
                reason: "quota exceeded".to_string(),
            }
            .into());
        }

        self.saved.lock().unwrap().push((workspace.to_path_buf(), key.to_string()));
        self.insert(key);
        Ok(())
    }
}
