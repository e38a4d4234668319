//! The `finalize` command.

use anyhow::Result;
use clap::Args;
use tracing::{debug, warn};

use crate::cache::{DirectoryCache, RemoteCache};
use crate::config::{RunnerEnvironment, state_file_path, target_dir};
use crate::finalize::finalize;
use crate::state::StateFile;

/// Save remote-cache entries recorded by a successful `setup` run.
///
/// Always exits successfully; failures are reported as warnings.
#[derive(Args, Debug)]
pub struct FinalizeCommand {
    /// Directory given to `setup`; locates its default state file
    #[arg(long, env = "INPUT_DIR")]
    dir: Option<String>,

    /// State file written by `setup`
    #[arg(long, env = "SETUP_WPTL_STATE_FILE")]
    state_file: Option<String>,

    /// Root directory of the remote cache store
    #[arg(long, env = "SETUP_WPTL_CACHE_STORE")]
    cache_store: Option<String>,
}

impl FinalizeCommand {
    /// Persists the pending entries of the last `setup` run for this
    /// directory.
    ///
    /// Never fails; problems are logged as warnings.
    pub async fn execute(self) -> Result<()> {
        let dir = match target_dir(self.dir) {
            Ok(dir) => dir,
            Err(e) => {
                warn!("⚠️ Failed to resolve the target directory, not saving cache: {:#}", e);
                return Ok(());
            }
        };
        let state_file = StateFile::new(state_file_path(self.state_file, &dir));

        let store = self
            .cache_store
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .filter(|_| !RunnerEnvironment::from_env().is_non_default_server())
            .map(DirectoryCache::new);
        let cache = store.as_ref().map(|c| c as &dyn RemoteCache);

        let report = finalize(&state_file, cache).await;
        debug!(
            "Saved {} cache entries, {} failed",
            report.saved.len(),
            report.failed.len()
        );
        Ok(())
    }
}
