//! The `setup` command.

use anyhow::Result;
use clap::Args;
use std::sync::Arc;
use tracing::info;

use crate::cache::{DirectoryCache, LocalToolCache};
use crate::config::{CacheAvailability, RawInputs, RunnerEnvironment, SetupConfig};
use crate::http::{HttpTransport, ReqwestTransport};
use crate::outputs::StepOutputs;
use crate::provision::Provisioner;
use crate::state::{RunRecord, StateFile};
use crate::svn::SvnClient;
use crate::wordpress::WordPressApi;

/// Provision WordPress and the PHPUnit test library into a directory.
#[derive(Args, Debug)]
pub struct SetupCommand {
    /// WordPress version: `latest`, `nightly`, `trunk`, a branch such as
    /// `6.4.x`, or an exact release
    #[arg(long, env = "INPUT_VERSION")]
    version: Option<String>,

    /// Existing directory to provision into (default: system temp directory)
    #[arg(long, env = "INPUT_DIR")]
    dir: Option<String>,

    /// Prefix namespacing remote cache keys
    #[arg(long, env = "INPUT_CACHE_PREFIX")]
    cache_prefix: Option<String>,

    /// Database user written to wp-tests-config.php
    #[arg(long, env = "INPUT_DB_USER")]
    db_user: Option<String>,

    /// Database password written to wp-tests-config.php
    #[arg(long, env = "INPUT_DB_PASSWORD", hide_env_values = true)]
    db_password: Option<String>,

    /// Test database name; its tables are dropped by the test suite
    #[arg(long, env = "INPUT_DB_NAME")]
    db_name: Option<String>,

    /// Database host, optionally with `:port`
    #[arg(long, env = "INPUT_DB_HOST")]
    db_host: Option<String>,

    /// Local wp-tests-config-sample.php to use instead of the published one
    #[arg(long, env = "INPUT_CONFIG_TEMPLATE")]
    config_template: Option<String>,

    /// Where to record cache entries for the `finalize` command
    #[arg(long, env = "SETUP_WPTL_STATE_FILE")]
    state_file: Option<String>,

    /// Root directory of the remote cache store
    #[arg(long, env = "SETUP_WPTL_CACHE_STORE")]
    cache_store: Option<String>,
}

impl SetupCommand {
    /// The inputs as received, before defaults.
    pub fn raw_inputs(&self) -> RawInputs {
        RawInputs {
            version: self.version.clone(),
            dir: self.dir.clone(),
            cache_prefix: self.cache_prefix.clone(),
            db_user: self.db_user.clone(),
            db_password: self.db_password.clone(),
            db_name: self.db_name.clone(),
            db_host: self.db_host.clone(),
            config_template: self.config_template.clone(),
            state_file: self.state_file.clone(),
            cache_store: self.cache_store.clone(),
        }
    }

    /// Runs setup against the live services and the runner environment.
    pub async fn execute(self) -> Result<()> {
        let config = SetupConfig::from_inputs(self.raw_inputs())?;
        let environment = RunnerEnvironment::from_env();
        let provisioner = live_provisioner(&config, &environment)?;

        run_setup(&config, &provisioner, &environment, &StepOutputs::from_env()).await
    }
}

fn live_provisioner(config: &SetupConfig, environment: &RunnerEnvironment) -> Result<Provisioner> {
    let http: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::new()?);
    let feed = Arc::new(WordPressApi::new(Arc::clone(&http)));
    let mut provisioner = Provisioner::new(http, feed, Arc::new(SvnClient::new()));

    if let Some(root) = &environment.tool_cache {
        provisioner = provisioner.with_tool_cache(Arc::new(LocalToolCache::new(root.clone())));
    }
    if let Some(store) = &config.cache_store {
        provisioner = provisioner.with_remote_cache(Arc::new(DirectoryCache::new(store.clone())));
    }

    Ok(provisioner)
}

/// Runs one setup: provisioning, run record, outputs.
///
/// The run record is flipped to successful only after every output has been
/// published, so a failure anywhere leaves nothing for `finalize` to save.
pub async fn run_setup(
    config: &SetupConfig,
    provisioner: &Provisioner,
    environment: &RunnerEnvironment,
    outputs: &StepOutputs,
) -> Result<()> {
    let state_file = StateFile::new(config.state_file.clone());
    state_file.remove().await?;

    let detected = CacheAvailability::detect(config.cache_store.as_deref(), environment);
    let provisioned = provisioner.run(config, detected).await?;

    state_file.save(&RunRecord::in_progress(provisioned.state.pending.clone()))?;
    outputs.publish(&provisioned)?;
    state_file.mark_success()?;

    info!("✅ Success");
    Ok(())
}
