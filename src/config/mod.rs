//! Configuration of a setup run.
//!
//! Inputs arrive as raw, possibly empty strings (command-line flags or the
//! runner's `INPUT_<NAME>` variables) and are normalized once into an
//! immutable [`SetupConfig`]:
//!
//! | Input | Default |
//! |---|---|
//! | `version` | `latest` |
//! | `dir` | system temp directory |
//! | `cache_prefix` | empty |
//! | `db_user` / `db_password` | `wordpress` |
//! | `db_name` | `wordpress_test` |
//! | `db_host` | `127.0.0.1` |
//!
//! Empty or whitespace-only values count as absent. Environment signals of
//! the runner are captured separately in [`RunnerEnvironment`] and turned
//! into [`CacheAvailability`].

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use crate::constants::{
    DEFAULT_SERVER_HOST, LATEST, RUNNER_TEMP_ENV, RUNNER_TOOL_CACHE_ENV, SERVER_URL_ENV,
    STATE_FILE_PREFIX,
};

/// Database credentials substituted into the test configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseSettings {
    /// Database user
    pub user: String,
    /// Database password
    pub password: String,
    /// Database name; the test suite drops and recreates its tables
    pub name: String,
    /// Database host, optionally with `:port`
    pub host: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            user: "wordpress".to_string(),
            password: "wordpress".to_string(),
            name: "wordpress_test".to_string(),
            host: "127.0.0.1".to_string(),
        }
    }
}

/// Raw inputs as received, before defaults are applied.
#[derive(Debug, Clone, Default)]
pub struct RawInputs {
    pub version: Option<String>,
    pub dir: Option<String>,
    pub cache_prefix: Option<String>,
    pub db_user: Option<String>,
    pub db_password: Option<String>,
    pub db_name: Option<String>,
    pub db_host: Option<String>,
    pub config_template: Option<String>,
    pub state_file: Option<String>,
    pub cache_store: Option<String>,
}

/// Normalized, immutable configuration of one setup run.
#[derive(Debug, Clone)]
pub struct SetupConfig {
    /// Version specifier
    pub version: String,
    /// Absolute target directory
    pub dir: PathBuf,
    /// Remote cache key prefix
    pub cache_prefix: String,
    /// Credentials for the generated configuration
    pub database: DatabaseSettings,
    /// Local configuration template overriding the remote one
    pub config_template: Option<PathBuf>,
    /// Location of the two-phase state file
    pub state_file: PathBuf,
    /// Root of the remote cache backend, when one is configured
    pub cache_store: Option<PathBuf>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Resolves a `dir` input to an absolute path, defaulting to the system temp
/// directory. Symlinks are not resolved.
pub fn target_dir(input: Option<String>) -> Result<PathBuf> {
    let dir = non_empty(input).map(PathBuf::from).unwrap_or_else(std::env::temp_dir);
    std::path::absolute(&dir).with_context(|| format!("Failed to resolve {}", dir.display()))
}

/// Default state file for a run provisioning `dir`.
///
/// The file lives in `runner_temp` (falling back to the system temp
/// directory) and is named after `dir`, so jobs sharing a host never share a
/// record unless they provision the same directory.
pub fn default_state_file(dir: &Path, runner_temp: Option<&Path>) -> PathBuf {
    let base = runner_temp.map(Path::to_path_buf).unwrap_or_else(std::env::temp_dir);
    let digest = hex::encode(Sha256::digest(dir.as_os_str().as_encoded_bytes()));
    base.join(format!("{STATE_FILE_PREFIX}{}.json", &digest[..16]))
}

/// Resolves an optional state file input for a run provisioning `dir`.
///
/// Without an input, the default file is placed under `RUNNER_TEMP` when set.
pub fn state_file_path(input: Option<String>, dir: &Path) -> PathBuf {
    non_empty(input).map(PathBuf::from).unwrap_or_else(|| {
        let runner_temp = non_empty(std::env::var(RUNNER_TEMP_ENV).ok()).map(PathBuf::from);
        default_state_file(dir, runner_temp.as_deref())
    })
}

impl SetupConfig {
    /// Applies defaults to `inputs`.
    ///
    /// # Errors
    ///
    /// Fails only if the current directory is needed to absolutize `dir` and
    /// cannot be determined.
    pub fn from_inputs(inputs: RawInputs) -> Result<Self> {
        let defaults = DatabaseSettings::default();

        let dir = target_dir(inputs.dir)?;
        let state_file = state_file_path(inputs.state_file, &dir);

        Ok(Self {
            version: non_empty(inputs.version).unwrap_or_else(|| LATEST.to_string()),
            dir,
            cache_prefix: non_empty(inputs.cache_prefix).unwrap_or_default(),
            database: DatabaseSettings {
                user: non_empty(inputs.db_user).unwrap_or(defaults.user),
                password: non_empty(inputs.db_password).unwrap_or(defaults.password),
                name: non_empty(inputs.db_name).unwrap_or(defaults.name),
                host: non_empty(inputs.db_host).unwrap_or(defaults.host),
            },
            config_template: non_empty(inputs.config_template).map(PathBuf::from),
            state_file,
            cache_store: non_empty(inputs.cache_store).map(PathBuf::from),
        })
    }
}

/// Environment signals of the CI runner.
#[derive(Debug, Clone, Default)]
pub struct RunnerEnvironment {
    /// Root of the machine-local tool cache (`RUNNER_TOOL_CACHE`)
    pub tool_cache: Option<PathBuf>,
    /// URL of the server the job runs against (`GITHUB_SERVER_URL`)
    pub server_url: Option<String>,
}

impl RunnerEnvironment {
    /// Reads the signals from the process environment.
    pub fn from_env() -> Self {
        Self {
            tool_cache: non_empty(std::env::var(RUNNER_TOOL_CACHE_ENV).ok()).map(PathBuf::from),
            server_url: non_empty(std::env::var(SERVER_URL_ENV).ok()),
        }
    }

    /// `true` when the job runs against a self-hosted server deployment.
    ///
    /// An unparsable server URL is treated as non-default.
    pub fn is_non_default_server(&self) -> bool {
        let Some(url) = self.server_url.as_deref() else {
            return false;
        };

        match reqwest::Url::parse(url) {
            Ok(parsed) => parsed
                .host_str()
                .is_none_or(|host| !host.eq_ignore_ascii_case(DEFAULT_SERVER_HOST)),
            Err(_) => true,
        }
    }
}

/// Which caches may be consulted during a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheAvailability {
    /// The machine-local tool cache
    pub tool_cache: bool,
    /// The remote content cache
    pub remote_cache: bool,
}

impl CacheAvailability {
    /// Feature detection for one run.
    pub fn detect(cache_store: Option<&Path>, environment: &RunnerEnvironment) -> Self {
        Self {
            tool_cache: environment.tool_cache.is_some(),
            remote_cache: cache_store.is_some() && !environment.is_non_default_server(),
        }
    }

    /// Both caches off.
    pub const fn disabled() -> Self {
        Self {
            tool_cache: false,
            remote_cache: false,
        }
    }

    /// `true` when any cache may be consulted.
    pub const fn any(self) -> bool {
        self.tool_cache || self.remote_cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_defaults_apply_to_missing_and_blank_inputs() {
        let config = SetupConfig::from_inputs(RawInputs {
            version: Some("   ".to_string()),
            db_host: Some(String::new()),
            ..RawInputs::default()
        })
        .unwrap();

        assert_eq!(config.version, "latest");
        assert_eq!(config.cache_prefix, "");
        assert_eq!(config.database, DatabaseSettings::default());
        assert_eq!(config.dir, std::path::absolute(std::env::temp_dir()).unwrap());
        assert!(config.config_template.is_none());
        assert!(config.cache_store.is_none());
        assert_eq!(
            config.state_file.file_name(),
            default_state_file(&config.dir, None).file_name()
        );
    }

    #[test]
    fn test_inputs_are_trimmed_and_dir_is_absolute() {
        let config = SetupConfig::from_inputs(RawInputs {
            version: Some(" 6.4.x\n".to_string()),
            dir: Some("relative/wp".to_string()),
            db_name: Some("tests".to_string()),
            cache_prefix: Some("php8.2".to_string()),
            ..RawInputs::default()
        })
        .unwrap();

        assert_eq!(config.version, "6.4.x");
        assert!(config.dir.is_absolute());
        assert!(config.dir.ends_with("relative/wp"));
        assert_eq!(config.database.name, "tests");
        assert_eq!(config.database.user, "wordpress");
        assert_eq!(config.cache_prefix, "php8.2");
    }

    #[test]
    fn test_default_state_file_is_scoped_to_target_dir() {
        let runner_temp = Path::new("/home/runner/work/_temp");
        let a = default_state_file(Path::new("/tmp/wp-a"), Some(runner_temp));
        let b = default_state_file(Path::new("/tmp/wp-b"), Some(runner_temp));

        assert_ne!(a, b);
        assert_eq!(a, default_state_file(Path::new("/tmp/wp-a"), Some(runner_temp)));
        assert!(a.starts_with(runner_temp));
        assert!(a.file_name().unwrap().to_string_lossy().starts_with(STATE_FILE_PREFIX));
    }

    #[test]
    fn test_explicit_state_file_wins() {
        let path = state_file_path(Some(" /tmp/state.json ".to_string()), Path::new("/tmp/wp"));
        assert_eq!(path, PathBuf::from("/tmp/state.json"));
    }

    #[test]
    fn test_configs_for_different_dirs_use_different_state_files() {
        let config = |dir: &str| {
            SetupConfig::from_inputs(RawInputs {
                dir: Some(dir.to_string()),
                ..RawInputs::default()
            })
            .unwrap()
        };

        assert_ne!(config("/tmp/job-a").state_file, config("/tmp/job-b").state_file);
    }

    #[test]
    #[serial]
    fn test_default_state_file_uses_runner_temp() {
        // SAFETY: serialized with the other environment-mutating tests.
        unsafe {
            std::env::set_var(RUNNER_TEMP_ENV, "/home/runner/work/_temp");
        }
        let path = state_file_path(None, Path::new("/tmp/wp"));
        unsafe {
            std::env::remove_var(RUNNER_TEMP_ENV);
        }

        assert!(path.starts_with("/home/runner/work/_temp"));
    }

    #[test]
    fn test_server_detection() {
        let env = |url: Option<&str>| RunnerEnvironment {
            tool_cache: None,
            server_url: url.map(str::to_string),
        };

        assert!(!env(None).is_non_default_server());
        assert!(!env(Some("https://github.com")).is_non_default_server());
        assert!(!env(Some("https://GitHub.com/")).is_non_default_server());
        assert!(env(Some("https://git.example.com")).is_non_default_server());
        assert!(env(Some("not a url")).is_non_default_server());
    }

    #[test]
    fn test_cache_availability() {
        let hosted = RunnerEnvironment {
            tool_cache: Some(PathBuf::from("/opt/hostedtoolcache")),
            server_url: Some("https://github.com".to_string()),
        };
        let enterprise = RunnerEnvironment {
            tool_cache: None,
            server_url: Some("https://ghe.example.com".to_string()),
        };
        let store = Path::new("/mnt/cache");

        assert_eq!(
            CacheAvailability::detect(Some(store), &hosted),
            CacheAvailability {
                tool_cache: true,
                remote_cache: true,
            }
        );
        assert!(!CacheAvailability::detect(None, &hosted).remote_cache);
        assert!(!CacheAvailability::detect(Some(store), &enterprise).any());
    }

    #[test]
    #[serial]
    fn test_runner_environment_from_env() {
        // SAFETY: serialized with the other environment-mutating tests.
        unsafe {
            std::env::set_var(RUNNER_TOOL_CACHE_ENV, "/opt/hostedtoolcache");
            std::env::set_var(SERVER_URL_ENV, "");
        }

        let env = RunnerEnvironment::from_env();
        assert_eq!(env.tool_cache, Some(PathBuf::from("/opt/hostedtoolcache")));
        assert!(env.server_url.is_none());

        unsafe {
            std::env::remove_var(RUNNER_TOOL_CACHE_ENV);
            std::env::remove_var(SERVER_URL_ENV);
        }
        assert!(RunnerEnvironment::from_env().tool_cache.is_none());
    }
}
