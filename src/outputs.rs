//! Step outputs and exported environment for later pipeline steps.
//!
//! On a runner, outputs are appended to the file named by `GITHUB_OUTPUT` and
//! exported variables to the file named by `GITHUB_ENV`, one heredoc block
//! per value:
//!
//! ```text
//! wp_version<<ghadelimiter_8c4b5e1e-...
//! 6.4.3
//! ghadelimiter_8c4b5e1e-...
//! ```
//!
//! Outside a runner each value is printed to stdout as `name=value`.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::constants::WP_TESTS_DIR_ENV;
use crate::core::WptlError;
use crate::provision::Provisioned;

/// Environment variable naming the step output file.
pub const OUTPUT_FILE_ENV: &str = "GITHUB_OUTPUT";

/// Environment variable naming the exported environment file.
pub const ENV_FILE_ENV: &str = "GITHUB_ENV";

/// Sink for step outputs and exported variables.
#[derive(Debug, Clone, Default)]
pub struct StepOutputs {
    output_file: Option<PathBuf>,
    env_file: Option<PathBuf>,
}

impl StepOutputs {
    /// Writes to the given files; `None` prints to stdout instead.
    pub fn new(output_file: Option<PathBuf>, env_file: Option<PathBuf>) -> Self {
        Self {
            output_file,
            env_file,
        }
    }

    /// Uses the runner's `GITHUB_OUTPUT` and `GITHUB_ENV` files when set.
    pub fn from_env() -> Self {
        let file = |name: &str| {
            std::env::var(name).ok().filter(|value| !value.is_empty()).map(PathBuf::from)
        };
        Self::new(file(OUTPUT_FILE_ENV), file(ENV_FILE_ENV))
    }

    /// Sets the step output `name`.
    pub fn set_output(&self, name: &str, value: &str) -> Result<()> {
        debug!("Output {}={}", name, value);
        emit(self.output_file.as_deref(), name, value)
    }

    /// Exports `name` to the environment of later steps.
    pub fn export_variable(&self, name: &str, value: &str) -> Result<()> {
        debug!("Export {}={}", name, value);
        emit(self.env_file.as_deref(), name, value)
    }

    /// Publishes the results of a completed provisioning run.
    pub fn publish(&self, provisioned: &Provisioned) -> Result<()> {
        let test_library_dir = provisioned.test_library_dir.display().to_string();

        self.export_variable(WP_TESTS_DIR_ENV, &test_library_dir)?;
        self.set_output("wp_version", &provisioned.state.version)?;
        self.set_output("wp_directory", &provisioned.wordpress_dir.display().to_string())?;
        self.set_output("wptl_directory", &test_library_dir)?;
        Ok(())
    }
}

fn emit(file: Option<&Path>, name: &str, value: &str) -> Result<()> {
    let Some(path) = file else {
        println!("{name}={value}");
        return Ok(());
    };

    let block = file_command(name, value)?;
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    file.write_all(block.as_bytes())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Formats one `name<<delimiter` block with a random delimiter.
///
/// # Errors
///
/// Fails if the name or value contains the delimiter, which would let the
/// value inject further entries.
pub fn file_command(name: &str, value: &str) -> Result<String> {
    let delimiter = format!("ghadelimiter_{}", uuid::Uuid::new_v4());
    if name.contains(&delimiter) || value.contains(&delimiter) {
        return Err(WptlError::Other {
            message: format!("Unexpected input: '{name}' should not contain the delimiter"),
        }
        .into());
    }

    Ok(format!("{name}<<{delimiter}\n{value}\n{delimiter}\n"))
}
