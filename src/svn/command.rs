//! Builder for `svn` invocations with consistent logging and error mapping.
//!
//! Commands run without a timeout unless one is set; only the `--version`
//! check is bounded.
//!
//! ```rust,no_run
//! use setup_wptl::svn::command::SvnCommand;
//!
//! # async fn example() -> anyhow::Result<()> {
//! SvnCommand::checkout(
//!     "https://develop.svn.wordpress.org/trunk/tests/phpunit/includes/",
//!     "/tmp/wp/wordpress-tests-lib/includes",
//! )
//! .with_context("includes")
//! .execute_success()
//! .await?;
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result};
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::time::timeout;

use crate::constants::SVN_VERSION_TIMEOUT;
use crate::core::WptlError;
use crate::utils::platform::get_svn_command;

/// Fluent builder for one `svn` process.
///
/// Output is always captured; stderr becomes the payload of
/// [`WptlError::SvnCommandError`] on failure.
pub struct SvnCommand {
    /// Arguments passed to `svn`
    args: Vec<String>,

    /// Maximum time to wait (None = no timeout)
    timeout_duration: Option<Duration>,

    /// Label distinguishing concurrent invocations in the log
    context: Option<String>,
}

impl Default for SvnCommand {
    fn default() -> Self {
        Self {
            args: Vec::new(),
            timeout_duration: None,
            context: None,
        }
    }
}

impl SvnCommand {
    /// Creates an empty command without a timeout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets a custom timeout (None for no timeout).
    pub const fn with_timeout(mut self, duration: Option<Duration>) -> Self {
        self.timeout_duration = duration;
        self
    }

    /// Tags log lines of this invocation, e.g. with the checked-out subtree.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    fn operation(&self) -> String {
        self.args.first().cloned().unwrap_or_else(|| "unknown".to_string())
    }

    fn prefix(&self) -> String {
        self.context.as_ref().map(|ctx| format!("({ctx}) ")).unwrap_or_default()
    }

    /// Executes the command and returns its captured output.
    ///
    /// # Errors
    ///
    /// - [`WptlError::SvnNotFound`] when the executable cannot be spawned
    /// - [`WptlError::SvnCommandError`] on timeout or non-zero exit status
    pub async fn execute(self) -> Result<SvnCommandOutput> {
        let start = Instant::now();
        let svn = get_svn_command();
        let prefix = self.prefix();
        let operation = self.operation();

        let mut cmd = Command::new(svn);
        cmd.args(&self.args);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        tracing::debug!(target: "svn", "{}Executing command: {} {}", prefix, svn, self.args.join(" "));

        let output_future = cmd.output();
        let result = if let Some(duration) = self.timeout_duration {
            if let Ok(result) = timeout(duration, output_future).await {
                result
            } else {
                tracing::warn!(
                    target: "svn",
                    "{}Command timed out after {} seconds: svn {}",
                    prefix,
                    duration.as_secs(),
                    self.args.join(" ")
                );
                return Err(WptlError::SvnCommandError {
                    operation,
                    stderr: format!(
                        "svn timed out after {} seconds. Check network connectivity to the repository",
                        duration.as_secs()
                    ),
                }
                .into());
            }
        } else {
            output_future.await
        };

        let output = match result {
            Ok(output) => output,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(WptlError::SvnNotFound.into());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to execute svn {}", operation));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            tracing::debug!(
                target: "svn",
                "{}Command failed with exit code: {:?}",
                prefix,
                output.status.code()
            );
            return Err(WptlError::SvnCommandError {
                operation,
                stderr: if stderr.trim().is_empty() {
                    stdout.trim().to_string()
                } else {
                    stderr.trim().to_string()
                },
            }
            .into());
        }

        if !stderr.trim().is_empty() {
            tracing::debug!(target: "svn", "{}{}", prefix, stderr.trim());
        }

        let elapsed = start.elapsed();
        if elapsed.as_secs() > 1 {
            tracing::info!(target: "svn::perf", "{}svn {} took {:.2}s", prefix, operation, elapsed.as_secs_f64());
        } else {
            tracing::debug!(target: "svn::perf", "{}svn {} took {}ms", prefix, operation, elapsed.as_millis());
        }

        Ok(SvnCommandOutput {
            stdout,
            stderr,
        })
    }

    /// Executes the command, discarding its output.
    pub async fn execute_success(self) -> Result<()> {
        self.execute().await?;
        Ok(())
    }
}

/// Captured output of an `svn` process.
pub struct SvnCommandOutput {
    /// Standard output
    pub stdout: String,
    /// Standard error
    pub stderr: String,
}

impl SvnCommand {
    /// `svn checkout --quiet --non-interactive <url> <target>`
    ///
    /// Runs to completion however long the repository takes to answer.
    pub fn checkout(url: &str, target: impl AsRef<Path>) -> Self {
        Self::new()
            .args(["checkout", "--quiet", "--non-interactive", url])
            .arg(target.as_ref().display().to_string())
    }

    /// `svn --version --quiet`
    pub fn version() -> Self {
        Self::new().args(["--version", "--quiet"]).with_timeout(Some(SVN_VERSION_TIMEOUT))
    }
}
