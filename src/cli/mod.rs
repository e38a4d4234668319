//! Command-line interface for setup-wptl.
//!
//! The tool runs twice per CI job:
//!
//! - `setup` provisions WordPress and the test library, writes the test
//!   configuration and publishes outputs
//! - `finalize` runs at the end of the job and persists any remote-cache
//!   misses recorded by `setup`
//!
//! Every `setup` flag can also be given through the runner's `INPUT_<NAME>`
//! environment variable, so the tool can be wired as a step without a wrapper
//! script.
//!
//! ```bash
//! setup-wptl setup --version 6.4.x --dir /tmp/wp --db-host 127.0.0.1:3306
//! setup-wptl finalize
//! ```

mod finalize;
mod setup;

pub use finalize::FinalizeCommand;
pub use setup::SetupCommand;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Top-level command line.
#[derive(Parser, Debug)]
#[command(
    name = "setup-wptl",
    about = "Provision WordPress and the WordPress PHPUnit test library for CI runs",
    version,
    long_about = "setup-wptl downloads WordPress and the matching PHPUnit test library, \
                  generates wp-tests-config.php and reuses both across CI runs through the \
                  runner's tool cache and a remote cache store."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output. Mutually exclusive with `--quiet`.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only print warnings and errors.
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Provision WordPress and the test library
    Setup(SetupCommand),

    /// Persist cache entries recorded by a successful setup run
    Finalize(FinalizeCommand),
}

impl Cli {
    /// Log level implied by the global flags.
    #[must_use]
    pub const fn log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "warn"
        } else {
            "info"
        }
    }

    /// Initializes logging and runs the selected command.
    pub async fn execute(self) -> Result<()> {
        init_logging(self.log_level());

        match self.command {
            Commands::Setup(cmd) => cmd.execute().await,
            Commands::Finalize(cmd) => cmd.execute().await,
        }
    }
}

/// Installs the stderr log subscriber. `RUST_LOG` takes precedence over
/// `default_level`.
///
/// Stdout is left to step outputs when no output file is configured.
fn init_logging(default_level: &str) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(default_level)
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .try_init();
}
