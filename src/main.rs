//! setup-wptl CLI entry point
//!
//! Parses arguments, runs the selected command and turns a failure into a
//! single colored message with a suggestion, exiting with status 1.

use anyhow::Result;
use clap::Parser;
use setup_wptl::cli;
use setup_wptl::core::user_friendly_error;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    match cli.execute().await {
        Ok(()) => Ok(()),
        Err(e) => {
            user_friendly_error(e).display();
            std::process::exit(1);
        }
    }
}
