//! setup-wptl - WordPress test library provisioning for CI
//!
//! Prepares a directory so a WordPress plugin or theme can run the upstream
//! PHPUnit integration suite:
//!
//! ```text
//! <dir>/
//! ├── wordpress/               # WordPress core, from the release archive
//! └── wordpress-tests-lib/
//!     ├── includes/            # svn export of tests/phpunit/includes
//!     ├── data/                # svn export of tests/phpunit/data
//!     └── wp-tests-config.php  # generated from the published sample
//! ```
//!
//! # Runs
//!
//! A CI job invokes the binary twice:
//!
//! 1. `setup-wptl setup` resolves the version specifier (`latest`, `nightly`,
//!    `6.4.x`, `6.4.3`), provisions both trees through the cache chain or a
//!    fresh fetch, generates the configuration and publishes outputs.
//! 2. `setup-wptl finalize` runs at the end of the job and saves the trees
//!    that missed the remote cache, but only if setup succeeded.
//!
//! # Caching
//!
//! Each tree is looked up in the machine-local tool cache first and in the
//! remote cache second; see [`cache`]. The rolling `nightly` build and
//! versions without a semantic form are never cached.
//!
//! # Modules
//!
//! - [`version`] - version ordering and semantic normalization
//! - [`wordpress`] - artifacts, release feed and version resolution
//! - [`http`] - downloads with bounded retry
//! - [`svn`] - Subversion checkouts
//! - [`cache`] - tool cache, remote cache and the lookup chain
//! - [`provision`] - the setup pipeline
//! - [`state`] - the record shared between setup and finalize
//! - [`outputs`] - step outputs and exported environment
//! - [`finalize`] - deferred cache saves
//! - [`config`] - inputs and runner environment
//! - [`cli`] - command-line interface

pub mod cache;
pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod finalize;
pub mod http;
pub mod outputs;
pub mod provision;
pub mod state;
pub mod svn;
pub mod utils;
pub mod version;
pub mod wordpress;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
