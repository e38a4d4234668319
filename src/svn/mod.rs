//! Subversion access for the test library checkout.
//!
//! The provisioning pipeline only needs two things from Subversion: to know
//! whether a client is installed and to check out a subtree. Both sit behind
//! the [`Checkout`] trait; [`SvnClient`] shells out to the `svn` executable
//! through [`command::SvnCommand`].

pub mod command;

use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;

use crate::core::WptlError;
use crate::utils::platform::{command_exists, get_svn_command};
use command::SvnCommand;

/// Checks out remote subtrees into local directories.
#[async_trait]
pub trait Checkout: Send + Sync {
    /// Returns `true` when checkouts can be performed at all.
    fn is_available(&self) -> bool;

    /// Fails with [`WptlError::SvnNotFound`] when checkouts are impossible.
    fn ensure_available(&self) -> Result<()> {
        if self.is_available() {
            Ok(())
        } else {
            Err(WptlError::SvnNotFound.into())
        }
    }

    /// Checks out `url` into `target`, creating `target` if needed.
    async fn checkout(&self, url: &str, target: &Path) -> Result<()>;
}

/// [`Checkout`] implementation backed by the `svn` command-line client.
#[derive(Debug, Clone, Copy, Default)]
pub struct SvnClient;

impl SvnClient {
    /// Creates a client for the `svn` found on `PATH`.
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Checkout for SvnClient {
    fn is_available(&self) -> bool {
        command_exists(get_svn_command())
    }

    async fn checkout(&self, url: &str, target: &Path) -> Result<()> {
        let label = target
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| target.display().to_string());

        SvnCommand::checkout(url, target).with_context(label).execute_success().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_available_matches_path_lookup() {
        let client = SvnClient::new();
        let installed = command_exists(get_svn_command());

        assert_eq!(client.is_available(), installed);
        match client.ensure_available() {
            Ok(()) => assert!(installed),
            Err(e) => {
                assert!(!installed);
                assert!(matches!(e.downcast_ref::<WptlError>(), Some(WptlError::SvnNotFound)));
            }
        }
    }

    #[tokio::test]
    async fn test_checkout_of_invalid_url_fails() {
        let client = SvnClient::new();
        if !client.is_available() {
            return;
        }

        let temp = tempfile::TempDir::new().unwrap();
        let err = client
            .checkout("file:///definitely/not/a/repository", &temp.path().join("out"))
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<WptlError>(),
            Some(WptlError::SvnCommandError { operation, .. }) if operation == "checkout"
        ));
    }
}
