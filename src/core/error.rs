//! Error handling for setup-wptl
//!
//! This module provides the error taxonomy of a provisioning run and the
//! user-facing error reporting used by the CLI. The error system is designed
//! around two core principles:
//! 1. **Strongly-typed errors** for precise error handling in code
//! 2. **User-friendly messages** with actionable suggestions for CI logs
//!
//! # Error Categories
//!
//! - **Precondition**: [`WptlError::DirectoryNotFound`]. Raised before any network
//!   or cache activity.
//! - **Resolution**: [`WptlError::VersionFeedFailed`], [`WptlError::NoMatchingVersion`]
//! - **Fetch**: [`WptlError::DownloadFailed`], [`WptlError::ExtractFailed`],
//!   [`WptlError::SvnCommandError`], [`WptlError::SvnNotFound`]
//! - **I/O**: [`WptlError::TemplateUnavailable`], [`WptlError::SymlinkFailed`],
//!   [`WptlError::FileSystemError`], [`WptlError::IoError`]
//! - **Cache warnings**: [`WptlError::CacheBackendError`]. Never fatal; the cache
//!   chain and the finalize step downgrade it to a log warning.
//!
//! All fatal errors bubble up as [`anyhow::Error`] and are turned into a single
//! top-level message by [`user_friendly_error`].
//!
//! # Examples
//!
//! ```rust,no_run
//! use setup_wptl::core::{WptlError, user_friendly_error};
//!
//! let error = anyhow::Error::from(WptlError::DirectoryNotFound {
//!     path: "/tmp/missing".to_string(),
//! });
//! let ctx = user_friendly_error(error);
//! ctx.display(); // Shows colored error with a suggestion
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The main error type for setup-wptl operations
///
/// Each variant names one failure mode of a provisioning or finalize run and
/// carries the URL, path or command output needed to diagnose it from a CI
/// log.
#[derive(Error, Debug)]
pub enum WptlError {
    /// The target directory does not exist or is not a directory
    #[error("Directory {path} does not exist")]
    DirectoryNotFound {
        /// The configured target directory
        path: String,
    },

    /// The version-check feed could not be queried
    #[error("Failed to fetch WordPress versions: {reason}")]
    VersionFeedFailed {
        /// Feed URL that was queried
        url: String,
        /// HTTP status or transport error
        reason: String,
    },

    /// A branch specifier matched no published offer
    #[error("No published WordPress version matches '{specifier}'")]
    NoMatchingVersion {
        /// The specifier as given by the caller
        specifier: String,
    },

    /// An HTTP download failed
    #[error("Failed to download {url}: {reason}")]
    DownloadFailed {
        /// URL that was requested
        url: String,
        /// HTTP status or transport error
        reason: String,
        /// HTTP status code, when the server answered
        status: Option<u16>,
    },

    /// The downloaded archive could not be extracted
    #[error("Failed to extract {archive}: {reason}")]
    ExtractFailed {
        /// Path of the archive
        archive: String,
        /// Reason reported by the archive reader
        reason: String,
    },

    /// The `svn` executable is not available
    #[error("Subversion is not installed or not found in PATH")]
    SvnNotFound,

    /// An `svn` command returned a non-zero exit status
    #[error("Subversion operation failed: {operation}")]
    SvnCommandError {
        /// The svn operation that failed (e.g., "checkout")
        operation: String,
        /// The error output from the svn command
        stderr: String,
    },

    /// The configuration template could not be obtained
    #[error("Failed to obtain configuration template from {location}: {reason}")]
    TemplateUnavailable {
        /// URL or path of the template
        location: String,
        /// Underlying failure
        reason: String,
    },

    /// A cached tree could not be linked into the target directory
    #[error("Failed to link {from} to {to}")]
    SymlinkFailed {
        /// Tool cache entry
        from: String,
        /// Link location inside the target directory
        to: String,
        /// OS error
        reason: String,
    },

    /// File system error
    #[error("File system error: {operation}")]
    FileSystemError {
        /// The file system operation that failed
        operation: String,
        /// Path where the file system error occurred
        path: String,
    },

    /// Remote cache restore or save failed
    #[error("Cache {operation} failed: {reason}")]
    CacheBackendError {
        /// "restore" or "save"
        operation: String,
        /// Backend failure
        reason: String,
    },

    /// The two-phase state file could not be read or written
    #[error("Invalid state file {path}: {reason}")]
    StateError {
        /// Path of the state file
        path: String,
        /// Parse or I/O failure
        reason: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the configuration error
        message: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Other error
    #[error("{message}")]
    Other {
        /// Generic error message
        message: String,
    },
}

impl Clone for WptlError {
    fn clone(&self) -> Self {
        match self {
            Self::DirectoryNotFound {
                path,
            } => Self::DirectoryNotFound {
                path: path.clone(),
            },
            Self::VersionFeedFailed {
                url,
                reason,
            } => Self::VersionFeedFailed {
                url: url.clone(),
                reason: reason.clone(),
            },
            Self::NoMatchingVersion {
                specifier,
            } => Self::NoMatchingVersion {
                specifier: specifier.clone(),
            },
            Self::DownloadFailed {
                url,
                reason,
                status,
            } => Self::DownloadFailed {
                url: url.clone(),
                reason: reason.clone(),
                status: *status,
            },
            Self::ExtractFailed {
                archive,
                reason,
            } => Self::ExtractFailed {
                archive: archive.clone(),
                reason: reason.clone(),
            },
            Self::SvnNotFound => Self::SvnNotFound,
            Self::SvnCommandError {
                operation,
                stderr,
            } => Self::SvnCommandError {
                operation: operation.clone(),
                stderr: stderr.clone(),
            },
            Self::TemplateUnavailable {
                location,
                reason,
            } => Self::TemplateUnavailable {
                location: location.clone(),
                reason: reason.clone(),
            },
            Self::SymlinkFailed {
                from,
                to,
                reason,
            } => Self::SymlinkFailed {
                from: from.clone(),
                to: to.clone(),
                reason: reason.clone(),
            },
            Self::FileSystemError {
                operation,
                path,
            } => Self::FileSystemError {
                operation: operation.clone(),
                path: path.clone(),
            },
            Self::CacheBackendError {
                operation,
                reason,
            } => Self::CacheBackendError {
                operation: operation.clone(),
                reason: reason.clone(),
            },
            Self::StateError {
                path,
                reason,
            } => Self::StateError {
                path: path.clone(),
                reason: reason.clone(),
            },
            Self::ConfigError {
                message,
            } => Self::ConfigError {
                message: message.clone(),
            },
            Self::IoError(e) => Self::Other {
                message: format!("IO error: {e}"),
            },
            Self::Other {
                message,
            } => Self::Other {
                message: message.clone(),
            },
        }
    }
}

/// Error context wrapper that provides user-friendly error information
///
/// `ErrorContext` wraps a [`WptlError`] and adds an optional suggestion and
/// details. When displayed, errors show the error in red, details in yellow
/// and the suggestion in green.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: WptlError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context with no suggestion or details.
    #[must_use]
    pub const fn new(error: WptlError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add additional details explaining the error
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Display the error context to stderr with terminal colors
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error to a user-friendly [`ErrorContext`] with actionable suggestions
///
/// Typed [`WptlError`]s anywhere in the chain get tailored suggestions; I/O
/// errors are mapped by kind; everything else keeps its full cause chain so
/// the CI log shows what actually went wrong.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(wptl_error) = error.chain().find_map(|e| e.downcast_ref::<WptlError>()) {
        return create_error_context(wptl_error.clone());
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        match io_error.kind() {
            std::io::ErrorKind::PermissionDenied => {
                return ErrorContext::new(WptlError::FileSystemError {
                    operation: "file access".to_string(),
                    path: "unknown".to_string(),
                })
                .with_suggestion("Check that the runner user owns the target directory")
                .with_details(io_error.to_string());
            }
            std::io::ErrorKind::NotFound => {
                return ErrorContext::new(WptlError::FileSystemError {
                    operation: "file access".to_string(),
                    path: "unknown".to_string(),
                })
                .with_suggestion("Check that the file or directory exists and the path is correct")
                .with_details(io_error.to_string());
            }
            _ => {}
        }
    }

    // Generic error - include the full error chain for better diagnostics
    let mut message = error.to_string();
    let chain: Vec<String> =
        error.chain().skip(1).map(std::string::ToString::to_string).collect();

    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::new(WptlError::Other {
        message,
    })
}

fn create_error_context(error: WptlError) -> ErrorContext {
    match &error {
        WptlError::DirectoryNotFound { path } => ErrorContext::new(error.clone())
            .with_suggestion(format!("Create {path} before running setup, or pass a different --dir"))
            .with_details("The target directory must already exist; it is never created implicitly"),

        WptlError::VersionFeedFailed { url, reason } => ErrorContext::new(error.clone())
            .with_suggestion("Retry the job, or pin an explicit version (e.g. --version 6.4.3) to skip the feed lookup")
            .with_details(format!("Querying {url} failed: {reason}")),

        WptlError::NoMatchingVersion { specifier } => ErrorContext::new(error.clone())
            .with_suggestion(format!(
                "Check that '{specifier}' names a branch with at least one published release"
            ))
            .with_details("Branch wildcards only match offers currently listed by the version-check feed"),

        WptlError::DownloadFailed { url, .. } => ErrorContext::new(error.clone())
            .with_suggestion("Verify that the requested WordPress version exists; unknown versions fail here with HTTP 404")
            .with_details(format!("Requested URL: {url}")),

        WptlError::SvnNotFound => ErrorContext::new(WptlError::SvnNotFound)
            .with_suggestion("Install Subversion (e.g., 'apt install subversion' or 'brew install subversion')")
            .with_details("The test library is checked out from the WordPress develop Subversion repository"),

        WptlError::SvnCommandError { stderr, .. } => ErrorContext::new(error.clone())
            .with_suggestion("Check that the test library tag exists for the resolved version")
            .with_details(stderr.trim().to_string()),

        WptlError::SymlinkFailed { reason, .. } => ErrorContext::new(error.clone())
            .with_suggestion("Remove stale entries from the target directory and re-run")
            .with_details(reason.clone()),

        _ => ErrorContext::new(error),
    }
}
