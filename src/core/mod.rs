//! Core types for setup-wptl
//!
//! Error handling lives here: the [`WptlError`] taxonomy used by every
//! module, the [`ErrorContext`] wrapper that adds suggestions for CI logs, and
//! [`user_friendly_error`] which the binary uses to report the single
//! top-level failure of a run.
//!
//! # Error Handling Pattern
//!
//! ```rust
//! use setup_wptl::core::{WptlError, user_friendly_error};
//! use anyhow::Result;
//!
//! fn example_operation() -> Result<String> {
//!     Err(WptlError::SvnNotFound.into())
//! }
//!
//! if let Err(e) = example_operation() {
//!     let friendly = user_friendly_error(e);
//!     assert!(friendly.suggestion.is_some());
//! }
//! ```

pub mod error;

pub use error::{ErrorContext, WptlError, user_friendly_error};
