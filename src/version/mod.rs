//! Version ordering and normalization.
//!
//! - [`comparison`] orders WordPress release numbers numerically, newest first.
//!   The version resolver uses it to pick the latest release of a branch.
//! - [`coerce`](mod@coerce) turns a resolved version into the strict semantic
//!   version used as a cache key.

pub mod coerce;
pub mod comparison;

pub use coerce::coerce;
pub use comparison::VersionComparator;
