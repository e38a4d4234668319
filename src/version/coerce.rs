//! Semantic-version coercion for cache keys.
//!
//! Cache entries are keyed by a strict `MAJOR.MINOR.PATCH` version. A
//! resolved WordPress version is coerced into that form by taking the first
//! run of up to three dot-separated numeric components and filling missing
//! components with zero (`6.4` becomes `6.4.0`). Strings without any digits
//! (the `nightly` sentinel) have no semantic version, which disables caching
//! for the run.

use regex::Regex;
use semver::Version;
use std::sync::LazyLock;

/// Each component is limited to 16 digits so it always fits a `u64`.
static COERCE_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^\d])(\d{1,16})(?:\.(\d{1,16}))?(?:\.(\d{1,16}))?(?:$|[^\d])").ok()
});

/// Coerces a loose version string into a semantic version.
///
/// Returns `None` when the string contains no usable numeric component.
///
/// # Examples
///
/// ```rust
/// use setup_wptl::version::coerce;
///
/// assert_eq!(coerce("6.4").map(|v| v.to_string()), Some("6.4.0".to_string()));
/// assert_eq!(coerce("6.5-RC2").map(|v| v.to_string()), Some("6.5.0".to_string()));
/// assert!(coerce("nightly").is_none());
/// ```
#[must_use]
pub fn coerce(version: &str) -> Option<Version> {
    let captures = COERCE_PATTERN.as_ref()?.captures(version)?;
    let component = |index: usize| -> Option<u64> {
        match captures.get(index) {
            Some(m) => m.as_str().parse().ok(),
            None => Some(0),
        }
    };

    Some(Version::new(component(1)?, component(2)?, component(3)?))
}
