//! Numeric dot-segment version ordering.
//!
//! WordPress release numbers are not semantic versions: `6.4` and `6.4.0` are
//! distinct releases, and point releases can run into double digits
//! (`5.9.10`). Ordering therefore compares dot-separated integer segments,
//! treating a missing trailing segment as `0`.
//!
//! # Examples
//!
//! ```rust
//! use setup_wptl::version::comparison::VersionComparator;
//!
//! let mut versions = vec!["5.9.3", "5", "5.9.10", "6"];
//! VersionComparator::sort_descending(&mut versions);
//! assert_eq!(versions, vec!["6", "5.9.10", "5.9.3", "5"]);
//! ```

use std::cmp::Ordering;

/// Version comparison utilities for WordPress release numbers.
///
/// All methods are total: segments that fail to parse as integers compare
/// as `0`.
pub struct VersionComparator;

impl VersionComparator {
    /// Compares two versions segment by segment, most significant first.
    ///
    /// The shorter version is conceptually padded with zero segments, so
    /// `"6"` and `"6.0.0"` compare equal.
    #[must_use]
    pub fn compare(a: &str, b: &str) -> Ordering {
        let a_segments: Vec<&str> = a.split('.').collect();
        let b_segments: Vec<&str> = b.split('.').collect();
        let len = a_segments.len().max(b_segments.len());

        for i in 0..len {
            let a_part = Self::segment(a_segments.get(i).copied());
            let b_part = Self::segment(b_segments.get(i).copied());
            match a_part.cmp(&b_part) {
                Ordering::Equal => {}
                other => return other,
            }
        }

        Ordering::Equal
    }

    /// Sorts versions newest first.
    ///
    /// The sort is stable, so versions that compare equal (`"6"`, `"6.0"`)
    /// keep their input order.
    pub fn sort_descending<S: AsRef<str>>(versions: &mut [S]) {
        versions.sort_by(|a, b| Self::compare(b.as_ref(), a.as_ref()));
    }

    /// Returns the newest version, or `None` for an empty input.
    ///
    /// On ties the first of the equal versions wins, matching the head of
    /// [`sort_descending`](Self::sort_descending).
    #[must_use]
    pub fn latest<S: AsRef<str>>(versions: &[S]) -> Option<&S> {
        versions.iter().reduce(|best, candidate| {
            if Self::compare(candidate.as_ref(), best.as_ref()) == Ordering::Greater {
                candidate
            } else {
                best
            }
        })
    }

    fn segment(part: Option<&str>) -> u64 {
        part.and_then(|p| p.trim().parse::<u64>().ok()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_descending() {
        let mut versions = vec!["5.9.3", "5", "5.8", "5.9", "5.9.10", "5.9.2", "6"];
        VersionComparator::sort_descending(&mut versions);
        assert_eq!(versions, vec!["6", "5.9.10", "5.9.3", "5.9.2", "5.9", "5.8", "5"]);
    }

    #[test]
    fn test_compare_pads_missing_segments() {
        assert_eq!(VersionComparator::compare("6", "6.0.0"), Ordering::Equal);
        assert_eq!(VersionComparator::compare("6", "5.9.10"), Ordering::Greater);
        assert_eq!(VersionComparator::compare("5.9", "5.9.1"), Ordering::Less);
    }

    #[test]
    fn test_compare_is_numeric_not_lexicographic() {
        assert_eq!(VersionComparator::compare("5.10", "5.9"), Ordering::Greater);
        assert_eq!(VersionComparator::compare("5.9.10", "5.9.9"), Ordering::Greater);
    }

    #[test]
    fn test_non_numeric_segments_compare_as_zero() {
        assert_eq!(VersionComparator::compare("6.x", "6.0"), Ordering::Equal);
        assert_eq!(VersionComparator::compare("6.4-RC1", "6.0"), Ordering::Equal);
    }

    #[test]
    fn test_latest() {
        let versions = vec!["6.3.2".to_string(), "6.4.1".to_string(), "6.4".to_string()];
        assert_eq!(VersionComparator::latest(&versions).map(String::as_str), Some("6.4.1"));

        let empty: Vec<String> = Vec::new();
        assert!(VersionComparator::latest(&empty).is_none());
    }
}
