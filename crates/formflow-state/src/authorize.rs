//! Write-scope authorization for JSON Pointers.
//!
//! An [`AllowedPaths`] set holds exact pointers and wildcard patterns. A
//! pattern segment `-` stands for "any array index (or append)", `*` for
//! "any map key". The empty set is unrestricted.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Wildcard for any array index / append position.
pub const ARRAY_WILDCARD: &str = "-";
/// Wildcard for any map key.
pub const MAP_WILDCARD: &str = "*";

/// The write-permission set for a conversation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AllowedPaths(BTreeSet<String>);

impl AllowedPaths {
    /// An unrestricted (empty) set.
    #[inline]
    pub fn unrestricted() -> Self {
        Self::default()
    }

    /// Add a pointer or pattern.
    #[inline]
    pub fn insert(&mut self, pattern: impl Into<String>) -> bool {
        self.0.insert(pattern.into())
    }

    /// Exact membership test (no wildcard expansion).
    #[inline]
    pub fn contains(&self, pattern: &str) -> bool {
        self.0.contains(pattern)
    }

    /// Whether the set places no restriction.
    #[inline]
    pub fn is_unrestricted(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of patterns.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Same as [`AllowedPaths::is_unrestricted`].
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate patterns in sorted order.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Sorted list of patterns.
    pub fn to_vec(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }

    /// Whether `path` may be written.
    #[inline]
    pub fn is_allowed(&self, path: &str) -> bool {
        is_path_allowed(path, self)
    }
}

impl<S: Into<String>> FromIterator<S> for AllowedPaths {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl From<Vec<String>> for AllowedPaths {
    fn from(paths: Vec<String>) -> Self {
        paths.into_iter().collect()
    }
}

/// Decide whether `path` is permitted by `allowed`.
///
/// Exact membership wins immediately. Otherwise the path matches when some
/// substitution of its segments (index ≥ 1) by `-` or `*` yields a pattern in
/// the set. Segment 0 is the empty string before the leading slash and is
/// never substituted.
///
/// ```
/// use formflow_state::{is_path_allowed, AllowedPaths};
///
/// let allowed: AllowedPaths = ["/items/-/amount"].into_iter().collect();
/// assert!(is_path_allowed("/items/7/amount", &allowed));
/// assert!(!is_path_allowed("/items/0/name", &allowed));
/// ```
pub fn is_path_allowed(path: &str, allowed: &AllowedPaths) -> bool {
    if allowed.is_unrestricted() || allowed.contains(path) {
        return true;
    }
    matches_wildcard(path, allowed)
}

/// Wildcard search, driven by the patterns rather than by enumerating all
/// 3^n substitutions of the path: a pattern matches iff it has the same
/// segment count, the same segment 0, and every later segment is either
/// equal to the path's or a wildcard. Cost is linear in the allow-list.
fn matches_wildcard(path: &str, allowed: &AllowedPaths) -> bool {
    let segments: Vec<&str> = path.split('/').collect();
    allowed
        .iter()
        .filter(|pattern| pattern.contains(ARRAY_WILDCARD) || pattern.contains(MAP_WILDCARD))
        .any(|pattern| pattern_matches(pattern, &segments))
}

fn pattern_matches(pattern: &str, segments: &[&str]) -> bool {
    let mut pattern_segments = pattern.split('/');
    let mut used_wildcard = false;
    for (index, seg) in segments.iter().enumerate() {
        let Some(p) = pattern_segments.next() else {
            return false;
        };
        if index == 0 {
            if p != *seg {
                return false;
            }
            continue;
        }
        if p == ARRAY_WILDCARD || p == MAP_WILDCARD {
            used_wildcard = true;
        } else if p != *seg {
            return false;
        }
    }
    pattern_segments.next().is_none() && used_wildcard
}
