use crate::model::{VersionToken, VersionVerdict};
use std::cmp::Ordering;

/// Parses a dotted version into its leading integer components.
///
/// Parsing stops at the first component that is not a plain integer, so
/// `"5.3-beta"` yields `[5]` and `"beta"` yields `[]`.
pub fn parse_version(version: &str) -> Vec<u64> {
    version
        .trim()
        .split('.')
        .map_while(|part| part.parse::<u64>().ok())
        .collect()
}

/// Lexicographic comparison, stopping at the first differing component.
/// A strictly shorter sequence with an equal prefix is the lower one, so
/// `2.0` sorts before `2.0.0`.
pub fn compare_versions(a: &[u64], b: &[u64]) -> Ordering {
    a.cmp(b)
}

/// Returns true only when both versions are present, both parse to at
/// least one integer, and `observed` is strictly lower.
pub fn is_stale(observed: &VersionToken, authoritative: Option<&str>) -> bool {
    let (Some(observed), Some(authoritative)) = (observed.as_visible(), authoritative) else {
        return false;
    };

    let observed = parse_version(observed);
    let authoritative = parse_version(authoritative);
    if observed.is_empty() || authoritative.is_empty() {
        return false;
    }

    compare_versions(&observed, &authoritative) == Ordering::Less
}

pub fn reconcile(observed: &VersionToken, authoritative: Option<String>) -> VersionVerdict {
    let stale = is_stale(observed, authoritative.as_deref());
    VersionVerdict {
        observed: observed.clone(),
        authoritative,
        stale,
    }
}
