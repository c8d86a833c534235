//! Semver range satisfaction and selection.
//!
//! Ranges arrive as strings from manifests and registry metadata and stay
//! strings at rest; this module is the only place they are interpreted.
//! Range syntax follows the registry's conventions: `*`, the empty string
//! and `latest` all mean "highest available", a bare `1.2.3` pins exactly,
//! and compound ranges may separate comparators with spaces (`>=1.2 <2`)
//! as well as commas.

use semver::{Version, VersionReq};

/// A parsed range. Invalid range strings parse to `None` and never match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Range {
    /// `*`, `latest`, or empty: any version satisfies.
    Any,
    /// A bare version string: only that exact version satisfies.
    Exact(Version),
    /// Everything else, via [`VersionReq`].
    Req(VersionReq),
}

impl Range {
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() || raw == "*" || raw == "latest" {
            return Some(Self::Any);
        }
        if let Ok(version) = Version::parse(raw) {
            return Some(Self::Exact(version));
        }
        // Space-separated comparator lists are an AND, same as commas.
        let normalised = if raw.contains(' ') && !raw.contains(',') {
            raw.split_whitespace().collect::<Vec<_>>().join(", ")
        } else {
            raw.to_string()
        };
        VersionReq::parse(&normalised).ok().map(Self::Req)
    }

    #[must_use]
    pub fn matches(&self, version: &Version) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(exact) => version == exact,
            Self::Req(req) => req.matches(version),
        }
    }
}

/// Parse a list of candidate version strings, silently dropping entries
/// that are not valid semver, sorted strictly descending.
#[must_use]
pub fn valid_versions(candidates: &[String]) -> Vec<Version> {
    let mut versions: Vec<Version> = candidates
        .iter()
        .filter_map(|raw| Version::parse(raw).ok())
        .collect();
    versions.sort_by(|a, b| b.cmp(a));
    versions
}

/// The highest valid version satisfying `range`, if any.
#[must_use]
pub fn resolve(range: &str, candidates: &[String]) -> Option<Version> {
    find_highest_satisfying(&[range.to_string()], candidates)
}

/// The highest valid version satisfying every range simultaneously.
///
/// Returns `None` when the ranges are jointly unsatisfiable against the
/// candidate set; the caller is responsible for reporting which dependents
/// contributed which ranges.
#[must_use]
pub fn find_highest_satisfying(ranges: &[String], candidates: &[String]) -> Option<Version> {
    let parsed: Option<Vec<Range>> = ranges.iter().map(|r| Range::parse(r)).collect();
    let parsed = parsed?;
    valid_versions(candidates)
        .into_iter()
        .find(|version| parsed.iter().all(|range| range.matches(version)))
}

/// Cheap satisfiability pre-check used before a registry round-trip.
///
/// May return `true` for ranges that later turn out to conflict; it only
/// returns `false` when the ranges are certainly disjoint (two different
/// exact pins, or an exact pin outside another range).
#[must_use]
pub fn intersects(ranges: &[String]) -> bool {
    let parsed: Vec<Range> = match ranges.iter().map(|r| Range::parse(r)).collect() {
        Some(parsed) => parsed,
        None => return false,
    };
    let pins: Vec<&Version> = parsed
        .iter()
        .filter_map(|range| match range {
            Range::Exact(version) => Some(version),
            _ => None,
        })
        .collect();
    if pins.windows(2).any(|pair| pair[0] != pair[1]) {
        return false;
    }
    if let Some(pin) = pins.first() {
        return parsed.iter().all(|range| range.matches(pin));
    }
    true
}
