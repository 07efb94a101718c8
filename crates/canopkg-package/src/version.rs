//! Version parsing and range resolution
//!
//! Versions are plain `semver` versions. Range expressions follow the npm
//! dialect used by package registries (bare versions are exact, whitespace
//! separates comparators, `||` separates alternatives, `a - b` is inclusive)
//! and are lowered onto `semver::VersionReq`.

use semver::{Version, VersionReq};
use std::cmp::Ordering;
use std::fmt;

/// Range tokens that mean "the newest version available"
const LATEST_TOKENS: [&str; 2] = ["latest", "current"];

/// Parse a version string, returning `None` for anything that is not semver.
///
/// A leading `v` is tolerated (`v1.2.3`).
pub fn parse_version(s: &str) -> Option<Version> {
    let trimmed = s.trim();
    let trimmed = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);
    Version::parse(trimmed).ok()
}

/// True if a range expression asks for the latest version
pub fn is_latest_range(range: &str) -> bool {
    let range = range.trim();
    range.is_empty() || LATEST_TOKENS.iter().any(|t| range.eq_ignore_ascii_case(t))
}

/// A parsed range expression: any of the alternatives may match
#[derive(Debug, Clone, PartialEq)]
pub struct VersionRange {
    alternatives: Vec<VersionReq>,
}

impl VersionRange {
    /// Parse a range expression, `None` if it is malformed
    pub fn parse(expr: &str) -> Option<Self> {
        let alternatives = expr
            .split("||")
            .map(lower_comparator_set)
            .collect::<Option<Vec<_>>>()?;
        Some(Self { alternatives })
    }

    /// Check if a version satisfies the range
    pub fn matches(&self, version: &Version) -> bool {
        self.alternatives.iter().any(|req| req.matches(version))
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.alternatives.iter().map(|r| r.to_string()).collect();
        write!(f, "{}", parts.join(" || "))
    }
}

/// Lower one npm comparator set onto a semver requirement
fn lower_comparator_set(set: &str) -> Option<VersionReq> {
    let set = set.trim();
    if set.is_empty() || matches!(set, "*" | "x" | "X") {
        return Some(VersionReq::STAR);
    }

    if let Some((low, high)) = set.split_once(" - ") {
        let req = format!(">={}, <={}", strip_v(low.trim()), strip_v(high.trim()));
        return VersionReq::parse(&req).ok();
    }

    let mut comparators = Vec::new();
    let mut pending_op: Option<&str> = None;
    for token in set
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
    {
        let op_len = token
            .find(|c: char| !matches!(c, '<' | '>' | '=' | '^' | '~'))
            .unwrap_or(token.len());
        let (op, rest) = token.split_at(op_len);

        if rest.is_empty() {
            // Operator separated from its version by whitespace (">= 1.0.0")
            pending_op = Some(op);
            continue;
        }

        let op = match pending_op.take() {
            Some(prefix) if op.is_empty() => prefix,
            _ => op,
        };
        let rest = strip_v(rest);
        let op = if op.is_empty() && !has_wildcard(rest) {
            "="
        } else {
            op
        };
        comparators.push(format!("{}{}", op, rest));
    }

    if pending_op.is_some() || comparators.is_empty() {
        return None;
    }

    VersionReq::parse(&comparators.join(", ")).ok()
}

fn strip_v(s: &str) -> &str {
    s.strip_prefix('v').unwrap_or(s)
}

fn has_wildcard(version: &str) -> bool {
    let core = version.split(['-', '+']).next().unwrap_or(version);
    core.split('.').any(|part| matches!(part, "x" | "X" | "*"))
}

/// The sorted set of known versions for one package
///
/// Build metadata is ignored for ordering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Versions {
    items: Vec<Version>,
}

impl Versions {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Build from raw version strings; strings that are not versions are dropped
    pub fn parse<I, S>(raw: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::from_versions(raw.into_iter().filter_map(|s| parse_version(s.as_ref())))
    }

    /// Build from already parsed versions
    pub fn from_versions<I: IntoIterator<Item = Version>>(versions: I) -> Self {
        let mut items: Vec<Version> = versions.into_iter().collect();
        items.sort_by(precedence);
        items.dedup();
        Self { items }
    }

    /// Add a version, keeping the set sorted
    pub fn push(&mut self, version: Version) {
        if self.items.contains(&version) {
            return;
        }
        let at = self
            .items
            .partition_point(|v| precedence(v, &version) != Ordering::Greater);
        self.items.insert(at, version);
    }

    /// The highest version, if any
    pub fn latest(&self) -> Option<Version> {
        self.items.last().cloned()
    }

    /// Resolve a range expression to the highest satisfying version
    ///
    /// An empty expression, `latest` or `current` resolve to [`Versions::latest`].
    /// Malformed expressions resolve to `None`.
    pub fn resolve(&self, range: &str) -> Option<Version> {
        if is_latest_range(range) {
            return self.latest();
        }
        let range = VersionRange::parse(range)?;
        self.resolve_range(&range)
    }

    /// Highest version satisfying an already parsed range
    pub fn resolve_range(&self, range: &VersionRange) -> Option<Version> {
        self.items.iter().rev().find(|v| range.matches(v)).cloned()
    }

    pub fn contains(&self, version: &Version) -> bool {
        self.items.contains(version)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Versions in ascending order
    pub fn iter(&self) -> impl Iterator<Item = &Version> {
        self.items.iter()
    }
}

fn precedence(a: &Version, b: &Version) -> Ordering {
    a.cmp_precedence(b)
}
