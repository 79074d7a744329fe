//! Loose version comparison for package versions.
//!
//! Good enough to tell an upgrade from a reinstall or downgrade; the package
//! manager remains the authority on ordering.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// How a package file relates to the installed version of the same package.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VersionRelation {
    Upgrade,
    Reinstall,
    Downgrade,
}

impl VersionRelation {
    /// Relation of installing `candidate` over `installed`.
    pub fn between(candidate: &str, installed: &str) -> Self {
        match compare_versions(candidate, installed) {
            Ordering::Greater => VersionRelation::Upgrade,
            Ordering::Equal => VersionRelation::Reinstall,
            Ordering::Less => VersionRelation::Downgrade,
        }
    }
}

impl fmt::Display for VersionRelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VersionRelation::Upgrade => "upgrade",
            VersionRelation::Reinstall => "reinstall",
            VersionRelation::Downgrade => "downgrade",
        };
        f.write_str(s)
    }
}

#[derive(Debug)]
enum Segment<'a> {
    Number(&'a str),
    Text(&'a str),
}

impl Ord for Segment<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Segment::Number(a), Segment::Number(b)) => {
                let a = a.trim_start_matches('0');
                let b = b.trim_start_matches('0');
                a.len().cmp(&b.len()).then_with(|| a.cmp(b))
            }
            (Segment::Text(a), Segment::Text(b)) => a.cmp(b),
            // 1.0.1 is newer than 1.0.beta
            (Segment::Number(_), Segment::Text(_)) => Ordering::Greater,
            (Segment::Text(_), Segment::Number(_)) => Ordering::Less,
        }
    }
}

impl PartialEq for Segment<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Segment<'_> {}

impl PartialOrd for Segment<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn split_epoch(version: &str) -> (u64, &str) {
    match version.split_once(':') {
        Some((epoch, rest)) if !epoch.is_empty() && epoch.bytes().all(|b| b.is_ascii_digit()) => {
            (epoch.parse().unwrap_or(u64::MAX), rest)
        }
        _ => (0, version),
    }
}

fn segments(version: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut start = None;
    let mut numeric = false;

    for (i, c) in version.char_indices() {
        let is_digit = c.is_ascii_digit();
        if !c.is_alphanumeric() {
            if let Some(s) = start.take() {
                out.push(make_segment(&version[s..i], numeric));
            }
            continue;
        }
        match start {
            Some(s) if is_digit != numeric => {
                out.push(make_segment(&version[s..i], numeric));
                start = Some(i);
            }
            None => start = Some(i),
            _ => {}
        }
        numeric = is_digit;
    }
    if let Some(s) = start {
        out.push(make_segment(&version[s..], numeric));
    }
    out
}

fn make_segment(text: &str, numeric: bool) -> Segment<'_> {
    if numeric {
        Segment::Number(text)
    } else {
        Segment::Text(text)
    }
}

/// Compares two version strings segment by segment.
///
/// An `epoch:` prefix dominates. Numeric runs compare numerically, alphabetic
/// runs lexically; separators only delimit. When one version is a prefix of the
/// other, the longer one is newer.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let (epoch_a, rest_a) = split_epoch(a.trim());
    let (epoch_b, rest_b) = split_epoch(b.trim());

    epoch_a
        .cmp(&epoch_b)
        .then_with(|| segments(rest_a).cmp(&segments(rest_b)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("1.10", "1.9", Ordering::Greater)]
    #[case("2.10-3", "2.10-3", Ordering::Equal)]
    #[case("1.0", "1.0.1", Ordering::Less)]
    #[case("1:1.0", "2.0", Ordering::Greater)]
    #[case("1.0.1", "1.0.beta", Ordering::Greater)]
    #[case("1.36.1-r29", "1.36.1-r3", Ordering::Greater)]
    #[case("007", "7", Ordering::Equal)]
    #[case("14.1.0-1", "14.1.0-2", Ordering::Less)]
    fn test_compare_versions(#[case] a: &str, #[case] b: &str, #[case] expected: Ordering) {
        assert_eq!(compare_versions(a, b), expected);
        assert_eq!(compare_versions(b, a), expected.reverse());
    }

    #[test]
    fn test_relation() {
        assert_eq!(VersionRelation::between("2.0", "1.0"), VersionRelation::Upgrade);
        assert_eq!(VersionRelation::between("1.0", "1.0"), VersionRelation::Reinstall);
        assert_eq!(VersionRelation::between("0.9", "1.0"), VersionRelation::Downgrade);
        assert_eq!(VersionRelation::Downgrade.to_string(), "downgrade");
    }
}
