//! Constraint kinds and their `check(v)` (§4.1).

use super::{normalize, Version};

/// A parsed version constraint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Constraint {
    /// `""` or `*`: matches everything.
    Any,
    /// `stable`/`latest` used as a filter: non-prerelease only.
    Stable,
    /// A single integer, possibly `v`-prefixed: `v.major == pattern.major`.
    PartialMajor(u64),
    /// `major.minor`: `v.{major,minor}` equal the pattern's.
    PartialMajorMinor(u64, u64),
    /// `^`, `~`, `>=`, or an interval: delegates to `semver::VersionReq`.
    SemverRange(semver::VersionReq),
    /// An exact version, matched after normalization.
    Exact(String),
}

impl Constraint {
    /// Parses a constraint string per §4.1's constraint-kind rules.
    pub fn parse(s: &str) -> Constraint {
        let trimmed = s.trim();

        if trimmed.is_empty() || trimmed == "*" {
            return Constraint::Any;
        }
        if trimmed.eq_ignore_ascii_case("stable") || trimmed.eq_ignore_ascii_case("latest") {
            return Constraint::Stable;
        }

        if super::is_partial_version(trimmed) {
            let normalized = normalize(trimmed);
            let mut parts = normalized.split('.');
            let major: u64 = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
            return match parts.next() {
                Some(minor) => match minor.parse::<u64>() {
                    Ok(minor) => Constraint::PartialMajorMinor(major, minor),
                    Err(_) => Constraint::PartialMajor(major),
                },
                None => Constraint::PartialMajor(major),
            };
        }

        if super::looks_like_exact_version(trimmed) {
            return Constraint::Exact(normalize(trimmed));
        }

        match semver::VersionReq::parse(trimmed) {
            Ok(req) => Constraint::SemverRange(req),
            Err(_) => Constraint::Exact(normalize(trimmed)),
        }
    }

    /// Evaluates whether `v` satisfies this constraint.
    pub fn check(&self, v: &Version) -> bool {
        match self {
            Constraint::Any => true,
            Constraint::Stable => !v.prerelease,
            Constraint::PartialMajor(major) => {
                v.semver().map(|s| s.major == *major).unwrap_or(false)
            }
            Constraint::PartialMajorMinor(major, minor) => v
                .semver()
                .map(|s| s.major == *major && s.minor == *minor)
                .unwrap_or(false),
            Constraint::SemverRange(req) => v.semver().map(|s| req.matches(&s)).unwrap_or(false),
            Constraint::Exact(expected) => {
                &v.tag == expected
                    || &v.normalized == expected
                    || v.tag == format!("v{expected}")
                    || v.normalized == format!("v{expected}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(tag: &str) -> Version {
        Version::new(tag)
    }

    #[test]
    fn any_matches_everything() {
        let c = Constraint::parse("*");
        assert!(c.check(&v("v1.0.0")));
        assert!(c.check(&v("v1.0.0-beta.1")));
    }

    #[test]
    fn stable_filters_prerelease() {
        let c = Constraint::parse("stable");
        assert!(c.check(&v("v1.0.0")));
        assert!(!c.check(&v("v1.0.0-beta.1")));
    }

    #[test]
    fn partial_major_minor() {
        let c = Constraint::parse("3.1");
        assert!(c.check(&v("v3.1.2")));
        assert!(!c.check(&v("v3.0.5")));

        let c = Constraint::parse("3");
        assert!(c.check(&v("v3.1.2")));
        assert!(!c.check(&v("v2.1.0")));
    }

    #[test]
    fn semver_range() {
        let c = Constraint::parse("^1.0.0");
        assert!(c.check(&v("v1.5.0")));
        assert!(!c.check(&v("v2.0.0")));
    }

    #[test]
    fn exact_after_normalization() {
        let c = Constraint::parse("4.35.1");
        assert!(c.check(&v("v4.35.1")));
        assert!(!c.check(&v("v4.35.2")));
    }
}
