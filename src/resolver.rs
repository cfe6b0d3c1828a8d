//! Version resolver: adaptive fetch-limit selection plus an enhanced,
//! suggestion-bearing error on exhaustion (§4.5).

use crate::error::Error;
use crate::version::{self, Constraint, Version};
use std::future::Future;

/// Upper bound past which a retry is treated as "fetch everything" (§4.5
/// "capped at all").
const UNBOUNDED_THRESHOLD: usize = 1000;

enum SelectKind {
    Latest,
    Stable,
    Other(Constraint),
}

fn classify(s: &str) -> SelectKind {
    let t = s.trim();
    if t.is_empty() || t == "*" || t.eq_ignore_ascii_case("any") || t.eq_ignore_ascii_case("latest") {
        SelectKind::Latest
    } else if t.eq_ignore_ascii_case("stable") {
        SelectKind::Stable
    } else {
        SelectKind::Other(Constraint::parse(t))
    }
}

/// Picks the adaptive fetch limit for a constraint string (§4.5).
pub fn adaptive_limit(version_str: &str) -> usize {
    let t = version_str.trim();
    if t.is_empty() || t == "*" || t.eq_ignore_ascii_case("any") || t.eq_ignore_ascii_case("latest") {
        return 10;
    }
    if t.eq_ignore_ascii_case("stable") {
        return 20;
    }
    if version::looks_like_exact_version(t) {
        return 200;
    }
    if t.starts_with('~') || t.starts_with('=') || t.contains(',') {
        return 50;
    }
    if t.starts_with('^') || t.starts_with(">=") {
        return 100;
    }
    50
}

fn select(version_str: &str, versions: &[Version]) -> Result<Version, String> {
    match classify(version_str) {
        SelectKind::Latest => versions
            .iter()
            .find(|v| !v.prerelease)
            .or_else(|| versions.first())
            .cloned()
            .ok_or_else(|| "not found: no versions available".to_string()),
        SelectKind::Stable => versions
            .iter()
            .find(|v| !v.prerelease)
            .cloned()
            .ok_or_else(|| "no stable version found".to_string()),
        SelectKind::Other(Constraint::Any) => versions
            .iter()
            .find(|v| !v.prerelease)
            .or_else(|| versions.first())
            .cloned()
            .ok_or_else(|| "not found: no versions available".to_string()),
        SelectKind::Other(Constraint::Stable) => versions
            .iter()
            .find(|v| !v.prerelease)
            .cloned()
            .ok_or_else(|| "no stable version found".to_string()),
        SelectKind::Other(Constraint::Exact(expected)) => versions
            .iter()
            .find(|v| {
                v.tag == expected
                    || v.normalized == expected
                    || v.tag == format!("v{expected}")
                    || v.normalized == format!("v{expected}")
            })
            .cloned()
            .ok_or_else(|| format!("version {version_str} not found")),
        SelectKind::Other(constraint @ Constraint::PartialMajor(_))
        | SelectKind::Other(constraint @ Constraint::PartialMajorMinor(_, _)) => {
            let has_stable = versions.iter().any(|v| constraint.check(v) && !v.prerelease);
            versions
                .iter()
                .filter(|v| constraint.check(v) && (!has_stable || !v.prerelease))
                .cloned()
                .next()
                .ok_or_else(|| format!("no versions satisfy {version_str}"))
        }
        SelectKind::Other(constraint @ Constraint::SemverRange(_)) => versions
            .iter()
            .filter(|v| constraint.check(v))
            .cloned()
            .next()
            .ok_or_else(|| format!("no versions satisfy {version_str}")),
    }
}

fn should_retry_with_more(reason: &str) -> bool {
    reason.contains("not found") || reason.contains("no versions satisfy") || reason.contains("no stable")
}

/// Closest-match suggestion: minor+patch distance within the same major
/// version, else the latest stable version (§4.5).
fn closest_match(requested: &str, versions: &[Version]) -> Option<String> {
    if let Ok(target) = semver::Version::parse(&version::normalize(requested)) {
        let mut best: Option<(u64, &Version)> = None;
        for v in versions {
            if let Some(sv) = v.semver() {
                if sv.major == target.major {
                    let dist = (sv.minor as i64 - target.minor as i64).unsigned_abs()
                        + (sv.patch as i64 - target.patch as i64).unsigned_abs();
                    if best.map(|(d, _)| dist < d).unwrap_or(true) {
                        best = Some((dist, v));
                    }
                }
            }
        }
        if let Some((_, v)) = best {
            return Some(v.tag.clone());
        }
    }
    versions
        .iter()
        .find(|v| !v.prerelease)
        .or_else(|| versions.first())
        .map(|v| v.tag.clone())
}

fn enhanced_error(package: &str, requested: &str, versions: &[Version]) -> Error {
    let candidates: Vec<String> = versions.iter().take(10).map(|v| v.tag.clone()).collect();
    let suggestion = closest_match(requested, versions);
    Error::VersionNotFound {
        package: package.to_string(),
        requested: requested.to_string(),
        candidates,
        suggestion,
    }
}

/// Resolves `version_str` against versions obtained from `fetch`, retrying
/// once with a larger limit if the initial selection fails for a reason
/// that suggests deeper search (§4.5).
pub async fn resolve<F, Fut>(
    version_str: &str,
    package: &str,
    fetch: F,
) -> Result<Version, Error>
where
    F: Fn(usize) -> Fut,
    Fut: Future<Output = Result<Vec<Version>, Error>>,
{
    let limit = adaptive_limit(version_str);
    let versions = fetch(limit).await?;

    match select(version_str, &versions) {
        Ok(v) => Ok(v),
        Err(reason) if should_retry_with_more(&reason) && limit != 0 => {
            let bigger = limit.saturating_mul(5);
            let bigger = if bigger >= UNBOUNDED_THRESHOLD { 0 } else { bigger };
            let versions = fetch(bigger).await?;
            select(version_str, &versions).map_err(|_| enhanced_error(package, version_str, &versions))
        }
        Err(_) => Err(enhanced_error(package, version_str, &versions)),
    }
}
