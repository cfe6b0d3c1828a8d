//! Version normalization, comparison, ordering, and output-extraction (§4.1).

mod constraint;

pub use constraint::Constraint;

use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;

/// A resolved version as produced by a source manager (§3 "Version").
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Version {
    pub tag: String,
    pub normalized: String,
    pub sha: Option<String>,
    pub published: Option<String>,
    pub prerelease: bool,
}

impl Version {
    pub fn new(tag: impl Into<String>) -> Self {
        let tag = tag.into();
        let normalized = normalize(&tag);
        let prerelease = semver::Version::parse(&normalized)
            .map(|v| !v.pre.is_empty())
            .unwrap_or(false);
        Version {
            tag,
            normalized,
            sha: None,
            published: None,
            prerelease,
        }
    }

    pub fn semver(&self) -> Option<semver::Version> {
        semver::Version::parse(&self.normalized).ok()
    }
}

static STRIP_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(v|release-|version-)").unwrap());
static STRIP_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)-release$").unwrap());
static LOOKS_LIKE_VERSION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^v?\d").unwrap());

/// Normalizes a tag to something that should parse as semver (§4.1).
///
/// Strips known prefixes/suffixes, then peels a leading `<word>-` prefix
/// (e.g. `jq-1.6 -> 1.6`) when what follows looks like a version, while
/// leaving things like `operator/v0.8.0` alone.
pub fn normalize(s: &str) -> String {
    let mut out = STRIP_PREFIX.replace(s, "").into_owned();
    out = STRIP_SUFFIX.replace(&out, "").into_owned();

    if let Some(idx) = out.find(['-', '_']) {
        let (_, rest) = out.split_at(idx);
        let rest = &rest[1..];
        if LOOKS_LIKE_VERSION.is_match(rest) {
            out = rest.to_string();
        }
    }

    out
}

/// `Normalize` is idempotent: re-normalizing a normalized string is a no-op.
pub fn normalize_idempotent_holds(s: &str) -> bool {
    normalize(&normalize(s)) == normalize(s)
}

/// Splits a version string (ignoring any leading `v`) into its numeric
/// segments across `.` and `+`, for the OpenJDK-style build-metadata
/// compare rule in §4.1/§9.
fn numeric_tuple(s: &str) -> Option<Vec<u64>> {
    let s = s.strip_prefix('v').unwrap_or(s);
    let segments: Vec<&str> = s.split(['.', '+', '-']).collect();
    let mut out = Vec::with_capacity(segments.len());
    for seg in segments {
        match seg.parse::<u64>() {
            Ok(n) => out.push(n),
            Err(_) => return None,
        }
    }
    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

/// Compares two version-like strings. Normalizes both, compares as semver
/// when possible (with build-metadata tuple fallback for OpenJDK-style
/// versions), and falls back to lexicographic ordering otherwise (§4.1).
pub fn compare(a: &str, b: &str) -> Ordering {
    let na = normalize(a);
    let nb = normalize(b);

    match (semver::Version::parse(&na), semver::Version::parse(&nb)) {
        (Ok(va), Ok(vb)) => {
            let core = va.cmp(&vb);
            if core != Ordering::Equal {
                return core;
            }
            match (numeric_tuple(&na), numeric_tuple(&nb)) {
                (Some(ta), Some(tb)) => ta.cmp(&tb),
                _ => core,
            }
        }
        _ => match (numeric_tuple(&na), numeric_tuple(&nb)) {
            (Some(ta), Some(tb)) => ta.cmp(&tb),
            _ => na.cmp(&nb),
        },
    }
}

/// Extracts a version from free-form command output via a regex (§4.1).
/// Falls back to a default pattern covering `vX.Y[.Z][-pre]` and
/// OpenJDK-style `major.minor.patch+build` when `pattern` is empty.
pub fn extract_from_output(text: &str, pattern: &str) -> Option<String> {
    static DEFAULT: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"v?(\d+\.\d+(?:\.\d+)?(?:\+\d+)?(?:-[0-9A-Za-z.]+)?)").unwrap()
    });

    let re = if pattern.is_empty() {
        None
    } else {
        Regex::new(pattern).ok()
    };

    let capture = match &re {
        Some(re) => re.captures(text),
        None => DEFAULT.captures(text),
    };

    capture
        .and_then(|c| c.get(1).or_else(|| c.get(0)))
        .map(|m| normalize(m.as_str()))
}

/// Total order used by [`sort_versions`]: valid semver tags sort before
/// non-semver tags; among semver tags larger wins; among non-semver tags,
/// lexicographic descending (§4.1).
fn version_key(v: &str) -> (bool, Option<semver::Version>, &str) {
    let normalized = normalize(v);
    match semver::Version::parse(&normalized) {
        Ok(parsed) => (true, Some(parsed), v),
        Err(_) => (false, None, v),
    }
}

/// Sorts version-like strings descending per the total order in §4.1.
pub fn sort_versions(mut versions: Vec<String>) -> Vec<String> {
    versions.sort_by(|a, b| {
        let (a_semver, a_parsed, a_raw) = version_key(a);
        let (b_semver, b_parsed, b_raw) = version_key(b);

        match (a_semver, b_semver) {
            (true, true) => {
                let core = b_parsed.as_ref().unwrap().cmp(a_parsed.as_ref().unwrap());
                if core != Ordering::Equal {
                    return core;
                }
                let ta = numeric_tuple(&normalize(a_raw));
                let tb = numeric_tuple(&normalize(b_raw));
                match (ta, tb) {
                    (Some(x), Some(y)) => y.cmp(&x),
                    _ => core,
                }
            }
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => b_raw.cmp(&a_raw),
        }
    });
    versions
}

/// True iff `s` has no constraint operator characters and parses as a full
/// three-part semver (§4.1).
pub fn looks_like_exact_version(s: &str) -> bool {
    if s.chars().any(|c| "><=~^*".contains(c)) {
        return false;
    }
    semver::Version::parse(&normalize(s)).is_ok()
}

/// True iff `s` has no operator characters, at most one dot, and parses
/// once `.0`/`.0.0` is appended (§4.1).
pub fn is_partial_version(s: &str) -> bool {
    if s.chars().any(|c| "><=~^*".contains(c)) {
        return false;
    }
    let normalized = normalize(s);
    if normalized.matches('.').count() > 1 {
        return false;
    }
    let padded = match normalized.matches('.').count() {
        0 => format!("{normalized}.0.0"),
        1 => format!("{normalized}.0"),
        _ => return false,
    };
    semver::Version::parse(&padded).is_ok()
}
