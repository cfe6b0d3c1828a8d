//! Asset matcher: resolves platform-pattern maps against a concrete
//! platform, filters raw asset-name lists heuristically, and computes
//! fuzzy "did you mean" suggestions (§4.3, §4.9).

use crate::error::{Error, Result};
use crate::platform::{arch_alias_priority, canonical_arch, canonical_os, Platform};
use std::collections::BTreeMap;

/// A `{platform-pattern -> value}` mapping, e.g. `asset-patterns` or
/// `symlinks` entries (§3).
pub type PatternMap = BTreeMap<String, String>;

/// Resolves a platform-pattern map against a concrete platform.
///
/// Priority: exact key `"os-arch"`, then non-bare-`*` globs (including
/// comma-lists, any segment matching), then a bare `"*"` (§4.3).
pub fn resolve_pattern<'a>(map: &'a PatternMap, platform: &Platform) -> Result<&'a str> {
    let exact = platform.key();
    if let Some(v) = map.get(&exact) {
        return Ok(v);
    }

    for (pattern, value) in map {
        if pattern == "*" {
            continue;
        }
        if pattern_matches(pattern, platform) {
            return Ok(value);
        }
    }

    if let Some(v) = map.get("*") {
        return Ok(v);
    }

    Err(Error::PlatformNotSupported {
        package: String::new(),
        platform: exact,
        available: map.keys().cloned().collect(),
    })
}

/// Matches a single glob/comma-list pattern (optionally negated) against a
/// platform, using `filepath.Match`-style wildcards on the `"os-arch"` key.
fn pattern_matches(pattern: &str, platform: &Platform) -> bool {
    let key = platform.key();
    pattern
        .split(',')
        .map(str::trim)
        .any(|segment| glob_match(segment, &key))
}

/// A small `filepath.Match`-style glob: `*` matches any run of characters,
/// `?` matches a single character, everything else is literal.
fn glob_match(pattern: &str, text: &str) -> bool {
    fn inner(pattern: &[u8], text: &[u8]) -> bool {
        match (pattern.first(), text.first()) {
            (None, None) => true,
            (Some(b'*'), _) => {
                inner(&pattern[1..], text) || (!text.is_empty() && inner(pattern, &text[1..]))
            }
            (Some(b'?'), Some(_)) => inner(&pattern[1..], &text[1..]),
            (Some(p), Some(t)) if p.to_ascii_lowercase() == t.to_ascii_lowercase() => {
                inner(&pattern[1..], &text[1..])
            }
            _ => false,
        }
    }
    inner(pattern.as_bytes(), text.as_bytes())
}

/// Parses a `"[[!]pattern:] value"` platform-entry string (§4.3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformEntry {
    pub pattern: Option<String>,
    pub negated: bool,
    pub value: String,
}

pub fn parse_platform_entry(s: &str) -> PlatformEntry {
    if let Some(idx) = s.find(':') {
        let (prefix, rest) = s.split_at(idx);
        let value = rest[1..].trim().to_string();
        let (negated, pattern) = if let Some(p) = prefix.strip_prefix('!') {
            (true, p.trim().to_string())
        } else {
            (false, prefix.trim().to_string())
        };
        // Guard against values that merely contain a colon, e.g. URLs: only
        // treat the prefix as a platform pattern if it looks like one.
        if pattern.chars().all(|c| c.is_alphanumeric() || "*-_,!".contains(c)) && !pattern.is_empty()
        {
            return PlatformEntry {
                pattern: Some(pattern),
                negated,
                value,
            };
        }
    }
    PlatformEntry {
        pattern: None,
        negated: false,
        value: s.trim().to_string(),
    }
}

/// Filters platform entries, honoring negation; entries with no prefix
/// always match (§4.3).
pub fn filter_entries_by_platform(entries: &[&str], platform: &Platform) -> Vec<String> {
    entries
        .iter()
        .map(|e| parse_platform_entry(e))
        .filter(|entry| match &entry.pattern {
            None => true,
            Some(pattern) => {
                let matches = pattern_matches(pattern, platform);
                matches != entry.negated
            }
        })
        .map(|entry| entry.value)
        .collect()
}

const NON_BINARY_EXTENSIONS: &[&str] = &[
    ".sig", ".asc", ".gpg", ".sha1", ".sha256", ".sha512", ".md5", ".json", ".yaml", ".txt",
];
const NON_BINARY_BASENAME_PREFIXES: &[&str] = &[
    "checksums", "readme", "license", "changelog", "authors", "copying",
];

fn is_non_binary(name: &str, os: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    if NON_BINARY_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
        return true;
    }
    if lower.ends_with(".msi") && canonical_os(os) != Some("windows") {
        return true;
    }
    NON_BINARY_BASENAME_PREFIXES
        .iter()
        .any(|prefix| lower.starts_with(prefix))
}

/// Heuristic three-stage asset filter (§4.3).
///
/// Drops non-binary files, then narrows by OS alias substring match, then
/// by arch alias substring match (tie-broken by alias specificity). At any
/// stage, if filtering would return zero results, the prior stage's output
/// is kept instead (treated as a "universal binary"); only stage (i)
/// failing zero is an actual failure.
pub fn filter_assets_by_platform<'a>(names: &[&'a str], os: &str, arch: &str) -> Vec<&'a str> {
    let stage1: Vec<&str> = names
        .iter()
        .copied()
        .filter(|n| !is_non_binary(n, os))
        .collect();
    if stage1.is_empty() {
        return stage1;
    }

    let stage2: Vec<&str> = stage1
        .iter()
        .copied()
        .filter(|n| {
            let lower = n.to_ascii_lowercase();
            os_alias_list(os).iter().any(|alias| lower.contains(alias))
        })
        .collect();
    let stage2 = if stage2.is_empty() { stage1.clone() } else { stage2 };

    let arch_priority = canonical_arch(arch)
        .map(arch_alias_priority)
        .unwrap_or_else(|| vec![arch]);

    let mut best: Vec<&str> = Vec::new();
    for alias in &arch_priority {
        let alias_lower = alias.to_ascii_lowercase();
        let matched: Vec<&str> = stage2
            .iter()
            .copied()
            .filter(|n| n.to_ascii_lowercase().contains(&alias_lower))
            .collect();
        if !matched.is_empty() {
            best = matched;
            break;
        }
    }

    if best.is_empty() {
        stage2
    } else {
        best
    }
}

fn os_alias_list(os: &str) -> Vec<&'static str> {
    match canonical_os(os) {
        Some("darwin") => vec!["darwin", "mac", "macos", "osx"],
        Some("windows") => vec!["windows", "win", "win32", "win64"],
        Some("linux") => vec!["linux"],
        _ => vec![],
    }
}

/// Levenshtein edit distance, used by the fuzzy-suggestion machinery.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut dp = vec![vec![0usize; b.len() + 1]; a.len() + 1];
    for (i, row) in dp.iter_mut().enumerate() {
        row[0] = i;
    }
    for j in 0..=b.len() {
        dp[0][j] = j;
    }
    for i in 1..=a.len() {
        for j in 1..=b.len() {
            let cost = if a[i - 1] == b[j - 1] { 0 } else { 1 };
            dp[i][j] = (dp[i - 1][j] + 1)
                .min(dp[i][j - 1] + 1)
                .min(dp[i - 1][j - 1] + cost);
        }
    }
    dp[a.len()][b.len()]
}

/// Computes a single "did you mean" suggestion from `query` against
/// `candidates`, iff similarity >= 30% (§4.9).
pub fn suggest(query: &str, candidates: &[String]) -> Option<String> {
    let query_lower = query.to_ascii_lowercase();
    candidates
        .iter()
        .map(|c| {
            let dist = levenshtein(&query_lower, &c.to_ascii_lowercase());
            let max_len = query_lower.chars().count().max(c.chars().count()).max(1);
            let similarity = 100 - (100 * dist / max_len);
            (similarity, c)
        })
        .filter(|(similarity, _)| *similarity >= 30)
        .max_by_key(|(similarity, _)| *similarity)
        .map(|(_, c)| c.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> PatternMap {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn exact_key_wins_over_glob_and_wildcard() {
        let m = map(&[("darwin-arm64", "exact"), ("darwin-*", "glob"), ("*", "any")]);
        let platform = Platform::new("darwin", "arm64");
        assert_eq!(resolve_pattern(&m, &platform).unwrap(), "exact");
    }

    #[test]
    fn glob_wins_over_wildcard() {
        let m = map(&[("darwin-*", "glob"), ("*", "any")]);
        let platform = Platform::new("darwin", "arm64");
        assert_eq!(resolve_pattern(&m, &platform).unwrap(), "glob");
    }

    #[test]
    fn comma_list_matches_any_segment() {
        let m = map(&[("darwin-*,windows-*", "unix-or-win")]);
        let platform = Platform::new("windows", "amd64");
        assert_eq!(resolve_pattern(&m, &platform).unwrap(), "unix-or-win");
    }

    #[test]
    fn missing_pattern_lists_available_keys() {
        let m = map(&[("linux-amd64", "x")]);
        let platform = Platform::new("windows", "amd64");
        match resolve_pattern(&m, &platform) {
            Err(Error::PlatformNotSupported { available, .. }) => {
                assert_eq!(available, vec!["linux-amd64".to_string()]);
            }
            other => panic!("expected PlatformNotSupported, got {other:?}"),
        }
    }

    #[test]
    fn platform_filter_round_trip() {
        let platform = Platform::new("linux", "amd64");
        let entries = ["!windows*: a", "b"];
        let out = filter_entries_by_platform(&entries, &platform);
        assert_eq!(out, vec!["a".to_string(), "b".to_string()]);

        let platform = Platform::new("windows", "amd64");
        let out = filter_entries_by_platform(&entries, &platform);
        assert_eq!(out, vec!["b".to_string()]);
    }

    #[test]
    fn filters_out_non_binary_assets() {
        let names = vec![
            "tool_darwin_arm64.tar.gz",
            "tool_darwin_arm64.tar.gz.sha256",
            "checksums.txt",
            "README.md",
            "LICENSE",
            "CHANGELOG.md",
        ];
        let result = filter_assets_by_platform(&names, "darwin", "arm64");
        for n in &result {
            assert!(!n.ends_with(".sha256"));
            assert!(!n.ends_with(".asc"));
            assert!(!n.ends_with(".sig"));
            assert_ne!(*n, "LICENSE");
            assert_ne!(*n, "README.md");
        }
    }

    #[test]
    fn collapses_to_single_asset_via_filter() {
        let names = vec![
            "yq_darwin_arm64.tar.gz",
            "yq_darwin_arm64.tar.gz.sha256",
            "yq_linux_amd64.tar.gz",
        ];
        let result = filter_assets_by_platform(&names, "darwin", "arm64");
        assert_eq!(result, vec!["yq_darwin_arm64.tar.gz"]);
    }

    #[test]
    fn arch_tie_break_prefers_more_specific_alias() {
        let names = vec!["tool-arm64.tar.gz", "tool-aarch64.tar.gz", "tool-arm.tar.gz"];
        let result = filter_assets_by_platform(&names, "linux", "arm64");
        assert_eq!(result, vec!["tool-arm64.tar.gz"]);
    }

    #[test]
    fn fuzzy_suggestion_above_threshold() {
        let candidates = vec!["tool-linux-amd64.tar.gz".to_string(), "tool-darwin-amd64.tar.gz".to_string()];
        let suggestion = suggest("tool-linux-amd64", &candidates);
        assert_eq!(suggestion, Some("tool-linux-amd64.tar.gz".to_string()));
    }
}
