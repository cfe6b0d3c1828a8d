//! Checksum-file parsing and digest verification (§4.7 step 3, §6).

use crate::error::{Error, Result};
use sha2::{Digest, Sha256, Sha512};
use std::collections::HashMap;
use std::path::Path;

/// A parsed checksums-listing file: `basename -> hex digest`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChecksumMap(HashMap<String, String>);

impl ChecksumMap {
    /// Parses a checksums-listing file: lines of whitespace-separated
    /// `<hex-digest> [*]<filename>`; blank lines and `#` comments ignored;
    /// filenames are indexed by basename (§6).
    pub fn parse(text: &str) -> Self {
        let mut map = HashMap::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut parts = line.split_whitespace();
            let Some(hex) = parts.next() else { continue };
            let Some(name) = parts.next() else { continue };
            let name = name.trim_start_matches('*');
            let basename = Path::new(name)
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or(name);
            map.insert(basename.to_string(), hex.to_ascii_lowercase());
        }
        ChecksumMap(map)
    }

    /// Looks up the expected digest for an asset by basename.
    pub fn get(&self, asset_basename: &str) -> Option<&str> {
        self.0.get(asset_basename).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Projects this basename-keyed map onto `"os-arch" -> digest` for
    /// every concrete (non-glob) platform key declared in `asset_patterns`,
    /// rendering each pattern against `version`/`tag` to get the expected
    /// basename (§3 "Checksum map", §4.4 `get-checksums`).
    pub fn by_platform(
        &self,
        asset_patterns: &crate::asset::PatternMap,
        version: &str,
        tag: &str,
    ) -> HashMap<String, String> {
        use crate::template::{self, Vars};

        let mut out = HashMap::new();
        for (key, pattern) in asset_patterns {
            let Some((os, arch)) = key.split_once('-') else { continue };
            if key.contains('*') || key.contains(',') {
                continue;
            }
            let mut vars = Vars::new();
            vars.insert("version", version);
            vars.insert("tag", tag);
            vars.insert("os", os);
            vars.insert("arch", arch);
            if let Ok(name) = template::render_auto(pattern, &vars) {
                if let Some(digest) = self.get(&name) {
                    out.insert(key.clone(), digest.to_string());
                }
            }
        }
        out
    }
}

/// Computes the hex digest of `data` under `algorithm` (`sha256` default,
/// `sha512` also supported; §3 package descriptor `checksum-algorithm`).
pub fn digest_hex(algorithm: &str, data: &[u8]) -> Result<String> {
    match algorithm.to_ascii_lowercase().as_str() {
        "sha256" | "" => {
            let mut hasher = Sha256::new();
            hasher.update(data);
            Ok(hex::encode(hasher.finalize()))
        }
        "sha512" => {
            let mut hasher = Sha512::new();
            hasher.update(data);
            Ok(hex::encode(hasher.finalize()))
        }
        other => Err(Error::Manager {
            package: String::new(),
            message: format!("unsupported checksum algorithm {other:?}"),
        }),
    }
}

/// Verifies `data` against `expected_hex`, returning a [`Error::ChecksumMismatch`]
/// on mismatch.
pub fn verify(
    algorithm: &str,
    data: &[u8],
    expected_hex: &str,
    package: &str,
    version: &str,
) -> Result<()> {
    let actual = digest_hex(algorithm, data)?;
    if actual.eq_ignore_ascii_case(expected_hex) {
        Ok(())
    } else {
        Err(Error::ChecksumMismatch {
            package: package.to_string(),
            version: version.to_string(),
            expected: expected_hex.to_string(),
            actual,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_checksum_lines_ignoring_comments_and_star_prefix() {
        let text = "\
# comment
\n\
deadbeef  *yq_darwin_arm64.tar.gz
cafebabe yq_linux_amd64.tar.gz
";
        let map = ChecksumMap::parse(text);
        assert_eq!(map.get("yq_darwin_arm64.tar.gz"), Some("deadbeef"));
        assert_eq!(map.get("yq_linux_amd64.tar.gz"), Some("cafebabe"));
        assert_eq!(map.get("missing"), None);
    }

    #[test]
    fn matches_by_basename() {
        let map = ChecksumMap::parse("abc123 dist/sub/dir/tool.tar.gz\n");
        assert_eq!(map.get("tool.tar.gz"), Some("abc123"));
    }

    #[test]
    fn sha256_digest_matches_known_vector() {
        let digest = digest_hex("sha256", b"").unwrap();
        assert_eq!(
            digest,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn verify_detects_mismatch() {
        let result = verify("sha256", b"data", "0000", "pkg", "1.0.0");
        assert!(matches!(result, Err(Error::ChecksumMismatch { .. })));
    }
}
