//! `(os, arch)` pair with alias tables (§4.3).

use std::{env, fmt};

/// A concrete host platform.
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Platform {
    pub os: String,
    pub arch: String,
}

impl Platform {
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Platform {
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// Reads the current machine's platform using Rust's `std::env::consts`,
    /// already expressed in the crate's canonical `os`/`arch` vocabulary.
    pub fn current() -> Self {
        let os = match env::consts::OS {
            "macos" => "darwin",
            other => other,
        };
        let arch = match env::consts::ARCH {
            "x86_64" => "amd64",
            "aarch64" => "arm64",
            other => other,
        };
        Platform::new(os, arch)
    }

    /// The `"os-arch"` key form used to index platform-keyed maps.
    pub fn key(&self) -> String {
        format!("{}-{}", self.os, self.arch)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.os, self.arch)
    }
}

/// OS alias families (§4.3).
const OS_ALIASES: &[(&str, &[&str])] = &[
    ("darwin", &["mac", "macos", "osx"]),
    ("windows", &["win", "win32", "win64"]),
    ("linux", &[]),
];

/// Arch alias families, most-specific first for tie-breaking (§4.3).
const ARCH_ALIASES: &[(&str, &[&str])] = &[
    (
        "amd64",
        &[
            "x86_64", "x64", "x86-64", "i386", "i686", "x86", "386", "64bit", "64-bit",
        ],
    ),
    ("arm64", &["aarch64", "arm"]),
    ("arm", &["armv7", "armv7l"]),
];

/// Canonicalizes an OS string to its family name, if recognized.
pub fn canonical_os(s: &str) -> Option<&'static str> {
    let lower = s.to_ascii_lowercase();
    for (canon, aliases) in OS_ALIASES {
        if lower == *canon || aliases.contains(&lower.as_str()) {
            return Some(canon);
        }
    }
    None
}

/// Canonicalizes an arch string to its family name, if recognized.
pub fn canonical_arch(s: &str) -> Option<&'static str> {
    let lower = s.to_ascii_lowercase();
    for (canon, aliases) in ARCH_ALIASES {
        if lower == *canon || aliases.contains(&lower.as_str()) {
            return Some(canon);
        }
    }
    None
}

/// Returns the alias list (including the canonical name itself) for a
/// canonical arch name, ordered most-specific to least-specific, used for
/// the tie-break rule in §4.3's heuristic asset filter.
pub fn arch_alias_priority(canonical: &str) -> Vec<&'static str> {
    for (canon, aliases) in ARCH_ALIASES {
        if *canon == canonical {
            let mut out = vec![*canon];
            out.extend_from_slice(aliases);
            return out;
        }
    }
    vec![]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalizes_arch_aliases() {
        for alias in ["x86_64", "x64", "i386", "64bit"] {
            assert_eq!(canonical_arch(alias), Some("amd64"));
        }
        for alias in ["aarch64", "arm"] {
            assert_eq!(canonical_arch(alias), Some("arm64"));
        }
    }

    #[test]
    fn canonicalizes_os_aliases() {
        for alias in ["mac", "macos", "osx"] {
            assert_eq!(canonical_os(alias), Some("darwin"));
        }
        assert_eq!(canonical_os("linux"), Some("linux"));
    }

    #[test]
    fn platform_key_and_display() {
        let p = Platform::new("darwin", "arm64");
        assert_eq!(p.key(), "darwin-arm64");
        assert_eq!(p.to_string(), "darwin-arm64");
    }
}
