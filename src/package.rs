//! The package descriptor data model and its supporting enums (§3).

use crate::asset::PatternMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Which source manager implementation handles a package.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManagerKind {
    Github,
    Gitlab,
    Url,
    Toolchain,
}

impl fmt::Display for ManagerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ManagerKind::Github => "github",
            ManagerKind::Gitlab => "gitlab",
            ManagerKind::Url => "url",
            ManagerKind::Toolchain => "toolchain",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for ManagerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "github" => Ok(ManagerKind::Github),
            "gitlab" => Ok(ManagerKind::Gitlab),
            "url" => Ok(ManagerKind::Url),
            "toolchain" => Ok(ManagerKind::Toolchain),
            other => Err(format!("unknown manager-kind {other:?}")),
        }
    }
}

/// Whether an installed package is a single executable or a directory tree
/// with symlinks pointing into it (§3, §4.7 step 6).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Binary,
    Directory,
}

/// A single `post-process` step (§4.7 step 7).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PostProcessOp {
    /// Removes files matching `glob`, relative to the install directory.
    Rm { glob: String },
    /// Sets Unix permission bits on `path`, relative to the install
    /// directory. A no-op on platforms without POSIX permission bits.
    Chmod { path: String, mode: u32 },
}

/// A platform-scoped post-process entry: `"[[!]pattern:] op(args)"`
/// parses into this plus the owning [`PostProcessOp`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostProcessEntry {
    pub platform_pattern: Option<String>,
    pub negated: bool,
    pub op: PostProcessOp,
}

/// Immutable descriptor for a single installable package (§3).
///
/// Invariant: `asset_patterns` is non-empty OR `url_template` is set.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PackageDescriptor {
    pub name: String,
    pub manager_kind: ManagerKind,
    /// Upstream locator (e.g. `"owner/repo"` for forge kinds); unused for
    /// `url` kind, which instead relies on `url_template` and `extra`.
    pub repo: Option<String>,
    #[serde(default)]
    pub asset_patterns: PatternMap,
    pub url_template: Option<String>,
    pub checksum_file: Option<String>,
    #[serde(default = "default_checksum_algorithm")]
    pub checksum_algorithm: String,
    pub version_command: Option<String>,
    pub version_pattern: Option<String>,
    pub version_expr: Option<String>,
    #[serde(default)]
    pub mode: Mode,
    #[serde(default)]
    pub symlinks: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub post_process: Vec<PostProcessEntry>,
    pub binary_name: Option<String>,
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl PackageDescriptor {
    /// Validates the §3 invariant that a package names at least one way
    /// to produce an asset: a pattern map or a direct URL template.
    pub fn validate(&self) -> Result<(), String> {
        if self.asset_patterns.is_empty() && self.url_template.is_none() {
            return Err(format!(
                "package {:?}: asset-patterns is empty and url-template is unset",
                self.name
            ));
        }
        Ok(())
    }

    /// The executable name to install as, defaulting to the package name.
    pub fn binary_name(&self) -> &str {
        self.binary_name.as_deref().unwrap_or(&self.name)
    }

    /// The checksum algorithm to verify with (§3, default sha256).
    pub fn checksum_algorithm(&self) -> &str {
        &self.checksum_algorithm
    }
}

fn default_checksum_algorithm() -> String {
    "sha256".to_string()
}
