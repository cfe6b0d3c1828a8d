//! `Resolution` and `InstallResult`: the output types flowing through
//! `DiscoverVersions → Resolve → Install → Verify` (§3).

use crate::platform::Platform;
use std::path::PathBuf;
use std::time::Duration;

/// Produced by `Resolve`, consumed by `Install` (§3).
#[derive(Clone, Debug)]
pub struct Resolution {
    pub package: String,
    pub version: String,
    pub platform: Platform,
    pub download_url: String,
    pub checksum_url: Option<String>,
    pub checksum: Option<String>,
    pub is_archive: bool,
}

/// Terminal status of an `Install` call (§3, §4.7 state machine).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstallStatus {
    Installed,
    AlreadyInstalled,
    ForcedInstalled,
    Skipped,
    Failed,
}

impl InstallStatus {
    fn label(&self) -> &'static str {
        match self {
            InstallStatus::Installed => "installed",
            InstallStatus::AlreadyInstalled => "already-installed",
            InstallStatus::ForcedInstalled => "forced-installed",
            InstallStatus::Skipped => "skipped",
            InstallStatus::Failed => "failed",
        }
    }
}

/// Outcome of an `Install` call (§3, §6).
#[derive(Clone, Debug)]
pub struct InstallResult {
    pub package: String,
    pub resolved_version: String,
    pub status: InstallStatus,
    pub install_path: Option<PathBuf>,
    pub duration: Duration,
    pub checksum_verified: bool,
    pub error: Option<String>,
}

impl InstallResult {
    /// A human-readable one-line summary (§6 "carries a `Pretty()` human
    /// text form").
    pub fn pretty(&self) -> String {
        let mut line = format!(
            "{} {}: {}",
            self.package,
            self.resolved_version,
            self.status.label()
        );
        if let Some(path) = &self.install_path {
            line.push_str(&format!(" -> {}", path.display()));
        }
        if !self.checksum_verified && self.status != InstallStatus::Failed {
            line.push_str(" (checksum unverified)");
        }
        if let Some(err) = &self.error {
            line.push_str(&format!(": {err}"));
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pretty_includes_path_and_status() {
        let result = InstallResult {
            package: "yq".to_string(),
            resolved_version: "4.35.1".to_string(),
            status: InstallStatus::Installed,
            install_path: Some(PathBuf::from("/usr/local/bin/yq")),
            duration: Duration::from_secs(1),
            checksum_verified: true,
            error: None,
        };
        let text = result.pretty();
        assert!(text.contains("yq"));
        assert!(text.contains("installed"));
        assert!(text.contains("/usr/local/bin/yq"));
    }

    #[test]
    fn pretty_flags_unverified_checksum() {
        let result = InstallResult {
            package: "yq".to_string(),
            resolved_version: "4.35.1".to_string(),
            status: InstallStatus::Installed,
            install_path: None,
            duration: Duration::from_secs(1),
            checksum_verified: false,
            error: None,
        };
        assert!(result.pretty().contains("checksum unverified"));
    }
}
