//! Install options and the cancellation/tunables context (§5, §6).

use std::collections::HashMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Per-call options accepted by `Install` (§6).
#[derive(Clone, Debug, Default)]
pub struct InstallOptions {
    pub bin_dir: Option<String>,
    pub force: bool,
    pub skip_checksum: bool,
    pub os: Option<String>,
    pub arch: Option<String>,
    pub version_command: Option<String>,
    pub timeout: Option<Duration>,
    pub env: HashMap<String, String>,
}

/// Typed context threaded through every I/O call: cancellation plus the
/// §5 context-carried tunables (`strict-checksum`, `iterate-versions`).
#[derive(Clone)]
pub struct Context {
    pub cancellation: CancellationToken,
    pub strict_checksum: bool,
    pub iterate_versions: u32,
}

impl Default for Context {
    fn default() -> Self {
        Context {
            cancellation: CancellationToken::new(),
            strict_checksum: true,
            iterate_versions: 0,
        }
    }
}

impl Context {
    pub fn with_iterate_versions(mut self, n: u32) -> Self {
        self.iterate_versions = n;
        self
    }

    pub fn with_strict_checksum(mut self, strict: bool) -> Self {
        self.strict_checksum = strict;
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}
