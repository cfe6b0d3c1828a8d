use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// The error taxonomy of the resolution and acquisition pipeline.
///
/// Each variant carries the package/version/platform context it failed
/// under, rather than a bare string, so callers can match on kind and
/// still report something actionable.
#[derive(Debug, Error)]
pub enum Error {
    #[error("no source manager registered for kind {kind:?}")]
    ManagerNotFound { kind: String },

    #[error("{package}: version {requested:?} not found{}", format_suggestion(suggestion))]
    VersionNotFound {
        package: String,
        requested: String,
        candidates: Vec<String>,
        suggestion: Option<String>,
    },

    #[error("{package}: platform {platform} is not supported (declared: {})", available.join(", "))]
    PlatformNotSupported {
        package: String,
        platform: String,
        available: Vec<String>,
    },

    #[error("{package} {version}: no matching asset for {platform}{}", format_suggestion(suggestion))]
    AssetNotFound {
        package: String,
        version: String,
        platform: String,
        available: Vec<String>,
        suggestion: Option<String>,
    },

    #[error("{package} {version}: checksum mismatch (expected {expected}, got {actual})")]
    ChecksumMismatch {
        package: String,
        version: String,
        expected: String,
        actual: String,
    },

    #[error("{package} {version}: no checksum available under strict mode")]
    ChecksumUnavailable { package: String, version: String },

    #[error("network error talking to {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected HTTP status {status} from {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("archive error extracting {archive}: {message}")]
    Archive { archive: String, message: String },

    #[error("{package} {version}: installed artifact reports version {actual:?}, expected {expected:?}")]
    VerifyMismatch {
        package: String,
        version: String,
        expected: String,
        actual: String,
    },

    #[error("install of {package} cancelled")]
    Cancelled { package: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid template {template:?}: {message}")]
    Template { template: String, message: String },

    #[error("{package}: {message}")]
    Manager { package: String, message: String },
}

impl Error {
    pub fn io(source: std::io::Error, path: impl Into<PathBuf>) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    /// True for errors the release-iteration engine should treat as
    /// "this release doesn't have it, try the next one" rather than
    /// aborting the whole walk-back (§4.6, §7).
    pub fn is_asset_not_found(&self) -> bool {
        matches!(self, Error::AssetNotFound { .. })
    }
}

fn format_suggestion(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(s) => format!(". Did you mean: {s}?"),
        None => String::new(),
    }
}
