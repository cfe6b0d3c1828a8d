//! The uniform source-manager interface and its four concrete variants
//! (§4.4, §9 "Pluggable managers without inheritance").

pub mod forge_common;
pub mod github;
pub mod gitlab;
pub mod toolchain;
pub mod url;

use crate::error::Result;
use crate::options::{Context, InstallOptions};
use crate::package::PackageDescriptor;
use crate::platform::Platform;
use crate::result::{InstallResult, Resolution};
use crate::version::Version;
use async_trait::async_trait;
use std::collections::HashMap;

/// Decides whether a downloaded asset is an archive to extract or a raw
/// binary to place directly, by file extension (§4.7 step 4).
pub fn is_archive_name(name: &str) -> bool {
    [".tar.gz", ".tgz", ".tar.xz", ".tar.bz2", ".tar", ".zip"]
        .iter()
        .any(|ext| name.ends_with(ext))
}

/// Installed-artifact info returned by `verify` (§4.4).
#[derive(Clone, Debug)]
pub struct VerifiedInfo {
    pub version: String,
    pub path: std::path::PathBuf,
    pub checksum: Option<String>,
}

/// The capability interface every source-manager kind implements, dispatched
/// by string key from the registry rather than through inheritance (§9).
#[async_trait]
pub trait SourceManager: Send + Sync {
    /// A stable identifier for this manager kind, e.g. `"github"`.
    fn name(&self) -> &'static str;

    /// Lists known versions, descending, for `package` on `platform`.
    /// `limit == 0` means unbounded.
    async fn discover_versions(
        &self,
        package: &PackageDescriptor,
        platform: &Platform,
        limit: usize,
        ctx: &Context,
    ) -> Result<Vec<Version>>;

    /// Resolves a concrete version string to a downloadable [`Resolution`].
    async fn resolve(
        &self,
        package: &PackageDescriptor,
        version: &str,
        platform: &Platform,
        ctx: &Context,
    ) -> Result<Resolution>;

    /// Executes the §4.7 acquirer pipeline for an already-resolved package.
    async fn install(
        &self,
        resolution: &Resolution,
        package: &PackageDescriptor,
        options: &InstallOptions,
        ctx: &Context,
    ) -> Result<InstallResult>;

    /// Fetches and parses the package's checksum listing, if any.
    async fn get_checksums(
        &self,
        package: &PackageDescriptor,
        version: &str,
        ctx: &Context,
    ) -> Result<HashMap<String, String>>;

    /// Re-derives installed version/path/checksum info from a binary on disk.
    async fn verify(
        &self,
        binary_path: &std::path::Path,
        package: &PackageDescriptor,
    ) -> Result<VerifiedInfo>;
}
