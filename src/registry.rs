//! Process-wide manager registry and the §6 external-interface facade
//! (§4.4, §9 "Process-wide registry": "a single mutable map initialized by
//! per-manager initializers at startup... writes only occur during
//! initialization; readers take no lock").

use crate::error::{Error, Result};
use crate::manager::github::GithubManager;
use crate::manager::gitlab::GitlabManager;
use crate::manager::toolchain::ToolchainManager;
use crate::manager::url::UrlManager;
use crate::manager::{SourceManager, VerifiedInfo};
use crate::options::{Context, InstallOptions};
use crate::package::{ManagerKind, PackageDescriptor};
use crate::platform::Platform;
use crate::result::{InstallResult, Resolution};
use crate::version::Version;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Maps each [`ManagerKind`] to the [`SourceManager`] that handles it.
/// Built once and never mutated afterward, so lookups need no
/// synchronization (§5 "Manager registry").
pub struct Registry {
    managers: HashMap<ManagerKind, Arc<dyn SourceManager>>,
}

impl Registry {
    /// Builds the standard registry carrying the four §4.4 manager kinds.
    /// The toolchain manager is wired to delegate version discovery to the
    /// GitHub manager (§4.4.3), since toolchains in this corpus are tagged
    /// on a GitHub-style forge even though they build from source.
    pub fn standard() -> Self {
        let github: Arc<dyn SourceManager> = Arc::new(GithubManager);
        let mut managers: HashMap<ManagerKind, Arc<dyn SourceManager>> = HashMap::new();
        managers.insert(ManagerKind::Github, Arc::clone(&github));
        managers.insert(ManagerKind::Gitlab, Arc::new(GitlabManager));
        managers.insert(ManagerKind::Url, Arc::new(UrlManager));
        managers.insert(
            ManagerKind::Toolchain,
            Arc::new(ToolchainManager::new(github)),
        );
        Registry { managers }
    }

    /// Registers or replaces the manager for `kind`. Exposed for tests and
    /// embedders that want a registry with a subset of managers, or a fake
    /// standing in for one; the process-wide [`REGISTRY`] is otherwise
    /// fixed at startup.
    pub fn register(&mut self, kind: ManagerKind, manager: Arc<dyn SourceManager>) {
        self.managers.insert(kind, manager);
    }

    fn lookup(&self, kind: ManagerKind) -> Result<&Arc<dyn SourceManager>> {
        self.managers.get(&kind).ok_or_else(|| Error::ManagerNotFound {
            kind: kind.to_string(),
        })
    }

    /// `DiscoverVersions(package, platform, limit)` (§6).
    pub async fn discover_versions(
        &self,
        package: &PackageDescriptor,
        platform: &Platform,
        limit: usize,
        ctx: &Context,
    ) -> Result<Vec<Version>> {
        self.lookup(package.manager_kind)?
            .discover_versions(package, platform, limit, ctx)
            .await
    }

    /// `Resolve(package, version, platform)` (§6).
    pub async fn resolve(
        &self,
        package: &PackageDescriptor,
        version: &str,
        platform: &Platform,
        ctx: &Context,
    ) -> Result<Resolution> {
        self.lookup(package.manager_kind)?
            .resolve(package, version, platform, ctx)
            .await
    }

    /// `Verify(binary_path, package)` (§6, §4.8).
    pub async fn verify(&self, binary_path: &Path, package: &PackageDescriptor) -> Result<VerifiedInfo> {
        self.lookup(package.manager_kind)?
            .verify(binary_path, package)
            .await
    }

    /// `Install(package, version, options)` (§6): resolves the package on
    /// the effective platform (detected, then overridden by
    /// `options.os`/`options.arch`) and runs the resolved manager's §4.7
    /// acquirer pipeline. A package-declared `version-command` is
    /// overridden by `options.version_command` when set.
    pub async fn install(
        &self,
        package: &PackageDescriptor,
        version: &str,
        options: &InstallOptions,
        ctx: &Context,
    ) -> Result<InstallResult> {
        package
            .validate()
            .map_err(|message| Error::Manager { package: package.name.clone(), message })?;

        let manager = self.lookup(package.manager_kind)?;
        let platform = effective_platform(options);

        let resolution = manager.resolve(package, version, &platform, ctx).await?;

        let mut package = package.clone();
        if let Some(command) = &options.version_command {
            package.version_command = Some(command.clone());
        }

        manager.install(&resolution, &package, options, ctx).await
    }
}

fn effective_platform(options: &InstallOptions) -> Platform {
    let detected = Platform::current();
    Platform::new(
        options.os.clone().unwrap_or(detected.os),
        options.arch.clone().unwrap_or(detected.arch),
    )
}

/// The process-wide registry, initialized lazily on first use and never
/// mutated afterward (§5, §9).
pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::standard);

/// `Install(package, version, options)` — the top-level facade entry point
/// (§6), dispatched through the process-wide [`REGISTRY`].
pub async fn install(
    package: &PackageDescriptor,
    version: &str,
    options: &InstallOptions,
    ctx: &Context,
) -> Result<InstallResult> {
    REGISTRY.install(package, version, options, ctx).await
}

/// `Resolve(package, version, platform)` facade entry point (§6).
pub async fn resolve(
    package: &PackageDescriptor,
    version: &str,
    platform: &Platform,
    ctx: &Context,
) -> Result<Resolution> {
    REGISTRY.resolve(package, version, platform, ctx).await
}

/// `DiscoverVersions(package, platform, limit)` facade entry point (§6).
pub async fn discover_versions(
    package: &PackageDescriptor,
    platform: &Platform,
    limit: usize,
    ctx: &Context,
) -> Result<Vec<Version>> {
    REGISTRY.discover_versions(package, platform, limit, ctx).await
}

/// `Verify(binary_path, package)` facade entry point (§6).
pub async fn verify(binary_path: &Path, package: &PackageDescriptor) -> Result<VerifiedInfo> {
    REGISTRY.verify(binary_path, package).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_registry_carries_all_four_kinds() {
        let registry = Registry::standard();
        assert!(registry.lookup(ManagerKind::Github).is_ok());
        assert!(registry.lookup(ManagerKind::Gitlab).is_ok());
        assert!(registry.lookup(ManagerKind::Url).is_ok());
        assert!(registry.lookup(ManagerKind::Toolchain).is_ok());
    }

    #[test]
    fn effective_platform_prefers_option_overrides() {
        let mut options = InstallOptions::default();
        options.os = Some("windows".to_string());
        options.arch = Some("arm64".to_string());
        let platform = effective_platform(&options);
        assert_eq!(platform.os, "windows");
        assert_eq!(platform.arch, "arm64");
    }
}
