//! Language-toolchain manager: delegates version discovery to an upstream
//! forge manager and installs via an external build command (§4.4.3).

use crate::error::{Error, Result};
use crate::manager::{SourceManager, VerifiedInfo};
use crate::options::{Context, InstallOptions};
use crate::package::PackageDescriptor;
use crate::platform::Platform;
use crate::result::{InstallResult, InstallStatus, Resolution};
use crate::version::Version;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// Delegates `discover-versions` (and the upstream parts of `resolve`) to
/// whichever forge manager tracks this toolchain's releases; `install`
/// shells out to a build command instead of downloading an artifact.
pub struct ToolchainManager {
    upstream: Arc<dyn SourceManager>,
}

impl ToolchainManager {
    pub fn new(upstream: Arc<dyn SourceManager>) -> Self {
        ToolchainManager { upstream }
    }

    fn import_path<'a>(&self, package: &'a PackageDescriptor) -> Result<&'a str> {
        package
            .extra
            .get("import-path")
            .map(String::as_str)
            .ok_or_else(|| Error::Manager {
                package: package.name.clone(),
                message: "toolchain package missing `extra.import-path`".to_string(),
            })
    }

    fn build_command<'a>(&self, package: &'a PackageDescriptor) -> Result<&'a str> {
        package
            .extra
            .get("build-command")
            .map(String::as_str)
            .ok_or_else(|| Error::Manager {
                package: package.name.clone(),
                message: "toolchain package missing `extra.build-command`".to_string(),
            })
    }
}

#[async_trait]
impl SourceManager for ToolchainManager {
    fn name(&self) -> &'static str {
        "toolchain"
    }

    async fn discover_versions(
        &self,
        package: &PackageDescriptor,
        platform: &Platform,
        limit: usize,
        ctx: &Context,
    ) -> Result<Vec<Version>> {
        self.import_path(package)?;
        self.upstream
            .discover_versions(package, platform, limit, ctx)
            .await
    }

    async fn resolve(
        &self,
        package: &PackageDescriptor,
        version: &str,
        platform: &Platform,
        _ctx: &Context,
    ) -> Result<Resolution> {
        self.import_path(package)?;
        // No artifact is downloaded; `install` builds from source instead.
        Ok(Resolution {
            package: package.name.clone(),
            version: version.to_string(),
            platform: platform.clone(),
            download_url: String::new(),
            checksum_url: None,
            checksum: None,
            is_archive: false,
        })
    }

    async fn install(
        &self,
        resolution: &Resolution,
        package: &PackageDescriptor,
        options: &InstallOptions,
        ctx: &Context,
    ) -> Result<InstallResult> {
        let started = Instant::now();
        let import_path = self.import_path(package)?;
        let build_command = self.build_command(package)?;
        let bin_dir = options.bin_dir.as_deref().ok_or_else(|| Error::Manager {
            package: package.name.clone(),
            message: "toolchain install requires `bin-dir`".to_string(),
        })?;

        let mut parts = build_command.split_whitespace();
        let program = parts.next().ok_or_else(|| Error::Manager {
            package: package.name.clone(),
            message: "empty `extra.build-command`".to_string(),
        })?;
        let args: Vec<&str> = parts.collect();

        let mut command = tokio::process::Command::new(program);
        command
            .args(&args)
            .env("TOOLCHAIN_IMPORT_PATH", import_path)
            .env("TOOLCHAIN_VERSION", &resolution.version)
            .env("TOOLCHAIN_INSTALL_DIR", bin_dir);
        for (key, value) in &options.env {
            command.env(key, value);
        }

        let output = tokio::select! {
            result = command.output() => result.map_err(|e| Error::io(e, bin_dir))?,
            _ = ctx.cancellation.cancelled() => {
                return Err(Error::Cancelled { package: package.name.clone() });
            }
        };

        if !output.status.success() {
            return Err(Error::Manager {
                package: package.name.clone(),
                message: format!(
                    "toolchain build command failed: {}",
                    String::from_utf8_lossy(&output.stderr)
                ),
            });
        }

        Ok(InstallResult {
            package: package.name.clone(),
            resolved_version: resolution.version.clone(),
            status: InstallStatus::Installed,
            install_path: Some(std::path::PathBuf::from(bin_dir)),
            duration: started.elapsed(),
            checksum_verified: false,
            error: None,
        })
    }

    async fn get_checksums(
        &self,
        _package: &PackageDescriptor,
        _version: &str,
        _ctx: &Context,
    ) -> Result<HashMap<String, String>> {
        Ok(HashMap::new())
    }

    async fn verify(
        &self,
        binary_path: &std::path::Path,
        package: &PackageDescriptor,
    ) -> Result<VerifiedInfo> {
        crate::acquirer::verify::verify_installed(binary_path, package).await
    }
}
