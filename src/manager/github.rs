//! GitHub-style forge manager: REST releases listing with `Link`-header
//! pagination (§4.4.1).

use crate::checksum::ChecksumMap;
use crate::error::{Error, Result};
use crate::http;
use crate::iteration::{self, ReleaseIterator};
use crate::manager::forge_common::{self, Asset, ForgeRelease};
use crate::manager::{SourceManager, VerifiedInfo};
use crate::options::{Context, InstallOptions};
use crate::package::PackageDescriptor;
use crate::platform::Platform;
use crate::resolver;
use crate::result::{InstallResult, Resolution};
use crate::version::Version;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Deserialize)]
struct GithubAsset {
    name: String,
    browser_download_url: String,
}

#[derive(Debug, Deserialize)]
struct GithubRelease {
    tag_name: String,
    #[serde(default)]
    prerelease: bool,
    #[serde(default)]
    published_at: Option<String>,
    #[serde(default)]
    assets: Vec<GithubAsset>,
}

impl From<GithubRelease> for ForgeRelease {
    fn from(r: GithubRelease) -> Self {
        ForgeRelease {
            tag: r.tag_name,
            published: r.published_at,
            prerelease: r.prerelease,
            assets: r
                .assets
                .into_iter()
                .map(|a| Asset {
                    name: a.name,
                    download_url: a.browser_download_url,
                })
                .collect(),
        }
    }
}

pub struct GithubManager;

impl GithubManager {
    /// Fetches up to `limit` releases (0 = unbounded), following `Link:
    /// rel="next"` pagination pages of 100.
    async fn fetch_releases(&self, repo: &str, limit: usize) -> Result<Vec<ForgeRelease>> {
        let mut releases = Vec::new();
        let mut url = format!("https://api.github.com/repos/{repo}/releases?per_page=100");

        loop {
            let resp = http::get(&url).await?;
            let next = http::next_page_link(&resp);
            let page: Vec<GithubRelease> = resp.json().await.map_err(|source| Error::Network {
                url: url.clone(),
                source,
            })?;
            releases.extend(page.into_iter().map(ForgeRelease::from));

            if limit != 0 && releases.len() >= limit {
                releases.truncate(limit);
                break;
            }
            match next {
                Some(next_url) => url = next_url,
                None => break,
            }
        }

        Ok(releases)
    }
}

struct GithubReleaseIterator<'a> {
    manager: &'a GithubManager,
    repo: &'a str,
    package: &'a PackageDescriptor,
    platform: &'a Platform,
}

#[async_trait]
impl<'a> ReleaseIterator for GithubReleaseIterator<'a> {
    type Release = ForgeRelease;

    async fn fetch_releases(&self, limit: usize) -> Result<Vec<Self::Release>> {
        self.manager.fetch_releases(self.repo, limit).await
    }

    async fn try_resolve(&self, release: &Self::Release) -> Result<Resolution> {
        resolve_from_release(release, self.package, self.platform)
    }

    fn tag_of(&self, release: &Self::Release) -> String {
        release.tag.clone()
    }

    fn is_prerelease(&self, release: &Self::Release) -> bool {
        release.prerelease
    }
}

fn resolve_from_release(
    release: &ForgeRelease,
    package: &PackageDescriptor,
    platform: &Platform,
) -> Result<Resolution> {
    let asset = forge_common::pick_asset(release, package, platform)?;
    Ok(Resolution {
        package: package.name.clone(),
        version: release.tag.clone(),
        platform: platform.clone(),
        download_url: asset.download_url.clone(),
        checksum_url: None,
        checksum: None,
        is_archive: super::is_archive_name(&asset.name),
    })
}

fn repo_of<'a>(package: &'a PackageDescriptor) -> Result<&'a str> {
    package.repo.as_deref().ok_or_else(|| Error::Manager {
        package: package.name.clone(),
        message: "github package missing `repo`".to_string(),
    })
}

#[async_trait]
impl SourceManager for GithubManager {
    fn name(&self) -> &'static str {
        "github"
    }

    async fn discover_versions(
        &self,
        package: &PackageDescriptor,
        _platform: &Platform,
        limit: usize,
        _ctx: &Context,
    ) -> Result<Vec<Version>> {
        let repo = repo_of(package)?;
        let releases = self.fetch_releases(repo, limit).await?;
        Ok(forge_common::versions_from_releases(&releases, package))
    }

    async fn resolve(
        &self,
        package: &PackageDescriptor,
        version: &str,
        platform: &Platform,
        ctx: &Context,
    ) -> Result<Resolution> {
        let repo = repo_of(package)?;

        let resolved = resolver::resolve(version, &package.name, |limit| async move {
            let releases = self.fetch_releases(repo, limit).await?;
            Ok(forge_common::versions_from_releases(&releases, package))
        })
        .await?;

        let releases = self.fetch_releases(repo, 0).await?;
        let release = forge_common::find_release(&releases, &resolved.tag).ok_or_else(|| {
            Error::VersionNotFound {
                package: package.name.clone(),
                requested: version.to_string(),
                candidates: vec![],
                suggestion: None,
            }
        })?;

        match resolve_from_release(release, package, platform) {
            Ok(resolution) => attach_checksum(resolution, package, ctx).await,
            Err(e) if e.is_asset_not_found() && ctx.iterate_versions > 0 => {
                let iter = GithubReleaseIterator {
                    manager: self,
                    repo,
                    package,
                    platform,
                };
                let resolution = iteration::iterate(&iter, ctx.iterate_versions as usize, false).await?;
                attach_checksum(resolution, package, ctx).await
            }
            Err(e) => Err(e),
        }
    }

    async fn install(
        &self,
        resolution: &Resolution,
        package: &PackageDescriptor,
        options: &InstallOptions,
        ctx: &Context,
    ) -> Result<InstallResult> {
        crate::acquirer::acquire(resolution, package, options, ctx).await
    }

    async fn get_checksums(
        &self,
        package: &PackageDescriptor,
        version: &str,
        _ctx: &Context,
    ) -> Result<HashMap<String, String>> {
        let map = fetch_checksum_map(package, version).await?;
        let tag = version.to_string();
        Ok(map.by_platform(&package.asset_patterns, version, &tag))
    }

    async fn verify(
        &self,
        binary_path: &std::path::Path,
        package: &PackageDescriptor,
    ) -> Result<VerifiedInfo> {
        crate::acquirer::verify::verify_installed(binary_path, package).await
    }
}

async fn attach_checksum(
    mut resolution: Resolution,
    package: &PackageDescriptor,
    _ctx: &Context,
) -> Result<Resolution> {
    if package.checksum_file.is_none() {
        return Ok(resolution);
    }
    let basename = resolution
        .download_url
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string();
    if let Ok(map) = fetch_checksum_map(package, &resolution.version).await {
        resolution.checksum = map.get(&basename).map(str::to_string);
    }
    Ok(resolution)
}

async fn fetch_checksum_map(package: &PackageDescriptor, version: &str) -> Result<ChecksumMap> {
    let Some(template) = &package.checksum_file else {
        return Ok(ChecksumMap::default());
    };
    let repo = repo_of(package)?;
    let url = format!(
        "https://github.com/{repo}/releases/download/{version}/{template}"
    );
    let text = http::get(&url).await?.text().await.map_err(|source| Error::Network {
        url,
        source,
    })?;
    Ok(ChecksumMap::parse(&text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn package() -> PackageDescriptor {
        PackageDescriptor {
            name: "yq".to_string(),
            manager_kind: crate::package::ManagerKind::Github,
            repo: Some("mikefarah/yq".to_string()),
            asset_patterns: [("*".to_string(), "yq_{{.os}}_{{.arch}}.tar.gz".to_string())]
                .into_iter()
                .collect(),
            url_template: None,
            checksum_file: None,
            checksum_algorithm: "sha256".to_string(),
            version_command: None,
            version_pattern: None,
            version_expr: None,
            mode: Default::default(),
            symlinks: BTreeMap::new(),
            post_process: Vec::new(),
            binary_name: None,
            extra: BTreeMap::new(),
        }
    }

    #[test]
    fn resolves_exact_asset_from_release() {
        let release = ForgeRelease {
            tag: "v4.35.1".to_string(),
            published: None,
            prerelease: false,
            assets: vec![Asset {
                name: "yq_darwin_arm64.tar.gz".to_string(),
                download_url: "https://github.com/mikefarah/yq/releases/download/v4.35.1/yq_darwin_arm64.tar.gz"
                    .to_string(),
            }],
        };
        let platform = Platform::new("darwin", "arm64");
        let resolution = resolve_from_release(&release, &package(), &platform).unwrap();
        assert!(resolution.download_url.ends_with("yq_darwin_arm64.tar.gz"));
        assert!(resolution.is_archive);
    }
}
