//! GitLab forge manager: `allReleases` GraphQL query sorted
//! `RELEASED_AT_DESC` (§4.4.1).

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
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const GRAPHQL_ENDPOINT: &str = "https://gitlab.com/api/graphql";

const ALL_RELEASES_QUERY: &str = r#"
query($fullPath: ID!, $first: Int!) {
  project(fullPath: $fullPath) {
    releases(first: $first, sort: RELEASED_AT_DESC) {
      nodes {
        tagName
        releasedAt
        assets {
          links {
            name
            directAssetUrl
          }
        }
      }
    }
  }
}
"#;

#[derive(Serialize)]
struct GraphQlRequest<'a> {
    query: &'a str,
    variables: GraphQlVars<'a>,
}

#[derive(Serialize)]
struct GraphQlVars<'a> {
    #[serde(rename = "fullPath")]
    full_path: &'a str,
    first: i64,
}

#[derive(Deserialize)]
struct GraphQlResponse {
    data: Option<GraphQlData>,
}

#[derive(Deserialize)]
struct GraphQlData {
    project: Option<GraphQlProject>,
}

#[derive(Deserialize)]
struct GraphQlProject {
    releases: GraphQlReleases,
}

#[derive(Deserialize)]
struct GraphQlReleases {
    nodes: Vec<GraphQlRelease>,
}

#[derive(Deserialize)]
struct GraphQlRelease {
    #[serde(rename = "tagName")]
    tag_name: String,
    #[serde(rename = "releasedAt")]
    released_at: Option<String>,
    assets: GraphQlAssets,
}

#[derive(Deserialize)]
struct GraphQlAssets {
    links: Vec<GraphQlLink>,
}

#[derive(Deserialize)]
struct GraphQlLink {
    name: String,
    #[serde(rename = "directAssetUrl")]
    direct_asset_url: String,
}

impl From<GraphQlRelease> for ForgeRelease {
    fn from(r: GraphQlRelease) -> Self {
        ForgeRelease {
            prerelease: false,
            tag: r.tag_name,
            published: r.released_at,
            assets: r
                .assets
                .links
                .into_iter()
                .map(|l| Asset {
                    name: l.name,
                    download_url: l.direct_asset_url,
                })
                .collect(),
        }
    }
}

pub struct GitlabManager;

impl GitlabManager {
    async fn fetch_releases(&self, repo: &str, limit: usize) -> Result<Vec<ForgeRelease>> {
        let first = if limit == 0 { 100 } else { limit.min(100) } as i64;
        let body = GraphQlRequest {
            query: ALL_RELEASES_QUERY,
            variables: GraphQlVars {
                full_path: repo,
                first,
            },
        };

        let req = http::with_auth(
            &reqwest::Url::parse(GRAPHQL_ENDPOINT).expect("static GraphQL endpoint URL"),
            http::CLIENT.post(GRAPHQL_ENDPOINT).json(&body),
        );
        let resp = req.send().await.map_err(|source| Error::Network {
            url: GRAPHQL_ENDPOINT.to_string(),
            source,
        })?;
        if !resp.status().is_success() {
            return Err(Error::HttpStatus {
                url: GRAPHQL_ENDPOINT.to_string(),
                status: resp.status().as_u16(),
            });
        }
        let parsed: GraphQlResponse = resp.json().await.map_err(|source| Error::Network {
            url: GRAPHQL_ENDPOINT.to_string(),
            source,
        })?;

        let releases = parsed
            .data
            .and_then(|d| d.project)
            .map(|p| p.releases.nodes)
            .unwrap_or_default()
            .into_iter()
            .map(ForgeRelease::from)
            .collect();
        Ok(releases)
    }
}

struct GitlabReleaseIterator<'a> {
    manager: &'a GitlabManager,
    repo: &'a str,
    package: &'a PackageDescriptor,
    platform: &'a Platform,
}

#[async_trait]
impl<'a> ReleaseIterator for GitlabReleaseIterator<'a> {
    type Release = ForgeRelease;

    async fn fetch_releases(&self, limit: usize) -> Result<Vec<Self::Release>> {
        self.manager.fetch_releases(self.repo, limit).await
    }

    async fn try_resolve(&self, release: &Self::Release) -> Result<Resolution> {
        forge_common::pick_asset(release, self.package, self.platform).map(|asset| Resolution {
            package: self.package.name.clone(),
            version: release.tag.clone(),
            platform: self.platform.clone(),
            download_url: asset.download_url.clone(),
            checksum_url: None,
            checksum: None,
            is_archive: super::is_archive_name(&asset.name),
        })
    }

    fn tag_of(&self, release: &Self::Release) -> String {
        release.tag.clone()
    }

    fn is_prerelease(&self, release: &Self::Release) -> bool {
        release.prerelease
    }
}

fn repo_of<'a>(package: &'a PackageDescriptor) -> Result<&'a str> {
    package.repo.as_deref().ok_or_else(|| Error::Manager {
        package: package.name.clone(),
        message: "gitlab package missing `repo`".to_string(),
    })
}

#[async_trait]
impl SourceManager for GitlabManager {
    fn name(&self) -> &'static str {
        "gitlab"
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

        match forge_common::pick_asset(release, package, platform) {
            Ok(asset) => Ok(Resolution {
                package: package.name.clone(),
                version: release.tag.clone(),
                platform: platform.clone(),
                download_url: asset.download_url.clone(),
                checksum_url: None,
                checksum: None,
                is_archive: super::is_archive_name(&asset.name),
            }),
            Err(e) if e.is_asset_not_found() && ctx.iterate_versions > 0 => {
                let iter = GitlabReleaseIterator {
                    manager: self,
                    repo,
                    package,
                    platform,
                };
                iteration::iterate(&iter, ctx.iterate_versions as usize, false).await
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
        _package: &PackageDescriptor,
        _version: &str,
        _ctx: &Context,
    ) -> Result<HashMap<String, String>> {
        // GitLab releases don't expose a conventional checksums file path;
        // packages that need this should set `checksum-file` against a
        // direct asset URL resolved through `resolve` instead.
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_graphql_release_into_forge_release() {
        let release = GraphQlRelease {
            tag_name: "v2.1-3".to_string(),
            released_at: Some("2024-01-01T00:00:00Z".to_string()),
            assets: GraphQlAssets {
                links: vec![GraphQlLink {
                    name: "dxvk-gplasync-v2.1-3.tar.gz".to_string(),
                    direct_asset_url: "https://gitlab.com/x/y/-/releases/v2.1-3/downloads/dxvk-gplasync-v2.1-3.tar.gz"
                        .to_string(),
                }],
            },
        };
        let forge_release: ForgeRelease = release.into();
        assert_eq!(forge_release.tag, "v2.1-3");
        assert_eq!(forge_release.assets.len(), 1);
    }
}
