//! Generic URL manager: a templated download URL plus an optional
//! separate version-list endpoint (§4.4.2).

use crate::error::{Error, Result};
use crate::http;
use crate::manager::{SourceManager, VerifiedInfo};
use crate::options::{Context, InstallOptions};
use crate::package::PackageDescriptor;
use crate::platform::Platform;
use crate::result::{InstallResult, Resolution};
use crate::template::{self, Vars};
use crate::version::Version;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Deserialize)]
#[serde(untagged)]
enum VersionEntry {
    Plain(String),
    Detailed {
        version: String,
        tag: Option<String>,
        #[serde(default)]
        prerelease: Option<bool>,
    },
}

const PRERELEASE_MARKERS: &[&str] = &["alpha", "beta", "rc", "pre", "dev", "snapshot"];

fn looks_prerelease(s: &str) -> bool {
    let lower = s.to_ascii_lowercase();
    PRERELEASE_MARKERS.iter().any(|m| lower.contains(m))
}

pub struct UrlManager;

impl UrlManager {
    fn versions_url<'a>(&self, package: &'a PackageDescriptor) -> Result<&'a str> {
        package
            .extra
            .get("versions-url")
            .map(String::as_str)
            .ok_or_else(|| Error::Manager {
                package: package.name.clone(),
                message: "url package missing `extra.versions-url`".to_string(),
            })
    }
}

#[async_trait]
impl SourceManager for UrlManager {
    fn name(&self) -> &'static str {
        "url"
    }

    async fn discover_versions(
        &self,
        package: &PackageDescriptor,
        _platform: &Platform,
        limit: usize,
        _ctx: &Context,
    ) -> Result<Vec<Version>> {
        let versions_url = self.versions_url(package)?;
        let entries: Vec<VersionEntry> = http::get_json(versions_url).await?;

        let mut versions: Vec<Version> = entries
            .into_iter()
            .map(|entry| match entry {
                VersionEntry::Plain(s) => {
                    let mut v = Version::new(&s);
                    v.prerelease = v.prerelease || looks_prerelease(&s);
                    v
                }
                VersionEntry::Detailed { version, tag, prerelease } => {
                    let tag = tag.unwrap_or_else(|| version.clone());
                    let mut v = Version::new(&tag);
                    v.normalized = crate::version::normalize(&version);
                    v.prerelease = prerelease.unwrap_or_else(|| looks_prerelease(&version));
                    v
                }
            })
            .collect();

        versions.sort_by(|a, b| crate::version::compare(&b.tag, &a.tag));
        if limit != 0 {
            versions.truncate(limit);
        }
        Ok(versions)
    }

    async fn resolve(
        &self,
        package: &PackageDescriptor,
        version: &str,
        platform: &Platform,
        _ctx: &Context,
    ) -> Result<Resolution> {
        let url_template = package.url_template.as_deref().ok_or_else(|| Error::Manager {
            package: package.name.clone(),
            message: "url package missing `url-template`".to_string(),
        })?;
        let url_template = template::normalize_url_template(url_template);

        let normalized_version = crate::version::normalize(version);
        let asset_name = if package.asset_patterns.is_empty() {
            String::new()
        } else {
            let pattern = crate::asset::resolve_pattern(&package.asset_patterns, platform)?;
            let mut vars = Vars::new();
            vars.insert("version", &normalized_version);
            vars.insert("tag", version);
            vars.insert("os", &platform.os);
            vars.insert("arch", &platform.arch);
            template::render_auto(pattern, &vars)?
        };

        let mut vars = Vars::new();
        vars.insert("version", &normalized_version);
        vars.insert("tag", version);
        vars.insert("os", &platform.os);
        vars.insert("arch", &platform.arch);
        vars.insert("asset", &asset_name);
        let download_url = template::render_auto(&url_template, &vars)?;

        Ok(Resolution {
            package: package.name.clone(),
            version: version.to_string(),
            platform: platform.clone(),
            download_url: download_url.clone(),
            checksum_url: None,
            checksum: None,
            is_archive: crate::manager::is_archive_name(&download_url),
        })
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
    fn detects_prerelease_by_substring() {
        assert!(looks_prerelease("1.2.0-beta.1"));
        assert!(looks_prerelease("1.2.0-SNAPSHOT"));
        assert!(!looks_prerelease("1.2.0"));
    }
}
