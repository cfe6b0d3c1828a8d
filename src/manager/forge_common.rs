//! Shared helper for the forge-release managers: release-list
//! normalization, target-release lookup, and asset resolution
//! (§4.4.1, §9 "Forge-style logic ... shares an internal helper").

use crate::asset::{self, suggest};
use crate::error::{Error, Result};
use crate::package::PackageDescriptor;
use crate::platform::Platform;
use crate::template::{self, Vars};
use crate::template::version_expr;
use crate::version::{self, Version};

/// A single downloadable artifact attached to a release.
#[derive(Clone, Debug)]
pub struct Asset {
    pub name: String,
    pub download_url: String,
}

/// A forge release, uniform across GitHub REST and GitLab GraphQL shapes.
#[derive(Clone, Debug)]
pub struct ForgeRelease {
    pub tag: String,
    pub published: Option<String>,
    pub prerelease: bool,
    pub assets: Vec<Asset>,
}

/// Filters `releases` to semver-parseable tags, applies the package's
/// `version-expr` if set, and sorts descending (§4.4.1).
pub fn versions_from_releases(
    releases: &[ForgeRelease],
    package: &PackageDescriptor,
) -> Vec<Version> {
    let mut versions: Vec<Version> = releases
        .iter()
        .filter_map(|r| {
            let mut v = Version::new(&r.tag);
            v.published = r.published.clone();
            v.prerelease = r.prerelease || v.prerelease;
            v.semver()?;
            Some(v)
        })
        .collect();

    if let Some(expr) = &package.version_expr {
        versions = version_expr::apply(expr, versions);
    }

    versions.sort_by(|a, b| version::compare(&b.tag, &a.tag));
    versions
}

/// Locates the release matching `version` by tag, `"v"+version`, or
/// normalized equality (§4.4.1 step 1).
pub fn find_release<'a>(releases: &'a [ForgeRelease], version: &str) -> Option<&'a ForgeRelease> {
    let normalized_target = version::normalize(version);
    releases.iter().find(|r| {
        r.tag == version
            || r.tag == format!("v{version}")
            || version::normalize(&r.tag) == normalized_target
    })
}

/// Implements §4.4.1 steps 2-5: render the asset pattern, try an exact
/// name match, then fall back to the heuristic platform filter.
pub fn pick_asset<'a>(
    release: &'a ForgeRelease,
    package: &PackageDescriptor,
    platform: &Platform,
) -> Result<&'a Asset> {
    let rendered_name = render_asset_name(release, package, platform)?;

    if let Some(asset) = release.assets.iter().find(|a| a.name == rendered_name) {
        return Ok(asset);
    }

    let names: Vec<&str> = release.assets.iter().map(|a| a.name.as_str()).collect();
    let filtered = asset::filter_assets_by_platform(&names, &platform.os, &platform.arch);

    if filtered.len() == 1 {
        let chosen = filtered[0];
        return release
            .assets
            .iter()
            .find(|a| a.name == chosen)
            .ok_or_else(|| asset_not_found(package, release, platform, &names, &rendered_name));
    }

    Err(asset_not_found(package, release, platform, &names, &rendered_name))
}

fn render_asset_name(
    release: &ForgeRelease,
    package: &PackageDescriptor,
    platform: &Platform,
) -> Result<String> {
    if package.asset_patterns.is_empty() {
        return Ok(String::new());
    }
    let pattern = asset::resolve_pattern(&package.asset_patterns, platform)
        .map_err(|e| with_package(e, &package.name))?;
    let version = version::normalize(&release.tag);
    let mut vars = Vars::new();
    vars.insert("version", &version);
    vars.insert("tag", &release.tag);
    vars.insert("os", &platform.os);
    vars.insert("arch", &platform.arch);
    template::render_auto(pattern, &vars)
}

fn with_package(err: Error, package: &str) -> Error {
    match err {
        Error::PlatformNotSupported { platform, available, .. } => Error::PlatformNotSupported {
            package: package.to_string(),
            platform,
            available,
        },
        other => other,
    }
}

fn asset_not_found(
    package: &PackageDescriptor,
    release: &ForgeRelease,
    platform: &Platform,
    names: &[&str],
    rendered_name: &str,
) -> Error {
    let available: Vec<String> = names.iter().map(|s| s.to_string()).collect();
    let suggestion = if rendered_name.is_empty() {
        None
    } else {
        suggest(rendered_name, &available)
    };
    Error::AssetNotFound {
        package: package.name.clone(),
        version: release.tag.clone(),
        platform: platform.key(),
        available,
        suggestion,
    }
}
