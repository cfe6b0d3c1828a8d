//! Release-iteration engine: walks back through releases when the newest
//! one lacks a matching asset (§4.6, §9 "Release iteration vs. single
//! attempt").

use crate::error::{Error, Result};
use crate::result::Resolution;
use async_trait::async_trait;

/// A narrow interface decoupling the "walk back through releases" policy
/// from any one forge's release-listing shape.
#[async_trait]
pub trait ReleaseIterator: Send + Sync {
    type Release: Send + Sync;

    /// Fetches up to `limit` releases, newest first.
    async fn fetch_releases(&self, limit: usize) -> Result<Vec<Self::Release>>;

    /// Attempts to resolve a downloadable asset from a single release.
    async fn try_resolve(&self, release: &Self::Release) -> Result<Resolution>;

    /// The tag this release is recorded under, for diagnostics.
    fn tag_of(&self, release: &Self::Release) -> String;

    /// True for prerelease versions, used by the optional
    /// `FilterNonPrereleases` pass.
    fn is_prerelease(&self, release: &Self::Release) -> bool;
}

/// Walks `iter`'s releases, newest first, returning the first successful
/// resolution. Aborts immediately on any non-`AssetNotFound` error. On
/// exhaustion, produces an error whose message names every tried tag
/// (§8 property 7).
pub async fn iterate<I: ReleaseIterator>(
    iter: &I,
    max_iterations: usize,
    filter_non_prereleases: bool,
) -> Result<Resolution> {
    let releases = iter.fetch_releases(max_iterations).await?;
    let mut tried = Vec::new();
    let mut last_err: Option<Error> = None;

    for release in &releases {
        if filter_non_prereleases && iter.is_prerelease(release) {
            continue;
        }
        match iter.try_resolve(release).await {
            Ok(resolution) => return Ok(resolution),
            Err(e) if e.is_asset_not_found() => {
                tried.push(iter.tag_of(release));
                last_err = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(enhanced_error(tried, last_err))
}

fn enhanced_error(tried: Vec<String>, last_err: Option<Error>) -> Error {
    let tried_list = tried.join(", ");
    let cause = last_err
        .map(|e| e.to_string())
        .unwrap_or_else(|| "no releases available".to_string());
    Error::Manager {
        package: String::new(),
        message: format!(
            "no matching asset found after trying {} release(s) [{tried_list}]: {cause}",
            tried.len()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::Platform;
    use std::sync::Mutex;

    struct FakeRelease {
        tag: String,
        has_asset: bool,
        prerelease: bool,
    }

    struct FakeIterator {
        releases: Vec<FakeRelease>,
        attempts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ReleaseIterator for FakeIterator {
        type Release = FakeRelease;

        async fn fetch_releases(&self, limit: usize) -> Result<Vec<Self::Release>> {
            Ok(self
                .releases
                .iter()
                .take(limit)
                .map(|r| FakeRelease {
                    tag: r.tag.clone(),
                    has_asset: r.has_asset,
                    prerelease: r.prerelease,
                })
                .collect())
        }

        async fn try_resolve(&self, release: &Self::Release) -> Result<Resolution> {
            self.attempts.lock().unwrap().push(release.tag.clone());
            if release.has_asset {
                Ok(Resolution {
                    package: "tool".to_string(),
                    version: release.tag.clone(),
                    platform: Platform::new("darwin", "arm64"),
                    download_url: format!("https://example.com/{}/tool", release.tag),
                    checksum_url: None,
                    checksum: None,
                    is_archive: false,
                })
            } else {
                Err(Error::AssetNotFound {
                    package: "tool".to_string(),
                    version: release.tag.clone(),
                    platform: "darwin-arm64".to_string(),
                    available: vec![],
                    suggestion: None,
                })
            }
        }

        fn tag_of(&self, release: &Self::Release) -> String {
            release.tag.clone()
        }

        fn is_prerelease(&self, release: &Self::Release) -> bool {
            release.prerelease
        }
    }

    #[tokio::test]
    async fn walks_back_until_match() {
        let iter = FakeIterator {
            releases: vec![
                FakeRelease { tag: "v2.0.0".to_string(), has_asset: false, prerelease: false },
                FakeRelease { tag: "v1.9.0".to_string(), has_asset: true, prerelease: false },
            ],
            attempts: Mutex::new(Vec::new()),
        };
        let resolution = iterate(&iter, 5, false).await.unwrap();
        assert_eq!(resolution.version, "v1.9.0");
        assert_eq!(*iter.attempts.lock().unwrap(), vec!["v2.0.0", "v1.9.0"]);
    }

    #[tokio::test]
    async fn exhaustion_error_names_every_tried_tag() {
        let iter = FakeIterator {
            releases: vec![
                FakeRelease { tag: "v2.0.0".to_string(), has_asset: false, prerelease: false },
                FakeRelease { tag: "v1.9.0".to_string(), has_asset: false, prerelease: false },
            ],
            attempts: Mutex::new(Vec::new()),
        };
        let err = iterate(&iter, 5, false).await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("v2.0.0"));
        assert!(message.contains("v1.9.0"));
    }

    #[tokio::test]
    async fn filters_prereleases_when_requested() {
        let iter = FakeIterator {
            releases: vec![
                FakeRelease { tag: "v2.0.0-rc1".to_string(), has_asset: true, prerelease: true },
                FakeRelease { tag: "v1.9.0".to_string(), has_asset: true, prerelease: false },
            ],
            attempts: Mutex::new(Vec::new()),
        };
        let resolution = iterate(&iter, 5, true).await.unwrap();
        assert_eq!(resolution.version, "v1.9.0");
    }
}
