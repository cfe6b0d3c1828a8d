//! The §4.7 install state machine: check-existing, download, verify
//! checksum, extract, place, post-process, verify installed version.

pub mod archive;
pub mod postprocess;
pub mod verify;

use crate::checksum;
use crate::error::{Error, Result};
use crate::http;
use crate::options::{Context, InstallOptions};
use crate::package::{Mode, PackageDescriptor};
use crate::result::{InstallResult, InstallStatus, Resolution};
use std::path::{Path, PathBuf};
use std::time::Instant;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// Resolves the final on-disk path `install` places the binary/tree at.
fn target_path(package: &PackageDescriptor, options: &InstallOptions, os: &str) -> Result<PathBuf> {
    let bin_dir = options.bin_dir.as_deref().ok_or_else(|| Error::Manager {
        package: package.name.clone(),
        message: "install requires `bin-dir`".to_string(),
    })?;
    let bin_dir = PathBuf::from(bin_dir);
    match package.mode {
        Mode::Binary => {
            let mut name = package.binary_name().to_string();
            if os == "windows" && !name.ends_with(".exe") {
                name.push_str(".exe");
            }
            Ok(bin_dir.join(name))
        }
        Mode::Directory => Ok(bin_dir.join(&package.name)),
    }
}

/// A scratch directory unique to one install (process-id + random suffix),
/// removed on drop regardless of success or failure (§5, §4.7).
struct Scratch(tempfile::TempDir);

impl Scratch {
    fn new(package: &str) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(&format!("relfetch-{}-{package}-", std::process::id()))
            .tempdir()
            .map_err(|e| Error::io(e, std::env::temp_dir()))?;
        Ok(Scratch(dir))
    }

    fn path(&self) -> &Path {
        self.0.path()
    }
}

/// Executes the §4.7 acquirer pipeline for an already-resolved package.
pub async fn acquire(
    resolution: &Resolution,
    package: &PackageDescriptor,
    options: &InstallOptions,
    ctx: &Context,
) -> Result<InstallResult> {
    let started = Instant::now();
    let target = target_path(package, options, &resolution.platform.os)?;

    // 1. Check existing.
    if !options.force && target.exists() {
        if let Ok(info) = verify::verify_installed(&target, package).await {
            let installed = crate::version::normalize(&info.version);
            let requested = crate::version::normalize(&resolution.version);
            if installed == requested {
                return Ok(InstallResult {
                    package: package.name.clone(),
                    resolved_version: resolution.version.clone(),
                    status: InstallStatus::AlreadyInstalled,
                    install_path: Some(target),
                    duration: started.elapsed(),
                    checksum_verified: false,
                    error: None,
                });
            }
        }
    }

    let scratch = Scratch::new(&package.name)?;
    let pipeline = run_pipeline(resolution, package, options, ctx, &target, scratch.path());
    let result = match options.timeout {
        Some(timeout) => tokio::time::timeout(timeout, pipeline).await.unwrap_or_else(|_| {
            Err(Error::Manager {
                package: package.name.clone(),
                message: format!("install timed out after {timeout:?}"),
            })
        }),
        None => pipeline.await,
    };
    // `scratch` drops here regardless of outcome, removing the temp dir.
    let mut result = result?;
    if options.force && result.status == InstallStatus::Installed {
        result.status = InstallStatus::ForcedInstalled;
    }
    result.duration = started.elapsed();
    Ok(result)
}

async fn run_pipeline(
    resolution: &Resolution,
    package: &PackageDescriptor,
    options: &InstallOptions,
    ctx: &Context,
    target: &Path,
    scratch: &Path,
) -> Result<InstallResult> {
    // 2. Download.
    let data = download(&resolution.download_url, &package.name, ctx).await?;

    // 3. Checksum resolution.
    let checksum_verified = resolve_checksum(&data, resolution, package, options, ctx)?;

    // 4/5. Archive detection + extraction, or raw binary.
    let payload_dir = scratch.join("payload");
    std::fs::create_dir_all(&payload_dir).map_err(|e| Error::io(e, payload_dir.clone()))?;

    let basename = resolution
        .download_url
        .rsplit('/')
        .next()
        .unwrap_or("download")
        .to_string();

    if resolution.is_archive {
        archive::extract(&data, &basename, &payload_dir)?;
    } else {
        let raw_path = payload_dir.join(package.binary_name());
        std::fs::write(&raw_path, &data).map_err(|e| Error::io(e, raw_path.clone()))?;
        set_executable(&raw_path)?;
    }

    // 6. Select payload and place at `target`.
    place(package, &payload_dir, target)?;

    // symlinks (directory mode only).
    if package.mode == Mode::Directory {
        create_symlinks(package, target, options, &resolution.platform)?;
    }

    // 7. Post-process.
    if !package.post_process.is_empty() {
        let install_dir = match package.mode {
            Mode::Directory => target.to_path_buf(),
            Mode::Binary => target.parent().unwrap_or(target).to_path_buf(),
        };
        postprocess::apply(&package.post_process, &install_dir, &resolution.platform)?;
    }

    // 8. Verify installed version.
    let invoke_path = invocation_path(package, target, options);
    let info = verify::verify_installed(&invoke_path, package).await?;
    let installed = crate::version::normalize(&info.version);
    let expected = crate::version::normalize(&resolution.version);
    if installed != expected && !options.force {
        return Err(Error::VerifyMismatch {
            package: package.name.clone(),
            version: resolution.version.clone(),
            expected,
            actual: installed,
        });
    }

    Ok(InstallResult {
        package: package.name.clone(),
        resolved_version: resolution.version.clone(),
        status: InstallStatus::Installed,
        install_path: Some(target.to_path_buf()),
        duration: std::time::Duration::default(),
        checksum_verified,
        error: None,
    })
}

async fn download(url: &str, package: &str, ctx: &Context) -> Result<Vec<u8>> {
    let response = tokio::select! {
        resp = http::get(url) => resp?,
        _ = ctx.cancellation.cancelled() => {
            return Err(Error::Cancelled { package: package.to_string() });
        }
    };
    let bytes = tokio::select! {
        bytes = response.bytes() => bytes.map_err(|source| Error::Network { url: url.to_string(), source })?,
        _ = ctx.cancellation.cancelled() => {
            return Err(Error::Cancelled { package: package.to_string() });
        }
    };
    Ok(bytes.to_vec())
}

/// Verifies `data` against `Resolution.checksum` or the package's
/// `checksum-file` listing, honoring strict mode and `skip-checksum`
/// (§4.7 step 3). Returns whether a checksum was actually verified.
fn resolve_checksum(
    data: &[u8],
    resolution: &Resolution,
    package: &PackageDescriptor,
    options: &InstallOptions,
    ctx: &Context,
) -> Result<bool> {
    if let Some(expected) = &resolution.checksum {
        match checksum::verify(
            package.checksum_algorithm(),
            data,
            expected,
            &package.name,
            &resolution.version,
        ) {
            Ok(()) => return Ok(true),
            Err(e) if options.skip_checksum => {
                tracing::warn!(package = %package.name, error = %e, "checksum mismatch, continuing due to skip-checksum");
                return Ok(false);
            }
            Err(e) => return Err(e),
        }
    }

    if package.checksum_file.is_some() {
        if ctx.strict_checksum && !options.skip_checksum {
            return Err(Error::ChecksumUnavailable {
                package: package.name.clone(),
                version: resolution.version.clone(),
            });
        }
        tracing::warn!(package = %package.name, "no checksum available, continuing under non-strict mode");
    }
    Ok(false)
}

fn set_executable(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
            .map_err(|e| Error::io(e, path.to_path_buf()))?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}

/// Finds the right file/tree inside `payload_dir` and moves it to `target`,
/// per the `mode = binary` / `mode = directory` rules in §4.7 step 6.
fn place(package: &PackageDescriptor, payload_dir: &Path, target: &Path) -> Result<()> {
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent).map_err(|e| Error::io(e, parent.to_path_buf()))?;
    }

    match package.mode {
        Mode::Directory => {
            if target.exists() {
                std::fs::remove_dir_all(target).map_err(|e| Error::io(e, target.to_path_buf()))?;
            }
            rename_or_copy(payload_dir, target)
        }
        Mode::Binary => {
            let chosen = find_binary(package, payload_dir)?;
            set_executable(&chosen)?;
            rename_or_copy(&chosen, target)
        }
    }
}

/// Picks which extracted file is the binary to install (§4.7 step 6):
/// by `binary-name` if set, else the sole executable regular file, else a
/// file matching the package name.
fn find_binary(package: &PackageDescriptor, payload_dir: &Path) -> Result<PathBuf> {
    let entries: Vec<PathBuf> = walk_files(payload_dir);

    if let Some(name) = &package.binary_name {
        if let Some(found) = entries.iter().find(|p| file_name_matches(p, name)) {
            return Ok(found.clone());
        }
    }

    let package_name_match = entries
        .iter()
        .find(|p| file_name_matches(p, &package.name));
    if let Some(found) = package_name_match {
        return Ok(found.clone());
    }

    let executables: Vec<&PathBuf> = entries.iter().filter(|p| is_executable(p)).collect();
    if executables.len() == 1 {
        return Ok(executables[0].clone());
    }
    if entries.len() == 1 {
        return Ok(entries[0].clone());
    }

    Err(Error::Manager {
        package: package.name.clone(),
        message: "could not determine which extracted file is the binary".to_string(),
    })
}

fn file_name_matches(path: &Path, name: &str) -> bool {
    let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    file_name == name || file_name == format!("{name}.exe")
}

fn is_executable(path: &Path) -> bool {
    #[cfg(unix)]
    {
        std::fs::metadata(path)
            .map(|m| m.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
    }
    #[cfg(not(unix))]
    {
        path.extension().map(|e| e == "exe").unwrap_or(false)
    }
}

fn walk_files(dir: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    let Ok(entries) = std::fs::read_dir(dir) else {
        return out;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            out.extend(walk_files(&path));
        } else {
            out.push(path);
        }
    }
    out
}

fn rename_or_copy(from: &Path, to: &Path) -> Result<()> {
    match std::fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(_) => {
            if from.is_dir() {
                copy_dir_recursive(from, to)
            } else {
                std::fs::copy(from, to)
                    .map(|_| ())
                    .map_err(|e| Error::io(e, to.to_path_buf()))
            }
        }
    }
}

fn copy_dir_recursive(from: &Path, to: &Path) -> Result<()> {
    std::fs::create_dir_all(to).map_err(|e| Error::io(e, to.to_path_buf()))?;
    for entry in std::fs::read_dir(from)
        .map_err(|e| Error::io(e, from.to_path_buf()))?
        .flatten()
    {
        let src = entry.path();
        let dst = to.join(entry.file_name());
        if src.is_dir() {
            copy_dir_recursive(&src, &dst)?;
        } else {
            std::fs::copy(&src, &dst).map_err(|e| Error::io(e, dst))?;
        }
    }
    Ok(())
}

/// Expands each platform-applicable `symlinks` glob against the installed
/// directory tree and creates `bin-dir/<basename>` pointing at the match,
/// relative to `bin-dir` (§4.7 step 6 `mode = directory`).
fn create_symlinks(
    package: &PackageDescriptor,
    install_dir: &Path,
    options: &InstallOptions,
    platform: &crate::platform::Platform,
) -> Result<()> {
    let bin_dir = install_dir.parent().unwrap_or(install_dir);
    let globs = package
        .symlinks
        .iter()
        .find(|(pattern, _)| pattern_matches(pattern, platform))
        .map(|(_, globs)| globs.clone())
        .unwrap_or_default();

    for glob in globs {
        for file in walk_files(install_dir) {
            let relative = file.strip_prefix(install_dir).unwrap_or(&file);
            if !glob_match(&glob, &relative.to_string_lossy()) {
                continue;
            }
            let basename = file.file_name().and_then(|n| n.to_str()).unwrap_or("");
            if basename.is_empty() {
                continue;
            }
            let link_path = bin_dir.join(basename);
            let _ = std::fs::remove_file(&link_path);
            let link_target = pathdiff(&file, bin_dir);
            symlink(&link_target, &link_path)?;
        }
    }
    let _ = options;
    Ok(())
}

fn pattern_matches(pattern: &str, platform: &crate::platform::Platform) -> bool {
    let key = platform.key();
    pattern
        .split(',')
        .map(str::trim)
        .any(|segment| glob_match(segment, &key))
}

fn glob_match(pattern: &str, text: &str) -> bool {
    fn inner(pattern: &[u8], text: &[u8]) -> bool {
        match (pattern.first(), text.first()) {
            (None, None) => true,
            (Some(b'*'), _) => {
                inner(&pattern[1..], text) || (!text.is_empty() && inner(pattern, &text[1..]))
            }
            (Some(b'?'), Some(_)) => inner(&pattern[1..], &text[1..]),
            (Some(p), Some(t)) if p.to_ascii_lowercase() == t.to_ascii_lowercase() => {
                inner(&pattern[1..], &text[1..])
            }
            _ => false,
        }
    }
    inner(pattern.as_bytes(), text.as_bytes())
}

/// A minimal relative-path diff: both paths are assumed absolute and
/// `base`-relative link targets are all this installer ever needs.
fn pathdiff(target: &Path, base: &Path) -> PathBuf {
    let target_components: Vec<_> = target.components().collect();
    let base_components: Vec<_> = base.components().collect();
    let common = target_components
        .iter()
        .zip(base_components.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut out = PathBuf::new();
    for _ in common..base_components.len() {
        out.push("..");
    }
    for component in &target_components[common..] {
        out.push(component.as_os_str());
    }
    out
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> Result<()> {
    std::os::unix::fs::symlink(target, link).map_err(|e| Error::io(e, link.to_path_buf()))
}

#[cfg(not(unix))]
fn symlink(target: &Path, link: &Path) -> Result<()> {
    std::os::windows::fs::symlink_file(target, link).map_err(|e| Error::io(e, link.to_path_buf()))
}

/// The path to actually invoke for version verification: the `bin-dir`
/// symlink when the package declares both `symlinks` and a
/// `version-command` (§4.8), else the placed target itself.
fn invocation_path(package: &PackageDescriptor, target: &Path, options: &InstallOptions) -> PathBuf {
    if package.mode == Mode::Directory
        && package.version_command.is_some()
        && !package.symlinks.is_empty()
    {
        if let Some(bin_dir) = &options.bin_dir {
            let candidate = PathBuf::from(bin_dir).join(package.binary_name());
            if candidate.exists() {
                return candidate;
            }
        }
    }
    target.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::ManagerKind;
    use std::collections::BTreeMap;

    fn package() -> PackageDescriptor {
        PackageDescriptor {
            name: "tool".to_string(),
            manager_kind: ManagerKind::Github,
            repo: None,
            asset_patterns: BTreeMap::new(),
            url_template: None,
            checksum_file: None,
            checksum_algorithm: "sha256".to_string(),
            version_command: None,
            version_pattern: None,
            version_expr: None,
            mode: Mode::Binary,
            symlinks: BTreeMap::new(),
            post_process: Vec::new(),
            binary_name: None,
            extra: BTreeMap::new(),
        }
    }

    #[test]
    fn target_path_appends_exe_on_windows() {
        let options = InstallOptions {
            bin_dir: Some("/opt/bin".to_string()),
            ..Default::default()
        };
        let path = target_path(&package(), &options, "windows").unwrap();
        assert_eq!(path, PathBuf::from("/opt/bin/tool.exe"));
    }

    #[test]
    fn target_path_directory_mode_uses_package_name() {
        let mut pkg = package();
        pkg.mode = Mode::Directory;
        let options = InstallOptions {
            bin_dir: Some("/opt/bin".to_string()),
            ..Default::default()
        };
        let path = target_path(&pkg, &options, "linux").unwrap();
        assert_eq!(path, PathBuf::from("/opt/bin/tool"));
    }

    #[test]
    fn find_binary_prefers_declared_binary_name() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("tool"), b"x").unwrap();
        std::fs::write(dir.path().join("README.md"), b"x").unwrap();
        let mut pkg = package();
        pkg.binary_name = Some("tool".to_string());
        let found = find_binary(&pkg, dir.path()).unwrap();
        assert_eq!(found.file_name().unwrap(), "tool");
    }

    #[test]
    fn checksum_resolution_requires_checksum_under_strict_mode() {
        let mut pkg = package();
        pkg.checksum_file = Some("checksums.txt".to_string());
        let resolution = Resolution {
            package: pkg.name.clone(),
            version: "1.0.0".to_string(),
            platform: crate::platform::Platform::new("linux", "amd64"),
            download_url: "https://example.com/tool".to_string(),
            checksum_url: None,
            checksum: None,
            is_archive: false,
        };
        let options = InstallOptions::default();
        let ctx = Context::default();
        let result = resolve_checksum(b"data", &resolution, &pkg, &options, &ctx);
        assert!(matches!(result, Err(Error::ChecksumUnavailable { .. })));
    }

    #[test]
    fn checksum_mismatch_is_fatal_unless_skip_checksum() {
        let pkg = package();
        let resolution = Resolution {
            package: pkg.name.clone(),
            version: "1.0.0".to_string(),
            platform: crate::platform::Platform::new("linux", "amd64"),
            download_url: "https://example.com/tool".to_string(),
            checksum_url: None,
            checksum: Some("0000".to_string()),
            is_archive: false,
        };
        let ctx = Context::default();

        let options = InstallOptions::default();
        let result = resolve_checksum(b"data", &resolution, &pkg, &options, &ctx);
        assert!(matches!(result, Err(Error::ChecksumMismatch { .. })));

        let options = InstallOptions {
            skip_checksum: true,
            ..Default::default()
        };
        let result = resolve_checksum(b"data", &resolution, &pkg, &options, &ctx);
        assert_eq!(result.unwrap(), false);
    }
}
