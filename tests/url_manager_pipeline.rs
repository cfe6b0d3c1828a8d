//! End-to-end install pipeline against the generic URL manager, backed by
//! a mock HTTP server: templated download, gzip+tar extraction, placement,
//! and installed-version verification, all through the public facade.

use relfetch_core::error::Error;
use relfetch_core::options::{Context, InstallOptions};
use relfetch_core::package::{ManagerKind, Mode, PackageDescriptor};
use relfetch_core::registry::Registry;
use relfetch_core::result::InstallStatus;
use std::collections::BTreeMap;
use std::io::Write;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn build_tarball(script: &str) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    let mut header = tar::Header::new_gnu();
    header.set_size(script.len() as u64);
    header.set_mode(0o755);
    header.set_cksum();
    builder
        .append_data(&mut header, "tool", script.as_bytes())
        .unwrap();
    let tar_bytes = builder.into_inner().unwrap();

    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(&tar_bytes).unwrap();
    encoder.finish().unwrap()
}

fn url_package(url_template: String) -> PackageDescriptor {
    PackageDescriptor {
        name: "tool".to_string(),
        manager_kind: ManagerKind::Url,
        repo: None,
        asset_patterns: BTreeMap::new(),
        url_template: Some(url_template),
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

#[tokio::test]
async fn installs_and_verifies_from_templated_url() {
    let server = MockServer::start().await;
    let archive = build_tarball("#!/bin/sh\necho tool version v1.2.3\n");

    Mock::given(method("GET"))
        .and(path("/tool-linux-amd64.tar.gz"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(archive))
        .expect(1)
        .mount(&server)
        .await;

    let package = url_package(format!(
        "{}/tool-{{{{.os}}}}-{{{{.arch}}}}.tar.gz",
        server.uri()
    ));
    let bin_dir = tempfile::tempdir().unwrap();
    let options = InstallOptions {
        bin_dir: Some(bin_dir.path().to_string_lossy().into_owned()),
        os: Some("linux".to_string()),
        arch: Some("amd64".to_string()),
        ..Default::default()
    };
    let ctx = Context::default();
    let registry = Registry::standard();

    let result = registry
        .install(&package, "1.2.3", &options, &ctx)
        .await
        .unwrap();

    assert_eq!(result.status, InstallStatus::Installed);
    assert_eq!(result.resolved_version, "1.2.3");
    let installed_path = result.install_path.unwrap();
    assert!(installed_path.exists());
    // No checksum-file was declared, so nothing was verified.
    assert!(!result.checksum_verified);

    // Installing again without force hits the already-installed short
    // circuit, so the mock (`expect(1)`) sees only the first download.
    let second = registry
        .install(&package, "1.2.3", &options, &ctx)
        .await
        .unwrap();
    assert_eq!(second.status, InstallStatus::AlreadyInstalled);
}

#[tokio::test]
async fn forced_reinstall_redownloads_and_flips_status() {
    let server = MockServer::start().await;
    let archive = build_tarball("#!/bin/sh\necho tool version v2.0.0\n");

    Mock::given(method("GET"))
        .and(path("/tool-linux-amd64.tar.gz"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(archive))
        .expect(2)
        .mount(&server)
        .await;

    let package = url_package(format!(
        "{}/tool-{{{{.os}}}}-{{{{.arch}}}}.tar.gz",
        server.uri()
    ));
    let bin_dir = tempfile::tempdir().unwrap();
    let options = InstallOptions {
        bin_dir: Some(bin_dir.path().to_string_lossy().into_owned()),
        os: Some("linux".to_string()),
        arch: Some("amd64".to_string()),
        ..Default::default()
    };
    let ctx = Context::default();
    let registry = Registry::standard();

    let first = registry
        .install(&package, "2.0.0", &options, &ctx)
        .await
        .unwrap();
    assert_eq!(first.status, InstallStatus::Installed);

    let forced_options = InstallOptions {
        force: true,
        ..options
    };
    let second = registry
        .install(&package, "2.0.0", &forced_options, &ctx)
        .await
        .unwrap();
    assert_eq!(second.status, InstallStatus::ForcedInstalled);
}

#[tokio::test]
async fn cancellation_aborts_before_any_file_is_placed() {
    let server = MockServer::start().await;
    let archive = build_tarball("#!/bin/sh\necho v1.0.0\n");
    Mock::given(method("GET"))
        .and(path("/tool-linux-amd64.tar.gz"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(archive))
        .mount(&server)
        .await;

    let package = url_package(format!(
        "{}/tool-{{{{.os}}}}-{{{{.arch}}}}.tar.gz",
        server.uri()
    ));
    let bin_dir = tempfile::tempdir().unwrap();
    let options = InstallOptions {
        bin_dir: Some(bin_dir.path().to_string_lossy().into_owned()),
        os: Some("linux".to_string()),
        arch: Some("amd64".to_string()),
        ..Default::default()
    };
    let ctx = Context::default();
    ctx.cancellation.cancel();
    let registry = Registry::standard();

    let err = registry
        .install(&package, "1.0.0", &options, &ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Cancelled { .. }));
    assert!(std::fs::read_dir(bin_dir.path()).unwrap().next().is_none());
}

#[tokio::test]
async fn options_timeout_aborts_a_slow_install() {
    let server = MockServer::start().await;
    let archive = build_tarball("#!/bin/sh\necho v1.0.0\n");
    Mock::given(method("GET"))
        .and(path("/tool-linux-amd64.tar.gz"))
        .respond_with(ResponseTemplate::new(200)
            .set_body_bytes(archive)
            .set_delay(Duration::from_millis(200)))
        .mount(&server)
        .await;

    let package = url_package(format!(
        "{}/tool-{{{{.os}}}}-{{{{.arch}}}}.tar.gz",
        server.uri()
    ));
    let bin_dir = tempfile::tempdir().unwrap();
    let options = InstallOptions {
        bin_dir: Some(bin_dir.path().to_string_lossy().into_owned()),
        os: Some("linux".to_string()),
        arch: Some("amd64".to_string()),
        timeout: Some(Duration::from_millis(20)),
        ..Default::default()
    };
    let ctx = Context::default();
    let registry = Registry::standard();

    let err = registry
        .install(&package, "1.0.0", &options, &ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Manager { .. }));
    assert!(std::fs::read_dir(bin_dir.path()).unwrap().next().is_none());
}
