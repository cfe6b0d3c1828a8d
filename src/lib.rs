//! `relfetch_core`: resolution and acquisition pipeline for installing
//! third-party command-line binaries from upstream release artifacts
//! (GitHub, GitLab, generic URLs, language-toolchain builds).
//!
//! The external surface is the facade in [`registry`]: [`registry::install`],
//! [`registry::resolve`], [`registry::discover_versions`], and
//! [`registry::verify`], dispatched through the process-wide
//! [`registry::Registry`] (§5, §6, §9).

pub mod acquirer;
pub mod asset;
pub mod checksum;
pub mod error;
pub mod http;
pub mod iteration;
pub mod manager;
pub mod options;
pub mod package;
pub mod platform;
pub mod registry;
pub mod resolver;
pub mod result;
pub mod template;
pub mod version;

pub use error::{Error, Result};
pub use options::{Context, InstallOptions};
pub use package::{ManagerKind, Mode, PackageDescriptor, PostProcessEntry, PostProcessOp};
pub use platform::Platform;
pub use registry::{discover_versions, install, resolve, verify, Registry, REGISTRY};
pub use result::{InstallResult, InstallStatus, Resolution};
pub use version::Version;
