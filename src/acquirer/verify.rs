//! Version verification on an installed artifact (§4.8).

use crate::error::{Error, Result};
use crate::manager::VerifiedInfo;
use crate::package::{Mode, PackageDescriptor};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

const TIMEOUT: Duration = Duration::from_secs(10);
const SHELL_METACHARS: &[&str] = &["|", ">", "<", "2>", "&&", "||", ";", "`", "$("];
const FALLBACK_COMMANDS: &[&str] = &["--version", "-v", "version", "-version", "--help"];

fn looks_like_shell(command: &str) -> bool {
    SHELL_METACHARS.iter().any(|m| command.contains(m))
}

fn is_shell_wrapped(command: &str) -> bool {
    let t = command.trim_start();
    t.starts_with("bash -c") || t.starts_with("sh -c")
}

/// Re-derives the installed artifact's version by running its version
/// command (custom if declared, else the `--version`/`-v`/… fallback
/// chain), per §4.8's execution rules.
pub async fn verify_installed(
    install_path: &Path,
    package: &PackageDescriptor,
) -> Result<VerifiedInfo> {
    let version = if let Some(command) = &package.version_command {
        let output = run_once(install_path, package, command, false).await?;
        extract_version(&output, package)?
    } else {
        let mut last_err = None;
        let mut found = None;
        for command in FALLBACK_COMMANDS {
            match run_once(install_path, package, command, true).await {
                Ok(output) => {
                    if let Ok(version) = extract_version(&output, package) {
                        found = Some(version);
                        break;
                    }
                }
                Err(e) => last_err = Some(e),
            }
        }
        match found {
            Some(v) => v,
            None => {
                return Err(last_err.unwrap_or_else(|| Error::Manager {
                    package: package.name.clone(),
                    message: "no version-command succeeded".to_string(),
                }))
            }
        }
    };

    Ok(VerifiedInfo {
        version,
        path: install_path.to_path_buf(),
        checksum: None,
    })
}

fn extract_version(output: &str, package: &PackageDescriptor) -> Result<String> {
    let pattern = package.version_pattern.as_deref().unwrap_or("");
    crate::version::extract_from_output(output, pattern).ok_or_else(|| Error::Manager {
        package: package.name.clone(),
        message: "could not extract a version from command output".to_string(),
    })
}

/// Picks the working directory for a non-shell-wrapped invocation: for
/// `mode = directory`, the install directory's single non-hidden child if
/// there is exactly one, else the install directory itself (§4.8).
fn directory_cwd(install_path: &Path, package: &PackageDescriptor) -> Option<PathBuf> {
    if package.mode != Mode::Directory {
        return None;
    }
    let children: Vec<PathBuf> = std::fs::read_dir(install_path)
        .ok()?
        .filter_map(|e| e.ok())
        .filter(|e| !e.file_name().to_string_lossy().starts_with('.'))
        .map(|e| e.path())
        .collect();
    if children.len() == 1 {
        Some(children.into_iter().next().unwrap())
    } else {
        Some(install_path.to_path_buf())
    }
}

async fn run_once(
    install_path: &Path,
    package: &PackageDescriptor,
    command: &str,
    is_fallback: bool,
) -> Result<String> {
    let (program, args, cwd): (PathBuf, Vec<String>, Option<PathBuf>) =
        if is_shell_wrapped(command) {
            let mut parts = command.splitn(3, char::is_whitespace);
            let shell = parts.next().unwrap_or("bash").to_string();
            let _flag = parts.next();
            let script = parts.next().unwrap_or("").to_string();
            (PathBuf::from(shell), vec!["-c".to_string(), script], None)
        } else if looks_like_shell(command) {
            (
                PathBuf::from("bash"),
                vec!["-c".to_string(), command.to_string()],
                None,
            )
        } else if is_fallback {
            // Fallback entries (`--version`, `-v`, …) are bare flags, not
            // "program args" pairs: invoke the installed artifact directly
            // with the whole entry as its argv.
            let args: Vec<String> = command.split_whitespace().map(str::to_string).collect();
            (
                install_path.to_path_buf(),
                args,
                directory_cwd(install_path, package),
            )
        } else {
            let mut tokens = command.split_whitespace();
            let first = tokens.next().unwrap_or("");
            let rest: Vec<String> = tokens.map(str::to_string).collect();
            let has_path_sep = first.contains('/') || first.contains(std::path::MAIN_SEPARATOR);
            let program = if has_path_sep && package.mode == Mode::Directory {
                install_path.join(first)
            } else {
                install_path.to_path_buf()
            };
            (program, rest, directory_cwd(install_path, package))
        };

    let mut cmd = Command::new(&program);
    cmd.args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = &cwd {
        cmd.current_dir(dir);
    }

    let spawn_result = cmd.spawn();
    let child = match spawn_result {
        Ok(child) => child,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && program == PathBuf::from("bash") => {
            let mut fallback = Command::new("sh");
            fallback
                .args(&args)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped());
            fallback.spawn().map_err(|e| Error::io(e, "sh"))?
        }
        Err(e) => return Err(Error::io(e, program)),
    };

    let output = tokio::time::timeout(TIMEOUT, child.wait_with_output())
        .await
        .map_err(|_| Error::Manager {
            package: package.name.clone(),
            message: format!("version-command {command:?} timed out after {TIMEOUT:?}"),
        })?
        .map_err(|e| Error::io(e, program))?;

    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push('\n');
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    Ok(combined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn package() -> PackageDescriptor {
        PackageDescriptor {
            name: "echoer".to_string(),
            manager_kind: crate::package::ManagerKind::Url,
            repo: None,
            asset_patterns: BTreeMap::new(),
            url_template: Some("https://example.com/echoer".to_string()),
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
    async fn extracts_version_from_custom_command_output() {
        let mut pkg = package();
        pkg.version_command = Some("echo tool-v9.9.9".to_string());
        let result = verify_installed(Path::new("/bin/echo"), &pkg).await.unwrap();
        assert_eq!(result.version, "9.9.9");
    }

    #[tokio::test]
    async fn fallback_command_passes_flag_to_installed_binary() {
        // `/bin/echo --version` must echo `--version`, not run with no args.
        let pkg = package();
        let output = run_once(Path::new("/bin/echo"), &pkg, "--version", true)
            .await
            .unwrap();
        assert!(output.contains("--version"));
    }

    #[test]
    fn detects_shell_metacharacters() {
        assert!(looks_like_shell("tool --version | head -1"));
        assert!(!looks_like_shell("tool --version"));
    }
}
