//! Post-processing operations applied after an archive is placed (§4.7
//! step 7): `rm(glob)` and `chmod(path, mode)`, platform-scoped.

use crate::error::{Error, Result};
use crate::package::{PostProcessEntry, PostProcessOp};
use crate::platform::Platform;
use std::path::Path;

fn applies_to_platform(entry: &PostProcessEntry, platform: &Platform) -> bool {
    match &entry.platform_pattern {
        None => true,
        Some(pattern) => {
            let key = platform.key();
            let matches = pattern
                .split(',')
                .map(str::trim)
                .any(|segment| glob_match(segment, &key));
            matches != entry.negated
        }
    }
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

/// Applies every platform-matching entry in `entries`, in order, scoped to
/// `install_dir`.
pub fn apply(entries: &[PostProcessEntry], install_dir: &Path, platform: &Platform) -> Result<()> {
    for entry in entries {
        if !applies_to_platform(entry, platform) {
            continue;
        }
        match &entry.op {
            PostProcessOp::Rm { glob } => rm_glob(install_dir, glob)?,
            PostProcessOp::Chmod { path, mode } => chmod(install_dir, path, *mode)?,
        }
    }
    Ok(())
}

fn rm_glob(install_dir: &Path, pattern: &str) -> Result<()> {
    for entry in walk(install_dir) {
        let Ok(relative) = entry.strip_prefix(install_dir) else {
            continue;
        };
        if glob_match(pattern, &relative.to_string_lossy()) {
            if entry.is_dir() {
                std::fs::remove_dir_all(&entry).map_err(|e| crate::error::Error::io(e, entry))?;
            } else {
                std::fs::remove_file(&entry).map_err(|e| crate::error::Error::io(e, entry))?;
            }
        }
    }
    Ok(())
}

fn chmod(install_dir: &Path, path: &str, mode: u32) -> Result<()> {
    let target = install_dir.join(path);
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&target, std::fs::Permissions::from_mode(mode))
            .map_err(|e| crate::error::Error::io(e, target))?;
        Ok(())
    }
    #[cfg(not(unix))]
    {
        let _ = (target, mode);
        Ok(())
    }
}

fn walk(dir: &Path) -> Vec<std::path::PathBuf> {
    let mut out = Vec::new();
    let Ok(entries) = std::fs::read_dir(dir) else {
        return out;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            out.extend(walk(&path));
        }
        out.push(path);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn rm_removes_matching_files_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::File::create(dir.path().join("keep.txt"))
            .unwrap()
            .write_all(b"x")
            .unwrap();
        std::fs::File::create(dir.path().join("docs.md"))
            .unwrap()
            .write_all(b"x")
            .unwrap();

        let entries = vec![PostProcessEntry {
            platform_pattern: None,
            negated: false,
            op: PostProcessOp::Rm { glob: "*.md".to_string() },
        }];
        let platform = Platform::new("linux", "amd64");
        apply(&entries, dir.path(), &platform).unwrap();

        assert!(dir.path().join("keep.txt").exists());
        assert!(!dir.path().join("docs.md").exists());
    }

    #[test]
    fn platform_scoped_entry_is_skipped_when_not_matching() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::File::create(dir.path().join("docs.md")).unwrap();

        let entries = vec![PostProcessEntry {
            platform_pattern: Some("windows-*".to_string()),
            negated: false,
            op: PostProcessOp::Rm { glob: "*.md".to_string() },
        }];
        let platform = Platform::new("linux", "amd64");
        apply(&entries, dir.path(), &platform).unwrap();

        assert!(dir.path().join("docs.md").exists());
    }
}
