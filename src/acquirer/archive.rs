//! Archive extraction with path-traversal and symlink-escape rejection
//! (§4.7 step 5, §8 testable property 8).

use crate::error::{Error, Result};
use std::fs;
use std::io::{Cursor, Read};
use std::path::{Component, Path, PathBuf};

fn archive_err(archive: &str, message: impl Into<String>) -> Error {
    Error::Archive {
        archive: archive.to_string(),
        message: message.into(),
    }
}

/// Extracts `data` (the whole downloaded asset) into `dest`, dispatching on
/// `archive_name`'s extension. `dest` must already exist and be empty.
pub fn extract(data: &[u8], archive_name: &str, dest: &Path) -> Result<()> {
    let lower = archive_name.to_ascii_lowercase();
    if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
        let tar_bytes = gunzip(data, archive_name)?;
        extract_tar(&tar_bytes, archive_name, dest)
    } else if lower.ends_with(".tar.xz") {
        let tar_bytes = unxz(data, archive_name)?;
        extract_tar(&tar_bytes, archive_name, dest)
    } else if lower.ends_with(".tar.bz2") {
        let tar_bytes = unbzip2(data, archive_name)?;
        extract_tar(&tar_bytes, archive_name, dest)
    } else if lower.ends_with(".tar") {
        extract_tar(data, archive_name, dest)
    } else if lower.ends_with(".zip") {
        extract_zip(data, archive_name, dest)
    } else {
        Err(archive_err(archive_name, "unrecognized archive extension"))
    }
}

fn gunzip(data: &[u8], archive_name: &str) -> Result<Vec<u8>> {
    let mut decoder = flate2::read::GzDecoder::new(Cursor::new(data));
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| archive_err(archive_name, e.to_string()))?;
    Ok(out)
}

fn unxz(data: &[u8], archive_name: &str) -> Result<Vec<u8>> {
    let mut decoder = xz2::read::XzDecoder::new(Cursor::new(data));
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| archive_err(archive_name, e.to_string()))?;
    Ok(out)
}

fn unbzip2(data: &[u8], archive_name: &str) -> Result<Vec<u8>> {
    let mut decoder = bzip2::read::BzDecoder::new(Cursor::new(data));
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| archive_err(archive_name, e.to_string()))?;
    Ok(out)
}

/// Rejects absolute paths and any `..` component (§8 property 8).
fn validate_entry_path(archive_name: &str, path: &Path) -> Result<()> {
    if path.is_absolute() {
        return Err(archive_err(
            archive_name,
            format!("entry {path:?} has an absolute path"),
        ));
    }
    for component in path.components() {
        match component {
            Component::ParentDir => {
                return Err(archive_err(
                    archive_name,
                    format!("entry {path:?} contains a '..' component"),
                ));
            }
            Component::Prefix(_) | Component::RootDir => {
                return Err(archive_err(
                    archive_name,
                    format!("entry {path:?} has an absolute path"),
                ));
            }
            _ => {}
        }
    }
    Ok(())
}

/// Lexically resolves `link` relative to `entry_path`'s parent directory and
/// rejects any symlink target that would escape the extraction root.
fn validate_symlink_target(archive_name: &str, entry_path: &Path, link: &Path) -> Result<()> {
    if link.is_absolute() {
        return Err(archive_err(
            archive_name,
            format!("symlink {entry_path:?} targets an absolute path"),
        ));
    }
    let base = entry_path.parent().unwrap_or_else(|| Path::new(""));
    let mut resolved = PathBuf::new();
    for component in base.components().chain(link.components()) {
        match component {
            Component::ParentDir => {
                if !resolved.pop() {
                    return Err(archive_err(
                        archive_name,
                        format!("symlink {entry_path:?} escapes the extraction root"),
                    ));
                }
            }
            Component::Normal(seg) => resolved.push(seg),
            Component::RootDir | Component::Prefix(_) => {
                return Err(archive_err(
                    archive_name,
                    format!("symlink {entry_path:?} targets an absolute path"),
                ));
            }
            Component::CurDir => {}
        }
    }
    Ok(())
}

fn extract_tar(tar_bytes: &[u8], archive_name: &str, dest: &Path) -> Result<()> {
    // Pass 1: validate every entry before writing anything, so a malicious
    // archive fails clean rather than partially extracting.
    {
        let mut archive = tar::Archive::new(Cursor::new(tar_bytes));
        let entries = archive
            .entries()
            .map_err(|e| archive_err(archive_name, e.to_string()))?;
        for entry in entries {
            let entry = entry.map_err(|e| archive_err(archive_name, e.to_string()))?;
            let path = entry
                .path()
                .map_err(|e| archive_err(archive_name, e.to_string()))?
                .into_owned();
            validate_entry_path(archive_name, &path)?;
            if entry.header().entry_type().is_symlink() || entry.header().entry_type().is_hard_link()
            {
                if let Some(link) = entry
                    .link_name()
                    .map_err(|e| archive_err(archive_name, e.to_string()))?
                {
                    validate_symlink_target(archive_name, &path, &link)?;
                }
            }
        }
    }

    let mut archive = tar::Archive::new(Cursor::new(tar_bytes));
    archive.set_preserve_permissions(true);
    let entries = archive
        .entries()
        .map_err(|e| archive_err(archive_name, e.to_string()))?;
    for entry in entries {
        let mut entry = entry.map_err(|e| archive_err(archive_name, e.to_string()))?;
        let path = entry
            .path()
            .map_err(|e| archive_err(archive_name, e.to_string()))?
            .into_owned();
        let out_path = dest.join(&path);
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(e, parent))?;
        }
        entry
            .unpack(&out_path)
            .map_err(|e| archive_err(archive_name, e.to_string()))?;
    }
    Ok(())
}

fn extract_zip(data: &[u8], archive_name: &str, dest: &Path) -> Result<()> {
    let mut zip = zip::ZipArchive::new(Cursor::new(data))
        .map_err(|e| archive_err(archive_name, e.to_string()))?;

    let mut validated = Vec::with_capacity(zip.len());
    for i in 0..zip.len() {
        let entry = zip
            .by_index(i)
            .map_err(|e| archive_err(archive_name, e.to_string()))?;
        let name = entry.name().to_string();
        match entry.enclosed_name() {
            Some(path) => {
                validate_entry_path(archive_name, path)?;
                validated.push(Some(path.to_path_buf()));
            }
            None => {
                return Err(archive_err(
                    archive_name,
                    format!("entry {name:?} has an unsafe path"),
                ));
            }
        }
    }

    for (i, path) in validated.into_iter().enumerate() {
        let Some(path) = path else { continue };
        let mut entry = zip
            .by_index(i)
            .map_err(|e| archive_err(archive_name, e.to_string()))?;
        let out_path = dest.join(&path);
        if entry.is_dir() {
            fs::create_dir_all(&out_path).map_err(|e| Error::io(e, out_path))?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(e, parent))?;
        }
        let mut out_file = fs::File::create(&out_path).map_err(|e| Error::io(e, out_path.clone()))?;
        std::io::copy(&mut entry, &mut out_file).map_err(|e| Error::io(e, out_path.clone()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                fs::set_permissions(&out_path, fs::Permissions::from_mode(mode))
                    .map_err(|e| Error::io(e, out_path.clone()))?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn build_tar(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (name, data) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, *data).unwrap();
        }
        builder.into_inner().unwrap()
    }

    #[test]
    fn extracts_flat_tar() {
        let tar_bytes = build_tar(&[("tool", b"binary-bytes")]);
        let dest = tempfile::tempdir().unwrap();
        extract_tar(&tar_bytes, "tool.tar", dest.path()).unwrap();
        let content = std::fs::read(dest.path().join("tool")).unwrap();
        assert_eq!(content, b"binary-bytes");
    }

    #[test]
    fn rejects_parent_dir_traversal_without_writing() {
        let tar_bytes = build_tar(&[("../evil", b"pwned")]);
        let dest = tempfile::tempdir().unwrap();
        let result = extract_tar(&tar_bytes, "evil.tar", dest.path());
        assert!(matches!(result, Err(Error::Archive { .. })));
        assert!(!dest.path().parent().unwrap().join("evil").exists());
    }

    #[test]
    fn rejects_absolute_path_entry() {
        let tar_bytes = build_tar(&[("/etc/passwd", b"pwned")]);
        let dest = tempfile::tempdir().unwrap();
        let result = extract_tar(&tar_bytes, "evil.tar", dest.path());
        assert!(matches!(result, Err(Error::Archive { .. })));
    }

    #[test]
    fn gzip_round_trip() {
        let tar_bytes = build_tar(&[("tool", b"hello")]);
        let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(&tar_bytes).unwrap();
        let gz = encoder.finish().unwrap();

        let dest = tempfile::tempdir().unwrap();
        extract(&gz, "tool.tar.gz", dest.path()).unwrap();
        assert_eq!(std::fs::read(dest.path().join("tool")).unwrap(), b"hello");
    }

    #[test]
    fn bzip2_round_trip() {
        let tar_bytes = build_tar(&[("tool", b"hello")]);
        let mut encoder = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
        encoder.write_all(&tar_bytes).unwrap();
        let bz = encoder.finish().unwrap();

        let dest = tempfile::tempdir().unwrap();
        extract(&bz, "tool.tar.bz2", dest.path()).unwrap();
        assert_eq!(std::fs::read(dest.path().join("tool")).unwrap(), b"hello");
    }
}
