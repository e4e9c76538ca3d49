//! Archiver: streams the output tree into one gzip'd tar rooted under the
//! project name, with a SHA-256 sidecar for integrity checks.
//!
//! On any I/O error the partial archive is deleted, never left truncated;
//! the cleaned tree on disk stays valid and usable either way.

#![allow(missing_docs)]

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;
use sha2::{Digest, Sha256};

use crate::core::errors::{PlhError, Result};

/// Where the archive landed and what it hashes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveInfo {
    pub path: PathBuf,
    pub sha256: String,
    pub size_bytes: u64,
}

/// Archive `root` into `dest`, rooting every entry under `project_name/`.
///
/// Handles zero-byte files and deeply nested paths; writes a
/// `<dest>.sha256` sidecar on success.
pub fn archive_tree(root: &Path, project_name: &str, dest: &Path) -> Result<ArchiveInfo> {
    match write_archive(root, project_name, dest) {
        Ok(()) => {}
        Err(err) => {
            discard_partial(dest);
            return Err(err);
        }
    }

    let sha256 = match compute_sha256_hex(dest) {
        Ok(digest) => digest,
        Err(err) => {
            discard_partial(dest);
            return Err(err);
        }
    };

    let size_bytes = fs::metadata(dest)
        .map_err(|source| PlhError::io(dest, source))?
        .len();

    let sidecar = sidecar_path(dest);
    let dest_name = dest
        .file_name()
        .map_or_else(String::new, |name| name.to_string_lossy().into_owned());
    fs::write(&sidecar, format!("{sha256}  {dest_name}\n"))
        .map_err(|source| PlhError::io(&sidecar, source))?;

    Ok(ArchiveInfo {
        path: dest.to_path_buf(),
        sha256,
        size_bytes,
    })
}

/// `<archive>.sha256` next to the archive.
#[must_use]
pub fn sidecar_path(dest: &Path) -> PathBuf {
    let mut name = dest
        .file_name()
        .map_or_else(String::new, |n| n.to_string_lossy().into_owned());
    name.push_str(".sha256");
    dest.with_file_name(name)
}

fn write_archive(root: &Path, project_name: &str, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|source| PlhError::io(parent, source))?;
    }

    let file = File::create(dest).map_err(|source| PlhError::io(dest, source))?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);

    append_dir(&mut builder, root, Path::new(project_name), root)?;

    let encoder = builder.into_inner().map_err(|source| PlhError::Archive {
        path: dest.to_path_buf(),
        details: source.to_string(),
    })?;
    encoder.finish().map_err(|source| PlhError::Archive {
        path: dest.to_path_buf(),
        details: source.to_string(),
    })?;
    Ok(())
}

fn append_dir(
    builder: &mut tar::Builder<GzEncoder<File>>,
    root: &Path,
    prefix: &Path,
    dir: &Path,
) -> Result<()> {
    let mut entries: Vec<_> = fs::read_dir(dir)
        .map_err(|source| PlhError::io(dir, source))?
        .collect::<std::io::Result<_>>()
        .map_err(|source| PlhError::io(dir, source))?;
    // Deterministic entry ordering regardless of directory iteration order.
    entries.sort_by_key(std::fs::DirEntry::file_name);

    for entry in entries {
        let path = entry.path();
        let rel = path.strip_prefix(root).map_err(|_| PlhError::Archive {
            path: path.clone(),
            details: "entry escapes the output root".to_string(),
        })?;
        let name = prefix.join(rel);
        let file_type = entry
            .file_type()
            .map_err(|source| PlhError::io(&path, source))?;

        if file_type.is_dir() {
            append_dir(builder, root, prefix, &path)?;
        } else if file_type.is_file() {
            builder
                .append_path_with_name(&path, &name)
                .map_err(|source| PlhError::Archive {
                    path: path.clone(),
                    details: source.to_string(),
                })?;
        }
    }
    Ok(())
}

fn compute_sha256_hex(path: &Path) -> Result<String> {
    let mut file = File::open(path).map_err(|source| PlhError::io(path, source))?;
    let mut hasher = Sha256::new();
    let mut buffer = [0_u8; 8 * 1024];

    loop {
        let read = file
            .read(&mut buffer)
            .map_err(|source| PlhError::io(path, source))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    let digest = hasher.finalize();
    Ok(format!("{digest:x}"))
}

fn discard_partial(dest: &Path) {
    let _ = fs::remove_file(dest);
}
