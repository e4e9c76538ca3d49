//! In-memory file tree: the unit of exchange between pipeline stages.
//!
//! Stages never mutate a tree in place; each returns a new collection so the
//! pipeline composes as pure functions over `Vec<FileEntry>`. The filesystem
//! adapters here are the only place the core touches the disk for input and
//! cleaned-tree output.

#![allow(missing_docs)]

use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use crate::core::errors::{PlhError, Result};

/// How many leading bytes the binary sniffer inspects.
const SNIFF_WINDOW: usize = 8192;

/// One file of the project tree. `path` is tree-relative with `/` separators
/// on every platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub path: String,
    pub content: Vec<u8>,
    pub is_binary: bool,
}

impl FileEntry {
    /// Build an entry, sniffing binary-ness from the content.
    #[must_use]
    pub fn new(path: impl Into<String>, content: Vec<u8>) -> Self {
        let is_binary = is_binary_content(&content);
        Self {
            path: path.into(),
            content,
            is_binary,
        }
    }

    /// Build a text entry from a `&str` (test fixtures, generated artifacts).
    #[must_use]
    pub fn text(path: impl Into<String>, content: &str) -> Self {
        Self {
            path: path.into(),
            content: content.as_bytes().to_vec(),
            is_binary: false,
        }
    }

    /// Content as UTF-8 text. Binary entries and invalid UTF-8 yield `None`.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if self.is_binary {
            return None;
        }
        std::str::from_utf8(&self.content).ok()
    }

    /// Final path component.
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(self.path.as_str())
    }

    /// Lowercased extension without the dot, if any.
    #[must_use]
    pub fn extension(&self) -> Option<String> {
        let name = self.file_name();
        let (stem, ext) = name.rsplit_once('.')?;
        if stem.is_empty() {
            // Dotfiles like `.env` have no extension.
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }
}

/// NUL-probe binary detection over the leading window.
#[must_use]
pub fn is_binary_content(bytes: &[u8]) -> bool {
    let window = &bytes[..bytes.len().min(SNIFF_WINDOW)];
    memchr::memchr(0, window).is_some()
}

/// Load a project tree from disk into the canonical in-memory form.
///
/// Paths are tree-relative, `/`-separated, and the result is sorted by path
/// so every downstream stage starts from a deterministic ordering. `.git`
/// and `node_modules` subtrees are never part of the input contract.
pub fn load_tree(root: &Path) -> Result<Vec<FileEntry>> {
    let meta = fs::metadata(root).map_err(|source| match source.kind() {
        ErrorKind::NotFound => PlhError::InvalidInput {
            path: root.to_path_buf(),
            details: "path does not exist".to_string(),
        },
        _ => PlhError::io(root, source),
    })?;
    if !meta.is_dir() {
        return Err(PlhError::InvalidInput {
            path: root.to_path_buf(),
            details: "path is not a directory".to_string(),
        });
    }

    let mut files = Vec::new();
    collect_files(root, root, &mut files)?;
    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}

fn collect_files(root: &Path, dir: &Path, out: &mut Vec<FileEntry>) -> Result<()> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        // Unreadable subdirectories are skipped, not fatal; only the root
        // itself is load-bearing and was checked by the caller.
        Err(err) if err.kind() == ErrorKind::PermissionDenied => return Ok(()),
        Err(err) => return Err(PlhError::io(dir, err)),
    };

    for entry in entries {
        let entry = entry.map_err(|source| PlhError::io(dir, source))?;
        let path = entry.path();
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_symlink() {
            continue;
        }

        let name = entry.file_name();
        if file_type.is_dir() {
            if name == ".git" || name == "node_modules" {
                continue;
            }
            collect_files(root, &path, out)?;
        } else if file_type.is_file() {
            let content = fs::read(&path).map_err(|source| PlhError::io(&path, source))?;
            let rel = relative_path(root, &path)?;
            out.push(FileEntry::new(rel, content));
        }
    }
    Ok(())
}

fn relative_path(root: &Path, path: &Path) -> Result<String> {
    let rel = path
        .strip_prefix(root)
        .map_err(|_| PlhError::InvalidInput {
            path: path.to_path_buf(),
            details: "entry escapes the tree root".to_string(),
        })?;
    let mut parts = Vec::new();
    for component in rel.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            _ => {
                return Err(PlhError::InvalidInput {
                    path: path.to_path_buf(),
                    details: "entry path contains non-normal components".to_string(),
                });
            }
        }
    }
    Ok(parts.join("/"))
}

/// Write a tree to disk under `root`, creating parent directories as needed.
///
/// Refuses entries whose relative path would escape `root`.
pub fn write_tree(root: &Path, files: &[FileEntry]) -> Result<()> {
    fs::create_dir_all(root).map_err(|source| PlhError::io(root, source))?;
    for file in files {
        let dest = safe_join(root, &file.path)?;
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|source| PlhError::io(parent, source))?;
        }
        fs::write(&dest, &file.content).map_err(|source| PlhError::io(&dest, source))?;
    }
    Ok(())
}

/// Join a tree-relative path onto `root`, rejecting traversal components.
pub fn safe_join(root: &Path, relative: &str) -> Result<PathBuf> {
    let mut dest = root.to_path_buf();
    for part in relative.split('/') {
        if part.is_empty() || part == "." || part == ".." {
            return Err(PlhError::InvalidInput {
                path: PathBuf::from(relative),
                details: "tree-relative path contains traversal components".to_string(),
            });
        }
        dest.push(part);
    }
    Ok(dest)
}
