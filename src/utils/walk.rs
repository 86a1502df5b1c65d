//! Directory enumeration for fragment and resource declarations.

use crate::error::{PackError, Result};
use jwalk::WalkDir;
use std::path::{Path, PathBuf};

/// One file found under an enumeration root.
#[derive(Debug, Clone)]
pub struct WalkedFile {
    pub path: PathBuf,
    pub name: String,
    /// Directory relative to the root, `/`-separated with a trailing `/`
    /// (empty for files directly under the root).
    pub dir: String,
}

impl WalkedFile {
    /// Path relative to the enumeration root, `/`-separated.
    pub fn relative(&self) -> String {
        format!("{}{}", self.dir, self.name)
    }
}

/// Enumerate files under `root`, sorted by path.
///
/// Non-recursive walks only return direct children. Hidden files are
/// included.
pub fn walk_files(root: &Path, recursive: bool) -> Result<Vec<WalkedFile>> {
    if !root.is_dir() {
        return Err(PackError::io(
            root,
            std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
        ));
    }

    let mut walker = WalkDir::new(root).sort(true).skip_hidden(false);
    if !recursive {
        walker = walker.max_depth(1);
    }

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|e| {
            PackError::io(root, std::io::Error::other(e.to_string()))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let name = name.to_string();
        let dir = path
            .parent()
            .and_then(|p| p.strip_prefix(root).ok())
            .map(relative_dir)
            .unwrap_or_default();
        files.push(WalkedFile { path, name, dir });
    }
    files.sort_by(|a, b| a.relative().cmp(&b.relative()));
    Ok(files)
}

fn relative_dir(dir: &Path) -> String {
    let mut out = String::new();
    for part in dir.components() {
        out.push_str(&part.as_os_str().to_string_lossy());
        out.push('/');
    }
    out
}

/// Case-insensitive extension check (`ext` without the dot).
pub fn has_extension(name: &str, ext: &str) -> bool {
    name.rsplit_once('.')
        .is_some_and(|(stem, e)| !stem.is_empty() && e.eq_ignore_ascii_case(ext))
}
