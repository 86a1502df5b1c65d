//! Source fragments: the unit a compressor concatenates.

use crate::error::{PackError, Result};
use crate::utils::path::safe_add_path;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Literal find/replace applied to a file fragment before hashing.
///
/// Only the first occurrence is replaced. A fix with an empty `find` does
/// nothing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Fix {
    pub find: String,
    pub replacement: String,
}

impl Fix {
    pub fn new(find: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self {
            find: find.into(),
            replacement: replacement.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Source {
    Path(PathBuf),
    Content(Arc<str>),
}

#[derive(Debug, Clone)]
pub struct SourceFragment {
    pub source: Source,
    /// Logical name (prefix + file name), unique per compressor.
    pub basename: String,
    pub fixes: Vec<Fix>,
}

impl SourceFragment {
    pub fn from_path(path: &Path, prefix: &str, basename: Option<&str>, fixes: Vec<Fix>) -> Self {
        let name = match basename {
            Some(name) => name.to_string(),
            None => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };
        Self {
            source: Source::Path(path.to_path_buf()),
            basename: safe_add_path(prefix, &name),
            fixes,
        }
    }

    pub fn from_content(content: &str, prefix: &str, basename: &str) -> Self {
        Self {
            source: Source::Content(Arc::from(content)),
            basename: safe_add_path(prefix, basename),
            fixes: Vec::new(),
        }
    }

    /// Fragment text with fixes applied.
    pub fn load(&self) -> Result<String> {
        match &self.source {
            Source::Path(path) => {
                let data = fs::read_to_string(path).map_err(|e| PackError::io(path, e))?;
                Ok(apply_fixes(data, &self.fixes))
            }
            Source::Content(text) => Ok(text.to_string()),
        }
    }
}

pub fn apply_fixes(mut data: String, fixes: &[Fix]) -> String {
    for fix in fixes.iter().filter(|f| !f.find.is_empty()) {
        data = data.replacen(&fix.find, &fix.replacement, 1);
    }
    data
}
