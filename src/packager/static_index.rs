//! Static resources served under a package's static root.
//!
//! Keys are lowercase URL suffixes with a leading `/`, relative to the
//! static root, so `/resources/app/img/Logo.PNG` looks up `/img/logo.png`.

use crate::error::Result;
use crate::http::{Outcome, Response, Router};
use crate::utils::mime;
use crate::utils::path::{with_leading_slash, with_trailing_slash};
use crate::utils::walk::walk_files;
use parking_lot::RwLock;
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CacheOptions {
    /// Seconds, sent as `Cache-Control: public, max-age=<secs>` when set.
    /// Unlike Express `maxAge`, this is not milliseconds.
    pub max_age: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticEntry {
    pub path: PathBuf,
    pub cache: CacheOptions,
}

#[derive(Clone)]
pub struct StaticResourceIndex {
    root_url: String,
    entries: Arc<RwLock<BTreeMap<String, StaticEntry>>>,
}

impl std::fmt::Debug for StaticResourceIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticResourceIndex")
            .field("root_url", &self.root_url)
            .field("entries", &self.len())
            .finish()
    }
}

fn lookup_key(prefix: &str, relative: &str) -> String {
    let prefix = if prefix.is_empty() {
        String::new()
    } else {
        with_trailing_slash(prefix)
    };
    with_leading_slash(&format!("{prefix}{relative}").to_lowercase())
}

impl StaticResourceIndex {
    pub fn new(root_url: &str) -> Self {
        Self {
            root_url: root_url.trim_end_matches('/').to_string(),
            entries: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    pub fn root_url(&self) -> &str {
        &self.root_url
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, key: &str) -> Option<StaticEntry> {
        self.entries.read().get(&key.to_lowercase()).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    /// Index a single file as `<prefix>/<file name>`.
    pub fn add_file(&self, path: &Path, prefix: &str, cache: CacheOptions) {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.entries.write().insert(
            lookup_key(prefix, &name),
            StaticEntry {
                path: path.to_path_buf(),
                cache,
            },
        );
    }

    /// Index files under `dir` by their path relative to `dir`. Only file
    /// names matching `name_filter` are kept when one is given.
    pub fn add_directory(
        &self,
        dir: &Path,
        prefix: &str,
        recursive: bool,
        name_filter: Option<&Regex>,
        cache: CacheOptions,
    ) -> Result<usize> {
        let files = walk_files(dir, recursive)?;
        let mut entries = self.entries.write();
        let mut added = 0;
        for file in files {
            if name_filter.is_some_and(|re| !re.is_match(&file.name)) {
                continue;
            }
            entries.insert(
                lookup_key(prefix, &file.relative()),
                StaticEntry {
                    path: file.path,
                    cache,
                },
            );
            added += 1;
        }
        Ok(added)
    }

    /// Merge entries from `other`; existing keys win. Returns whether
    /// anything was added.
    pub fn add_from(&self, other: &StaticResourceIndex) -> bool {
        if Arc::ptr_eq(&self.entries, &other.entries) {
            return false;
        }
        let theirs = other.entries.read().clone();
        let mut ours = self.entries.write();
        let mut added = false;
        for (key, entry) in theirs {
            if !ours.contains_key(&key) {
                ours.insert(key, entry);
                added = true;
            }
        }
        added
    }

    /// Register one prefix route under the static root. Misses fall
    /// through to later routes.
    pub fn setup_routes(&self, router: &mut Router) {
        let index = self.clone();
        router.get_prefix(&self.root_url, move |_, rest| Ok(index.respond(rest)));
    }

    fn respond(&self, rest: &str) -> Outcome {
        let key = rest.to_lowercase();
        if key.split('/').any(|seg| seg.starts_with('.')) {
            return Outcome::Next;
        }
        let Some(entry) = self.entries.read().get(&key).cloned() else {
            return Outcome::Next;
        };

        let mut response = Response::file(mime::from_path(&entry.path), &entry.path);
        if let Some(secs) = entry.cache.max_age {
            response = response.with_header("Cache-Control", format!("public, max-age={secs}"));
        }
        Outcome::Respond(response)
    }
}
