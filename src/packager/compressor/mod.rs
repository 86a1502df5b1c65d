//! Fingerprinting content compressors.
//!
//! A compressor collects ordered source fragments for one output file
//! (`<root>/<file>.js` or `.css`), and on first [`Compressor::compress`]
//! reads, fixes, hashes and minifies them into a single cached output with
//! a merged source map. The handle is cheap to clone; clones share state so
//! route handlers on the worker pool see the same compiled output.
//!
//! ```text
//! add_file / add_content / add_files_in_path
//!        │
//!        ▼
//!   compress() ──► sha1(fragments) + minified output + MapParts
//!        │
//!        ▼
//!   lookup_for_base_url_path(base) ──► Rendered { code, source_map }
//! ```

mod css;
mod js;
mod routes;
mod sourcemap;

pub use css::Css;
pub use js::Js;

use self::sourcemap::{FragmentMap, MapParts};
use super::fragment::{Fix, SourceFragment};
use crate::error::{PackError, Result};
use crate::utils::hash::Fingerprinter;
use crate::utils::path::{safe_add_path, split_file_name, with_trailing_slash};
use crate::utils::walk::{has_extension, walk_files};
use crate::debug;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use rustc_hash::{FxHashMap, FxHashSet};
use std::marker::PhantomData;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

pub type JsCompressor = Compressor<Js>;
pub type CssCompressor = Compressor<Css>;

/// Per-language minification and serving details.
pub trait Dialect: Send + Sync + 'static {
    const KIND: &'static str;
    /// Output extension including the dot.
    const EXTENSION: &'static str;
    const CONTENT_TYPE: &'static str;
    const MAP_CONTENT_TYPE: &'static str;

    fn minify(source: &str, basename: &str, debug: bool) -> Result<Minified>;
}

/// One minified fragment. `map` is `None` when the minifier has no
/// position information to offer.
#[derive(Debug)]
pub struct Minified {
    pub code: String,
    pub map: Option<::sourcemap::SourceMap>,
}

/// Output rendered for one base URL path.
#[derive(Debug, Clone)]
pub struct Rendered {
    pub code: Arc<str>,
    pub source_map: Arc<str>,
}

/// Render cache key. The empty base URL path is kept distinct from any
/// real prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BaseUrlKey {
    Root,
    Path(String),
}

impl BaseUrlKey {
    pub fn new(base_url_path: &str) -> Self {
        if base_url_path.is_empty() {
            Self::Root
        } else {
            Self::Path(base_url_path.to_string())
        }
    }
}

struct Compiled {
    hash: String,
    code: Arc<str>,
    map: MapParts,
    /// Post-fix fragment text keyed by lowercase basename.
    sources: FxHashMap<String, Arc<str>>,
}

struct Inner<L> {
    file_name: String,
    root_url: String,
    debug: bool,
    fragments: RwLock<Vec<SourceFragment>>,
    compiled: Mutex<Option<Arc<Compiled>>>,
    sealed: AtomicBool,
    rendered: DashMap<BaseUrlKey, Arc<Rendered>>,
    compilations: AtomicUsize,
    _dialect: PhantomData<fn() -> L>,
}

pub struct Compressor<L: Dialect> {
    inner: Arc<Inner<L>>,
}

impl<L: Dialect> Clone for Compressor<L> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<L: Dialect> std::fmt::Debug for Compressor<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compressor")
            .field("kind", &L::KIND)
            .field("url", &self.url_path())
            .field("fragments", &self.fragment_count())
            .finish()
    }
}

impl<L: Dialect> Compressor<L> {
    /// Compressor serving its output at `url_path`, e.g.
    /// `/resources/app/js/client.js`.
    pub fn new(url_path: &str, debug: bool) -> Self {
        let (root, file) = split_file_name(url_path);
        Self {
            inner: Arc::new(Inner {
                file_name: file.to_string(),
                root_url: root.to_string(),
                debug,
                fragments: RwLock::new(Vec::new()),
                compiled: Mutex::new(None),
                sealed: AtomicBool::new(false),
                rendered: DashMap::new(),
                compilations: AtomicUsize::new(0),
                _dialect: PhantomData,
            }),
        }
    }

    pub fn file_name(&self) -> &str {
        &self.inner.file_name
    }

    pub fn root_url(&self) -> &str {
        &self.inner.root_url
    }

    /// `<root>/<file>`
    pub fn url_path(&self) -> String {
        safe_add_path(&with_trailing_slash(&self.inner.root_url), &self.inner.file_name)
    }

    /// `<root>/src/`, where original fragments are served.
    pub fn source_url_base(&self) -> String {
        format!("{}src/", with_trailing_slash(&self.inner.root_url))
    }

    /// Output file name with its extension swapped for `.map`.
    pub fn map_file_name(&self) -> String {
        let name = &self.inner.file_name;
        match name.strip_suffix(L::EXTENSION) {
            Some(stem) => format!("{stem}.map"),
            None => format!("{name}.map"),
        }
    }

    pub fn fragment_count(&self) -> usize {
        self.inner.fragments.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragment_count() == 0
    }

    /// Number of real compilations performed.
    pub fn compilations(&self) -> usize {
        self.inner.compilations.load(Ordering::SeqCst)
    }

    pub fn is_compiled(&self) -> bool {
        self.inner.sealed.load(Ordering::SeqCst)
    }

    fn push(&self, fragments: impl IntoIterator<Item = SourceFragment>) -> Result<usize> {
        let mut list = self.inner.fragments.write();
        if self.inner.sealed.load(Ordering::SeqCst) {
            return Err(PackError::Sealed(L::KIND));
        }
        let before = list.len();
        list.extend(fragments);
        Ok(list.len() - before)
    }

    /// Declare a file fragment. `basename` defaults to the file name and is
    /// joined under `prefix`.
    pub fn add_file(
        &self,
        path: &Path,
        prefix: &str,
        fixes: Vec<Fix>,
        basename: Option<&str>,
    ) -> Result<()> {
        self.push([SourceFragment::from_path(path, prefix, basename, fixes)])
            .map(|_| ())
    }

    /// Declare an inline fragment. Empty text is ignored.
    pub fn add_content(&self, text: &str, prefix: &str, basename: &str) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        self.push([SourceFragment::from_content(text, prefix, basename)])
            .map(|_| ())
    }

    /// Declare every file with this dialect's extension under `dir`, in
    /// sorted order. Sub-directories extend the prefix when `recursive`.
    pub fn add_files_in_path(&self, dir: &Path, prefix: &str, recursive: bool) -> Result<()> {
        let ext = L::EXTENSION.trim_start_matches('.');
        let fragments: Vec<_> = walk_files(dir, recursive)?
            .into_iter()
            .filter(|f| has_extension(&f.name, ext))
            .map(|f| {
                let prefix = safe_add_path(prefix, &f.dir);
                SourceFragment::from_path(&f.path, &prefix, Some(&f.name), Vec::new())
            })
            .collect();
        let added = self.push(fragments)?;
        debug!("package"; "{} {} files from {}", added, L::KIND, dir.display());
        Ok(())
    }

    /// Append another compressor's declarations. Returns whether anything
    /// was added.
    pub fn add_fragments_from(&self, other: &Compressor<L>) -> Result<bool> {
        let theirs = other.inner.fragments.read().clone();
        if theirs.is_empty() {
            return Ok(false);
        }
        self.push(theirs).map(|n| n > 0)
    }

    /// Compile once and return the content hash, or `None` when there is
    /// nothing to compile.
    ///
    /// Concurrent callers block on the same compilation and share its
    /// result.
    pub fn compress(&self) -> Result<Option<String>> {
        let mut state = self.inner.compiled.lock();
        if let Some(compiled) = state.as_ref() {
            return Ok(Some(compiled.hash.clone()));
        }

        let fragments = self.inner.fragments.read();
        if fragments.is_empty() {
            return Ok(None);
        }

        let compiled = compile::<L>(&fragments, &self.inner.file_name, self.inner.debug)?;
        self.inner.compilations.fetch_add(1, Ordering::SeqCst);
        self.inner.sealed.store(true, Ordering::SeqCst);
        debug!("package"; "compressed {} {} fragments into {}", fragments.len(), L::KIND, self.url_path());

        let hash = compiled.hash.clone();
        *state = Some(Arc::new(compiled));
        Ok(Some(hash))
    }

    /// Content hash of the compiled output.
    pub fn hash(&self) -> Option<String> {
        self.compiled().map(|c| c.hash.clone())
    }

    fn compiled(&self) -> Option<Arc<Compiled>> {
        self.inner.compiled.lock().clone()
    }

    /// Post-fix text of a compiled fragment (case-insensitive basename).
    pub fn source(&self, basename: &str) -> Option<Arc<str>> {
        self.compiled()?
            .sources
            .get(&basename.to_lowercase())
            .cloned()
    }

    /// Output and source map for clients under `base_url_path`. Rendered
    /// once per base URL path and kept for the life of the compressor.
    pub fn lookup_for_base_url_path(&self, base_url_path: &str) -> Result<Option<Arc<Rendered>>> {
        let Some(compiled) = self.compiled() else {
            return Ok(None);
        };
        let key = BaseUrlKey::new(base_url_path);
        if let Some(rendered) = self.inner.rendered.get(&key) {
            return Ok(Some(Arc::clone(rendered.value())));
        }

        let source_root = format!("{}{}", base_url_path, self.source_url_base());
        let rendered = Arc::new(Rendered {
            code: Arc::clone(&compiled.code),
            source_map: Arc::from(compiled.map.render(&source_root)?),
        });
        let entry = self.inner.rendered.entry(key).or_insert(rendered);
        Ok(Some(Arc::clone(entry.value())))
    }
}

fn compile<L: Dialect>(fragments: &[SourceFragment], file_name: &str, debug: bool) -> Result<Compiled> {
    let mut seen = FxHashSet::default();
    for fragment in fragments {
        if !seen.insert(fragment.basename.to_lowercase()) {
            return Err(PackError::DuplicateBasename {
                basename: fragment.basename.clone(),
                kind: L::KIND,
            });
        }
    }

    let mut fingerprint = Fingerprinter::new();
    let mut code = String::new();
    let mut line_offset = 0u32;
    let mut map = MapParts::new(file_name);
    let mut sources = FxHashMap::default();

    for fragment in fragments {
        let text = fragment.load()?;
        fingerprint.update(&text);

        let minified = L::minify(&text, &fragment.basename, debug)?;
        if !code.is_empty() {
            code.push('\n');
            line_offset += 1;
        }
        let lines = minified.code.lines().count() as u32;
        code.push_str(&minified.code);
        map.push(FragmentMap {
            basename: fragment.basename.clone(),
            line_offset,
            lines,
            map: minified.map,
        });
        line_offset += lines.saturating_sub(1);

        sources.insert(fragment.basename.to_lowercase(), Arc::from(text));
    }

    Ok(Compiled {
        hash: fingerprint.finish(),
        code: Arc::from(code),
        map,
        sources,
    })
}
