//! Asset packages: one optional JS output, one optional CSS output and one
//! optional static root, plus the bundle references clients must load
//! alongside them.

use super::compressor::{CssCompressor, JsCompressor};
use super::fragment::Fix;
use super::static_index::{CacheOptions, StaticResourceIndex};
use crate::error::{PackError, Result};
use crate::http::Router;
use regex::Regex;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug)]
pub struct AssetPackage {
    js_path: Option<String>,
    js: Option<JsCompressor>,
    css_path: Option<String>,
    css: Option<CssCompressor>,
    static_path: Option<String>,
    statics: Option<StaticResourceIndex>,

    has_js: bool,
    has_css: bool,
    has_static_resources: bool,
    references: Vec<String>,
    compressed: AtomicBool,
}

impl AssetPackage {
    pub fn new(
        js_path: Option<&str>,
        css_path: Option<&str>,
        static_path: Option<&str>,
        debug: bool,
    ) -> Self {
        Self {
            js_path: js_path.map(str::to_string),
            js: js_path.map(|p| JsCompressor::new(p, debug)),
            css_path: css_path.map(str::to_string),
            css: css_path.map(|p| CssCompressor::new(p, debug)),
            static_path: static_path.map(str::to_string),
            statics: static_path.map(StaticResourceIndex::new),
            has_js: false,
            has_css: false,
            has_static_resources: false,
            references: Vec::new(),
            compressed: AtomicBool::new(false),
        }
    }

    fn js_mut(&mut self, what: &'static str) -> Result<&JsCompressor> {
        let Some(js) = self.js.as_ref() else {
            return Err(PackError::MissingCompressor { kind: what });
        };
        self.has_js = true;
        Ok(js)
    }

    fn css_mut(&mut self, what: &'static str) -> Result<&CssCompressor> {
        let Some(css) = self.css.as_ref() else {
            return Err(PackError::MissingCompressor { kind: what });
        };
        self.has_css = true;
        Ok(css)
    }

    // JavaScript

    pub fn add_js_file(
        &mut self,
        path: &Path,
        prefix: &str,
        fixes: Vec<Fix>,
        basename: Option<&str>,
    ) -> Result<()> {
        self.js_mut("js file")?.add_file(path, prefix, fixes, basename)
    }

    pub fn add_js_directory(&mut self, dir: &Path, prefix: &str, recursive: bool) -> Result<()> {
        self.js_mut("js directory")?
            .add_files_in_path(dir, prefix, recursive)
    }

    /// Inline script. Empty content adds nothing and leaves `has_js` alone.
    pub fn add_javascript(&mut self, content: &str, prefix: &str, basename: &str) -> Result<()> {
        if content.is_empty() {
            return Ok(());
        }
        self.js_mut("javascript")?.add_content(content, prefix, basename)
    }

    // CSS

    pub fn add_css_file(
        &mut self,
        path: &Path,
        prefix: &str,
        fixes: Vec<Fix>,
        basename: Option<&str>,
    ) -> Result<()> {
        self.css_mut("css file")?.add_file(path, prefix, fixes, basename)
    }

    pub fn add_css_directory(&mut self, dir: &Path, prefix: &str, recursive: bool) -> Result<()> {
        self.css_mut("css directory")?
            .add_files_in_path(dir, prefix, recursive)
    }

    pub fn add_css(&mut self, content: &str, prefix: &str, basename: &str) -> Result<()> {
        if content.is_empty() {
            return Ok(());
        }
        self.css_mut("css")?.add_content(content, prefix, basename)
    }

    // Static resources

    pub fn add_static_resources(
        &mut self,
        dir: &Path,
        prefix: &str,
        recursive: bool,
        name_filter: Option<&Regex>,
        cache: CacheOptions,
    ) -> Result<()> {
        let Some(statics) = self.statics.as_ref() else {
            return Err(PackError::MissingCompressor {
                kind: "static resources",
            });
        };
        self.has_static_resources = true;
        statics.add_directory(dir, prefix, recursive, name_filter, cache)?;
        Ok(())
    }

    // Bundle references

    /// Append references not already present, keeping first-seen order.
    pub fn add_bundle_references<S: AsRef<str>>(&mut self, references: &[S]) {
        for reference in references {
            let reference = reference.as_ref();
            if !self.references.iter().any(|r| r == reference) {
                self.references.push(reference.to_string());
            }
        }
    }

    pub fn bundle_references(&self) -> &[String] {
        &self.references
    }

    /// Pull in every declaration of `other` this package has room for.
    pub fn add_package(&mut self, other: &AssetPackage) -> Result<()> {
        if let (Some(ours), Some(theirs)) = (&self.js, &other.js)
            && ours.add_fragments_from(theirs)?
        {
            self.has_js = true;
        }
        if let (Some(ours), Some(theirs)) = (&self.css, &other.css)
            && ours.add_fragments_from(theirs)?
        {
            self.has_css = true;
        }
        if let (Some(ours), Some(theirs)) = (&self.statics, &other.statics)
            && ours.add_from(theirs)
        {
            self.has_static_resources = true;
        }
        let references = other.references.clone();
        self.add_bundle_references(references.as_slice());
        Ok(())
    }

    /// Compress JS and CSS in parallel. Both must succeed.
    pub fn compress(&self) -> Result<()> {
        let (js, css) = rayon::join(
            || self.js.as_ref().map(|c| c.compress()).transpose(),
            || self.css.as_ref().map(|c| c.compress()).transpose(),
        );
        js?;
        css?;
        self.compressed.store(true, Ordering::SeqCst);
        Ok(())
    }

    pub fn is_compressed(&self) -> bool {
        self.compressed.load(Ordering::SeqCst)
    }

    pub fn register_routes(&self, router: &mut Router) -> Result<()> {
        if !self.is_compressed() {
            return Err(PackError::NotCompressed);
        }
        if let Some(js) = &self.js {
            js.setup_routes(router);
        }
        if let Some(css) = &self.css {
            css.setup_routes(router);
        }
        if let Some(statics) = &self.statics {
            statics.setup_routes(router);
        }
        Ok(())
    }

    // Accessors

    pub fn has_js(&self) -> bool {
        self.has_js
    }

    pub fn has_css(&self) -> bool {
        self.has_css
    }

    pub fn has_static_resources(&self) -> bool {
        self.has_static_resources
    }

    pub fn js_compressor(&self) -> Option<&JsCompressor> {
        self.js.as_ref()
    }

    pub fn css_compressor(&self) -> Option<&CssCompressor> {
        self.css.as_ref()
    }

    pub fn static_index(&self) -> Option<&StaticResourceIndex> {
        self.statics.as_ref()
    }

    pub fn js_file_path(&self) -> Option<&str> {
        self.js_path.as_deref().filter(|_| self.has_js)
    }

    pub fn css_file_path(&self) -> Option<&str> {
        self.css_path.as_deref().filter(|_| self.has_css)
    }

    pub fn js_file_hash(&self) -> Option<String> {
        self.js.as_ref().filter(|_| self.has_js)?.hash()
    }

    pub fn css_file_hash(&self) -> Option<String> {
        self.css.as_ref().filter(|_| self.has_css)?.hash()
    }

    fn resolve(base: &str, path: &str, hash: Option<String>) -> String {
        match hash {
            Some(hash) => format!("{base}{path}?r={hash}"),
            None => format!("{base}{path}"),
        }
    }

    /// `<base><js path>?r=<hash>`
    pub fn resolved_js_file_path(&self, base_url_path: &str) -> Option<String> {
        let path = self.js_file_path()?;
        Some(Self::resolve(base_url_path, path, self.js_file_hash()))
    }

    /// `<base><css path>?r=<hash>`
    pub fn resolved_css_file_path(&self, base_url_path: &str) -> Option<String> {
        let path = self.css_file_path()?;
        Some(Self::resolve(base_url_path, path, self.css_file_hash()))
    }

    pub fn js_links(&self, base_url_path: &str) -> String {
        self.resolved_js_file_path(base_url_path)
            .map(|src| format!("<script src=\"{src}\"></script>\n"))
            .unwrap_or_default()
    }

    pub fn css_links(&self, base_url_path: &str) -> String {
        self.resolved_css_file_path(base_url_path)
            .map(|href| format!("<link rel=\"stylesheet\" href=\"{href}\" />\n"))
            .unwrap_or_default()
    }

    /// Script tag then stylesheet link, for whatever the package has.
    pub fn links(&self, base_url_path: &str) -> String {
        let mut out = self.js_links(base_url_path);
        out.push_str(&self.css_links(base_url_path));
        out
    }

    /// URL of a resource under the static root, joining `parts` without
    /// doubled slashes.
    pub fn static_link<S: AsRef<str>>(&self, base_url_path: &str, parts: &[S]) -> Option<String> {
        let root = self.static_path.as_deref()?;
        let mut link = format!("{base_url_path}{root}");
        if !link.ends_with('/') {
            link.push('/');
        }
        for part in parts {
            let part = part.as_ref();
            link.push_str(part.strip_prefix('/').unwrap_or(part));
        }
        Some(link)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Request;
    use std::fs;
    use tempfile::TempDir;

    fn package() -> AssetPackage {
        AssetPackage::new(
            Some("/resources/app/js/client.js"),
            Some("/resources/app/css/client.css"),
            Some("/resources/app"),
            false,
        )
    }

    #[test]
    fn test_missing_compressor() {
        let mut pkg = AssetPackage::new(None, None, None, false);
        let err = pkg.add_javascript("var a;", "", "a.js").unwrap_err();
        assert!(matches!(err, PackError::MissingCompressor { .. }));
        assert!(!pkg.has_js());
        assert!(pkg.add_css("a{}", "", "a.css").is_err());
        let dir = TempDir::new().unwrap();
        assert!(pkg
            .add_static_resources(dir.path(), "", true, None, CacheOptions::default())
            .is_err());
    }

    #[test]
    fn test_links_after_compress() {
        let mut pkg = package();
        pkg.add_javascript("var a = 1;", "", "a.js").unwrap();
        pkg.add_css("a { color: red; }", "", "a.css").unwrap();
        pkg.compress().unwrap();

        let js_hash = pkg.js_file_hash().unwrap();
        let css_hash = pkg.css_file_hash().unwrap();
        assert_eq!(
            pkg.links("/shop"),
            format!(
                "<script src=\"/shop/resources/app/js/client.js?r={js_hash}\"></script>\n\
                 <link rel=\"stylesheet\" href=\"/shop/resources/app/css/client.css?r={css_hash}\" />\n"
            )
        );
    }

    #[test]
    fn test_links_without_content() {
        let pkg = package();
        assert_eq!(pkg.links(""), "");
        assert_eq!(pkg.resolved_js_file_path(""), None);
        assert_eq!(pkg.js_file_hash(), None);
    }

    #[test]
    fn test_empty_inline_content_adds_no_links() {
        let mut pkg = package();
        pkg.add_javascript("", "", "a.js").unwrap();
        pkg.add_css("", "", "a.css").unwrap();
        assert!(!pkg.has_js());
        assert!(!pkg.has_css());
        pkg.compress().unwrap();
        assert_eq!(pkg.links(""), "");
    }

    #[test]
    fn test_static_link() {
        let pkg = package();
        assert_eq!(
            pkg.static_link("/shop", &["/img/", "logo.png"]).unwrap(),
            "/shop/resources/app/img/logo.png"
        );
        let bare = AssetPackage::new(None, None, None, false);
        assert_eq!(bare.static_link::<&str>("", &[]), None);
    }

    #[test]
    fn test_bundle_references_dedup() {
        let mut pkg = package();
        pkg.add_bundle_references(&["jquery", "lodash"]);
        pkg.add_bundle_references(&["lodash", "d3", "jquery"]);
        assert_eq!(pkg.bundle_references(), ["jquery", "lodash", "d3"]);
    }

    #[test]
    fn test_add_package_sets_flags() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("logo.png"), "png").unwrap();

        let mut other = package();
        other.add_javascript("var other;", "", "other.js").unwrap();
        other
            .add_static_resources(dir.path(), "", false, None, CacheOptions::default())
            .unwrap();
        other.add_bundle_references(&["jquery"]);

        let mut pkg = AssetPackage::new(
            Some("/resources/main/js/client.js"),
            Some("/resources/main/css/client.css"),
            Some("/resources/main"),
            false,
        );
        pkg.add_package(&other).unwrap();
        assert!(pkg.has_js());
        assert!(!pkg.has_css());
        assert!(pkg.has_static_resources());
        assert_eq!(pkg.bundle_references(), ["jquery"]);
    }

    #[test]
    fn test_register_routes_requires_compress() {
        let mut pkg = package();
        pkg.add_javascript("var a = 1;", "", "a.js").unwrap();
        let mut router = Router::new();
        assert!(matches!(
            pkg.register_routes(&mut router),
            Err(PackError::NotCompressed)
        ));

        pkg.compress().unwrap();
        pkg.register_routes(&mut router).unwrap();
        let res = router.dispatch(&Request::get("/resources/app/js/client.js"));
        assert_eq!(res.status(), 200);
    }

    #[test]
    fn test_compress_failure_propagates() {
        let mut pkg = package();
        pkg.add_javascript("var a = 1;", "", "a.js").unwrap();
        pkg.add_javascript("var b = 2;", "", "A.js").unwrap();
        assert!(pkg.compress().is_err());
        assert!(!pkg.is_compressed());
    }
}
