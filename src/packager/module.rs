//! Modules: named groups of packages declared in a `module.toml`, whose
//! packages other packages can pull in by reference.
//!
//! A module `shop` with prefix `shop/` and a package `cart` serves the
//! package at `<root>shop/cart.js` and answers to the references
//! `shop/cart` and `shop/*`.

use super::fragment::Fix;
use super::package::AssetPackage;
use super::static_index::CacheOptions;
use crate::error::{PackError, Result};
use crate::utils::path::{safe_add_path, with_trailing_slash};
use crate::{debug, log};
use regex::RegexBuilder;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Declarative description of a module, usually read from `module.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ModuleSpec {
    pub name: String,
    /// URL prefix for the module's packages, `<name>/` when unset.
    pub prefix: Option<String>,
    #[serde(rename = "package")]
    pub packages: Vec<PackageSpec>,
}

impl ModuleSpec {
    /// Parse `module.toml` in `dir`.
    pub fn read(dir: &Path) -> Result<Self> {
        let path = dir.join("module.toml");
        let text = std::fs::read_to_string(&path).map_err(|e| PackError::io(&path, e))?;
        toml::from_str(&text).map_err(|e| PackError::InvalidModule {
            module: path.display().to_string(),
            message: e.to_string(),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PackageSpec {
    pub name: String,
    pub js_name: Option<String>,
    pub css_name: Option<String>,
    pub static_name: Option<String>,
    pub js: Vec<PathBuf>,
    pub js_dir: Vec<PathBuf>,
    pub css: Vec<PathBuf>,
    pub css_dir: Vec<PathBuf>,
    /// Third-party scripts added verbatim apart from their fixes.
    pub vendor: Vec<VendorScript>,
    #[serde(rename = "static")]
    pub statics: Vec<StaticSpec>,
    pub bundle: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VendorScript {
    pub src: PathBuf,
    #[serde(default)]
    pub basename: Option<String>,
    #[serde(default)]
    pub fixes: Vec<Fix>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StaticSpec {
    /// Key prefix under the package's static root.
    pub root: String,
    pub directory: PathBuf,
    /// Regex applied to file names, ignoring case.
    #[serde(rename = "match", default)]
    pub name_match: Option<String>,
    #[serde(default)]
    pub cache: CacheOptions,
}

#[derive(Debug)]
pub struct Module {
    name: String,
    prefix: String,
    /// `(lowercase <prefix><package name>, package)` in declaration order.
    packages: Vec<(String, AssetPackage)>,
}

impl Module {
    /// Build every package of `spec`. Relative paths resolve against `dir`,
    /// package URLs are placed under `root_url`.
    pub fn load(spec: &ModuleSpec, dir: &Path, root_url: &str, debug: bool) -> Result<Self> {
        let prefix = spec
            .prefix
            .clone()
            .unwrap_or_else(|| format!("{}/", spec.name));
        let mut module = Self {
            name: spec.name.clone(),
            prefix,
            packages: Vec::with_capacity(spec.packages.len()),
        };

        for package in &spec.packages {
            if package.name.is_empty() {
                return Err(PackError::InvalidModule {
                    module: spec.name.clone(),
                    message: "package description has no name".to_string(),
                });
            }
            let loaded = module.load_package(package, dir, root_url, debug)?;
            let key = safe_add_path(&module.prefix, &package.name).to_lowercase();
            debug!("module"; "loaded package [{}]", key);
            module.packages.push((key, loaded));
        }

        log!("module"; "loaded module [{}] with {} packages", module.name, module.packages.len());
        Ok(module)
    }

    /// Read `module.toml` from `dir` and load it.
    pub fn load_dir(dir: &Path, root_url: &str, debug: bool) -> Result<Self> {
        Self::load(&ModuleSpec::read(dir)?, dir, root_url, debug)
    }

    fn load_package(
        &self,
        spec: &PackageSpec,
        dir: &Path,
        root_url: &str,
        debug: bool,
    ) -> Result<AssetPackage> {
        let file_name: String = spec
            .name
            .replace('/', "-")
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        let package_prefix = with_trailing_slash(&self.prefix);
        let base = format!("{}{}", with_trailing_slash(root_url), package_prefix);

        let js_path = format!("{base}{}", spec.js_name.clone().unwrap_or_else(|| format!("{file_name}.js")));
        let css_path = format!("{base}{}", spec.css_name.clone().unwrap_or_else(|| format!("{file_name}.css")));
        let static_path = (!spec.statics.is_empty())
            .then(|| format!("{base}{}", spec.static_name.as_deref().unwrap_or(&file_name)));

        let mut package = AssetPackage::new(Some(&js_path), Some(&css_path), static_path.as_deref(), debug);
        let resolve = |p: &Path| dir.join(p);

        for file in &spec.js {
            package.add_js_file(&resolve(file), &package_prefix, Vec::new(), None)?;
        }
        for d in &spec.js_dir {
            package.add_js_directory(&resolve(d), &package_prefix, true)?;
        }
        for file in &spec.css {
            package.add_css_file(&resolve(file), &package_prefix, Vec::new(), None)?;
        }
        for d in &spec.css_dir {
            package.add_css_directory(&resolve(d), &package_prefix, true)?;
        }
        for script in &spec.vendor {
            package.add_js_file(
                &resolve(&script.src),
                &package_prefix,
                script.fixes.clone(),
                script.basename.as_deref(),
            )?;
        }
        for s in &spec.statics {
            let filter = s
                .name_match
                .as_deref()
                .map(|re| RegexBuilder::new(re).case_insensitive(true).build())
                .transpose()
                .map_err(|e| PackError::InvalidModule {
                    module: self.name.clone(),
                    message: e.to_string(),
                })?;
            package.add_static_resources(&resolve(&s.directory), &s.root, true, filter.as_ref(), s.cache)?;
        }
        package.add_bundle_references(spec.bundle.as_slice());

        Ok(package)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn packages(&self) -> impl Iterator<Item = (&str, &AssetPackage)> {
        self.packages.iter().map(|(k, p)| (k.as_str(), p))
    }

    /// Packages matching `pattern`, in declaration order.
    pub fn find_matching_packages(&self, pattern: &str) -> Vec<&AssetPackage> {
        let matcher = PackageMatcher::new(pattern);
        self.packages
            .iter()
            .filter(|(key, _)| matcher.matches(key))
            .map(|(_, p)| p)
            .collect()
    }
}

/// `name` matches exactly, `name/*` matches everything below `name/`.
/// Both forms ignore case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageMatcher {
    Exact(String),
    Below(String),
}

impl PackageMatcher {
    pub fn new(pattern: &str) -> Self {
        let pattern = pattern.trim().to_lowercase();
        match pattern.strip_suffix("/*") {
            Some(parent) => Self::Below(format!("{parent}/")),
            None => Self::Exact(pattern),
        }
    }

    /// `key` must already be lowercase.
    pub fn matches(&self, key: &str) -> bool {
        match self {
            Self::Exact(name) => key == name,
            Self::Below(parent) => key.len() > parent.len() && key.starts_with(parent.as_str()),
        }
    }
}

/// The set of loaded modules, searched in load order.
#[derive(Debug, Default)]
pub struct Modules {
    modules: Vec<Module>,
}

impl Modules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, module: Module) {
        self.modules.push(module);
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Module> {
        self.modules.iter()
    }

    /// Every package of every module matching `pattern`.
    pub fn find_matching_packages(&self, pattern: &str) -> Vec<&AssetPackage> {
        self.modules
            .iter()
            .flat_map(|m| m.find_matching_packages(pattern))
            .collect()
    }
}

impl FromIterator<Module> for Modules {
    fn from_iter<I: IntoIterator<Item = Module>>(iter: I) -> Self {
        Self {
            modules: iter.into_iter().collect(),
        }
    }
}
