//! Declarative application setup.

use crate::http::base_url::BaseUrlLookup;
use crate::packager::{ModuleSpec, PackageDescriptor, PackageDescriptorBuilder};
use crate::utils::path::safe_reference;
use std::path::PathBuf;

/// Where a module's description comes from.
#[derive(Debug, Clone)]
pub enum ModuleSource {
    /// Directory holding a `module.toml`.
    Dir(PathBuf),
    /// Description given in code; relative paths resolve against `dir`.
    Spec { spec: ModuleSpec, dir: PathBuf },
}

/// Everything an [`App`](super::App) is built from.
///
/// There is no implicit package: call [`AppConfig::default_package`] to get
/// one named after the app.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub(crate) name: String,
    pub(crate) modules: Vec<ModuleSource>,
    pub(crate) packages: Vec<PackageDescriptor>,
    pub(crate) template_paths: Vec<PathBuf>,
    pub(crate) base_url_lookup: Option<BaseUrlLookup>,
    pub(crate) not_found_template: Option<String>,
    pub(crate) access_restricted_template: Option<String>,
    pub(crate) error_template: Option<String>,
    pub(crate) cdn_resources: Vec<String>,
}

impl AppConfig {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            modules: Vec::new(),
            packages: Vec::new(),
            template_paths: Vec::new(),
            base_url_lookup: None,
            not_found_template: None,
            access_restricted_template: None,
            error_template: None,
            cdn_resources: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// URL-safe form of the app name.
    pub fn safe_name(&self) -> String {
        safe_reference(&self.name)
    }

    pub fn module_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.modules.push(ModuleSource::Dir(dir.into()));
        self
    }

    pub fn module(mut self, spec: ModuleSpec, dir: impl Into<PathBuf>) -> Self {
        self.modules.push(ModuleSource::Spec {
            spec,
            dir: dir.into(),
        });
        self
    }

    /// Package named after the app, served under `/resources/<app>/` and
    /// carrying the loader setup, which requires `<app>/init`.
    pub fn default_package<F>(mut self, declare: F) -> Self
    where
        F: FnOnce(PackageDescriptorBuilder) -> PackageDescriptorBuilder,
    {
        let entry = format!("{}/init", self.safe_name());
        let builder = PackageDescriptor::builder(&self.name).loader_config(&[entry]);
        self.packages.insert(0, declare(builder).build());
        self
    }

    pub fn package(mut self, descriptor: PackageDescriptor) -> Self {
        self.packages.push(descriptor);
        self
    }

    pub fn template_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.template_paths.push(path.into());
        self
    }

    /// Host lookup used instead of the `base_url_path` config table.
    pub fn base_url_lookup(mut self, lookup: BaseUrlLookup) -> Self {
        self.base_url_lookup = Some(lookup);
        self
    }

    pub fn not_found_template(mut self, name: &str) -> Self {
        self.not_found_template = Some(name.to_string());
        self
    }

    /// Rendered with status 403 when a handler fails with
    /// [`AccessRestricted`](crate::http::AccessRestricted).
    pub fn access_restricted_template(mut self, name: &str) -> Self {
        self.access_restricted_template = Some(name.to_string());
        self
    }

    pub fn error_template(mut self, name: &str) -> Self {
        self.error_template = Some(name.to_string());
        self
    }

    /// Shared resources linked by the `cdn-links` helper: registered package
    /// names, or script/stylesheet URLs that may carry the `$BASEURL$`
    /// token. Empty entries are ignored.
    pub fn cdn<S: AsRef<str>>(mut self, resources: &[S]) -> Self {
        self.cdn_resources.extend(
            resources
                .iter()
                .map(|r| r.as_ref().trim())
                .filter(|r| !r.is_empty())
                .map(str::to_string),
        );
        self
    }

    pub fn packages(&self) -> &[PackageDescriptor] {
        &self.packages
    }
}
