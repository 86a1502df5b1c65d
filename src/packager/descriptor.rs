//! Package descriptors: the declared contents of an application package,
//! resolved into an [`AssetPackage`] at startup.

use super::module::Modules;
use super::package::AssetPackage;
use super::static_index::CacheOptions;
use super::webpacker::Webpacker;
use crate::error::{PackError, Result};
use crate::templates::{Renderers, TemplatePacker};
use crate::utils::path::safe_reference;
use crate::{debug, warn};
use regex::Regex;
use std::path::{Path, PathBuf};

/// Packed templates added to a package as inline JavaScript.
#[derive(Debug, Clone)]
pub struct TemplateBundle {
    /// AMD module id of the packed output.
    pub template_id: String,
    pub packer: TemplatePacker,
    /// Renderer kind, e.g. `handlebars`.
    pub renderer: String,
    pub prefix: String,
    pub basename: String,
    pub register_on_renderer: bool,
}

/// One entry of a package's contents.
#[derive(Debug, Clone)]
pub enum Declaration {
    /// A file, or every `.js` in a directory.
    Js {
        path: PathBuf,
        prefix: String,
        recursive: bool,
    },
    Css {
        path: PathBuf,
        prefix: String,
        recursive: bool,
    },
    JsRaw {
        content: String,
        prefix: String,
        basename: String,
    },
    CssRaw {
        content: String,
        prefix: String,
        basename: String,
    },
    Static {
        path: PathBuf,
        prefix: String,
        recursive: bool,
        name_filter: Option<Regex>,
        cache: CacheOptions,
    },
    /// Module package reference, exact or `name/*`.
    PackageRef(String),
    Templates(TemplateBundle),
    Bundle(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct PackageDescriptor {
    reference: String,
    js_path: Option<String>,
    css_path: Option<String>,
    static_path: Option<String>,
    declarations: Vec<Declaration>,
    loader_entry_points: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct PackageDescriptorBuilder {
    descriptor: PackageDescriptor,
}

impl PackageDescriptorBuilder {
    /// Override the output paths. `None` keeps the default.
    pub fn paths(mut self, js: Option<&str>, css: Option<&str>, statics: Option<&str>) -> Self {
        let d = &mut self.descriptor;
        d.js_path = js.map(str::to_string).or(d.js_path.take());
        d.css_path = css.map(str::to_string).or(d.css_path.take());
        d.static_path = statics.map(str::to_string).or(d.static_path.take());
        self
    }

    pub fn declare(mut self, declaration: Declaration) -> Self {
        self.descriptor.declarations.push(declaration);
        self
    }

    pub fn javascript(self, path: impl Into<PathBuf>, prefix: &str, recursive: bool) -> Self {
        self.declare(Declaration::Js {
            path: path.into(),
            prefix: prefix.to_string(),
            recursive,
        })
    }

    pub fn raw_javascript(self, content: &str, prefix: &str, basename: &str) -> Self {
        self.declare(Declaration::JsRaw {
            content: content.to_string(),
            prefix: prefix.to_string(),
            basename: basename.to_string(),
        })
    }

    pub fn css(self, path: impl Into<PathBuf>, prefix: &str, recursive: bool) -> Self {
        self.declare(Declaration::Css {
            path: path.into(),
            prefix: prefix.to_string(),
            recursive,
        })
    }

    pub fn raw_css(self, content: &str, prefix: &str, basename: &str) -> Self {
        self.declare(Declaration::CssRaw {
            content: content.to_string(),
            prefix: prefix.to_string(),
            basename: basename.to_string(),
        })
    }

    pub fn static_resources(
        self,
        path: impl Into<PathBuf>,
        prefix: &str,
        recursive: bool,
        name_filter: Option<Regex>,
        cache: CacheOptions,
    ) -> Self {
        self.declare(Declaration::Static {
            path: path.into(),
            prefix: prefix.to_string(),
            recursive,
            name_filter,
            cache,
        })
    }

    pub fn package(self, reference: &str) -> Self {
        self.declare(Declaration::PackageRef(reference.to_string()))
    }

    pub fn templates(self, bundle: TemplateBundle) -> Self {
        self.declare(Declaration::Templates(bundle))
    }

    pub fn bundle<S: AsRef<str>>(self, references: &[S]) -> Self {
        let references = references.iter().map(|r| r.as_ref().to_string()).collect();
        self.declare(Declaration::Bundle(references))
    }

    /// Ask for the loader setup script, which requires `entry_points` once
    /// the loader is configured.
    pub fn loader_config<S: AsRef<str>>(mut self, entry_points: &[S]) -> Self {
        self.descriptor.loader_entry_points =
            Some(entry_points.iter().map(|r| r.as_ref().to_string()).collect());
        self
    }

    pub fn build(self) -> PackageDescriptor {
        self.descriptor
    }
}

impl PackageDescriptor {
    pub fn builder(reference: &str) -> PackageDescriptorBuilder {
        PackageDescriptorBuilder {
            descriptor: Self {
                reference: reference.to_string(),
                js_path: None,
                css_path: None,
                static_path: None,
                declarations: Vec::new(),
                loader_entry_points: None,
            },
        }
    }

    /// Builder seeded with this descriptor, for appending declarations.
    pub fn to_builder(&self) -> PackageDescriptorBuilder {
        PackageDescriptorBuilder {
            descriptor: self.clone(),
        }
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn declarations(&self) -> &[Declaration] {
        &self.declarations
    }

    fn default_root(&self) -> String {
        format!("/resources/{}", safe_reference(&self.reference))
    }

    pub fn js_file_path(&self) -> String {
        self.js_path
            .clone()
            .unwrap_or_else(|| format!("{}/js/client.js", self.default_root()))
    }

    pub fn css_file_path(&self) -> String {
        self.css_path
            .clone()
            .unwrap_or_else(|| format!("{}/css/client.css", self.default_root()))
    }

    pub fn static_file_path(&self) -> String {
        self.static_path.clone().unwrap_or_else(|| self.default_root())
    }

    /// `<base><js path>`, without the revision.
    pub fn js_path(&self, base_url_path: &str) -> String {
        format!("{base_url_path}{}", self.js_file_path())
    }

    pub fn wants_loader_config(&self) -> bool {
        self.loader_entry_points.is_some()
    }

    pub fn loader_entry_points(&self) -> Option<&[String]> {
        self.loader_entry_points.as_deref()
    }

    /// Resolve every declaration, in order, into a new package. `None`
    /// when nothing is declared.
    pub fn create_package(
        &self,
        webpacker: &Webpacker,
        renderers: &Renderers,
        modules: &Modules,
        debug: bool,
    ) -> Result<Option<AssetPackage>> {
        if self.declarations.is_empty() {
            return Ok(None);
        }

        let js_path = self.js_file_path();
        let css_path = self.css_file_path();
        let static_path = self.static_file_path();
        let mut package =
            webpacker.create_package(Some(&js_path), Some(&css_path), Some(&static_path), debug);

        for declaration in &self.declarations {
            match declaration {
                Declaration::Js {
                    path,
                    prefix,
                    recursive,
                } => {
                    if is_dir(path)? {
                        package.add_js_directory(path, prefix, *recursive)?;
                    } else {
                        package.add_js_file(path, prefix, Vec::new(), None)?;
                    }
                }
                Declaration::Css {
                    path,
                    prefix,
                    recursive,
                } => {
                    if is_dir(path)? {
                        package.add_css_directory(path, prefix, *recursive)?;
                    } else {
                        package.add_css_file(path, prefix, Vec::new(), None)?;
                    }
                }
                Declaration::JsRaw {
                    content,
                    prefix,
                    basename,
                } => package.add_javascript(content, prefix, basename)?,
                Declaration::CssRaw {
                    content,
                    prefix,
                    basename,
                } => package.add_css(content, prefix, basename)?,
                Declaration::Static {
                    path,
                    prefix,
                    recursive,
                    name_filter,
                    cache,
                } => {
                    package.add_static_resources(path, prefix, *recursive, name_filter.as_ref(), *cache)?;
                }
                Declaration::PackageRef(reference) => {
                    let matches = modules.find_matching_packages(reference);
                    if matches.is_empty() {
                        warn!("package"; "unable to find any matching packages for [{}]", reference);
                    }
                    for other in matches {
                        package.add_package(other)?;
                    }
                }
                Declaration::Templates(bundle) => {
                    let Some(renderer) = renderers.get(&bundle.renderer) else {
                        return Err(PackError::MissingRenderer(bundle.renderer.clone()));
                    };
                    let packed = bundle.packer.pack(
                        &bundle.template_id,
                        renderer.as_ref(),
                        bundle.register_on_renderer,
                    )?;
                    if let Some(code) = packed {
                        package.add_javascript(&code, &bundle.prefix, &bundle.basename)?;
                    }
                }
                Declaration::Bundle(references) => package.add_bundle_references(references.as_slice()),
            }
        }

        debug!("package"; "resolved {} declarations for [{}]", self.declarations.len(), self.reference);
        Ok(Some(package))
    }

    /// Bundle references of this descriptor and of every package it pulls
    /// in, first-seen order.
    pub fn all_bundle_references(&self, modules: &Modules) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        let mut push = |r: &str| {
            if !out.iter().any(|o| o == r) {
                out.push(r.to_string());
            }
        };
        for declaration in &self.declarations {
            match declaration {
                Declaration::Bundle(references) => references.iter().for_each(|r| push(r)),
                Declaration::PackageRef(reference) => {
                    for other in modules.find_matching_packages(reference) {
                        other.bundle_references().iter().for_each(|r| push(r));
                    }
                }
                _ => {}
            }
        }
        out
    }

    /// Whether the resolved package will carry any JavaScript.
    pub fn contains_js(&self, modules: &Modules) -> bool {
        self.declarations.iter().any(|d| match d {
            Declaration::Js { .. } | Declaration::Templates(_) => true,
            Declaration::JsRaw { content, .. } => !content.is_empty(),
            Declaration::PackageRef(reference) => modules
                .find_matching_packages(reference)
                .iter()
                .any(|p| p.has_js()),
            Declaration::Css { .. }
            | Declaration::CssRaw { .. }
            | Declaration::Static { .. }
            | Declaration::Bundle(_) => false,
        })
    }
}

fn is_dir(path: &Path) -> Result<bool> {
    std::fs::metadata(path)
        .map(|m| m.is_dir())
        .map_err(|e| PackError::io(path, e))
}
