//! Packs templates into a self-contained AMD module for clients.
//!
//! Each template is validated through the renderer, optionally registered
//! server-side, and shipped as source inside a `define("<id>", ...)` module
//! that hands them to the shared `templates/lookup` provider.

use super::Renderer;
use crate::embed::client::TEMPLATE_LOOKUP_JS;
use crate::error::{PackError, Result};
use crate::utils::path::safe_add_path;
use crate::utils::walk::{WalkedFile, has_extension, walk_files};
use crate::log;
use regex::Regex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static PARTIAL_NAME_UNSAFE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s\-/]").expect("valid regex"));

/// What to do when one template fails to compile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Abort the whole pack.
    #[default]
    FailFast,
    /// Log, drop the template and keep going.
    SkipFailed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddFileOptions {
    pub register_as_partial: bool,
    /// Defaults to the prefixed reference with whitespace, `-` and `/`
    /// mapped to `_`.
    pub partial_name: Option<String>,
}

/// Result of a directory file processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Processed {
    Add {
        reference: String,
        options: AddFileOptions,
    },
    Skip,
}

/// Maps a found `*.hbs` file to its reference, given the directory's
/// reference prefix.
pub type FileProcessor = dyn Fn(&WalkedFile, &str) -> Processed;

#[derive(Debug, Clone)]
struct PackFile {
    path: PathBuf,
    reference: String,
    partial_name: String,
    register_partial: bool,
}

/// One template as shipped to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackedTemplate {
    pub reference: String,
    pub template: String,
    pub register_partial: bool,
    pub partial_name: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TemplatePacker {
    reference_prefix: String,
    files: Vec<PackFile>,
    failure_policy: FailurePolicy,
}

impl TemplatePacker {
    pub fn new(reference_prefix: &str) -> Self {
        Self {
            reference_prefix: reference_prefix.to_string(),
            ..Self::default()
        }
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn default_partial_name(&self, reference: &str) -> String {
        let joined = format!("{}{}", self.reference_prefix, reference);
        PARTIAL_NAME_UNSAFE.replace_all(&joined, "_").into_owned()
    }

    pub fn add_file(&mut self, path: &Path, reference: &str, options: AddFileOptions) -> Result<()> {
        if reference.is_empty() {
            return Err(PackError::MissingReference(path.to_path_buf()));
        }
        let partial_name = options
            .partial_name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| self.default_partial_name(reference));
        self.files.push(PackFile {
            path: path.to_path_buf(),
            reference: safe_add_path(&self.reference_prefix, reference),
            partial_name,
            register_partial: options.register_as_partial,
        });
        Ok(())
    }

    /// Add every `*.hbs` under `dir`.
    ///
    /// Without a processor, the reference is `reference_prefix` plus the
    /// relative path minus `.hbs`, and each file becomes a partial when
    /// `register_partials` is set.
    pub fn add_directory(
        &mut self,
        dir: &Path,
        recursive: bool,
        reference_prefix: &str,
        processor: Option<&FileProcessor>,
        register_partials: bool,
    ) -> Result<()> {
        for file in walk_files(dir, recursive)? {
            if !has_extension(&file.name, "hbs") {
                continue;
            }
            let processed = match processor {
                Some(processor) => processor(&file, reference_prefix),
                None => self.default_processor(&file, reference_prefix, register_partials),
            };
            match processed {
                Processed::Skip => continue,
                Processed::Add { reference, .. } if reference.is_empty() => {
                    return Err(PackError::InvalidFileProcessorResult(file.path));
                }
                Processed::Add { reference, options } => {
                    self.add_file(&file.path, &reference, options)?;
                }
            }
        }
        Ok(())
    }

    fn default_processor(&self, file: &WalkedFile, prefix: &str, register_partials: bool) -> Processed {
        let stem = &file.name[..file.name.len() - ".hbs".len()];
        let reference = safe_add_path(&safe_add_path(prefix, &file.dir), stem);
        let options = AddFileOptions {
            register_as_partial: register_partials,
            partial_name: register_partials.then(|| self.default_partial_name(&reference)),
        };
        Processed::Add { reference, options }
    }

    /// Compile every added template and emit the client module, or `None`
    /// when nothing was packed.
    pub fn pack(
        &self,
        template_id: &str,
        renderer: &dyn Renderer,
        register_on_renderer: bool,
    ) -> Result<Option<String>> {
        let mut packed = Vec::with_capacity(self.files.len());

        for file in &self.files {
            let source = std::fs::read_to_string(&file.path).map_err(|e| PackError::io(&file.path, e))?;
            let template = match renderer.precompile(&source) {
                Ok(template) => template,
                Err(e) => {
                    log!("templates"; "unable to compile template at [{}] with reference [{}]: {}",
                        file.path.display(), file.reference, e);
                    match self.failure_policy {
                        FailurePolicy::FailFast => {
                            return Err(PackError::TemplateCompile {
                                path: file.path.clone(),
                                reference: file.reference.clone(),
                                message: e.to_string(),
                            });
                        }
                        FailurePolicy::SkipFailed => continue,
                    }
                }
            };
            packed.push(PackedTemplate {
                reference: file.reference.clone(),
                template,
                register_partial: file.register_partial,
                partial_name: Some(file.partial_name.clone()),
            });
        }

        if packed.is_empty() {
            return Ok(None);
        }

        if register_on_renderer {
            for t in &packed {
                register(renderer, t).map_err(|e| PackError::TemplateCompile {
                    path: PathBuf::new(),
                    reference: t.reference.clone(),
                    message: e.to_string(),
                })?;
            }
        }

        let compiled = to_json(&packed, template_id)?;
        let module_id = to_json(&template_id, template_id)?;

        Ok(Some(format!(
            "{TEMPLATE_LOOKUP_JS}\n\
             define({module_id}, [\"templates/lookup\", \"handlebars\"], function(TemplateLookup, Handlebars) {{\n\
             \tTemplateLookup.loadCompiled(Handlebars, {compiled});\n\
             }});\n"
        )))
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T, template_id: &str) -> Result<String> {
    serde_json::to_string(value).map_err(|e| PackError::TemplateCompile {
        path: PathBuf::new(),
        reference: template_id.to_string(),
        message: e.to_string(),
    })
}

fn register(renderer: &dyn Renderer, t: &PackedTemplate) -> std::result::Result<(), super::RenderError> {
    renderer.register_template(&t.reference, &t.template)?;
    if t.register_partial
        && let Some(name) = &t.partial_name
    {
        renderer.register_partial(name, &t.template)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::HandlebarsRenderer;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("cart")).unwrap();
        fs::write(dir.path().join("header.hbs"), "<h1>{{title}}</h1>").unwrap();
        fs::write(dir.path().join("cart/line-item.HBS"), "<li>{{name}}</li>").unwrap();
        fs::write(dir.path().join("cart/notes.txt"), "ignored").unwrap();
        dir
    }

    #[test]
    fn test_default_partial_name() {
        let packer = TemplatePacker::new("shop/");
        assert_eq!(packer.default_partial_name("cart/line-item x"), "shop_cart_line_item_x");
    }

    #[test]
    fn test_add_file_requires_reference() {
        let mut packer = TemplatePacker::new("");
        let err = packer
            .add_file(Path::new("a.hbs"), "", AddFileOptions::default())
            .unwrap_err();
        assert!(matches!(err, PackError::MissingReference(_)));
    }

    #[test]
    fn test_pack_directory() {
        let dir = fixture();
        let mut packer = TemplatePacker::new("");
        packer.add_directory(dir.path(), true, "shop", None, true).unwrap();
        assert_quiet();
        assert_eq!(packer.len(), 2);

        let renderer = HandlebarsRenderer::default();
        let code = packer.pack("shop/templates", &renderer, true).unwrap().unwrap();
        assert!(code.contains("define(\"shop/templates\""));
        assert!(code.contains("\"reference\":\"shop/cart/line-item\""));
        assert!(code.contains("\"partialName\":\"shop_cart_line_item\""));
        assert!(code.contains("templates/lookup"));

        let out = renderer.render("ref:shop/header", &json!({"title": "Hi"})).unwrap();
        assert_eq!(out, "<h1>Hi</h1>");
    }

    #[test]
    fn test_processor_can_skip() {
        let dir = fixture();
        let mut packer = TemplatePacker::new("");
        let only_cart: &FileProcessor = &|file, _| {
            if file.dir.starts_with("cart") {
                Processed::Add {
                    reference: format!("c/{}", file.name),
                    options: AddFileOptions::default(),
                }
            } else {
                Processed::Skip
            }
        };
        packer
            .add_directory(dir.path(), true, "", Some(only_cart), false)
            .unwrap();
        assert_eq!(packer.len(), 1);
    }

    #[test]
    fn test_processor_without_reference_fails() {
        let dir = fixture();
        let mut packer = TemplatePacker::new("");
        let broken: &FileProcessor = &|_, _| Processed::Add {
            reference: String::new(),
            options: AddFileOptions::default(),
        };
        let err = packer
            .add_directory(dir.path(), true, "", Some(broken), false)
            .unwrap_err();
        assert!(matches!(err, PackError::InvalidFileProcessorResult(_)));
    }

    #[test]
    fn test_failure_policies() {
        let dir = fixture();
        fs::write(dir.path().join("broken.hbs"), "{{#if a}}never closed").unwrap();
        assert_quiet();

        let mut packer = TemplatePacker::new("");
        packer.add_directory(dir.path(), false, "", None, false).unwrap();
        let renderer = HandlebarsRenderer::default();
        let err = packer.pack("t", &renderer, false).unwrap_err();
        assert!(matches!(err, PackError::TemplateCompile { .. }));

        let packer = packer.with_failure_policy(FailurePolicy::SkipFailed);
        let code = packer.pack("t", &renderer, false).unwrap().unwrap();
        assert!(code.contains("\"reference\":\"header\""));
        assert!(!code.contains("broken"));
    }

    #[test]
    fn test_module_id_is_escaped() {
        let dir = fixture();
        let mut packer = TemplatePacker::new("");
        packer.add_directory(dir.path(), false, "", None, false).unwrap();
        let renderer = HandlebarsRenderer::default();
        let code = packer.pack("it's\\odd", &renderer, false).unwrap().unwrap();
        assert!(code.contains(r#"define("it's\\odd", "#));
    }

    #[test]
    fn test_empty_pack() {
        let packer = TemplatePacker::new("");
        let renderer = HandlebarsRenderer::default();
        assert!(packer.pack("t", &renderer, true).unwrap().is_none());
    }

    fn assert_quiet() {
        crate::logger::set_quiet(true);
    }
}
