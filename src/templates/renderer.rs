//! Renderer seam and the handlebars implementation.

use crate::debug;
use handlebars::{Handlebars, HelperDef};
use parking_lot::RwLock;
use regex::Regex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::{Arc, LazyLock};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{0}")]
pub struct RenderError(pub String);

impl RenderError {
    fn from_display(e: impl std::fmt::Display) -> Self {
        Self(e.to_string())
    }
}

/// A template engine packages can pack templates for.
pub trait Renderer: Send + Sync {
    /// Key `Templates` declarations use to find this renderer.
    fn kind(&self) -> &str;

    /// Check a template compiles and return the form shipped to clients.
    fn precompile(&self, source: &str) -> Result<String, RenderError>;

    /// Make a template renderable server-side under `ref:<reference>`.
    fn register_template(&self, reference: &str, source: &str) -> Result<(), RenderError>;

    fn register_partial(&self, name: &str, source: &str) -> Result<(), RenderError>;

    fn render(&self, name: &str, data: &Value) -> Result<String, RenderError>;
}

/// Renderers by kind.
#[derive(Clone, Default)]
pub struct Renderers {
    by_kind: FxHashMap<String, Arc<dyn Renderer>>,
}

impl Renderers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, renderer: Arc<dyn Renderer>) {
        self.by_kind.insert(renderer.kind().to_lowercase(), renderer);
    }

    pub fn get(&self, kind: &str) -> Option<&Arc<dyn Renderer>> {
        self.by_kind.get(&kind.to_lowercase())
    }
}

pub const HANDLEBARS: &str = "handlebars";

static REFERENCED_VARIABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"__[\w.]+__").expect("valid regex"));

/// Handlebars with `__path.to.value__` placeholders resolved from a
/// configuration context before compilation.
#[derive(Clone)]
pub struct HandlebarsRenderer {
    handlebars: Arc<RwLock<Handlebars<'static>>>,
    context: Arc<Value>,
    template_paths: Arc<Vec<PathBuf>>,
}

impl Default for HandlebarsRenderer {
    fn default() -> Self {
        Self::new(Value::Null, Vec::new())
    }
}

impl HandlebarsRenderer {
    pub fn new(context: Value, template_paths: Vec<PathBuf>) -> Self {
        Self {
            handlebars: Arc::new(RwLock::new(Handlebars::new())),
            context: Arc::new(context),
            template_paths: Arc::new(template_paths),
        }
    }

    pub fn register_helper(&self, name: &str, helper: Box<dyn HelperDef + Send + Sync + 'static>) {
        self.handlebars.write().register_helper(name, helper);
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.handlebars.read().has_template(name)
    }

    /// Replace `__a.b__` with the context value at `a.b`. Several paths can
    /// be joined as `__a__.__b__`, producing `<a>.<b>`. Unresolved
    /// placeholders are left as they are.
    pub fn resolve_referenced_variables(&self, source: &str) -> String {
        REFERENCED_VARIABLE
            .replace_all(source, |caps: &regex::Captures| {
                let token = &caps[0];
                let inner = token.trim_start_matches("__").trim_end_matches("__");
                let mut parts = Vec::new();
                for path in inner.split("__.__") {
                    match lookup(&self.context, path) {
                        Some(v) => parts.push(v),
                        None => {
                            debug!("templates"; "unable to resolve reference [{}]", token);
                            return token.to_string();
                        }
                    }
                }
                parts.join(".")
            })
            .into_owned()
    }

    /// Find `<name>.hbs` under the configured template paths and register it.
    fn load_from_paths(&self, name: &str) -> Result<bool, RenderError> {
        let file = if name.to_lowercase().ends_with(".hbs") {
            name.to_string()
        } else {
            format!("{name}.hbs")
        };
        for root in self.template_paths.iter() {
            let path = root.join(&file);
            if path.is_file() {
                let source = std::fs::read_to_string(&path).map_err(RenderError::from_display)?;
                let source = self.resolve_referenced_variables(&source);
                self.handlebars
                    .write()
                    .register_template_string(name, source)
                    .map_err(RenderError::from_display)?;
                return Ok(true);
            }
        }
        Ok(false)
    }
}

fn lookup(context: &Value, path: &str) -> Option<String> {
    let mut current = context;
    for part in path.split('.') {
        current = current.get(part)?;
    }
    match current {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn reference_name(reference: &str) -> String {
    format!("ref:{}", reference.to_lowercase())
}

impl Renderer for HandlebarsRenderer {
    fn kind(&self) -> &str {
        HANDLEBARS
    }

    fn precompile(&self, source: &str) -> Result<String, RenderError> {
        let resolved = self.resolve_referenced_variables(source);
        handlebars::Template::compile(&resolved).map_err(RenderError::from_display)?;
        Ok(resolved)
    }

    fn register_template(&self, reference: &str, source: &str) -> Result<(), RenderError> {
        self.handlebars
            .write()
            .register_template_string(&reference_name(reference), source)
            .map_err(RenderError::from_display)
    }

    fn register_partial(&self, name: &str, source: &str) -> Result<(), RenderError> {
        self.handlebars
            .write()
            .register_partial(name, source)
            .map_err(RenderError::from_display)
    }

    /// `ref:<reference>` renders a packed template; anything else is looked
    /// up among registered templates, then under the template paths.
    fn render(&self, name: &str, data: &Value) -> Result<String, RenderError> {
        let name = match name.get(..4) {
            Some(head) if head.eq_ignore_ascii_case("ref:") => reference_name(&name[4..]),
            _ => name.to_string(),
        };
        if !self.has_template(&name) && !name.starts_with("ref:") && !self.load_from_paths(&name)? {
            return Err(RenderError(format!("template [{name}] not found")));
        }
        self.handlebars
            .read()
            .render(&name, data)
            .map_err(RenderError::from_display)
    }
}
