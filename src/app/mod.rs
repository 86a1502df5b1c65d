//! Application assembly.
//!
//! Startup runs strictly in order: load modules, set up the renderer and
//! its package helpers, resolve every package descriptor (adding the loader
//! setup where asked), compress and register the packages, then build the
//! route table. [`App::run`] serves it.

mod config;
mod helpers;
mod loader;

pub use config::{AppConfig, ModuleSource};
pub use helpers::{register_cdn_helper, register_package_helpers};
pub use loader::{LoaderConfig, SETUP_BASENAME};

use crate::config::Settings;
use crate::http::base_url::BaseUrlLookup;
use crate::http::{Request, Response, Router, server};
use crate::packager::{AssetPackage, Module, Modules, PackageDescriptor, Webpacker};
use crate::templates::{HandlebarsRenderer, Renderer, Renderers};
use crate::utils::mime;
use crate::{debug, log};
use anyhow::{Context, Result, anyhow};
use serde_json::{Value, json};
use std::sync::Arc;

pub struct App {
    name: String,
    settings: Settings,
    modules: Modules,
    webpacker: Webpacker,
    renderer: HandlebarsRenderer,
    loader: LoaderConfig,
    router: Router,
    base_urls: BaseUrlLookup,
}

impl App {
    /// Build everything `config` declares. `context` feeds template
    /// placeholders, usually the loaded config values.
    pub fn build(config: AppConfig, settings: Settings, context: Value) -> Result<Self> {
        let debug = settings.debug;
        let modules = load_modules(&config.modules, debug)?;

        let renderer = HandlebarsRenderer::new(context, config.template_paths.clone());
        let webpacker = Webpacker::new();
        register_package_helpers(&renderer, &webpacker);
        register_cdn_helper(&renderer, &webpacker, &config.cdn_resources);
        let mut renderers = Renderers::new();
        renderers.insert(Arc::new(renderer.clone()));

        let loader = LoaderConfig::from_descriptors(&config.packages, &modules);
        for descriptor in &config.packages {
            let descriptor = with_loader_setup(descriptor, &loader)?;
            let reference = descriptor.reference();
            let created = descriptor
                .create_package(&webpacker, &renderers, &modules, debug)
                .with_context(|| format!("unable to create package [{reference}]"))?;
            let Some(package) = created else {
                debug!("package"; "package [{}] declares nothing, skipped", reference);
                continue;
            };
            webpacker
                .register_package(reference, package)
                .with_context(|| format!("unable to register package [{reference}]"))?;
        }

        let mut router = Router::new();
        webpacker.register_routes(&mut router)?;
        install_fallbacks(&mut router, &renderer, &config);

        let base_urls = config
            .base_url_lookup
            .clone()
            .unwrap_or_else(|| settings.base_url_lookup());

        log!("serve"; "configured [{}] with {} packages and {} routes", config.name, webpacker.len(), router.len());
        Ok(Self {
            name: config.name,
            settings,
            modules,
            webpacker,
            renderer,
            loader,
            router,
            base_urls,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn modules(&self) -> &Modules {
        &self.modules
    }

    pub fn webpacker(&self) -> &Webpacker {
        &self.webpacker
    }

    pub fn renderer(&self) -> &HandlebarsRenderer {
        &self.renderer
    }

    pub fn loader_config(&self) -> &LoaderConfig {
        &self.loader
    }

    pub fn base_urls(&self) -> &BaseUrlLookup {
        &self.base_urls
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Routes added here are tried after the package routes.
    pub fn router_mut(&mut self) -> &mut Router {
        &mut self.router
    }

    pub fn named_package(&self, name: &str) -> Option<Arc<AssetPackage>> {
        self.webpacker.package(name)
    }

    pub fn require_named_package(&self, name: &str) -> Result<Arc<AssetPackage>> {
        self.named_package(name)
            .ok_or_else(|| anyhow!("unable to find required named package [{name}]"))
    }

    /// Serve until shutdown.
    pub fn run(self) -> Result<()> {
        server::serve(
            self.settings.interface,
            self.settings.port,
            Arc::new(self.router),
            Arc::new(self.base_urls),
        )
    }
}

fn load_modules(sources: &[ModuleSource], debug: bool) -> Result<Modules> {
    let mut modules = Modules::new();
    for source in sources {
        let module = match source {
            ModuleSource::Dir(dir) => Module::load_dir(dir, "", debug)
                .with_context(|| format!("unable to load module at {}", dir.display()))?,
            ModuleSource::Spec { spec, dir } => Module::load(spec, dir, "", debug)
                .with_context(|| format!("unable to load module [{}]", spec.name))?,
        };
        if modules.iter().any(|m| m.name() == module.name()) {
            debug!("module"; "module [{}] already loaded, skipped", module.name());
            continue;
        }
        modules.push(module);
    }
    Ok(modules)
}

fn with_loader_setup(descriptor: &PackageDescriptor, loader: &LoaderConfig) -> Result<PackageDescriptor> {
    if !descriptor.wants_loader_config() {
        return Ok(descriptor.clone());
    }
    let setup = loader
        .setup_script(descriptor.loader_entry_points())
        .context("unable to serialize loader config")?;
    Ok(descriptor
        .to_builder()
        .raw_javascript(&setup, "", SETUP_BASENAME)
        .build())
}

fn install_fallbacks(router: &mut Router, renderer: &HandlebarsRenderer, config: &AppConfig) {
    if let Some(name) = config.not_found_template.clone() {
        let renderer = renderer.clone();
        router.on_not_found(move |request| {
            render_page(&renderer, &name, request, 404).unwrap_or_else(Response::not_found)
        });
    }
    if let Some(name) = config.access_restricted_template.clone() {
        let renderer = renderer.clone();
        router.on_access_restricted(move |request| {
            render_page(&renderer, &name, request, 403).unwrap_or_else(Response::access_restricted)
        });
    }
    if let Some(name) = config.error_template.clone() {
        let renderer = renderer.clone();
        router.on_error(move |request, _| {
            render_page(&renderer, &name, request, 500).unwrap_or_else(Response::server_error)
        });
    }
}

fn render_page(renderer: &HandlebarsRenderer, name: &str, request: &Request, status: u16) -> Option<Response> {
    let data = json!({
        "path": request.path(),
        "baseURLPath": request.base_url_path(),
        "status": status,
    });
    match renderer.render(name, &data) {
        Ok(html) => Some(Response::ok(mime::types::HTML, html.into_bytes()).with_status(status)),
        Err(e) => {
            log!("error"; "unable to render [{}]: {}", name, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Body;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn body_text(response: &Response) -> String {
        match response.body() {
            Body::Bytes(bytes) => String::from_utf8_lossy(bytes).into_owned(),
            _ => String::new(),
        }
    }

    fn fixture(root: &Path) {
        fs::create_dir_all(root.join("ui/widgets")).unwrap();
        fs::create_dir_all(root.join("app/js")).unwrap();
        fs::create_dir_all(root.join("templates")).unwrap();
        fs::write(root.join("ui/widgets/button.js"), "var button = 'ui';").unwrap();
        fs::write(
            root.join("ui/module.toml"),
            "name = \"ui\"\n\n[[package]]\nname = \"widgets\"\njs_dir = [\"widgets\"]\nbundle = [\"ui/button\"]\n",
        )
        .unwrap();
        fs::write(root.join("app/js/main.js"), "var main = 'app';").unwrap();
        fs::write(root.join("templates/404.hbs"), "<p>missing {{path}}</p>").unwrap();
        fs::write(root.join("templates/403.hbs"), "<p>keep out of {{path}}</p>").unwrap();
        fs::write(root.join("templates/layout.hbs"), "{{cdn-links baseURLPath}}").unwrap();
    }

    fn build(root: &Path) -> App {
        crate::logger::set_quiet(true);
        let config = AppConfig::new("shop")
            .module_dir(root.join("ui"))
            .module_dir(root.join("ui"))
            .template_path(root.join("templates"))
            .not_found_template("404")
            .access_restricted_template("403")
            .cdn(&["shop", "$BASEURL$/lib/vendor.js"])
            .default_package(|p| p.javascript(root.join("app/js"), "app", true).package("ui/*"))
            .package(PackageDescriptor::builder("empty").build());
        App::build(config, Settings::default(), json!({})).unwrap()
    }

    #[test]
    fn test_build_registers_packages() {
        let dir = TempDir::new().unwrap();
        fixture(dir.path());
        let app = build(dir.path());

        assert_eq!(app.modules().len(), 1);
        assert_eq!(app.webpacker().len(), 1);
        assert!(app.named_package("SHOP").is_some());
        assert!(app.named_package("empty").is_none());
        assert!(app.require_named_package("nope").is_err());

        let loader = app.loader_config();
        assert_eq!(loader.paths["shop"], "$BASEURL$/resources/shop/js/client");
        assert_eq!(loader.bundles["shop"], ["ui/button"]);
    }

    #[test]
    fn test_package_route_serves_setup_and_modules() {
        let dir = TempDir::new().unwrap();
        fixture(dir.path());
        let app = build(dir.path());

        let response = app.router().dispatch(&Request::get("/resources/shop/js/client.js"));
        assert_eq!(response.status(), 200);
        let body = body_text(&response);
        let main = body.find("main").unwrap();
        let button = body.find("button").unwrap();
        assert!(main < button);
        assert!(body.contains("shop/init"));

        let js = app.named_package("shop").unwrap();
        let js = js.js_compressor().unwrap();
        assert!(js.source(SETUP_BASENAME).is_some());
        assert!(js.source("app/main.js").is_some());
        assert!(js.source("ui/button.js").is_some());
    }

    #[test]
    fn test_not_found_template() {
        let dir = TempDir::new().unwrap();
        fixture(dir.path());
        let app = build(dir.path());

        let response = app.router().dispatch(&Request::get("/nowhere"));
        assert_eq!(response.status(), 404);
        assert_eq!(body_text(&response), "<p>missing /nowhere</p>");
    }

    #[test]
    fn test_access_restricted_template() {
        let dir = TempDir::new().unwrap();
        fixture(dir.path());
        let mut app = build(dir.path());
        app.router_mut()
            .get("/admin", |_, _| Err(crate::http::AccessRestricted.into()));

        let response = app.router().dispatch(&Request::get("/admin"));
        assert_eq!(response.status(), 403);
        assert_eq!(body_text(&response), "<p>keep out of /admin</p>");
    }

    #[test]
    fn test_cdn_links_resolve_registered_packages() {
        let dir = TempDir::new().unwrap();
        fixture(dir.path());
        let app = build(dir.path());

        let html = app
            .renderer()
            .render("layout", &json!({"baseURLPath": "/b"}))
            .unwrap();
        let shop = app.named_package("shop").unwrap();
        assert!(html.contains(&format!("<script src=\"{}\">", shop.resolved_js_file_path("/b").unwrap())));
        assert!(html.contains("<script src=\"/b/lib/vendor.js\">"));
    }

    #[test]
    fn test_module_failure_aborts_startup() {
        let dir = TempDir::new().unwrap();
        crate::logger::set_quiet(true);
        let config = AppConfig::new("shop").module_dir(dir.path().join("missing"));
        assert!(App::build(config, Settings::default(), json!({})).is_err());
    }
}
