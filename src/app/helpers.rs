//! Handlebars helpers that render links to registered packages.
//!
//! ```handlebars
//! {{package-links baseURLPath "shop"}}
//! {{package-css baseURLPath "shop"}}
//! {{package-static baseURLPath "shop" "img/" "logo.png"}}
//! {{cdn-links baseURLPath "  "}}
//! ```

use crate::embed::client::BASE_URL_TOKEN;
use crate::packager::{AssetPackage, Webpacker};
use crate::templates::HandlebarsRenderer;
use crate::{log, warn};
use serde_json::json;
use handlebars::{Context, Handlebars, Helper, HelperDef, HelperResult, JsonRender, Output, RenderContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkKind {
    All,
    Js,
    Css,
    Static,
}

struct PackageHelper {
    webpacker: Webpacker,
    kind: LinkKind,
}

impl PackageHelper {
    fn render(&self, package: &AssetPackage, base: &str, h: &Helper<'_>) -> String {
        match self.kind {
            LinkKind::All => package.links(base),
            LinkKind::Js => package.js_links(base),
            LinkKind::Css => package.css_links(base),
            LinkKind::Static => {
                let parts: Vec<String> = h.params().iter().skip(2).map(|p| p.value().render()).collect();
                package.static_link(base, &parts).unwrap_or_default()
            }
        }
    }
}

impl HelperDef for PackageHelper {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        _: &'reg Handlebars<'reg>,
        _: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let base = h.param(0).and_then(|p| p.value().as_str()).unwrap_or("");
        let Some(name) = h.param(1).and_then(|p| p.value().as_str()) else {
            log!("error"; "'{}' requires a named package to be provided", h.name());
            return Ok(());
        };
        let Some(package) = self.webpacker.package(name) else {
            warn!("templates"; "unable to find named package [{}]", name);
            return Ok(());
        };
        out.write(&self.render(&package, base, h))?;
        Ok(())
    }
}

/// Register `package-links`, `package-js`, `package-css` and
/// `package-static`. Packages are looked up at render time.
pub fn register_package_helpers(renderer: &HandlebarsRenderer, webpacker: &Webpacker) {
    let helpers = [
        ("package-links", LinkKind::All),
        ("package-js", LinkKind::Js),
        ("package-css", LinkKind::Css),
        ("package-static", LinkKind::Static),
    ];
    for (name, kind) in helpers {
        renderer.register_helper(
            name,
            Box::new(PackageHelper {
                webpacker: webpacker.clone(),
                kind,
            }),
        );
    }
}

const CDN_INDENT: &str = "    ";

/// `baseConfig` JSON block, then a script tag per shared script and a link
/// per shared stylesheet.
struct CdnLinksHelper {
    webpacker: Webpacker,
    resources: Vec<String>,
}

impl CdnLinksHelper {
    fn render(&self, base: &str, indent: &str) -> String {
        let config = json!({ "baseURLPath": base });
        let mut out = format!("<script id='baseConfig' type='application/json'>{config}</script>\n");

        let mut scripts = Vec::new();
        let mut styles = Vec::new();
        for resource in &self.resources {
            match self.webpacker.package(resource) {
                Some(package) => {
                    scripts.extend(package.resolved_js_file_path(base));
                    styles.extend(package.resolved_css_file_path(base));
                }
                None => {
                    let url = resource.replace(BASE_URL_TOKEN, base);
                    if url.to_ascii_lowercase().ends_with(".css") {
                        styles.push(url);
                    } else {
                        scripts.push(url);
                    }
                }
            }
        }

        for src in scripts {
            out.push_str(&format!("{indent}<script src=\"{src}\"></script>\n"));
        }
        for href in styles {
            out.push_str(&format!("{indent}<link rel=\"stylesheet\" href=\"{href}\" />\n"));
        }
        out
    }
}

impl HelperDef for CdnLinksHelper {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        _: &'reg Handlebars<'reg>,
        _: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let base = h.param(0).and_then(|p| p.value().as_str()).unwrap_or("");
        let indent = h
            .param(1)
            .and_then(|p| p.value().as_str())
            .filter(|s| !s.is_empty())
            .unwrap_or(CDN_INDENT);
        out.write(&self.render(base, indent))?;
        Ok(())
    }
}

/// Register `cdn-links` over `resources`: package names are resolved at
/// render time, anything else is linked as a URL.
pub fn register_cdn_helper(renderer: &HandlebarsRenderer, webpacker: &Webpacker, resources: &[String]) {
    renderer.register_helper(
        "cdn-links",
        Box::new(CdnLinksHelper {
            webpacker: webpacker.clone(),
            resources: resources.to_vec(),
        }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::Renderer;
    use serde_json::json;

    fn setup() -> (HandlebarsRenderer, Webpacker) {
        let webpacker = Webpacker::new();
        let mut pkg = webpacker.create_package(
            Some("/resources/shop/js/client.js"),
            Some("/resources/shop/css/client.css"),
            Some("/resources/shop"),
            false,
        );
        pkg.add_javascript("var a = 1;", "", "a.js").unwrap();
        pkg.add_css("a { color: red; }", "", "a.css").unwrap();
        webpacker.register_package("Shop", pkg).unwrap();

        let renderer = HandlebarsRenderer::default();
        register_package_helpers(&renderer, &webpacker);
        (renderer, webpacker)
    }

    fn render(renderer: &HandlebarsRenderer, template: &str) -> String {
        renderer.register_template("page", template).unwrap();
        renderer.render("ref:page", &json!({"base": "/b"})).unwrap()
    }

    #[test]
    fn test_links_helpers() {
        let (renderer, webpacker) = setup();
        let pkg = webpacker.package("shop").unwrap();

        assert_eq!(render(&renderer, "{{package-links base \"shop\"}}"), pkg.links("/b"));
        assert_eq!(render(&renderer, "{{package-js base \"SHOP\"}}"), pkg.js_links("/b"));
        assert_eq!(render(&renderer, "{{package-css base \"shop\"}}"), pkg.css_links("/b"));
    }

    #[test]
    fn test_static_helper() {
        let (renderer, _) = setup();
        assert_eq!(
            render(&renderer, "{{package-static base \"shop\" \"img/\" \"logo.png\"}}"),
            "/b/resources/shop/img/logo.png"
        );
    }

    #[test]
    fn test_cdn_links() {
        let (renderer, webpacker) = setup();
        let resources = [
            "shop".to_string(),
            "$BASEURL$/lib/vendor.js".to_string(),
            "https://cdn.example.com/site.CSS".to_string(),
        ];
        register_cdn_helper(&renderer, &webpacker, &resources);
        let pkg = webpacker.package("shop").unwrap();
        let js = pkg.resolved_js_file_path("/b").unwrap();
        let css = pkg.resolved_css_file_path("/b").unwrap();

        assert_eq!(
            render(&renderer, "{{cdn-links base}}"),
            format!(
                "<script id='baseConfig' type='application/json'>{{\"baseURLPath\":\"/b\"}}</script>\n    \
                 <script src=\"{js}\"></script>\n    \
                 <script src=\"/b/lib/vendor.js\"></script>\n    \
                 <link rel=\"stylesheet\" href=\"{css}\" />\n    \
                 <link rel=\"stylesheet\" href=\"https://cdn.example.com/site.CSS\" />\n"
            )
        );
        assert!(render(&renderer, "{{cdn-links base \"  \"}}").contains("\n  <script src=\"/b/lib"));
    }

    #[test]
    fn test_cdn_links_without_resources() {
        let (renderer, webpacker) = setup();
        register_cdn_helper(&renderer, &webpacker, &[]);
        assert_eq!(
            render(&renderer, "{{cdn-links}}"),
            "<script id='baseConfig' type='application/json'>{\"baseURLPath\":\"\"}</script>\n"
        );
    }

    #[test]
    fn test_unknown_package_renders_nothing() {
        let (renderer, _) = setup();
        crate::logger::set_quiet(true);
        assert_eq!(render(&renderer, "[{{package-links base \"nope\"}}]"), "[]");
        assert_eq!(render(&renderer, "[{{package-links base}}]"), "[]");
    }
}
