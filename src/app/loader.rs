//! Client loader configuration: where each package's script lives and which
//! bundles it provides, handed to the AMD loader by the generated `setup.js`.

use crate::embed::client::{BASE_URL_TOKEN, LOADER_SETUP_JS, LoaderSetupVars};
use crate::packager::{Modules, PackageDescriptor};
use serde::Serialize;
use std::collections::BTreeMap;

/// Basename of the generated setup fragment.
pub const SETUP_BASENAME: &str = "setup.js";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoaderConfig {
    /// Package reference to the bundle references it provides.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub bundles: BTreeMap<String, Vec<String>>,
    /// Package reference to its script path, without `.js`. Paths start
    /// with the base URL token, substituted in the browser.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub paths: BTreeMap<String, String>,
}

impl LoaderConfig {
    pub fn from_descriptors<'a>(
        descriptors: impl IntoIterator<Item = &'a PackageDescriptor>,
        modules: &Modules,
    ) -> Self {
        let mut config = Self::default();
        for descriptor in descriptors {
            let reference = descriptor.reference().to_lowercase();
            if reference.is_empty() {
                continue;
            }
            let bundles = descriptor.all_bundle_references(modules);
            if !bundles.is_empty() {
                config.bundles.insert(reference.clone(), bundles);
            }
            if descriptor.contains_js(modules) {
                config.paths.insert(reference, strip_js(&descriptor.js_path(BASE_URL_TOKEN)));
            }
        }
        config
    }

    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty() && self.paths.is_empty()
    }

    /// Setup script configuring the loader, then requiring `entry_points`.
    pub fn setup_script(&self, entry_points: Option<&[String]>) -> serde_json::Result<String> {
        let entry_points = match entry_points {
            Some(points) if !points.is_empty() => serde_json::to_string(points)?,
            _ => "null".to_string(),
        };
        Ok(LOADER_SETUP_JS.render(&LoaderSetupVars {
            config: serde_json::to_string(self)?,
            entry_points,
        }))
    }
}

fn strip_js(path: &str) -> String {
    let cut = path.len().saturating_sub(3);
    match path.get(cut..) {
        Some(ext) if ext.eq_ignore_ascii_case(".js") => path[..cut].to_string(),
        _ => path.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_descriptors() {
        let modules = Modules::new();
        let descriptors = [
            PackageDescriptor::builder("Shop")
                .raw_javascript("var a;", "", "a.js")
                .bundle(&["jquery", "lodash"])
                .build(),
            PackageDescriptor::builder("styles")
                .raw_css("a{}", "", "a.css")
                .build(),
        ];
        let config = LoaderConfig::from_descriptors(&descriptors, &modules);
        assert_eq!(config.bundles["shop"], ["jquery", "lodash"]);
        assert_eq!(config.paths["shop"], "$BASEURL$/resources/shop/js/client");
        assert!(!config.paths.contains_key("styles"));
        assert!(!config.bundles.contains_key("styles"));
    }

    #[test]
    fn test_strip_js() {
        assert_eq!(strip_js("/a/client.JS"), "/a/client");
        assert_eq!(strip_js("/a/client.mjs.css"), "/a/client.mjs.css");
        assert_eq!(strip_js("js"), "js");
    }

    #[test]
    fn test_setup_script() {
        let mut config = LoaderConfig::default();
        config.paths.insert("shop".to_string(), "$BASEURL$/shop".to_string());

        let js = config.setup_script(Some(&["shop/init".to_string()])).unwrap();
        assert!(js.contains("\"shop/init\""));
        assert!(js.contains("$BASEURL$/shop"));

        let js = config.setup_script(None).unwrap();
        assert!(!js.contains("__ENTRY_POINTS__"));
        assert!(js.contains("null"));
    }
}
