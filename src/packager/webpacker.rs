//! Registry of compressed packages, by name.

use super::package::AssetPackage;
use crate::error::Result;
use crate::http::Router;
use crate::log;
use parking_lot::RwLock;
use std::sync::Arc;

/// Creates packages and keeps the compressed ones for link rendering and
/// routing. Cloning shares the registry.
#[derive(Debug, Clone, Default)]
pub struct Webpacker {
    /// `(lowercase name, package)` in registration order.
    packages: Arc<RwLock<Vec<(String, Arc<AssetPackage>)>>>,
}

impl Webpacker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_package(
        &self,
        js_path: Option<&str>,
        css_path: Option<&str>,
        static_path: Option<&str>,
        debug: bool,
    ) -> AssetPackage {
        AssetPackage::new(js_path, css_path, static_path, debug)
    }

    /// Compress `package` and keep it under `name`. A package already
    /// registered under the same name is replaced in place.
    pub fn register_package(&self, name: &str, package: AssetPackage) -> Result<Arc<AssetPackage>> {
        package.compress()?;
        let key = name.to_lowercase();
        let package = Arc::new(package);

        let mut packages = self.packages.write();
        match packages.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = Arc::clone(&package),
            None => packages.push((key, Arc::clone(&package))),
        }
        log!("package"; "registered package [{}]", name);
        Ok(package)
    }

    pub fn package(&self, name: &str) -> Option<Arc<AssetPackage>> {
        let key = name.to_lowercase();
        self.packages
            .read()
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, p)| Arc::clone(p))
    }

    pub fn packages(&self) -> Vec<(String, Arc<AssetPackage>)> {
        self.packages.read().clone()
    }

    pub fn len(&self) -> usize {
        self.packages.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.read().is_empty()
    }

    /// Script and stylesheet tags for a registered package.
    pub fn links_for(&self, name: &str, base_url_path: &str) -> Option<String> {
        self.package(name).map(|p| p.links(base_url_path))
    }

    pub fn register_routes(&self, router: &mut Router) -> Result<()> {
        for (_, package) in self.packages.read().iter() {
            package.register_routes(router)?;
        }
        Ok(())
    }
}
