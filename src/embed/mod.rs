//! Embedded client scripts.
//!
//! Both scripts are minified by `build.rs` and injected into packages as
//! inline JavaScript fragments.
//!
//! # Usage
//!
//! ```ignore
//! use embed::client::{LOADER_SETUP_JS, LoaderSetupVars};
//!
//! let js = LOADER_SETUP_JS.render(&LoaderSetupVars {
//!     config: r#"{"paths":{}}"#.to_string(),
//!     entry_points: r#"["app/init"]"#.to_string(),
//! });
//! ```

mod template;

pub use template::{Template, TemplateVars};

pub mod client {
    use super::{Template, TemplateVars};

    /// Token replaced client-side with the page's base URL path.
    pub const BASE_URL_TOKEN: &str = "$BASEURL$";

    /// Defines the `templates/lookup` AMD module (no variables).
    pub const TEMPLATE_LOOKUP_JS: &str =
        include_str!(concat!(env!("OUT_DIR"), "/template-lookup.min.js"));

    /// Variables for the loader setup script.
    pub struct LoaderSetupVars {
        /// JSON object passed to `require.config`.
        pub config: String,
        /// JSON array of modules to require on load, or `null`.
        pub entry_points: String,
    }

    impl TemplateVars for LoaderSetupVars {
        fn apply(&self, content: &str) -> String {
            content
                .replace("__LOADER_CONFIG__", &self.config)
                .replace("__ENTRY_POINTS__", &self.entry_points)
        }
    }

    /// Loader setup script, inserted as `setup.js` into packages that ask for it.
    pub const LOADER_SETUP_JS: Template<LoaderSetupVars> =
        Template::new(include_str!(concat!(env!("OUT_DIR"), "/loader-setup.min.js")));
}
