//! Webpacker - a web application framework around a fingerprinting
//! JavaScript/CSS packager with merged source maps.
//!
//! ```ignore
//! use webpacker::app::{App, AppConfig};
//!
//! let config = AppConfig::new("shop")
//!     .module_dir("modules/ui")
//!     .template_path("templates")
//!     .default_package(|p| p.javascript("js", "shop", true).package("ui/*"));
//! App::build(config, settings, context)?.run()?;
//! ```

pub mod logger;

pub mod app;
pub mod cli;
pub mod config;
mod embed;
pub mod error;
pub mod http;
pub mod packager;
pub mod templates;
pub mod utils;
