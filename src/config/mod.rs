//! Environment-driven configuration.
//!
//! Files are looked up in the config directory:
//!
//! ```text
//! config.local.toml        # used instead of the environment file when present
//! config.<env>.toml        # required otherwise
//! config.secret.toml       # optional, merged over the above key by key
//! ```
//!
//! # Example
//!
//! ```toml
//! port = 8082
//! interface = "0.0.0.0"
//! debug = false
//!
//! [base_url_path]
//! "shop.example.com" = "/shop"
//! "*" = ""
//! ```
//!
//! Every value, known or not, is also handed to the template renderer as
//! context for `__path.to.value__` placeholders.

mod error;

pub use error::ConfigError;

use crate::cli::Cli;
use crate::http::base_url::BaseUrlLookup;
use crate::log;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use toml::{Table, Value};

/// Environment used when neither `-e` nor `$ENVIRONMENT` is given.
pub const DEFAULT_ENVIRONMENT: &str = "dev";

/// Typed view over the merged configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub port: u16,
    pub environment: Option<String>,
    pub debug: bool,
    pub verbose: bool,
    pub interface: IpAddr,
    /// Host (or `*`) to base URL path.
    pub base_url_path: BTreeMap<String, String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: 8082,
            environment: None,
            debug: false,
            verbose: false,
            interface: IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            base_url_path: BTreeMap::new(),
        }
    }
}

impl Settings {
    /// Process arguments win over file values. The `debug` environment
    /// implies debug mode.
    pub fn apply_cli(&mut self, cli: &Cli, environment: &str) {
        if let Some(port) = cli.port {
            self.port = port;
        }
        if let Some(interface) = cli.interface {
            self.interface = interface;
        }
        self.environment = Some(environment.to_string());
        self.debug = self.debug || cli.debug || environment.eq_ignore_ascii_case("debug");
        self.verbose = self.verbose || cli.verbose;
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::Validation("port must be non-zero".to_string()));
        }
        for (host, path) in &self.base_url_path {
            if !path.is_empty() && (!path.starts_with('/') || path.ends_with('/')) {
                return Err(ConfigError::Validation(format!(
                    "base_url_path for [{host}] must start with '/' and not end with one, got [{path}]"
                )));
            }
        }
        Ok(())
    }

    pub fn base_url_lookup(&self) -> BaseUrlLookup {
        self.base_url_path
            .iter()
            .map(|(host, path)| (host.clone(), path.clone()))
            .collect()
    }
}

/// The merged files: typed settings plus every raw value.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub settings: Settings,
    pub values: Table,
    /// Environment (or `local`) file the values came from.
    pub source: PathBuf,
}

impl LoadedConfig {
    /// Raw values as JSON, for the renderer context.
    pub fn context(&self) -> serde_json::Value {
        serde_json::to_value(&self.values).unwrap_or(serde_json::Value::Null)
    }
}

#[derive(Debug, Clone)]
pub struct ConfigLoader {
    directory: PathBuf,
    environment: String,
}

impl ConfigLoader {
    pub fn new(directory: impl Into<PathBuf>, environment: Option<&str>) -> Self {
        Self {
            directory: directory.into(),
            environment: resolve_environment(environment),
        }
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn load(&self, skip_secrets: bool) -> Result<LoadedConfig, ConfigError> {
        let (source, mut values) = match self.try_load("config.local.toml")? {
            Some(found) => {
                log!("config"; "loading config file for environment [local]");
                found
            }
            None => {
                let name = format!("config.{}.toml", self.environment);
                let found = self
                    .try_load(&name)?
                    .ok_or_else(|| ConfigError::NotFound(self.environment.clone()))?;
                log!("config"; "loading config file for environment [{}]", self.environment);
                found
            }
        };

        if !skip_secrets && let Some((_, secrets)) = self.try_load("config.secret.toml")? {
            log!("config"; "loaded secrets config file");
            merge_tables(&mut values, secrets);
        }

        let settings: Settings = Value::Table(values.clone())
            .try_into()
            .map_err(|e| ConfigError::Toml(source.clone(), e))?;
        settings.validate()?;

        Ok(LoadedConfig {
            settings,
            values,
            source,
        })
    }

    /// `None` when the file does not exist.
    fn try_load(&self, name: &str) -> Result<Option<(PathBuf, Table)>, ConfigError> {
        let path = self.directory.join(name);
        if !path.is_file() {
            return Ok(None);
        }
        let table = read_table(&path)?;
        Ok(Some((path, table)))
    }
}

fn read_table(path: &Path) -> Result<Table, ConfigError> {
    let content =
        fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
    toml::from_str(&content).map_err(|err| ConfigError::Toml(path.to_path_buf(), err))
}

/// Explicit value, then `$ENVIRONMENT`, then [`DEFAULT_ENVIRONMENT`].
pub fn resolve_environment(explicit: Option<&str>) -> String {
    explicit
        .map(str::to_string)
        .or_else(|| std::env::var("ENVIRONMENT").ok())
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string())
}

/// Merge `source` into `dest`. Tables present on both sides merge
/// recursively, anything else from `source` replaces `dest`.
pub fn merge_tables(dest: &mut Table, source: Table) {
    for (key, value) in source {
        match (dest.get_mut(&key), value) {
            (Some(Value::Table(ours)), Value::Table(theirs)) => merge_tables(ours, theirs),
            (_, value) => {
                dest.insert(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) {
        fs::write(dir.path().join(name), content).unwrap();
    }

    #[test]
    fn test_merge_tables() {
        let mut dest: Table = toml::from_str("a = 1\n[db]\nhost = 'x'\nport = 1").unwrap();
        let source: Table = toml::from_str("b = 2\n[db]\nport = 2\npassword = 's'").unwrap();
        merge_tables(&mut dest, source);
        assert_eq!(dest["a"].as_integer(), Some(1));
        assert_eq!(dest["b"].as_integer(), Some(2));
        assert_eq!(dest["db"]["host"].as_str(), Some("x"));
        assert_eq!(dest["db"]["port"].as_integer(), Some(2));
        assert_eq!(dest["db"]["password"].as_str(), Some("s"));
    }

    #[test]
    fn test_merge_replaces_non_tables() {
        let mut dest: Table = toml::from_str("[db]\nhost = 'x'").unwrap();
        let source: Table = toml::from_str("db = 'flat'").unwrap();
        merge_tables(&mut dest, source);
        assert_eq!(dest["db"].as_str(), Some("flat"));
    }

    #[test]
    fn test_local_wins_over_environment() {
        let dir = TempDir::new().unwrap();
        write(&dir, "config.dev.toml", "port = 9000");
        write(&dir, "config.local.toml", "port = 9100");
        let loaded = ConfigLoader::new(dir.path(), Some("dev")).load(true).unwrap();
        assert_eq!(loaded.settings.port, 9100);
        assert!(loaded.source.ends_with("config.local.toml"));
    }

    #[test]
    fn test_secrets_merge_over_environment() {
        let dir = TempDir::new().unwrap();
        write(&dir, "config.prod.toml", "port = 9000\n[api]\nurl = 'https://x'\nkey = 'none'");
        write(&dir, "config.secret.toml", "[api]\nkey = 'secret'");

        let loaded = ConfigLoader::new(dir.path(), Some("prod")).load(false).unwrap();
        assert_eq!(loaded.settings.port, 9000);
        assert_eq!(loaded.values["api"]["url"].as_str(), Some("https://x"));
        assert_eq!(loaded.values["api"]["key"].as_str(), Some("secret"));
        assert_eq!(loaded.context()["api"]["key"], "secret");

        let skipped = ConfigLoader::new(dir.path(), Some("prod")).load(true).unwrap();
        assert_eq!(skipped.values["api"]["key"].as_str(), Some("none"));
    }

    #[test]
    fn test_missing_environment_file() {
        let dir = TempDir::new().unwrap();
        let err = ConfigLoader::new(dir.path(), Some("staging")).load(false).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(env) if env == "staging"));
    }

    #[test]
    fn test_parse_error_is_reported() {
        let dir = TempDir::new().unwrap();
        write(&dir, "config.dev.toml", "port = ");
        let err = ConfigLoader::new(dir.path(), Some("dev")).load(false).unwrap_err();
        assert!(matches!(err, ConfigError::Toml(..)));
    }

    #[test]
    fn test_validation() {
        let dir = TempDir::new().unwrap();
        write(&dir, "config.dev.toml", "[base_url_path]\n'*' = 'shop/'");
        let err = ConfigLoader::new(dir.path(), Some("dev")).load(false).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_apply_cli() {
        let mut settings = Settings::default();
        let cli = Cli::parse_from(["webpacker", "-p", "9999", "-v"]);
        settings.apply_cli(&cli, "debug");
        assert_eq!(settings.port, 9999);
        assert!(settings.verbose);
        assert!(settings.debug);
        assert_eq!(settings.environment.as_deref(), Some("debug"));
    }

    #[test]
    fn test_base_url_lookup() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "config.dev.toml",
            "[base_url_path]\n'shop.example.com' = '/shop'\n'*' = '/all'",
        );
        let loaded = ConfigLoader::new(dir.path(), Some("dev")).load(false).unwrap();
        let lookup = loaded.settings.base_url_lookup();
        assert_eq!(lookup.for_host(Some("SHOP.example.com")), "/shop");
        assert_eq!(lookup.for_host(Some("other")), "/all");
    }
}
