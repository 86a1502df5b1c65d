//! Command-line interface definitions.

use clap::{ColorChoice, Parser};
use std::net::IpAddr;
use std::path::PathBuf;

/// Web application server with fingerprinted, source-mapped asset packages
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, default_value = "auto")]
    pub color: ColorChoice,

    /// Port number to listen on (overrides `port` in the config file)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Network interface to bind (e.g., 127.0.0.1, 0.0.0.0)
    #[arg(short, long)]
    pub interface: Option<IpAddr>,

    /// Config environment; defaults to $ENVIRONMENT, then `dev`
    #[arg(short, long)]
    pub environment: Option<String>,

    /// Serve non-minified packages
    #[arg(short, long)]
    pub debug: bool,

    /// Enable verbose output for debugging
    #[arg(short, long)]
    pub verbose: bool,

    /// Directory holding the `config.*.toml` files
    #[arg(short = 'C', long, default_value = ".", value_hint = clap::ValueHint::DirPath)]
    pub config_dir: PathBuf,

    /// Application name; its package is served under `/resources/<name>/`
    #[arg(short, long, default_value = "app")]
    pub name: String,

    /// Directory of server-side templates
    #[arg(short, long, value_hint = clap::ValueHint::DirPath)]
    pub templates: Option<PathBuf>,

    /// Module directories (each with a `module.toml`) to load
    #[arg(short, long = "module", value_hint = clap::ValueHint::DirPath)]
    pub modules: Vec<PathBuf>,
}
