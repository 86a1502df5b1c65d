//! Webpacker - serve an application's packages, templates and static files.

use anyhow::Result;
use clap::{ColorChoice, Parser};
use webpacker::app::{App, AppConfig};
use webpacker::cli::Cli;
use webpacker::config::ConfigLoader;
use webpacker::http::server::setup_shutdown_handler;
use webpacker::log;
use webpacker::packager::ModuleSpec;

fn main() {
    if let Err(e) = run() {
        log!("error"; "{:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    // Setup global Ctrl+C handler (before any blocking operations)
    setup_shutdown_handler()?;

    let cli = Cli::parse();

    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {}
    }

    let loader = ConfigLoader::new(&cli.config_dir, cli.environment.as_deref());
    let loaded = loader.load(false)?;
    let mut settings = loaded.settings.clone();
    settings.apply_cli(&cli, loader.environment());
    webpacker::logger::set_verbose(settings.verbose);

    let mut config = AppConfig::new(&cli.name);
    let mut references = Vec::with_capacity(cli.modules.len());
    for dir in &cli.modules {
        let spec = ModuleSpec::read(dir)?;
        references.push(format!("{}/*", spec.name));
        config = config.module(spec, dir);
    }
    if let Some(templates) = &cli.templates {
        config = config.template_path(templates);
    }
    let config = config.default_package(|mut package| {
        for reference in &references {
            package = package.package(reference);
        }
        package
    });

    App::build(config, settings, loaded.context())?.run()
}
