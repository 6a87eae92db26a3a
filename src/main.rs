//! Packline - asset transformation and bundling pipeline for browser applications.

mod asset;
mod cli;
mod config;
mod core;
mod embed;
mod env;
mod graph;
mod logger;
mod naming;
mod report;
mod rules;
mod stage;
mod transform;
mod utils;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};
use config::PipelineConfig;

fn main() -> Result<()> {
    // Setup global Ctrl+C handler (before any blocking operations)
    core::setup_shutdown_handler()?;

    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }

    let config = PipelineConfig::load(&cli)?;

    match &cli.command {
        Commands::Build { .. } => {
            // The only read of the process environment.
            let raw_env = env::capture();
            cli::build::build_app(&config, &raw_env).map(|_| ())
        }
        Commands::Rules { paths } => cli::rules::run_rules(&config, paths),
    }
}
