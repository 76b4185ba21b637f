//! Samplecraft CLI
//!
//! Command-line front end for the samplecraft sample editor.

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use log::info;

use samplecraft::cli::{commands, Cli, Commands};
use samplecraft::EditorConfig;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logger
    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_level)).init();

    info!("Samplecraft v{}", env!("CARGO_PKG_VERSION"));

    let config = match &cli.config {
        Some(path) => EditorConfig::load(path)
            .with_context(|| format!("could not load config {}", path.display()))?,
        None => EditorConfig::default(),
    };

    match cli.command {
        Some(cmd) => handle_command(cmd, config),
        None => {
            println!("Samplecraft v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(())
        }
    }
}

fn handle_command(cmd: Commands, config: EditorConfig) -> Result<()> {
    match cmd {
        Commands::Info { input } => commands::show_info(&input),
        Commands::Edit {
            input,
            output,
            edit,
        } => commands::edit_file(&input, &output, &edit, config),
        Commands::Batch { dir, out_dir, edit } => commands::batch(&dir, &out_dir, &edit, config),
    }
}
