//! Moor CLI - snapshot exporter and round-trip verifier

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    // Parse CLI
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("moor=debug")
    } else {
        EnvFilter::new("moor=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    // Execute command
    match cli.command {
        Commands::Export(args) => commands::export::execute(args, !cli.no_color),
        Commands::Validate(args) => commands::validate::execute(args),
        Commands::Verify(args) => commands::verify::execute(args, cli.verbose, !cli.no_color),
        Commands::Completions(args) => commands::completions::execute(args),
    }
}
