//! keel CLI - pack, inspect and unpack installer intermediates and libraries

use std::io::{self, IsTerminal};

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};
use keel::util::GlobalContext;

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    // Parse CLI
    let cli = Cli::parse();

    let color = !cli.no_color && io::stderr().is_terminal();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("keel=debug")
    } else {
        EnvFilter::new("keel=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_ansi(color)
        .with_writer(std::io::stderr)
        .init();

    let verbose = cli.verbose;
    let context = || -> Result<GlobalContext> {
        let mut ctx = GlobalContext::new()?;
        ctx.set_verbose(verbose);
        ctx.set_color(color);
        Ok(ctx)
    };

    // Execute command
    match cli.command {
        Commands::Lib(args) => commands::lib::execute(args, &context()?),
        Commands::Inspect(args) => commands::inspect::execute(args, &context()?),
        Commands::Extract(args) => commands::extract::execute(args, &context()?),
        Commands::Symbols(args) => commands::symbols::execute(args, &context()?),
        Commands::Completions(args) => commands::completions::execute(args),
    }
}
