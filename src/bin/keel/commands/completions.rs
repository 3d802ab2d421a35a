//! `keel completions` command

use std::io;

use anyhow::{Context, Result};
use clap::CommandFactory;
use clap_complete::generate;

use crate::cli::{Cli, CompletionsArgs};
use keel::util::fs::write_atomic;

pub fn execute(args: CompletionsArgs) -> Result<()> {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();

    match args.output {
        Some(path) => {
            write_atomic(&path, |out| {
                generate(args.shell, &mut cmd, name, out);
                Ok(())
            })
            .with_context(|| format!("failed to write completions to {}", path.display()))?;
            eprintln!("     Wrote {} completions -> {}", args.shell, path.display());
        }
        None => generate(args.shell, &mut cmd, name, &mut io::stdout()),
    }

    Ok(())
}
