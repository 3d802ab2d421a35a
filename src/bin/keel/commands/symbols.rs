//! `keel symbols` command

use anyhow::{Context, Result};

use crate::cli::SymbolsArgs;
use keel::ops::symbols::{format_symbols, symbols, SymbolsOptions};
use keel::util::GlobalContext;

pub fn execute(args: SymbolsArgs, ctx: &GlobalContext) -> Result<()> {
    let opts = SymbolsOptions {
        inputs: args.inputs,
        duplicates_only: args.duplicates,
    };
    let entries = symbols(ctx, &opts)?;

    if args.json {
        let json =
            serde_json::to_string_pretty(&entries).context("failed to serialize symbols")?;
        println!("{}", json);
    } else {
        print!("{}", format_symbols(&entries));
    }

    if ctx.is_verbose() {
        let duplicated = entries.iter().filter(|e| !e.duplicates.is_empty()).count();
        tracing::info!("{} symbol(s), {} defined more than once", entries.len(), duplicated);
    }

    Ok(())
}
