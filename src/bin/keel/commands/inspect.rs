//! `keel inspect` command

use anyhow::Result;

use crate::cli::InspectArgs;
use keel::ops::inspect::{format_report, format_report_json, inspect};
use keel::util::GlobalContext;

pub fn execute(args: InspectArgs, ctx: &GlobalContext) -> Result<()> {
    let report = inspect(ctx, &args.path, &args.cultures)?;

    if args.json {
        println!("{}", format_report_json(&report)?);
    } else {
        print!("{}", format_report(&report));
    }

    Ok(())
}
