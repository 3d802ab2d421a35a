//! `keel extract` command

use anyhow::Result;

use crate::cli::ExtractArgs;
use keel::ops::extract::extract;
use keel::util::GlobalContext;

pub fn execute(args: ExtractArgs, ctx: &GlobalContext) -> Result<()> {
    let extracted = extract(ctx, &args.library, &args.out)?;

    for payload in &extracted {
        eprintln!(
            "   Extracted {} `{}` -> {}",
            payload.entry.index,
            payload.entry.name,
            payload.path.display()
        );
    }
    if extracted.is_empty() {
        eprintln!("   Extracted nothing: {} has no payloads", args.library.display());
    }

    Ok(())
}
