//! `keel lib` command

use anyhow::Result;

use crate::cli::LibArgs;
use keel::ops::pack::{pack, PackOptions};
use keel::util::diagnostic::{emit, Messages};
use keel::util::GlobalContext;

pub fn execute(args: LibArgs, ctx: &GlobalContext) -> Result<()> {
    let opts = PackOptions {
        inputs: args.inputs,
        localizations: args.localizations,
        output: args.output,
        bind_paths: args.bind_paths,
        no_payloads: args.no_payloads,
        suppress_version_check: args.suppress_version_check,
        compression: args.compression,
    };

    let mut messages = Messages::new().with_warnings_as_errors(args.warnings_as_errors);
    let result = pack(ctx, &opts, &mut messages);

    // Report everything collected, whether or not the pack succeeded
    for diagnostic in messages.diagnostics() {
        emit(diagnostic, ctx.color());
    }
    let result = result?;

    eprintln!(
        "      Packed {} section(s), {} culture(s), {} payload(s) -> {}",
        result.sections,
        result.cultures.len(),
        result.payloads.len(),
        result.output.display()
    );

    Ok(())
}
