//! Implementation of `keel extract`: unpack the payloads of a library.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::core::container::PayloadEntry;
use crate::core::library::Library;
use crate::util::context::GlobalContext;

/// One payload written to disk.
#[derive(Debug, Clone)]
pub struct ExtractedPayload {
    pub entry: PayloadEntry,
    pub path: PathBuf,
}

/// Extract every payload of `library` into `dest`.
///
/// Payload `n` lands at `dest/<n>`, matching the embedded index recorded on
/// the field that references it. Sizes and checksums are verified first.
pub fn extract(ctx: &GlobalContext, library: &Path, dest: &Path) -> Result<Vec<ExtractedPayload>> {
    let library = ctx.resolve(library);
    let dest = ctx.resolve(dest);

    let manifest = Library::payload_manifest(&library)
        .with_context(|| format!("failed to read {}", library.display()))?;
    let paths = Library::extract_payloads(&library, &dest).with_context(|| {
        format!(
            "failed to extract payloads of {} to {}",
            library.display(),
            dest.display()
        )
    })?;

    Ok(manifest
        .into_iter()
        .zip(paths)
        .map(|(entry, path)| ExtractedPayload { entry, path })
        .collect())
}
