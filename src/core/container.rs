//! The library container: a gzip-compressed tar archive.
//!
//! Entries, in this order:
//!
//! | entry            | content                                         |
//! |------------------|-------------------------------------------------|
//! | `keel.format`    | the format marker, `keel-library/4`             |
//! | `library.xml`    | the library document                            |
//! | `payloads.json`  | one [`PayloadEntry`] per embedded payload       |
//! | `payloads/<n>`   | payload `n`, in embedded-index order            |
//!
//! The marker comes first so a foreign file is rejected before anything else
//! is read.

use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use tar::{Archive, Builder, Entries, Header};

use crate::core::errors::{IrError, Result};
use crate::util::fs::ensure_dir;
use crate::util::hash::{sha256_bytes, sha256_file};

pub const FORMAT_ENTRY: &str = "keel.format";
pub const FORMAT_MARKER: &str = "keel-library/4";
pub const DOCUMENT_ENTRY: &str = "library.xml";
pub const MANIFEST_ENTRY: &str = "payloads.json";
const PAYLOAD_PREFIX: &str = "payloads/";

/// Manifest record of one embedded payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadEntry {
    pub index: usize,
    /// File name the payload was resolved from.
    pub name: String,
    pub size: u64,
    pub sha256: String,
}

/// The document and payload manifest of a container.
#[derive(Debug, Clone)]
pub struct ContainerContents {
    pub document: String,
    pub payloads: Vec<PayloadEntry>,
}

fn header(size: u64) -> Header {
    let mut header = Header::new_gnu();
    header.set_size(size);
    header.set_mode(0o644);
    header.set_mtime(0);
    header
}

fn append_bytes<W: Write>(builder: &mut Builder<W>, name: &str, data: &[u8]) -> io::Result<()> {
    builder.append_data(&mut header(data.len() as u64), name, data)
}

/// Write a container holding `document` and the files in `payloads`, the
/// n-th file becoming payload `n`.
pub fn write_container<W: Write>(
    out: W,
    document: &str,
    payloads: &[PathBuf],
    compression: Compression,
) -> io::Result<Vec<PayloadEntry>> {
    let mut manifest = Vec::with_capacity(payloads.len());
    for (index, path) in payloads.iter().enumerate() {
        let (sha256, size) = sha256_file(path)
            .map_err(|e| io::Error::new(e.kind(), format!("{}: {}", path.display(), e)))?;
        manifest.push(PayloadEntry {
            index,
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            size,
            sha256,
        });
    }
    let manifest_json = serde_json::to_vec_pretty(&manifest)?;

    let mut builder = Builder::new(GzEncoder::new(out, compression));
    append_bytes(&mut builder, FORMAT_ENTRY, FORMAT_MARKER.as_bytes())?;
    append_bytes(&mut builder, DOCUMENT_ENTRY, document.as_bytes())?;
    append_bytes(&mut builder, MANIFEST_ENTRY, &manifest_json)?;

    for (entry, path) in manifest.iter().zip(payloads) {
        let file = File::open(path)?;
        builder.append_data(
            &mut header(entry.size),
            format!("{}{}", PAYLOAD_PREFIX, entry.index),
            BufReader::new(file),
        )?;
    }

    builder.into_inner()?.finish()?;
    Ok(manifest)
}

fn not_a_library(location: &Path, reason: impl fmt::Display) -> IrError {
    IrError::NotALibrary {
        location: location.display().to_string(),
        reason: reason.to_string(),
    }
}

fn next_text_entry<R: Read>(
    entries: &mut Entries<'_, R>,
    expected: &str,
    location: &Path,
) -> Result<String> {
    let mut entry = entries
        .next()
        .ok_or_else(|| not_a_library(location, format!("missing `{}`", expected)))?
        .map_err(|e| not_a_library(location, e))?;

    let name = entry
        .path()
        .map_err(|e| not_a_library(location, e))?
        .to_string_lossy()
        .into_owned();
    if name != expected {
        return Err(not_a_library(
            location,
            format!("expected entry `{}`, found `{}`", expected, name),
        ));
    }

    let mut text = String::new();
    entry
        .read_to_string(&mut text)
        .map_err(|e| not_a_library(location, e))?;
    Ok(text)
}

fn read_leading_entries<R: Read>(
    entries: &mut Entries<'_, R>,
    location: &Path,
) -> Result<ContainerContents> {
    let marker = next_text_entry(entries, FORMAT_ENTRY, location)?;
    if marker.trim() != FORMAT_MARKER {
        return Err(not_a_library(
            location,
            format!("unknown format marker `{}`", marker.trim()),
        ));
    }

    let document = next_text_entry(entries, DOCUMENT_ENTRY, location)?;
    let manifest = next_text_entry(entries, MANIFEST_ENTRY, location)?;
    let payloads: Vec<PayloadEntry> = serde_json::from_str(&manifest)
        .map_err(|e| not_a_library(location, format!("bad payload manifest: {}", e)))?;

    Ok(ContainerContents { document, payloads })
}

/// Read the document and manifest. Payload bytes are not touched.
pub fn read_container<R: Read>(reader: R, location: &Path) -> Result<ContainerContents> {
    let mut archive = Archive::new(GzDecoder::new(reader));
    let mut entries = archive
        .entries()
        .map_err(|e| not_a_library(location, e))?;
    read_leading_entries(&mut entries, location)
}

/// Write every payload to `dest/<index>` after checking its size and
/// checksum against the manifest. Returns the written paths in index order.
pub fn extract_payloads<R: Read>(reader: R, location: &Path, dest: &Path) -> Result<Vec<PathBuf>> {
    let mut archive = Archive::new(GzDecoder::new(reader));
    let mut entries = archive
        .entries()
        .map_err(|e| not_a_library(location, e))?;
    let contents = read_leading_entries(&mut entries, location)?;

    ensure_dir(dest)?;
    let mut extracted = Vec::with_capacity(contents.payloads.len());

    for entry in entries {
        let mut entry = entry.map_err(|e| not_a_library(location, e))?;
        let name = entry
            .path()
            .map_err(|e| not_a_library(location, e))?
            .to_string_lossy()
            .into_owned();

        let expected = name
            .strip_prefix(PAYLOAD_PREFIX)
            .and_then(|i| i.parse::<usize>().ok())
            .and_then(|i| contents.payloads.get(i))
            .ok_or_else(|| not_a_library(location, format!("unexpected entry `{}`", name)))?;

        let corrupt = || {
            not_a_library(
                location,
                format!("payload {} (`{}`) is corrupt", expected.index, expected.name),
            )
        };
        if entry.header().size().ok() != Some(expected.size) {
            return Err(corrupt());
        }

        let mut data = Vec::new();
        entry
            .read_to_end(&mut data)
            .map_err(|e| not_a_library(location, e))?;
        if data.len() as u64 != expected.size || sha256_bytes(&data) != expected.sha256 {
            return Err(corrupt());
        }

        let out = dest.join(expected.index.to_string());
        fs::write(&out, &data).map_err(|e| IrError::io(&out, e))?;
        tracing::debug!("extracted payload {} to {}", expected.index, out.display());
        extracted.push(out);
    }

    if extracted.len() != contents.payloads.len() {
        return Err(not_a_library(
            location,
            format!(
                "manifest lists {} payload(s) but the archive holds {}",
                contents.payloads.len(),
                extracted.len()
            ),
        ));
    }

    Ok(extracted)
}
