//! Libraries: sections, merged localizations and embedded payloads packed
//! into one container (see [`crate::core::container`]).
//!
//! The container's document has the intermediate's shape plus
//! `Localization` children of the root:
//!
//! ```xml
//! <library xmlns="urn:keel:library" version="4.0.0.0">
//!   <Localization xmlns="urn:keel:localization" Culture="en-us">...</Localization>
//!   <section id="MyProduct" type="product">...</section>
//! </library>
//! ```

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};

use flate2::Compression;

use crate::core::container::{self, PayloadEntry};
use crate::core::errors::{DocumentKind, IrError, Result};
use crate::core::intermediate::check_version;
use crate::core::localization::{Localization, LOCALIZATION_ROOT};
use crate::core::section::Section;
use crate::core::table_definition::TableDefinitionCollection;
use crate::util::diagnostic::{suggestions, Diagnostic, DiagnosticSink};
use crate::util::fs::write_atomic;
use crate::util::version::FormatVersion;
use crate::util::xml::{parse_document, ReadContext, XmlWriter};

/// Namespace of library documents.
pub const LIBRARY_NAMESPACE: &str = "urn:keel:library";

/// Root element of library documents.
pub const LIBRARY_ROOT: &str = "library";

/// Maps an object field's reference to the file to embed.
///
/// `location` is the source line of the row, `table` its table name.
pub trait BinaryResolver {
    fn resolve(&self, location: Option<&str>, table: &str, reference: &str) -> Option<PathBuf>;
}

impl<F> BinaryResolver for F
where
    F: Fn(Option<&str>, &str, &str) -> Option<PathBuf>,
{
    fn resolve(&self, location: Option<&str>, table: &str, reference: &str) -> Option<PathBuf> {
        self(location, table, reference)
    }
}

/// Resolves references against a list of bind paths.
///
/// Absolute references are used as they are. Relative ones are tried under
/// each bind path in order and the first existing file wins.
#[derive(Debug, Clone, Default)]
pub struct SearchPathResolver {
    bind_paths: Vec<PathBuf>,
}

impl SearchPathResolver {
    pub fn new<P: Into<PathBuf>>(bind_paths: impl IntoIterator<Item = P>) -> Self {
        SearchPathResolver {
            bind_paths: bind_paths.into_iter().map(Into::into).collect(),
        }
    }

    pub fn bind_paths(&self) -> &[PathBuf] {
        &self.bind_paths
    }
}

impl BinaryResolver for SearchPathResolver {
    fn resolve(&self, _location: Option<&str>, table: &str, reference: &str) -> Option<PathBuf> {
        let reference = Path::new(reference);
        if reference.is_absolute() {
            return reference.is_file().then(|| reference.to_path_buf());
        }

        let found = self
            .bind_paths
            .iter()
            .map(|dir| dir.join(reference))
            .find(|candidate| candidate.is_file());
        tracing::debug!(
            "resolved `{}` for table `{}`: {:?}",
            reference.display(),
            table,
            found
        );
        found
    }
}

/// Sections plus at most one localization per culture.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Library {
    sections: Vec<Section>,
    localizations: BTreeMap<String, Localization>,
}

impl Library {
    /// Version written into every saved library.
    pub const VERSION: FormatVersion = FormatVersion::CURRENT;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_sections(sections: impl IntoIterator<Item = Section>) -> Self {
        Library {
            sections: sections.into_iter().collect(),
            localizations: BTreeMap::new(),
        }
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn sections_mut(&mut self) -> &mut Vec<Section> {
        &mut self.sections
    }

    pub fn add_section(&mut self, section: Section) {
        self.sections.push(section);
    }

    /// Add a localization, merging it into the one already held for its
    /// culture if there is one.
    pub fn add_localization(&mut self, localization: Localization) -> Result<()> {
        let culture = localization.culture().to_lowercase();
        match self.localizations.get_mut(&culture) {
            Some(existing) => existing.merge(&localization),
            None => {
                self.localizations.insert(culture, localization);
                Ok(())
            }
        }
    }

    /// The localization for one culture; lookup ignores case.
    pub fn localization(&self, culture: &str) -> Option<&Localization> {
        self.localizations.get(&culture.to_lowercase())
    }

    /// Localizations for `cultures` in the order given, skipping cultures
    /// this library has nothing for.
    pub fn localizations<'a, S: AsRef<str>>(
        &'a self,
        cultures: &'a [S],
    ) -> impl Iterator<Item = &'a Localization> + 'a {
        cultures
            .iter()
            .filter_map(move |culture| self.localization(culture.as_ref()))
    }

    /// Every localization, ordered by culture.
    pub fn all_localizations(&self) -> impl Iterator<Item = &Localization> {
        self.localizations.values()
    }

    /// Resolve payloads and write the container to `path`.
    ///
    /// Every unresolvable payload is reported to `sink`. If any was, nothing
    /// is written and [`IrError::SaveAborted`] is returned.
    ///
    /// Without a resolver no payload is embedded and every object field loses
    /// its embedded index, including fields loaded from another container.
    /// Their data references are kept, so a later save with a resolver can
    /// embed them again.
    pub fn save(
        &mut self,
        path: &Path,
        resolver: Option<&dyn BinaryResolver>,
        sink: &mut dyn DiagnosticSink,
    ) -> Result<Vec<PayloadEntry>> {
        self.save_with_compression(path, resolver, sink, Compression::default())
    }

    /// [`Library::save`] with an explicit compression level.
    pub fn save_with_compression(
        &mut self,
        path: &Path,
        resolver: Option<&dyn BinaryResolver>,
        sink: &mut dyn DiagnosticSink,
        compression: Compression,
    ) -> Result<Vec<PayloadEntry>> {
        let (payloads, errors) = self.resolve_payloads(resolver, sink);
        if errors > 0 {
            return Err(IrError::SaveAborted {
                path: path.to_path_buf(),
                errors,
            });
        }

        let mut document = Vec::new();
        self.write_document(&mut document)
            .map_err(|e| IrError::io(path, e))?;
        let document = String::from_utf8_lossy(&document);

        let mut manifest = Vec::new();
        write_atomic(path, |out| {
            manifest = container::write_container(out, &document, &payloads, compression)?;
            Ok(())
        })?;

        tracing::info!(
            "wrote library {} ({} section(s), {} payload(s))",
            path.display(),
            self.sections.len(),
            manifest.len()
        );
        Ok(manifest)
    }

    /// Assign embedded indices in row order. Returns the payload queue and
    /// the number of references that could not be resolved.
    fn resolve_payloads(
        &mut self,
        resolver: Option<&dyn BinaryResolver>,
        sink: &mut dyn DiagnosticSink,
    ) -> (Vec<PathBuf>, usize) {
        let mut queue = Vec::new();
        let mut errors = 0;

        for section in &mut self.sections {
            for table in section.tables_mut().iter_mut() {
                let table_name = table.name().to_string();
                for row in table.rows_mut() {
                    let location = row.source_line().map(str::to_string);
                    for object in row.object_fields_mut() {
                        let (Some(resolver), Some(reference)) = (resolver, object.data.as_deref())
                        else {
                            object.embedded_index = None;
                            continue;
                        };

                        match resolver.resolve(location.as_deref(), &table_name, reference) {
                            Some(file) => {
                                object.embedded_index = Some(queue.len());
                                queue.push(file);
                            }
                            None => {
                                object.embedded_index = None;
                                errors += 1;
                                let mut diag = Diagnostic::error(format!(
                                    "cannot find the file `{}` referenced from table `{}`",
                                    reference, table_name
                                ))
                                .with_code("FileNotFound")
                                .with_suggestion(suggestions::MISSING_PAYLOAD);
                                if let Some(ref location) = location {
                                    diag = diag.with_location(location.clone());
                                }
                                sink.report(diag);
                            }
                        }
                    }
                }
            }
        }

        (queue, errors)
    }

    /// Write the library document (no payloads).
    pub fn write_document(&self, out: &mut dyn Write) -> std::io::Result<()> {
        let version = Self::VERSION.to_string();
        let mut writer = XmlWriter::new(out)?;
        writer.start(
            LIBRARY_ROOT,
            &[
                ("xmlns", Cow::Borrowed(LIBRARY_NAMESPACE)),
                ("version", Cow::Borrowed(version.as_str())),
            ],
        )?;
        for localization in self.localizations.values() {
            localization.write(&mut writer)?;
        }
        for section in &self.sections {
            section.write(&mut writer)?;
        }
        writer.end(LIBRARY_ROOT)
    }

    /// Open and load the library at `path`. Content problems fail
    /// immediately.
    pub fn open(
        path: &Path,
        schema: &TableDefinitionCollection,
        suppress_version_check: bool,
    ) -> Result<Self> {
        let file = File::open(path).map_err(|e| IrError::io(path, e))?;
        Self::load(BufReader::new(file), path, schema, suppress_version_check)
    }

    /// Load a library container from `reader`. `location` names the
    /// container and becomes the base of every embedded payload reference.
    pub fn load<R: Read>(
        reader: R,
        location: &Path,
        schema: &TableDefinitionCollection,
        suppress_version_check: bool,
    ) -> Result<Self> {
        Self::load_with_sink(reader, location, schema, suppress_version_check, None)
    }

    /// [`Library::load`] reporting content problems to `sink`.
    ///
    /// An `embeddedIndex` with no matching payload in the container is a
    /// content problem; the field keeps its data but loses the index.
    pub fn load_with_sink<R: Read>(
        reader: R,
        location: &Path,
        schema: &TableDefinitionCollection,
        suppress_version_check: bool,
        sink: Option<&mut dyn DiagnosticSink>,
    ) -> Result<Self> {
        let contents = container::read_container(reader, location)?;
        let mut ctx = ReadContext::new(location.display().to_string(), sink);
        let mut library =
            Self::read_document(&contents.document, schema, suppress_version_check, &mut ctx)?;

        let payload_count = contents.payloads.len();
        for section in &mut library.sections {
            for table in section.tables_mut().iter_mut() {
                for row in table.rows_mut() {
                    let row_location = row
                        .source_line()
                        .unwrap_or(ctx.document())
                        .to_string();
                    for object in row.object_fields_mut() {
                        match object.embedded_index {
                            Some(index) if index < payload_count => {
                                object.base_uri = Some(location.to_path_buf());
                            }
                            Some(index) => {
                                object.embedded_index = None;
                                ctx.content_error(IrError::IllegalAttributeValue {
                                    location: row_location.clone(),
                                    element: "field".to_string(),
                                    attribute: "embeddedIndex".to_string(),
                                    value: index.to_string(),
                                    expected: format!(
                                        "the index of one of the {} embedded payload(s)",
                                        payload_count
                                    ),
                                })?;
                            }
                            None => {}
                        }
                    }
                }
            }
        }

        tracing::debug!(
            "loaded library {} with {} section(s), {} culture(s), {} payload(s)",
            location.display(),
            library.sections.len(),
            library.localizations.len(),
            payload_count
        );
        Ok(library)
    }

    fn read_document(
        source: &str,
        schema: &TableDefinitionCollection,
        suppress_version_check: bool,
        ctx: &mut ReadContext<'_>,
    ) -> Result<Self> {
        let location = ctx.document().to_string();
        let root = parse_document(source).map_err(|e| IrError::NotALibrary {
            location: location.clone(),
            reason: e.to_string(),
        })?;

        if root.name != LIBRARY_ROOT || root.namespace.as_deref() != Some(LIBRARY_NAMESPACE) {
            return Err(IrError::NotALibrary {
                location,
                reason: format!(
                    "expected root `{}` in namespace `{}`, found `{}`",
                    LIBRARY_ROOT, LIBRARY_NAMESPACE, root.name
                ),
            });
        }

        check_version(&root, DocumentKind::Library, &location, suppress_version_check)?;

        let mut library = Library::new();
        for child in &root.children {
            match child.name.as_str() {
                LOCALIZATION_ROOT => {
                    let localization = Localization::read(child, ctx)?;
                    library.add_localization(localization)?;
                }
                "section" => library.sections.push(Section::read(child, schema, ctx)?),
                _ => return Err(ctx.unexpected(&root, child)),
            }
        }

        Ok(library)
    }

    /// The payload manifest of the container at `path`.
    pub fn payload_manifest(path: &Path) -> Result<Vec<PayloadEntry>> {
        let file = File::open(path).map_err(|e| IrError::io(path, e))?;
        Ok(container::read_container(BufReader::new(file), path)?.payloads)
    }

    /// Extract every payload of the container at `path` into `dest`, one
    /// file per embedded index, verifying checksums.
    pub fn extract_payloads(path: &Path, dest: &Path) -> Result<Vec<PathBuf>> {
        let file = File::open(path).map_err(|e| IrError::io(path, e))?;
        let extracted = container::extract_payloads(BufReader::new(file), path, dest)?;
        tracing::info!(
            "extracted {} payload(s) from {} to {}",
            extracted.len(),
            path.display(),
            dest.display()
        );
        Ok(extracted)
    }
}
