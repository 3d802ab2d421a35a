//! Intermediates: one compiled unit persisted as a standalone document.
//!
//! ```xml
//! <intermediate xmlns="urn:keel:intermediate" version="4.0.0.0">
//!   <section id="MyProduct" type="product" codepage="1252">
//!     <table name="Property">
//!       <row sourceLineNumber="product.wxs(7)">
//!         <field>ProductName</field>
//!         <field>My Product</field>
//!       </row>
//!     </table>
//!   </section>
//! </intermediate>
//! ```

use std::borrow::Cow;
use std::io::Write;
use std::path::Path;

use crate::core::errors::{DocumentKind, IrError, Result};
use crate::core::section::Section;
use crate::core::table_definition::TableDefinitionCollection;
use crate::util::diagnostic::DiagnosticSink;
use crate::util::fs::{read_to_string, write_atomic};
use crate::util::version::FormatVersion;
use crate::util::xml::{parse_document, Element, ReadContext, XmlWriter};

/// Namespace of intermediate documents.
pub const INTERMEDIATE_NAMESPACE: &str = "urn:keel:intermediate";

/// Root element of intermediate documents.
pub const INTERMEDIATE_ROOT: &str = "intermediate";

/// An ordered sequence of sections from one compiled input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Intermediate {
    sections: Vec<Section>,
}

impl Intermediate {
    /// Version written into every saved intermediate.
    pub const VERSION: FormatVersion = FormatVersion::CURRENT;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_sections(sections: impl IntoIterator<Item = Section>) -> Self {
        Intermediate {
            sections: sections.into_iter().collect(),
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

    pub fn into_sections(self) -> Vec<Section> {
        self.sections
    }

    /// Load an intermediate from a file. Content problems fail immediately.
    pub fn load(
        path: &Path,
        schema: &TableDefinitionCollection,
        suppress_version_check: bool,
    ) -> Result<Self> {
        Self::load_with_sink(path, schema, suppress_version_check, None)
    }

    /// Load an intermediate from a file, reporting content problems to `sink`.
    pub fn load_with_sink(
        path: &Path,
        schema: &TableDefinitionCollection,
        suppress_version_check: bool,
        sink: Option<&mut dyn DiagnosticSink>,
    ) -> Result<Self> {
        let source = read_to_string(path)?;
        let location = path.display().to_string();
        Self::parse(&source, &location, schema, suppress_version_check, sink)
    }

    /// Parse an intermediate document held in memory.
    pub fn parse(
        source: &str,
        location: &str,
        schema: &TableDefinitionCollection,
        suppress_version_check: bool,
        sink: Option<&mut dyn DiagnosticSink>,
    ) -> Result<Self> {
        let root = parse_document(source).map_err(|e| IrError::NotAnIntermediate {
            location: location.to_string(),
            reason: e.to_string(),
        })?;

        if root.name != INTERMEDIATE_ROOT
            || root.namespace.as_deref() != Some(INTERMEDIATE_NAMESPACE)
        {
            return Err(IrError::NotAnIntermediate {
                location: location.to_string(),
                reason: format!(
                    "expected root `{}` in namespace `{}`, found `{}`",
                    INTERMEDIATE_ROOT,
                    INTERMEDIATE_NAMESPACE,
                    root.name
                ),
            });
        }

        check_version(
            &root,
            DocumentKind::Intermediate,
            location,
            suppress_version_check,
        )?;

        let mut ctx = ReadContext::new(location, sink);
        let mut intermediate = Intermediate::new();
        for child in &root.children {
            match child.name.as_str() {
                "section" => intermediate
                    .sections
                    .push(Section::read(child, schema, &mut ctx)?),
                _ => return Err(ctx.unexpected(&root, child)),
            }
        }

        tracing::debug!(
            "loaded intermediate {} with {} section(s)",
            location,
            intermediate.sections.len()
        );
        Ok(intermediate)
    }

    /// Save to `path`, creating parent directories as needed. The file is
    /// replaced only once the whole document has been written.
    pub fn save(&self, path: &Path) -> Result<()> {
        write_atomic(path, |out| self.write(out))?;
        tracing::info!("wrote intermediate {}", path.display());
        Ok(())
    }

    /// Serialize to a writer.
    pub fn write(&self, out: &mut dyn Write) -> std::io::Result<()> {
        let version = Self::VERSION.to_string();
        let mut writer = XmlWriter::new(out)?;
        writer.start(
            INTERMEDIATE_ROOT,
            &[
                ("xmlns", Cow::Borrowed(INTERMEDIATE_NAMESPACE)),
                ("version", Cow::Borrowed(version.as_str())),
            ],
        )?;
        for section in &self.sections {
            section.write(&mut writer)?;
        }
        writer.end(INTERMEDIATE_ROOT)
    }

    /// Serialize to a string.
    pub fn to_xml(&self) -> std::io::Result<String> {
        let mut buffer = Vec::new();
        self.write(&mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

/// Compare a document's `version` attribute with the current format version.
///
/// The attribute is optional. When present it must equal the current
/// version exactly, older or newer, unless the check is suppressed.
pub(crate) fn check_version(
    root: &Element,
    kind: DocumentKind,
    location: &str,
    suppress: bool,
) -> Result<()> {
    let Some(raw) = root.attr("version") else {
        return Ok(());
    };
    if suppress {
        return Ok(());
    }

    match raw.parse::<FormatVersion>() {
        Ok(version) if version.is_compatible() => Ok(()),
        _ => Err(IrError::VersionMismatch {
            kind,
            location: location.to_string(),
            found: raw.to_string(),
            expected: FormatVersion::CURRENT,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::row::{FieldValue, ObjectField, RowAccess};
    use crate::core::section::SectionType;
    use crate::test_support::{intermediate_xml, sample_product_section, test_schema};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_save_load_round_trip() {
        let schema = test_schema();
        let mut fragment = Section::new(None, SectionType::Fragment, 0);
        let binary = schema.get("Binary").unwrap();
        let row = fragment.tables_mut().ensure(&binary).create_row();
        row.set(0, FieldValue::string("Logo")).unwrap();
        row.set(1, FieldValue::Object(ObjectField::new("art/logo.png")))
            .unwrap();
        row.set_access(RowAccess::Override);

        let original =
            Intermediate::from_sections([sample_product_section(&schema), fragment]);

        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("obj/nested/product.wixobj");
        original.save(&path).unwrap();

        let loaded = Intermediate::load(&path, &schema, false).unwrap();
        assert_eq!(loaded, original);
    }

    #[test]
    fn test_unknown_section_is_not_saved() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("unknown.wixobj");
        let intermediate =
            Intermediate::from_sections([Section::new(None, SectionType::Unknown, 0)]);

        let err = intermediate.save(&path).unwrap_err();
        assert!(matches!(err, IrError::Io { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn test_version_gate() {
        let schema = test_schema();
        for version in ["3.0.2002.0", "4.0.0.1", "5.0", "4.0", "4", "4.0.0"] {
            let doc = intermediate_xml(Some(version), r#"<section type="fragment"/>"#);

            let err = Intermediate::parse(&doc, "old.wixobj", &schema, false, None).unwrap_err();
            assert!(
                matches!(err, IrError::VersionMismatch { ref found, .. } if found == version),
                "{} should be rejected",
                version
            );

            let loaded = Intermediate::parse(&doc, "old.wixobj", &schema, true, None).unwrap();
            assert_eq!(loaded.sections().len(), 1);
        }
    }

    #[test]
    fn test_missing_version_is_tolerated() {
        let doc = intermediate_xml(None, "");
        assert!(Intermediate::parse(&doc, "a.wixobj", &test_schema(), false, None).is_ok());
    }

    #[test]
    fn test_not_an_intermediate() {
        let schema = test_schema();

        let err = Intermediate::parse("<<<", "junk.bin", &schema, false, None).unwrap_err();
        assert!(matches!(err, IrError::NotAnIntermediate { .. }));

        let err = Intermediate::parse(
            r#"<library xmlns="urn:keel:library" version="4.0.0.0"/>"#,
            "lib.wixlib",
            &schema,
            false,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, IrError::NotAnIntermediate { .. }));
    }

    #[test]
    fn test_corrupt_content_is_not_reported_as_foreign() {
        let doc = intermediate_xml(Some("4.0.0.0"), r#"<section id="P" type="product"><bogus/></section>"#);
        let err = Intermediate::parse(&doc, "a.wixobj", &test_schema(), false, None).unwrap_err();
        assert!(matches!(err, IrError::UnexpectedElement { .. }));
    }

    #[test]
    fn test_load_missing_file() {
        let tmp = TempDir::new().unwrap();
        let err = Intermediate::load(&tmp.path().join("nope.wixobj"), &test_schema(), false)
            .unwrap_err();
        assert!(matches!(err, IrError::FileNotFound { .. }));
    }
}
