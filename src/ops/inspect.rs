//! Implementation of `keel inspect`: summarize an intermediate, library or
//! localization file.

use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Serialize;

use crate::core::container::PayloadEntry;
use crate::core::intermediate::{Intermediate, INTERMEDIATE_ROOT};
use crate::core::library::Library;
use crate::core::localization::{Localization, LOCALIZATION_ROOT};
use crate::core::section::Section;
use crate::util::context::GlobalContext;
use crate::util::fs::read_to_string;
use crate::util::xml::parse_document;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Kind of document found on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Intermediate,
    Library,
    Localization,
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentType::Intermediate => f.write_str("intermediate"),
            DocumentType::Library => f.write_str("library"),
            DocumentType::Localization => f.write_str("localization"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TableSummary {
    pub name: String,
    pub rows: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SectionSummary {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub section_type: String,
    pub codepage: u32,
    pub tables: Vec<TableSummary>,
}

impl SectionSummary {
    fn new(section: &Section) -> Self {
        SectionSummary {
            id: section.id().map(str::to_string),
            section_type: section.section_type().to_string(),
            codepage: section.codepage(),
            tables: section
                .tables()
                .iter()
                .map(|t| TableSummary {
                    name: t.name().to_string(),
                    rows: t.len(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LocalizationSummary {
    pub culture: String,
    pub codepage: Option<u32>,
    pub variables: usize,
    pub controls: usize,
}

impl LocalizationSummary {
    fn new(localization: &Localization) -> Self {
        LocalizationSummary {
            culture: localization.culture().to_string(),
            codepage: localization.codepage(),
            variables: localization.variables().count(),
            controls: localization.controls().count(),
        }
    }
}

/// Everything `inspect` reports about one file.
#[derive(Debug, Clone, Serialize)]
pub struct InspectReport {
    pub path: PathBuf,
    pub kind: DocumentType,
    pub sections: Vec<SectionSummary>,
    pub localizations: Vec<LocalizationSummary>,
    pub payloads: Vec<PayloadEntry>,
}

/// Decide what `path` holds from its first bytes and root element.
pub fn detect(path: &Path) -> Result<DocumentType> {
    let mut magic = [0u8; 2];
    let mut file =
        File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let read = file.read(&mut magic)?;
    if read == magic.len() && magic == GZIP_MAGIC {
        return Ok(DocumentType::Library);
    }

    let source = read_to_string(path)?;
    let root = parse_document(&source)
        .with_context(|| format!("{} is not an XML document", path.display()))?;
    match root.name.as_str() {
        INTERMEDIATE_ROOT => Ok(DocumentType::Intermediate),
        LOCALIZATION_ROOT => Ok(DocumentType::Localization),
        other => bail!(
            "{}: unrecognized document root `{}`",
            path.display(),
            other
        ),
    }
}

/// Load `path` and summarize it.
///
/// A library's localizations are listed for `cultures` in priority order,
/// falling back to `localization.cultures` from the config. When neither
/// names a culture every localization is listed, ordered by culture.
pub fn inspect(ctx: &GlobalContext, path: &Path, cultures: &[String]) -> Result<InspectReport> {
    let path = ctx.resolve(path);
    let kind = detect(&path)?;
    let suppress = ctx.config().library.suppress_version_check;

    let mut report = InspectReport {
        path: path.clone(),
        kind,
        sections: Vec::new(),
        localizations: Vec::new(),
        payloads: Vec::new(),
    };

    match kind {
        DocumentType::Intermediate => {
            let schema = ctx.table_definitions()?;
            let intermediate = Intermediate::load(&path, &schema, suppress)?;
            report.sections = intermediate.sections().iter().map(SectionSummary::new).collect();
        }
        DocumentType::Library => {
            let schema = ctx.table_definitions()?;
            let file = File::open(&path)
                .with_context(|| format!("failed to open {}", path.display()))?;
            let library = Library::load(BufReader::new(file), &path, &schema, suppress)?;
            report.sections = library.sections().iter().map(SectionSummary::new).collect();
            let cultures = if cultures.is_empty() {
                &ctx.config().localization.cultures[..]
            } else {
                cultures
            };
            report.localizations = if cultures.is_empty() {
                library
                    .all_localizations()
                    .map(LocalizationSummary::new)
                    .collect()
            } else {
                library
                    .localizations(cultures)
                    .map(LocalizationSummary::new)
                    .collect()
            };
            report.payloads = Library::payload_manifest(&path)?;
        }
        DocumentType::Localization => {
            let localization = Localization::load(&path)?;
            report.localizations = vec![LocalizationSummary::new(&localization)];
        }
    }

    Ok(report)
}

/// Format a report for humans.
pub fn format_report(report: &InspectReport) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "{} ({})", report.path.display(), report.kind);

    for section in &report.sections {
        let id = section.id.as_deref().unwrap_or("-");
        let _ = writeln!(
            output,
            "  section {} {} (codepage {})",
            section.section_type, id, section.codepage
        );
        for table in &section.tables {
            let _ = writeln!(output, "    {:<24} {:>6} row(s)", table.name, table.rows);
        }
    }

    for localization in &report.localizations {
        let codepage = localization
            .codepage
            .map(|c| c.to_string())
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            output,
            "  culture {} (codepage {}): {} string(s), {} control(s)",
            localization.culture, codepage, localization.variables, localization.controls
        );
    }

    for payload in &report.payloads {
        let _ = writeln!(
            output,
            "  payload {} {} {} bytes sha256:{}",
            payload.index, payload.name, payload.size, payload.sha256
        );
    }

    output
}

/// Format a report as pretty JSON.
pub fn format_report_json(report: &InspectReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize inspect report")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::section::SectionType;
    use crate::test_support::{localization_xml, sample_product_section, test_schema, write_file};
    use crate::util::config::Config;
    use crate::util::diagnostic::Messages;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn context(dir: &Path) -> GlobalContext {
        GlobalContext::with_cwd(dir.to_path_buf())
            .unwrap()
            .with_config(Config::default())
    }

    #[test]
    fn test_inspect_intermediate() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("product.wixobj");
        Intermediate::from_sections([sample_product_section(&test_schema())])
            .save(&path)
            .unwrap();

        let report = inspect(&context(tmp.path()), Path::new("product.wixobj"), &[]).unwrap();
        assert_eq!(report.kind, DocumentType::Intermediate);
        assert_eq!(report.sections.len(), 1);

        let section = &report.sections[0];
        assert_eq!(section.id.as_deref(), Some("MyProduct"));
        assert_eq!(section.section_type, SectionType::Product.to_string());
        assert_eq!(section.codepage, 1252);
        let tables: Vec<_> = section
            .tables
            .iter()
            .map(|t| (t.name.as_str(), t.rows))
            .collect();
        assert_eq!(tables, vec![("Property", 3), ("Component", 1)]);

        let text = format_report(&report);
        assert!(text.contains("section product MyProduct (codepage 1252)"));
    }

    #[test]
    fn test_inspect_library_json() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.wixlib");
        let mut library = Library::from_sections([sample_product_section(&test_schema())]);
        library
            .add_localization(Localization::new("de-DE", Some(1252)))
            .unwrap();
        library.save(&path, None, &mut Messages::new()).unwrap();

        let report = inspect(&context(tmp.path()), &path, &[]).unwrap();
        assert_eq!(report.kind, DocumentType::Library);
        assert_eq!(report.localizations.len(), 1);
        assert_eq!(report.localizations[0].culture, "de-de");

        let json: serde_json::Value =
            serde_json::from_str(&format_report_json(&report).unwrap()).unwrap();
        assert_eq!(json["kind"], "library");
        assert_eq!(json["sections"][0]["type"], "product");
        assert_eq!(json["localizations"][0]["codepage"], 1252);
    }

    #[test]
    fn test_inspect_library_cultures_in_priority_order() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.wixlib");
        let mut library = Library::from_sections([sample_product_section(&test_schema())]);
        for culture in ["de-de", "en-us", "fr-fr"] {
            library
                .add_localization(Localization::new(culture, None))
                .unwrap();
        }
        library.save(&path, None, &mut Messages::new()).unwrap();

        let cultures = |report: &InspectReport| -> Vec<String> {
            report
                .localizations
                .iter()
                .map(|l| l.culture.clone())
                .collect()
        };

        let report = inspect(&context(tmp.path()), &path, &[]).unwrap();
        assert_eq!(cultures(&report), vec!["de-de", "en-us", "fr-fr"]);

        let mut config = Config::default();
        config.localization.cultures = vec![
            "fr-FR".to_string(),
            "ja-jp".to_string(),
            "de-de".to_string(),
        ];
        let configured = GlobalContext::with_cwd(tmp.path().to_path_buf())
            .unwrap()
            .with_config(config);
        let report = inspect(&configured, &path, &[]).unwrap();
        assert_eq!(cultures(&report), vec!["fr-fr", "de-de"]);

        let report = inspect(&configured, &path, &["EN-US".to_string()]).unwrap();
        assert_eq!(cultures(&report), vec!["en-us"]);
    }

    #[test]
    fn test_inspect_localization() {
        let tmp = TempDir::new().unwrap();
        let path = write_file(
            tmp.path(),
            "en-us.wxl",
            localization_xml(
                "en-us",
                r#"<String Id="A">a</String><UI Dialog="Welcome" Control="Next" Width="300"/>"#,
            ),
        );

        let report = inspect(&context(tmp.path()), &path, &[]).unwrap();
        assert_eq!(report.kind, DocumentType::Localization);
        assert_eq!(report.localizations[0].variables, 1);
        assert_eq!(report.localizations[0].controls, 1);
        assert!(format_report(&report).contains("1 string(s), 1 control(s)"));
    }

    #[test]
    fn test_detect_rejects_unknown_documents() {
        let tmp = TempDir::new().unwrap();
        let path = write_file(tmp.path(), "a.xml", "<Wix/>");
        let err = detect(&path).unwrap_err();
        assert!(err.to_string().contains("unrecognized document root `Wix`"));
    }
}
