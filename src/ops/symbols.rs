//! Implementation of `keel symbols`: list the symbols defined by a set of
//! intermediates and libraries, and where a name is defined more than once.

use std::fmt::Write as _;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::core::intermediate::Intermediate;
use crate::core::library::Library;
use crate::core::section::Section;
use crate::core::symbol::{Symbol, SymbolIndex};
use crate::core::table_definition::TableDefinitionCollection;
use crate::ops::inspect::{detect, DocumentType};
use crate::util::context::GlobalContext;
use crate::util::fs::glob_files;

/// Options for listing symbols.
#[derive(Debug, Clone, Default)]
pub struct SymbolsOptions {
    /// Intermediates and libraries, or glob patterns
    pub inputs: Vec<String>,

    /// Only report names defined more than once
    pub duplicates_only: bool,
}

/// Where one definition of a symbol lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Definition {
    pub section: String,
    pub access: &'static str,
    pub source_line: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SymbolEntry {
    pub name: String,
    pub definition: Definition,
    /// Every other definition of the same name, ordered by section.
    pub duplicates: Vec<Definition>,
}

fn definition(symbol: &Symbol, sections: &[Section]) -> Definition {
    Definition {
        section: sections
            .get(symbol.row().section)
            .map(Section::label)
            .unwrap_or_default(),
        access: symbol.access().as_str(),
        source_line: symbol.source_line().map(str::to_string),
    }
}

fn load_sections(
    path: &Path,
    schema: &TableDefinitionCollection,
    suppress: bool,
) -> Result<Vec<Section>> {
    match detect(path)? {
        DocumentType::Intermediate => Ok(Intermediate::load(path, schema, suppress)?.into_sections()),
        DocumentType::Library => {
            let file = File::open(path)
                .with_context(|| format!("failed to open {}", path.display()))?;
            let library = Library::load(BufReader::new(file), path, schema, suppress)?;
            Ok(library.sections().to_vec())
        }
        DocumentType::Localization => {
            tracing::warn!("{} defines no symbols; skipping", path.display());
            Ok(Vec::new())
        }
    }
}

/// Collect the symbols of every input, in input order.
pub fn symbols(ctx: &GlobalContext, opts: &SymbolsOptions) -> Result<Vec<SymbolEntry>> {
    let schema = ctx.table_definitions()?;
    let suppress = ctx.config().library.suppress_version_check;

    let mut sections = Vec::new();
    for path in glob_files(ctx.cwd(), &opts.inputs)? {
        let loaded = load_sections(&path, &schema, suppress)
            .with_context(|| format!("failed to load {}", path.display()))?;
        sections.extend(loaded);
    }

    let index = SymbolIndex::collect(&sections);
    let mut entries = Vec::with_capacity(index.len());
    for symbol in index.iter() {
        if opts.duplicates_only && !symbol.has_duplicates() {
            continue;
        }

        let mut duplicates: Vec<_> = symbol
            .duplicates()
            .into_iter()
            .flatten()
            .collect();
        duplicates.sort_by_key(|d| (d.row().section, d.row().row));

        entries.push(SymbolEntry {
            name: symbol.name().to_string(),
            definition: definition(symbol, &sections),
            duplicates: duplicates
                .into_iter()
                .map(|d| definition(d, &sections))
                .collect(),
        });
    }

    Ok(entries)
}

/// Format symbol entries for humans, one line per definition.
pub fn format_symbols(entries: &[SymbolEntry]) -> String {
    let mut output = String::new();
    for entry in entries {
        let _ = writeln!(
            output,
            "{} [{}] {}{}",
            entry.name,
            entry.definition.access,
            entry.definition.section,
            location_suffix(&entry.definition)
        );
        for duplicate in &entry.duplicates {
            let _ = writeln!(
                output,
                "  duplicate [{}] {}{}",
                duplicate.access,
                duplicate.section,
                location_suffix(duplicate)
            );
        }
    }
    output
}

fn location_suffix(definition: &Definition) -> String {
    definition
        .source_line
        .as_deref()
        .map(|l| format!(" at {}", l))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::section::SectionType;
    use crate::test_support::{property_section, sample_product_section, test_schema};
    use crate::util::config::Config;
    use crate::util::diagnostic::Messages;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn context(dir: &Path) -> GlobalContext {
        GlobalContext::with_cwd(dir.to_path_buf())
            .unwrap()
            .with_config(Config::default())
    }

    fn options(inputs: &[&str], duplicates_only: bool) -> SymbolsOptions {
        SymbolsOptions {
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            duplicates_only,
        }
    }

    #[test]
    fn test_symbols_across_intermediate_and_library() {
        let tmp = TempDir::new().unwrap();
        let schema = test_schema();
        Intermediate::from_sections([sample_product_section(&schema)])
            .save(&tmp.path().join("a.wixobj"))
            .unwrap();
        Library::from_sections([property_section(
            &schema,
            SectionType::Fragment,
            &["ProductName", "Extra"],
        )])
        .save(&tmp.path().join("b.wixlib"), None, &mut Messages::new())
        .unwrap();

        let ctx = context(tmp.path());
        let all = symbols(&ctx, &options(&["a.wixobj", "b.wixlib"], false)).unwrap();
        let names: Vec<_> = all.iter().map(|e| e.name.as_str()).collect();
        assert!(names.contains(&"Property:ProductName"));
        assert!(names.contains(&"Property:Extra"));

        let duplicated = symbols(&ctx, &options(&["a.wixobj", "b.wixlib"], true)).unwrap();
        assert_eq!(duplicated.len(), 1);
        let entry = &duplicated[0];
        assert_eq!(entry.name, "Property:ProductName");
        assert_eq!(
            entry.definition,
            Definition {
                section: "product:MyProduct".to_string(),
                access: "public",
                source_line: Some("product.wxs(3)".to_string()),
            }
        );
        assert_eq!(
            entry.duplicates,
            vec![Definition {
                section: "fragment".to_string(),
                access: "public",
                source_line: None,
            }]
        );

        let text = format_symbols(&duplicated);
        assert!(text.contains("Property:ProductName [public] product:MyProduct at product.wxs(3)"));
        assert!(text.contains("  duplicate [public] fragment"));
    }

    #[test]
    fn test_symbols_skip_localizations() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("en-us.wxl"),
            crate::test_support::localization_xml("en-us", ""),
        )
        .unwrap();
        let entries = symbols(&context(tmp.path()), &options(&["*.wxl"], false)).unwrap();
        assert!(entries.is_empty());
    }
}
