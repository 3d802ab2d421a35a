//! Test utilities for keel unit tests.
//!
//! Document templates live here; pre-built sections live in [`fixtures`].
//!
//! # Example
//!
//! ```rust,ignore
//! use crate::test_support::{intermediate_xml, test_schema};
//!
//! #[test]
//! fn test_example() {
//!     let doc = intermediate_xml(Some("4.0.0.0"), r#"<section type="fragment"/>"#);
//!     let loaded = Intermediate::parse(&doc, "a.wixobj", &test_schema(), false, None);
//!     assert!(loaded.is_ok());
//! }
//! ```

pub mod fixtures;

use std::path::{Path, PathBuf};

use crate::core::table_definition::TableDefinitionCollection;

// Re-export fixtures for convenience
pub use fixtures::*;

/// The built-in table schema.
pub fn test_schema() -> TableDefinitionCollection {
    TableDefinitionCollection::builtin().expect("built-in schema must load")
}

/// An intermediate document with the given version attribute and body.
pub fn intermediate_xml(version: Option<&str>, body: &str) -> String {
    let version = version
        .map(|v| format!(r#" version="{}""#, v))
        .unwrap_or_default();
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<intermediate xmlns="urn:keel:intermediate"{}>{}</intermediate>"#,
        version, body
    )
}

/// A localization document for `culture` with the given body.
pub fn localization_xml(culture: &str, body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<Localization xmlns="urn:keel:localization" Culture="{}">{}</Localization>"#,
        culture, body
    )
}

/// Write `content` to `dir/name`, creating parent directories.
pub fn write_file(dir: &Path, name: &str, content: impl AsRef<[u8]>) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("failed to create fixture directory");
    }
    std::fs::write(&path, content).expect("failed to write fixture file");
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intermediate_xml_version() {
        assert!(intermediate_xml(Some("4.0.0.0"), "").contains(r#"version="4.0.0.0""#));
        assert!(!intermediate_xml(None, "").contains("version="));
    }

    #[test]
    fn test_write_file_creates_parents() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = write_file(tmp.path(), "a/b/c.wxl", "x");
        assert_eq!(std::fs::read_to_string(path).unwrap(), "x");
    }
}
