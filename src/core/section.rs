//! Sections: the typed bag of tables produced by one compiled input.

use std::borrow::Cow;
use std::fmt;
use std::io::Write;
use std::str::FromStr;

use crate::core::errors::{IrError, Result};
use crate::core::table::{Table, TableCollection};
use crate::core::table_definition::TableDefinitionCollection;
use crate::util::xml::{Element, ReadContext, XmlWriter};

/// Kind of installer package a section contributes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionType {
    Unknown,
    Bundle,
    Fragment,
    Module,
    PatchCreation,
    Product,
    Patch,
}

impl SectionType {
    /// Canonical name. `Unknown` is only a display name; it never reaches a
    /// persisted document.
    pub fn as_str(&self) -> &'static str {
        match self {
            SectionType::Unknown => "unknown",
            SectionType::Bundle => "bundle",
            SectionType::Fragment => "fragment",
            SectionType::Module => "module",
            SectionType::PatchCreation => "patchCreation",
            SectionType::Product => "product",
            SectionType::Patch => "patch",
        }
    }

    /// Whether sections of this type must carry an id.
    pub fn requires_id(&self) -> bool {
        !matches!(self, SectionType::Fragment | SectionType::Unknown)
    }
}

impl fmt::Display for SectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SectionType {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, ()> {
        match s {
            "bundle" => Ok(SectionType::Bundle),
            "fragment" => Ok(SectionType::Fragment),
            "module" => Ok(SectionType::Module),
            "patchCreation" => Ok(SectionType::PatchCreation),
            "product" => Ok(SectionType::Product),
            "patch" => Ok(SectionType::Patch),
            _ => Err(()),
        }
    }
}

/// One compiled input's tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    id: Option<String>,
    section_type: SectionType,
    codepage: u32,
    tables: TableCollection,
}

impl Section {
    /// Create an empty section. `codepage` 0 means unset.
    pub fn new(id: Option<String>, section_type: SectionType, codepage: u32) -> Self {
        Section {
            id,
            section_type,
            codepage,
            tables: TableCollection::new(),
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn section_type(&self) -> SectionType {
        self.section_type
    }

    pub fn codepage(&self) -> u32 {
        self.codepage
    }

    pub fn tables(&self) -> &TableCollection {
        &self.tables
    }

    pub fn tables_mut(&mut self) -> &mut TableCollection {
        &mut self.tables
    }

    /// Short human label: `product:MyProduct`, `fragment`.
    pub fn label(&self) -> String {
        match self.id {
            Some(ref id) => format!("{}:{}", self.section_type, id),
            None => self.section_type.to_string(),
        }
    }

    /// Parse a `section` element.
    pub fn read(
        element: &Element,
        schema: &TableDefinitionCollection,
        ctx: &mut ReadContext<'_>,
    ) -> Result<Self> {
        let raw_type = ctx.required(element, "type")?;
        let section_type: SectionType =
            raw_type
                .parse()
                .map_err(|_| IrError::IllegalAttributeValue {
                    location: ctx.location(element),
                    element: element.name.clone(),
                    attribute: "type".to_string(),
                    value: raw_type.to_string(),
                    expected: "bundle, fragment, module, patchCreation, product or patch"
                        .to_string(),
                })?;

        let id = match element.non_empty_attr("id") {
            Some(id) => Some(id.to_string()),
            None if section_type.requires_id() => {
                return Err(IrError::ExpectedAttribute {
                    location: ctx.location(element),
                    element: element.name.clone(),
                    attribute: "id".to_string(),
                });
            }
            None => None,
        };

        let codepage = ctx.codepage(element, "codepage")?.unwrap_or(0);

        let mut section = Section::new(id, section_type, codepage);
        for child in &element.children {
            match child.name.as_str() {
                "table" => {
                    let table = Table::read(child, schema, ctx)?;
                    section.tables.insert(table)?;
                }
                _ => return Err(ctx.unexpected(element, child)),
            }
        }

        tracing::debug!(
            "read section {} with {} table(s)",
            section.label(),
            section.tables.len()
        );
        Ok(section)
    }

    /// Write this section as a `section` element.
    ///
    /// Fails with `InvalidInput` for a section of `Unknown` type, which no
    /// loader would accept back.
    pub fn write<W: Write>(&self, writer: &mut XmlWriter<W>) -> std::io::Result<()> {
        if self.section_type == SectionType::Unknown {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("section `{}` has no persisted type", self.label()),
            ));
        }

        let codepage = self.codepage.to_string();
        let mut attrs: Vec<(&str, Cow<'_, str>)> = Vec::with_capacity(3);
        if let Some(ref id) = self.id {
            attrs.push(("id", Cow::Borrowed(id.as_str())));
        }
        attrs.push(("type", Cow::Borrowed(self.section_type.as_str())));
        if self.codepage != 0 {
            attrs.push(("codepage", Cow::Borrowed(codepage.as_str())));
        }

        if self.tables.is_empty() {
            return writer.leaf("section", &attrs, None);
        }

        writer.start("section", &attrs)?;
        for table in &self.tables {
            table.write(writer)?;
        }
        writer.end("section")
    }
}
