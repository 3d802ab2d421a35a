//! Table schema registry.
//!
//! Every row is bound to a [`TableDefinition`]. Definitions are read once from
//! a schema document (the crate ships a default one) and then shared
//! read-only, behind `Arc`, by every section that holds rows of that table.
//!
//! ```xml
//! <tableDefinitions xmlns="urn:keel:tables">
//!   <tableDefinition name="Property" createSymbols="yes">
//!     <columnDefinition name="Property" type="string" primaryKey="yes"/>
//!     <columnDefinition name="Value" type="localized"/>
//!   </tableDefinition>
//! </tableDefinitions>
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::errors::{IrError, Result};
use crate::util::xml::{parse_document, Element};

/// Namespace of the table schema document.
pub const TABLES_NAMESPACE: &str = "urn:keel:tables";

const BUILTIN_TABLES: &str = include_str!("../../data/tables.xml");

/// Semantic type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ColumnType {
    String,
    /// A string that localization may replace.
    Localized,
    /// 32-bit integer.
    Number,
    /// 64-bit integer.
    LongNumber,
    /// Reference to a binary payload.
    Object,
    Guid,
    Version,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::String => "string",
            ColumnType::Localized => "localized",
            ColumnType::Number => "number",
            ColumnType::LongNumber => "longNumber",
            ColumnType::Object => "object",
            ColumnType::Guid => "guid",
            ColumnType::Version => "version",
        }
    }

    /// Whether values of this column are stored as text.
    pub fn is_textual(&self) -> bool {
        matches!(
            self,
            ColumnType::String | ColumnType::Localized | ColumnType::Guid | ColumnType::Version
        )
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColumnType {
    type Err = IrError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "string" => Ok(ColumnType::String),
            "localized" => Ok(ColumnType::Localized),
            "number" => Ok(ColumnType::Number),
            "longNumber" => Ok(ColumnType::LongNumber),
            "object" => Ok(ColumnType::Object),
            "guid" => Ok(ColumnType::Guid),
            "version" => Ok(ColumnType::Version),
            other => Err(IrError::Schema(format!("unknown column type `{}`", other))),
        }
    }
}

/// One column of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDefinition {
    pub name: String,
    pub column_type: ColumnType,
    pub nullable: bool,
    pub primary_key: bool,
    pub localizable: bool,
    pub min_value: Option<i64>,
    pub max_value: Option<i64>,
    /// Allowed values; empty means unrestricted.
    pub possibilities: Vec<String>,
    pub key_table: Option<String>,
    pub key_column: Option<u32>,
    pub description: Option<String>,
}

impl ColumnDefinition {
    /// A nullable, non-key column with no constraints.
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        ColumnDefinition {
            name: name.into(),
            column_type,
            nullable: true,
            primary_key: false,
            localizable: false,
            min_value: None,
            max_value: None,
            possibilities: Vec::new(),
            key_table: None,
            key_column: None,
            description: None,
        }
    }

    /// Mark this column as part of the primary key (implies not nullable).
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    /// Mark this column as not nullable.
    pub fn required(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Constrain numeric values to `min..=max`.
    pub fn with_range(mut self, min: i64, max: i64) -> Self {
        self.min_value = Some(min);
        self.max_value = Some(max);
        self
    }

    fn from_element(element: &Element, table: &str) -> Result<Self> {
        let name = element
            .non_empty_attr("name")
            .ok_or_else(|| IrError::Schema(format!("column in table `{}` has no name", table)))?;
        let column_type: ColumnType = element
            .attr("type")
            .ok_or_else(|| {
                IrError::Schema(format!("column `{}.{}` has no type", table, name))
            })?
            .parse()?;

        let flag = |attr: &str| -> Result<bool> {
            match element.attr(attr) {
                None | Some("no") => Ok(false),
                Some("yes") => Ok(true),
                Some(other) => Err(IrError::Schema(format!(
                    "column `{}.{}`: `{}` must be yes or no, found `{}`",
                    table, name, attr, other
                ))),
            }
        };
        let number = |attr: &str| -> Result<Option<i64>> {
            element
                .attr(attr)
                .map(|raw| {
                    raw.parse::<i64>().map_err(|_| {
                        IrError::Schema(format!(
                            "column `{}.{}`: `{}` must be an integer, found `{}`",
                            table, name, attr, raw
                        ))
                    })
                })
                .transpose()
        };

        let primary_key = flag("primaryKey")?;
        Ok(ColumnDefinition {
            name: name.to_string(),
            column_type,
            nullable: flag("nullable")? && !primary_key,
            primary_key,
            localizable: flag("localizable")?,
            min_value: number("minValue")?,
            max_value: number("maxValue")?,
            possibilities: element
                .non_empty_attr("set")
                .map(|set| set.split(';').map(str::to_string).collect())
                .unwrap_or_default(),
            key_table: element.non_empty_attr("keyTable").map(str::to_string),
            key_column: number("keyColumn")?.map(|c| c as u32),
            description: element.non_empty_attr("description").map(str::to_string),
        })
    }
}

/// Schema of one table. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDefinition {
    name: String,
    columns: Vec<ColumnDefinition>,
    create_symbols: bool,
    unreal: bool,
}

impl TableDefinition {
    /// Build a definition. Fails when there are no columns or a column name repeats.
    pub fn new(
        name: impl Into<String>,
        columns: Vec<ColumnDefinition>,
        create_symbols: bool,
        unreal: bool,
    ) -> Result<Self> {
        let name = name.into();
        if columns.is_empty() {
            return Err(IrError::Schema(format!("table `{}` has no columns", name)));
        }
        for (i, column) in columns.iter().enumerate() {
            if columns[..i].iter().any(|c| c.name == column.name) {
                return Err(IrError::Schema(format!(
                    "table `{}` defines column `{}` twice",
                    name, column.name
                )));
            }
        }

        Ok(TableDefinition {
            name,
            columns,
            create_symbols,
            unreal,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[ColumnDefinition] {
        &self.columns
    }

    /// Column by name.
    pub fn column(&self, name: &str) -> Option<(usize, &ColumnDefinition)> {
        self.columns
            .iter()
            .enumerate()
            .find(|(_, c)| c.name == name)
    }

    /// Whether rows of this table produce symbols.
    pub fn creates_symbols(&self) -> bool {
        self.create_symbols
    }

    /// Whether this table exists only in the intermediate, never in the
    /// final database.
    pub fn is_unreal(&self) -> bool {
        self.unreal
    }

    /// Indices of the primary-key columns, in column order.
    pub fn primary_key_columns(&self) -> impl Iterator<Item = usize> + '_ {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.primary_key)
            .map(|(i, _)| i)
    }

    fn from_element(element: &Element) -> Result<Self> {
        let name = element
            .non_empty_attr("name")
            .ok_or_else(|| IrError::Schema("tableDefinition without a name".to_string()))?;

        let mut columns = Vec::with_capacity(element.children.len());
        for child in &element.children {
            if child.name != "columnDefinition" {
                return Err(IrError::Schema(format!(
                    "unexpected element `{}` in table `{}` (line {})",
                    child.name, name, child.line
                )));
            }
            columns.push(ColumnDefinition::from_element(child, name)?);
        }

        TableDefinition::new(
            name,
            columns,
            element.attr("createSymbols") == Some("yes"),
            element.attr("unreal") == Some("yes"),
        )
    }
}

/// Name-unique, ordered set of table definitions.
///
/// Cloning is shallow: definitions are shared, so an extension can clone a
/// base collection and add its own tables without copying the base.
#[derive(Debug, Clone, Default)]
pub struct TableDefinitionCollection {
    definitions: Vec<Arc<TableDefinition>>,
    by_name: HashMap<String, usize>,
}

impl TableDefinitionCollection {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// The definitions shipped with this crate.
    pub fn builtin() -> Result<Self> {
        Self::load(BUILTIN_TABLES)
    }

    /// Parse a schema document.
    pub fn load(source: &str) -> Result<Self> {
        let root = parse_document(source)
            .map_err(|e| IrError::Schema(format!("malformed schema document: {}", e)))?;

        if root.name != "tableDefinitions" {
            return Err(IrError::Schema(format!(
                "expected root element `tableDefinitions`, found `{}`",
                root.name
            )));
        }
        if let Some(ns) = root.namespace.as_deref() {
            if ns != TABLES_NAMESPACE {
                return Err(IrError::Schema(format!(
                    "expected namespace `{}`, found `{}`",
                    TABLES_NAMESPACE, ns
                )));
            }
        }

        let mut collection = TableDefinitionCollection::new();
        for child in &root.children {
            if child.name != "tableDefinition" {
                return Err(IrError::Schema(format!(
                    "unexpected element `{}` (line {})",
                    child.name, child.line
                )));
            }
            collection.add(TableDefinition::from_element(child)?)?;
        }

        tracing::debug!("loaded {} table definitions", collection.len());
        Ok(collection)
    }

    /// Read and parse a schema file.
    pub fn load_file(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path).map_err(|e| IrError::io(path, e))?;
        Self::load(&source)
            .map_err(|e| IrError::Schema(format!("{}: {}", path.display(), e)))
    }

    /// Add a definition. Names must be unique.
    pub fn add(&mut self, definition: TableDefinition) -> Result<()> {
        self.add_shared(Arc::new(definition))
    }

    fn add_shared(&mut self, definition: Arc<TableDefinition>) -> Result<()> {
        if self.by_name.contains_key(definition.name()) {
            return Err(IrError::Schema(format!(
                "table `{}` is defined more than once",
                definition.name()
            )));
        }
        self.by_name
            .insert(definition.name().to_string(), self.definitions.len());
        self.definitions.push(definition);
        Ok(())
    }

    /// Layer every definition of `other` on top of this collection.
    pub fn extend_from(&mut self, other: &TableDefinitionCollection) -> Result<()> {
        for definition in &other.definitions {
            self.add_shared(Arc::clone(definition))?;
        }
        Ok(())
    }

    /// Definition by name; a missing table is always an error.
    pub fn get(&self, name: &str) -> Result<Arc<TableDefinition>> {
        self.try_get(name)
            .ok_or_else(|| IrError::MissingTableDefinition {
                name: name.to_string(),
            })
    }

    /// Definition by name, if present.
    pub fn try_get(&self, name: &str) -> Option<Arc<TableDefinition>> {
        self.by_name
            .get(name)
            .map(|&i| Arc::clone(&self.definitions[i]))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Definitions in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<TableDefinition>> {
        self.definitions.iter()
    }
}
