//! Rows and their typed field values.

use std::borrow::Cow;
use std::fmt;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use crate::core::errors::{IrError, Result};
use crate::core::table_definition::{ColumnDefinition, ColumnType, TableDefinition};
use crate::util::xml::{Element, ReadContext, XmlWriter};

/// Separator between primary-key column values in a row's key.
pub const PRIMARY_KEY_SEPARATOR: char = '/';

/// A field whose value references an external binary payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectField {
    /// The unresolved reference as authored (usually a file path).
    pub data: Option<String>,
    /// Position of the payload inside a library container, set when the
    /// containing library is saved.
    pub embedded_index: Option<usize>,
    /// The container the embedded payload lives in, set when the row was
    /// loaded from a library.
    pub base_uri: Option<PathBuf>,
}

impl ObjectField {
    /// An object field pointing at `reference`.
    pub fn new(reference: impl Into<String>) -> Self {
        ObjectField {
            data: Some(reference.into()).filter(|s: &String| !s.is_empty()),
            embedded_index: None,
            base_uri: None,
        }
    }
}

/// The value held by one field of a row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FieldValue {
    #[default]
    Null,
    String(String),
    Number(i32),
    LongNumber(i64),
    Object(ObjectField),
}

impl FieldValue {
    /// A string value; the empty string is stored as `Null`.
    pub fn string(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.is_empty() {
            FieldValue::Null
        } else {
            FieldValue::String(value)
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            FieldValue::Object(o) => o.data.as_deref(),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<i64> {
        match self {
            FieldValue::Number(n) => Some(i64::from(*n)),
            FieldValue::LongNumber(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectField> {
        match self {
            FieldValue::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut ObjectField> {
        match self {
            FieldValue::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Whether this value can be stored in a column of `column_type`.
    pub fn fits(&self, column_type: ColumnType) -> bool {
        match self {
            FieldValue::Null => true,
            FieldValue::String(_) => column_type.is_textual(),
            FieldValue::Number(_) => column_type == ColumnType::Number,
            FieldValue::LongNumber(_) => column_type == ColumnType::LongNumber,
            FieldValue::Object(_) => column_type == ColumnType::Object,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => Ok(()),
            FieldValue::String(s) => f.write_str(s),
            FieldValue::Number(n) => write!(f, "{}", n),
            FieldValue::LongNumber(n) => write!(f, "{}", n),
            FieldValue::Object(o) => f.write_str(o.data.as_deref().unwrap_or_default()),
        }
    }
}

/// Visibility of a row to the linker's conflict resolution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum RowAccess {
    #[default]
    Public,
    Private,
    Override,
}

impl RowAccess {
    pub fn as_str(&self) -> &'static str {
        match self {
            RowAccess::Public => "public",
            RowAccess::Private => "private",
            RowAccess::Override => "override",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "public" => Some(RowAccess::Public),
            "private" => Some(RowAccess::Private),
            "override" => Some(RowAccess::Override),
            _ => None,
        }
    }
}

/// A record bound to one table definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    definition: Arc<TableDefinition>,
    fields: Vec<FieldValue>,
    access: RowAccess,
    source_line: Option<String>,
}

impl Row {
    /// A row of all-null fields.
    pub fn new(definition: Arc<TableDefinition>) -> Self {
        let fields = vec![FieldValue::Null; definition.columns().len()];
        Row {
            definition,
            fields,
            access: RowAccess::Public,
            source_line: None,
        }
    }

    /// Build a row from values given in column order.
    pub fn with_values(
        definition: Arc<TableDefinition>,
        values: impl IntoIterator<Item = FieldValue>,
    ) -> Result<Self> {
        let mut row = Row::new(definition);
        for (index, value) in values.into_iter().enumerate() {
            row.set(index, value)?;
        }
        Ok(row)
    }

    pub fn definition(&self) -> &Arc<TableDefinition> {
        &self.definition
    }

    pub fn table_name(&self) -> &str {
        self.definition.name()
    }

    pub fn fields(&self) -> &[FieldValue] {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut [FieldValue] {
        &mut self.fields
    }

    pub fn get(&self, index: usize) -> Option<&FieldValue> {
        self.fields.get(index)
    }

    /// Field by column name.
    pub fn get_by_name(&self, column: &str) -> Option<&FieldValue> {
        self.definition
            .column(column)
            .and_then(|(index, _)| self.fields.get(index))
    }

    /// Set a field, checking the index and the column type.
    pub fn set(&mut self, index: usize, value: FieldValue) -> Result<()> {
        let column = self.definition.columns().get(index).ok_or_else(|| {
            IrError::Schema(format!(
                "table `{}` has no column {}",
                self.definition.name(),
                index
            ))
        })?;
        if !value.fits(column.column_type) {
            return Err(IrError::Schema(format!(
                "column `{}.{}` of type {} cannot hold {:?}",
                self.definition.name(),
                column.name,
                column.column_type,
                value
            )));
        }

        self.fields[index] = match value {
            FieldValue::String(s) => FieldValue::string(s),
            FieldValue::Object(o) if o.data.is_none() && o.embedded_index.is_none() => {
                FieldValue::Null
            }
            other => other,
        };
        Ok(())
    }

    /// Set a field by column name.
    pub fn set_by_name(&mut self, column: &str, value: FieldValue) -> Result<()> {
        let (index, _) = self.definition.column(column).ok_or_else(|| {
            IrError::Schema(format!(
                "table `{}` has no column `{}`",
                self.definition.name(),
                column
            ))
        })?;
        self.set(index, value)
    }

    pub fn access(&self) -> RowAccess {
        self.access
    }

    pub fn set_access(&mut self, access: RowAccess) {
        self.access = access;
    }

    /// Where the row was authored, e.g. `product.wxs(12)`.
    pub fn source_line(&self) -> Option<&str> {
        self.source_line.as_deref()
    }

    pub fn set_source_line(&mut self, source_line: Option<String>) {
        self.source_line = source_line;
    }

    /// Primary-key column values joined with `/`, or `None` when the table
    /// has no primary key.
    pub fn primary_key(&self) -> Option<String> {
        let mut key: Option<String> = None;
        for index in self.definition.primary_key_columns() {
            let value = self.fields[index].to_string();
            match key.as_mut() {
                Some(k) => {
                    k.push(PRIMARY_KEY_SEPARATOR);
                    k.push_str(&value);
                }
                None => key = Some(value),
            }
        }
        key
    }

    /// Every object field of this row.
    pub fn object_fields_mut(&mut self) -> impl Iterator<Item = &mut ObjectField> {
        self.fields.iter_mut().filter_map(FieldValue::as_object_mut)
    }

    pub(crate) fn read(
        element: &Element,
        definition: &Arc<TableDefinition>,
        ctx: &mut ReadContext<'_>,
    ) -> Result<Self> {
        let mut row = Row::new(Arc::clone(definition));
        row.source_line = element.non_empty_attr("sourceLineNumber").map(str::to_string);

        if let Some(raw) = element.attr("access") {
            match RowAccess::parse(raw) {
                Some(access) => row.access = access,
                None => ctx.content_error(IrError::IllegalAttributeValue {
                    location: ctx.location(element),
                    element: element.name.clone(),
                    attribute: "access".to_string(),
                    value: raw.to_string(),
                    expected: "`public`, `private` or `override`".to_string(),
                })?,
            }
        }

        let columns = definition.columns();
        let mut index = 0;
        for child in &element.children {
            if child.name != "field" {
                return Err(ctx.unexpected(element, child));
            }
            let column = columns.get(index).ok_or_else(|| IrError::UnexpectedElement {
                location: ctx.location(child),
                parent: format!("{} row", definition.name()),
                element: format!("field #{}", index + 1),
            })?;
            row.fields[index] = read_field(child, definition.name(), column, ctx)?;
            index += 1;
        }

        Ok(row)
    }

    pub(crate) fn write<W: Write>(&self, writer: &mut XmlWriter<W>) -> std::io::Result<()> {
        let mut attrs: Vec<(&str, Cow<'_, str>)> = Vec::new();
        if let Some(ref line) = self.source_line {
            attrs.push(("sourceLineNumber", Cow::Borrowed(line.as_str())));
        }
        if self.access != RowAccess::Public {
            attrs.push(("access", Cow::Borrowed(self.access.as_str())));
        }
        writer.start("row", &attrs)?;

        for value in &self.fields {
            match value {
                FieldValue::Object(object) => {
                    let index = object.embedded_index.map(|i| i.to_string());
                    let attrs: Vec<(&str, Cow<'_, str>)> = index
                        .iter()
                        .map(|i| ("embeddedIndex", Cow::Borrowed(i.as_str())))
                        .collect();
                    writer.leaf("field", &attrs, object.data.as_deref())?;
                }
                FieldValue::Null => writer.leaf("field", &[], None)?,
                other => writer.leaf("field", &[], Some(&other.to_string()))?,
            }
        }

        writer.end("row")
    }
}

fn read_field(
    element: &Element,
    table: &str,
    column: &ColumnDefinition,
    ctx: &mut ReadContext<'_>,
) -> Result<FieldValue> {
    let text = element.text.as_str();
    let illegal = |ctx: &ReadContext<'_>, expected: String| IrError::IllegalAttributeValue {
        location: ctx.location(element),
        element: format!("{}/field", table),
        attribute: column.name.clone(),
        value: text.to_string(),
        expected,
    };

    if column.column_type == ColumnType::Object {
        let mut object = ObjectField::new(text);
        if let Some(raw) = element.attr("embeddedIndex") {
            match raw.parse::<usize>() {
                Ok(index) => object.embedded_index = Some(index),
                Err(_) => {
                    let err = IrError::IllegalAttributeValue {
                        location: ctx.location(element),
                        element: "field".to_string(),
                        attribute: "embeddedIndex".to_string(),
                        value: raw.to_string(),
                        expected: "a non-negative integer".to_string(),
                    };
                    ctx.content_error(err)?;
                }
            }
        }
        return Ok(if object.data.is_none() && object.embedded_index.is_none() {
            FieldValue::Null
        } else {
            FieldValue::Object(object)
        });
    }

    if text.is_empty() {
        return Ok(FieldValue::Null);
    }

    if !column.possibilities.is_empty() && !column.possibilities.iter().any(|p| p == text) {
        let err = illegal(ctx, format!("one of {}", column.possibilities.join(", ")));
        ctx.content_error(err)?;
        return Ok(FieldValue::Null);
    }

    let number = match column.column_type {
        ColumnType::Number | ColumnType::LongNumber => text.trim().parse::<i64>().ok(),
        _ => return Ok(FieldValue::String(text.to_string())),
    };

    let (type_min, type_max) = match column.column_type {
        ColumnType::Number => (i64::from(i32::MIN), i64::from(i32::MAX)),
        _ => (i64::MIN, i64::MAX),
    };
    let min = column.min_value.unwrap_or(type_min).max(type_min);
    let max = column.max_value.unwrap_or(type_max).min(type_max);

    match number {
        Some(n) if (min..=max).contains(&n) => Ok(match column.column_type {
            ColumnType::Number => FieldValue::Number(n as i32),
            _ => FieldValue::LongNumber(n),
        }),
        _ => {
            let err = illegal(ctx, format!("an integer between {} and {}", min, max));
            ctx.content_error(err)?;
            Ok(FieldValue::Null)
        }
    }
}
