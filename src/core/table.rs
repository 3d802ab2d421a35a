//! Tables of rows and the per-section table collection.

use std::borrow::Cow;
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;

use crate::core::errors::{IrError, Result};
use crate::core::row::Row;
use crate::core::table_definition::{TableDefinition, TableDefinitionCollection};
use crate::util::xml::{Element, ReadContext, XmlWriter};

/// The rows of one table within one section. Row order is preserved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    definition: Arc<TableDefinition>,
    rows: Vec<Row>,
}

impl Table {
    pub fn new(definition: Arc<TableDefinition>) -> Self {
        Table {
            definition,
            rows: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        self.definition.name()
    }

    pub fn definition(&self) -> &Arc<TableDefinition> {
        &self.definition
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> &mut [Row] {
        &mut self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append a new all-null row and return it for filling in.
    pub fn create_row(&mut self) -> &mut Row {
        self.rows.push(Row::new(Arc::clone(&self.definition)));
        let last = self.rows.len() - 1;
        &mut self.rows[last]
    }

    /// Append an existing row. It must belong to this table.
    pub fn add_row(&mut self, row: Row) -> Result<()> {
        if row.table_name() != self.name() {
            return Err(IrError::Schema(format!(
                "row of table `{}` cannot be added to table `{}`",
                row.table_name(),
                self.name()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub(crate) fn read(
        element: &Element,
        schema: &TableDefinitionCollection,
        ctx: &mut ReadContext<'_>,
    ) -> Result<Self> {
        let name = ctx.required(element, "name")?;
        let definition = schema.get(name)?;

        let mut table = Table::new(definition);
        for child in &element.children {
            if child.name != "row" {
                return Err(ctx.unexpected(element, child));
            }
            let row = Row::read(child, &table.definition, ctx)?;
            table.rows.push(row);
        }

        Ok(table)
    }

    pub(crate) fn write<W: Write>(&self, writer: &mut XmlWriter<W>) -> std::io::Result<()> {
        writer.start("table", &[("name", Cow::Borrowed(self.name()))])?;
        for row in &self.rows {
            row.write(writer)?;
        }
        writer.end("table")
    }
}

/// Name-unique tables of a section, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableCollection {
    tables: Vec<Table>,
    by_name: HashMap<String, usize>,
}

impl TableCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table; a second table with the same name is rejected.
    pub fn insert(&mut self, table: Table) -> Result<()> {
        if self.by_name.contains_key(table.name()) {
            return Err(IrError::Schema(format!(
                "table `{}` appears more than once in the same section",
                table.name()
            )));
        }
        self.by_name
            .insert(table.name().to_string(), self.tables.len());
        self.tables.push(table);
        Ok(())
    }

    /// The table for `definition`, created empty if the section has none yet.
    pub fn ensure(&mut self, definition: &Arc<TableDefinition>) -> &mut Table {
        let index = match self.by_name.get(definition.name()) {
            Some(&index) => index,
            None => {
                self.by_name
                    .insert(definition.name().to_string(), self.tables.len());
                self.tables.push(Table::new(Arc::clone(definition)));
                self.tables.len() - 1
            }
        };
        &mut self.tables[index]
    }

    pub fn get(&self, name: &str) -> Option<&Table> {
        self.by_name.get(name).map(|&i| &self.tables[i])
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Table> {
        self.by_name.get(name).map(|&i| &mut self.tables[i])
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Table> {
        self.tables.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Table> {
        self.tables.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Total number of rows over all tables.
    pub fn row_count(&self) -> usize {
        self.tables.iter().map(Table::len).sum()
    }
}

impl<'a> IntoIterator for &'a TableCollection {
    type Item = &'a Table;
    type IntoIter = std::slice::Iter<'a, Table>;

    fn into_iter(self) -> Self::IntoIter {
        self.tables.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::row::FieldValue;
    use crate::test_support::test_schema;
    use crate::util::xml::parse_document;

    #[test]
    fn test_ensure_keeps_insertion_order() {
        let schema = test_schema();
        let mut tables = TableCollection::new();

        let binary = schema.get("Binary").unwrap();
        let property = schema.get("Property").unwrap();
        tables.ensure(&property).create_row();
        tables.ensure(&binary).create_row();
        tables.ensure(&property).create_row();

        let names: Vec<_> = tables.iter().map(Table::name).collect();
        assert_eq!(names, vec!["Property", "Binary"]);
        assert_eq!(tables.get("Property").unwrap().len(), 2);
        assert_eq!(tables.row_count(), 3);
    }

    #[test]
    fn test_insert_rejects_duplicate_table() {
        let schema = test_schema();
        let property = schema.get("Property").unwrap();
        let mut tables = TableCollection::new();

        tables.insert(Table::new(Arc::clone(&property))).unwrap();
        assert!(tables.insert(Table::new(property)).is_err());
    }

    #[test]
    fn test_add_row_checks_table() {
        let schema = test_schema();
        let mut table = Table::new(schema.get("Property").unwrap());
        let foreign = Row::new(schema.get("Binary").unwrap());
        assert!(table.add_row(foreign).is_err());

        let mut row = Row::new(schema.get("Property").unwrap());
        row.set(0, FieldValue::string("ProductName")).unwrap();
        table.add_row(row).unwrap();
        assert_eq!(table.rows()[0].primary_key().as_deref(), Some("ProductName"));
    }

    #[test]
    fn test_read_unknown_table_fails() {
        let schema = test_schema();
        let element = parse_document(r#"<table name="Nope"><row/></table>"#).unwrap();
        let mut ctx = ReadContext::strict("test.wixobj");

        let err = Table::read(&element, &schema, &mut ctx).unwrap_err();
        assert!(matches!(err, IrError::MissingTableDefinition { .. }));
    }
}
