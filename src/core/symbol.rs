//! Symbols: cross-section row identities and the duplicates found for them.
//!
//! A symbol does not own its row. It holds a [`RowHandle`] into the sections
//! it was collected from, so the sections stay the single owner of the data.
//! Nothing here decides which duplicate wins; that is left to the linker.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::core::row::{Row, RowAccess};
use crate::core::section::Section;

/// Position of a row: section index, table name, row index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowHandle {
    pub section: usize,
    pub table: String,
    pub row: usize,
}

impl RowHandle {
    pub fn new(section: usize, table: impl Into<String>, row: usize) -> Self {
        RowHandle {
            section,
            table: table.into(),
            row,
        }
    }

    /// Follow the handle into `sections`.
    pub fn resolve<'a>(&self, sections: &'a [Section]) -> Option<&'a Row> {
        sections
            .get(self.section)?
            .tables()
            .get(&self.table)?
            .rows()
            .get(self.row)
    }
}

impl fmt::Display for RowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "section #{} {}[{}]", self.section, self.table, self.row)
    }
}

/// A row's identity, `table:primaryKey`.
#[derive(Debug, Clone)]
pub struct Symbol {
    name: String,
    row: RowHandle,
    access: RowAccess,
    source_line: Option<String>,
    duplicates: Option<HashSet<Symbol>>,
}

impl Symbol {
    /// Create the symbol for `row`, found at `handle`.
    pub fn new(row: &Row, handle: RowHandle) -> Self {
        Symbol {
            name: format!(
                "{}:{}",
                row.table_name(),
                row.primary_key().unwrap_or_default()
            ),
            row: handle,
            access: row.access(),
            source_line: row.source_line().map(str::to_string),
            duplicates: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table_name(&self) -> &str {
        &self.row.table
    }

    pub fn row(&self) -> &RowHandle {
        &self.row
    }

    /// Same as the access of the row the symbol was created from.
    pub fn access(&self) -> RowAccess {
        self.access
    }

    pub fn source_line(&self) -> Option<&str> {
        self.source_line.as_deref()
    }

    /// Other symbols with the same name, if any were recorded.
    pub fn duplicates(&self) -> Option<&HashSet<Symbol>> {
        self.duplicates.as_ref()
    }

    pub fn has_duplicates(&self) -> bool {
        self.duplicates.as_ref().is_some_and(|d| !d.is_empty())
    }

    /// Record `other` as a duplicate. Recording the same symbol again has no
    /// effect.
    pub fn add_duplicate(&mut self, other: Symbol) {
        self.duplicates.get_or_insert_with(HashSet::new).insert(other);
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.row == other.row
    }
}

impl Eq for Symbol {}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.row.hash(state);
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Symbols of every row whose table creates symbols, first definition first.
#[derive(Debug, Default)]
pub struct SymbolIndex {
    symbols: Vec<Symbol>,
    by_name: HashMap<String, usize>,
}

impl SymbolIndex {
    /// Walk `sections` in order. A later row with a name already seen is
    /// recorded as a duplicate of the first symbol with that name.
    pub fn collect(sections: &[Section]) -> Self {
        let mut index = SymbolIndex::default();

        for (section_index, section) in sections.iter().enumerate() {
            for table in section.tables() {
                if !table.definition().creates_symbols() {
                    continue;
                }
                for (row_index, row) in table.rows().iter().enumerate() {
                    let handle = RowHandle::new(section_index, table.name(), row_index);
                    index.add(Symbol::new(row, handle));
                }
            }
        }

        tracing::debug!(
            "collected {} symbol(s) from {} section(s)",
            index.symbols.len(),
            sections.len()
        );
        index
    }

    fn add(&mut self, symbol: Symbol) {
        match self.by_name.get(symbol.name()) {
            Some(&first) => self.symbols[first].add_duplicate(symbol),
            None => {
                self.by_name
                    .insert(symbol.name().to_string(), self.symbols.len());
                self.symbols.push(symbol);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.by_name.get(name).map(|&i| &self.symbols[i])
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Symbol> {
        self.symbols.iter()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Symbols defined more than once.
    pub fn duplicated(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.iter().filter(|s| s.has_duplicates())
    }
}
