//! Core data structures for keel.
//!
//! This module contains the intermediate representation itself:
//! - The table schema registry and typed rows
//! - Sections, symbols and duplicate tracking
//! - Intermediates, libraries and their container
//! - Localizations and their merge

pub mod container;
pub mod errors;
pub mod intermediate;
pub mod library;
pub mod localization;
pub mod row;
pub mod section;
pub mod symbol;
pub mod table;
pub mod table_definition;

pub use container::PayloadEntry;
pub use errors::{IrError, Result};
pub use intermediate::Intermediate;
pub use library::{BinaryResolver, Library, SearchPathResolver};
pub use localization::{Localization, LocalizationVariable, LocalizedControl};
pub use row::{FieldValue, ObjectField, Row, RowAccess};
pub use section::{Section, SectionType};
pub use symbol::{Symbol, SymbolIndex};
pub use table::{Table, TableCollection};
pub use table_definition::{ColumnDefinition, ColumnType, TableDefinition, TableDefinitionCollection};
