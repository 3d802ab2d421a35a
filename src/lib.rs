//! keel - object and library intermediate representation for an
//! installer-authoring toolchain
//!
//! This crate provides the data model compilers emit (sections of typed
//! table rows), its persisted forms (intermediates and libraries with
//! embedded payloads) and the localization merge used when packing.

pub mod core;
pub mod ops;
pub mod util;

/// Test utilities for keel unit tests.
///
/// This module is only available when compiling with `--cfg test` or
/// running tests. It provides the built-in schema, document templates and
/// pre-built sections.
#[cfg(test)]
pub mod test_support;

pub use core::{
    intermediate::Intermediate, library::Library, localization::Localization, section::Section,
    symbol::Symbol, table_definition::TableDefinitionCollection, IrError,
};
pub use util::context::GlobalContext;
