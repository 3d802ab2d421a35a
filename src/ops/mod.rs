//! High-level operations.
//!
//! This module contains the implementation of keel commands.

pub mod extract;
pub mod inspect;
pub mod pack;
pub mod symbols;

pub use extract::{extract, ExtractedPayload};
pub use inspect::{
    detect, format_report, format_report_json, inspect, DocumentType, InspectReport,
};
pub use pack::{pack, PackOptions, PackResult};
pub use symbols::{format_symbols, symbols, Definition, SymbolEntry, SymbolsOptions};
