//! Command implementations

pub mod completions;
pub mod extract;
pub mod inspect;
pub mod lib;
pub mod symbols;
