//! Shared utilities

pub mod config;
pub mod context;
pub mod diagnostic;
pub mod fs;
pub mod hash;
pub mod version;
pub mod xml;

pub use config::Config;
pub use context::GlobalContext;
pub use diagnostic::{Diagnostic, DiagnosticSink, Messages};
pub use version::FormatVersion;
