//! Error types for reading, merging and packaging intermediate documents.

use std::path::PathBuf;

use miette::Diagnostic as MietteDiagnostic;
use thiserror::Error;

use crate::util::diagnostic::{suggestions, Diagnostic};
use crate::util::version::FormatVersion;

/// Result alias used throughout `keel::core`.
pub type Result<T, E = IrError> = std::result::Result<T, E>;

/// Which kind of document a version or root check was made against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Intermediate,
    Library,
    Localization,
    Schema,
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentKind::Intermediate => write!(f, "intermediate"),
            DocumentKind::Library => write!(f, "library"),
            DocumentKind::Localization => write!(f, "localization"),
            DocumentKind::Schema => write!(f, "table schema"),
        }
    }
}

/// Everything that can go wrong in the IR layer.
#[derive(Debug, Error, MietteDiagnostic)]
pub enum IrError {
    #[error("malformed document `{location}`: {message}")]
    #[diagnostic(code(keel::structure::xml))]
    Xml { location: String, message: String },

    #[error("unexpected element `{element}` in `{parent}`")]
    #[diagnostic(code(keel::structure::unexpected_element))]
    UnexpectedElement {
        location: String,
        parent: String,
        element: String,
    },

    #[error("the `{element}` element requires the `{attribute}` attribute")]
    #[diagnostic(code(keel::structure::expected_attribute))]
    ExpectedAttribute {
        location: String,
        element: String,
        attribute: String,
    },

    #[error("the `{element}/@{attribute}` value `{value}` is not valid: expected {expected}")]
    #[diagnostic(code(keel::content::illegal_attribute_value))]
    IllegalAttributeValue {
        location: String,
        element: String,
        attribute: String,
        value: String,
        expected: String,
    },

    #[error("the `{element}/@{attribute}` attribute cannot be specified without `{other}`")]
    #[diagnostic(code(keel::structure::illegal_attribute_without_other_attributes))]
    IllegalAttributeWithoutOtherAttributes {
        location: String,
        element: String,
        attribute: String,
        other: String,
    },

    #[error("the `{element}` element requires `{first}` or `{second}`")]
    #[diagnostic(code(keel::structure::expected_attributes_with_other_attribute))]
    ExpectedAttributesWithOtherAttribute {
        location: String,
        element: String,
        first: String,
        second: String,
    },

    #[error("invalid table schema: {0}")]
    #[diagnostic(code(keel::schema::invalid))]
    Schema(String),

    #[error("no table definition named `{name}`")]
    #[diagnostic(code(keel::schema::missing_table), help("add the table definition through `schema.extensions`"))]
    MissingTableDefinition { name: String },

    #[error("{kind} `{location}` has version {found}, expected {expected}")]
    #[diagnostic(code(keel::load::version_mismatch), help("rebuild the input with this toolset or suppress the version check"))]
    VersionMismatch {
        kind: DocumentKind,
        location: String,
        found: String,
        expected: FormatVersion,
    },

    #[error("`{location}` is not an intermediate: {reason}")]
    #[diagnostic(code(keel::load::not_an_intermediate))]
    NotAnIntermediate { location: String, reason: String },

    #[error("`{location}` is not a library: {reason}")]
    #[diagnostic(code(keel::load::not_a_library))]
    NotALibrary { location: String, reason: String },

    #[error("localization variable `{id}` is defined more than once")]
    #[diagnostic(code(keel::localization::duplicate_identifier))]
    DuplicateLocalizationIdentifier { id: String, location: Option<String> },

    #[error("UI localization for `{key}` is defined more than once")]
    #[diagnostic(code(keel::localization::duplicated_ui))]
    DuplicatedUiLocalization { key: String, location: Option<String> },

    #[error("cannot find file `{}`", .path.display())]
    #[diagnostic(code(keel::io::file_not_found))]
    FileNotFound { path: PathBuf },

    #[error("access to `{}` is denied", .path.display())]
    #[diagnostic(code(keel::io::unauthorized_access))]
    UnauthorizedAccess { path: PathBuf },

    #[error("save of `{}` aborted after {errors} error(s)", .path.display())]
    #[diagnostic(code(keel::library::save_aborted), help("every missing payload was reported; fix them and save again"))]
    SaveAborted { path: PathBuf, errors: usize },

    #[error("I/O error on `{}`", .path.display())]
    #[diagnostic(code(keel::io::error))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl IrError {
    /// Wrap an I/O failure on `path`, mapping the kinds callers branch on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => IrError::FileNotFound { path },
            std::io::ErrorKind::PermissionDenied => IrError::UnauthorizedAccess { path },
            _ => IrError::Io { path, source },
        }
    }

    /// Stable message kind, shared with diagnostics reported through a sink.
    pub fn code(&self) -> &'static str {
        match self {
            IrError::Xml { .. } => "Xml",
            IrError::UnexpectedElement { .. } => "UnexpectedElement",
            IrError::ExpectedAttribute { .. } => "ExpectedAttribute",
            IrError::IllegalAttributeValue { .. } => "IllegalAttributeValue",
            IrError::IllegalAttributeWithoutOtherAttributes { .. } => {
                "IllegalAttributeWithoutOtherAttributes"
            }
            IrError::ExpectedAttributesWithOtherAttribute { .. } => {
                "ExpectedAttributesWithOtherAttribute"
            }
            IrError::Schema(_) => "Schema",
            IrError::MissingTableDefinition { .. } => "MissingTableDefinition",
            IrError::VersionMismatch { .. } => "VersionMismatch",
            IrError::NotAnIntermediate { .. } => "NotAnIntermediate",
            IrError::NotALibrary { .. } => "NotALibrary",
            IrError::DuplicateLocalizationIdentifier { .. } => "DuplicateLocalizationIdentifier",
            IrError::DuplicatedUiLocalization { .. } => "DuplicatedUiLocalization",
            IrError::FileNotFound { .. } => "FileNotFound",
            IrError::UnauthorizedAccess { .. } => "UnauthorizedAccess",
            IrError::SaveAborted { .. } => "SaveAborted",
            IrError::Io { .. } => "Io",
        }
    }

    /// Location the error refers to, when it has one.
    pub fn location(&self) -> Option<String> {
        match self {
            IrError::Xml { location, .. }
            | IrError::UnexpectedElement { location, .. }
            | IrError::ExpectedAttribute { location, .. }
            | IrError::IllegalAttributeValue { location, .. }
            | IrError::IllegalAttributeWithoutOtherAttributes { location, .. }
            | IrError::ExpectedAttributesWithOtherAttribute { location, .. }
            | IrError::VersionMismatch { location, .. }
            | IrError::NotAnIntermediate { location, .. }
            | IrError::NotALibrary { location, .. } => Some(location.clone()),
            IrError::DuplicateLocalizationIdentifier { location, .. }
            | IrError::DuplicatedUiLocalization { location, .. } => location.clone(),
            IrError::FileNotFound { path }
            | IrError::UnauthorizedAccess { path }
            | IrError::SaveAborted { path, .. }
            | IrError::Io { path, .. } => Some(path.display().to_string()),
            IrError::Schema(_) | IrError::MissingTableDefinition { .. } => None,
        }
    }

    /// Convert to a user-facing diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let mut diag = Diagnostic::error(self.to_string()).with_code(self.code());
        if let Some(location) = self.location() {
            diag = diag.with_location(location);
        }

        match self {
            IrError::VersionMismatch { .. } => {
                diag = diag.with_suggestion(suggestions::VERSION_MISMATCH);
            }
            IrError::MissingTableDefinition { .. } => {
                diag = diag.with_suggestion(suggestions::MISSING_TABLE);
            }
            IrError::SaveAborted { .. } => {
                diag = diag.with_suggestion(suggestions::MISSING_PAYLOAD);
            }
            IrError::Io { source, .. } => {
                diag = diag.with_context(source.to_string());
            }
            _ => {}
        }

        diag
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_kind_mapping() {
        let err = IrError::io(
            "out/lib.wixlib",
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        );
        assert!(matches!(err, IrError::UnauthorizedAccess { .. }));

        let err = IrError::io("a.bin", std::io::Error::from(std::io::ErrorKind::NotFound));
        assert_eq!(err.code(), "FileNotFound");
    }

    #[test]
    fn test_to_diagnostic_carries_code_and_location() {
        let err = IrError::VersionMismatch {
            kind: DocumentKind::Intermediate,
            location: "a.wixobj".to_string(),
            found: "3.0.0.0".to_string(),
            expected: FormatVersion::CURRENT,
        };

        let diag = err.to_diagnostic();
        assert_eq!(diag.code, Some("VersionMismatch"));
        assert_eq!(diag.location.as_deref(), Some("a.wixobj"));
        assert!(diag.message.contains("expected 4.0.0.0"));
        assert_eq!(diag.suggestions.len(), 1);
    }
}
