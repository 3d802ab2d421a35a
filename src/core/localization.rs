//! Localization: culture-specific string variables and UI control overrides.
//!
//! ```xml
//! <Localization xmlns="urn:keel:localization" Culture="en-us" Codepage="1252">
//!   <String Id="ProductName">My Product</String>
//!   <String Id="Publisher" Overridable="yes">Example Corp</String>
//!   <UI Dialog="WelcomeDlg" Control="Title" X="20" Width="220">Welcome</UI>
//! </Localization>
//! ```
//!
//! Variables marked overridable give way to a definitive (non-overridable)
//! value of the same id when localizations are merged. Two definitive values
//! for one id conflict. Controls have no override concept.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use std::ops::BitOr;
use std::path::Path;

use crate::core::errors::{IrError, Result};
use crate::util::diagnostic::DiagnosticSink;
use crate::util::fs::read_to_string;
use crate::util::xml::{parse_document, Element, ReadContext, XmlWriter};

/// Namespace of localization documents.
pub const LOCALIZATION_NAMESPACE: &str = "urn:keel:localization";

/// Root element of localization documents, also used inside libraries.
pub const LOCALIZATION_ROOT: &str = "Localization";

/// Largest coordinate or size accepted for a control.
const MAX_CONTROL_DIMENSION: i32 = i16::MAX as i32;

/// Text direction and alignment flags of a localized control.
///
/// Bit values match the installer database's control attribute bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ControlAttributes(u32);

impl ControlAttributes {
    pub const RIGHT_TO_LEFT: ControlAttributes = ControlAttributes(0x20);
    pub const RIGHT_ALIGNED: ControlAttributes = ControlAttributes(0x40);
    pub const LEFT_SCROLL: ControlAttributes = ControlAttributes(0x80);

    pub const fn empty() -> Self {
        ControlAttributes(0)
    }

    pub const fn bits(&self) -> u32 {
        self.0
    }

    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub const fn contains(&self, other: ControlAttributes) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: ControlAttributes) {
        self.0 |= other.0;
    }
}

impl BitOr for ControlAttributes {
    type Output = ControlAttributes;

    fn bitor(self, rhs: Self) -> Self::Output {
        ControlAttributes(self.0 | rhs.0)
    }
}

/// Position, size, direction and text overrides for one dialog or control.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalizedControl {
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub attributes: ControlAttributes,
    pub text: Option<String>,
}

/// Identifies what a [`LocalizedControl`] overrides: a whole dialog, or one
/// control (optionally qualified by its dialog).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ControlKey {
    pub dialog: Option<String>,
    pub control: Option<String>,
}

impl ControlKey {
    pub fn new(dialog: Option<&str>, control: Option<&str>) -> Self {
        ControlKey {
            dialog: dialog.map(str::to_string),
            control: control.map(str::to_string),
        }
    }
}

impl fmt::Display for ControlKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.dialog, &self.control) {
            (Some(dialog), Some(control)) => write!(f, "{}/{}", dialog, control),
            (Some(dialog), None) => f.write_str(dialog),
            (None, Some(control)) => write!(f, "/{}", control),
            (None, None) => Ok(()),
        }
    }
}

/// A localized string variable. Equality ignores `location`.
#[derive(Debug, Clone)]
pub struct LocalizationVariable {
    pub id: String,
    pub value: String,
    pub overridable: bool,
    /// Where the variable was defined.
    pub location: Option<String>,
}

impl LocalizationVariable {
    pub fn new(id: impl Into<String>, value: impl Into<String>, overridable: bool) -> Self {
        LocalizationVariable {
            id: id.into(),
            value: value.into(),
            overridable,
            location: None,
        }
    }
}

impl PartialEq for LocalizationVariable {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.value == other.value && self.overridable == other.overridable
    }
}

impl Eq for LocalizationVariable {}

/// What merging one incoming variable does to the target.
enum VariableMerge {
    Insert,
    Replace,
    Keep,
    Conflict,
}

fn classify(existing: Option<&LocalizationVariable>, incoming: &LocalizationVariable) -> VariableMerge {
    match existing {
        None => VariableMerge::Insert,
        Some(_) if incoming.overridable => VariableMerge::Keep,
        Some(existing) if existing.overridable => VariableMerge::Replace,
        // Merging a localization into an identical copy of itself.
        Some(existing) if existing.value == incoming.value => VariableMerge::Keep,
        Some(_) => VariableMerge::Conflict,
    }
}

/// Culture-tagged variables and control overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Localization {
    codepage: Option<u32>,
    culture: String,
    variables: BTreeMap<String, LocalizationVariable>,
    controls: BTreeMap<ControlKey, LocalizedControl>,
}

impl Localization {
    /// An empty localization; the culture is stored lowercase, empty means
    /// neutral.
    pub fn new(culture: &str, codepage: Option<u32>) -> Self {
        Localization {
            codepage,
            culture: culture.to_lowercase(),
            variables: BTreeMap::new(),
            controls: BTreeMap::new(),
        }
    }

    pub fn codepage(&self) -> Option<u32> {
        self.codepage
    }

    pub fn culture(&self) -> &str {
        &self.culture
    }

    pub fn variables(&self) -> impl Iterator<Item = &LocalizationVariable> {
        self.variables.values()
    }

    pub fn variable(&self, id: &str) -> Option<&LocalizationVariable> {
        self.variables.get(id)
    }

    pub fn controls(&self) -> impl Iterator<Item = (&ControlKey, &LocalizedControl)> {
        self.controls.iter()
    }

    pub fn control(&self, dialog: Option<&str>, control: Option<&str>) -> Option<&LocalizedControl> {
        self.controls.get(&ControlKey::new(dialog, control))
    }

    /// Add one variable under the override rules.
    pub fn add_variable(&mut self, variable: LocalizationVariable) -> Result<()> {
        match classify(self.variables.get(&variable.id), &variable) {
            VariableMerge::Insert | VariableMerge::Replace => {
                self.variables.insert(variable.id.clone(), variable);
                Ok(())
            }
            VariableMerge::Keep => Ok(()),
            VariableMerge::Conflict => Err(IrError::DuplicateLocalizationIdentifier {
                id: variable.id,
                location: variable.location,
            }),
        }
    }

    /// Add a control override. A second override for the same key is an error.
    pub fn add_control(&mut self, key: ControlKey, control: LocalizedControl) -> Result<()> {
        if self.controls.contains_key(&key) {
            return Err(IrError::DuplicatedUiLocalization {
                key: key.to_string(),
                location: None,
            });
        }
        self.controls.insert(key, control);
        Ok(())
    }

    /// Merge `other` into this localization.
    ///
    /// Either everything merges or nothing changes: conflicts are detected
    /// before the target is touched.
    pub fn merge(&mut self, other: &Localization) -> Result<()> {
        for incoming in other.variables.values() {
            if let VariableMerge::Conflict = classify(self.variables.get(&incoming.id), incoming) {
                return Err(IrError::DuplicateLocalizationIdentifier {
                    id: incoming.id.clone(),
                    location: incoming.location.clone(),
                });
            }
        }
        if let Some(key) = other.controls.keys().find(|k| self.controls.contains_key(*k)) {
            return Err(IrError::DuplicatedUiLocalization {
                key: key.to_string(),
                location: None,
            });
        }

        for incoming in other.variables.values() {
            self.add_variable(incoming.clone())?;
        }
        for (key, control) in &other.controls {
            self.controls.insert(key.clone(), control.clone());
        }
        if self.codepage.is_none() {
            self.codepage = other.codepage;
        }

        tracing::debug!(
            "merged localization `{}`: {} variable(s), {} control(s)",
            self.culture,
            self.variables.len(),
            self.controls.len()
        );
        Ok(())
    }

    /// Load a localization document. Content problems fail immediately.
    pub fn load(path: &Path) -> Result<Self> {
        Self::load_with_sink(path, None)
    }

    /// Load a localization document, reporting content problems to `sink`.
    pub fn load_with_sink(path: &Path, sink: Option<&mut dyn DiagnosticSink>) -> Result<Self> {
        let source = read_to_string(path)?;
        Self::parse(&source, &path.display().to_string(), sink)
    }

    /// Parse a localization document held in memory.
    pub fn parse(
        source: &str,
        location: &str,
        sink: Option<&mut dyn DiagnosticSink>,
    ) -> Result<Self> {
        let root = parse_document(source).map_err(|e| IrError::Xml {
            location: location.to_string(),
            message: e.to_string(),
        })?;
        let mut ctx = ReadContext::new(location, sink);
        Self::read(&root, &mut ctx)
    }

    /// Read a `Localization` element, standalone or inside a library.
    pub(crate) fn read(element: &Element, ctx: &mut ReadContext<'_>) -> Result<Self> {
        let foreign_namespace = element
            .namespace
            .as_deref()
            .is_some_and(|ns| ns != LOCALIZATION_NAMESPACE);
        if element.name != LOCALIZATION_ROOT || foreign_namespace {
            return Err(IrError::UnexpectedElement {
                location: ctx.location(element),
                parent: "document".to_string(),
                element: element.name.clone(),
            });
        }

        let culture = element.attr("Culture").unwrap_or_default();
        let codepage = ctx.codepage(element, "Codepage")?;
        let mut localization = Localization::new(culture, codepage);

        for child in &element.children {
            match child.name.as_str() {
                "String" => localization.read_string(child, ctx)?,
                "UI" => localization.read_ui(child, ctx)?,
                _ => return Err(ctx.unexpected(element, child)),
            }
        }

        Ok(localization)
    }

    fn read_string(&mut self, element: &Element, ctx: &mut ReadContext<'_>) -> Result<()> {
        if let Some(child) = element.children.first() {
            return Err(ctx.unexpected(element, child));
        }

        let id = ctx.identifier(element, "Id")?;
        let overridable = ctx.yes_no(element, "Overridable")?.unwrap_or(false);

        let mut variable = LocalizationVariable::new(id, element.text.as_str(), overridable);
        variable.location = Some(ctx.location(element));
        self.add_variable(variable)
    }

    fn read_ui(&mut self, element: &Element, ctx: &mut ReadContext<'_>) -> Result<()> {
        if let Some(child) = element.children.first() {
            return Err(ctx.unexpected(element, child));
        }

        let dialog = element.non_empty_attr("Dialog");
        let control = element.non_empty_attr("Control");

        let mut localized = LocalizedControl {
            x: ctx.integer(element, "X", 0, MAX_CONTROL_DIMENSION)?,
            y: ctx.integer(element, "Y", 0, MAX_CONTROL_DIMENSION)?,
            width: ctx.integer(element, "Width", 0, MAX_CONTROL_DIMENSION)?,
            height: ctx.integer(element, "Height", 0, MAX_CONTROL_DIMENSION)?,
            attributes: ControlAttributes::empty(),
            text: Some(element.text.clone()).filter(|t| !t.is_empty()),
        };

        for (name, flag) in [
            ("RightToLeft", ControlAttributes::RIGHT_TO_LEFT),
            ("RightAligned", ControlAttributes::RIGHT_ALIGNED),
            ("LeftScroll", ControlAttributes::LEFT_SCROLL),
        ] {
            if ctx.yes_no(element, name)? == Some(true) {
                localized.attributes.insert(flag);
            }
        }

        if control.is_none() {
            let control_only = ["X", "Y", "Width", "Height", "RightToLeft", "RightAligned", "LeftScroll"];
            if let Some(attribute) = control_only.iter().find(|a| element.attr(a).is_some()) {
                return Err(IrError::IllegalAttributeWithoutOtherAttributes {
                    location: ctx.location(element),
                    element: element.name.clone(),
                    attribute: attribute.to_string(),
                    other: "Control".to_string(),
                });
            }
            if dialog.is_none() {
                return Err(IrError::ExpectedAttributesWithOtherAttribute {
                    location: ctx.location(element),
                    element: element.name.clone(),
                    first: "Dialog".to_string(),
                    second: "Control".to_string(),
                });
            }
        }

        let key = ControlKey::new(dialog, control);
        if self.controls.contains_key(&key) {
            return Err(IrError::DuplicatedUiLocalization {
                key: key.to_string(),
                location: Some(ctx.location(element)),
            });
        }
        self.controls.insert(key, localized);
        Ok(())
    }

    /// Write this localization as a `Localization` element.
    pub fn write<W: Write>(&self, writer: &mut XmlWriter<W>) -> std::io::Result<()> {
        let codepage = self.codepage.map(|c| c.to_string());
        let mut attrs: Vec<(&str, Cow<'_, str>)> =
            vec![("xmlns", Cow::Borrowed(LOCALIZATION_NAMESPACE))];
        if let Some(ref codepage) = codepage {
            attrs.push(("Codepage", Cow::Borrowed(codepage.as_str())));
        }
        if !self.culture.is_empty() {
            attrs.push(("Culture", Cow::Borrowed(self.culture.as_str())));
        }

        if self.variables.is_empty() && self.controls.is_empty() {
            return writer.leaf(LOCALIZATION_ROOT, &attrs, None);
        }
        writer.start(LOCALIZATION_ROOT, &attrs)?;

        for variable in self.variables.values() {
            let mut attrs = vec![("Id", Cow::Borrowed(variable.id.as_str()))];
            if variable.overridable {
                attrs.push(("Overridable", Cow::Borrowed("yes")));
            }
            writer.leaf("String", &attrs, Some(&variable.value))?;
        }

        for (key, control) in &self.controls {
            let mut attrs: Vec<(&str, Cow<'_, str>)> = Vec::new();
            if let Some(ref dialog) = key.dialog {
                attrs.push(("Dialog", Cow::Borrowed(dialog.as_str())));
            }
            if let Some(ref name) = key.control {
                attrs.push(("Control", Cow::Borrowed(name.as_str())));
            }
            for (name, value) in [
                ("X", control.x),
                ("Y", control.y),
                ("Width", control.width),
                ("Height", control.height),
            ] {
                if let Some(value) = value {
                    attrs.push((name, Cow::Owned(value.to_string())));
                }
            }
            for (name, flag) in [
                ("RightToLeft", ControlAttributes::RIGHT_TO_LEFT),
                ("RightAligned", ControlAttributes::RIGHT_ALIGNED),
                ("LeftScroll", ControlAttributes::LEFT_SCROLL),
            ] {
                if control.attributes.contains(flag) {
                    attrs.push((name, Cow::Borrowed("yes")));
                }
            }
            writer.leaf("UI", &attrs, control.text.as_deref())?;
        }

        writer.end(LOCALIZATION_ROOT)
    }
}
