//! XML reading and writing for intermediate, library and localization
//! documents.
//!
//! Documents are small enough to be read into an [`Element`] tree first and
//! then walked by the typed readers in `crate::core`. Attribute access goes
//! through [`ReadContext`], which decides between reporting a problem to the
//! diagnostic sink and failing outright.

use std::borrow::Cow;
use std::io::Write;
use std::sync::LazyLock;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use regex::Regex;
use thiserror::Error;

use crate::core::errors::{IrError, Result};
use crate::util::diagnostic::DiagnosticSink;

/// Legal identifiers: a letter or underscore, then letters, digits,
/// underscores or periods.
static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_.]*$").expect("identifier regex"));

/// Longest identifier accepted by the installer database.
pub const MAX_IDENTIFIER_LENGTH: usize = 72;

/// Check whether `value` is a legal identifier.
pub fn is_legal_identifier(value: &str) -> bool {
    value.len() <= MAX_IDENTIFIER_LENGTH && IDENTIFIER.is_match(value)
}

/// The document could not be parsed as XML at all.
#[derive(Debug, Clone, Error)]
#[error("line {line}: {message}")]
pub struct MalformedXml {
    pub line: usize,
    pub message: String,
}

/// One element of a parsed document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    /// Local name (prefix stripped).
    pub name: String,
    /// Default namespace declared on this element, if any.
    pub namespace: Option<String>,
    /// Attributes in document order, namespace declarations excluded.
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Element>,
    /// Concatenated character data directly inside this element.
    pub text: String,
    /// 1-based line the start tag is on.
    pub line: usize,
}

impl Element {
    /// Look up an attribute by local name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Look up an attribute, treating an empty value as absent.
    pub fn non_empty_attr(&self, name: &str) -> Option<&str> {
        self.attr(name).filter(|v| !v.is_empty())
    }

    fn from_start(start: &BytesStart<'_>, line: usize) -> std::result::Result<Self, String> {
        let mut element = Element {
            name: String::from_utf8_lossy(start.local_name().as_ref()).into_owned(),
            line,
            ..Default::default()
        };

        for attr in start.attributes() {
            let attr = attr.map_err(|e| e.to_string())?;
            let key = attr.key.as_ref();
            let value = attr.unescape_value().map_err(|e| e.to_string())?.into_owned();

            if key == b"xmlns" {
                element.namespace = Some(value);
            } else if !key.starts_with(b"xmlns:") {
                let local = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
                element.attributes.push((local, value));
            }
        }

        Ok(element)
    }
}

/// Tracks the line number of a byte offset while reading forward.
struct LineTracker<'a> {
    source: &'a [u8],
    offset: usize,
    line: usize,
}

impl<'a> LineTracker<'a> {
    fn new(source: &'a str) -> Self {
        LineTracker {
            source: source.as_bytes(),
            offset: 0,
            line: 1,
        }
    }

    fn line_at(&mut self, position: usize) -> usize {
        let end = position.min(self.source.len());
        if end > self.offset {
            self.line += self.source[self.offset..end]
                .iter()
                .filter(|&&b| b == b'\n')
                .count();
            self.offset = end;
        }
        self.line
    }
}

/// Parse a whole document into its root element.
pub fn parse_document(source: &str) -> std::result::Result<Element, MalformedXml> {
    let mut reader = Reader::from_str(source);
    let mut lines = LineTracker::new(source);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let position = reader.buffer_position() as usize;
        let line = lines.line_at(position);
        let fail = |message: String| MalformedXml { line, message };

        match reader.read_event() {
            Ok(Event::Start(start)) => {
                stack.push(Element::from_start(&start, line).map_err(fail)?);
            }
            Ok(Event::Empty(start)) => {
                let element = Element::from_start(&start, line).map_err(fail)?;
                attach(&mut stack, &mut root, element).map_err(fail)?;
            }
            Ok(Event::End(_)) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| fail("unbalanced end tag".to_string()))?;
                attach(&mut stack, &mut root, element).map_err(fail)?;
            }
            Ok(Event::Text(text)) => {
                let text = text.unescape().map_err(|e| fail(e.to_string()))?;
                match stack.last_mut() {
                    Some(top) => top.text.push_str(&text),
                    None if text.trim().is_empty() => {}
                    None => return Err(fail("text outside of the root element".to_string())),
                }
            }
            Ok(Event::CData(data)) => {
                let data = data.into_inner();
                match stack.last_mut() {
                    Some(top) => top.text.push_str(&String::from_utf8_lossy(&data)),
                    None => return Err(fail("CDATA outside of the root element".to_string())),
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(fail(e.to_string())),
        }
    }

    let line = lines.line_at(source.len());
    if let Some(open) = stack.last() {
        return Err(MalformedXml {
            line,
            message: format!("element `{}` is not closed", open.name),
        });
    }

    root.ok_or(MalformedXml {
        line,
        message: "document has no root element".to_string(),
    })
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> std::result::Result<(), String> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
        Ok(())
    } else if root.is_some() {
        Err(format!("second root element `{}`", element.name))
    } else {
        *root = Some(element);
        Ok(())
    }
}

/// Per-document reading state: where we are and where diagnostics go.
pub struct ReadContext<'a> {
    document: String,
    sink: Option<&'a mut dyn DiagnosticSink>,
}

impl<'a> ReadContext<'a> {
    /// Read `document` without a sink: content problems fail immediately.
    pub fn strict(document: impl Into<String>) -> Self {
        ReadContext {
            document: document.into(),
            sink: None,
        }
    }

    /// Read `document`, reporting content problems to `sink` when present.
    pub fn new(document: impl Into<String>, sink: Option<&'a mut dyn DiagnosticSink>) -> Self {
        ReadContext {
            document: document.into(),
            sink,
        }
    }

    /// The document being read.
    pub fn document(&self) -> &str {
        &self.document
    }

    /// `document(line)` for an element.
    pub fn location(&self, element: &Element) -> String {
        format!("{}({})", self.document, element.line)
    }

    /// Report a content problem, or fail with it when there is no sink.
    pub fn content_error(&mut self, error: IrError) -> Result<()> {
        match self.sink.as_deref_mut() {
            Some(sink) => {
                sink.report(error.to_diagnostic());
                Ok(())
            }
            None => Err(error),
        }
    }

    /// Error for a child element the reader does not understand.
    pub fn unexpected(&self, parent: &Element, child: &Element) -> IrError {
        IrError::UnexpectedElement {
            location: self.location(child),
            parent: parent.name.clone(),
            element: child.name.clone(),
        }
    }

    /// A required attribute. Absence is structural and always fails.
    pub fn required<'e>(&self, element: &'e Element, name: &str) -> Result<&'e str> {
        element
            .non_empty_attr(name)
            .ok_or_else(|| IrError::ExpectedAttribute {
                location: self.location(element),
                element: element.name.clone(),
                attribute: name.to_string(),
            })
    }

    fn illegal(&self, element: &Element, name: &str, value: &str, expected: &str) -> IrError {
        IrError::IllegalAttributeValue {
            location: self.location(element),
            element: element.name.clone(),
            attribute: name.to_string(),
            value: value.to_string(),
            expected: expected.to_string(),
        }
    }

    /// A `yes`/`no` attribute.
    pub fn yes_no(&mut self, element: &Element, name: &str) -> Result<Option<bool>> {
        match element.attr(name) {
            None => Ok(None),
            Some("yes") => Ok(Some(true)),
            Some("no") => Ok(Some(false)),
            Some(other) => {
                let err = self.illegal(element, name, other, "`yes` or `no`");
                self.content_error(err)?;
                Ok(None)
            }
        }
    }

    /// An integer attribute constrained to `min..=max`.
    pub fn integer(
        &mut self,
        element: &Element,
        name: &str,
        min: i32,
        max: i32,
    ) -> Result<Option<i32>> {
        let Some(raw) = element.attr(name) else {
            return Ok(None);
        };

        match raw.trim().parse::<i32>() {
            Ok(value) if (min..=max).contains(&value) => Ok(Some(value)),
            _ => {
                let expected = format!("an integer between {} and {}", min, max);
                let err = self.illegal(element, name, raw, &expected);
                self.content_error(err)?;
                Ok(None)
            }
        }
    }

    /// A code page given as a number or a well-known web name.
    pub fn codepage(&mut self, element: &Element, name: &str) -> Result<Option<u32>> {
        let Some(raw) = element.attr(name) else {
            return Ok(None);
        };

        match parse_codepage(raw) {
            Some(codepage) => Ok(Some(codepage)),
            None => {
                let err = self.illegal(element, name, raw, "a code page number or name");
                self.content_error(err)?;
                Ok(None)
            }
        }
    }

    /// A required attribute that must be a legal identifier.
    pub fn identifier<'e>(&mut self, element: &'e Element, name: &str) -> Result<&'e str> {
        let value = self.required(element, name)?;
        if !is_legal_identifier(value) {
            let err = self.illegal(element, name, value, "a legal identifier");
            self.content_error(err)?;
        }
        Ok(value)
    }
}

/// Parse a code page number or name. `None` when unrecognized.
pub fn parse_codepage(raw: &str) -> Option<u32> {
    let raw = raw.trim();
    if let Ok(number) = raw.parse::<u32>() {
        return (number <= 65535).then_some(number);
    }

    match raw.to_ascii_lowercase().as_str() {
        "utf-8" | "utf8" => Some(65001),
        "us-ascii" | "ascii" => Some(20127),
        "windows-1250" => Some(1250),
        "windows-1251" => Some(1251),
        "windows-1252" => Some(1252),
        "iso-8859-1" | "latin1" => Some(28591),
        "shift_jis" => Some(932),
        "gb2312" => Some(936),
        "big5" => Some(950),
        _ => None,
    }
}

/// Thin wrapper over `quick_xml::Writer` with the shapes our documents use.
pub struct XmlWriter<W: Write> {
    inner: Writer<W>,
}

impl<W: Write> XmlWriter<W> {
    /// Create an indenting writer and emit the XML declaration.
    pub fn new(sink: W) -> std::io::Result<Self> {
        let mut inner = Writer::new_with_indent(sink, b' ', 2);
        inner.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
        Ok(XmlWriter { inner })
    }

    fn start_tag<'n>(name: &'n str, attrs: &[(&str, Cow<'_, str>)]) -> BytesStart<'n> {
        let mut start = BytesStart::new(name);
        for (key, value) in attrs {
            start.push_attribute((*key, value.as_ref()));
        }
        start
    }

    /// Open an element.
    pub fn start(&mut self, name: &str, attrs: &[(&str, Cow<'_, str>)]) -> std::io::Result<()> {
        self.inner.write_event(Event::Start(Self::start_tag(name, attrs)))
    }

    /// Close an element.
    pub fn end(&mut self, name: &str) -> std::io::Result<()> {
        self.inner.write_event(Event::End(BytesEnd::new(name)))
    }

    /// Write `<name attrs>text</name>`, or `<name attrs/>` when there is no text.
    pub fn leaf(
        &mut self,
        name: &str,
        attrs: &[(&str, Cow<'_, str>)],
        text: Option<&str>,
    ) -> std::io::Result<()> {
        match text {
            Some(text) if !text.is_empty() => {
                self.inner.write_event(Event::Start(Self::start_tag(name, attrs)))?;
                self.inner.write_event(Event::Text(BytesText::new(text)))?;
                self.inner.write_event(Event::End(BytesEnd::new(name)))
            }
            _ => self.inner.write_event(Event::Empty(Self::start_tag(name, attrs))),
        }
    }

    /// Finish and return the underlying sink.
    pub fn into_inner(self) -> W {
        self.inner.into_inner()
    }
}
