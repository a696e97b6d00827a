//! Data types used throughout the engine.
//!
//! This module contains the "model" structs and enums that represent
//! reflected PHP information (classes, methods, properties, imports) as
//! well as the values handed back to callers: inferred types, completion
//! suggestions and snippet edits.
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;
use std::path::PathBuf;

use serde::Serialize;

use crate::util::short_name;

/// A fully-qualified class name split into namespace and short name.
///
/// The canonical string form is `Namespace\Short` (no leading `\`), or
/// just `Short` for classes in the global namespace.  Equality is an
/// exact, case-sensitive comparison of both parts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassName {
    namespace: String,
    short: String,
}

impl ClassName {
    pub fn new(namespace: impl Into<String>, short: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            short: short.into(),
        }
    }

    /// Parse a fully-qualified name such as `App\Sub\Foo` (a leading `\`
    /// is accepted and dropped).
    pub fn from_fqcn(fqcn: &str) -> Self {
        let name = fqcn.strip_prefix('\\').unwrap_or(fqcn);
        let short = short_name(name);
        let namespace = if name.len() > short.len() {
            &name[..name.len() - short.len() - 1]
        } else {
            ""
        };
        Self::new(namespace, short)
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn short_name(&self) -> &str {
        &self.short
    }

    pub fn is_global(&self) -> bool {
        self.namespace.is_empty()
    }
}

impl fmt::Display for ClassName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}", self.short)
        } else {
            write!(f, "{}\\{}", self.namespace, self.short)
        }
    }
}

impl Serialize for ClassName {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Half-open byte range `[start, end)` into a source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct OffsetRange {
    pub start: u32,
    pub end: u32,
}

impl OffsetRange {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// An empty range used for pure insertions.
    pub fn at(offset: u32) -> Self {
        Self::new(offset, offset)
    }

    pub fn contains(&self, offset: u32) -> bool {
        offset >= self.start && offset < self.end
    }

    /// Whether `other` lies entirely inside this range.
    pub fn encloses(&self, other: &OffsetRange) -> bool {
        other.start >= self.start && other.end <= self.end
    }

    pub fn overlaps(&self, other: &OffsetRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn as_usize(&self) -> Range<usize> {
        self.start as usize..self.end as usize
    }
}

/// Which class-like construct a [`ReflectedClass`] was declared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassLikeKind {
    Class,
    Interface,
    Trait,
}

impl ClassLikeKind {
    /// The PHP keyword that introduces this kind of declaration.
    pub fn keyword(self) -> &'static str {
        match self {
            ClassLikeKind::Class => "class",
            ClassLikeKind::Interface => "interface",
            ClassLikeKind::Trait => "trait",
        }
    }
}

/// Visibility of a class member (method or property).
///
/// In PHP, members without an explicit visibility modifier default to `Public`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    Protected,
    Private,
}

impl Visibility {
    pub fn keyword(self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Protected => "protected",
            Visibility::Private => "private",
        }
    }
}

/// A parameter of a reflected method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReflectedParameter {
    /// The parameter name WITHOUT the `$` prefix.
    pub name: String,
    /// The type hint exactly as written (e.g. `?Foo`, `int|string`).
    pub declared_type: Option<String>,
    /// The default value expression exactly as written, if any.
    pub default_value: Option<String>,
    pub is_variadic: bool,
    pub is_reference: bool,
}

impl ReflectedParameter {
    /// Render the parameter the way it appears in a signature.
    pub fn to_source(&self) -> String {
        let mut out = String::new();
        if let Some(ref ty) = self.declared_type {
            out.push_str(ty);
            out.push(' ');
        }
        if self.is_reference {
            out.push('&');
        }
        if self.is_variadic {
            out.push_str("...");
        }
        out.push('$');
        out.push_str(&self.name);
        if let Some(ref default) = self.default_value {
            out.push_str(" = ");
            out.push_str(default);
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReflectedMethod {
    pub name: String,
    pub visibility: Visibility,
    pub parameters: Vec<ReflectedParameter>,
    /// Return type hint exactly as written.
    pub return_type: Option<String>,
    /// Abstract methods and every interface method.
    pub is_abstract: bool,
    pub is_static: bool,
}

impl ReflectedMethod {
    /// `name(Type $a, $b = 1): Ret`
    pub fn signature(&self) -> String {
        let params: Vec<String> = self.parameters.iter().map(|p| p.to_source()).collect();
        match self.return_type {
            Some(ref ret) => format!("{}({}): {}", self.name, params.join(", "), ret),
            None => format!("{}({})", self.name, params.join(", ")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReflectedProperty {
    /// The property name WITHOUT the `$` prefix.
    pub name: String,
    pub visibility: Visibility,
    pub declared_type: Option<String>,
    pub is_static: bool,
    pub is_abstract: bool,
}

/// Structural model of one class-like declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReflectedClass {
    pub name: ClassName,
    pub kind: ClassLikeKind,
    /// Always `None` for interfaces: every interface they extend is
    /// listed in `implemented`.
    pub parent: Option<ClassName>,
    pub implemented: Vec<ClassName>,
    pub traits: Vec<ClassName>,
    pub methods: Vec<ReflectedMethod>,
    pub properties: Vec<ReflectedProperty>,
    /// Properties written through `$this->name = …` inside this class's
    /// own methods, whether or not they are declared.
    pub assigned_properties: Vec<ReflectedProperty>,
    pub imports: BTreeMap<String, ClassName>,
    pub is_abstract: bool,
    /// Span of the short-name token in the declaration header.
    pub name_span: OffsetRange,
    /// From the opening `{` to one past the closing `}`.
    pub body: OffsetRange,
}

impl ReflectedClass {
    pub fn method(&self, name: &str) -> Option<&ReflectedMethod> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub fn property(&self, name: &str) -> Option<&ReflectedProperty> {
        self.properties.iter().find(|p| p.name == name)
    }
}

/// The inferred type of an expression or variable.
///
/// `Unknown` is a first-class value, not an error: every consumer must
/// tolerate it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum InferredType {
    Class(ClassName),
    Scalar(String),
    #[default]
    Unknown,
}

impl InferredType {
    pub fn class_name(&self) -> Option<&ClassName> {
        match self {
            InferredType::Class(name) => Some(name),
            _ => None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, InferredType::Unknown)
    }
}

impl fmt::Display for InferredType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InferredType::Class(name) => write!(f, "{}", name),
            InferredType::Scalar(name) => write!(f, "{}", name),
            InferredType::Unknown => write!(f, "<unknown>"),
        }
    }
}

impl Serialize for InferredType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// What a completion suggestion refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionKind {
    Variable,
    Method,
    Property,
    Class,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionSuggestion {
    pub label: String,
    pub kind: SuggestionKind,
    pub insert_text: String,
    pub detail: String,
}

/// A single textual edit produced by a snippet generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnippetEdit {
    /// Project-relative path of the file the edit applies to.
    pub path: PathBuf,
    pub target_range: OffsetRange,
    pub replacement_text: String,
}

impl SnippetEdit {
    /// An edit that changes nothing, returned when there is nothing to add.
    pub fn noop(path: PathBuf, offset: u32) -> Self {
        Self {
            path,
            target_range: OffsetRange::at(offset),
            replacement_text: String::new(),
        }
    }

    pub fn is_noop(&self) -> bool {
        self.target_range.is_empty() && self.replacement_text.is_empty()
    }
}
