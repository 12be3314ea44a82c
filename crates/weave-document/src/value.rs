use core::fmt;

use indexmap::IndexMap;

use crate::document::ValueId;

/// Field values of a composite, in order of first appearance.
///
/// Every field maps to the list of values populated for it; singular fields
/// hold at most one entry.
pub type FieldMap = IndexMap<String, Vec<ValueId>>;

/// A validated scalar.
#[derive(Debug, Clone, PartialEq)]
pub enum PrimitiveValue {
    String(String),
    Boolean(bool),
    Integer(i64),
    /// Decimal text as it appeared on the wire, validated but not rounded.
    Decimal(String),
}

impl PrimitiveValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PrimitiveValue::String(s) | PrimitiveValue::Decimal(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for PrimitiveValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrimitiveValue::String(s) | PrimitiveValue::Decimal(s) => f.write_str(s),
            PrimitiveValue::Boolean(b) => write!(f, "{b}"),
            PrimitiveValue::Integer(n) => write!(f, "{n}"),
        }
    }
}

impl From<&str> for PrimitiveValue {
    fn from(s: &str) -> Self {
        PrimitiveValue::String(s.to_string())
    }
}

impl From<String> for PrimitiveValue {
    fn from(s: String) -> Self {
        PrimitiveValue::String(s)
    }
}

impl From<bool> for PrimitiveValue {
    fn from(b: bool) -> Self {
        PrimitiveValue::Boolean(b)
    }
}

impl From<i64> for PrimitiveValue {
    fn from(n: i64) -> Self {
        PrimitiveValue::Integer(n)
    }
}

/// A weak link to another record of the same document.
///
/// Holds only the identity string until the record is resolved; `link` is
/// never an owning edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub target: String,
    pub link: Option<ValueId>,
}

impl Reference {
    pub fn unresolved(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            link: None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.link.is_some()
    }

    /// Local references address a contained record of the same top-level record.
    pub fn is_local(&self, sigil: char) -> bool {
        self.target.starts_with(sigil)
    }
}

/// Where a record was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordOrigin {
    /// The outermost record of a parse.
    TopLevel,
    /// A record nested in an embedded-record field of another record.
    Embedded,
    /// A record stored in its owner's contained list.
    Contained,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordInfo {
    pub origin: RecordOrigin,
    pub version_id: Option<String>,
}

/// Comments attached around a value by the event source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Comments {
    pub pre: Vec<String>,
    pub post: Vec<String>,
}

impl Comments {
    pub fn is_empty(&self) -> bool {
        self.pre.is_empty() && self.post.is_empty()
    }
}

/// A url-identified attachment.
///
/// Carries either a single payload value or nested extensions (stored in the
/// owning [`TypedValue::extensions`]), never both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionContent {
    pub url: Option<String>,
    pub modifier: bool,
    pub value: Option<ValueId>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValueContent {
    Composite(FieldMap),
    /// `None` when the element was present without a value (e.g. only extensions).
    Primitive(Option<PrimitiveValue>),
    /// Embedded formatted text, opaque to the schema.
    Markup(String),
    Extension(ExtensionContent),
}

impl ValueContent {
    pub fn empty_composite() -> Self {
        ValueContent::Composite(FieldMap::new())
    }
}

/// An instance of some type definition.
#[derive(Debug, Clone)]
pub struct TypedValue {
    pub type_name: String,
    /// Element identity, or record identity for records.
    pub id: Option<String>,
    pub content: ValueContent,
    pub extensions: Vec<ValueId>,
    pub modifier_extensions: Vec<ValueId>,
    /// Present on cross-reference values that named a target.
    pub reference: Option<Reference>,
    /// Present on records.
    pub record: Option<RecordInfo>,
    pub comments: Comments,
}

impl TypedValue {
    pub fn new(type_name: impl Into<String>, content: ValueContent) -> Self {
        Self {
            type_name: type_name.into(),
            id: None,
            content,
            extensions: Vec::new(),
            modifier_extensions: Vec::new(),
            reference: None,
            record: None,
            comments: Comments::default(),
        }
    }

    pub fn composite(type_name: impl Into<String>) -> Self {
        Self::new(type_name, ValueContent::empty_composite())
    }

    pub fn primitive(type_name: impl Into<String>, value: Option<PrimitiveValue>) -> Self {
        Self::new(type_name, ValueContent::Primitive(value))
    }

    pub fn is_record(&self) -> bool {
        self.record.is_some()
    }

    pub fn has_id(&self) -> bool {
        self.id.as_deref().is_some_and(|id| !id.is_empty())
    }

    pub fn as_fields(&self) -> Option<&FieldMap> {
        match &self.content {
            ValueContent::Composite(fields) => Some(fields),
            _ => None,
        }
    }

    pub fn as_primitive(&self) -> Option<&PrimitiveValue> {
        match &self.content {
            ValueContent::Primitive(value) => value.as_ref(),
            _ => None,
        }
    }

    pub fn as_markup(&self) -> Option<&str> {
        match &self.content {
            ValueContent::Markup(markup) => Some(markup),
            _ => None,
        }
    }

    pub fn as_extension(&self) -> Option<&ExtensionContent> {
        match &self.content {
            ValueContent::Extension(ext) => Some(ext),
            _ => None,
        }
    }

    pub fn as_extension_mut(&mut self) -> Option<&mut ExtensionContent> {
        match &mut self.content {
            ValueContent::Extension(ext) => Some(ext),
            _ => None,
        }
    }

    /// Values held by the field `name`; empty when absent or not a composite.
    pub fn field(&self, name: &str) -> &[ValueId] {
        self.as_fields()
            .and_then(|fields| fields.get(name))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
