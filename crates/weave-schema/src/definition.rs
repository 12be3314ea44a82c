use indexmap::IndexMap;

use crate::primitive::PrimitiveKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cardinality {
    ZeroToOne,
    ZeroToMany,
    ExactlyOne,
    OneToMany,
}

impl Cardinality {
    pub fn is_repeating(self) -> bool {
        matches!(self, Cardinality::ZeroToMany | Cardinality::OneToMany)
    }

    pub fn is_required(self) -> bool {
        matches!(self, Cardinality::ExactlyOne | Cardinality::OneToMany)
    }
}

/// How the value of a field is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Primitive(PrimitiveKind),
    /// A composite of the named type.
    Composite(String),
    /// A composite of the registry's reference type whose target field
    /// becomes a weak [`weave_document::Reference`].
    Reference,
    /// Embedded formatted text captured verbatim.
    Markup,
    /// A generic extension slot addressed by element name.
    Extension { modifier: bool },
    /// A nested record of any top-level type.
    EmbeddedRecord,
    /// Records contained in, and addressable only within, the owning record.
    ContainedRecords,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDefinition {
    pub name: String,
    pub kind: FieldKind,
    pub cardinality: Cardinality,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, kind: FieldKind, cardinality: Cardinality) -> Self {
        Self {
            name: name.into(),
            kind,
            cardinality,
        }
    }

    pub fn optional(name: impl Into<String>, kind: FieldKind) -> Self {
        Self::new(name, kind, Cardinality::ZeroToOne)
    }

    pub fn repeating(name: impl Into<String>, kind: FieldKind) -> Self {
        Self::new(name, kind, Cardinality::ZeroToMany)
    }

    pub fn required(name: impl Into<String>, kind: FieldKind) -> Self {
        Self::new(name, kind, Cardinality::ExactlyOne)
    }
}

/// An extension the schema knows by url.
///
/// Its payload is stored in the owner's field `field` instead of the generic
/// extension list. Declared extensions with `nested` children store a value of
/// `container_type` in that field, and the nested payloads go into it.
/// Single-valued unless widened with [`DeclaredExtension::with_cardinality`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredExtension {
    pub url: String,
    pub field: String,
    pub cardinality: Cardinality,
    pub value: Option<FieldKind>,
    pub container_type: Option<String>,
    pub nested: IndexMap<String, DeclaredExtension>,
}

impl DeclaredExtension {
    pub fn with_value(url: impl Into<String>, field: impl Into<String>, value: FieldKind) -> Self {
        Self {
            url: url.into(),
            field: field.into(),
            cardinality: Cardinality::ZeroToOne,
            value: Some(value),
            container_type: None,
            nested: IndexMap::new(),
        }
    }

    pub fn with_children(
        url: impl Into<String>,
        field: impl Into<String>,
        container_type: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            field: field.into(),
            cardinality: Cardinality::ZeroToOne,
            value: None,
            container_type: Some(container_type.into()),
            nested: IndexMap::new(),
        }
    }

    pub fn with_cardinality(mut self, cardinality: Cardinality) -> Self {
        self.cardinality = cardinality;
        self
    }

    pub fn nest(mut self, child: DeclaredExtension) -> Self {
        self.nested.insert(child.url.clone(), child);
        self
    }

    pub fn has_children(&self) -> bool {
        !self.nested.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// May appear at a record boundary.
    Record,
    Composite,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDefinition {
    pub name: String,
    pub kind: TypeKind,
    pub base: Option<String>,
    pub fields: IndexMap<String, FieldDefinition>,
    pub declared_extensions: IndexMap<String, DeclaredExtension>,
}

impl TypeDefinition {
    pub fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            base: None,
            fields: IndexMap::new(),
            declared_extensions: IndexMap::new(),
        }
    }

    pub fn record(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Record)
    }

    pub fn composite(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Composite)
    }

    /// Inherit every field and declared extension of `base`.
    pub fn extends(mut self, base: impl Into<String>) -> Self {
        self.base = Some(base.into());
        self
    }

    pub fn field(mut self, field: FieldDefinition) -> Self {
        self.fields.insert(field.name.clone(), field);
        self
    }

    pub fn declared_extension(mut self, extension: DeclaredExtension) -> Self {
        self.declared_extensions
            .insert(extension.url.clone(), extension);
        self
    }

    pub fn is_record(&self) -> bool {
        self.kind == TypeKind::Record
    }

    pub fn get_field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.get(name)
    }

    /// The field holding contained records, if the type has one.
    pub fn contained_field(&self) -> Option<&FieldDefinition> {
        self.fields
            .values()
            .find(|field| field.kind == FieldKind::ContainedRecords)
    }
}
