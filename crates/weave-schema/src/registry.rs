use ahash::AHashMap;
use indexmap::IndexMap;

use crate::definition::{DeclaredExtension, FieldKind, TypeDefinition};
use crate::primitive::PrimitiveKind;

/// Names the parser relies on that differ between schema families.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conventions {
    pub collection_type: String,
    pub reference_type: String,
    pub reference_field: String,
    pub value_attribute: String,
    pub id_attribute: String,
    pub url_attribute: String,
    pub local_sigil: char,
    pub meta_field: String,
    pub profile_field: String,
    pub version_field: String,
    pub value_prefix: String,
}

impl Default for Conventions {
    fn default() -> Self {
        Self {
            collection_type: "Bundle".to_string(),
            reference_type: "Reference".to_string(),
            reference_field: "reference".to_string(),
            value_attribute: "value".to_string(),
            id_attribute: "id".to_string(),
            url_attribute: "url".to_string(),
            local_sigil: '#',
            meta_field: "meta".to_string(),
            profile_field: "profile".to_string(),
            version_field: "versionId".to_string(),
            value_prefix: "value".to_string(),
        }
    }
}

impl Conventions {
    pub fn with_collection_type(mut self, name: impl Into<String>) -> Self {
        self.collection_type = name.into();
        self
    }

    pub fn with_reference_type(mut self, name: impl Into<String>) -> Self {
        self.reference_type = name.into();
        self
    }

    pub fn with_reference_field(mut self, name: impl Into<String>) -> Self {
        self.reference_field = name.into();
        self
    }

    pub fn with_local_sigil(mut self, sigil: char) -> Self {
        self.local_sigil = sigil;
        self
    }

    pub fn with_value_attribute(mut self, name: impl Into<String>) -> Self {
        self.value_attribute = name.into();
        self
    }
}

#[derive(Debug, PartialEq, Eq, thiserror::Error, Clone)]
pub enum RegistryError {
    #[error("type '{0}' is defined twice")]
    DuplicateType(String),
    #[error("type '{name}' extends unknown type '{base}'")]
    UnknownBase { name: String, base: String },
    #[error("type '{0}' inherits from itself")]
    InheritanceCycle(String),
    #[error("field '{field}' of '{name}' refers to unknown type '{target}'")]
    UnknownFieldType {
        name: String,
        field: String,
        target: String,
    },
}

/// Read-only lookup from type name to definition.
///
/// Inherited fields are flattened into each definition when the registry is
/// built, so a definition always lists everything it accepts.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    types: IndexMap<String, TypeDefinition>,
    by_lowercase: AHashMap<String, String>,
    conventions: Conventions,
}

impl SchemaRegistry {
    pub fn builder() -> SchemaRegistryBuilder {
        SchemaRegistryBuilder::default()
    }

    pub fn conventions(&self) -> &Conventions {
        &self.conventions
    }

    pub fn types(&self) -> impl Iterator<Item = &TypeDefinition> {
        self.types.values()
    }

    pub fn lookup_type(&self, name: &str) -> Option<&TypeDefinition> {
        self.types.get(name)
    }

    pub fn lookup_top_level_type(&self, name: &str) -> Option<&TypeDefinition> {
        self.lookup_type(name).filter(|definition| definition.is_record())
    }

    /// Record type whose name differs from `name` only by case.
    pub fn lookup_top_level_type_ignore_case(&self, name: &str) -> Option<&TypeDefinition> {
        self.by_lowercase
            .get(&name.to_lowercase())
            .and_then(|actual| self.lookup_top_level_type(actual))
    }

    pub fn declared_extension_for(&self, type_name: &str, url: &str) -> Option<&DeclaredExtension> {
        self.lookup_type(type_name)
            .and_then(|definition| definition.declared_extensions.get(url))
    }

    /// Kind of an extension payload element such as `valueString` or
    /// `valueCoding`.
    pub fn extension_value_kind(&self, element_name: &str) -> Option<FieldKind> {
        let suffix = element_name.strip_prefix(self.conventions.value_prefix.as_str())?;
        let mut chars = suffix.chars();
        let first = chars.next()?;
        if !first.is_uppercase() {
            return None;
        }
        let primitive_name: String = first.to_lowercase().chain(chars).collect();
        if let Some(kind) = PrimitiveKind::from_name(&primitive_name) {
            return Some(FieldKind::Primitive(kind));
        }
        if suffix == self.conventions.reference_type {
            return Some(FieldKind::Reference);
        }
        self.lookup_type(suffix)
            .filter(|definition| !definition.is_record())
            .map(|definition| FieldKind::Composite(definition.name.clone()))
    }

    /// Whether `sub` is `base` or inherits from it.
    pub fn is_specialization_of(&self, sub: &str, base: &str) -> bool {
        let mut current = Some(sub);
        while let Some(name) = current {
            if name == base {
                return true;
            }
            current = self.lookup_type(name).and_then(|d| d.base.as_deref());
        }
        false
    }

    /// Name under which records of `type_name` appear on the wire: the most
    /// general record type it specializes.
    pub fn record_name<'a>(&'a self, type_name: &'a str) -> &'a str {
        let mut name = type_name;
        let mut current = self.lookup_type(type_name);
        while let Some(base) = current
            .and_then(|d| d.base.as_deref())
            .and_then(|base| self.lookup_type(base))
        {
            if base.is_record() {
                name = &base.name;
            }
            current = Some(base);
        }
        name
    }

    pub fn is_collection_type(&self, name: &str) -> bool {
        name == self.conventions.collection_type
    }
}

#[derive(Debug, Default)]
pub struct SchemaRegistryBuilder {
    types: Vec<TypeDefinition>,
    conventions: Conventions,
}

impl SchemaRegistryBuilder {
    pub fn conventions(mut self, conventions: Conventions) -> Self {
        self.conventions = conventions;
        self
    }

    pub fn define(mut self, definition: TypeDefinition) -> Self {
        self.types.push(definition);
        self
    }

    pub fn build(self) -> Result<SchemaRegistry, RegistryError> {
        let mut declared: IndexMap<String, TypeDefinition> = IndexMap::new();
        for definition in self.types {
            if declared.contains_key(&definition.name) {
                return Err(RegistryError::DuplicateType(definition.name));
            }
            declared.insert(definition.name.clone(), definition);
        }

        let mut types = IndexMap::with_capacity(declared.len());
        for name in declared.keys() {
            types.insert(name.clone(), flatten(&declared, name)?);
        }

        for definition in types.values() {
            for field in definition.fields.values() {
                if let FieldKind::Composite(target) = &field.kind
                    && !types.contains_key(target)
                {
                    return Err(RegistryError::UnknownFieldType {
                        name: definition.name.clone(),
                        field: field.name.clone(),
                        target: target.clone(),
                    });
                }
            }
        }

        let by_lowercase = types
            .values()
            .filter(|definition| definition.is_record())
            .map(|definition| (definition.name.to_lowercase(), definition.name.clone()))
            .collect();

        Ok(SchemaRegistry {
            types,
            by_lowercase,
            conventions: self.conventions,
        })
    }
}

/// Merge the base chain of `name` into one definition, base fields first.
fn flatten(
    declared: &IndexMap<String, TypeDefinition>,
    name: &str,
) -> Result<TypeDefinition, RegistryError> {
    let mut chain = Vec::new();
    let mut current = name;
    loop {
        if chain.iter().any(|d: &&TypeDefinition| d.name == current) {
            return Err(RegistryError::InheritanceCycle(name.to_string()));
        }
        let definition = &declared[current];
        chain.push(definition);
        match &definition.base {
            Some(base) => {
                if !declared.contains_key(base) {
                    return Err(RegistryError::UnknownBase {
                        name: current.to_string(),
                        base: base.clone(),
                    });
                }
                current = base;
            }
            None => break,
        }
    }

    let own = chain[0];
    let mut flattened = TypeDefinition::new(own.name.clone(), own.kind);
    flattened.base = own.base.clone();
    for definition in chain.iter().rev() {
        for (field_name, field) in &definition.fields {
            flattened.fields.insert(field_name.clone(), field.clone());
        }
        for (url, extension) in &definition.declared_extensions {
            flattened
                .declared_extensions
                .insert(url.clone(), extension.clone());
        }
    }
    Ok(flattened)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::FieldDefinition;

    fn registry() -> SchemaRegistry {
        SchemaRegistry::builder()
            .define(TypeDefinition::composite("Coding").field(FieldDefinition::optional(
                "code",
                FieldKind::Primitive(PrimitiveKind::Code),
            )))
            .define(
                TypeDefinition::record("Observation")
                    .field(FieldDefinition::optional(
                        "status",
                        FieldKind::Primitive(PrimitiveKind::Code),
                    ))
                    .field(FieldDefinition::repeating(
                        "code",
                        FieldKind::Composite("Coding".into()),
                    )),
            )
            .define(
                TypeDefinition::record("VitalSigns")
                    .extends("Observation")
                    .field(FieldDefinition::optional(
                        "status",
                        FieldKind::Primitive(PrimitiveKind::String),
                    )),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_flattened_inheritance() {
        let registry = registry();
        let vitals = registry.lookup_type("VitalSigns").unwrap();
        let names: Vec<_> = vitals.fields.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["status", "code"]);
        assert_eq!(
            vitals.get_field("status").unwrap().kind,
            FieldKind::Primitive(PrimitiveKind::String)
        );
        assert!(registry.is_specialization_of("VitalSigns", "Observation"));
        assert!(!registry.is_specialization_of("Observation", "VitalSigns"));
        assert_eq!(registry.record_name("VitalSigns"), "Observation");
        assert_eq!(registry.record_name("Observation"), "Observation");
        assert_eq!(registry.record_name("Unknown"), "Unknown");
    }

    #[test]
    fn test_top_level_lookup() {
        let registry = registry();
        assert!(registry.lookup_top_level_type("Observation").is_some());
        assert!(registry.lookup_top_level_type("Coding").is_none());
        assert_eq!(
            registry
                .lookup_top_level_type_ignore_case("observation")
                .map(|d| d.name.as_str()),
            Some("Observation")
        );
    }

    #[test]
    fn test_extension_value_kind() {
        let registry = registry();
        assert_eq!(
            registry.extension_value_kind("valueString"),
            Some(FieldKind::Primitive(PrimitiveKind::String))
        );
        assert_eq!(
            registry.extension_value_kind("valueDateTime"),
            Some(FieldKind::Primitive(PrimitiveKind::DateTime))
        );
        assert_eq!(
            registry.extension_value_kind("valueCoding"),
            Some(FieldKind::Composite("Coding".into()))
        );
        assert_eq!(
            registry.extension_value_kind("valueReference"),
            Some(FieldKind::Reference)
        );
        assert_eq!(registry.extension_value_kind("valueObservation"), None);
        assert_eq!(registry.extension_value_kind("status"), None);
    }

    #[test]
    fn test_build_errors() {
        let duplicate = SchemaRegistry::builder()
            .define(TypeDefinition::record("A"))
            .define(TypeDefinition::record("A"))
            .build();
        assert_eq!(
            duplicate.unwrap_err(),
            RegistryError::DuplicateType("A".into())
        );

        let unknown_base = SchemaRegistry::builder()
            .define(TypeDefinition::record("A").extends("Missing"))
            .build();
        assert!(matches!(
            unknown_base,
            Err(RegistryError::UnknownBase { .. })
        ));

        let cycle = SchemaRegistry::builder()
            .define(TypeDefinition::record("A").extends("B"))
            .define(TypeDefinition::record("B").extends("A"))
            .build();
        assert!(matches!(cycle, Err(RegistryError::InheritanceCycle(_))));
    }
}
