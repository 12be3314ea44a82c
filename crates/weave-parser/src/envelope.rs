//! Message envelope consistency.
//!
//! A message is a collection whose first entry holds a header record naming
//! the event the message carries. Receivers check that event against the one
//! they expect before doing anything else with the payload.

use thiserror::Error;
use weave_document::Document;
use weave_schema::SchemaRegistry;

/// Names of the envelope parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvelopeConfig {
    pub type_field: String,
    pub message_type: String,
    pub header_type: String,
    pub event_field: String,
    pub entry_field: String,
    pub resource_field: String,
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self {
            type_field: "type".to_string(),
            message_type: "message".to_string(),
            header_type: "MessageHeader".to_string(),
            event_field: "eventUri".to_string(),
            entry_field: "entry".to_string(),
            resource_field: "resource".to_string(),
        }
    }
}

impl EnvelopeConfig {
    pub fn with_header_type(mut self, name: impl Into<String>) -> Self {
        self.header_type = name.into();
        self
    }

    pub fn with_event_field(mut self, name: impl Into<String>) -> Self {
        self.event_field = name.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvelopeError {
    #[error("Expected a message collection but the document root is '{found}'")]
    NotACollection { found: String },

    #[error("Collection type '{found}' is not a message")]
    NotAMessage { found: String },

    #[error("The first entry of the message does not hold a message header")]
    MissingHeader,

    #[error("Message event uri type {found} does not match the expected message type {expected}")]
    EventMismatch { found: String, expected: String },
}

/// Check that `document` is a message whose header announces
/// `expected_event`.
pub fn check_message(
    document: &Document,
    registry: &SchemaRegistry,
    config: &EnvelopeConfig,
    expected_event: &str,
) -> Result<(), EnvelopeError> {
    let Some(root) = document.root() else {
        return Err(EnvelopeError::NotACollection {
            found: String::new(),
        });
    };
    let root_type = &document.value(root).type_name;
    if !registry.is_collection_type(root_type) {
        return Err(EnvelopeError::NotACollection {
            found: root_type.clone(),
        });
    }

    let collection_type = document
        .field_primitive(root, &config.type_field)
        .map(ToString::to_string)
        .unwrap_or_default();
    if collection_type != config.message_type {
        return Err(EnvelopeError::NotAMessage {
            found: collection_type,
        });
    }

    let header = document
        .first_field(root, &config.entry_field)
        .and_then(|entry| document.first_field(entry, &config.resource_field))
        .filter(|&header| {
            let type_name = &document.value(header).type_name;
            registry.is_specialization_of(type_name, &config.header_type)
        })
        .ok_or(EnvelopeError::MissingHeader)?;

    let found = document
        .field_primitive(header, &config.event_field)
        .map(ToString::to_string)
        .unwrap_or_default();
    if found != expected_event {
        return Err(EnvelopeError::EventMismatch {
            found,
            expected: expected_event.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use weave_document::{PrimitiveValue, TypedValue, ValueId};
    use weave_schema::TypeDefinition;

    use super::*;

    fn registry() -> SchemaRegistry {
        SchemaRegistry::builder()
            .define(TypeDefinition::record("Bundle"))
            .define(TypeDefinition::record("MessageHeader"))
            .define(TypeDefinition::record("Patient"))
            .build()
            .unwrap()
    }

    fn text(doc: &mut Document, value: &str) -> ValueId {
        doc.create_value(TypedValue::primitive(
            "string",
            Some(PrimitiveValue::String(value.to_string())),
        ))
    }

    fn message(kind: &str, first: &str, event: &str) -> Document {
        let mut doc = Document::new();
        let bundle = doc.create_value(TypedValue::composite("Bundle"));
        let kind = text(&mut doc, kind);
        doc.push_field(bundle, "type", kind).unwrap();
        let entry = doc.create_value(TypedValue::composite("BundleEntry"));
        let header = doc.create_value(TypedValue::composite(first));
        let event = text(&mut doc, event);
        doc.push_field(header, "eventUri", event).unwrap();
        doc.push_field(entry, "resource", header).unwrap();
        doc.push_field(bundle, "entry", entry).unwrap();
        doc.set_root(bundle);
        doc
    }

    #[test]
    fn test_matching_message() {
        let doc = message("message", "MessageHeader", "http://example.org/admit");
        let config = EnvelopeConfig::default();
        assert_eq!(
            check_message(&doc, &registry(), &config, "http://example.org/admit"),
            Ok(())
        );
    }

    #[test]
    fn test_event_mismatch_message() {
        let doc = message("message", "MessageHeader", "http://example.org/admit");
        let error = check_message(
            &doc,
            &registry(),
            &EnvelopeConfig::default(),
            "http://example.org/discharge",
        )
        .unwrap_err();
        assert_eq!(
            error.to_string(),
            "Message event uri type http://example.org/admit does not match the expected message type http://example.org/discharge"
        );
    }

    #[test]
    fn test_rejections() {
        let registry = registry();
        let config = EnvelopeConfig::default();
        assert_eq!(
            check_message(&message("batch", "MessageHeader", "e"), &registry, &config, "e"),
            Err(EnvelopeError::NotAMessage {
                found: "batch".into()
            })
        );
        assert_eq!(
            check_message(&message("message", "Patient", "e"), &registry, &config, "e"),
            Err(EnvelopeError::MissingHeader)
        );

        let mut doc = Document::new();
        let patient = doc.create_value(TypedValue::composite("Patient"));
        doc.set_root(patient);
        assert_eq!(
            check_message(&doc, &registry, &config, "e"),
            Err(EnvelopeError::NotACollection {
                found: "Patient".into()
            })
        );
    }
}
