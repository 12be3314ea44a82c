//! Re-encode a parsed record as structural events.
//!
//! Feeding the output back through a [`crate::Parser`] rebuilds an equal
//! record. Fields the record's type does not define are dropped unless a
//! declared extension stores its payload there.

use weave_document::{Document, TypedValue, ValueContent, ValueId};
use weave_schema::{DeclaredExtension, FieldKind, SchemaRegistry, TypeDefinition};

use crate::event::Event;

pub fn replay(document: &Document, registry: &SchemaRegistry, record: ValueId) -> Vec<Event> {
    let mut replayer = Replayer {
        document,
        registry,
        events: Vec::new(),
    };
    replayer.record(record);
    replayer.events
}

struct Replayer<'a> {
    document: &'a Document,
    registry: &'a SchemaRegistry,
    events: Vec<Event>,
}

impl Replayer<'_> {
    fn record(&mut self, id: ValueId) {
        let value = self.document.value(id);
        let name = self.registry.record_name(&value.type_name).to_string();
        self.element(&name, id);
    }

    fn element(&mut self, name: &str, id: ValueId) {
        let document = self.document;
        let value = document.value(id);
        self.pre_comments(value);
        self.events.push(Event::enter(name));
        self.body(id);
        self.events.push(Event::Exit);
        self.post_comments(value);
    }

    fn body(&mut self, id: ValueId) {
        let (document, registry) = (self.document, self.registry);
        let conventions = registry.conventions();
        let value = document.value(id);
        match &value.content {
            ValueContent::Primitive(Some(primitive)) => self.events.push(Event::attribute(
                conventions.value_attribute.as_str(),
                primitive.to_string(),
            )),
            ValueContent::Markup(markup) => {
                self.events.push(Event::attribute(
                    conventions.value_attribute.as_str(),
                    markup.as_str(),
                ));
                return;
            }
            _ => {}
        }
        if let Some(identity) = &value.id {
            self.events.push(Event::attribute(
                conventions.id_attribute.as_str(),
                identity.as_str(),
            ));
        }
        for &extension in value.extensions.iter().chain(&value.modifier_extensions) {
            self.extension(extension);
        }

        let Some(fields) = value.as_fields() else {
            return;
        };
        let definition = registry.lookup_type(&value.type_name);
        for (name, children) in fields {
            match definition.and_then(|definition| definition.get_field(name)) {
                Some(field) => {
                    for &child in children {
                        self.field(name, &field.kind, child);
                    }
                }
                None => {
                    if let Some(declared) = definition.and_then(|d| declared_for_field(d, name)) {
                        for &child in children {
                            self.declared(declared, child);
                        }
                    }
                }
            }
        }
    }

    fn field(&mut self, name: &str, kind: &FieldKind, child: ValueId) {
        match kind {
            FieldKind::EmbeddedRecord | FieldKind::ContainedRecords => {
                self.events.push(Event::enter(name));
                self.record(child);
                self.events.push(Event::Exit);
            }
            _ => self.element(name, child),
        }
    }

    fn extension(&mut self, id: ValueId) {
        let (document, registry) = (self.document, self.registry);
        let value = document.value(id);
        let Some(content) = value.as_extension() else {
            return;
        };
        self.pre_comments(value);
        self.events.push(Event::Extension {
            url: content.url.clone(),
            modifier: content.modifier,
        });
        if let Some(identity) = &value.id {
            let id_attribute = registry.conventions().id_attribute.as_str();
            self.events
                .push(Event::attribute(id_attribute, identity.as_str()));
        }
        for &nested in value.extensions.iter().chain(&value.modifier_extensions) {
            self.extension(nested);
        }
        if let Some(payload) = content.value {
            let name = self.payload_name(document.value(payload));
            self.element(&name, payload);
        }
        self.events.push(Event::Exit);
        self.post_comments(value);
    }

    /// A declared extension whose payload was stored in a field.
    fn declared(&mut self, definition: &DeclaredExtension, child: ValueId) {
        let document = self.document;
        self.events.push(Event::extension(definition.url.as_str()));
        if definition.has_children() {
            for nested in definition.nested.values() {
                for &value in document.field_values(child, &nested.field) {
                    self.declared(nested, value);
                }
            }
        } else {
            let name = self.payload_name(document.value(child));
            self.element(&name, child);
        }
        self.events.push(Event::Exit);
    }

    /// `valueString`, `valueCoding`, ... for a payload value.
    fn payload_name(&self, payload: &TypedValue) -> String {
        let prefix = &self.registry.conventions().value_prefix;
        let mut chars = payload.type_name.chars();
        match chars.next() {
            Some(first) => format!("{prefix}{}{}", first.to_uppercase(), chars.as_str()),
            None => prefix.clone(),
        }
    }

    fn pre_comments(&mut self, value: &TypedValue) {
        self.events
            .extend(value.comments.pre.iter().cloned().map(Event::CommentPre));
    }

    fn post_comments(&mut self, value: &TypedValue) {
        self.events
            .extend(value.comments.post.iter().cloned().map(Event::CommentPost));
    }
}

fn declared_for_field<'d>(
    definition: &'d TypeDefinition,
    field: &str,
) -> Option<&'d DeclaredExtension> {
    definition
        .declared_extensions
        .values()
        .find(|declared| declared.field == field)
}
