//! Shared fixture: a small registry shaped like a clinical record schema, and
//! helpers for writing event streams by hand.

#![allow(dead_code)]

use weave_document::{Document, ValueId};
use weave_parser::{CollectingSink, Event, ParseError, ParseOutput, ParserConfig, parse_events};
use weave_schema::{
    DeclaredExtension, FieldDefinition, FieldKind, PrimitiveKind, SchemaRegistry, TypeDefinition,
};

pub const VITAL_SIGNS_PROFILE: &str = "http://example.org/profiles/vitalsigns";
pub const BIRTH_PLACE: &str = "http://example.org/ext/birthPlace";
pub const RACE: &str = "http://example.org/ext/race";

fn primitive(name: &str, kind: PrimitiveKind) -> FieldDefinition {
    FieldDefinition::optional(name, FieldKind::Primitive(kind))
}

fn composite(name: &str, type_name: &str) -> FieldDefinition {
    FieldDefinition::optional(name, FieldKind::Composite(type_name.to_string()))
}

pub fn registry() -> SchemaRegistry {
    SchemaRegistry::builder()
        .define(
            TypeDefinition::composite("Meta")
                .field(primitive("versionId", PrimitiveKind::Id))
                .field(FieldDefinition::repeating(
                    "profile",
                    FieldKind::Primitive(PrimitiveKind::Uri),
                )),
        )
        .define(
            TypeDefinition::composite("Coding")
                .field(primitive("system", PrimitiveKind::Uri))
                .field(primitive("code", PrimitiveKind::Code))
                .field(primitive("display", PrimitiveKind::String)),
        )
        .define(
            TypeDefinition::composite("HumanName")
                .field(primitive("family", PrimitiveKind::String))
                .field(FieldDefinition::repeating(
                    "given",
                    FieldKind::Primitive(PrimitiveKind::String),
                )),
        )
        .define(
            TypeDefinition::composite("Reference")
                .field(primitive("reference", PrimitiveKind::String))
                .field(primitive("display", PrimitiveKind::String)),
        )
        .define(
            TypeDefinition::composite("Narrative")
                .field(primitive("status", PrimitiveKind::Code))
                .field(FieldDefinition::optional("div", FieldKind::Markup)),
        )
        .define(
            TypeDefinition::composite("PatientRace")
                .field(composite("ombCategory", "Coding"))
                .field(primitive("raceText", PrimitiveKind::String)),
        )
        .define(TypeDefinition::composite("Resource").field(composite("meta", "Meta")))
        .define(
            TypeDefinition::composite("DomainResource")
                .extends("Resource")
                .field(composite("text", "Narrative"))
                .field(FieldDefinition::repeating(
                    "contained",
                    FieldKind::ContainedRecords,
                ))
                .field(FieldDefinition::repeating(
                    "extension",
                    FieldKind::Extension { modifier: false },
                ))
                .field(FieldDefinition::repeating(
                    "modifierExtension",
                    FieldKind::Extension { modifier: true },
                )),
        )
        .define(
            TypeDefinition::composite("BundleRequest")
                .field(primitive("method", PrimitiveKind::Code))
                .field(primitive("url", PrimitiveKind::Uri)),
        )
        .define(
            TypeDefinition::composite("BundleEntry")
                .field(primitive("fullUrl", PrimitiveKind::Uri))
                .field(FieldDefinition::optional(
                    "resource",
                    FieldKind::EmbeddedRecord,
                ))
                .field(composite("request", "BundleRequest")),
        )
        .define(
            TypeDefinition::record("Bundle")
                .extends("Resource")
                .field(primitive("type", PrimitiveKind::Code))
                .field(FieldDefinition::repeating(
                    "entry",
                    FieldKind::Composite("BundleEntry".to_string()),
                )),
        )
        .define(
            TypeDefinition::record("Patient")
                .extends("DomainResource")
                .field(primitive("active", PrimitiveKind::Boolean))
                .field(FieldDefinition::repeating(
                    "name",
                    FieldKind::Composite("HumanName".to_string()),
                ))
                .field(primitive("gender", PrimitiveKind::Code))
                .field(primitive("birthDate", PrimitiveKind::Date))
                .field(FieldDefinition::optional(
                    "managingOrganization",
                    FieldKind::Reference,
                ))
                .field(FieldDefinition::repeating(
                    "generalPractitioner",
                    FieldKind::Reference,
                ))
                .declared_extension(DeclaredExtension::with_value(
                    BIRTH_PLACE,
                    "birthPlace",
                    FieldKind::Primitive(PrimitiveKind::String),
                ))
                .declared_extension(
                    DeclaredExtension::with_children(RACE, "race", "PatientRace")
                        .nest(DeclaredExtension::with_value(
                            "ombCategory",
                            "ombCategory",
                            FieldKind::Composite("Coding".to_string()),
                        ))
                        .nest(DeclaredExtension::with_value(
                            "text",
                            "raceText",
                            FieldKind::Primitive(PrimitiveKind::String),
                        )),
                ),
        )
        .define(
            TypeDefinition::record("Organization")
                .extends("DomainResource")
                .field(primitive("name", PrimitiveKind::String)),
        )
        .define(
            TypeDefinition::record("Observation")
                .extends("DomainResource")
                .field(primitive("status", PrimitiveKind::Code))
                .field(composite("code", "Coding"))
                .field(FieldDefinition::optional("subject", FieldKind::Reference))
                .field(FieldDefinition::repeating("performer", FieldKind::Reference)),
        )
        .define(
            TypeDefinition::record("VitalSigns")
                .extends("Observation")
                .field(FieldDefinition::required(
                    "status",
                    FieldKind::Primitive(PrimitiveKind::Code),
                )),
        )
        .define(
            TypeDefinition::record("MessageHeader")
                .extends("DomainResource")
                .field(primitive("eventUri", PrimitiveKind::Uri)),
        )
        .build()
        .expect("fixture registry is valid")
}

// =============================================================================
// Event helpers
// =============================================================================

pub fn scalar(name: &str, value: &str) -> Vec<Event> {
    vec![Event::enter(name), Event::attribute("value", value), Event::Exit]
}

pub fn element(name: &str, body: impl IntoIterator<Item = Vec<Event>>) -> Vec<Event> {
    let mut events = vec![Event::enter(name)];
    events.extend(body.into_iter().flatten());
    events.push(Event::Exit);
    events
}

pub fn record(
    type_name: &str,
    id: Option<&str>,
    body: impl IntoIterator<Item = Vec<Event>>,
) -> Vec<Event> {
    let mut events = vec![Event::enter(type_name)];
    if let Some(id) = id {
        events.push(Event::attribute("id", id));
    }
    events.extend(body.into_iter().flatten());
    events.push(Event::Exit);
    events
}

pub fn reference(field: &str, target: &str) -> Vec<Event> {
    element(field, [scalar("reference", target)])
}

pub fn extension(url: &str, body: impl IntoIterator<Item = Vec<Event>>) -> Vec<Event> {
    let mut events = vec![Event::extension(url)];
    events.extend(body.into_iter().flatten());
    events.push(Event::Exit);
    events
}

/// A collection entry holding one record.
pub fn entry(full_url: Option<&str>, resource: Vec<Event>) -> Vec<Event> {
    let mut body = Vec::new();
    if let Some(full_url) = full_url {
        body.push(scalar("fullUrl", full_url));
    }
    body.push(element("resource", [resource]));
    element("entry", body)
}

pub fn bundle(kind: &str, entries: impl IntoIterator<Item = Vec<Event>>) -> Vec<Event> {
    let mut body = vec![scalar("type", kind)];
    body.extend(entries);
    record("Bundle", None, body)
}

// =============================================================================
// Parsing
// =============================================================================

pub fn parse(events: Vec<Event>) -> Result<ParseOutput<CollectingSink>, ParseError> {
    parse_with(&ParserConfig::default(), events, CollectingSink::lenient())
}

pub fn parse_with(
    config: &ParserConfig,
    events: Vec<Event>,
    sink: CollectingSink,
) -> Result<ParseOutput<CollectingSink>, ParseError> {
    parse_events(&registry(), config, events, sink)
}

/// Records stored in `entry.resource` of the root collection, in order.
pub fn entry_resources(document: &Document) -> Vec<ValueId> {
    let Some(root) = document.root() else {
        return Vec::new();
    };
    document
        .field_values(root, "entry")
        .iter()
        .filter_map(|&entry| document.first_field(entry, "resource"))
        .collect()
}

pub fn primitive_text(document: &Document, parent: ValueId, field: &str) -> Option<String> {
    document
        .field_primitive(parent, field)
        .map(ToString::to_string)
}

pub fn link(document: &Document, parent: ValueId, field: &str) -> Option<ValueId> {
    let reference = document.first_field(parent, field)?;
    document.value(reference).reference.as_ref()?.link
}
