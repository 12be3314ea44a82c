mod common;

use common::*;
use pretty_assertions::assert_eq;
use weave_document::RecordOrigin;
use weave_parser::DiagnosticKind;

#[test]
fn test_local_reference_before_contained_record() {
    let events = record(
        "Patient",
        Some("p1"),
        [
            reference("managingOrganization", "#org1"),
            element(
                "contained",
                [record("Organization", Some("org1"), [scalar("name", "Acme")])],
            ),
        ],
    );
    let output = parse(events).unwrap();
    let doc = &output.document;
    let root = output.root().unwrap();
    let organization = doc.first_field(root, "contained").unwrap();

    assert_eq!(link(doc, root, "managingOrganization"), Some(organization));
    assert_eq!(doc.value(organization).id.as_deref(), Some("#org1"));
    assert_eq!(
        doc.value(organization).record.as_ref().map(|info| info.origin),
        Some(RecordOrigin::Contained)
    );
    assert!(output.sink.is_empty());
}

#[test]
fn test_contained_without_identity_is_dropped() {
    let events = record(
        "Patient",
        Some("p1"),
        [
            element(
                "contained",
                [record("Organization", None, [scalar("name", "Nameless")])],
            ),
            reference("managingOrganization", "#missing"),
        ],
    );
    let output = parse(events).unwrap();
    let root = output.root().unwrap();

    assert!(output.document.field_values(root, "contained").is_empty());
    assert_eq!(output.sink.count(DiagnosticKind::ContainedWithoutIdentity), 1);
    assert_eq!(output.sink.count(DiagnosticKind::UnresolvedReference), 1);
    assert_eq!(link(&output.document, root, "managingOrganization"), None);
}

#[test]
fn test_reference_errors_survive_strict_policy() {
    let events = record(
        "Patient",
        Some("p1"),
        [reference("managingOrganization", "#nowhere")],
    );
    let output = parse_with(
        &weave_parser::ParserConfig::default(),
        events,
        weave_parser::CollectingSink::strict(),
    )
    .unwrap();
    assert_eq!(output.sink.count(DiagnosticKind::UnresolvedReference), 1);
}

#[test]
fn test_contained_scope_is_per_record() {
    // Each entry record resolves `#x` against its own contained records.
    let events = bundle(
        "collection",
        [
            entry(
                None,
                record(
                    "Patient",
                    Some("a"),
                    [
                        element(
                            "contained",
                            [record("Organization", Some("x"), [scalar("name", "First")])],
                        ),
                        reference("managingOrganization", "#x"),
                    ],
                ),
            ),
            entry(
                None,
                record(
                    "Patient",
                    Some("b"),
                    [
                        element(
                            "contained",
                            [record("Organization", Some("x"), [scalar("name", "Second")])],
                        ),
                        reference("managingOrganization", "#x"),
                    ],
                ),
            ),
        ],
    );
    let output = parse(events).unwrap();
    let doc = &output.document;
    let patients = entry_resources(doc);
    assert_eq!(patients.len(), 2);
    for (patient, name) in patients.iter().zip(["First", "Second"]) {
        let target = link(doc, *patient, "managingOrganization").unwrap();
        assert_eq!(doc.first_field(*patient, "contained"), Some(target));
        assert_eq!(primitive_text(doc, target, "name").as_deref(), Some(name));
    }
    assert!(output.sink.is_empty());
}
