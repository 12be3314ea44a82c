use weave_document::{Document, RecordOrigin, ValueContent, ValueId};

use crate::diagnostic::RecordContext;
use crate::path::ElementPath;

/// A value found by [`sites`], with where it was found.
#[derive(Debug, Clone)]
pub(crate) struct Site {
    pub value: ValueId,
    pub path: ElementPath,
    pub record: Option<RecordContext>,
}

/// Pre-order walk below `start`, whose own path is `start_path`.
///
/// With `stop_at_records`, top-level and embedded records other than `start`
/// are skipped entirely; contained records are always visited.
pub(crate) fn sites(
    document: &Document,
    start: ValueId,
    start_path: &ElementPath,
    stop_at_records: bool,
) -> Vec<Site> {
    let mut out = Vec::new();
    let mut path = start_path.clone();
    visit(document, start, &mut path, None, stop_at_records, &mut out);
    out
}

fn visit(
    document: &Document,
    id: ValueId,
    path: &mut ElementPath,
    record: Option<&RecordContext>,
    stop_at_records: bool,
    out: &mut Vec<Site>,
) {
    let value = document.value(id);
    let record = if value.is_record() {
        Some(RecordContext::new(value.type_name.clone(), value.id.clone()))
    } else {
        record.cloned()
    };
    out.push(Site {
        value: id,
        path: path.clone(),
        record: record.clone(),
    });

    let extensions = value.extensions.iter().map(|&ext| ("extension", ext));
    let modifiers = value
        .modifier_extensions
        .iter()
        .map(|&ext| ("modifierExtension", ext));
    for (segment, ext) in extensions.chain(modifiers) {
        path.push(segment);
        visit(document, ext, path, record.as_ref(), stop_at_records, out);
        path.pop();
    }

    match &value.content {
        ValueContent::Composite(fields) => {
            for (name, values) in fields {
                for &child in values {
                    let child_value = document.value(child);
                    let nested_record = child_value
                        .record
                        .as_ref()
                        .is_some_and(|info| info.origin != RecordOrigin::Contained);
                    if stop_at_records && nested_record {
                        continue;
                    }
                    path.push(name.as_str());
                    if child_value.is_record() {
                        path.push(child_value.type_name.as_str());
                    }
                    visit(document, child, path, record.as_ref(), stop_at_records, out);
                    if child_value.is_record() {
                        path.pop();
                    }
                    path.pop();
                }
            }
        }
        ValueContent::Extension(ext) => {
            if let Some(payload) = ext.value {
                path.push("value");
                visit(document, payload, path, record.as_ref(), stop_at_records, out);
                path.pop();
            }
        }
        ValueContent::Primitive(_) | ValueContent::Markup(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use weave_document::{RecordInfo, Reference, TypedValue};

    use super::*;

    fn record(doc: &mut Document, type_name: &str, origin: RecordOrigin) -> ValueId {
        let mut value = TypedValue::composite(type_name);
        value.record = Some(RecordInfo {
            origin,
            version_id: None,
        });
        doc.create_value(value)
    }

    #[test]
    fn test_sites_paths_and_record_context() {
        let mut doc = Document::new();
        let bundle = record(&mut doc, "Bundle", RecordOrigin::TopLevel);
        let entry = doc.create_value(TypedValue::composite("BundleEntry"));
        let patient = record(&mut doc, "Patient", RecordOrigin::Embedded);
        doc.value_mut(patient).id = Some("Patient/1".into());
        let reference = doc.create_value(TypedValue::composite("Reference"));
        doc.value_mut(reference).reference = Some(Reference::unresolved("Organization/1"));
        doc.push_field(bundle, "entry", entry).unwrap();
        doc.push_field(entry, "resource", patient).unwrap();
        doc.push_field(patient, "managingOrganization", reference).unwrap();

        let mut root = ElementPath::new();
        root.push("Bundle");
        let all = sites(&doc, bundle, &root, false);
        assert_eq!(all.len(), 4);
        let last = &all[3];
        assert_eq!(last.value, reference);
        assert_eq!(
            last.path.to_string(),
            "Bundle.entry.resource.Patient.managingOrganization"
        );
        assert_eq!(
            last.record,
            Some(RecordContext::new("Patient", Some("Patient/1".into())))
        );

        let shallow = sites(&doc, bundle, &root, true);
        assert_eq!(shallow.len(), 2);
    }

    #[test]
    fn test_contained_records_are_always_visited() {
        let mut doc = Document::new();
        let patient = record(&mut doc, "Patient", RecordOrigin::TopLevel);
        let org = record(&mut doc, "Organization", RecordOrigin::Contained);
        doc.push_field(patient, "contained", org).unwrap();
        let mut root = ElementPath::new();
        root.push("Patient");
        assert_eq!(sites(&doc, patient, &root, true).len(), 2);
    }
}
