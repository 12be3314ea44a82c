use ahash::AHashMap;
use tracing::debug;
use weave_document::{Document, ValueId};

use crate::diagnostic::{Diagnostic, DiagnosticSink};
use crate::error::ParseError;
use crate::path::ElementPath;
use crate::walk::sites;

/// Contained records of one record, keyed by their local identity (`#id`).
#[derive(Debug, Clone, Default)]
pub struct ContainedRegistry {
    records: AHashMap<String, ValueId>,
}

impl ContainedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from the records already stored in `field` of `record`.
    pub fn from_field(document: &Document, record: ValueId, field: &str) -> Self {
        let mut registry = Self::new();
        for &contained in document.field_values(record, field) {
            if let Some(id) = document.value(contained).id.as_deref() {
                registry.register(id, contained);
            }
        }
        registry
    }

    /// Returns the record previously registered under the same identity.
    pub fn register(&mut self, identity: impl Into<String>, record: ValueId) -> Option<ValueId> {
        self.records.insert(identity.into(), record)
    }

    pub fn get(&self, identity: &str) -> Option<ValueId> {
        self.records.get(identity).copied()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Link every local reference inside `record` to its contained target.
///
/// Nested top-level and embedded records are skipped; they resolve against
/// their own registries. Returns how many references were linked.
pub(crate) fn weave_contained<S: DiagnosticSink + ?Sized>(
    document: &mut Document,
    record: ValueId,
    record_path: &ElementPath,
    registry: &ContainedRegistry,
    sigil: char,
    sink: &mut S,
) -> Result<usize, ParseError> {
    let mut linked = 0;
    for site in sites(document, record, record_path, true) {
        let Some(reference) = document.value(site.value).reference.as_ref() else {
            continue;
        };
        if !reference.is_local(sigil) || reference.is_resolved() {
            continue;
        }
        let target = reference.target.clone();
        match registry.get(&target) {
            Some(contained) => {
                debug!(reference = %target, path = %site.path, "record contains local reference");
                if let Some(reference) = document.value_mut(site.value).reference.as_mut() {
                    reference.link = Some(contained);
                }
                linked += 1;
            }
            None => sink.report(Diagnostic::UnresolvedReference {
                target,
                path: site.path,
                record: site.record,
            })?,
        }
    }
    Ok(linked)
}
