//! Cross-document reference stitching.
//!
//! Runs after the outermost collection record is complete. Every record is
//! indexed by identity first, then every global reference in the tree is
//! looked up, so document order never affects what resolves.

use indexmap::IndexMap;
use tracing::debug;
use weave_document::{Document, Identity, RecordOrigin, ValueId};
use weave_schema::SchemaRegistry;

use crate::config::StitchConfig;
use crate::diagnostic::{Diagnostic, DiagnosticSink};
use crate::error::ParseError;
use crate::path::ElementPath;
use crate::walk::{Site, sites};

/// Identity to record, built once per stitched collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentIndex {
    entries: IndexMap<String, ValueId>,
}

impl DocumentIndex {
    pub fn get(&self, identity: &str) -> Option<ValueId> {
        self.entries.get(identity).copied()
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.entries.contains_key(identity)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ValueId)> {
        self.entries.iter().map(|(key, &id)| (key.as_str(), id))
    }

    /// Canonical form of `target` first, then the raw string.
    pub fn resolve(&self, target: &str) -> Option<ValueId> {
        Identity::parse(target)
            .and_then(|identity| self.get(&identity.canonical()))
            .or_else(|| self.get(target))
    }

    /// Later claims overwrite earlier ones. Returns the displaced record when
    /// it differs from `record`.
    fn insert(&mut self, identity: String, record: ValueId) -> Option<ValueId> {
        self.entries
            .insert(identity, record)
            .filter(|&previous| previous != record)
    }
}

pub struct Stitcher<'a> {
    registry: &'a SchemaRegistry,
    config: &'a StitchConfig,
}

impl<'a> Stitcher<'a> {
    pub fn new(registry: &'a SchemaRegistry, config: &'a StitchConfig) -> Self {
        Self { registry, config }
    }

    /// Index the collection rooted at `document.root()` and link its global
    /// references.
    ///
    /// Unresolved and duplicated identities are reported, never fatal unless
    /// the sink itself refuses them. Returns an empty index when the root is
    /// not the collection type.
    pub fn stitch<S: DiagnosticSink + ?Sized>(
        &self,
        document: &mut Document,
        sink: &mut S,
    ) -> Result<DocumentIndex, ParseError> {
        let Some(root) = document.root() else {
            return Ok(DocumentIndex::default());
        };
        let root_type = document.value(root).type_name.clone();
        if !self.registry.is_collection_type(&root_type) {
            debug!(root = %root_type, "root is not a collection, nothing to stitch");
            return Ok(DocumentIndex::default());
        }

        let mut root_path = ElementPath::new();
        root_path.push(root_type);

        if self.config.adopt_urn_identities {
            self.adopt_urn_identities(document, root, &root_path);
        }

        let all = sites(document, root, &root_path, false);
        let index = self.build_index(document, &all, sink)?;

        let sigil = self.registry.conventions().local_sigil;
        let mut linked = 0;
        let mut unresolved = 0;
        for site in &all {
            let Some(reference) = document.value(site.value).reference.as_ref() else {
                continue;
            };
            if reference.target.trim().is_empty() || reference.is_local(sigil) {
                continue;
            }
            let target = reference.target.clone();
            let found = index.resolve(&target);
            if let Some(reference) = document.value_mut(site.value).reference.as_mut() {
                reference.link = found;
            }
            match found {
                Some(_) => linked += 1,
                None => {
                    unresolved += 1;
                    sink.report(Diagnostic::UnresolvedReference {
                        target,
                        path: site.path.clone(),
                        record: site.record.clone(),
                    })?;
                }
            }
        }

        debug!(
            indexed = index.len(),
            linked, unresolved, "stitched collection references"
        );
        Ok(index)
    }

    fn collections<'s>(&self, document: &Document, all: &'s [Site]) -> Vec<&'s Site> {
        all.iter()
            .filter(|site| self.registry.is_collection_type(&document.value(site.value).type_name))
            .collect()
    }

    fn build_index<S: DiagnosticSink + ?Sized>(
        &self,
        document: &Document,
        all: &[Site],
        sink: &mut S,
    ) -> Result<DocumentIndex, ParseError> {
        let mut index = DocumentIndex::default();

        for collection in self.collections(document, all) {
            for &entry in document.field_values(collection.value, &self.config.entry_field) {
                let Some(full_url) = document
                    .field_primitive(entry, &self.config.full_url_field)
                    .map(ToString::to_string)
                    .filter(|url| !url.trim().is_empty())
                else {
                    continue;
                };
                let Some(resource) = document.first_field(entry, &self.config.resource_field)
                else {
                    continue;
                };
                if index.insert(full_url.clone(), resource).is_some() {
                    sink.report(duplicate(full_url, collection))?;
                }
            }
        }

        for site in all {
            let value = document.value(site.value);
            let Some(info) = value.record.as_ref() else {
                continue;
            };
            if info.origin == RecordOrigin::Contained || !value.has_id() {
                continue;
            }
            let Some(identity) = value.id.as_deref().and_then(Identity::parse) else {
                continue;
            };
            if identity.is_local() {
                continue;
            }
            let key = identity.canonical_with_type(self.registry.record_name(&value.type_name));
            if index.insert(key.clone(), site.value).is_some() {
                sink.report(duplicate(key, site))?;
            }
        }

        Ok(index)
    }

    fn adopt_urn_identities(
        &self,
        document: &mut Document,
        root: ValueId,
        root_path: &ElementPath,
    ) {
        let all = sites(document, root, root_path, false);
        let mut adoptions = Vec::new();
        for collection in self.collections(document, &all) {
            for &entry in document.field_values(collection.value, &self.config.entry_field) {
                let Some(resource) = document.first_field(entry, &self.config.resource_field)
                else {
                    continue;
                };
                if document.value(resource).has_id() {
                    continue;
                }
                let url = document
                    .first_field(entry, &self.config.request_field)
                    .and_then(|request| document.field_primitive(request, &self.config.url_field))
                    .map(ToString::to_string);
                if let Some(url) = url.filter(|url| url.starts_with("urn:")) {
                    adoptions.push((resource, url));
                }
            }
        }
        for (resource, url) in adoptions {
            debug!(identity = %url, "record adopts request url as identity");
            document.value_mut(resource).id = Some(url);
        }
    }
}

fn duplicate(identity: String, site: &Site) -> Diagnostic {
    Diagnostic::DuplicateIdentity {
        identity,
        path: site.path.clone(),
        record: site.record.clone(),
    }
}
