use crate::prelude_internal::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(pub usize);

#[derive(Debug, PartialEq, Eq, thiserror::Error, Clone)]
pub enum InsertError {
    #[error("Value {id:?} of type '{type_name}' is not a composite")]
    ExpectedComposite { id: ValueId, type_name: String },
    #[error("Value {id:?} of type '{type_name}' is not an extension")]
    ExpectedExtension { id: ValueId, type_name: String },
}

/// Arena owning every value of one parse.
///
/// Values that are created but never linked under the root (for example a
/// contained record dropped for lacking an identity) stay in the arena but are
/// unreachable from [`Document::descendants`].
#[derive(Debug, Clone, Default)]
pub struct Document {
    root: Option<ValueId>,
    values: Vec<TypedValue>,
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        match (self.root, other.root) {
            (Some(a), Some(b)) => self.values_equal(a, other, b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self) -> Option<ValueId> {
        self.root
    }

    pub fn root_value(&self) -> Option<&TypedValue> {
        self.root.map(|id| self.value(id))
    }

    pub fn set_root(&mut self, id: ValueId) {
        self.root = Some(id);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn value(&self, id: ValueId) -> &TypedValue {
        &self.values[id.0]
    }

    pub fn get_value(&self, id: ValueId) -> Option<&TypedValue> {
        self.values.get(id.0)
    }

    pub fn value_mut(&mut self, id: ValueId) -> &mut TypedValue {
        &mut self.values[id.0]
    }

    pub fn get_value_mut(&mut self, id: ValueId) -> Option<&mut TypedValue> {
        self.values.get_mut(id.0)
    }

    pub fn create_value(&mut self, value: TypedValue) -> ValueId {
        self.values.push(value);
        ValueId(self.values.len() - 1)
    }

    /// Append `child` to the field `field` of the composite `parent`.
    pub fn push_field(
        &mut self,
        parent: ValueId,
        field: &str,
        child: ValueId,
    ) -> Result<(), InsertError> {
        let value = self.value_mut(parent);
        match &mut value.content {
            ValueContent::Composite(fields) => {
                fields.entry(field.to_string()).or_default().push(child);
                Ok(())
            }
            _ => Err(InsertError::ExpectedComposite {
                id: parent,
                type_name: value.type_name.clone(),
            }),
        }
    }

    /// Set the payload of the extension `extension`.
    pub fn set_extension_value(
        &mut self,
        extension: ValueId,
        payload: ValueId,
    ) -> Result<(), InsertError> {
        let value = self.value_mut(extension);
        let type_name = value.type_name.clone();
        let ext = value
            .as_extension_mut()
            .ok_or(InsertError::ExpectedExtension {
                id: extension,
                type_name,
            })?;
        ext.value = Some(payload);
        Ok(())
    }

    pub fn field_values(&self, parent: ValueId, field: &str) -> &[ValueId] {
        self.value(parent).field(field)
    }

    /// The first value of `field`, if any.
    pub fn first_field(&self, parent: ValueId, field: &str) -> Option<ValueId> {
        self.field_values(parent, field).first().copied()
    }

    /// Scalar of the first value of `field`, if it is a populated primitive.
    pub fn field_primitive(&self, parent: ValueId, field: &str) -> Option<&PrimitiveValue> {
        self.first_field(parent, field)
            .and_then(|id| self.value(id).as_primitive())
    }

    /// Remove `extension` from the extension lists of `parent`.
    ///
    /// Returns whether it was attached there.
    pub fn detach_extension(&mut self, parent: ValueId, extension: ValueId) -> bool {
        let value = self.value_mut(parent);
        let before = value.extensions.len() + value.modifier_extensions.len();
        value.extensions.retain(|&id| id != extension);
        value.modifier_extensions.retain(|&id| id != extension);
        before != value.extensions.len() + value.modifier_extensions.len()
    }

    /// Direct children in document order: extensions, modifier extensions,
    /// then content (field values or the extension payload).
    pub fn children(&self, id: ValueId) -> Vec<ValueId> {
        let value = self.value(id);
        let mut children = Vec::new();
        children.extend(value.extensions.iter().copied());
        children.extend(value.modifier_extensions.iter().copied());
        match &value.content {
            ValueContent::Composite(fields) => {
                children.extend(fields.values().flat_map(|values| values.iter().copied()));
            }
            ValueContent::Extension(ext) => children.extend(ext.value),
            ValueContent::Primitive(_) | ValueContent::Markup(_) => {}
        }
        children
    }

    /// Pre-order walk of the subtree rooted at `id`, `id` included.
    pub fn descendants(&self, id: ValueId) -> Vec<ValueId> {
        self.descendants_until(id, |_, _| false)
    }

    /// Pre-order walk that does not descend below values for which `prune`
    /// returns true (the pruned values themselves are still yielded). The
    /// starting value is never pruned.
    pub fn descendants_until(
        &self,
        id: ValueId,
        prune: impl Fn(ValueId, &TypedValue) -> bool,
    ) -> Vec<ValueId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            out.push(next);
            if next != id && prune(next, self.value(next)) {
                continue;
            }
            let children = self.children(next);
            stack.extend(children.into_iter().rev());
        }
        out
    }

    /// Deep-copy the subtree `id` of `source` into this arena.
    ///
    /// Reference links that point inside the copied subtree are remapped; links
    /// that leave it are cleared so they can be resolved again in the new home.
    pub fn graft(&mut self, source: &Document, id: ValueId) -> ValueId {
        let mut mapping = Map::new();
        let new_id = self.copy_value(source, id, &mut mapping);
        for &copied in mapping.values() {
            if let Some(reference) = self.values[copied.0].reference.as_mut() {
                reference.link = reference.link.and_then(|old| mapping.get(&old).copied());
            }
        }
        new_id
    }

    fn copy_value(
        &mut self,
        source: &Document,
        id: ValueId,
        mapping: &mut Map<ValueId, ValueId>,
    ) -> ValueId {
        let mut copy = source.value(id).clone();
        let new_id = self.create_value(TypedValue::composite(""));
        mapping.insert(id, new_id);

        copy.extensions = copy
            .extensions
            .iter()
            .map(|&child| self.copy_value(source, child, mapping))
            .collect();
        copy.modifier_extensions = copy
            .modifier_extensions
            .iter()
            .map(|&child| self.copy_value(source, child, mapping))
            .collect();
        match &mut copy.content {
            ValueContent::Composite(fields) => {
                for values in fields.values_mut() {
                    for child in values.iter_mut() {
                        *child = self.copy_value(source, *child, mapping);
                    }
                }
            }
            ValueContent::Extension(ext) => {
                if let Some(payload) = ext.value {
                    ext.value = Some(self.copy_value(source, payload, mapping));
                }
            }
            ValueContent::Primitive(_) | ValueContent::Markup(_) => {}
        }

        self.values[new_id.0] = copy;
        new_id
    }

    /// Compare two values structurally, ignoring slot numbering. References
    /// compare by target and by whether they are resolved.
    fn values_equal(&self, a: ValueId, other: &Document, b: ValueId) -> bool {
        let left = self.value(a);
        let right = other.value(b);

        if left.type_name != right.type_name
            || left.id != right.id
            || left.record != right.record
            || left.comments != right.comments
        {
            return false;
        }

        let references_equal = match (&left.reference, &right.reference) {
            (Some(l), Some(r)) => l.target == r.target && l.is_resolved() == r.is_resolved(),
            (None, None) => true,
            _ => false,
        };
        if !references_equal {
            return false;
        }

        if !self.lists_equal(&left.extensions, other, &right.extensions)
            || !self.lists_equal(&left.modifier_extensions, other, &right.modifier_extensions)
        {
            return false;
        }

        match (&left.content, &right.content) {
            (ValueContent::Composite(l), ValueContent::Composite(r)) => {
                l.len() == r.len()
                    && l.iter().all(|(name, values)| {
                        r.get(name)
                            .is_some_and(|others| self.lists_equal(values, other, others))
                    })
            }
            (ValueContent::Primitive(l), ValueContent::Primitive(r)) => l == r,
            (ValueContent::Markup(l), ValueContent::Markup(r)) => l == r,
            (ValueContent::Extension(l), ValueContent::Extension(r)) => {
                l.url == r.url
                    && l.modifier == r.modifier
                    && match (l.value, r.value) {
                        (Some(lv), Some(rv)) => self.values_equal(lv, other, rv),
                        (None, None) => true,
                        _ => false,
                    }
            }
            _ => false,
        }
    }

    fn lists_equal(&self, left: &[ValueId], other: &Document, right: &[ValueId]) -> bool {
        left.len() == right.len()
            && left
                .iter()
                .zip(right)
                .all(|(&l, &r)| self.values_equal(l, other, r))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patient_with_name(doc: &mut Document, name: &str) -> ValueId {
        let patient = doc.create_value(TypedValue::composite("Patient"));
        let given = doc.create_value(TypedValue::primitive("string", Some(name.into())));
        doc.push_field(patient, "given", given).unwrap();
        patient
    }

    #[test]
    fn test_push_field_success() {
        let mut doc = Document::new();
        let patient = patient_with_name(&mut doc, "Ada");
        assert_eq!(doc.field_values(patient, "given").len(), 1);
        assert_eq!(
            doc.field_primitive(patient, "given"),
            Some(&PrimitiveValue::from("Ada"))
        );
    }

    #[test]
    fn test_push_field_error_expected_composite() {
        let mut doc = Document::new();
        let scalar = doc.create_value(TypedValue::primitive("string", None));
        let child = doc.create_value(TypedValue::primitive("string", None));
        let result = doc.push_field(scalar, "x", child);
        assert_eq!(
            result,
            Err(InsertError::ExpectedComposite {
                id: scalar,
                type_name: "string".to_string()
            })
        );
    }

    #[test]
    fn test_descendants_pre_order() {
        let mut doc = Document::new();
        let patient = patient_with_name(&mut doc, "Ada");
        let ext = doc.create_value(TypedValue::new(
            "Extension",
            ValueContent::Extension(ExtensionContent {
                url: Some("http://example.org/ext".into()),
                modifier: false,
                value: None,
            }),
        ));
        doc.value_mut(patient).extensions.push(ext);

        let order = doc.descendants(patient);
        assert_eq!(order[0], patient);
        assert_eq!(order[1], ext);
        assert_eq!(order.len(), 3);
    }

    #[test]
    fn test_descendants_until_prunes_below() {
        let mut doc = Document::new();
        let bundle = doc.create_value(TypedValue::composite("Bundle"));
        let inner = patient_with_name(&mut doc, "Ada");
        doc.push_field(bundle, "resource", inner).unwrap();

        let all = doc.descendants(bundle);
        let pruned = doc.descendants_until(bundle, |_, v| v.type_name == "Patient");
        assert_eq!(all.len(), 3);
        assert_eq!(pruned, vec![bundle, inner]);
    }

    #[test]
    fn test_detach_extension() {
        let mut doc = Document::new();
        let patient = doc.create_value(TypedValue::composite("Patient"));
        let ext = doc.create_value(TypedValue::composite("Extension"));
        doc.value_mut(patient).modifier_extensions.push(ext);
        assert!(doc.detach_extension(patient, ext));
        assert!(!doc.detach_extension(patient, ext));
        assert!(doc.value(patient).modifier_extensions.is_empty());
    }

    #[test]
    fn test_graft_remaps_internal_links_and_drops_external() {
        let mut source = Document::new();
        let outside = source.create_value(TypedValue::composite("Practitioner"));
        let patient = source.create_value(TypedValue::composite("Patient"));
        let contained = source.create_value(TypedValue::composite("Organization"));
        source.push_field(patient, "contained", contained).unwrap();

        let internal = source.create_value(TypedValue::composite("Reference"));
        source.value_mut(internal).reference = Some(Reference {
            target: "#org".into(),
            link: Some(contained),
        });
        source.push_field(patient, "managingOrganization", internal).unwrap();

        let external = source.create_value(TypedValue::composite("Reference"));
        source.value_mut(external).reference = Some(Reference {
            target: "Practitioner/1".into(),
            link: Some(outside),
        });
        source.push_field(patient, "generalPractitioner", external).unwrap();

        let mut target = Document::new();
        target.create_value(TypedValue::composite("Filler"));
        let grafted = target.graft(&source, patient);

        let new_contained = target.first_field(grafted, "contained").unwrap();
        let new_internal = target.first_field(grafted, "managingOrganization").unwrap();
        let new_external = target.first_field(grafted, "generalPractitioner").unwrap();
        assert_eq!(
            target.value(new_internal).reference.as_ref().unwrap().link,
            Some(new_contained)
        );
        assert_eq!(
            target.value(new_external).reference.as_ref().unwrap().link,
            None
        );
    }

    #[test]
    fn test_structural_equality_ignores_slots() {
        let mut a = Document::new();
        let pa = patient_with_name(&mut a, "Ada");
        a.set_root(pa);

        let mut b = Document::new();
        b.create_value(TypedValue::composite("Unrelated"));
        let pb = patient_with_name(&mut b, "Ada");
        b.set_root(pb);
        assert_eq!(a, b);

        let mut c = Document::new();
        let pc = patient_with_name(&mut c, "Grace");
        c.set_root(pc);
        assert_ne!(a, c);
    }
}
