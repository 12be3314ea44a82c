//! The schema-directed state machine.
//!
//! Every structural event is handled against the state on top of the stack.
//! Opening events push a state, `Exit` pops it and stores the finished value
//! where its [`Target`] says. Records complete in a fixed order: optional
//! retyping, identity qualification, contained weaving, then placement.

use tracing::{debug, trace};
use weave_document::{
    Document, ExtensionContent, Identity, PrimitiveValue, RecordInfo, RecordOrigin, Reference,
    TypedValue, ValueContent, ValueId,
};
use weave_schema::{DeclaredExtension, FieldKind, PrimitiveKind, SchemaRegistry};

use crate::config::ParserConfig;
use crate::container::{ContainedRegistry, weave_contained};
use crate::diagnostic::{Diagnostic, DiagnosticSink, RecordContext};
use crate::error::{ParseError, ParseErrorKind};
use crate::event::Event;
use crate::path::ElementPath;
use crate::retype::{ReplayRetype, Retype};
use crate::state::{
    CompositeState, ExtensionState, ParseState, PreRecordState, PrimitiveState, RawMarkupState,
    RecordSlot, Target,
};
use crate::stitch::{DocumentIndex, Stitcher};

const EXTENSION_TYPE: &str = "Extension";
const MARKUP_TYPE: &str = "xhtml";

/// Result of a completed parse.
#[derive(Debug)]
pub struct ParseOutput<S> {
    pub document: Document,
    /// Present when the outermost record was a stitched collection.
    pub index: Option<DocumentIndex>,
    pub sink: S,
}

impl<S> ParseOutput<S> {
    pub fn root(&self) -> Option<ValueId> {
        self.document.root()
    }

    pub fn root_value(&self) -> Option<&TypedValue> {
        self.document.root_value()
    }
}

/// Streaming parser for one document.
///
/// Feed events with [`Parser::handle`] or the per-event methods, then call
/// [`Parser::finish`]. The registry and configuration are only borrowed, so
/// any number of parsers may share them.
pub struct Parser<'s, S: DiagnosticSink> {
    registry: &'s SchemaRegistry,
    config: &'s ParserConfig,
    retype: &'s dyn Retype,
    sink: S,
    document: Document,
    stack: Vec<ParseState>,
    path: ElementPath,
    pending_comments: Vec<String>,
    /// Most recently finished value, for trailing comments.
    previous: Option<ValueId>,
    index: Option<DocumentIndex>,
    complete: bool,
}

impl<'s, S: DiagnosticSink> Parser<'s, S> {
    pub fn new(registry: &'s SchemaRegistry, config: &'s ParserConfig, sink: S) -> Self {
        Self {
            registry,
            config,
            retype: &ReplayRetype,
            sink,
            document: Document::new(),
            stack: vec![ParseState::PreRecord(PreRecordState::new(RecordSlot::Root))],
            path: ElementPath::new(),
            pending_comments: Vec::new(),
            previous: None,
            index: None,
            complete: false,
        }
    }

    pub fn with_retype(mut self, retype: &'s dyn Retype) -> Self {
        self.retype = retype;
        self
    }

    /// Require the outermost record to be `type_name` or a record type it
    /// specializes.
    pub fn expecting(mut self, type_name: impl Into<String>) -> Self {
        if let Some(ParseState::PreRecord(pre)) = self.stack.first_mut() {
            pre.expected = Some(type_name.into());
        }
        self
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// The document built so far.
    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn finish(self) -> Result<ParseOutput<S>, ParseError> {
        if !self.complete {
            return Err(self.error(ParseErrorKind::Incomplete));
        }
        Ok(ParseOutput {
            document: self.document,
            index: self.index,
            sink: self.sink,
        })
    }

    pub fn handle(&mut self, event: Event) -> Result<(), ParseError> {
        match event {
            Event::Enter { namespace, name } => self.enter(namespace.as_deref(), &name),
            Event::Exit => self.exit(),
            Event::Attribute { name, value } => self.attribute(&name, &value),
            Event::Text(text) => self.text(&text),
            Event::CommentPre(text) => self.comment_pre(&text),
            Event::CommentPost(text) => self.comment_post(&text),
            Event::Extension { url, modifier } => self.extension(url.as_deref(), modifier),
            Event::Markup(markup) => self.markup(&markup),
        }
    }

    // =========================================================================
    // Events
    // =========================================================================

    pub fn enter(&mut self, namespace: Option<&str>, name: &str) -> Result<(), ParseError> {
        self.ensure_open()?;
        self.path.push(name);
        match self.stack.last_mut() {
            Some(ParseState::Swallow(depth)) => {
                *depth += 1;
                return Ok(());
            }
            Some(ParseState::RawMarkup(markup)) => {
                markup.open_element(namespace, name);
                return Ok(());
            }
            _ => {}
        }

        let next = match self.stack.last() {
            Some(ParseState::PreRecord(pre)) => {
                let (existing, expected, origin) =
                    (pre.record, pre.expected.clone(), pre.slot.origin());
                self.enter_record(name, existing, expected.as_deref(), origin)?
            }
            Some(ParseState::Composite(state)) => {
                let parent = state.value;
                self.enter_field(parent, namespace, name)?
            }
            Some(ParseState::Extension(ExtensionState::Undeclared { extension, .. })) => {
                let extension = *extension;
                self.enter_extension_payload(extension, namespace, name)?
            }
            Some(ParseState::Extension(ExtensionState::Declared {
                definition, owner, ..
            })) => {
                let kind = definition.value.clone();
                let url = definition.url.clone();
                let target = Target::Field {
                    parent: *owner,
                    field: definition.field.clone(),
                };
                self.enter_declared_payload(kind, url, target, namespace, name)?
            }
            Some(ParseState::Primitive(_)) => self.unknown_element(name)?,
            Some(ParseState::Swallow(_)) | Some(ParseState::RawMarkup(_)) | None => {
                return Err(self.error(ParseErrorKind::TrailingEvent));
            }
        };
        self.push(next);
        Ok(())
    }

    pub fn exit(&mut self) -> Result<(), ParseError> {
        self.ensure_open()?;
        match self.stack.last_mut() {
            Some(ParseState::Swallow(depth)) if *depth > 0 => {
                *depth -= 1;
                self.path.pop();
                return Ok(());
            }
            Some(ParseState::RawMarkup(markup)) if markup.is_nested() => {
                markup.close_element();
                self.path.pop();
                return Ok(());
            }
            Some(ParseState::PreRecord(pre)) if pre.slot == RecordSlot::Root => {
                return Err(self.error(ParseErrorKind::UnbalancedExit));
            }
            None => return Err(self.error(ParseErrorKind::UnbalancedExit)),
            _ => {}
        }
        let Some(state) = self.stack.pop() else {
            return Err(self.error(ParseErrorKind::UnbalancedExit));
        };
        trace!(state = state.name(), path = %self.path, "pop");
        self.finish_state(state)?;
        self.path.pop();
        Ok(())
    }

    pub fn attribute(&mut self, name: &str, value: &str) -> Result<(), ParseError> {
        self.ensure_open()?;
        if name == "xmlns" || name.starts_with("xmlns:") {
            return Ok(());
        }
        let registry = self.registry;
        let conventions = registry.conventions();
        match self.stack.last_mut() {
            Some(ParseState::Swallow(_)) => Ok(()),
            Some(ParseState::RawMarkup(markup)) => {
                markup.attribute(name, value, &conventions.value_attribute);
                Ok(())
            }
            Some(ParseState::PreRecord(_)) => Err(self.error(ParseErrorKind::IllegalPosition {
                name: name.to_string(),
                reason: "attributes must follow the record element".to_string(),
            })),
            Some(ParseState::Composite(state)) => {
                let owner = state.value;
                if name == conventions.id_attribute {
                    self.set_identity(owner, value.to_string())
                } else {
                    self.unknown_attribute(name)
                }
            }
            Some(ParseState::Primitive(state)) => {
                let (owner, kind) = (state.value, state.kind);
                if name == conventions.value_attribute {
                    state.value_seen = true;
                    self.assign_scalar(owner, kind, value)
                } else if name == conventions.id_attribute {
                    self.set_identity(owner, value.to_string())
                } else {
                    self.unknown_attribute(name)
                }
            }
            Some(ParseState::Extension(ExtensionState::Undeclared { extension, target })) => {
                let (extension, target) = (*extension, target.clone());
                if name == conventions.url_attribute {
                    self.set_extension_url(extension, target, value)
                } else if name == conventions.id_attribute {
                    self.set_identity(extension, value.to_string())
                } else {
                    self.unknown_attribute(name)
                }
            }
            Some(ParseState::Extension(ExtensionState::Declared { .. })) => {
                if name == conventions.url_attribute || name == conventions.id_attribute {
                    Ok(())
                } else {
                    self.unknown_attribute(name)
                }
            }
            None => Err(self.error(ParseErrorKind::TrailingEvent)),
        }
    }

    pub fn text(&mut self, text: &str) -> Result<(), ParseError> {
        if self.complete {
            if text.trim().is_empty() {
                return Ok(());
            }
            return Err(self.error(ParseErrorKind::TrailingEvent));
        }
        match self.stack.last_mut() {
            Some(ParseState::Primitive(state)) => state.text.push_str(text),
            Some(ParseState::RawMarkup(markup)) => markup.text(text),
            _ => {}
        }
        Ok(())
    }

    pub fn extension(&mut self, url: Option<&str>, modifier: bool) -> Result<(), ParseError> {
        self.ensure_open()?;
        let segment = if modifier {
            "modifierExtension"
        } else {
            "extension"
        };
        self.path.push(segment);
        if let Some(ParseState::Swallow(depth)) = self.stack.last_mut() {
            *depth += 1;
            return Ok(());
        }

        let next = match self.stack.last() {
            Some(ParseState::Composite(state)) => {
                let owner = state.value;
                let type_name = &self.document.value(owner).type_name;
                let declared = url
                    .filter(|_| !modifier)
                    .and_then(|url| self.registry.declared_extension_for(type_name, url))
                    .cloned();
                match declared {
                    Some(definition) => self.declared_extension(definition, owner)?,
                    None => self.undeclared_extension(owner, url, modifier),
                }
            }
            Some(ParseState::Primitive(state)) => {
                let owner = state.value;
                self.undeclared_extension(owner, url, modifier)
            }
            Some(ParseState::Extension(ExtensionState::Undeclared { extension, .. })) => {
                let owner = *extension;
                self.undeclared_extension(owner, url, modifier)
            }
            Some(ParseState::Extension(ExtensionState::Declared {
                definition,
                container,
                ..
            })) => {
                let child = url.and_then(|url| definition.nested.get(url)).cloned();
                let container_type = definition.container_type.clone();
                let existing = *container;
                match (child, container_type) {
                    (Some(child), Some(container_type)) => {
                        let container = match existing {
                            Some(container) => container,
                            None => self.create_container(container_type),
                        };
                        self.declared_extension(child, container)?
                    }
                    _ => {
                        self.report(|path, record| Diagnostic::MalformedExtension {
                            url: url.map(str::to_string),
                            reason: "not a nested extension of its declared parent".to_string(),
                            path,
                            record,
                        })?;
                        ParseState::Swallow(0)
                    }
                }
            }
            Some(ParseState::PreRecord(_)) | Some(ParseState::RawMarkup(_)) => {
                return Err(self.error(ParseErrorKind::IllegalPosition {
                    name: segment.to_string(),
                    reason: "extensions attach to values".to_string(),
                }));
            }
            Some(ParseState::Swallow(_)) | None => {
                return Err(self.error(ParseErrorKind::TrailingEvent));
            }
        };
        self.push(next);
        Ok(())
    }

    pub fn comment_pre(&mut self, text: &str) -> Result<(), ParseError> {
        match self.stack.last_mut() {
            Some(ParseState::RawMarkup(markup)) => markup.comment(text),
            _ => self.pending_comments.push(text.to_string()),
        }
        Ok(())
    }

    pub fn comment_post(&mut self, text: &str) -> Result<(), ParseError> {
        match (self.stack.last_mut(), self.previous) {
            (Some(ParseState::RawMarkup(markup)), _) => markup.comment(text),
            (_, Some(previous)) => self
                .document
                .value_mut(previous)
                .comments
                .post
                .push(text.to_string()),
            (_, None) => self.pending_comments.push(text.to_string()),
        }
        Ok(())
    }

    pub fn markup(&mut self, markup: &str) -> Result<(), ParseError> {
        self.ensure_open()?;
        match self.stack.last_mut() {
            Some(ParseState::RawMarkup(state)) => {
                state.fragment(markup);
                Ok(())
            }
            Some(ParseState::Swallow(_)) => Ok(()),
            _ => Err(self.error(ParseErrorKind::IllegalPosition {
                name: "markup".to_string(),
                reason: "markup fragments belong inside a markup field".to_string(),
            })),
        }
    }

    // =========================================================================
    // Opening states
    // =========================================================================

    fn enter_record(
        &mut self,
        name: &str,
        existing: Option<ValueId>,
        expected: Option<&str>,
        origin: RecordOrigin,
    ) -> Result<ParseState, ParseError> {
        if existing.is_some() {
            return Err(self.error(ParseErrorKind::UnexpectedRecord {
                name: name.to_string(),
            }));
        }
        let type_name = self.resolve_record_type(name, expected)?;
        let mut record = TypedValue::composite(type_name);
        record.record = Some(RecordInfo {
            origin,
            version_id: None,
        });
        let record = self.create(record);
        if let Some(ParseState::PreRecord(pre)) = self.stack.last_mut() {
            pre.record = Some(record);
        }
        Ok(ParseState::Composite(CompositeState {
            value: record,
            target: Target::Record,
        }))
    }

    /// Expecting the collection type accepts any top-level record.
    fn resolve_record_type(
        &self,
        name: &str,
        expected: Option<&str>,
    ) -> Result<String, ParseError> {
        let expected = expected.filter(|expected| !self.registry.is_collection_type(expected));
        if let Some(expected) = expected {
            if name == expected || self.registry.is_specialization_of(expected, name) {
                return Ok(expected.to_string());
            }
            if name.eq_ignore_ascii_case(expected) {
                return Err(self.error(ParseErrorKind::RecordTypeCaseMismatch {
                    name: name.to_string(),
                    similar: expected.to_string(),
                }));
            }
            return Err(self.error(ParseErrorKind::WrongRecordType {
                expected: expected.to_string(),
                found: name.to_string(),
            }));
        }
        if let Some(definition) = self.registry.lookup_top_level_type(name) {
            return Ok(definition.name.clone());
        }
        if let Some(similar) = self.registry.lookup_top_level_type_ignore_case(name) {
            return Err(self.error(ParseErrorKind::RecordTypeCaseMismatch {
                name: name.to_string(),
                similar: similar.name.clone(),
            }));
        }
        Err(self.error(ParseErrorKind::UnknownRecordType {
            name: name.to_string(),
        }))
    }

    fn enter_field(
        &mut self,
        parent: ValueId,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<ParseState, ParseError> {
        let registry = self.registry;
        let conventions = registry.conventions();
        if name == conventions.id_attribute {
            if self.document.value(parent).id.is_some() {
                self.report(|path, record| Diagnostic::UnexpectedRepeat {
                    field: name.to_string(),
                    path,
                    record,
                })?;
                return Ok(ParseState::Swallow(0));
            }
            let id = self.create(TypedValue::primitive(PrimitiveKind::String.name(), None));
            return Ok(ParseState::Primitive(PrimitiveState::new(
                id,
                PrimitiveKind::String,
                Target::Identity { owner: parent },
            )));
        }

        let type_name = &self.document.value(parent).type_name;
        let Some(field) = registry
            .lookup_type(type_name)
            .and_then(|definition| definition.get_field(name))
        else {
            return self.unknown_element(name);
        };
        if !field.cardinality.is_repeating() && !self.document.field_values(parent, name).is_empty()
        {
            self.report(|path, record| Diagnostic::UnexpectedRepeat {
                field: name.to_string(),
                path,
                record,
            })?;
            return Ok(ParseState::Swallow(0));
        }

        match &field.kind {
            FieldKind::Extension { modifier } => {
                let extension = self.create(extension_value(None, *modifier));
                Ok(ParseState::Extension(ExtensionState::Undeclared {
                    extension,
                    target: Target::Extensions {
                        parent,
                        modifier: *modifier,
                    },
                }))
            }
            FieldKind::EmbeddedRecord => Ok(ParseState::PreRecord(PreRecordState::new(
                RecordSlot::Embedded {
                    parent,
                    field: name.to_string(),
                },
            ))),
            FieldKind::ContainedRecords => Ok(ParseState::PreRecord(PreRecordState::new(
                RecordSlot::Contained {
                    parent,
                    field: name.to_string(),
                },
            ))),
            kind => {
                let target = Target::Field {
                    parent,
                    field: name.to_string(),
                };
                self.begin_value(kind, target, namespace, name)
            }
        }
    }

    fn enter_extension_payload(
        &mut self,
        extension: ValueId,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<ParseState, ParseError> {
        let Some(kind) = self.registry.extension_value_kind(name) else {
            return self.unknown_element(name);
        };
        let has_payload = self
            .document
            .value(extension)
            .as_extension()
            .is_some_and(|content| content.value.is_some());
        if has_payload {
            self.report(|path, record| Diagnostic::UnexpectedRepeat {
                field: name.to_string(),
                path,
                record,
            })?;
            return Ok(ParseState::Swallow(0));
        }
        self.begin_value(
            &kind,
            Target::ExtensionPayload { extension },
            namespace,
            name,
        )
    }

    fn enter_declared_payload(
        &mut self,
        kind: Option<FieldKind>,
        url: String,
        target: Target,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<ParseState, ParseError> {
        let registry = self.registry;
        let prefix = &registry.conventions().value_prefix;
        let is_payload = name
            .strip_prefix(prefix.as_str())
            .is_some_and(|suffix| !suffix.is_empty());
        if !is_payload {
            return self.unknown_element(name);
        }
        let Some(kind) = kind else {
            self.report(|path, record| Diagnostic::MalformedExtension {
                url: Some(url),
                reason: "declared with nested extensions but carries a value".to_string(),
                path,
                record,
            })?;
            return Ok(ParseState::Swallow(0));
        };
        self.begin_value(&kind, target, namespace, name)
    }

    /// State for a value-like field or payload.
    fn begin_value(
        &mut self,
        kind: &FieldKind,
        target: Target,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<ParseState, ParseError> {
        let state = match kind {
            FieldKind::Primitive(primitive) => {
                let value = self.create(TypedValue::primitive(primitive.name(), None));
                ParseState::Primitive(PrimitiveState::new(value, *primitive, target))
            }
            FieldKind::Composite(type_name) => {
                let value = self.create(TypedValue::composite(type_name.as_str()));
                ParseState::Composite(CompositeState { value, target })
            }
            FieldKind::Reference => {
                let type_name = self.registry.conventions().reference_type.as_str();
                let value = self.create(TypedValue::composite(type_name));
                ParseState::Composite(CompositeState { value, target })
            }
            FieldKind::Markup => {
                let value = self.create(TypedValue::new(
                    MARKUP_TYPE,
                    ValueContent::Markup(String::new()),
                ));
                ParseState::RawMarkup(RawMarkupState::new(value, target, namespace, name))
            }
            FieldKind::Extension { .. }
            | FieldKind::EmbeddedRecord
            | FieldKind::ContainedRecords => {
                return Err(self.error(ParseErrorKind::IllegalPosition {
                    name: name.to_string(),
                    reason: "only values may appear here".to_string(),
                }));
            }
        };
        Ok(state)
    }

    /// Declared extensions fill a field of `owner`, so a single-valued one
    /// takes the first occurrence only.
    fn declared_extension(
        &mut self,
        definition: DeclaredExtension,
        owner: ValueId,
    ) -> Result<ParseState, ParseError> {
        let repeated = !definition.cardinality.is_repeating()
            && !self.document.field_values(owner, &definition.field).is_empty();
        if repeated {
            self.report(|path, record| Diagnostic::UnexpectedRepeat {
                field: definition.field.clone(),
                path,
                record,
            })?;
            return Ok(ParseState::Swallow(0));
        }
        Ok(ParseState::Extension(ExtensionState::Declared {
            definition,
            owner,
            container: None,
        }))
    }

    fn undeclared_extension(
        &mut self,
        parent: ValueId,
        url: Option<&str>,
        modifier: bool,
    ) -> ParseState {
        let extension = self.create(extension_value(url, modifier));
        ParseState::Extension(ExtensionState::Undeclared {
            extension,
            target: Target::Extensions { parent, modifier },
        })
    }

    fn create_container(&mut self, container_type: String) -> ValueId {
        let container = self.create(TypedValue::composite(container_type));
        if let Some(ParseState::Extension(ExtensionState::Declared {
            container: slot, ..
        })) = self.stack.last_mut()
        {
            *slot = Some(container);
        }
        container
    }

    /// An extension element names its url only after it opened. Switch to the
    /// declared form when the owner's type knows the url.
    fn set_extension_url(
        &mut self,
        extension: ValueId,
        target: Target,
        url: &str,
    ) -> Result<(), ParseError> {
        if let Target::Extensions {
            parent,
            modifier: false,
        } = target
        {
            let value = self.document.value(extension);
            let untouched = value.extensions.is_empty()
                && value.modifier_extensions.is_empty()
                && value.as_extension().is_some_and(|content| content.value.is_none());
            let type_name = &self.document.value(parent).type_name;
            if untouched
                && let Some(definition) = self.registry.declared_extension_for(type_name, url)
            {
                let definition = definition.clone();
                let state = self.declared_extension(definition, parent)?;
                self.stack.pop();
                self.stack.push(state);
                return Ok(());
            }
        }
        if let Some(content) = self.document.value_mut(extension).as_extension_mut() {
            content.url = Some(url.to_string());
        }
        Ok(())
    }

    // =========================================================================
    // Closing states
    // =========================================================================

    fn finish_state(&mut self, state: ParseState) -> Result<(), ParseError> {
        match state {
            ParseState::Swallow(_) => Ok(()),
            ParseState::PreRecord(pre) => match pre.record {
                Some(_) => Ok(()),
                None => Err(self.error(ParseErrorKind::MissingRecord)),
            },
            ParseState::Composite(CompositeState { value, target }) => {
                self.attach_reference(value);
                self.previous = Some(value);
                self.populate(value, target)
            }
            ParseState::Primitive(PrimitiveState {
                value,
                kind,
                target,
                text,
                value_seen,
            }) => {
                let text = text.trim();
                if !value_seen && !text.is_empty() {
                    self.assign_scalar(value, kind, text)?;
                }
                self.previous = Some(value);
                let finished = self.document.value(value);
                let empty = matches!(finished.content, ValueContent::Primitive(None))
                    && finished.id.is_none()
                    && finished.extensions.is_empty()
                    && finished.modifier_extensions.is_empty();
                if empty {
                    return Ok(());
                }
                self.populate(value, target)
            }
            ParseState::RawMarkup(markup) => {
                let (value, target, text) = markup.finish();
                self.document.value_mut(value).content = ValueContent::Markup(text);
                self.previous = Some(value);
                self.populate(value, target)
            }
            ParseState::Extension(ExtensionState::Undeclared { extension, target }) => {
                self.previous = Some(extension);
                let value = self.document.value(extension);
                let has_payload = value
                    .as_extension()
                    .is_some_and(|content| content.value.is_some());
                let has_children =
                    !value.extensions.is_empty() || !value.modifier_extensions.is_empty();
                if has_payload && has_children {
                    let url = value.as_extension().and_then(|content| content.url.clone());
                    return self.report(|path, record| Diagnostic::MalformedExtension {
                        url,
                        reason: "extension has both a value and nested extensions".to_string(),
                        path,
                        record,
                    });
                }
                self.populate(extension, target)
            }
            ParseState::Extension(ExtensionState::Declared {
                definition,
                owner,
                container,
            }) => match container {
                Some(container) => {
                    self.previous = Some(container);
                    self.insert(owner, &definition.field, container)
                }
                None => Ok(()),
            },
        }
    }

    fn populate(&mut self, value: ValueId, target: Target) -> Result<(), ParseError> {
        match target {
            Target::Field { parent, field } => self.insert(parent, &field, value),
            Target::Identity { owner } => {
                let id = self
                    .document
                    .value(value)
                    .as_primitive()
                    .map(ToString::to_string)
                    .filter(|id| !id.trim().is_empty());
                match id {
                    Some(id) => self.set_identity(owner, id),
                    None => Ok(()),
                }
            }
            Target::ExtensionPayload { extension } => self
                .document
                .set_extension_value(extension, value)
                .map_err(|e| self.error(e.into())),
            Target::Extensions { parent, modifier } => {
                let owner = self.document.value_mut(parent);
                if modifier {
                    owner.modifier_extensions.push(value);
                } else {
                    owner.extensions.push(value);
                }
                Ok(())
            }
            Target::Record => self.complete_record(value),
        }
    }

    /// A reference composite carries its target in the reference field.
    fn attach_reference(&mut self, value: ValueId) {
        let registry = self.registry;
        let conventions = registry.conventions();
        if self.document.value(value).type_name != conventions.reference_type {
            return;
        }
        let target = self
            .document
            .field_primitive(value, &conventions.reference_field)
            .map(|target| target.to_string().trim().to_string())
            .filter(|target| !target.is_empty());
        if let Some(target) = target {
            self.document.value_mut(value).reference = Some(Reference::unresolved(target));
        }
    }

    // =========================================================================
    // Records
    // =========================================================================

    fn complete_record(&mut self, record: ValueId) -> Result<(), ParseError> {
        let Some(ParseState::PreRecord(pre)) = self.stack.last_mut() else {
            return Err(self.error(ParseErrorKind::UnbalancedExit));
        };
        let slot = pre.slot.clone();
        let expected = pre.expected.clone();
        let mut contained = std::mem::take(&mut pre.contained);
        let mut record = record;

        if let Some(target) = self.profile_target(record, expected.as_deref()) {
            debug!(
                from = %self.document.value(record).type_name,
                to = %target,
                "retyping record by profile"
            );
            record = self.retype.retype(
                self.registry,
                self.config,
                &mut self.document,
                record,
                &target,
            )?;
            if let Some(field) = self
                .registry
                .lookup_type(&target)
                .and_then(|definition| definition.contained_field())
            {
                contained = ContainedRegistry::from_field(&self.document, record, &field.name);
            }
        }

        let origin = slot.origin();
        self.qualify(record, origin);

        if origin != RecordOrigin::Contained {
            let record_path = self.path.clone();
            let sigil = self.registry.conventions().local_sigil;
            let linked = weave_contained(
                &mut self.document,
                record,
                &record_path,
                &contained,
                sigil,
                &mut self.sink,
            )?;
            if linked > 0 {
                debug!(linked, path = %record_path, "wove contained references");
            }
        }

        match slot {
            RecordSlot::Root => {
                self.stack.pop();
                self.document.set_root(record);
                self.complete = true;
                self.previous = Some(record);
                let type_name = &self.document.value(record).type_name;
                if self.config.stitch_collections && self.registry.is_collection_type(type_name) {
                    let stitcher = Stitcher::new(self.registry, &self.config.stitch);
                    self.index = Some(stitcher.stitch(&mut self.document, &mut self.sink)?);
                }
                Ok(())
            }
            RecordSlot::Embedded { parent, field } => {
                if let Some(ParseState::PreRecord(pre)) = self.stack.last_mut() {
                    pre.record = Some(record);
                    pre.contained = contained;
                }
                self.insert(parent, &field, record)
            }
            RecordSlot::Contained { parent, field } => {
                if let Some(ParseState::PreRecord(pre)) = self.stack.last_mut() {
                    pre.record = Some(record);
                }
                let Some(identity) = self.document.value(record).id.clone() else {
                    let type_name = self.document.value(record).type_name.clone();
                    return self.report(|path, record| Diagnostic::ContainedWithoutIdentity {
                        type_name,
                        path,
                        record,
                    });
                };
                let owner = self.stack.iter_mut().rev().find_map(|state| match state {
                    ParseState::PreRecord(pre)
                        if !matches!(pre.slot, RecordSlot::Contained { .. }) =>
                    {
                        Some(pre)
                    }
                    _ => None,
                });
                if let Some(owner) = owner {
                    owner.contained.register(identity, record);
                }
                self.insert(parent, &field, record)
            }
        }
    }

    /// Specialization implied by the first mapped profile of `record`.
    fn profile_target(&self, record: ValueId, expected: Option<&str>) -> Option<String> {
        let conventions = self.registry.conventions();
        let type_name = self.document.value(record).type_name.as_str();
        let meta = self.document.first_field(record, &conventions.meta_field)?;
        let target = self
            .document
            .field_values(meta, &conventions.profile_field)
            .iter()
            .filter_map(|&profile| {
                self.document
                    .value(profile)
                    .as_primitive()
                    .and_then(PrimitiveValue::as_str)
            })
            .find_map(|url| self.config.type_for_profile(url))?;
        let compatible = target != type_name
            && self.registry.is_specialization_of(target, type_name)
            && expected.is_none_or(|expected| self.registry.is_specialization_of(target, expected));
        compatible.then(|| target.to_string())
    }

    /// Rewrite the raw id into its qualified form and record the version.
    fn qualify(&mut self, record: ValueId, origin: RecordOrigin) {
        let registry = self.registry;
        let conventions = registry.conventions();
        let sigil = conventions.local_sigil;
        let version = self
            .document
            .first_field(record, &conventions.meta_field)
            .and_then(|meta| self.document.field_primitive(meta, &conventions.version_field))
            .map(ToString::to_string)
            .filter(|version| !version.trim().is_empty());

        let value = self.document.value(record);
        let qualified = value.id.as_deref().and_then(|raw| {
            let identity = Identity::parse_with_sigil(raw, sigil)?;
            Some(match (origin, &identity) {
                (RecordOrigin::Contained, _) => format!("{sigil}{}", identity.id_part()),
                (_, Identity::Local(_) | Identity::Urn(_)) => raw.trim().to_string(),
                _ => Identity::qualify(
                    registry.record_name(&value.type_name),
                    identity.id_part(),
                    version.as_deref(),
                ),
            })
        });

        let value = self.document.value_mut(record);
        value.id = qualified;
        value.record = Some(RecordInfo {
            origin,
            version_id: version,
        });
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn push(&mut self, state: ParseState) {
        trace!(state = state.name(), path = %self.path, "push");
        self.stack.push(state);
    }

    fn create(&mut self, mut value: TypedValue) -> ValueId {
        value.comments.pre.append(&mut self.pending_comments);
        self.document.create_value(value)
    }

    fn insert(&mut self, parent: ValueId, field: &str, child: ValueId) -> Result<(), ParseError> {
        self.document
            .push_field(parent, field, child)
            .map_err(|e| self.error(e.into()))
    }

    /// The first identity of a value wins.
    fn set_identity(&mut self, value: ValueId, id: String) -> Result<(), ParseError> {
        if self.document.value(value).id.is_some() {
            let field = self.registry.conventions().id_attribute.clone();
            return self.report(|path, record| Diagnostic::UnexpectedRepeat {
                field,
                path,
                record,
            });
        }
        self.document.value_mut(value).id = Some(id);
        Ok(())
    }

    fn assign_scalar(
        &mut self,
        value: ValueId,
        kind: PrimitiveKind,
        raw: &str,
    ) -> Result<(), ParseError> {
        match kind.parse(raw) {
            Ok(parsed) => {
                self.document.value_mut(value).content = ValueContent::Primitive(Some(parsed));
                Ok(())
            }
            Err(error) => self.report(|path, record| Diagnostic::InvalidValue {
                value: raw.to_string(),
                reason: error.to_string(),
                path,
                record,
            }),
        }
    }

    fn unknown_element(&mut self, name: &str) -> Result<ParseState, ParseError> {
        self.report(|path, record| Diagnostic::UnknownElement {
            name: name.to_string(),
            path,
            record,
        })?;
        Ok(ParseState::Swallow(0))
    }

    fn unknown_attribute(&mut self, name: &str) -> Result<(), ParseError> {
        self.report(|path, record| Diagnostic::UnknownAttribute {
            name: name.to_string(),
            path,
            record,
        })
    }

    fn report(
        &mut self,
        diagnostic: impl FnOnce(ElementPath, Option<RecordContext>) -> Diagnostic,
    ) -> Result<(), ParseError> {
        let diagnostic = diagnostic(self.path.clone(), self.current_record());
        self.sink.report(diagnostic)
    }

    fn ensure_open(&self) -> Result<(), ParseError> {
        if self.complete {
            return Err(self.error(ParseErrorKind::TrailingEvent));
        }
        Ok(())
    }

    fn error(&self, kind: ParseErrorKind) -> ParseError {
        ParseError::new(kind, self.current_record(), self.path.clone())
    }

    /// The innermost record under construction.
    fn current_record(&self) -> Option<RecordContext> {
        let record = self.stack.iter().rev().find_map(|state| match state {
            ParseState::PreRecord(PreRecordState {
                record: Some(record),
                ..
            }) => Some(*record),
            _ => None,
        })?;
        let value = self.document.value(record);
        Some(RecordContext::new(value.type_name.clone(), value.id.clone()))
    }
}

fn extension_value(url: Option<&str>, modifier: bool) -> TypedValue {
    TypedValue::new(
        EXTENSION_TYPE,
        ValueContent::Extension(ExtensionContent {
            url: url.map(str::to_string),
            modifier,
            value: None,
        }),
    )
}

/// Drive a fresh parser with every event of `events`.
pub fn parse_events<S, I>(
    registry: &SchemaRegistry,
    config: &ParserConfig,
    events: I,
    sink: S,
) -> Result<ParseOutput<S>, ParseError>
where
    S: DiagnosticSink,
    I: IntoIterator<Item = Event>,
{
    let mut parser = Parser::new(registry, config, sink);
    for event in events {
        parser.handle(event)?;
    }
    parser.finish()
}
