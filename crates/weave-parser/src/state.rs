use weave_document::{RecordOrigin, ValueId};
use weave_schema::{DeclaredExtension, PrimitiveKind};

use crate::container::ContainedRegistry;

/// Where a finished value goes when its state is popped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Target {
    Field { parent: ValueId, field: String },
    /// The scalar becomes the identity of `owner` instead of a field.
    Identity { owner: ValueId },
    ExtensionPayload { extension: ValueId },
    Extensions { parent: ValueId, modifier: bool },
    /// The value is the record of the enclosing pre-record state.
    Record,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RecordSlot {
    Root,
    Embedded { parent: ValueId, field: String },
    Contained { parent: ValueId, field: String },
}

impl RecordSlot {
    pub fn origin(&self) -> RecordOrigin {
        match self {
            RecordSlot::Root => RecordOrigin::TopLevel,
            RecordSlot::Embedded { .. } => RecordOrigin::Embedded,
            RecordSlot::Contained { .. } => RecordOrigin::Contained,
        }
    }
}

/// Waiting for the element that names a record type.
#[derive(Debug)]
pub(crate) struct PreRecordState {
    pub slot: RecordSlot,
    pub expected: Option<String>,
    pub record: Option<ValueId>,
    /// Unused for contained slots; they register with their owner.
    pub contained: ContainedRegistry,
}

impl PreRecordState {
    pub fn new(slot: RecordSlot) -> Self {
        Self {
            slot,
            expected: None,
            record: None,
            contained: ContainedRegistry::new(),
        }
    }
}

#[derive(Debug)]
pub(crate) struct CompositeState {
    pub value: ValueId,
    pub target: Target,
}

#[derive(Debug)]
pub(crate) struct PrimitiveState {
    pub value: ValueId,
    pub kind: PrimitiveKind,
    pub target: Target,
    pub text: String,
    /// A value attribute arrived; text content is then ignored.
    pub value_seen: bool,
}

impl PrimitiveState {
    pub fn new(value: ValueId, kind: PrimitiveKind, target: Target) -> Self {
        Self {
            value,
            kind,
            target,
            text: String::new(),
            value_seen: false,
        }
    }
}

#[derive(Debug)]
pub(crate) enum ExtensionState {
    /// Known by url on the owner's type; the payload lands in a named field.
    Declared {
        definition: DeclaredExtension,
        owner: ValueId,
        /// Created on the first nested extension.
        container: Option<ValueId>,
    },
    Undeclared { extension: ValueId, target: Target },
}

/// Captures embedded markup verbatim, starting at the field element itself.
#[derive(Debug)]
pub(crate) struct RawMarkupState {
    pub value: ValueId,
    pub target: Target,
    buffer: String,
    open: Vec<String>,
    tag_open: bool,
    /// Whole markup given as a value attribute on the field element.
    whole: Option<String>,
}

impl RawMarkupState {
    pub fn new(value: ValueId, target: Target, namespace: Option<&str>, name: &str) -> Self {
        let mut state = Self {
            value,
            target,
            buffer: String::new(),
            open: Vec::new(),
            tag_open: false,
            whole: None,
        };
        state.open_element(namespace, name);
        state
    }

    /// Deeper than the field element.
    pub fn is_nested(&self) -> bool {
        self.open.len() > 1
    }

    pub fn open_element(&mut self, namespace: Option<&str>, name: &str) {
        self.close_start_tag();
        self.buffer.push('<');
        self.buffer.push_str(name);
        if let Some(namespace) = namespace {
            self.push_attribute("xmlns", namespace);
        }
        self.open.push(name.to_string());
        self.tag_open = true;
    }

    pub fn attribute(&mut self, name: &str, value: &str, value_attribute: &str) {
        if self.open.len() == 1 && name == value_attribute {
            self.whole = Some(value.to_string());
            return;
        }
        if self.tag_open {
            self.push_attribute(name, value);
        }
    }

    pub fn text(&mut self, text: &str) {
        self.close_start_tag();
        escape_into(&mut self.buffer, text, false);
    }

    pub fn fragment(&mut self, markup: &str) {
        self.close_start_tag();
        self.buffer.push_str(markup);
    }

    pub fn comment(&mut self, text: &str) {
        self.close_start_tag();
        self.buffer.push_str("<!--");
        self.buffer.push_str(text);
        self.buffer.push_str("-->");
    }

    pub fn close_element(&mut self) {
        let Some(name) = self.open.pop() else {
            return;
        };
        if self.tag_open {
            self.buffer.push_str("/>");
            self.tag_open = false;
        } else {
            self.buffer.push_str("</");
            self.buffer.push_str(&name);
            self.buffer.push('>');
        }
    }

    /// Close the field element and return the captured markup.
    pub fn finish(mut self) -> (ValueId, Target, String) {
        while !self.open.is_empty() {
            self.close_element();
        }
        let markup = self.whole.take().unwrap_or(self.buffer);
        (self.value, self.target, markup)
    }

    fn push_attribute(&mut self, name: &str, value: &str) {
        self.buffer.push(' ');
        self.buffer.push_str(name);
        self.buffer.push_str("=\"");
        escape_into(&mut self.buffer, value, true);
        self.buffer.push('"');
    }

    fn close_start_tag(&mut self) {
        if self.tag_open {
            self.buffer.push('>');
            self.tag_open = false;
        }
    }
}

fn escape_into(out: &mut String, text: &str, attribute: bool) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}

#[derive(Debug)]
pub(crate) enum ParseState {
    PreRecord(PreRecordState),
    Composite(CompositeState),
    Primitive(PrimitiveState),
    Extension(ExtensionState),
    RawMarkup(RawMarkupState),
    /// Discards a subtree; the count is how many nested elements are open.
    Swallow(usize),
}

impl ParseState {
    pub fn name(&self) -> &'static str {
        match self {
            ParseState::PreRecord(_) => "pre-record",
            ParseState::Composite(_) => "composite",
            ParseState::Primitive(_) => "primitive",
            ParseState::Extension(ExtensionState::Declared { .. }) => "declared-extension",
            ParseState::Extension(ExtensionState::Undeclared { .. }) => "extension",
            ParseState::RawMarkup(_) => "raw-markup",
            ParseState::Swallow(_) => "swallow",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn markup(namespace: Option<&str>) -> RawMarkupState {
        RawMarkupState::new(ValueId(0), Target::Record, namespace, "div")
    }

    #[test]
    fn test_markup_capture() {
        let mut state = markup(Some("http://www.w3.org/1999/xhtml"));
        state.text("Hello ");
        state.open_element(None, "b");
        state.attribute("class", "x\"y", "value");
        state.text("a < b");
        assert!(state.is_nested());
        state.close_element();
        state.open_element(None, "br");
        state.close_element();
        assert!(!state.is_nested());
        let (_, _, text) = state.finish();
        assert_eq!(
            text,
            "<div xmlns=\"http://www.w3.org/1999/xhtml\">Hello <b class=\"x&quot;y\">a &lt; b</b><br/></div>"
        );
    }

    #[test]
    fn test_markup_value_attribute_replaces_capture() {
        let mut state = markup(None);
        state.attribute("value", "<div>whole</div>", "value");
        let (_, _, text) = state.finish();
        assert_eq!(text, "<div>whole</div>");
    }

    #[test]
    fn test_markup_fragment_and_empty() {
        let mut state = markup(None);
        state.fragment("<p>raw</p>");
        let (_, _, text) = state.finish();
        assert_eq!(text, "<div><p>raw</p></div>");

        let (_, _, empty) = markup(None).finish();
        assert_eq!(empty, "<div/>");
    }
}
