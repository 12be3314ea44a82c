/// One structural event produced by an event source.
///
/// Any `IntoIterator<Item = Event>` can drive a [`crate::Parser`]; whether the
/// events came from a markup or a JSON tokenizer makes no difference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Enter {
        namespace: Option<String>,
        name: String,
    },
    Exit,
    Attribute {
        name: String,
        value: String,
    },
    Text(String),
    CommentPre(String),
    CommentPost(String),
    /// Opens an extension attachment; closed by a matching [`Event::Exit`].
    Extension {
        url: Option<String>,
        modifier: bool,
    },
    /// A verbatim fragment of embedded markup.
    Markup(String),
}

impl Event {
    pub fn enter(name: impl Into<String>) -> Self {
        Event::Enter {
            namespace: None,
            name: name.into(),
        }
    }

    pub fn enter_ns(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Event::Enter {
            namespace: Some(namespace.into()),
            name: name.into(),
        }
    }

    pub fn attribute(name: impl Into<String>, value: impl Into<String>) -> Self {
        Event::Attribute {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Event::Text(text.into())
    }

    pub fn extension(url: impl Into<String>) -> Self {
        Event::Extension {
            url: Some(url.into()),
            modifier: false,
        }
    }

    pub fn modifier_extension(url: impl Into<String>) -> Self {
        Event::Extension {
            url: Some(url.into()),
            modifier: true,
        }
    }

    /// Whether this event opens a subtree that a later `Exit` closes.
    pub fn is_opening(&self) -> bool {
        matches!(self, Event::Enter { .. } | Event::Extension { .. })
    }
}
