//! Tag-list parse mode.
//!
//! A lighter grammar than records: a `TagList` root holding `category`
//! elements, each with term, scheme, and label parts.

use weave_document::{Tag, TagList};

use crate::error::{ParseError, ParseErrorKind};
use crate::event::Event;
use crate::path::ElementPath;

const ROOT: &str = "TagList";
const CATEGORY: &str = "category";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TagField {
    Term,
    Scheme,
    Label,
}

impl TagField {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "term" | "code" => Some(TagField::Term),
            "scheme" | "system" => Some(TagField::Scheme),
            "label" | "display" => Some(TagField::Label),
            _ => None,
        }
    }

    fn set(self, tag: &mut Tag, value: &str) {
        let slot = match self {
            TagField::Term => &mut tag.term,
            TagField::Scheme => &mut tag.scheme,
            TagField::Label => &mut tag.label,
        };
        *slot = Some(value.to_string());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TagState {
    Start,
    List,
    Category,
    Part(TagField),
    Done,
}

#[derive(Debug)]
pub struct TagListParser {
    state: TagState,
    current: Tag,
    tags: TagList,
    path: ElementPath,
}

impl Default for TagListParser {
    fn default() -> Self {
        Self::new()
    }
}

impl TagListParser {
    pub fn new() -> Self {
        Self {
            state: TagState::Start,
            current: Tag::default(),
            tags: TagList::new(),
            path: ElementPath::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.state == TagState::Done
    }

    pub fn handle(&mut self, event: Event) -> Result<(), ParseError> {
        match event {
            Event::Enter { name, .. } => self.enter(&name),
            Event::Exit => self.exit(),
            Event::Attribute { name, value } => {
                self.attribute(&name, &value);
                Ok(())
            }
            Event::Extension { modifier, .. } => {
                let name = if modifier {
                    "modifierExtension"
                } else {
                    "extension"
                };
                Err(self.unexpected(name))
            }
            Event::Markup(_) => Err(self.unexpected("markup")),
            Event::Text(text) if self.state == TagState::Done && !text.trim().is_empty() => {
                Err(self.error(ParseErrorKind::TrailingEvent))
            }
            Event::Text(_) | Event::CommentPre(_) | Event::CommentPost(_) => Ok(()),
        }
    }

    pub fn finish(self) -> Result<TagList, ParseError> {
        if self.state != TagState::Done {
            return Err(ParseError::new(ParseErrorKind::Incomplete, None, self.path));
        }
        Ok(self.tags)
    }

    fn enter(&mut self, name: &str) -> Result<(), ParseError> {
        self.path.push(name);
        self.state = match self.state {
            TagState::Start if name.eq_ignore_ascii_case(ROOT) => TagState::List,
            TagState::List if name == CATEGORY => {
                self.current = Tag::default();
                TagState::Category
            }
            TagState::Category => match TagField::from_name(name) {
                Some(field) => TagState::Part(field),
                None => return Err(self.unexpected(name)),
            },
            TagState::Done => return Err(self.error(ParseErrorKind::TrailingEvent)),
            TagState::Start | TagState::List | TagState::Part(_) => {
                return Err(self.unexpected(name));
            }
        };
        Ok(())
    }

    fn exit(&mut self) -> Result<(), ParseError> {
        self.state = match self.state {
            TagState::Part(_) => TagState::Category,
            TagState::Category => {
                self.tags.add(std::mem::take(&mut self.current));
                TagState::List
            }
            TagState::List => TagState::Done,
            TagState::Start | TagState::Done => {
                return Err(self.error(ParseErrorKind::UnbalancedExit));
            }
        };
        self.path.pop();
        Ok(())
    }

    fn attribute(&mut self, name: &str, value: &str) {
        match self.state {
            TagState::Part(field) => field.set(&mut self.current, value),
            // Object-style sources put the parts straight on the category.
            TagState::Category => {
                if let Some(field) = TagField::from_name(name) {
                    field.set(&mut self.current, value);
                }
            }
            TagState::Start | TagState::List | TagState::Done => {}
        }
    }

    fn unexpected(&self, name: &str) -> ParseError {
        self.error(ParseErrorKind::UnexpectedTagElement {
            name: name.to_string(),
        })
    }

    fn error(&self, kind: ParseErrorKind) -> ParseError {
        ParseError::new(kind, None, self.path.clone())
    }
}

/// Read a complete tag list from `events`.
pub fn parse_tag_list<I>(events: I) -> Result<TagList, ParseError>
where
    I: IntoIterator<Item = Event>,
{
    let mut parser = TagListParser::new();
    for event in events {
        parser.handle(event)?;
    }
    parser.finish()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn tag(scheme: &str, term: &str, label: Option<&str>) -> Tag {
        Tag::new(
            Some(scheme.to_string()),
            Some(term.to_string()),
            label.map(str::to_string),
        )
    }

    #[test]
    fn test_element_form() {
        let events = vec![
            Event::enter("taglist"),
            Event::enter("category"),
            Event::enter("term"),
            Event::attribute("value", "urgent"),
            Event::Exit,
            Event::enter("scheme"),
            Event::attribute("value", "http://example.org/tags"),
            Event::Exit,
            Event::enter("label"),
            Event::attribute("value", "Urgent"),
            Event::Exit,
            Event::Exit,
            Event::Exit,
        ];
        let tags = parse_tag_list(events).unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(
            tags.get(0),
            Some(&tag("http://example.org/tags", "urgent", Some("Urgent")))
        );
    }

    #[test]
    fn test_attributes_on_category_and_blank_tags() {
        let events = vec![
            Event::enter("TagList"),
            Event::attribute("xmlns", "http://example.org/ns"),
            Event::enter("category"),
            Event::attribute("code", "a"),
            Event::attribute("system", "http://example.org/s"),
            Event::Exit,
            Event::enter("category"),
            Event::Exit,
            Event::Exit,
        ];
        let tags = parse_tag_list(events).unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags.get(0), Some(&tag("http://example.org/s", "a", None)));
    }

    #[test]
    fn test_unexpected_element_is_fatal() {
        let mut parser = TagListParser::new();
        parser.handle(Event::enter("TagList")).unwrap();
        parser.handle(Event::enter("category")).unwrap();
        let error = parser.handle(Event::enter("weight")).unwrap_err();
        assert_eq!(
            error.kind,
            ParseErrorKind::UnexpectedTagElement {
                name: "weight".into()
            }
        );
        assert_eq!(error.path.to_string(), "TagList.category.weight");
    }

    #[test]
    fn test_wrong_root_and_incomplete() {
        let mut parser = TagListParser::new();
        assert!(parser.handle(Event::enter("Bundle")).is_err());

        let mut parser = TagListParser::new();
        parser.handle(Event::enter("TagList")).unwrap();
        assert_eq!(
            parser.finish().unwrap_err().kind,
            ParseErrorKind::Incomplete
        );
    }
}
