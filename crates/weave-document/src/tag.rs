use crate::prelude_internal::*;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tag {
    pub scheme: Option<String>,
    pub term: Option<String>,
    pub label: Option<String>,
}

impl Tag {
    pub fn new(
        scheme: Option<String>,
        term: Option<String>,
        label: Option<String>,
    ) -> Self {
        Self {
            scheme,
            term,
            label,
        }
    }

    /// A tag with neither scheme, term, nor label carries nothing worth keeping.
    pub fn is_blank(&self) -> bool {
        let blank = |s: &Option<String>| s.as_deref().is_none_or(|s| s.trim().is_empty());
        blank(&self.scheme) && blank(&self.term) && blank(&self.label)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Plural)]
#[plural(len, is_empty, iter, into_iter, new)]
pub struct TagList(Vec<Tag>);

impl TagList {
    /// Add a tag unless it is blank.
    pub fn add(&mut self, tag: Tag) -> bool {
        if tag.is_blank() {
            return false;
        }
        self.0.push(tag);
        true
    }

    pub fn get(&self, index: usize) -> Option<&Tag> {
        self.0.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_skips_blank_tags() {
        let mut tags = TagList::new();
        assert!(!tags.add(Tag::default()));
        assert!(!tags.add(Tag::new(None, Some("  ".into()), None)));
        assert!(tags.add(Tag::new(
            Some("http://hl7.org/fhir/tag".into()),
            Some("urgent".into()),
            None
        )));
        assert_eq!(tags.len(), 1);
        assert_eq!(tags.get(0).unwrap().term.as_deref(), Some("urgent"));
    }
}
