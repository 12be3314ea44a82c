use core::fmt;

use thisisplural::Plural;

/// Element names from the parse root down to the current element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Plural)]
#[plural(len, is_empty, iter, into_iter, new)]
pub struct ElementPath(Vec<String>);

impl ElementPath {
    pub fn push(&mut self, segment: impl Into<String>) {
        self.0.push(segment.into());
    }

    pub fn pop(&mut self) -> Option<String> {
        self.0.pop()
    }

    pub fn last(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut path = self.clone();
        path.push(segment);
        path
    }
}

impl fmt::Display for ElementPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "(root)");
        }
        write!(f, "{}", self.0.join("."))
    }
}
