use thiserror::Error;
use weave_document::InsertError;

use crate::diagnostic::{Diagnostic, RecordContext};
use crate::path::ElementPath;

/// A fatal parse failure.
///
/// Carries the record under construction so callers can tell which record
/// failed, and the element path at the point of failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind} at path {path}{}", .record.as_ref().map(|r| format!(" (in {r})")).unwrap_or_default())]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub record: Option<RecordContext>,
    pub path: ElementPath,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseErrorKind {
    #[error("Element '{name}' is not a known record type, expected a record at this position")]
    UnknownRecordType { name: String },

    #[error("Unknown record type '{name}': record type names are case sensitive, found similar name '{similar}'")]
    RecordTypeCaseMismatch { name: String, similar: String },

    #[error("Incorrect record type found, expected '{expected}' but found '{found}'")]
    WrongRecordType { expected: String, found: String },

    #[error("'{name}' is not allowed here: {reason}")]
    IllegalPosition { name: String, reason: String },

    #[error("Unexpected second record '{name}' in a single-record position")]
    UnexpectedRecord { name: String },

    #[error("Record expected but the element closed without one")]
    MissingRecord,

    #[error("Exit without a matching open element")]
    UnbalancedExit,

    #[error("Event after the document was complete")]
    TrailingEvent,

    #[error("Input ended before the document was complete")]
    Incomplete,

    #[error("Unexpected element '{name}' in tag list")]
    UnexpectedTagElement { name: String },

    #[error("Parse aborted: {0}")]
    Aborted(Diagnostic),

    #[error(transparent)]
    Insert(#[from] InsertError),
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, record: Option<RecordContext>, path: ElementPath) -> Self {
        Self { kind, record, path }
    }

    /// Error for a diagnostic that the sink decided to escalate.
    pub fn aborted(diagnostic: Diagnostic) -> Self {
        let record = diagnostic.record().cloned();
        let path = diagnostic.path().clone();
        Self {
            kind: ParseErrorKind::Aborted(diagnostic),
            record,
            path,
        }
    }

    pub fn as_diagnostic(&self) -> Option<&Diagnostic> {
        match &self.kind {
            ParseErrorKind::Aborted(diagnostic) => Some(diagnostic),
            _ => None,
        }
    }
}
