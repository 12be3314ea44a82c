//! Recoverable anomalies and the sink that decides whether they abort a parse.
//!
//! Two classes of findings are reported here:
//! - schema violations (unknown names, repeats, bad scalars, malformed
//!   extensions), which a policy may turn into a fatal abort
//! - reference errors (contained records without identity, dangling or
//!   duplicated identities), which never abort

use core::fmt;

use ahash::AHashMap;
use thiserror::Error;
use tracing::warn;

use crate::error::ParseError;
use crate::path::ElementPath;

// =============================================================================
// RecordContext
// =============================================================================

/// The record being built when something went wrong.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordContext {
    pub type_name: String,
    pub id: Option<String>,
}

impl RecordContext {
    pub fn new(type_name: impl Into<String>, id: Option<String>) -> Self {
        Self {
            type_name: type_name.into(),
            id,
        }
    }
}

impl fmt::Display for RecordContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id {
            Some(id) => write!(f, "{} '{}'", self.type_name, id),
            None => f.write_str(&self.type_name),
        }
    }
}

// =============================================================================
// Diagnostic
// =============================================================================

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Diagnostic {
    #[error("Unknown element '{name}' at path {path}")]
    UnknownElement {
        name: String,
        path: ElementPath,
        record: Option<RecordContext>,
    },

    #[error("Unknown attribute '{name}' at path {path}")]
    UnknownAttribute {
        name: String,
        path: ElementPath,
        record: Option<RecordContext>,
    },

    #[error("Multiple repetitions of non-repeatable element '{field}' at path {path}")]
    UnexpectedRepeat {
        field: String,
        path: ElementPath,
        record: Option<RecordContext>,
    },

    #[error("Invalid value '{value}' at path {path}: {reason}")]
    InvalidValue {
        value: String,
        reason: String,
        path: ElementPath,
        record: Option<RecordContext>,
    },

    #[error("Contained record of type '{type_name}' has no identity at path {path}")]
    ContainedWithoutIdentity {
        type_name: String,
        path: ElementPath,
        record: Option<RecordContext>,
    },

    #[error("Unresolved reference '{target}' at path {path}")]
    UnresolvedReference {
        target: String,
        path: ElementPath,
        record: Option<RecordContext>,
    },

    #[error("Malformed extension '{}' at path {path}: {reason}", .url.as_deref().unwrap_or("(no url)"))]
    MalformedExtension {
        url: Option<String>,
        reason: String,
        path: ElementPath,
        record: Option<RecordContext>,
    },

    #[error("Identity '{identity}' is claimed by more than one record at path {path}")]
    DuplicateIdentity {
        identity: String,
        path: ElementPath,
        record: Option<RecordContext>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    UnknownElement,
    UnknownAttribute,
    UnexpectedRepeat,
    InvalidValue,
    ContainedWithoutIdentity,
    UnresolvedReference,
    MalformedExtension,
    DuplicateIdentity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Policy-controlled.
    SchemaViolation,
    /// Never fatal.
    ReferenceError,
}

impl DiagnosticKind {
    pub fn class(self) -> ErrorClass {
        match self {
            DiagnosticKind::ContainedWithoutIdentity
            | DiagnosticKind::UnresolvedReference
            | DiagnosticKind::DuplicateIdentity => ErrorClass::ReferenceError,
            _ => ErrorClass::SchemaViolation,
        }
    }
}

impl Diagnostic {
    pub fn kind(&self) -> DiagnosticKind {
        match self {
            Diagnostic::UnknownElement { .. } => DiagnosticKind::UnknownElement,
            Diagnostic::UnknownAttribute { .. } => DiagnosticKind::UnknownAttribute,
            Diagnostic::UnexpectedRepeat { .. } => DiagnosticKind::UnexpectedRepeat,
            Diagnostic::InvalidValue { .. } => DiagnosticKind::InvalidValue,
            Diagnostic::ContainedWithoutIdentity { .. } => DiagnosticKind::ContainedWithoutIdentity,
            Diagnostic::UnresolvedReference { .. } => DiagnosticKind::UnresolvedReference,
            Diagnostic::MalformedExtension { .. } => DiagnosticKind::MalformedExtension,
            Diagnostic::DuplicateIdentity { .. } => DiagnosticKind::DuplicateIdentity,
        }
    }

    pub fn class(&self) -> ErrorClass {
        self.kind().class()
    }

    pub fn path(&self) -> &ElementPath {
        match self {
            Diagnostic::UnknownElement { path, .. }
            | Diagnostic::UnknownAttribute { path, .. }
            | Diagnostic::UnexpectedRepeat { path, .. }
            | Diagnostic::InvalidValue { path, .. }
            | Diagnostic::ContainedWithoutIdentity { path, .. }
            | Diagnostic::UnresolvedReference { path, .. }
            | Diagnostic::MalformedExtension { path, .. }
            | Diagnostic::DuplicateIdentity { path, .. } => path,
        }
    }

    pub fn record(&self) -> Option<&RecordContext> {
        match self {
            Diagnostic::UnknownElement { record, .. }
            | Diagnostic::UnknownAttribute { record, .. }
            | Diagnostic::UnexpectedRepeat { record, .. }
            | Diagnostic::InvalidValue { record, .. }
            | Diagnostic::ContainedWithoutIdentity { record, .. }
            | Diagnostic::UnresolvedReference { record, .. }
            | Diagnostic::MalformedExtension { record, .. }
            | Diagnostic::DuplicateIdentity { record, .. } => record.as_ref(),
        }
    }
}

// =============================================================================
// DiagnosticSink
// =============================================================================

/// Receives every recoverable anomaly.
///
/// Returning `Err` aborts the parse with that error; returning `Ok` lets the
/// parser swallow the offending input and continue.
pub trait DiagnosticSink {
    fn report(&mut self, diagnostic: Diagnostic) -> Result<(), ParseError>;
}

impl<S: DiagnosticSink + ?Sized> DiagnosticSink for &mut S {
    fn report(&mut self, diagnostic: Diagnostic) -> Result<(), ParseError> {
        (**self).report(diagnostic)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Continue,
    Abort,
}

#[derive(Debug, Clone)]
pub struct ErrorPolicy {
    pub default: Action,
    pub overrides: AHashMap<DiagnosticKind, Action>,
}

impl Default for ErrorPolicy {
    fn default() -> Self {
        Self::lenient()
    }
}

impl ErrorPolicy {
    pub fn lenient() -> Self {
        Self {
            default: Action::Continue,
            overrides: AHashMap::new(),
        }
    }

    pub fn strict() -> Self {
        Self {
            default: Action::Abort,
            overrides: AHashMap::new(),
        }
    }

    pub fn with(mut self, kind: DiagnosticKind, action: Action) -> Self {
        self.overrides.insert(kind, action);
        self
    }

    /// Reference errors continue regardless of configuration.
    pub fn action_for(&self, kind: DiagnosticKind) -> Action {
        if kind.class() == ErrorClass::ReferenceError {
            return Action::Continue;
        }
        self.overrides.get(&kind).copied().unwrap_or(self.default)
    }
}

/// Sink that keeps every diagnostic and applies an [`ErrorPolicy`].
#[derive(Debug, Clone, Default)]
pub struct CollectingSink {
    policy: ErrorPolicy,
    diagnostics: Vec<Diagnostic>,
}

impl CollectingSink {
    pub fn new(policy: ErrorPolicy) -> Self {
        Self {
            policy,
            diagnostics: Vec::new(),
        }
    }

    pub fn lenient() -> Self {
        Self::new(ErrorPolicy::lenient())
    }

    pub fn strict() -> Self {
        Self::new(ErrorPolicy::strict())
    }

    pub fn policy(&self) -> &ErrorPolicy {
        &self.policy
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.diagnostics.iter().filter(|d| d.kind() == kind).count()
    }
}

impl DiagnosticSink for CollectingSink {
    fn report(&mut self, diagnostic: Diagnostic) -> Result<(), ParseError> {
        warn!(kind = ?diagnostic.kind(), "{diagnostic}");
        let action = self.policy.action_for(diagnostic.kind());
        self.diagnostics.push(diagnostic.clone());
        match action {
            Action::Continue => Ok(()),
            Action::Abort => Err(ParseError::aborted(diagnostic)),
        }
    }
}
