//! Schema-directed streaming parser for nested record documents.
//!
//! A [`Parser`] consumes structural [`Event`]s and builds a
//! [`weave_document::Document`] guided by a [`weave_schema::SchemaRegistry`].
//! While parsing it resolves references to contained records, retypes records
//! by profile, and, once the outermost collection closes, stitches references
//! between records anywhere in the collection.
//!
//! Recoverable anomalies go to a [`DiagnosticSink`]; fatal ones end the parse
//! with a [`ParseError`].

mod config;
mod container;
mod diagnostic;
mod error;
mod event;
mod parser;
mod path;
mod retype;
mod state;
mod stitch;
mod walk;

/// Message envelope consistency check.
pub mod envelope;

/// Re-encoding records as events.
pub mod replay;

/// Tag-list parse mode.
pub mod tags;

pub use config::{ParserConfig, StitchConfig};
pub use container::ContainedRegistry;
pub use diagnostic::{
    Action, CollectingSink, Diagnostic, DiagnosticKind, DiagnosticSink, ErrorClass, ErrorPolicy,
    RecordContext,
};
pub use error::{ParseError, ParseErrorKind};
pub use event::Event;
pub use parser::{ParseOutput, Parser, parse_events};
pub use path::ElementPath;
pub use retype::{ReplayRetype, Retype};
pub use stitch::{DocumentIndex, Stitcher};
pub use tags::{TagListParser, parse_tag_list};
