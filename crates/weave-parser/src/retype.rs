use weave_document::{Document, ValueId};
use weave_schema::SchemaRegistry;

use crate::config::ParserConfig;
use crate::diagnostic::CollectingSink;
use crate::error::{ParseError, ParseErrorKind};
use crate::parser::Parser;
use crate::path::ElementPath;
use crate::replay::replay;

/// Turns a completed record into an equivalent record of a more specific
/// type.
///
/// Returns the slot of the replacement, which must live in `document`. The
/// caller places it where the original record would have gone; the original
/// is left unreferenced.
pub trait Retype {
    fn retype(
        &self,
        registry: &SchemaRegistry,
        config: &ParserConfig,
        document: &mut Document,
        record: ValueId,
        target: &str,
    ) -> Result<ValueId, ParseError>;
}

/// Re-encodes the record to events and decodes them again as the target
/// type.
///
/// The second pass is lenient: whatever the first pass accepted is accepted
/// again, and findings about fields the target type lacks are dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplayRetype;

impl Retype for ReplayRetype {
    fn retype(
        &self,
        registry: &SchemaRegistry,
        config: &ParserConfig,
        document: &mut Document,
        record: ValueId,
        target: &str,
    ) -> Result<ValueId, ParseError> {
        let events = replay(document, registry, record);
        let mut parser = Parser::new(registry, config, CollectingSink::lenient()).expecting(target);
        for event in events {
            parser.handle(event)?;
        }
        let output = parser.finish()?;
        let root = output.root().ok_or_else(|| {
            ParseError::new(ParseErrorKind::MissingRecord, None, ElementPath::new())
        })?;
        Ok(document.graft(&output.document, root))
    }
}
