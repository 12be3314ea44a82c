#![doc = include_str!("../README.md")]

mod config;
mod error;
mod events;

pub use config::Config;
pub use error::{JsonToEventsError, ParseJsonError};
pub use events::{json_to_events, json_to_events_with_config};

use serde_json::Value as JsonValue;
use weave_document::TagList;
use weave_parser::{DiagnosticSink, ParseOutput, ParserConfig, parse_events, parse_tag_list};
use weave_schema::SchemaRegistry;

/// Parse a JSON document into a typed document.
pub fn parse_json_str<S: DiagnosticSink>(
    registry: &SchemaRegistry,
    config: &ParserConfig,
    input: &str,
    sink: S,
) -> Result<ParseOutput<S>, ParseJsonError> {
    let value: JsonValue = serde_json::from_str(input)?;
    let events = json_to_events(&value)?;
    Ok(parse_events(registry, config, events, sink)?)
}

/// Parse a JSON tag list.
pub fn tag_list_from_json_str(input: &str) -> Result<TagList, ParseJsonError> {
    let value: JsonValue = serde_json::from_str(input)?;
    let events = json_to_events(&value)?;
    Ok(parse_tag_list(events)?)
}
