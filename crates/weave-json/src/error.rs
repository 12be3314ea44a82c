use thiserror::Error;
use weave_parser::ParseError;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum JsonToEventsError {
    #[error("document root must be an object, found {found}")]
    RootNotObject { found: &'static str },

    #[error("object at {path} has no '{key}' member")]
    MissingRecordType { path: String, key: String },

    #[error("'{key}' at {path} must be a string")]
    InvalidRecordType { path: String, key: String },

    #[error("nested arrays are not supported at {path}")]
    NestedArray { path: String },

    #[error("extension at {path} must be an object with a string url")]
    InvalidExtension { path: String },

    #[error("comments at {path} must be strings")]
    InvalidComments { path: String },

    #[error("companion at {path} must be an object or an array of objects")]
    InvalidCompanion { path: String },
}

#[derive(Debug, Error)]
pub enum ParseJsonError {
    #[error("invalid JSON: {0}")]
    Syntax(#[from] serde_json::Error),

    #[error(transparent)]
    Events(#[from] JsonToEventsError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}
