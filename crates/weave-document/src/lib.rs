//! Typed value graph produced by the weave parser.
//!
//! Values live in an arena ([`Document`]) and refer to each other through
//! [`ValueId`] slots. Ownership is strictly hierarchical: a composite owns the
//! values stored in its fields, an extension owns its payload. Cross-references
//! never own anything; they carry an identity string and, once resolved, the
//! slot of a value that lives elsewhere in the same document.

/// Arena of typed values.
pub mod document;

/// Identity strings (local, URN, and type-qualified forms).
pub mod identity;

/// Tag lists, the output of tag-list parse mode.
pub mod tag;

/// Values stored in the arena.
pub mod value;

pub use ahash::AHashMap as Map;

pub use document::{Document, InsertError, ValueId};
pub use identity::Identity;
pub use tag::{Tag, TagList};
pub use value::{
    Comments, ExtensionContent, FieldMap, PrimitiveValue, RecordInfo, RecordOrigin, Reference,
    TypedValue, ValueContent,
};

pub(crate) mod prelude_internal {
    #![allow(unused_imports)]
    pub use crate::Map;
    pub use crate::document::{Document, InsertError, ValueId};
    pub use crate::value::{
        Comments, ExtensionContent, FieldMap, PrimitiveValue, RecordInfo, RecordOrigin,
        Reference, TypedValue, ValueContent,
    };
    pub use thisisplural::Plural;
}
