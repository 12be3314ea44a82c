//! Runtime type schema for the weave parser.
//!
//! A [`SchemaRegistry`] maps type names to [`TypeDefinition`]s and is
//! immutable once built, so one registry can be shared by any number of
//! concurrent parses.

mod definition;
mod primitive;
mod registry;

pub use definition::{
    Cardinality, DeclaredExtension, FieldDefinition, FieldKind, TypeDefinition, TypeKind,
};
pub use primitive::{PrimitiveKind, ScalarError};
pub use registry::{Conventions, RegistryError, SchemaRegistry, SchemaRegistryBuilder};
