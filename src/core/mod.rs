//! Core data structures for Moor.
//!
//! This module contains the foundational types used throughout Moor:
//! - Typed declarative values and conversion from API payloads
//! - Object kinds and exported resource records
//! - Identifier assignment and the per-run name registry
//! - The cross-reference graph and serialized-text rewriter
//! - The recursive attribute schema catalog

pub mod names;
pub mod record;
pub mod refs;
pub mod schema;
pub mod value;

pub use names::NameRegistry;
pub use record::{ObjectKind, ResourceRecord};
pub use refs::ReferenceGraph;
pub use schema::{RelationAttrs, SchemaCatalog, SchemaKind, SchemaNode};
pub use value::{ConfigValue, ConversionWarning, Number};
