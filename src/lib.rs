//! Moor - a snapshot exporter and round-trip verifier for declarative
//! platform configuration.
//!
//! This crate provides the core library functionality for Moor, including
//! value conversion, identifier assignment, cross-reference rewriting,
//! artifact emission, mapping validation, and round-trip verification.

pub mod api;
pub mod core;
pub mod export;
pub mod util;
pub mod validate;
pub mod verify;

pub use crate::core::{
    names::NameRegistry, record::ObjectKind, record::ResourceRecord, refs::ReferenceGraph,
    schema::SchemaCatalog, value::ConfigValue,
};

pub use crate::util::cancel::CancelToken;
