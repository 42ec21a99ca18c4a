//! The cross-reference graph and serialized-text rewriter.
//!
//! After every kind has been fetched and named, the graph maps each
//! external identifier to the symbolic expression other resources use to
//! depend on it. Rewriting happens on the serialized file text so the
//! surrounding declarative syntax is preserved exactly as emitted, and
//! is scoped to attributes declared as relation fields in the schema
//! catalog.

use std::collections::{BTreeMap, BTreeSet};

use miette::Diagnostic;
use thiserror::Error;

use crate::core::record::{ObjectKind, ResourceRecord};
use crate::core::schema::RelationAttrs;

/// Two kinds reported the same external identifier. The graph would be
/// ambiguous, so this is fatal at build time.
#[derive(Debug, Error, Diagnostic)]
#[error("external id `{external_id}` is claimed by both {first} and {second}")]
#[diagnostic(code(moor::refs::conflict))]
pub struct ReferenceConflictError {
    pub external_id: String,
    pub first: ObjectKind,
    pub second: ObjectKind,
}

#[derive(Debug, Clone)]
struct SymbolicRef {
    kind: ObjectKind,
    expr: String,
}

/// Run-scoped map from external identifier to symbolic reference.
/// Built once after all fetches complete; read-only afterward.
#[derive(Debug, Default)]
pub struct ReferenceGraph {
    refs: BTreeMap<String, SymbolicRef>,
}

impl ReferenceGraph {
    pub fn build(records: &[ResourceRecord]) -> Result<Self, ReferenceConflictError> {
        let mut refs: BTreeMap<String, SymbolicRef> = BTreeMap::new();
        for record in records {
            if record.external_id.is_empty() {
                continue;
            }
            let expr = if record.kind.addressable() {
                format!("{}.id", record.address())
            } else {
                record.identifier.clone()
            };
            if let Some(existing) = refs.get(&record.external_id) {
                return Err(ReferenceConflictError {
                    external_id: record.external_id.clone(),
                    first: existing.kind,
                    second: record.kind,
                });
            }
            refs.insert(
                record.external_id.clone(),
                SymbolicRef {
                    kind: record.kind,
                    expr,
                },
            );
        }
        Ok(ReferenceGraph { refs })
    }

    /// The symbolic expression for an external id, if the object is part
    /// of this run's export set.
    pub fn resolve(&self, external_id: &str) -> Option<&str> {
        self.refs.get(external_id).map(|r| r.expr.as_str())
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    /// Rewrite literal external ids in serialized file text into symbolic
    /// references.
    ///
    /// Only lines whose attribute key is a declared relation field are
    /// touched, and within them only ids belonging to the attribute's
    /// declared target kind. Each whole quoted-string token equal to such
    /// an id becomes the unquoted symbolic expression; ids appearing as
    /// substrings of longer values stay literal, as do ids of objects
    /// outside the export set.
    pub fn rewrite(&self, serialized: &str, relations: &RelationAttrs) -> String {
        let mut out = String::with_capacity(serialized.len());
        for line in serialized.split_inclusive('\n') {
            if let Some(key) = attribute_key(line) {
                if let Some(targets) = relations.targets(key) {
                    out.push_str(&self.rewrite_line(line, targets));
                    continue;
                }
            }
            out.push_str(line);
        }
        out
    }

    fn rewrite_line(&self, line: &str, targets: &BTreeSet<ObjectKind>) -> String {
        let mut rewritten = line.to_string();
        for (external_id, symbolic) in &self.refs {
            if !targets.contains(&symbolic.kind) {
                continue;
            }
            let token = format!("\"{}\"", external_id);
            if rewritten.contains(&token) {
                rewritten = rewritten.replace(&token, &symbolic.expr);
            }
        }
        rewritten
    }
}

/// The attribute key of a `key = value` line, if it is one.
fn attribute_key(line: &str) -> Option<&str> {
    let (lhs, _) = line.split_once('=')?;
    let key = lhs.trim();
    if !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Some(key)
    } else {
        None
    }
}
