//! Deterministic identifier assignment.
//!
//! Object names on the platform are free-form and may collide after
//! normalization ("Admin Team" and "admin team" are distinct objects).
//! The registry guarantees that no two records of the same kind ever
//! share an identifier, and that assignment is deterministic given the
//! same registry history.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use miette::Diagnostic;
use regex::Regex;
use thiserror::Error;

use crate::core::record::ObjectKind;

static INVALID_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^a-z0-9]+").expect("static identifier regex")
});

/// Identifier assignment failure.
#[derive(Debug, Error, Diagnostic)]
#[error("cannot assign a unique identifier for {kind} `{name}`")]
#[diagnostic(
    code(moor::names::collision),
    help("Rename one of the colliding objects on the platform, or narrow the export with --org")
)]
pub struct NameError {
    pub kind: ObjectKind,
    pub name: String,
}

/// Normalize a human-readable name into a legal declarative identifier:
/// lower-snake-case, letters/digits/underscore only, never starting with
/// a digit, never empty.
pub fn normalize(name: &str) -> String {
    let lowered = name.to_lowercase();
    let replaced = INVALID_CHARS.replace_all(&lowered, "_");
    let trimmed = replaced.trim_matches('_');
    if trimmed.is_empty() {
        return "unnamed".to_string();
    }
    if trimmed.starts_with(|c: char| c.is_ascii_digit()) {
        format!("_{}", trimmed)
    } else {
        trimmed.to_string()
    }
}

/// Run-scoped registry of assigned identifiers, keyed by kind.
#[derive(Debug, Default)]
pub struct NameRegistry {
    assigned: HashMap<ObjectKind, HashSet<String>>,
}

/// Upper bound on the numeric-suffix search. Hitting it means thousands
/// of same-named objects of one kind, which is a data problem worth
/// failing loudly on.
const MAX_SUFFIX: u32 = 10_000;

impl NameRegistry {
    pub fn new() -> Self {
        NameRegistry::default()
    }

    /// Assign a unique identifier for an object of `kind` named
    /// `human_name`. On collision the object's sub-type discriminator is
    /// appended first (e.g. the connection service); if that still
    /// collides, an incrementing numeric suffix guarantees termination.
    /// An existing assignment is never overwritten.
    pub fn assign(
        &mut self,
        kind: ObjectKind,
        human_name: &str,
        discriminator: Option<&str>,
    ) -> Result<String, NameError> {
        let taken = self.assigned.entry(kind).or_default();

        let base = normalize(human_name);
        if taken.insert(base.clone()) {
            return Ok(base);
        }

        let seed = match discriminator {
            Some(disc) => {
                let candidate = format!("{}_{}", base, normalize(disc));
                if taken.insert(candidate.clone()) {
                    return Ok(candidate);
                }
                candidate
            }
            None => base,
        };

        for n in 2..MAX_SUFFIX {
            let candidate = format!("{}_{}", seed, n);
            if taken.insert(candidate.clone()) {
                return Ok(candidate);
            }
        }

        Err(NameError {
            kind,
            name: human_name.to_string(),
        })
    }
}
