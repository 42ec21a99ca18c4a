//! Offline mapping-vs-schema validation.
//!
//! Checks a proposed attribute mapping against a kind's schema tree and,
//! on failure, tries to suggest what the author probably meant: first a
//! fixed table of known renamed/restructured fields, then a
//! case-insensitive substring match among the sibling keys at the
//! offending level. A best-effort usability aid, not a correctness
//! guarantee.

use std::collections::{BTreeMap, BTreeSet};

use crate::core::schema::SchemaNode;
use crate::core::value::join_path;

/// Lookup tables injected at construction so tests can substitute
/// fixtures.
#[derive(Debug, Clone)]
pub struct ValidatorTables {
    /// Computed-only field names accepted anywhere without being in the
    /// schema (identifier, timestamps, version, organization scope).
    pub computed_allowlist: BTreeSet<String>,
    /// Known renamed or restructured fields: old flat name to new
    /// (possibly nested) path.
    pub renames: BTreeMap<String, String>,
}

impl ValidatorTables {
    pub fn builtin() -> Self {
        let computed_allowlist = ["id", "created_at", "updated_at", "version", "org_id"]
            .into_iter()
            .map(String::from)
            .collect();
        let renames = [
            ("source_connection_id", "source.connection_id"),
            ("target_connection_id", "target.connection_id"),
            ("cron_schedule", "schedule.cron"),
            ("schedule_timezone", "schedule.timezone"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        ValidatorTables {
            computed_allowlist,
            renames,
        }
    }
}

/// Result of validating one mapping. A leaf-level answer, never a side
/// effect on a larger process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationOutcome {
    pub valid: bool,
    pub offending_path: Option<String>,
    pub suggestion: Option<String>,
    pub detail: Option<String>,
}

impl ValidationOutcome {
    fn ok() -> Self {
        ValidationOutcome {
            valid: true,
            offending_path: None,
            suggestion: None,
            detail: None,
        }
    }

    fn fail(path: String, suggestion: Option<String>, detail: impl Into<String>) -> Self {
        ValidationOutcome {
            valid: false,
            offending_path: Some(path),
            suggestion,
            detail: Some(detail.into()),
        }
    }
}

pub struct Validator {
    tables: ValidatorTables,
}

impl Validator {
    pub fn new(tables: ValidatorTables) -> Self {
        Validator { tables }
    }

    /// Walk the mapping depth-first against the schema. Pure; the first
    /// offending key stops the walk.
    pub fn validate(&self, mapping: &serde_json::Value, schema: &SchemaNode) -> ValidationOutcome {
        match mapping {
            serde_json::Value::Object(map) => self.walk(map, schema, ""),
            _ => ValidationOutcome::fail(
                String::new(),
                None,
                "mapping must be an object at the top level",
            ),
        }
    }

    fn walk(
        &self,
        map: &serde_json::Map<String, serde_json::Value>,
        node: &SchemaNode,
        path: &str,
    ) -> ValidationOutcome {
        for (key, value) in map {
            let child_path = join_path(path, key);
            let child = match node.child(key) {
                Some(child) => child,
                None => {
                    if self.tables.computed_allowlist.contains(key) {
                        continue;
                    }
                    let suggestion = self.suggest(key, node);
                    return ValidationOutcome::fail(
                        child_path.clone(),
                        suggestion,
                        format!("unknown field `{}`", child_path),
                    );
                }
            };

            if let serde_json::Value::Object(nested) = value {
                if !child.is_object_like() {
                    return ValidationOutcome::fail(
                        child_path.clone(),
                        None,
                        format!("field `{}` is not a nested object", child_path),
                    );
                }
                let outcome = self.walk(nested, child, &child_path);
                if !outcome.valid {
                    return outcome;
                }
            }
        }
        ValidationOutcome::ok()
    }

    /// Suggestion heuristic, applied only on failure: rename table
    /// first, then first case-insensitive substring match among the
    /// sibling keys of the current schema level.
    fn suggest(&self, key: &str, node: &SchemaNode) -> Option<String> {
        if let Some(renamed) = self.tables.renames.get(key) {
            return Some(renamed.clone());
        }
        let lowered = key.to_lowercase();
        node.children.keys().find_map(|sibling| {
            let sib = sibling.to_lowercase();
            if sib.contains(&lowered) || lowered.contains(&sib) {
                Some(sibling.clone())
            } else {
                None
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::SchemaNode;
    use serde_json::json;

    fn schema() -> SchemaNode {
        SchemaNode::object(vec![
            ("name", SchemaNode::scalar()),
            (
                "source",
                SchemaNode::object(vec![
                    ("connection_id", SchemaNode::scalar()),
                    ("table", SchemaNode::scalar()),
                ]),
            ),
            (
                "schedule",
                SchemaNode::object(vec![("cron", SchemaNode::scalar())]),
            ),
        ])
    }

    fn validator() -> Validator {
        Validator::new(ValidatorTables::builtin())
    }

    #[test]
    fn test_valid_mapping_recursively() {
        let outcome = validator().validate(
            &json!({
                "name": "x",
                "source": {"connection_id": "c", "table": "t"},
                "id": "computed-ok"
            }),
            &schema(),
        );
        assert!(outcome.valid);
    }

    #[test]
    fn test_rename_table_suggestion_is_exact() {
        let outcome = validator().validate(&json!({"source_connection_id": "x"}), &schema());
        assert!(!outcome.valid);
        assert_eq!(outcome.offending_path.as_deref(), Some("source_connection_id"));
        assert_eq!(outcome.suggestion.as_deref(), Some("source.connection_id"));
    }

    #[test]
    fn test_sibling_substring_suggestion() {
        let outcome = validator().validate(&json!({"Sched": "x"}), &schema());
        assert!(!outcome.valid);
        assert_eq!(outcome.suggestion.as_deref(), Some("schedule"));
    }

    #[test]
    fn test_nested_unknown_key_has_dotted_path() {
        let outcome = validator().validate(&json!({"source": {"tabel": "t"}}), &schema());
        assert!(!outcome.valid);
        assert_eq!(outcome.offending_path.as_deref(), Some("source.tabel"));
        assert_eq!(outcome.suggestion.as_deref(), Some("table"));
    }

    #[test]
    fn test_object_value_against_scalar_schema_fails() {
        let outcome = validator().validate(&json!({"name": {"nested": true}}), &schema());
        assert!(!outcome.valid);
        assert!(outcome
            .detail
            .as_deref()
            .unwrap()
            .contains("not a nested object"));
    }

    #[test]
    fn test_injected_tables_replace_builtin() {
        let tables = ValidatorTables {
            computed_allowlist: BTreeSet::new(),
            renames: BTreeMap::new(),
        };
        let outcome = Validator::new(tables).validate(&json!({"id": "x"}), &schema());
        // Without the allowlist, `id` is an unknown field.
        assert!(!outcome.valid);
    }
}
