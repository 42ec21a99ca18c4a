//! Field-level comparison between live objects and declared blocks.
//!
//! Applied only after a clean plan, as an additional assertion layer.
//! Server-assigned fields are skipped, secret-like fields must be
//! variable references, known structured fields compare by parsed JSON
//! equality, and everything else requires exact string equality. A
//! mismatch outside those classes is a hard validation failure.

use std::collections::{BTreeMap, BTreeSet};

/// Substrings that mark a field as secret-like.
const SECRET_MARKERS: [&str; 6] = [
    "password",
    "secret",
    "token",
    "api_key",
    "private_key",
    "credential",
];

/// Comparison configuration, injected per run.
#[derive(Debug, Clone)]
pub struct CompareRules {
    /// Server-assigned field names, always skipped.
    pub skip: BTreeSet<String>,
    /// Caller-specified dotted paths to ignore.
    pub ignore: Vec<String>,
    /// Attributes carrying serialized JSON, compared structurally.
    pub structured: BTreeSet<String>,
}

impl CompareRules {
    pub fn builtin(ignore: Vec<String>) -> Self {
        CompareRules {
            skip: ["id", "created_at", "updated_at", "version", "org_id", "connected_by"]
                .into_iter()
                .map(String::from)
                .collect(),
            ignore,
            structured: ["rules", "custom_payload"].into_iter().map(String::from).collect(),
        }
    }
}

/// How one field is compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldClass {
    Skip,
    Secret,
    Structured,
    Plain,
}

pub fn classify(path: &str, rules: &CompareRules) -> FieldClass {
    let leaf = path.rsplit('.').next().unwrap_or(path);
    if rules.skip.contains(leaf) || rules.ignore.iter().any(|p| p == path) {
        return FieldClass::Skip;
    }
    if SECRET_MARKERS.iter().any(|m| leaf.contains(m)) {
        return FieldClass::Secret;
    }
    if rules.structured.contains(leaf) {
        return FieldClass::Structured;
    }
    FieldClass::Plain
}

/// One comparison failure.
#[derive(Debug, Clone)]
pub struct FieldMismatch {
    pub path: String,
    pub detail: String,
}

/// A declared attribute value as parsed from artifact text. Unquoted
/// values are reference expressions (variable or resource references).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredValue {
    pub text: String,
    pub quoted: bool,
}

/// One resource block parsed from an artifact file, attributes flattened
/// to dotted paths.
#[derive(Debug, Clone)]
pub struct DeclaredBlock {
    pub resource_type: String,
    pub identifier: String,
    pub attrs: BTreeMap<String, DeclaredValue>,
}

impl DeclaredBlock {
    pub fn address(&self) -> String {
        format!("{}.{}", self.resource_type, self.identifier)
    }
}

/// Parse resource blocks out of emitted artifact text. Only understands
/// the shape this tool emits; the verifier treats anything else in the
/// file as inert.
pub fn parse_blocks(text: &str) -> Vec<DeclaredBlock> {
    let mut blocks = Vec::new();
    let mut current: Option<DeclaredBlock> = None;
    let mut path_stack: Vec<String> = Vec::new();
    let mut list_buffer: Option<(String, String)> = None;

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        if let Some((key, buffered)) = list_buffer.as_mut() {
            if trimmed == "]" {
                let path = join_stack(&path_stack, key);
                if let Some(block) = current.as_mut() {
                    block.attrs.insert(
                        path,
                        DeclaredValue {
                            text: format!("[{}]", buffered.trim_end_matches(", ")),
                            quoted: false,
                        },
                    );
                }
                list_buffer = None;
            } else {
                buffered.push_str(trimmed.trim_end_matches(','));
                buffered.push_str(", ");
            }
            continue;
        }

        if let Some(rest) = trimmed.strip_prefix("resource ") {
            let mut parts = rest.split('"').filter(|s| !s.trim().is_empty() && *s != " ");
            let resource_type = parts.next().unwrap_or_default().to_string();
            let identifier = parts.next().unwrap_or_default().to_string();
            current = Some(DeclaredBlock {
                resource_type,
                identifier,
                attrs: BTreeMap::new(),
            });
            path_stack.clear();
            continue;
        }

        if trimmed == "}" || trimmed == "}," {
            if path_stack.pop().is_none() {
                if let Some(block) = current.take() {
                    blocks.push(block);
                }
            }
            continue;
        }

        if let Some((lhs, rhs)) = trimmed.split_once('=') {
            let key = lhs.trim().to_string();
            let rhs = rhs.trim();
            match rhs {
                "{" => path_stack.push(key),
                "[" => list_buffer = Some((key, String::new())),
                value => {
                    let path = join_stack(&path_stack, &key);
                    if let Some(block) = current.as_mut() {
                        block.attrs.insert(path, parse_value(value));
                    }
                }
            }
        }
    }
    blocks
}

fn join_stack(stack: &[String], key: &str) -> String {
    if stack.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", stack.join("."), key)
    }
}

fn parse_value(raw: &str) -> DeclaredValue {
    if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        DeclaredValue {
            text: unescape(&raw[1..raw.len() - 1]),
            quoted: true,
        }
    } else {
        DeclaredValue {
            text: raw.to_string(),
            quoted: false,
        }
    }
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => {}
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Compare every attribute present in the live object against the
/// declared block. Returns the list of mismatches; empty means the
/// block fully accounts for the live state.
pub fn compare_fields(
    live: &serde_json::Value,
    declared: &BTreeMap<String, DeclaredValue>,
    rules: &CompareRules,
) -> Vec<FieldMismatch> {
    let mut flat = BTreeMap::new();
    flatten_live(live, "", &mut flat);

    let mut mismatches = Vec::new();
    for (path, live_value) in &flat {
        match classify(path, rules) {
            FieldClass::Skip => {}
            FieldClass::Secret => match declared.get(path) {
                Some(v) if !v.quoted && v.text.starts_with("var.") => {}
                Some(_) => mismatches.push(FieldMismatch {
                    path: path.clone(),
                    detail: "secret-like field declared as a literal".to_string(),
                }),
                None => mismatches.push(FieldMismatch {
                    path: path.clone(),
                    detail: "secret-like field missing a variable reference".to_string(),
                }),
            },
            FieldClass::Structured => match declared.get(path) {
                Some(v) => {
                    let live_json: Result<serde_json::Value, _> = serde_json::from_str(live_value);
                    let declared_json: Result<serde_json::Value, _> =
                        serde_json::from_str(&v.text);
                    match (live_json, declared_json) {
                        (Ok(a), Ok(b)) if a == b => {}
                        _ => mismatches.push(FieldMismatch {
                            path: path.clone(),
                            detail: "structured field differs after parsing".to_string(),
                        }),
                    }
                }
                None => mismatches.push(FieldMismatch {
                    path: path.clone(),
                    detail: "structured field missing from declared configuration".to_string(),
                }),
            },
            FieldClass::Plain => match declared.get(path) {
                // A reference expression (variable or resource address);
                // the clean plan already proved it converges to the live
                // value. Bare literals fall through to textual equality.
                Some(v) if !v.quoted && is_reference_expr(&v.text) => {}
                Some(v) if v.text == *live_value => {}
                Some(v) => mismatches.push(FieldMismatch {
                    path: path.clone(),
                    detail: format!("declared `{}`, live `{}`", v.text, live_value),
                }),
                None => mismatches.push(FieldMismatch {
                    path: path.clone(),
                    detail: "missing from declared configuration".to_string(),
                }),
            },
        }
    }
    mismatches
}

/// Whether an unquoted declared value is a reference expression rather
/// than a bare literal: two or more dotted identifier segments, e.g.
/// `var.warehouse_config_password` or `moor_connection.warehouse.id`.
/// Booleans, numbers and inline lists are single tokens and never match.
fn is_reference_expr(text: &str) -> bool {
    let mut segments = 0;
    for segment in text.split('.') {
        let mut chars = segment.chars();
        match chars.next() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
            _ => return false,
        }
        if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return false;
        }
        segments += 1;
    }
    segments >= 2
}

/// Flatten a live object to dotted leaf paths with emitted-form values.
/// Empty values are skipped, matching the exporter's omission rules.
fn flatten_live(value: &serde_json::Value, path: &str, out: &mut BTreeMap<String, String>) {
    match value {
        serde_json::Value::Null => {}
        serde_json::Value::Object(map) => {
            for (key, child) in map {
                let child_path = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", path, key)
                };
                flatten_live(child, &child_path, out);
            }
        }
        serde_json::Value::Array(items) => {
            if items.is_empty() {
                return;
            }
            if items.iter().all(|i| !i.is_object() && !i.is_array()) {
                let rendered: Vec<String> = items.iter().map(render_list_item).collect();
                out.insert(path.to_string(), format!("[{}]", rendered.join(", ")));
            } else {
                for (idx, item) in items.iter().enumerate() {
                    flatten_live(item, &format!("{}.{}", path, idx), out);
                }
            }
        }
        serde_json::Value::String(s) => {
            if !s.is_empty() {
                out.insert(path.to_string(), s.clone());
            }
        }
        serde_json::Value::Bool(b) => {
            out.insert(path.to_string(), b.to_string());
        }
        serde_json::Value::Number(n) => {
            out.insert(path.to_string(), n.to_string());
        }
    }
}

fn render_list_item(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => format!("\"{}\"", s),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rules() -> CompareRules {
        CompareRules::builtin(vec![])
    }

    #[test]
    fn test_classify() {
        let r = rules();
        assert_eq!(classify("id", &r), FieldClass::Skip);
        assert_eq!(classify("config.password", &r), FieldClass::Secret);
        assert_eq!(classify("webhook_secret", &r), FieldClass::Secret);
        assert_eq!(classify("rules", &r), FieldClass::Structured);
        assert_eq!(classify("name", &r), FieldClass::Plain);
    }

    #[test]
    fn test_caller_ignore_list() {
        let r = CompareRules::builtin(vec!["config.host".to_string()]);
        assert_eq!(classify("config.host", &r), FieldClass::Skip);
    }

    #[test]
    fn test_parse_blocks_nested() {
        let text = r#"# Generated
resource "moor_connection" "warehouse" {
  name = "Warehouse"
  paused = false
  config = {
    host = "db.internal"
    password = var.warehouse_config_password
    port = 5432
  }
  scopes = ["read", "write"]
}
"#;
        let blocks = parse_blocks(text);
        assert_eq!(blocks.len(), 1);
        let block = &blocks[0];
        assert_eq!(block.address(), "moor_connection.warehouse");
        assert_eq!(block.attrs["name"].text, "Warehouse");
        assert!(block.attrs["name"].quoted);
        assert_eq!(block.attrs["config.port"].text, "5432");
        assert!(!block.attrs["config.password"].quoted);
        assert_eq!(block.attrs["config.password"].text, "var.warehouse_config_password");
        assert_eq!(block.attrs["scopes"].text, "[\"read\", \"write\"]");
    }

    #[test]
    fn test_compare_clean() {
        let live = json!({
            "id": "conn_1",
            "name": "Warehouse",
            "paused": false,
            "config": {"host": "db.internal", "password": "hunter2", "port": 5432}
        });
        let declared = parse_blocks(
            r#"resource "moor_connection" "warehouse" {
  name = "Warehouse"
  paused = false
  config = {
    host = "db.internal"
    password = var.warehouse_config_password
    port = 5432
  }
}
"#,
        );
        let mismatches = compare_fields(&live, &declared[0].attrs, &rules());
        assert!(mismatches.is_empty(), "{:?}", mismatches);
    }

    #[test]
    fn test_secret_literal_is_a_failure() {
        let live = json!({"config": {"password": "hunter2"}});
        let declared = parse_blocks(
            "resource \"moor_connection\" \"w\" {\n  config = {\n    password = \"hunter2\"\n  }\n}\n",
        );
        let mismatches = compare_fields(&live, &declared[0].attrs, &rules());
        assert_eq!(mismatches.len(), 1);
        assert!(mismatches[0].detail.contains("literal"));
    }

    #[test]
    fn test_structured_compares_parsed() {
        let live = json!({"rules": "{\"allow\": [\"a\",\"b\"]}"});
        // Different spacing, same structure.
        let declared = parse_blocks(
            "resource \"moor_policy\" \"p\" {\n  rules = \"{\\\"allow\\\": [\\\"a\\\", \\\"b\\\"]}\"\n}\n",
        );
        let mismatches = compare_fields(&live, &declared[0].attrs, &rules());
        assert!(mismatches.is_empty(), "{:?}", mismatches);
    }

    #[test]
    fn test_plain_mismatch_is_hard_failure() {
        let live = json!({"name": "Warehouse"});
        let declared =
            parse_blocks("resource \"moor_connection\" \"w\" {\n  name = \"Other\"\n}\n");
        let mismatches = compare_fields(&live, &declared[0].attrs, &rules());
        assert_eq!(mismatches.len(), 1);
    }

    #[test]
    fn test_tampered_bool_and_number_are_caught() {
        let live = json!({"paused": false, "config": {"port": 5432}});
        let declared = parse_blocks(
            "resource \"moor_connection\" \"w\" {\n  paused = true\n  config = {\n    port = 9999\n  }\n}\n",
        );
        let mismatches = compare_fields(&live, &declared[0].attrs, &rules());
        assert_eq!(mismatches.len(), 2, "{:?}", mismatches);
    }

    #[test]
    fn test_tampered_inline_list_is_caught() {
        let live = json!({"scopes": ["read", "write"]});
        let declared =
            parse_blocks("resource \"moor_role\" \"ops\" {\n  scopes = [\"read\"]\n}\n");
        let mismatches = compare_fields(&live, &declared[0].attrs, &rules());
        assert_eq!(mismatches.len(), 1);
    }

    #[test]
    fn test_is_reference_expr_shapes() {
        assert!(is_reference_expr("var.warehouse_config_password"));
        assert!(is_reference_expr("moor_connection.warehouse.id"));
        assert!(!is_reference_expr("true"));
        assert!(!is_reference_expr("9999"));
        assert!(!is_reference_expr("[\"read\", \"write\"]"));
        assert!(!is_reference_expr("1.5"));
    }

    #[test]
    fn test_reference_expression_accepted_for_plain_field() {
        let live = json!({"connection_id": "conn_wh"});
        let declared = parse_blocks(
            "resource \"moor_sync\" \"n\" {\n  connection_id = moor_connection.warehouse.id\n}\n",
        );
        let mismatches = compare_fields(&live, &declared[0].attrs, &rules());
        assert!(mismatches.is_empty(), "{:?}", mismatches);
    }
}
