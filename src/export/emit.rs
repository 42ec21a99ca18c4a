//! Deterministic configuration emission.
//!
//! One file per object kind, one resource block per record, attributes
//! in lexicographic order. Two deliberate asymmetries with plain value
//! conversion: schema nodes marked `always_present` keep their unset
//! scalar fields as empty-string placeholders (the downstream schema
//! expects the whole sub-object once any sibling is set), and sensitive
//! attributes are emitted as variable references, never literals.

use std::collections::BTreeMap;
use std::fmt::Write;

use crate::core::record::{ObjectKind, ResourceRecord};
use crate::core::schema::{SchemaKind, SchemaNode};
use crate::core::value::{ConfigValue, Number};

const GENERATED_HEADER: &str = "# Generated by moor export. Do not edit by hand.\n";

/// Variable declared for the deployment URL in every artifact set.
pub const DEPLOYMENT_URL_VAR: &str = "deployment_url";

#[derive(Debug, Clone)]
struct VariableDecl {
    description: String,
    sensitive: bool,
}

/// Accumulates the variable declarations that end up in `variables.tf`:
/// one per secret-valued field that could not be emitted as a literal,
/// plus the deployment URL.
#[derive(Debug)]
pub struct VariableSet {
    vars: BTreeMap<String, VariableDecl>,
}

impl VariableSet {
    pub fn new() -> Self {
        let mut vars = BTreeMap::new();
        vars.insert(
            DEPLOYMENT_URL_VAR.to_string(),
            VariableDecl {
                description: "Deployment URL of the platform".to_string(),
                sensitive: false,
            },
        );
        VariableSet { vars }
    }

    fn declare_secret(&mut self, name: String, description: String) {
        self.vars.insert(
            name,
            VariableDecl {
                description,
                sensitive: true,
            },
        );
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.vars.keys().map(|k| k.as_str())
    }

    /// Render the `variables.tf` content.
    pub fn render(&self) -> String {
        let mut out = String::from(GENERATED_HEADER);
        for (name, decl) in &self.vars {
            out.push('\n');
            let _ = writeln!(out, "variable \"{}\" {{", name);
            let _ = writeln!(out, "  type        = string");
            let _ = writeln!(out, "  description = {}", quote(&decl.description));
            if decl.sensitive {
                let _ = writeln!(out, "  sensitive   = true");
            }
            out.push_str("}\n");
        }
        out
    }
}

impl Default for VariableSet {
    fn default() -> Self {
        VariableSet::new()
    }
}

/// Render the fixed provider/bootstrap file.
pub fn render_provider() -> String {
    let mut out = String::from(GENERATED_HEADER);
    out.push_str(
        "\nterraform {\n  required_providers {\n    moor = {\n      source = \"moor-dev/moor\"\n    }\n  }\n}\n\nprovider \"moor\" {\n  deployment_url = var.deployment_url\n}\n",
    );
    out
}

/// Render one kind's file. Records must already be sorted by identifier;
/// repeated runs over unchanged input produce byte-identical output.
pub fn render_kind_file(
    kind: ObjectKind,
    records: &[ResourceRecord],
    schema: &SchemaNode,
    vars: &mut VariableSet,
) -> String {
    let mut out = String::from(GENERATED_HEADER);
    for record in records {
        debug_assert_eq!(record.kind, kind);
        out.push('\n');
        render_block(&mut out, record, schema, vars);
    }
    out
}

fn render_block(out: &mut String, record: &ResourceRecord, schema: &SchemaNode, vars: &mut VariableSet) {
    let _ = writeln!(
        out,
        "resource \"{}\" \"{}\" {{",
        record.kind.resource_type(),
        record.identifier
    );
    render_attrs(out, &record.attributes, Some(schema), 1, "", record, vars);
    out.push_str("}\n");
}

fn render_attrs(
    out: &mut String,
    attrs: &BTreeMap<String, ConfigValue>,
    schema: Option<&SchemaNode>,
    depth: usize,
    path: &str,
    record: &ResourceRecord,
    vars: &mut VariableSet,
) {
    let pad = "  ".repeat(depth);
    for (key, value) in attrs {
        let node = schema.and_then(|s| s.child(key));
        // Server-assigned attributes have no place in declared config.
        if node.is_some_and(|n| n.computed) {
            continue;
        }
        if value.is_empty() {
            continue;
        }
        let child_path = crate::core::value::join_path(path, key);

        if node.is_some_and(|n| n.sensitive) {
            let var_name = secret_var_name(&record.identifier, &child_path);
            vars.declare_secret(
                var_name.clone(),
                format!("Secret value of {}.{}", record.address(), child_path),
            );
            let _ = writeln!(out, "{}{} = var.{}", pad, key, var_name);
            continue;
        }

        match value {
            ConfigValue::Object(map) => {
                let _ = writeln!(out, "{}{} = {{", pad, key);
                if node.is_some_and(|n| n.always_present) {
                    render_placeholder_object(out, map, node.unwrap(), depth + 1);
                } else {
                    render_attrs(out, map, node, depth + 1, &child_path, record, vars);
                }
                let _ = writeln!(out, "{}}}", pad);
            }
            ConfigValue::List(items) if items.iter().any(|i| i.as_object().is_some()) => {
                let _ = writeln!(out, "{}{} = [", pad, key);
                for item in items {
                    match item.as_object() {
                        Some(map) => {
                            let _ = writeln!(out, "{}  {{", pad);
                            render_attrs(out, map, node, depth + 2, &child_path, record, vars);
                            let _ = writeln!(out, "{}  }},", pad);
                        }
                        None => {
                            let _ = writeln!(out, "{}  {},", pad, render_scalar(item));
                        }
                    }
                }
                let _ = writeln!(out, "{}]", pad);
            }
            ConfigValue::List(items) => {
                let rendered: Vec<String> = items.iter().map(render_scalar).collect();
                let _ = writeln!(out, "{}{} = [{}]", pad, key, rendered.join(", "));
            }
            scalar => {
                let _ = writeln!(out, "{}{} = {}", pad, key, render_scalar(scalar));
            }
        }
    }
}

/// Emit every scalar child the schema declares, with empty-string
/// placeholders for the fields the record leaves unset.
fn render_placeholder_object(
    out: &mut String,
    map: &BTreeMap<String, ConfigValue>,
    node: &SchemaNode,
    depth: usize,
) {
    let pad = "  ".repeat(depth);
    for (key, child) in &node.children {
        if child.kind != SchemaKind::Scalar || child.computed {
            continue;
        }
        let rendered = match map.get(key) {
            Some(value) if !value.is_empty() => render_scalar(value),
            _ => quote(""),
        };
        let _ = writeln!(out, "{}{} = {}", pad, key, rendered);
    }
}

fn render_scalar(value: &ConfigValue) -> String {
    match value {
        ConfigValue::String(s) => quote(s),
        ConfigValue::Number(Number::Int(i)) => i.to_string(),
        ConfigValue::Number(Number::Float(f)) => f.to_string(),
        ConfigValue::Bool(b) => b.to_string(),
        ConfigValue::Null => "null".to_string(),
        // Containers are handled by the callers; a container reaching
        // here is rendered as its debug-safe empty form.
        ConfigValue::List(_) | ConfigValue::Object(_) => quote(""),
    }
}

fn secret_var_name(identifier: &str, path: &str) -> String {
    format!("{}_{}", identifier, path.replace('.', "_"))
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
