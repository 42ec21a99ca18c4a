//! The recursive attribute schema catalog.
//!
//! Every object kind has a schema tree describing its valid attributes:
//! which are computed by the platform, which carry secrets, which are
//! foreign keys to other exported kinds, and which sub-objects must stay
//! present with placeholder values once any sibling is set. The catalog
//! is built once at startup and injected wherever it is needed; there is
//! no module-level mutable state.

use std::collections::{BTreeMap, BTreeSet};

use crate::core::record::ObjectKind;

/// Shape of a schema node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaKind {
    Scalar,
    Object,
    ListOfObject,
}

/// Recursive description of one attribute.
#[derive(Debug, Clone)]
pub struct SchemaNode {
    pub kind: SchemaKind,
    pub children: BTreeMap<String, SchemaNode>,
    /// Assigned by the platform; exempt from mapping validation and
    /// skipped during round-trip comparison.
    pub computed: bool,
    /// Literal values must never appear in emitted configuration.
    pub sensitive: bool,
    /// Declared foreign key to another exported kind. Only attributes
    /// carrying this flag participate in reference rewriting.
    pub relation: Option<ObjectKind>,
    /// Emit all scalar children with empty-string placeholders once the
    /// sub-object is present at all, instead of omitting unset fields.
    pub always_present: bool,
}

impl SchemaNode {
    pub fn scalar() -> Self {
        SchemaNode {
            kind: SchemaKind::Scalar,
            children: BTreeMap::new(),
            computed: false,
            sensitive: false,
            relation: None,
            always_present: false,
        }
    }

    pub fn object(children: Vec<(&str, SchemaNode)>) -> Self {
        SchemaNode {
            kind: SchemaKind::Object,
            children: children
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
            computed: false,
            sensitive: false,
            relation: None,
            always_present: false,
        }
    }

    pub fn list_of(children: Vec<(&str, SchemaNode)>) -> Self {
        let mut node = SchemaNode::object(children);
        node.kind = SchemaKind::ListOfObject;
        node
    }

    pub fn computed(mut self) -> Self {
        self.computed = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn relation(mut self, kind: ObjectKind) -> Self {
        self.relation = Some(kind);
        self
    }

    pub fn always_present(mut self) -> Self {
        self.always_present = true;
        self
    }

    pub fn is_object_like(&self) -> bool {
        matches!(self.kind, SchemaKind::Object | SchemaKind::ListOfObject)
    }

    pub fn child(&self, name: &str) -> Option<&SchemaNode> {
        self.children.get(name)
    }
}

/// Attribute names declared as relation fields anywhere in the catalog,
/// each with the kinds it may reference. Consulted by the
/// serialized-text rewriter so that only declared foreign keys are
/// rewritten, never coincidental value matches, and only against ids of
/// the declared target kind.
#[derive(Debug, Clone, Default)]
pub struct RelationAttrs(BTreeMap<String, BTreeSet<ObjectKind>>);

impl RelationAttrs {
    pub fn contains(&self, attr: &str) -> bool {
        self.0.contains_key(attr)
    }

    /// The kinds an attribute may reference, if it is a relation field.
    pub fn targets(&self, attr: &str) -> Option<&BTreeSet<ObjectKind>> {
        self.0.get(attr)
    }
}

/// Per-kind schema trees, constructed at startup.
#[derive(Debug, Clone)]
pub struct SchemaCatalog {
    kinds: BTreeMap<ObjectKind, SchemaNode>,
}

impl SchemaCatalog {
    /// The built-in catalog for the current platform API version.
    pub fn builtin() -> Self {
        let mut kinds = BTreeMap::new();
        kinds.insert(ObjectKind::Connection, connection_schema());
        kinds.insert(ObjectKind::Sync, sync_schema());
        kinds.insert(ObjectKind::Job, job_schema());
        kinds.insert(ObjectKind::Role, role_schema());
        kinds.insert(ObjectKind::Policy, policy_schema());
        kinds.insert(ObjectKind::Alerting, alerting_schema());
        SchemaCatalog { kinds }
    }

    pub fn schema(&self, kind: ObjectKind) -> &SchemaNode {
        self.kinds
            .get(&kind)
            .expect("catalog covers every object kind")
    }

    /// Collect every attribute name declared as a relation field, with
    /// its target kinds.
    pub fn relation_attrs(&self) -> RelationAttrs {
        let mut out = BTreeMap::new();
        for schema in self.kinds.values() {
            collect_relations(schema, &mut out);
        }
        RelationAttrs(out)
    }
}

fn collect_relations(node: &SchemaNode, out: &mut BTreeMap<String, BTreeSet<ObjectKind>>) {
    for (name, child) in &node.children {
        if let Some(kind) = child.relation {
            out.entry(name.clone()).or_default().insert(kind);
        }
        collect_relations(child, out);
    }
}

fn common_computed() -> Vec<(&'static str, SchemaNode)> {
    vec![
        ("id", SchemaNode::scalar().computed()),
        ("created_at", SchemaNode::scalar().computed()),
        ("updated_at", SchemaNode::scalar().computed()),
        ("version", SchemaNode::scalar().computed()),
        ("org_id", SchemaNode::scalar().computed()),
    ]
}

fn connection_schema() -> SchemaNode {
    let mut children = common_computed();
    children.extend(vec![
        ("name", SchemaNode::scalar()),
        ("service", SchemaNode::scalar()),
        ("paused", SchemaNode::scalar()),
        ("sync_frequency", SchemaNode::scalar()),
        ("connected_by", SchemaNode::scalar().computed()),
        (
            "config",
            SchemaNode::object(vec![
                ("host", SchemaNode::scalar()),
                ("port", SchemaNode::scalar()),
                ("database", SchemaNode::scalar()),
                ("user", SchemaNode::scalar()),
                ("password", SchemaNode::scalar().sensitive()),
                ("api_key", SchemaNode::scalar().sensitive()),
                ("private_key", SchemaNode::scalar().sensitive()),
                ("auth_type", SchemaNode::scalar()),
                ("tunnel_host", SchemaNode::scalar()),
                ("tunnel_user", SchemaNode::scalar()),
            ]),
        ),
    ]);
    SchemaNode::object(children)
}

fn sync_schema() -> SchemaNode {
    let mut children = common_computed();
    children.extend(vec![
        ("name", SchemaNode::scalar()),
        (
            "connection_id",
            SchemaNode::scalar().relation(ObjectKind::Connection),
        ),
        ("paused", SchemaNode::scalar()),
        (
            "source",
            SchemaNode::object(vec![
                (
                    "connection_id",
                    SchemaNode::scalar().relation(ObjectKind::Connection),
                ),
                ("table", SchemaNode::scalar()),
            ]),
        ),
        (
            "schedule",
            SchemaNode::object(vec![
                ("cron", SchemaNode::scalar()),
                ("timezone", SchemaNode::scalar()),
                ("start_time", SchemaNode::scalar()),
                ("end_time", SchemaNode::scalar()),
            ])
            .always_present(),
        ),
    ]);
    SchemaNode::object(children)
}

fn job_schema() -> SchemaNode {
    let mut children = common_computed();
    children.extend(vec![
        ("name", SchemaNode::scalar()),
        ("sync_id", SchemaNode::scalar().relation(ObjectKind::Sync)),
        ("priority", SchemaNode::scalar()),
        ("batch_size", SchemaNode::scalar()),
        (
            "schedule",
            SchemaNode::object(vec![
                ("cron", SchemaNode::scalar()),
                ("timezone", SchemaNode::scalar()),
            ])
            .always_present(),
        ),
    ]);
    SchemaNode::object(children)
}

fn role_schema() -> SchemaNode {
    let mut children = common_computed();
    children.extend(vec![
        ("name", SchemaNode::scalar()),
        ("description", SchemaNode::scalar()),
        ("scopes", SchemaNode::scalar()),
    ]);
    SchemaNode::object(children)
}

fn policy_schema() -> SchemaNode {
    let mut children = common_computed();
    children.extend(vec![
        ("name", SchemaNode::scalar()),
        ("description", SchemaNode::scalar()),
        ("role_id", SchemaNode::scalar().relation(ObjectKind::Role)),
        // Serialized rule document; compared structurally, not textually.
        ("rules", SchemaNode::scalar()),
    ]);
    SchemaNode::object(children)
}

fn alerting_schema() -> SchemaNode {
    SchemaNode::object(vec![
        ("email_recipients", SchemaNode::scalar()),
        ("notify_on_failure", SchemaNode::scalar()),
        ("notify_on_warning", SchemaNode::scalar()),
        ("webhook_url", SchemaNode::scalar()),
        ("webhook_secret", SchemaNode::scalar().sensitive()),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_covers_all_kinds() {
        let catalog = SchemaCatalog::builtin();
        for kind in ObjectKind::ALL {
            let _ = catalog.schema(kind);
        }
    }

    #[test]
    fn test_relation_attrs_collected_recursively() {
        let catalog = SchemaCatalog::builtin();
        let relations = catalog.relation_attrs();
        assert!(relations.contains("connection_id"));
        assert!(relations.contains("sync_id"));
        assert!(relations.contains("role_id"));
        assert!(!relations.contains("name"));
    }

    #[test]
    fn test_relation_attrs_carry_target_kinds() {
        let relations = SchemaCatalog::builtin().relation_attrs();
        assert!(relations
            .targets("sync_id")
            .unwrap()
            .contains(&ObjectKind::Sync));
        assert!(!relations
            .targets("sync_id")
            .unwrap()
            .contains(&ObjectKind::Connection));
        assert!(relations
            .targets("connection_id")
            .unwrap()
            .contains(&ObjectKind::Connection));
    }

    #[test]
    fn test_sensitive_flags_present() {
        let catalog = SchemaCatalog::builtin();
        let config = catalog
            .schema(ObjectKind::Connection)
            .child("config")
            .unwrap();
        assert!(config.child("password").unwrap().sensitive);
        assert!(!config.child("host").unwrap().sensitive);
    }
}
