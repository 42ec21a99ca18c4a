//! Object kinds and exported resource records.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::core::value::ConfigValue;

/// The closed set of exportable object kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ObjectKind {
    Connection,
    Sync,
    Job,
    Role,
    Policy,
    Alerting,
}

impl ObjectKind {
    /// All kinds, in the fixed order used for naming, emission and the
    /// import manifest. Keeping this order stable keeps output stable.
    pub const ALL: [ObjectKind; 6] = [
        ObjectKind::Connection,
        ObjectKind::Sync,
        ObjectKind::Job,
        ObjectKind::Role,
        ObjectKind::Policy,
        ObjectKind::Alerting,
    ];

    /// Declarative resource type name used in emitted blocks.
    pub fn resource_type(self) -> &'static str {
        match self {
            ObjectKind::Connection => "moor_connection",
            ObjectKind::Sync => "moor_sync",
            ObjectKind::Job => "moor_job",
            ObjectKind::Role => "moor_role",
            ObjectKind::Policy => "moor_policy",
            ObjectKind::Alerting => "moor_alerting",
        }
    }

    /// Output file for this kind's resource blocks.
    pub fn file_name(self) -> &'static str {
        match self {
            ObjectKind::Connection => "connections.tf",
            ObjectKind::Sync => "syncs.tf",
            ObjectKind::Job => "jobs.tf",
            ObjectKind::Role => "roles.tf",
            ObjectKind::Policy => "policies.tf",
            ObjectKind::Alerting => "alerting.tf",
        }
    }

    /// Whether this kind exposes an addressable `id` attribute that other
    /// resources can reference symbolically. Alerting is a singleton
    /// settings object with no identity of its own.
    pub fn addressable(self) -> bool {
        !matches!(self, ObjectKind::Alerting)
    }

    /// Role and policy exports are gated behind `--include-permissions`.
    pub fn is_permission_kind(self) -> bool {
        matches!(self, ObjectKind::Role | ObjectKind::Policy)
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ObjectKind::Connection => "connection",
            ObjectKind::Sync => "sync",
            ObjectKind::Job => "job",
            ObjectKind::Role => "role",
            ObjectKind::Policy => "policy",
            ObjectKind::Alerting => "alerting",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for ObjectKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "connection" => Ok(ObjectKind::Connection),
            "sync" => Ok(ObjectKind::Sync),
            "job" => Ok(ObjectKind::Job),
            "role" => Ok(ObjectKind::Role),
            "policy" => Ok(ObjectKind::Policy),
            "alerting" => Ok(ObjectKind::Alerting),
            other => Err(format!(
                "unknown object kind `{}` (expected one of: connection, sync, job, role, policy, alerting)",
                other
            )),
        }
    }
}

/// One exported live object and its converted attributes.
///
/// Records are re-created fresh on every run; nothing about them is
/// persisted across runs.
#[derive(Debug, Clone)]
pub struct ResourceRecord {
    pub kind: ObjectKind,
    /// The platform-side identifier. Empty for singleton kinds.
    pub external_id: String,
    /// Human-readable name, carried into the import manifest comment.
    pub display_name: String,
    /// Identifier assigned once by the name registry; stable for the run.
    pub identifier: String,
    pub attributes: BTreeMap<String, ConfigValue>,
}

impl ResourceRecord {
    /// The declarative address of this record, e.g.
    /// `moor_connection.warehouse_prod`.
    pub fn address(&self) -> String {
        format!("{}.{}", self.kind.resource_type(), self.identifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trips_through_display() {
        for kind in ObjectKind::ALL {
            let parsed: ObjectKind = kind.to_string().parse().unwrap();
            assert_eq!(parsed, kind);
        }
    }

    #[test]
    fn test_address_shape() {
        let record = ResourceRecord {
            kind: ObjectKind::Connection,
            external_id: "conn_1".into(),
            display_name: "Warehouse".into(),
            identifier: "warehouse".into(),
            attributes: BTreeMap::new(),
        };
        assert_eq!(record.address(), "moor_connection.warehouse");
    }
}
