//! Policy export.

use crate::core::record::ObjectKind;
use crate::export::kinds::KindSpec;

pub(super) fn spec() -> KindSpec {
    KindSpec {
        kind: ObjectKind::Policy,
        endpoint: "/v1/policies",
        singleton: false,
        name_attr: "name",
        discriminator_attr: None,
        normalize,
    }
}

/// The rule document arrives as structured JSON but is declared as a
/// serialized string attribute; round-trip comparison is structural, so
/// the exact serialization only has to be deterministic.
fn normalize(object: &mut serde_json::Map<String, serde_json::Value>) {
    if let Some(rules) = object.get("rules") {
        if !rules.is_string() {
            let serialized = serde_json::to_string(rules).unwrap_or_default();
            object.insert("rules".to_string(), serde_json::Value::String(serialized));
        }
    }
}
