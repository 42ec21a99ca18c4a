//! Connection export.

use crate::core::record::ObjectKind;
use crate::export::kinds::KindSpec;

pub(super) fn spec() -> KindSpec {
    KindSpec {
        kind: ObjectKind::Connection,
        endpoint: "/v1/connections",
        singleton: false,
        name_attr: "name",
        // Connections of different services may share a name; the
        // service disambiguates before the numeric fallback kicks in.
        discriminator_attr: Some("service"),
        normalize,
    }
}

/// Runtime state reported by the platform but not part of the declared
/// configuration.
fn normalize(object: &mut serde_json::Map<String, serde_json::Value>) {
    object.remove("status");
    object.remove("setup_state");
    object.remove("last_sync_at");
}
