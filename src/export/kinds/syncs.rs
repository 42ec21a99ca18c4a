//! Sync definition export.

use crate::core::record::ObjectKind;
use crate::export::kinds::KindSpec;

pub(super) fn spec() -> KindSpec {
    KindSpec {
        kind: ObjectKind::Sync,
        endpoint: "/v1/syncs",
        singleton: false,
        name_attr: "name",
        discriminator_attr: None,
        normalize,
    }
}

fn normalize(object: &mut serde_json::Map<String, serde_json::Value>) {
    object.remove("last_run_at");
    object.remove("last_run_status");
}
