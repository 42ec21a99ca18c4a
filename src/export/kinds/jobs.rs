//! Bulk job export.

use crate::core::record::ObjectKind;
use crate::export::kinds::KindSpec;

pub(super) fn spec() -> KindSpec {
    KindSpec {
        kind: ObjectKind::Job,
        endpoint: "/v1/jobs",
        singleton: false,
        name_attr: "name",
        discriminator_attr: None,
        normalize,
    }
}

fn normalize(object: &mut serde_json::Map<String, serde_json::Value>) {
    object.remove("last_run_at");
    object.remove("progress");
}
