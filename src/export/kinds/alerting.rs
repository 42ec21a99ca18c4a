//! Global alerting settings export.
//!
//! A singleton settings object: no external identity, no import
//! manifest entry, one resource block.

use crate::core::record::ObjectKind;
use crate::export::kinds::KindSpec;

pub(super) fn spec() -> KindSpec {
    KindSpec {
        kind: ObjectKind::Alerting,
        endpoint: "/v1/alerting",
        singleton: true,
        name_attr: "name",
        discriminator_attr: None,
        normalize: |object| {
            // Singletons carry no identity worth importing.
            object.remove("id");
        },
    }
}
