//! Role export.

use crate::core::record::ObjectKind;
use crate::export::kinds::KindSpec;

pub(super) fn spec() -> KindSpec {
    KindSpec {
        kind: ObjectKind::Role,
        endpoint: "/v1/roles",
        singleton: false,
        name_attr: "name",
        discriminator_attr: None,
        normalize: |_| {},
    }
}
