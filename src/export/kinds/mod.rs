//! The per-kind exporter registry.
//!
//! Each object kind contributes one [`KindSpec`] describing where its
//! objects live on the API and how raw payloads are normalized. A single
//! generic [`ResourceExporter`] interprets the spec, so the set of kinds
//! is closed and dispatch happens through one registry table built at
//! startup.

mod alerting;
mod connections;
mod jobs;
mod policies;
mod roles;
mod syncs;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::api::PlatformApi;
use crate::core::names::NameRegistry;
use crate::core::record::{ObjectKind, ResourceRecord};
use crate::core::schema::SchemaCatalog;
use crate::core::value::{convert, ConfigValue, ConversionWarning};
use crate::export::emit::{render_kind_file, VariableSet};
use crate::export::manifest::ImportManifestEntry;
use crate::util::cancel::CancelToken;

/// Static description of one object kind's API surface.
pub struct KindSpec {
    pub kind: ObjectKind,
    pub endpoint: &'static str,
    /// Singleton settings objects are fetched with `get`, carry no
    /// external identity, and never enter the import manifest.
    pub singleton: bool,
    /// Attribute carrying the human-readable name.
    pub name_attr: &'static str,
    /// Sub-type attribute appended on identifier collision.
    pub discriminator_attr: Option<&'static str>,
    /// Kind-specific payload cleanup applied to every raw object.
    pub normalize: fn(&mut serde_json::Map<String, serde_json::Value>),
}

/// The spec for one kind, outside a registry. The verifier uses this to
/// find the detail endpoint behind a declarative address.
pub fn spec_for(kind: ObjectKind) -> KindSpec {
    match kind {
        ObjectKind::Connection => connections::spec(),
        ObjectKind::Sync => syncs::spec(),
        ObjectKind::Job => jobs::spec(),
        ObjectKind::Role => roles::spec(),
        ObjectKind::Policy => policies::spec(),
        ObjectKind::Alerting => alerting::spec(),
    }
}

/// Build the exporter registry for one run.
pub fn registry(include_permissions: bool) -> Vec<ResourceExporter> {
    let mut specs = vec![connections::spec(), syncs::spec(), jobs::spec()];
    if include_permissions {
        specs.push(roles::spec());
        specs.push(policies::spec());
    }
    specs.push(alerting::spec());
    specs.into_iter().map(ResourceExporter::new).collect()
}

/// Generic exporter for one object kind: fetch, name, emit, and import
/// entries, in that order.
pub struct ResourceExporter {
    pub spec: KindSpec,
    raw: Vec<serde_json::Map<String, serde_json::Value>>,
    pub records: Vec<ResourceRecord>,
    pub warnings: Vec<ConversionWarning>,
}

impl ResourceExporter {
    pub fn new(spec: KindSpec) -> Self {
        ResourceExporter {
            spec,
            raw: Vec::new(),
            records: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn kind(&self) -> ObjectKind {
        self.spec.kind
    }

    /// Populate the raw object set for this kind. Any failure here is
    /// fatal for the whole run.
    pub fn fetch(
        &mut self,
        api: &dyn PlatformApi,
        org: Option<&str>,
        cancel: &CancelToken,
    ) -> Result<()> {
        cancel.check()?;
        let items = if self.spec.singleton {
            vec![api.get(self.spec.endpoint)?]
        } else {
            api.list(self.spec.endpoint, org, cancel)?
        };

        for item in items {
            let mut object = match item {
                serde_json::Value::Object(map) => map,
                other => {
                    warn!(kind = %self.spec.kind, "skipping non-object payload: {}", other);
                    continue;
                }
            };
            // Safety net behind the server-side filter.
            if let Some(org) = org {
                if object.get("org_id").and_then(|v| v.as_str()).is_some_and(|o| o != org) {
                    continue;
                }
            }
            (self.spec.normalize)(&mut object);
            self.raw.push(object);
        }
        debug!(kind = %self.spec.kind, count = self.raw.len(), "fetched");
        Ok(())
    }

    /// Assign identifiers and convert attributes. Raw objects are
    /// processed in a deterministic order so identifiers are stable
    /// across runs over unchanged input.
    pub fn resolve_names(&mut self, registry: &mut NameRegistry) -> Result<()> {
        self.raw.sort_by(|a, b| {
            let key = |o: &serde_json::Map<String, serde_json::Value>| {
                (
                    string_attr(o, self.spec.name_attr),
                    string_attr(o, "id"),
                )
            };
            key(a).cmp(&key(b))
        });

        for object in &self.raw {
            let external_id = string_attr(object, "id");
            let display_name = {
                let name = string_attr(object, self.spec.name_attr);
                if name.is_empty() {
                    self.spec.kind.to_string()
                } else {
                    name
                }
            };
            let discriminator = self
                .spec
                .discriminator_attr
                .map(|attr| string_attr(object, attr))
                .filter(|d| !d.is_empty());

            let identifier = registry
                .assign(self.spec.kind, &display_name, discriminator.as_deref())
                .with_context(|| format!("naming {} `{}`", self.spec.kind, display_name))?;

            let (converted, mut warnings) =
                convert(&serde_json::Value::Object(object.clone()));
            for w in &mut warnings {
                w.path = format!("{}.{}.{}", self.spec.kind, identifier, w.path);
            }
            self.warnings.append(&mut warnings);

            let attributes = match converted {
                Some(ConfigValue::Object(map)) => map,
                _ => Default::default(),
            };

            self.records.push(ResourceRecord {
                kind: self.spec.kind,
                external_id,
                display_name,
                identifier,
                attributes,
            });
        }

        // Emission iterates in identifier order.
        self.records.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        Ok(())
    }

    /// Serialize this kind's file. Cross-reference rewriting happens on
    /// the returned text, not here.
    pub fn emit(&self, catalog: &SchemaCatalog, vars: &mut VariableSet) -> String {
        render_kind_file(
            self.spec.kind,
            &self.records,
            catalog.schema(self.spec.kind),
            vars,
        )
    }

    /// One manifest entry per record with an external identity, in the
    /// same order as the emitted blocks.
    pub fn import_entries(&self) -> Vec<ImportManifestEntry> {
        self.records
            .iter()
            .filter(|r| !r.external_id.is_empty())
            .map(|r| ImportManifestEntry {
                address: r.address(),
                external_id: r.external_id.clone(),
                comment: r.display_name.clone(),
            })
            .collect()
    }
}

fn string_attr(object: &serde_json::Map<String, serde_json::Value>, attr: &str) -> String {
    object
        .get(attr)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}
