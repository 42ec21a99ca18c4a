//! The export driver.
//!
//! Orchestrates one run: fetch every kind (fail-fast, parallel across
//! kinds), assign identifiers in a fixed order, build the cross-reference
//! graph from the union of all records, emit each kind's file with
//! reference rewriting applied to the serialized text, then write the
//! provider file, the variables file and the import manifest.

pub mod emit;
pub mod kinds;
pub mod manifest;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use tracing::info;

use crate::api::PlatformApi;
use crate::core::names::NameRegistry;
use crate::core::refs::ReferenceGraph;
use crate::core::schema::SchemaCatalog;
use crate::core::value::ConversionWarning;
use crate::export::emit::{render_provider, VariableSet};
use crate::export::manifest::{render_manifest, ImportManifestEntry, DEFAULT_ENGINE};
use crate::util::cancel::CancelToken;
use crate::util::diagnostic::suggestions;
use crate::util::fs::{dir_is_nonempty, ensure_dir, write_file};

/// Fixed artifact file names that are not per-kind.
pub const PROVIDER_FILE: &str = "provider.tf";
pub const VARIABLES_FILE: &str = "variables.tf";
pub const MANIFEST_FILE: &str = "import.sh";

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub out_dir: PathBuf,
    /// Replace existing files in the output directory.
    pub force: bool,
    /// Organization scope filter, applied server-side and re-checked
    /// client-side.
    pub org: Option<String>,
    /// Include role and policy kinds.
    pub include_permissions: bool,
}

/// What one export run produced.
#[derive(Debug)]
pub struct ExportReport {
    pub files: Vec<PathBuf>,
    pub record_count: usize,
    pub reference_count: usize,
    pub warnings: Vec<ConversionWarning>,
}

/// Run a full export. All-or-nothing: any fetch or emission failure
/// aborts the run, since cross-references depend on every kind having
/// been fetched.
pub fn run_export(
    options: &ExportOptions,
    api: &dyn PlatformApi,
    catalog: &SchemaCatalog,
    cancel: &CancelToken,
) -> Result<ExportReport> {
    if dir_is_nonempty(&options.out_dir)? && !options.force {
        bail!(
            "output directory {} is not empty\n{}",
            options.out_dir.display(),
            suggestions::OUTPUT_NOT_EMPTY
        );
    }
    ensure_dir(&options.out_dir)?;

    let mut exporters = kinds::registry(options.include_permissions);

    // Fetches are independent across kinds; nothing shared is mutated
    // until naming starts.
    let progress = ProgressBar::new(exporters.len() as u64);
    progress.set_style(
        ProgressStyle::with_template("{spinner} fetching [{bar:30}] {pos}/{len}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    exporters
        .par_iter_mut()
        .try_for_each(|exporter| -> Result<()> {
            exporter
                .fetch(api, options.org.as_deref(), cancel)
                .with_context(|| {
                    format!(
                        "fetching {} objects\n{}",
                        exporter.kind(),
                        suggestions::FETCH_FAILED
                    )
                })?;
            progress.inc(1);
            Ok(())
        })?;
    progress.finish_and_clear();

    // Identifier assignment walks kinds in their fixed order so output
    // is stable run to run.
    let mut names = NameRegistry::new();
    for exporter in &mut exporters {
        cancel.check()?;
        exporter.resolve_names(&mut names)?;
    }

    let all_records: Vec<_> = exporters
        .iter()
        .flat_map(|e| e.records.iter().cloned())
        .collect();
    let graph = ReferenceGraph::build(&all_records)?;
    let relations = catalog.relation_attrs();

    let mut vars = VariableSet::new();
    let mut files = Vec::new();
    let mut entries: Vec<ImportManifestEntry> = Vec::new();
    let mut warnings = Vec::new();

    for exporter in &exporters {
        let serialized = exporter.emit(catalog, &mut vars);
        let rewritten = graph.rewrite(&serialized, &relations);
        let path = options.out_dir.join(exporter.kind().file_name());
        write_file(&path, &rewritten)?;
        files.push(path);
        entries.extend(exporter.import_entries());
        warnings.extend(exporter.warnings.iter().cloned());
    }

    let provider_path = options.out_dir.join(PROVIDER_FILE);
    write_file(&provider_path, &render_provider())?;
    files.push(provider_path);

    let variables_path = options.out_dir.join(VARIABLES_FILE);
    write_file(&variables_path, &vars.render())?;
    files.push(variables_path);

    let manifest_path = options.out_dir.join(MANIFEST_FILE);
    write_file(&manifest_path, &render_manifest(&entries, DEFAULT_ENGINE))?;
    files.push(manifest_path);

    let record_count = all_records.len();
    info!(
        records = record_count,
        references = graph.len(),
        files = files.len(),
        "export complete"
    );

    Ok(ExportReport {
        files,
        record_count,
        reference_count: graph.len(),
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::FetchError;
    use serde_json::json;
    use std::collections::HashMap;
    use tempfile::TempDir;

    struct FakeApi {
        lists: HashMap<&'static str, Vec<serde_json::Value>>,
    }

    impl PlatformApi for FakeApi {
        fn list(
            &self,
            path: &str,
            _org: Option<&str>,
            _cancel: &CancelToken,
        ) -> Result<Vec<serde_json::Value>, FetchError> {
            Ok(self.lists.get(path).cloned().unwrap_or_default())
        }

        fn get(&self, path: &str) -> Result<serde_json::Value, FetchError> {
            Ok(self
                .lists
                .get(path)
                .and_then(|v| v.first())
                .cloned()
                .unwrap_or(json!({})))
        }
    }

    fn fake_api() -> FakeApi {
        let mut lists = HashMap::new();
        lists.insert(
            "/v1/connections",
            vec![json!({
                "id": "conn_wh",
                "name": "Warehouse",
                "service": "postgres",
                "config": {"host": "db.internal", "password": "hunter2"}
            })],
        );
        lists.insert(
            "/v1/syncs",
            vec![json!({
                "id": "sync_n",
                "name": "Nightly",
                "connection_id": "conn_wh",
                "schedule": {"cron": "0 2 * * *"}
            })],
        );
        lists.insert("/v1/alerting", vec![json!({"notify_on_failure": true})]);
        FakeApi { lists }
    }

    fn options(dir: &TempDir) -> ExportOptions {
        ExportOptions {
            out_dir: dir.path().to_path_buf(),
            force: false,
            org: None,
            include_permissions: false,
        }
    }

    #[test]
    fn test_full_export_rewrites_references() {
        let tmp = TempDir::new().unwrap();
        let report = run_export(
            &options(&tmp),
            &fake_api(),
            &SchemaCatalog::builtin(),
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(report.record_count, 3);
        assert_eq!(report.reference_count, 2);

        let syncs = std::fs::read_to_string(tmp.path().join("syncs.tf")).unwrap();
        assert!(syncs.contains("connection_id = moor_connection.warehouse.id"));
        assert!(!syncs.contains("\"conn_wh\""));
    }

    #[test]
    fn test_secret_never_emitted_as_literal() {
        let tmp = TempDir::new().unwrap();
        run_export(
            &options(&tmp),
            &fake_api(),
            &SchemaCatalog::builtin(),
            &CancelToken::new(),
        )
        .unwrap();

        for entry in std::fs::read_dir(tmp.path()).unwrap() {
            let content = std::fs::read_to_string(entry.unwrap().path()).unwrap();
            assert!(!content.contains("hunter2"), "secret leaked into artifact");
        }
        let variables = std::fs::read_to_string(tmp.path().join("variables.tf")).unwrap();
        assert!(variables.contains("variable \"warehouse_config_password\""));
    }

    #[test]
    fn test_manifest_lines() {
        let tmp = TempDir::new().unwrap();
        run_export(
            &options(&tmp),
            &fake_api(),
            &SchemaCatalog::builtin(),
            &CancelToken::new(),
        )
        .unwrap();

        let manifest = std::fs::read_to_string(tmp.path().join("import.sh")).unwrap();
        assert!(manifest.contains("terraform import moor_connection.warehouse conn_wh # Warehouse"));
        assert!(manifest.contains("terraform import moor_sync.nightly sync_n # Nightly"));
        // The alerting singleton has no identity to adopt.
        assert!(!manifest.contains("moor_alerting"));
    }

    #[test]
    fn test_runs_are_byte_identical() {
        let tmp_a = TempDir::new().unwrap();
        let tmp_b = TempDir::new().unwrap();
        let catalog = SchemaCatalog::builtin();
        run_export(&options(&tmp_a), &fake_api(), &catalog, &CancelToken::new()).unwrap();
        run_export(&options(&tmp_b), &fake_api(), &catalog, &CancelToken::new()).unwrap();

        for name in ["connections.tf", "syncs.tf", "variables.tf", "import.sh"] {
            let a = std::fs::read_to_string(tmp_a.path().join(name)).unwrap();
            let b = std::fs::read_to_string(tmp_b.path().join(name)).unwrap();
            assert_eq!(a, b, "{} differs between runs", name);
        }
    }

    #[test]
    fn test_nonempty_output_dir_requires_force() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("stale.tf"), "old").unwrap();

        let err = run_export(
            &options(&tmp),
            &fake_api(),
            &SchemaCatalog::builtin(),
            &CancelToken::new(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("not empty"));

        let mut opts = options(&tmp);
        opts.force = true;
        run_export(&opts, &fake_api(), &SchemaCatalog::builtin(), &CancelToken::new()).unwrap();
    }

    #[test]
    fn test_fetch_failure_aborts_run() {
        struct FailingApi;
        impl PlatformApi for FailingApi {
            fn list(
                &self,
                path: &str,
                _org: Option<&str>,
                _cancel: &CancelToken,
            ) -> Result<Vec<serde_json::Value>, FetchError> {
                Err(FetchError::Api {
                    path: path.to_string(),
                    status: 401,
                    message: "unauthorized".into(),
                })
            }
            fn get(&self, path: &str) -> Result<serde_json::Value, FetchError> {
                self.list(path, None, &CancelToken::new()).map(|_| json!({}))
            }
        }

        let tmp = TempDir::new().unwrap();
        let err = run_export(
            &options(&tmp),
            &FailingApi,
            &SchemaCatalog::builtin(),
            &CancelToken::new(),
        )
        .unwrap_err();
        assert!(format!("{:#}", err).contains("401"));
    }
}
