//! Round-trip verification.
//!
//! One verification run walks a strict sequence over an exported
//! artifact set: initialize a fresh engine workspace, adopt every live
//! object named by the import manifest, plan, and assert the diff is
//! empty. A clean plan is then double-checked with field-level
//! comparison against the live objects. Transitions never run
//! concurrently and none may be skipped.

pub mod backend;
pub mod compare;

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::api::PlatformApi;
use crate::core::record::ObjectKind;
use crate::export::kinds::spec_for;
use crate::export::manifest::parse_manifest;
use crate::export::MANIFEST_FILE;
use crate::util::cancel::CancelToken;
use crate::util::fs::copy_dir_all;
use crate::verify::backend::{DeclarativeBackend, PlanOutcome};
use crate::verify::compare::{compare_fields, parse_blocks, CompareRules, DeclaredBlock};

pub use backend::{EngineBackend, SubprocessError};

#[derive(Debug, Clone)]
pub struct VerifyOptions {
    /// Directory holding a previously exported artifact set.
    pub artifact_dir: PathBuf,
    /// Keep the scratch workspace for debugging.
    pub keep: bool,
    /// Dotted attribute paths excluded from field comparison.
    pub ignore: Vec<String>,
}

/// Terminal state of one verification run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// Adoption and plan agree, field comparison passed.
    Clean,
    /// The plan reported a non-empty diff; carries the diff text.
    Drifted(String),
    /// A step failed outright.
    Failed(String),
}

/// One timed step of the run.
#[derive(Debug, Clone)]
pub struct VerifyStep {
    pub name: &'static str,
    pub passed: bool,
    pub detail: String,
    pub duration: Duration,
}

impl VerifyStep {
    fn pass(name: &'static str, detail: impl Into<String>, duration: Duration) -> Self {
        VerifyStep {
            name,
            passed: true,
            detail: detail.into(),
            duration,
        }
    }

    fn fail(name: &'static str, detail: impl Into<String>, duration: Duration) -> Self {
        VerifyStep {
            name,
            passed: false,
            detail: detail.into(),
            duration,
        }
    }
}

#[derive(Debug)]
pub struct VerifyReport {
    pub steps: Vec<VerifyStep>,
    pub outcome: VerifyOutcome,
    pub total_duration: Duration,
}

impl VerifyReport {
    pub fn passed(&self) -> bool {
        self.outcome == VerifyOutcome::Clean
    }
}

/// Render a report for terminal output.
pub fn render_report(report: &VerifyReport) -> String {
    let mut out = String::new();
    for step in &report.steps {
        let mark = if step.passed { "ok" } else { "FAIL" };
        out.push_str(&format!(
            "  [{:>4}] {:<10} {} ({:.1?})\n",
            mark, step.name, step.detail, step.duration
        ));
    }
    match &report.outcome {
        VerifyOutcome::Clean => out.push_str("\nround trip clean: no drift detected\n"),
        VerifyOutcome::Drifted(diff) => {
            out.push_str("\ndrift detected:\n");
            out.push_str(diff);
            out.push('\n');
        }
        VerifyOutcome::Failed(detail) => {
            out.push_str("\nverification failed: ");
            out.push_str(detail);
            out.push('\n');
        }
    }
    out
}

struct Run {
    steps: Vec<VerifyStep>,
    start: Instant,
}

impl Run {
    fn finish(self, outcome: VerifyOutcome) -> VerifyReport {
        VerifyReport {
            steps: self.steps,
            outcome,
            total_duration: self.start.elapsed(),
        }
    }
}

/// Run the full verification sequence. Errors are reserved for setup
/// problems (missing artifacts, filesystem failures); everything the
/// engine or comparison finds is reported through the outcome.
pub fn verify(
    options: &VerifyOptions,
    backend: &dyn DeclarativeBackend,
    api: &dyn PlatformApi,
    cancel: &CancelToken,
) -> Result<VerifyReport> {
    let mut run = Run {
        steps: Vec::new(),
        start: Instant::now(),
    };

    // Workspace: copy the artifacts somewhere the engine can scribble.
    let step_start = Instant::now();
    let manifest_path = options.artifact_dir.join(MANIFEST_FILE);
    let manifest_text = std::fs::read_to_string(&manifest_path)
        .with_context(|| format!("no import manifest at {}", manifest_path.display()))?;
    let entries = parse_manifest(&manifest_text);

    let scratch = tempfile::Builder::new()
        .prefix("moor-verify-")
        .tempdir()
        .context("failed to create scratch workspace")?;
    copy_dir_all(&options.artifact_dir, scratch.path())?;
    let workdir = scratch.path().to_path_buf();
    run.steps.push(VerifyStep::pass(
        "Workspace",
        format!("{} adoption entries, workspace {}", entries.len(), workdir.display()),
        step_start.elapsed(),
    ));

    let report = run_steps(&mut run, backend, api, options, &workdir, &entries, cancel);

    if options.keep {
        let kept = scratch.keep();
        info!(path = %kept.display(), "kept verification workspace");
    }

    report
}

fn run_steps(
    run: &mut Run,
    backend: &dyn DeclarativeBackend,
    api: &dyn PlatformApi,
    options: &VerifyOptions,
    workdir: &Path,
    entries: &[crate::export::manifest::ImportManifestEntry],
    cancel: &CancelToken,
) -> Result<VerifyReport> {
    // Init.
    let step_start = Instant::now();
    cancel.check()?;
    if let Err(e) = backend.init(workdir) {
        run.steps
            .push(VerifyStep::fail("Init", e.to_string(), step_start.elapsed()));
        return Ok(take(run).finish(VerifyOutcome::Failed(e.to_string())));
    }
    run.steps.push(VerifyStep::pass(
        "Init",
        "workspace initialized",
        step_start.elapsed(),
    ));

    // Adopt: any single failure is fatal, no partial-adoption retry.
    let step_start = Instant::now();
    for entry in entries {
        cancel.check()?;
        if let Err(e) = backend.adopt(workdir, &entry.address, &entry.external_id) {
            let detail = format!("adopting {}: {}", entry.address, e);
            run.steps
                .push(VerifyStep::fail("Adopt", detail.clone(), step_start.elapsed()));
            return Ok(take(run).finish(VerifyOutcome::Failed(detail)));
        }
        debug!(address = %entry.address, "adopted");
    }
    run.steps.push(VerifyStep::pass(
        "Adopt",
        format!("{} objects adopted", entries.len()),
        step_start.elapsed(),
    ));

    // Plan.
    let step_start = Instant::now();
    cancel.check()?;
    let plan = match backend.plan(workdir) {
        Ok(outcome) => outcome,
        Err(e) => {
            run.steps
                .push(VerifyStep::fail("Plan", e.to_string(), step_start.elapsed()));
            return Ok(take(run).finish(VerifyOutcome::Failed(e.to_string())));
        }
    };
    match plan {
        PlanOutcome::Drifted(diff) => {
            run.steps
                .push(VerifyStep::fail("Plan", "diff present", step_start.elapsed()));
            return Ok(take(run).finish(VerifyOutcome::Drifted(diff)));
        }
        PlanOutcome::Clean => {
            run.steps
                .push(VerifyStep::pass("Plan", "no diff", step_start.elapsed()));
        }
    }

    // Compare: an assertion layer on top of diff-emptiness, not a
    // substitute for it.
    let step_start = Instant::now();
    let blocks = load_blocks(workdir)?;
    let rules = CompareRules::builtin(options.ignore.clone());
    let mut mismatch_details = Vec::new();
    for entry in entries {
        cancel.check()?;
        let Some(block) = blocks.iter().find(|b| b.address() == entry.address) else {
            mismatch_details.push(format!("{}: no declared block", entry.address));
            continue;
        };
        let Some(kind) = kind_of_address(&entry.address) else {
            mismatch_details.push(format!("{}: unknown resource type", entry.address));
            continue;
        };
        let live = api.get(&format!(
            "{}/{}",
            spec_for(kind).endpoint,
            entry.external_id
        ))?;
        for m in compare_fields(&live, &block.attrs, &rules) {
            mismatch_details.push(format!("{}.{}: {}", entry.address, m.path, m.detail));
        }
    }

    if mismatch_details.is_empty() {
        run.steps.push(VerifyStep::pass(
            "Compare",
            format!("{} objects compared", entries.len()),
            step_start.elapsed(),
        ));
        Ok(take(run).finish(VerifyOutcome::Clean))
    } else {
        let detail = mismatch_details.join("; ");
        run.steps
            .push(VerifyStep::fail("Compare", detail.clone(), step_start.elapsed()));
        Ok(take(run).finish(VerifyOutcome::Failed(detail)))
    }
}

fn take(run: &mut Run) -> Run {
    Run {
        steps: std::mem::take(&mut run.steps),
        start: run.start,
    }
}

fn load_blocks(workdir: &Path) -> Result<Vec<DeclaredBlock>> {
    let mut blocks = Vec::new();
    for kind in ObjectKind::ALL {
        let path = workdir.join(kind.file_name());
        if path.exists() {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            blocks.extend(parse_blocks(&text));
        }
    }
    Ok(blocks)
}

fn kind_of_address(address: &str) -> Option<ObjectKind> {
    let resource_type = address.split('.').next()?;
    ObjectKind::ALL
        .into_iter()
        .find(|k| k.resource_type() == resource_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::FetchError;
    use crate::core::schema::SchemaCatalog;
    use crate::export::{run_export, ExportOptions};
    use crate::verify::backend::SubprocessError;
    use serde_json::json;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use tempfile::TempDir;

    struct FakeApi {
        lists: HashMap<String, Vec<serde_json::Value>>,
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
            // Detail paths look like /v1/connections/<id>.
            if let Some((collection, id)) = path.rsplit_once('/') {
                if let Some(items) = self.lists.get(collection) {
                    if let Some(found) = items
                        .iter()
                        .find(|i| i.get("id").and_then(|v| v.as_str()) == Some(id))
                    {
                        return Ok(found.clone());
                    }
                }
            }
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
            "/v1/connections".to_string(),
            vec![json!({
                "id": "conn_wh",
                "name": "Warehouse",
                "service": "postgres",
                "paused": false,
                "config": {"host": "db.internal", "password": "hunter2"}
            })],
        );
        lists.insert(
            "/v1/syncs".to_string(),
            vec![json!({
                "id": "sync_n",
                "name": "Nightly",
                "connection_id": "conn_wh"
            })],
        );
        lists.insert("/v1/alerting".to_string(), vec![json!({"notify_on_failure": true})]);
        FakeApi { lists }
    }

    /// Records calls and returns canned outcomes; no subprocesses.
    struct FakeBackend {
        plan_outcome: PlanOutcome,
        fail_adopt: bool,
        adopted: RefCell<Vec<String>>,
    }

    impl FakeBackend {
        fn clean() -> Self {
            FakeBackend {
                plan_outcome: PlanOutcome::Clean,
                fail_adopt: false,
                adopted: RefCell::new(Vec::new()),
            }
        }
    }

    impl DeclarativeBackend for FakeBackend {
        fn init(&self, _dir: &Path) -> Result<(), SubprocessError> {
            Ok(())
        }

        fn adopt(
            &self,
            _dir: &Path,
            address: &str,
            _external_id: &str,
        ) -> Result<(), SubprocessError> {
            if self.fail_adopt {
                return Err(SubprocessError::Exit {
                    command: "engine import".into(),
                    code: Some(1),
                    stderr: "resource not found".into(),
                });
            }
            self.adopted.borrow_mut().push(address.to_string());
            Ok(())
        }

        fn plan(&self, _dir: &Path) -> Result<PlanOutcome, SubprocessError> {
            Ok(self.plan_outcome.clone())
        }
    }

    fn export_fixture(api: &FakeApi) -> TempDir {
        let tmp = TempDir::new().unwrap();
        let options = ExportOptions {
            out_dir: tmp.path().to_path_buf(),
            force: false,
            org: None,
            include_permissions: false,
        };
        run_export(&options, api, &SchemaCatalog::builtin(), &CancelToken::new()).unwrap();
        tmp
    }

    fn verify_options(dir: &TempDir) -> VerifyOptions {
        VerifyOptions {
            artifact_dir: dir.path().to_path_buf(),
            keep: false,
            ignore: vec![],
        }
    }

    #[test]
    fn test_clean_round_trip() {
        let api = fake_api();
        let artifacts = export_fixture(&api);
        let backend = FakeBackend::clean();

        let report = verify(
            &verify_options(&artifacts),
            &backend,
            &api,
            &CancelToken::new(),
        )
        .unwrap();
        assert!(report.passed(), "{:?}", report);
        // Every manifest entry was adopted, in order.
        let adopted = backend.adopted.borrow();
        assert_eq!(
            *adopted,
            vec!["moor_connection.warehouse", "moor_sync.nightly"]
        );
    }

    #[test]
    fn test_drift_is_reported_not_crashed() {
        let api = fake_api();
        let artifacts = export_fixture(&api);
        let backend = FakeBackend {
            plan_outcome: PlanOutcome::Drifted("~ paused: false -> true".into()),
            fail_adopt: false,
            adopted: RefCell::new(Vec::new()),
        };

        let report = verify(
            &verify_options(&artifacts),
            &backend,
            &api,
            &CancelToken::new(),
        )
        .unwrap();
        match report.outcome {
            VerifyOutcome::Drifted(ref diff) => assert!(diff.contains("paused")),
            ref other => panic!("expected drift, got {:?}", other),
        }
    }

    #[test]
    fn test_adoption_failure_is_fatal() {
        let api = fake_api();
        let artifacts = export_fixture(&api);
        let backend = FakeBackend {
            plan_outcome: PlanOutcome::Clean,
            fail_adopt: true,
            adopted: RefCell::new(Vec::new()),
        };

        let report = verify(
            &verify_options(&artifacts),
            &backend,
            &api,
            &CancelToken::new(),
        )
        .unwrap();
        assert!(matches!(report.outcome, VerifyOutcome::Failed(_)));
        // Plan never ran.
        assert!(report.steps.iter().all(|s| s.name != "Plan"));
    }

    #[test]
    fn test_comparison_catches_tampered_artifacts() {
        let api = fake_api();
        let artifacts = export_fixture(&api);

        // Tamper with a declared value after export; the fake backend
        // still reports a clean plan, so only comparison can catch it.
        let path = artifacts.path().join("connections.tf");
        let text = std::fs::read_to_string(&path).unwrap();
        std::fs::write(&path, text.replace("\"Warehouse\"", "\"Tampered\"")).unwrap();

        let report = verify(
            &verify_options(&artifacts),
            &FakeBackend::clean(),
            &api,
            &CancelToken::new(),
        )
        .unwrap();
        match report.outcome {
            VerifyOutcome::Failed(ref detail) => assert!(detail.contains("name")),
            ref other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_comparison_catches_tampered_bool() {
        let api = fake_api();
        let artifacts = export_fixture(&api);

        // Unquoted literals are compared textually, not treated as
        // reference expressions.
        let path = artifacts.path().join("connections.tf");
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("paused = false"));
        std::fs::write(&path, text.replace("paused = false", "paused = true")).unwrap();

        let report = verify(
            &verify_options(&artifacts),
            &FakeBackend::clean(),
            &api,
            &CancelToken::new(),
        )
        .unwrap();
        match report.outcome {
            VerifyOutcome::Failed(ref detail) => assert!(detail.contains("paused")),
            ref other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_manifest_is_a_setup_error() {
        let tmp = TempDir::new().unwrap();
        let api = fake_api();
        let result = verify(
            &verify_options(&tmp),
            &FakeBackend::clean(),
            &api,
            &CancelToken::new(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_render_report_mentions_outcome() {
        let report = VerifyReport {
            steps: vec![VerifyStep::pass("Init", "ok", Duration::ZERO)],
            outcome: VerifyOutcome::Clean,
            total_duration: Duration::ZERO,
        };
        let text = render_report(&report);
        assert!(text.contains("no drift detected"));
    }
}
