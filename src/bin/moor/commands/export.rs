//! `moor export` command

use anyhow::Result;

use moor::export::{run_export, ExportOptions};
use moor::util::diagnostic::Diagnostic;
use moor::{CancelToken, SchemaCatalog};

use crate::cli::ExportArgs;
use crate::commands::platform_api;

pub fn execute(args: ExportArgs, color: bool) -> Result<()> {
    let api = platform_api(&args.credentials)?;
    let catalog = SchemaCatalog::builtin();
    let cancel = CancelToken::new();

    let options = ExportOptions {
        out_dir: args.out_dir,
        force: args.force,
        org: args.org,
        include_permissions: args.include_permissions,
    };

    let report = run_export(&options, &api, &catalog, &cancel)?;

    for warning in &report.warnings {
        moor::util::diagnostic::emit(&Diagnostic::warning(warning.to_string()), color);
    }

    println!(
        "exported {} objects ({} cross-references) into {} files",
        report.record_count,
        report.reference_count,
        report.files.len()
    );
    Ok(())
}
