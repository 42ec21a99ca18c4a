//! `moor verify` command

use std::time::Duration;

use anyhow::Result;

use moor::export::manifest::DEFAULT_ENGINE;
use moor::util::diagnostic::{emit, suggestions, Diagnostic};
use moor::verify::{render_report, verify, EngineBackend, VerifyOptions, VerifyOutcome};
use moor::CancelToken;

use crate::cli::VerifyArgs;
use crate::commands::platform_api;

pub fn execute(args: VerifyArgs, verbose: bool, color: bool) -> Result<()> {
    let api = platform_api(&args.credentials)?;
    let cancel = CancelToken::new();

    let program = match EngineBackend::discover(args.engine.clone(), DEFAULT_ENGINE) {
        Ok(program) => program,
        Err(e) => {
            emit(
                &Diagnostic::error(e.to_string())
                    .with_context(format!("default engine is `{}`", DEFAULT_ENGINE))
                    .with_suggestion(suggestions::ENGINE_NOT_FOUND),
                color,
            );
            std::process::exit(1);
        }
    };
    let backend = EngineBackend::new(
        program,
        Duration::from_secs(args.timeout_secs),
        cancel.clone(),
    );

    let options = VerifyOptions {
        artifact_dir: args.artifact_dir,
        keep: args.keep,
        ignore: args.ignore,
    };

    let report = verify(&options, &backend, &api, &cancel)?;
    print!("{}", render_report(&report));

    if verbose {
        eprintln!("total: {:.1?}", report.total_duration);
    }

    if matches!(report.outcome, VerifyOutcome::Drifted(_)) {
        emit(
            &Diagnostic::warning("declared configuration no longer matches live state")
                .with_suggestion(suggestions::DRIFT_DETECTED),
            color,
        );
    }

    if !report.passed() {
        std::process::exit(1);
    }
    Ok(())
}
