//! The declarative-backend boundary.
//!
//! The verifier never talks to the engine binary directly; it goes
//! through this narrow trait so the state machine can be tested against
//! a fake backend without spawning subprocesses.

use std::path::{Path, PathBuf};
use std::time::Duration;

use miette::Diagnostic;
use thiserror::Error;

use crate::util::cancel::CancelToken;
use crate::util::process::{find_executable, ProcessBuilder};

/// Result of the engine's plan step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanOutcome {
    /// Tracked state and declared configuration agree.
    Clean,
    /// A non-empty diff, with the engine's diff text.
    Drifted(String),
}

/// The engine invocation failed to start, overran its deadline, or
/// exited with a code that does not mean "diff present".
#[derive(Debug, Error, Diagnostic)]
pub enum SubprocessError {
    #[error("declarative engine not found: {0}")]
    #[diagnostic(
        code(moor::verify::engine_missing),
        help("Install the declarative engine or pass its path with --engine")
    )]
    EngineNotFound(String),

    #[error("failed to run `{command}`: {detail}")]
    #[diagnostic(code(moor::verify::invocation))]
    Invocation { command: String, detail: String },

    #[error("`{command}` exited with code {code:?}\n{stderr}")]
    #[diagnostic(code(moor::verify::exit))]
    Exit {
        command: String,
        code: Option<i32>,
        stderr: String,
    },
}

/// Engine operations the verifier needs, in the order it needs them.
pub trait DeclarativeBackend {
    /// Initialize a fresh workspace against the generated artifacts.
    fn init(&self, dir: &Path) -> Result<(), SubprocessError>;

    /// Adopt one live object under its declarative address.
    fn adopt(&self, dir: &Path, address: &str, external_id: &str) -> Result<(), SubprocessError>;

    /// Compute the diff between tracked state and declared configuration.
    fn plan(&self, dir: &Path) -> Result<PlanOutcome, SubprocessError>;
}

/// Exit code the engine uses for "plan succeeded, diff present".
const PLAN_DIFF_EXIT: i32 = 2;

/// Subprocess-backed engine. Every invocation runs under a deadline and
/// observes the run's cancel token.
pub struct EngineBackend {
    program: PathBuf,
    timeout: Duration,
    cancel: CancelToken,
}

impl EngineBackend {
    pub fn new(program: PathBuf, timeout: Duration, cancel: CancelToken) -> Self {
        EngineBackend {
            program,
            timeout,
            cancel,
        }
    }

    /// Locate the engine binary. An explicit path must exist; there is
    /// no silent fallback from a bad path to whatever is on PATH.
    pub fn discover(explicit: Option<PathBuf>, name: &str) -> Result<PathBuf, SubprocessError> {
        match explicit {
            Some(path) if path.exists() => Ok(path),
            Some(path) => Err(SubprocessError::EngineNotFound(format!(
                "no engine binary at {}",
                path.display()
            ))),
            None => find_executable(name).ok_or_else(|| {
                SubprocessError::EngineNotFound(format!("`{}` is not on PATH", name))
            }),
        }
    }

    fn run(&self, dir: &Path, args: &[&str]) -> Result<std::process::Output, SubprocessError> {
        let builder = ProcessBuilder::new(&self.program)
            .args(args)
            .cwd(dir)
            .env("TF_IN_AUTOMATION", "1");
        let command = builder.display_command();
        builder
            .exec_with_deadline(self.timeout, &self.cancel)
            .map_err(|e| SubprocessError::Invocation {
                command,
                detail: format!("{:#}", e),
            })
    }

    fn run_and_check(&self, dir: &Path, args: &[&str]) -> Result<(), SubprocessError> {
        let output = self.run(dir, args)?;
        if output.status.success() {
            Ok(())
        } else {
            Err(SubprocessError::Exit {
                command: format!("{} {}", self.program.display(), args.join(" ")),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            })
        }
    }
}

impl DeclarativeBackend for EngineBackend {
    fn init(&self, dir: &Path) -> Result<(), SubprocessError> {
        self.run_and_check(dir, &["init", "-input=false", "-no-color"])
    }

    fn adopt(&self, dir: &Path, address: &str, external_id: &str) -> Result<(), SubprocessError> {
        self.run_and_check(dir, &["import", "-input=false", "-no-color", address, external_id])
    }

    fn plan(&self, dir: &Path) -> Result<PlanOutcome, SubprocessError> {
        let args = ["plan", "-detailed-exitcode", "-input=false", "-no-color"];
        let output = self.run(dir, &args)?;
        match output.status.code() {
            Some(0) => Ok(PlanOutcome::Clean),
            Some(code) if code == PLAN_DIFF_EXIT => Ok(PlanOutcome::Drifted(
                String::from_utf8_lossy(&output.stdout).into_owned(),
            )),
            code => Err(SubprocessError::Exit {
                command: format!("{} {}", self.program.display(), args.join(" ")),
                code,
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discover_prefers_explicit_path() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let found = EngineBackend::discover(Some(tmp.path().to_path_buf()), "definitely-missing")
            .unwrap();
        assert_eq!(found, tmp.path());
    }

    #[test]
    fn test_discover_missing_engine_errors() {
        let result = EngineBackend::discover(None, "moor-test-no-such-engine");
        assert!(matches!(result, Err(SubprocessError::EngineNotFound(_))));
    }

    #[test]
    fn test_discover_rejects_missing_explicit_path() {
        // A bad explicit path is an error, even with a usable engine on
        // PATH under the default name.
        let result = EngineBackend::discover(Some(PathBuf::from("/no/such/engine")), "sh");
        match result {
            Err(SubprocessError::EngineNotFound(detail)) => {
                assert!(detail.contains("/no/such/engine"))
            }
            other => panic!("expected engine-not-found, got {:?}", other),
        }
    }
}
