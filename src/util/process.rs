//! Subprocess execution utilities.
//!
//! The round-trip verifier shells out to an external declarative engine
//! whose `plan` step can hang on interactive credential prompts, so every
//! invocation runs under a deadline and observes the run's cancel token.
//! A process that outlives either is killed, not leaked.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};

use crate::util::cancel::CancelToken;

/// How often the deadline loop polls the child.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Builder for subprocess execution.
#[derive(Debug, Clone)]
pub struct ProcessBuilder {
    program: PathBuf,
    args: Vec<String>,
    env: HashMap<String, String>,
    cwd: Option<PathBuf>,
}

impl ProcessBuilder {
    /// Create a new process builder for the given program.
    pub fn new(program: impl AsRef<Path>) -> Self {
        ProcessBuilder {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            env: HashMap::new(),
            cwd: None,
        }
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_string_lossy().into_owned());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args.extend(
            args.into_iter()
                .map(|s| s.as_ref().to_string_lossy().into_owned()),
        );
        self
    }

    /// Set an environment variable.
    pub fn env(mut self, key: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.env
            .insert(key.as_ref().to_string(), value.as_ref().to_string());
        self
    }

    /// Set the working directory.
    pub fn cwd(mut self, cwd: impl AsRef<Path>) -> Self {
        self.cwd = Some(cwd.as_ref().to_path_buf());
        self
    }

    fn build_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        if let Some(ref cwd) = self.cwd {
            cmd.current_dir(cwd);
        }
        cmd
    }

    /// Execute under a deadline, killing the child if the deadline passes
    /// or the token is cancelled.
    ///
    /// stdout/stderr are drained on separate threads so a chatty child
    /// cannot deadlock on a full pipe while we poll.
    pub fn exec_with_deadline(&self, timeout: Duration, cancel: &CancelToken) -> Result<Output> {
        cancel.check()?;

        let mut cmd = self.build_command();
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .with_context(|| format!("failed to spawn `{}`", self.program.display()))?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let out_handle = std::thread::spawn(move || drain(stdout));
        let err_handle = std::thread::spawn(move || drain(stderr));

        let deadline = Instant::now() + timeout;
        let status = loop {
            if let Some(status) = child
                .try_wait()
                .with_context(|| format!("failed to wait for `{}`", self.program.display()))?
            {
                break status;
            }
            if cancel.is_cancelled() || Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                let reason = if cancel.is_cancelled() {
                    "cancelled"
                } else {
                    "timed out"
                };
                bail!(
                    "`{}` {} after {:?}",
                    self.display_command(),
                    reason,
                    timeout
                );
            }
            std::thread::sleep(POLL_INTERVAL);
        };

        let stdout = out_handle.join().unwrap_or_default();
        let stderr = err_handle.join().unwrap_or_default();

        Ok(Output {
            status,
            stdout,
            stderr,
        })
    }

    /// Display the command for error messages.
    pub fn display_command(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

fn drain(stream: Option<impl Read>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut stream) = stream {
        let _ = stream.read_to_end(&mut buf);
    }
    buf
}

/// Find an executable in PATH.
pub fn find_executable(name: &str) -> Option<PathBuf> {
    which::which(name).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_command() {
        let pb = ProcessBuilder::new("engine").args(["plan", "-no-color"]);
        assert_eq!(pb.display_command(), "engine plan -no-color");
    }

    #[test]
    fn test_deadline_kills_hung_process() {
        let pb = ProcessBuilder::new("sleep").arg("30");
        let start = Instant::now();
        let result = pb.exec_with_deadline(Duration::from_millis(200), &CancelToken::new());
        assert!(result.is_err());
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_cancelled_token_refuses_to_spawn() {
        let token = CancelToken::new();
        token.cancel();
        let result =
            ProcessBuilder::new("echo").exec_with_deadline(Duration::from_secs(1), &token);
        assert!(result.is_err());
    }

    #[test]
    fn test_deadline_returns_output_on_success() {
        let output = ProcessBuilder::new("echo")
            .arg("ok")
            .exec_with_deadline(Duration::from_secs(5), &CancelToken::new())
            .unwrap();
        assert!(output.status.success());
        assert!(String::from_utf8_lossy(&output.stdout).contains("ok"));
    }
}
