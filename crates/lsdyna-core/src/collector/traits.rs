//! Abstraction over `lstc_qrun` execution to enable testing and mocking.
//!
//! The `QueryRunner` trait lets the collectors run the real executable in
//! production and a scripted [`MockRunner`](super::MockRunner) in tests.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

/// Failure of a single `lstc_qrun` invocation.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// The deadline elapsed before the process finished.
    #[error("timeout after {0:?} executing lstc_qrun")]
    Timeout(Duration),
    /// The process could not be started.
    #[error("failed to execute {path}: {source}")]
    Spawn {
        path: String,
        #[source]
        source: io::Error,
    },
    /// The process finished with a non-zero (or no) exit code.
    #[error("lstc_qrun exited with {}", exit_description(.0))]
    Exit(Option<i32>),
    /// The tool printed an ERROR line.
    #[error("lstc_qrun error: {0}")]
    Reported(String),
}

fn exit_description(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "no status (terminated by signal)".to_string(),
    }
}

impl QueryError {
    /// Returns `true` for deadline expiry, as opposed to any other failure.
    pub fn is_timeout(&self) -> bool {
        matches!(self, QueryError::Timeout(_))
    }
}

/// Captured result of a finished `lstc_qrun` process.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOutput {
    /// Standard output, decoded lossily as UTF-8.
    pub stdout: String,
    /// Standard error, only used for diagnostics.
    pub stderr: String,
    /// Exit code, `None` when the process was terminated by a signal.
    pub code: Option<i32>,
}

impl QueryOutput {
    /// Output of a process that exited with status 0.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            code: Some(0),
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs `lstc_qrun` with the given arguments under a deadline.
///
/// Implementations must return [`QueryError::Timeout`] when `timeout`
/// elapses and must not interpret the exit code; the collectors decide
/// whether a non-zero status is an error.
pub trait QueryRunner: Send + Sync {
    fn run(
        &self,
        args: &[String],
        timeout: Duration,
    ) -> impl Future<Output = Result<QueryOutput, QueryError>> + Send;
}

/// Runner that spawns the real `lstc_qrun` executable.
#[derive(Debug, Clone)]
pub struct LstcQrun {
    path: PathBuf,
}

impl LstcQrun {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl QueryRunner for LstcQrun {
    async fn run(&self, args: &[String], timeout: Duration) -> Result<QueryOutput, QueryError> {
        debug!(path = %self.path.display(), ?args, "executing lstc_qrun");

        let mut cmd = Command::new(&self.path);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Dropping the output future on timeout kills the child.
            .kill_on_drop(true);

        let output = tokio::time::timeout(timeout, cmd.output())
            .await
            .map_err(|_| QueryError::Timeout(timeout))?
            .map_err(|source| QueryError::Spawn {
                path: self.path.display().to_string(),
                source,
            })?;

        Ok(QueryOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            code: output.status.code(),
        })
    }
}
