//! Scripted `lstc_qrun` runner and report fixtures for tests.
//!
//! `MockRunner` answers every query with the currently configured
//! [`MockResponse`] and records the arguments it was called with, so the
//! collectors can be exercised without the real license tool.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

use crate::collector::traits::{QueryError, QueryOutput, QueryRunner};

/// `lstc_qrun -r -s <target>` output with two features expiring 07/31/2020.
pub const FEATURE_STDOUT: &str = "
Using user specified server 31011@haswell2

LICENSE INFORMATION

PROGRAM          EXPIRATION CPUS  USED   FREE    MAX | QUEUE
---------------- ----------      ----- ------ ------ | -----
LS-DYNA          07/31/2020          0   2000   2000 |     0
MPPDYNA          07/31/2020          0   2000   2000 |     0
                   LICENSE GROUP     0   2000   2000 |     0

";

/// `lstc_qrun -s <target> -p` output with two running MPPDYNA programs.
pub const PROGRAM_STDOUT: &str = "
Using user specified server 31011@haswell2


                     Running Programs

    User             Host          Program              Started       # procs
-----------------------------------------------------------------------------
     hna    84212@o0284.ten.osc.ed MPPDYNA          Tue Mar 17 16:18    28
sciappst    85606@o0579.ten.osc.ed MPPDYNA          Tue Mar 17 16:22    10
No programs queued

";

/// Reference "now" matching the fixtures: 07/01/2020 00:00:00 UTC.
pub fn reference_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2020, 7, 1, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

/// What the mock returns for the next query.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Process finished with the given output.
    Output(QueryOutput),
    /// Deadline elapsed.
    Timeout,
    /// Any other failure, reported with this message.
    Error(String),
}

/// In-memory runner for testing collectors.
#[derive(Debug)]
pub struct MockRunner {
    response: Mutex<MockResponse>,
    calls: Mutex<Vec<Vec<String>>>,
}

impl MockRunner {
    pub fn new(response: MockResponse) -> Self {
        Self {
            response: Mutex::new(response),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Runner whose process exits 0 with `stdout`.
    pub fn with_stdout(stdout: &str) -> Self {
        Self::new(MockResponse::Output(QueryOutput::ok(stdout)))
    }

    /// Replaces the response for subsequent queries.
    pub fn respond(&self, response: MockResponse) {
        *lock(&self.response) = response;
    }

    /// Arguments of every query so far, oldest first.
    pub fn calls(&self) -> Vec<Vec<String>> {
        lock(&self.calls).clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl QueryRunner for MockRunner {
    async fn run(&self, args: &[String], timeout: Duration) -> Result<QueryOutput, QueryError> {
        lock(&self.calls).push(args.to_vec());
        let response = lock(&self.response).clone();
        match response {
            MockResponse::Output(output) => Ok(output),
            MockResponse::Timeout => Err(QueryError::Timeout(timeout)),
            MockResponse::Error(msg) => Err(QueryError::Reported(msg)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_records_calls() {
        let runner = MockRunner::with_stdout("foo");
        let out = runner
            .run(&["-s".to_string(), "host".to_string()], Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(out.stdout, "foo");
        assert!(out.success());
        assert_eq!(runner.calls(), vec![vec!["-s", "host"]]);
    }

    #[tokio::test]
    async fn test_mock_switch_response() {
        let runner = MockRunner::with_stdout("foo");
        runner.respond(MockResponse::Timeout);
        let err = runner.run(&[], Duration::from_secs(5)).await.unwrap_err();
        assert!(err.is_timeout());

        runner.respond(MockResponse::Error("Error".into()));
        let err = runner.run(&[], Duration::from_secs(5)).await.unwrap_err();
        assert!(!err.is_timeout());
        assert_eq!(runner.calls().len(), 2);
    }

    #[test]
    fn test_reference_time() {
        assert_eq!(reference_time().to_rfc3339(), "2020-07-01T00:00:00+00:00");
    }
}
