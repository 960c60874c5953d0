//! Running programs collector.
//!
//! Runs `lstc_qrun -s <target> -p` and reports CPUs held per user and
//! program. Usage is point-in-time, so there is no cache fallback.

pub mod parser;

use std::collections::BTreeMap;
use std::sync::LazyLock;
use std::time::{Duration, Instant};

use regex::Regex;
use tracing::{debug, error};

use crate::collector::CollectionOutcome;
use crate::collector::traits::{QueryError, QueryRunner};

pub use parser::parse_programs;

/// Collector name used in status metrics.
pub const COLLECTOR_NAME: &str = "program";

/// `lstc_qrun` reports failures on stdout, e.g. `*** ERROR failed to connect`.
static ERROR_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r".*ERROR (.*)").expect("error line regex is valid"));

/// CPUs used by one user for one program.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramUsageRecord {
    pub user: String,
    pub program: String,
    pub used: f64,
}

/// Sums `used` per (program, user), ordered by program then user.
pub fn sum_by_user(records: Vec<ProgramUsageRecord>) -> Vec<ProgramUsageRecord> {
    let mut totals: BTreeMap<(String, String), f64> = BTreeMap::new();
    for record in records {
        *totals.entry((record.program, record.user)).or_default() += record.used;
    }
    totals
        .into_iter()
        .map(|((program, user), used)| ProgramUsageRecord {
            user,
            program,
            used,
        })
        .collect()
}

/// Collects per-user program usage for a single target.
pub struct ProgramCollector<'a, R: QueryRunner> {
    target: &'a str,
    runner: &'a R,
    timeout: Duration,
}

impl<'a, R: QueryRunner> ProgramCollector<'a, R> {
    pub fn new(target: &'a str, runner: &'a R, timeout: Duration) -> Self {
        Self {
            target,
            runner,
            timeout,
        }
    }

    /// Arguments passed to `lstc_qrun` for the running programs report.
    pub fn args(&self) -> Vec<String> {
        vec!["-s".to_string(), self.target.to_string(), "-p".to_string()]
    }

    /// Runs one collection cycle. Never fails; see the outcome flags.
    pub async fn collect(&self) -> CollectionOutcome<ProgramUsageRecord> {
        debug!(host = self.target, "collecting programs metrics");
        let started = Instant::now();

        let mut outcome = CollectionOutcome::new(COLLECTOR_NAME);
        match self.query().await {
            Ok(records) => outcome.records = sum_by_user(records),
            Err(err) => {
                if err.is_timeout() {
                    error!(host = self.target, "timeout executing lstc_qrun");
                } else {
                    error!(host = self.target, error = %err, "program collection failed");
                }
                outcome.flag(&err);
            }
        }
        outcome.duration = started.elapsed();
        outcome
    }

    async fn query(&self) -> Result<Vec<ProgramUsageRecord>, QueryError> {
        // Exit status is ignored: the tool exits non-zero when nothing runs.
        let output = self.runner.run(&self.args(), self.timeout).await?;
        if let Some(caps) = ERROR_LINE.captures(&output.stdout) {
            debug!(host = self.target, stderr = output.stderr.trim(), "lstc_qrun stderr");
            return Err(QueryError::Reported(caps[1].trim().to_string()));
        }
        Ok(parse_programs(&output.stdout))
    }
}
