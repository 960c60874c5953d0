//! License feature collector.
//!
//! Runs `lstc_qrun -r -s <target>`, parses the license report and, when a
//! cache is attached, stores successful results so later failures can
//! still report the last known feature set.

pub mod parser;

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{debug, error};

use crate::collector::cache::ResultCache;
use crate::collector::traits::{QueryError, QueryRunner};
use crate::collector::CollectionOutcome;

pub use parser::parse_features;

/// Collector name used in status metrics.
pub const COLLECTOR_NAME: &str = "feature";

/// One licensed feature from the `lstc_qrun -r` report.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRecord {
    pub name: String,
    /// Seconds until expiration, negative once expired.
    pub expiration_seconds: f64,
    pub used: f64,
    pub free: f64,
    pub total: f64,
    pub queue: f64,
}

/// Features sharing one expiration time.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureAggregate {
    pub expiration_seconds: f64,
    /// Sum of `total` over the grouped features.
    pub total_licenses: f64,
    pub feature_count: usize,
}

/// Groups records by exact expiration time, ordered by ascending expiration.
///
/// Totals are summed in input order within each group.
pub fn aggregate_by_expiration(records: &[FeatureRecord]) -> Vec<FeatureAggregate> {
    let mut sorted: Vec<&FeatureRecord> = records.iter().collect();
    sorted.sort_by(|a, b| a.expiration_seconds.total_cmp(&b.expiration_seconds));

    let mut aggregates: Vec<FeatureAggregate> = Vec::new();
    for record in sorted {
        match aggregates.last_mut() {
            Some(last) if last.expiration_seconds == record.expiration_seconds => {
                last.total_licenses += record.total;
                last.feature_count += 1;
            }
            _ => aggregates.push(FeatureAggregate {
                expiration_seconds: record.expiration_seconds,
                total_licenses: record.total,
                feature_count: 1,
            }),
        }
    }
    aggregates
}

/// Collects license feature status for a single target.
///
/// Built per scrape; the cache is the only state shared across scrapes.
pub struct FeatureCollector<'a, R: QueryRunner> {
    target: &'a str,
    runner: &'a R,
    timeout: Duration,
    cache: Option<&'a ResultCache>,
    reference_time: Option<DateTime<Utc>>,
}

impl<'a, R: QueryRunner> FeatureCollector<'a, R> {
    pub fn new(target: &'a str, runner: &'a R, timeout: Duration) -> Self {
        Self {
            target,
            runner,
            timeout,
            cache: None,
            reference_time: None,
        }
    }

    /// Enables the last-known-good fallback. `None` disables it.
    pub fn with_cache(mut self, cache: Option<&'a ResultCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Fixes "now" for expiration computation instead of the wall clock.
    pub fn with_reference_time(mut self, reference: DateTime<Utc>) -> Self {
        self.reference_time = Some(reference);
        self
    }

    /// Arguments passed to `lstc_qrun` for the license report.
    pub fn args(&self) -> Vec<String> {
        vec!["-r".to_string(), "-s".to_string(), self.target.to_string()]
    }

    /// Runs one collection cycle. Never fails; see the outcome flags.
    pub async fn collect(&self) -> CollectionOutcome<FeatureRecord> {
        debug!(host = self.target, "collecting feature metrics");
        let started = Instant::now();
        let reference = self.reference_time.unwrap_or_else(Utc::now);

        let mut outcome = CollectionOutcome::new(COLLECTOR_NAME);
        match self.query(reference).await {
            Ok(records) => {
                if let Some(cache) = self.cache {
                    cache.write(self.target, records.clone());
                }
                outcome.records = records;
            }
            Err(err) => {
                if err.is_timeout() {
                    error!(host = self.target, "timeout executing lstc_qrun");
                } else {
                    error!(host = self.target, error = %err, "feature collection failed");
                }
                outcome.flag(&err);
                if let Some(cache) = self.cache {
                    outcome.records = cache.read(self.target);
                }
            }
        }
        outcome.duration = started.elapsed();
        outcome
    }

    async fn query(&self, reference: DateTime<Utc>) -> Result<Vec<FeatureRecord>, QueryError> {
        let output = self.runner.run(&self.args(), self.timeout).await?;
        if !output.success() {
            debug!(host = self.target, stderr = output.stderr.trim(), "lstc_qrun stderr");
            return Err(QueryError::Exit(output.code));
        }
        Ok(parse_features(&output.stdout, reference))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::{FEATURE_STDOUT, MockResponse, MockRunner, reference_time};
    use crate::collector::traits::QueryOutput;

    const TIMEOUT: Duration = Duration::from_secs(10);

    fn record(name: &str, expiration_seconds: f64, total: f64) -> FeatureRecord {
        FeatureRecord {
            name: name.to_string(),
            expiration_seconds,
            used: 0.0,
            free: total,
            total,
            queue: 0.0,
        }
    }

    async fn collect(
        runner: &MockRunner,
        cache: Option<&ResultCache>,
    ) -> CollectionOutcome<FeatureRecord> {
        FeatureCollector::new("localhost", runner, TIMEOUT)
            .with_cache(cache)
            .with_reference_time(reference_time())
            .collect()
            .await
    }

    #[test]
    fn test_aggregate_shared_expiration() {
        let records = vec![
            record("LS-DYNA", 2_592_000.0, 2000.0),
            record("MPPDYNA", 2_592_000.0, 2000.0),
        ];
        let aggregates = aggregate_by_expiration(&records);
        assert_eq!(
            aggregates,
            vec![FeatureAggregate {
                expiration_seconds: 2_592_000.0,
                total_licenses: 4000.0,
                feature_count: 2,
            }]
        );
    }

    #[test]
    fn test_aggregate_sorted_ascending() {
        let records = vec![
            record("C", 300.0, 1.0),
            record("A", -100.0, 2.0),
            record("B", 300.0, 4.0),
            record("D", 50.0, 8.0),
        ];
        let aggregates = aggregate_by_expiration(&records);
        let keys: Vec<f64> = aggregates.iter().map(|a| a.expiration_seconds).collect();
        assert_eq!(keys, vec![-100.0, 50.0, 300.0]);
        assert_eq!(aggregates[2].total_licenses, 5.0);
        assert_eq!(aggregates[2].feature_count, 2);
    }

    #[test]
    fn test_aggregate_empty() {
        assert!(aggregate_by_expiration(&[]).is_empty());
    }

    #[tokio::test]
    async fn test_collect_success() {
        let runner = MockRunner::with_stdout(FEATURE_STDOUT);
        let outcome = collect(&runner, None).await;

        assert_eq!(outcome.collector, "feature");
        assert!(!outcome.error);
        assert!(!outcome.timeout);
        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.records[0].name, "LS-DYNA");
        assert_eq!(outcome.records[1].name, "MPPDYNA");
        for r in &outcome.records {
            assert_eq!(r.expiration_seconds, 2_592_000.0);
            assert_eq!((r.used, r.free, r.total, r.queue), (0.0, 2000.0, 2000.0, 0.0));
        }
        assert_eq!(
            aggregate_by_expiration(&outcome.records),
            vec![FeatureAggregate {
                expiration_seconds: 2_592_000.0,
                total_licenses: 4000.0,
                feature_count: 2,
            }]
        );
        assert_eq!(runner.calls(), vec![vec!["-r", "-s", "localhost"]]);
    }

    #[tokio::test]
    async fn test_collect_error() {
        let runner = MockRunner::new(MockResponse::Error("Error".into()));
        let outcome = collect(&runner, None).await;
        assert!(outcome.error);
        assert!(!outcome.timeout);
        assert!(outcome.records.is_empty());
    }

    #[tokio::test]
    async fn test_collect_timeout_without_cache() {
        let runner = MockRunner::new(MockResponse::Timeout);
        let outcome = collect(&runner, None).await;
        assert!(outcome.timeout);
        assert!(!outcome.error);
        assert!(outcome.records.is_empty());
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_error() {
        let runner = MockRunner::new(MockResponse::Output(QueryOutput {
            stdout: FEATURE_STDOUT.to_string(),
            stderr: "license server unreachable\n".to_string(),
            code: Some(1),
        }));
        let outcome = collect(&runner, None).await;
        assert!(outcome.error);
        assert!(!outcome.timeout);
        assert!(outcome.records.is_empty());
    }

    #[tokio::test]
    async fn test_cache_fallback() {
        let cache = ResultCache::new();
        let runner = MockRunner::with_stdout(FEATURE_STDOUT);

        let outcome = collect(&runner, Some(&cache)).await;
        assert_eq!(outcome.records.len(), 2);
        assert_eq!(cache.read("localhost").len(), 2);

        runner.respond(MockResponse::Error("Error".into()));
        let outcome = collect(&runner, Some(&cache)).await;
        assert!(outcome.error);
        assert!(!outcome.timeout);
        assert_eq!(outcome.records, cache.read("localhost"));
        assert_eq!(outcome.records.len(), 2);

        runner.respond(MockResponse::Timeout);
        let outcome = collect(&runner, Some(&cache)).await;
        assert!(outcome.timeout);
        assert!(!outcome.error);
        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.records[0].name, "LS-DYNA");
    }

    #[tokio::test]
    async fn test_cache_is_per_target() {
        let cache = ResultCache::new();
        let runner = MockRunner::with_stdout(FEATURE_STDOUT);
        collect(&runner, Some(&cache)).await;

        runner.respond(MockResponse::Timeout);
        let outcome = FeatureCollector::new("other-host", &runner, TIMEOUT)
            .with_cache(Some(&cache))
            .collect()
            .await;
        assert!(outcome.timeout);
        assert!(outcome.records.is_empty());
    }

    #[tokio::test]
    async fn test_failure_does_not_overwrite_cache() {
        let cache = ResultCache::new();
        let runner = MockRunner::with_stdout(FEATURE_STDOUT);
        collect(&runner, Some(&cache)).await;

        runner.respond(MockResponse::Output(QueryOutput {
            code: Some(2),
            ..QueryOutput::default()
        }));
        collect(&runner, Some(&cache)).await;
        assert_eq!(cache.read("localhost").len(), 2);
    }

    #[tokio::test]
    async fn test_empty_report_is_cached() {
        let cache = ResultCache::new();
        cache.write("localhost", vec![record("LS-DYNA", 1.0, 1.0)]);
        let runner = MockRunner::with_stdout("LICENSE INFORMATION\n");
        let outcome = collect(&runner, Some(&cache)).await;
        assert!(!outcome.error);
        assert!(outcome.records.is_empty());
        assert!(cache.read("localhost").is_empty());
    }
}
