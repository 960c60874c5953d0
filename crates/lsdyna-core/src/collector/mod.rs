//! License metrics collectors for `lstc_qrun`.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                        scrape (target)                        │
//! │  ┌──────────────────────────┐   ┌──────────────────────────┐  │
//! │  │    FeatureCollector      │   │    ProgramCollector      │  │
//! │  │  lstc_qrun -r -s target  │   │  lstc_qrun -s target -p  │  │
//! │  │  parse_features          │   │  parse_programs          │  │
//! │  │  ResultCache fallback    │   │  sum per (program, user) │  │
//! │  └────────────┬─────────────┘   └─────────────┬────────────┘  │
//! │               └──────────────┬────────────────┘               │
//! │                       ┌──────▼──────┐                         │
//! │                       │ QueryRunner │ (trait)                 │
//! │                       └──────┬──────┘                         │
//! └──────────────────────────────┼────────────────────────────────┘
//!                    ┌───────────┴───────────┐
//!             ┌──────▼──────┐         ┌──────▼──────┐
//!             │  LstcQrun   │         │ MockRunner  │
//!             │ (process)   │         │ (testing)   │
//!             └─────────────┘         └─────────────┘
//! ```
//!
//! Collectors never fail: query errors and timeouts become flags on the
//! returned [`CollectionOutcome`], possibly alongside cached records.
//!
//! # Usage
//!
//! ```
//! use std::time::Duration;
//! use lsdyna_core::collector::{FeatureCollector, MockRunner, ResultCache};
//! use lsdyna_core::collector::mock::FEATURE_STDOUT;
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let runner = MockRunner::with_stdout(FEATURE_STDOUT);
//! let cache = ResultCache::new();
//! let outcome = FeatureCollector::new("localhost", &runner, Duration::from_secs(10))
//!     .with_cache(Some(&cache))
//!     .collect()
//!     .await;
//! assert_eq!(outcome.records.len(), 2);
//! assert!(!outcome.error && !outcome.timeout);
//! # });
//! ```

pub mod cache;
pub mod feature;
pub mod mock;
pub mod program;
pub mod traits;

use std::time::Duration;

pub use cache::ResultCache;
pub use feature::{FeatureAggregate, FeatureCollector, FeatureRecord};
pub use mock::MockRunner;
pub use program::{ProgramCollector, ProgramUsageRecord};
pub use traits::{LstcQrun, QueryError, QueryOutput, QueryRunner};

/// Result of a single `collect` call.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionOutcome<R> {
    /// Collector name used as the `collector` label ("feature" or "program").
    pub collector: &'static str,
    /// Live, cached, or empty records.
    pub records: Vec<R>,
    /// The query failed for a reason other than a timeout.
    pub error: bool,
    /// The query did not finish before its deadline.
    pub timeout: bool,
    /// Wall-clock time spent in `collect`.
    pub duration: Duration,
}

impl<R> CollectionOutcome<R> {
    pub(crate) fn new(collector: &'static str) -> Self {
        Self {
            collector,
            records: Vec::new(),
            error: false,
            timeout: false,
            duration: Duration::ZERO,
        }
    }

    /// Sets the error or timeout flag according to the failure kind.
    pub(crate) fn flag(&mut self, err: &QueryError) {
        if err.is_timeout() {
            self.timeout = true;
        } else {
            self.error = true;
        }
    }
}
