//! Runtime settings for the collectors.
//!
//! Values are read once at startup (see the `lsdyna-exporter` CLI) and only
//! referenced immutably afterwards.

use std::path::PathBuf;
use std::time::Duration;

/// Default timeout for each `lstc_qrun` invocation, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Settings shared by every collector instance.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Path to the `lstc_qrun` executable.
    pub lstc_qrun: PathBuf,
    /// Deadline for the feature (`-r`) query.
    pub feature_timeout: Duration,
    /// Deadline for the running programs (`-p`) query.
    pub program_timeout: Duration,
    /// Serve the last successful feature report when a query fails.
    pub use_cache: bool,
}

impl CollectorConfig {
    /// Creates a configuration with default timeouts and caching disabled.
    pub fn new(lstc_qrun: impl Into<PathBuf>) -> Self {
        Self {
            lstc_qrun: lstc_qrun.into(),
            feature_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            program_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            use_cache: false,
        }
    }

    pub fn with_feature_timeout(mut self, timeout: Duration) -> Self {
        self.feature_timeout = timeout;
        self
    }

    pub fn with_program_timeout(mut self, timeout: Duration) -> Self {
        self.program_timeout = timeout;
        self
    }

    pub fn with_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }
}
