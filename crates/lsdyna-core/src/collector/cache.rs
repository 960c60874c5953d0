//! Last-known-good feature reports, keyed by target.
//!
//! A single reader/writer lock guards the map for all targets. Writes only
//! happen after a successful query, so contention stays low, and every
//! critical section is a single map operation.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::warn;

use crate::collector::feature::FeatureRecord;

/// Process-lifetime cache of parsed feature records.
///
/// Entries are never evicted; the key space is the set of distinct targets
/// scraped since startup.
#[derive(Debug, Default)]
pub struct ResultCache {
    entries: RwLock<HashMap<String, Vec<FeatureRecord>>>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached records for `target`, or an empty list.
    pub fn read(&self, target: &str) -> Vec<FeatureRecord> {
        self.read_guard().get(target).cloned().unwrap_or_default()
    }

    /// Replaces the cached records for `target`.
    pub fn write(&self, target: &str, records: Vec<FeatureRecord>) {
        self.write_guard().insert(target.to_string(), records);
    }

    /// Number of cached targets.
    pub fn len(&self) -> usize {
        self.read_guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // A panic while holding the lock leaves the map itself intact, so the
    // poisoned guard is still usable.
    fn read_guard(&self) -> RwLockReadGuard<'_, HashMap<String, Vec<FeatureRecord>>> {
        self.entries.read().unwrap_or_else(|poisoned| {
            warn!("feature cache lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn write_guard(&self) -> RwLockWriteGuard<'_, HashMap<String, Vec<FeatureRecord>>> {
        self.entries.write().unwrap_or_else(|poisoned| {
            warn!("feature cache lock poisoned, recovering");
            poisoned.into_inner()
        })
    }
}
