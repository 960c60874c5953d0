//! Shared application state and global allocator.

use std::sync::Arc;

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

use lsdyna_core::collector::{QueryRunner, ResultCache};
use lsdyna_core::config::CollectorConfig;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

pub(crate) struct WebAppInner<R> {
    pub(crate) config: CollectorConfig,
    pub(crate) runner: R,
    // Lives for the whole process; shared by every scrape of every target.
    pub(crate) cache: ResultCache,
}

impl<R: QueryRunner> WebAppInner<R> {
    pub(crate) fn new(config: CollectorConfig, runner: R) -> Self {
        Self {
            config,
            runner,
            cache: ResultCache::new(),
        }
    }

    /// The cache, if fallback is enabled.
    pub(crate) fn cache(&self) -> Option<&ResultCache> {
        self.config.use_cache.then_some(&self.cache)
    }
}

pub(crate) type SharedState<R> = Arc<WebAppInner<R>>;
