//! lsdyna-core: collectors for the LS-DYNA license exporter.
//!
//! Provides:
//! - `collector`: `lstc_qrun` invocation, report parsers, result cache and
//!   the feature / program collectors
//! - `config`: runtime settings shared by the collectors
//! - `metrics`: Prometheus metric definitions and text rendering

pub mod collector;
pub mod config;
pub mod metrics;

/// Crate version, reported at startup and in the build info metric.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Short git revision the binary was built from.
pub const REVISION: &str = env!("LSDYNA_REVISION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_metadata() {
        assert!(!VERSION.is_empty());
        assert!(!REVISION.is_empty());
        assert!(!REVISION.contains(char::is_whitespace));
    }
}
