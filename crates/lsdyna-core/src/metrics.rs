//! Prometheus metric definitions for the collectors.
//!
//! Each scrape builds fresh metric vectors, fills them from the collection
//! outcomes and registers them in a throwaway [`Registry`], so nothing
//! leaks between targets or scrapes.

use std::collections::HashSet;

use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};
use tracing::warn;

use crate::collector::feature::aggregate_by_expiration;
use crate::collector::{CollectionOutcome, FeatureRecord, ProgramUsageRecord};

pub const NAMESPACE: &str = "lsdyna";

fn gauge_vec(subsystem: &str, name: &str, help: &str, labels: &[&str]) -> prometheus::Result<GaugeVec> {
    GaugeVec::new(
        Opts::new(name, help).namespace(NAMESPACE).subsystem(subsystem),
        labels,
    )
}

fn describe<'a>(vecs: &[&'a GaugeVec]) -> Vec<&'a Desc> {
    vecs.iter().flat_map(|&v| v.desc()).collect()
}

fn gather(vecs: &[&GaugeVec]) -> Vec<MetricFamily> {
    vecs.iter().flat_map(|&v| v.collect()).collect()
}

/// Per-feature license gauges and the expiration aggregate.
#[derive(Clone)]
pub struct FeatureMetrics {
    expiration_seconds: GaugeVec,
    used: GaugeVec,
    free: GaugeVec,
    total: GaugeVec,
    queue: GaugeVec,
    aggregate_expiration_seconds: GaugeVec,
}

impl FeatureMetrics {
    pub fn new() -> prometheus::Result<Self> {
        Ok(Self {
            expiration_seconds: gauge_vec(
                "feature",
                "expiration_seconds",
                "Number of seconds till the LTSC licenses expire",
                &["name"],
            )?,
            used: gauge_vec("feature", "used", "Number of used licenses", &["name"])?,
            free: gauge_vec("feature", "free", "Number of free licenses", &["name"])?,
            total: gauge_vec("feature", "total", "Number of total licenses", &["name"])?,
            queue: gauge_vec("feature", "queue", "Number of queued licenses", &["name"])?,
            aggregate_expiration_seconds: gauge_vec(
                "feature",
                "aggregate_expiration_seconds",
                "Aggregate number of seconds for licenses to expire",
                &["licenses", "features"],
            )?,
        })
    }

    /// Sets one sample per record and field, plus one aggregate per
    /// distinct expiration labelled with the summed license count.
    ///
    /// A feature name seen twice keeps the values of its last row.
    pub fn observe(&self, records: &[FeatureRecord]) {
        let mut seen = HashSet::new();
        for r in records {
            if !seen.insert(r.name.as_str()) {
                warn!(name = %r.name, "duplicate feature in report, keeping last row");
            }
            let name = [r.name.as_str()];
            self.expiration_seconds
                .with_label_values(&name)
                .set(r.expiration_seconds);
            self.used.with_label_values(&name).set(r.used);
            self.free.with_label_values(&name).set(r.free);
            self.total.with_label_values(&name).set(r.total);
            self.queue.with_label_values(&name).set(r.queue);
        }
        for aggregate in aggregate_by_expiration(records) {
            let licenses = (aggregate.total_licenses as i64).to_string();
            let features = aggregate.feature_count.to_string();
            self.aggregate_expiration_seconds
                .with_label_values(&[licenses.as_str(), features.as_str()])
                .set(aggregate.expiration_seconds);
        }
    }

    fn vecs(&self) -> [&GaugeVec; 6] {
        [
            &self.expiration_seconds,
            &self.used,
            &self.free,
            &self.total,
            &self.queue,
            &self.aggregate_expiration_seconds,
        ]
    }
}

impl Collector for FeatureMetrics {
    fn desc(&self) -> Vec<&Desc> {
        describe(&self.vecs())
    }

    fn collect(&self) -> Vec<MetricFamily> {
        gather(&self.vecs())
    }
}

/// CPUs in use per feature and user.
#[derive(Clone)]
pub struct ProgramMetrics {
    user_used: GaugeVec,
}

impl ProgramMetrics {
    pub fn new() -> prometheus::Result<Self> {
        Ok(Self {
            user_used: gauge_vec(
                "feature",
                "user_used",
                "Number of licenses used by a user for a given feature",
                &["feature", "user"],
            )?,
        })
    }

    pub fn observe(&self, records: &[ProgramUsageRecord]) {
        for r in records {
            self.user_used
                .with_label_values(&[r.program.as_str(), r.user.as_str()])
                .set(r.used);
        }
    }
}

impl Collector for ProgramMetrics {
    fn desc(&self) -> Vec<&Desc> {
        self.user_used.desc()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        self.user_used.collect()
    }
}

/// Duration, error and timeout gauges shared by all collectors.
#[derive(Clone)]
pub struct ExporterMetrics {
    duration: GaugeVec,
    error: GaugeVec,
    timeout: GaugeVec,
}

impl ExporterMetrics {
    pub fn new() -> prometheus::Result<Self> {
        Ok(Self {
            duration: gauge_vec(
                "exporter",
                "collector_duration_seconds",
                "Collector time duration.",
                &["collector"],
            )?,
            error: gauge_vec(
                "exporter",
                "collect_error",
                "Indicates if error has occurred during collection",
                &["collector"],
            )?,
            timeout: gauge_vec(
                "exporter",
                "collect_timeout",
                "Indicates the collector timed out",
                &["collector"],
            )?,
        })
    }

    pub fn observe<R>(&self, outcome: &CollectionOutcome<R>) {
        let collector = [outcome.collector];
        self.error
            .with_label_values(&collector)
            .set(flag(outcome.error));
        self.timeout
            .with_label_values(&collector)
            .set(flag(outcome.timeout));
        self.duration
            .with_label_values(&collector)
            .set(outcome.duration.as_secs_f64());
    }

    fn vecs(&self) -> [&GaugeVec; 3] {
        [&self.duration, &self.error, &self.timeout]
    }
}

fn flag(set: bool) -> f64 {
    if set { 1.0 } else { 0.0 }
}

impl Collector for ExporterMetrics {
    fn desc(&self) -> Vec<&Desc> {
        describe(&self.vecs())
    }

    fn collect(&self) -> Vec<MetricFamily> {
        gather(&self.vecs())
    }
}

/// Builds the per-scrape registry from both collector outcomes.
pub fn registry(
    features: &CollectionOutcome<FeatureRecord>,
    programs: &CollectionOutcome<ProgramUsageRecord>,
) -> prometheus::Result<Registry> {
    let feature_metrics = FeatureMetrics::new()?;
    feature_metrics.observe(&features.records);

    let program_metrics = ProgramMetrics::new()?;
    program_metrics.observe(&programs.records);

    let exporter_metrics = ExporterMetrics::new()?;
    exporter_metrics.observe(features);
    exporter_metrics.observe(programs);

    let registry = Registry::new();
    registry.register(Box::new(feature_metrics))?;
    registry.register(Box::new(program_metrics))?;
    registry.register(Box::new(exporter_metrics))?;
    Ok(registry)
}

/// Renders both outcomes in the Prometheus text exposition format.
pub fn render(
    features: &CollectionOutcome<FeatureRecord>,
    programs: &CollectionOutcome<ProgramUsageRecord>,
) -> prometheus::Result<String> {
    encode(&registry(features, programs)?.gather())
}

/// Registers `lsdyna_exporter_build_info` in the default registry.
pub fn register_build_info() -> prometheus::Result<()> {
    let build_info = gauge_vec(
        "exporter",
        "build_info",
        "A metric with a constant '1' value labeled by version and revision",
        &["version", "revision"],
    )?;
    build_info
        .with_label_values(&[crate::VERSION, crate::REVISION])
        .set(1.0);
    prometheus::register(Box::new(build_info))
}

/// Renders the default registry (process metrics and build info).
pub fn render_default() -> prometheus::Result<String> {
    encode(&prometheus::gather())
}

fn encode(families: &[MetricFamily]) -> prometheus::Result<String> {
    let mut buf = Vec::new();
    TextEncoder::new().encode(families, &mut buf)?;
    String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

/// Content type of [`render`] output.
pub const TEXT_CONTENT_TYPE: &str = prometheus::TEXT_FORMAT;
