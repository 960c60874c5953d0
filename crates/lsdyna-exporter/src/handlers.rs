//! HTTP request handlers: landing page, per-target scrape, exporter metrics.

use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use serde::Deserialize;
use tracing::error;

use lsdyna_core::collector::{FeatureCollector, ProgramCollector, QueryRunner};
use lsdyna_core::metrics;

use crate::state::SharedState;

pub(crate) const METRICS_ENDPOINT: &str = "/lsdyna";

// ============================================================
// Landing page
// ============================================================

pub(crate) async fn handle_index() -> Html<String> {
    Html(format!(
        "<html>
<head><title>ls-dyna Exporter</title></head>
<body>
<h1>ls-dyna Exporter</h1>
<p><a href='{METRICS_ENDPOINT}'>Metrics</a></p>
<p><a href='/metrics'>Exporter Metrics</a></p>
</body>
</html>"
    ))
}

// ============================================================
// Scrape
// ============================================================

#[derive(Deserialize)]
pub(crate) struct TargetQuery {
    target: Option<String>,
}

/// Runs both collectors for `?target=` and returns their metrics.
///
/// Collection failures never change the status code; they show up in the
/// `lsdyna_exporter_collect_error` / `_timeout` gauges instead.
pub(crate) async fn handle_lsdyna<R: QueryRunner + 'static>(
    State(state): State<SharedState<R>>,
    Query(query): Query<TargetQuery>,
) -> Response {
    let Some(target) = query.target.filter(|t| !t.is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            "'target' parameter must be specified",
        )
            .into_response();
    };

    let features = FeatureCollector::new(&target, &state.runner, state.config.feature_timeout)
        .with_cache(state.cache());
    let programs = ProgramCollector::new(&target, &state.runner, state.config.program_timeout);
    let (features, programs) = tokio::join!(features.collect(), programs.collect());

    match metrics::render(&features, &programs) {
        Ok(body) => text(body),
        Err(e) => {
            error!(host = %target, error = %e, "failed to render metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

// ============================================================
// Exporter self metrics
// ============================================================

pub(crate) async fn handle_metrics() -> Response {
    match metrics::render_default() {
        Ok(body) => text(body),
        Err(e) => {
            error!(error = %e, "failed to render exporter metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

fn text(body: String) -> Response {
    ([(header::CONTENT_TYPE, metrics::TEXT_CONTENT_TYPE)], body).into_response()
}
