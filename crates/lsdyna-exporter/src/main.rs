mod handlers;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::get;
use clap::{Parser, ValueEnum};
use tower_http::compression::CompressionLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use lsdyna_core::collector::{LstcQrun, QueryRunner};
use lsdyna_core::config::CollectorConfig;
use lsdyna_core::metrics;

use state::{SharedState, WebAppInner};

// ============================================================
// CLI
// ============================================================

#[derive(Parser)]
#[command(
    name = "lsdyna_exporter",
    about = "Prometheus exporter for LS-DYNA license usage",
    version = lsdyna_core::VERSION
)]
struct Args {
    /// Path to the lstc_qrun executable.
    #[arg(long = "path.lstc_qrun", env = "LSDYNA_LSTC_QRUN")]
    lstc_qrun: PathBuf,

    /// Timeout in seconds for the license feature query.
    #[arg(
        long = "collector.feature.timeout",
        default_value_t = 10,
        env = "LSDYNA_FEATURE_TIMEOUT"
    )]
    feature_timeout: u64,

    /// Timeout in seconds for the running programs query.
    #[arg(
        long = "collector.programs.timeout",
        default_value_t = 10,
        env = "LSDYNA_PROGRAMS_TIMEOUT"
    )]
    programs_timeout: u64,

    /// Serve the last successful feature report when lstc_qrun fails.
    #[arg(long = "exporter.use-cache", env = "LSDYNA_USE_CACHE")]
    use_cache: bool,

    /// Listen address.
    #[arg(
        long = "web.listen-address",
        default_value = "0.0.0.0:9309",
        env = "LSDYNA_LISTEN"
    )]
    listen: String,

    /// Log filter used when RUST_LOG is not set.
    #[arg(long = "log.level", default_value = "info", env = "LSDYNA_LOG_LEVEL")]
    log_level: String,

    /// Log output format.
    #[arg(
        long = "log.format",
        value_enum,
        default_value_t = LogFormat::Logfmt,
        env = "LSDYNA_LOG_FORMAT"
    )]
    log_format: LogFormat,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Logfmt,
    Json,
}

impl Args {
    fn collector_config(&self) -> CollectorConfig {
        CollectorConfig::new(&self.lstc_qrun)
            .with_feature_timeout(Duration::from_secs(self.feature_timeout))
            .with_program_timeout(Duration::from_secs(self.programs_timeout))
            .with_cache(self.use_cache)
    }
}

// ============================================================
// Main
// ============================================================

fn main() {
    let args = Args::parse();
    init_tracing(&args);

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "failed to build tokio runtime");
            process::exit(1);
        }
    };
    runtime.block_on(async_main(args));
}

fn init_tracing(args: &Args) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match args.log_format {
        LogFormat::Logfmt => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn async_main(args: Args) {
    info!(
        version = lsdyna_core::VERSION,
        revision = lsdyna_core::REVISION,
        "starting lsdyna_exporter"
    );

    if let Err(e) = metrics::register_build_info() {
        warn!(error = %e, "failed to register build info metric");
    }

    let config = args.collector_config();
    let runner = LstcQrun::new(&config.lstc_qrun);
    info!(
        lstc_qrun = %runner.path().display(),
        feature_timeout = ?config.feature_timeout,
        program_timeout = ?config.program_timeout,
        use_cache = config.use_cache,
        "collector settings"
    );
    let state = Arc::new(WebAppInner::new(config, runner));

    let app = router(state).layer(CompressionLayer::new());

    let addr: SocketAddr = match args.listen.parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!(listen = %args.listen, error = %e, "invalid listen address");
            process::exit(1);
        }
    };
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(%addr, error = %e, "failed to bind");
            process::exit(1);
        }
    };
    info!(%addr, "listening");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(error = %e, "server error");
        process::exit(1);
    }
    info!("shut down");
}

pub(crate) fn router<R: QueryRunner + 'static>(state: SharedState<R>) -> Router {
    Router::new()
        .route("/", get(handlers::handle_index))
        .route(handlers::METRICS_ENDPOINT, get(handlers::handle_lsdyna::<R>))
        .route("/metrics", get(handlers::handle_metrics))
        .with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_defaults() {
        let args = Args::try_parse_from(["lsdyna_exporter", "--path.lstc_qrun", "/opt/lstc_qrun"])
            .unwrap();
        let config = args.collector_config();
        assert_eq!(config.lstc_qrun, PathBuf::from("/opt/lstc_qrun"));
        assert_eq!(config.feature_timeout, Duration::from_secs(10));
        assert_eq!(config.program_timeout, Duration::from_secs(10));
        assert!(!config.use_cache);
        assert_eq!(args.listen, "0.0.0.0:9309");
        assert!(matches!(args.log_format, LogFormat::Logfmt));
    }

    #[test]
    fn test_args_overrides() {
        let args = Args::try_parse_from([
            "lsdyna_exporter",
            "--path.lstc_qrun=/opt/lstc_qrun",
            "--collector.feature.timeout=3",
            "--collector.programs.timeout=5",
            "--exporter.use-cache",
            "--web.listen-address=127.0.0.1:9000",
            "--log.format=json",
        ])
        .unwrap();
        let config = args.collector_config();
        assert_eq!(config.feature_timeout, Duration::from_secs(3));
        assert_eq!(config.program_timeout, Duration::from_secs(5));
        assert!(config.use_cache);
        assert_eq!(args.listen, "127.0.0.1:9000");
        assert!(matches!(args.log_format, LogFormat::Json));
    }

    #[test]
    fn test_lstc_qrun_required() {
        assert!(Args::try_parse_from(["lsdyna_exporter"]).is_err());
    }
}
