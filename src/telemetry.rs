//! Telemetry initialization (tracing/tracing-subscriber).
//!
//! - LOG_LEVEL controls the filter, e.g. "debug" or "info,session=debug,extract=trace".
//! - LOG_FORMAT selects "pretty" (default) or "json" structured logs.
//!
//! Targets: `extract` (parsing pipeline), `problems` (generation and backfill),
//! `session` (engine and AI actions), `problemset_backend` (server lifecycle).
//! Tower HTTP TraceLayer adds per-request spans on top of these.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str =
    "info,extract=debug,session=debug,problems=debug,problemset_backend=debug,tower_http=info,axum=info";

#[derive(Debug, PartialEq, Eq)]
enum LogFormat {
    Pretty,
    Json,
}

fn log_format(raw: Option<&str>) -> LogFormat {
    match raw.map(str::trim) {
        Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
        _ => LogFormat::Pretty,
    }
}

pub fn init_tracing() {
    let filter = EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    // The two builders have different types, so each arm finishes its own init.
    match log_format(std::env::var("LOG_FORMAT").ok().as_deref()) {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}
