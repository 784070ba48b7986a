//! Problem-set practice backend
//!
//! - Generates problem sets with a model, extracts them into items, and runs
//!   timed practice sessions with hints, solutions, grading and code review
//! - Axum HTTP + WebSocket API
//! - Optional OpenAI integration (via environment variables); built-in problems otherwise
//! - Static SPA fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT                : u16 (default 3000)
//!   OPENAI_API_KEY      : enables OpenAI integration if present
//!   OPENAI_BASE_URL     : default "https://api.openai.com/v1"
//!   OPENAI_FAST_MODEL   : default "gpt-4o-mini" (hints, solutions, grading)
//!   OPENAI_STRONG_MODEL : default "gpt-4o" (problem-set generation)
//!   AGENT_CONFIG_PATH   : path to TOML config (prompts + session defaults)
//!   LOG_LEVEL           : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT          : "pretty" (default) or "json"

mod telemetry;
mod util;
mod domain;
mod error;
mod config;
mod completeness;
mod extract;
mod scoring;
mod ai;
mod source;
mod session;
mod engine;
mod openai;
mod seeds;
mod state;
mod protocol;
mod logic;
mod routes;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, instrument};

use crate::routes::build_router;
use crate::state::AppState;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Session registry, problem source, chat collaborator, prompts.
  let state = Arc::new(AppState::new());

  let app = build_router(state.clone());

  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "problemset_backend", %addr, ai_enabled = state.ai_enabled, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  info!(target: "problemset_backend", "Server stopped");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(target: "problemset_backend", error = %e, "Failed to listen for shutdown signal");
    std::future::pending::<()>().await;
  }
  info!(target: "problemset_backend", "Shutdown signal received");
}
