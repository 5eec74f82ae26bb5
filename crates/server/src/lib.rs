// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sb-server: the HTTP surface of the control plane.
//!
//! A thin adapter: handlers translate requests into core operations on the
//! queue, registry, session manager, and cron reconciler, and translate
//! component errors into HTTP responses. The push endpoint exposes each
//! worker's logical channel as a server-sent event stream.

pub mod env;
pub mod error;
pub mod routes;
pub mod state;

pub use env::Config;
pub use error::ApiError;
pub use state::AppState;

use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;

/// Assemble the full route table.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(routes::health::healthz))
        .route("/v1/tasks", post(routes::tasks::create_task).get(routes::tasks::list_tasks))
        .route("/v1/tasks/{id}", get(routes::tasks::get_task))
        .route("/v1/tasks/{id}/cancel", post(routes::tasks::cancel_task))
        .route("/v1/worker/tasks/stream", get(routes::worker::task_stream))
        .route("/v1/worker/tasks/claim", post(routes::worker::claim_task))
        .route("/v1/worker/tasks/release", post(routes::worker::release_task))
        .route("/v1/worker/heartbeat", post(routes::worker::heartbeat))
        .route("/v1/worker/codebases", put(routes::worker::update_codebases))
        .route(
            "/v1/codebases",
            post(routes::codebases::register_codebase).get(routes::codebases::list_codebases),
        )
        .route("/v1/codebases/{id}", delete(routes::codebases::delete_codebase))
        .route("/v1/models", get(routes::models::list_models))
        .route("/v1/sessions", post(routes::sessions::create_session))
        .route("/v1/sessions/{id}/end", post(routes::sessions::end_session))
        .route(
            "/v1/cronjobs",
            post(routes::crons::create_cronjob).get(routes::crons::list_cronjobs),
        )
        .route("/v1/cronjobs/{id}", delete(routes::crons::delete_cronjob))
        .route(
            "/v1/cronjobs/internal/{job_id}/trigger",
            post(routes::crons::internal_trigger),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Initialize tracing for the daemon binary.
///
/// Logs go to stderr; when `SB_LOG_DIR` is set a daily-rolling file sink is
/// added as well. Returns the appender guard, which must stay alive for
/// buffered file writes to flush.
pub fn init_tracing() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sb_server=debug"));
    match std::env::var("SB_LOG_DIR").ok().filter(|dir| !dir.trim().is_empty()) {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "sbd.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            None
        }
    }
}
