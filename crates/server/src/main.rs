// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! sbd: the Switchboard control-plane daemon.

use sb_adapters::{
    EventSink, HttpEventPublisher, KnativeCronManager, KnativeSpawner, WorkerSpawner,
};
use sb_core::{Clock, SystemClock};
use sb_engine::{CronDriver, CronReconciler, SessionManager, Sweeper, TaskQueue, WorkerRegistry};
use sb_server::{build_router, init_tracing, AppState, Config};
use sb_storage::{MemStore, PgStore, Store};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _log_guard = init_tracing();
    let config = Arc::new(Config::from_env());
    let clock = SystemClock;

    let store: Arc<dyn Store> = match &config.database_url {
        Some(url) => {
            tracing::info!("connecting to database");
            Arc::new(PgStore::connect(url, config.database_max_connections).await?)
        }
        None => {
            tracing::warn!("SB_DATABASE_URL not set, using in-memory store");
            Arc::new(MemStore::new())
        }
    };

    let events: Arc<dyn EventSink> =
        Arc::new(HttpEventPublisher::new(config.events.clone()));
    let spawner: Arc<dyn WorkerSpawner> =
        Arc::new(KnativeSpawner::new(config.spawner.clone()));
    let registry = Arc::new(WorkerRegistry::new(config.registry.clone(), clock.clone()));
    let queue = Arc::new(TaskQueue::new(
        Arc::clone(&store),
        Arc::clone(&events),
        Arc::clone(&registry),
        config.routing.clone(),
        clock.clone(),
    ));
    let sessions = Arc::new(SessionManager::new(
        Arc::clone(&store),
        Arc::clone(&queue),
        Arc::clone(&spawner),
        Arc::clone(&events),
        clock.clone(),
    ));
    let cron = Arc::new(CronReconciler::new(
        Arc::clone(&store),
        Arc::new(KnativeCronManager::new(config.cron.clone())),
        config.cron_driver,
    ));

    if config.cron_driver == CronDriver::App {
        tracing::error!("the in-process cron driver is not supported; use knative or disabled");
        std::process::exit(2);
    }
    if config.cron_driver == CronDriver::Knative {
        let summary = cron.reconcile_all().await;
        tracing::info!(
            checked = summary.checked,
            reconciled = summary.reconciled,
            failed = summary.failed,
            "startup cron reconciliation"
        );
        for error in &summary.errors {
            tracing::warn!(error, "cron reconciliation error");
        }
    }

    let cancel = CancellationToken::new();

    // Garbage-collect abandoned session workers once an hour.
    if config.spawner.enabled {
        let spawner = Arc::clone(&spawner);
        let max_age_hours = config.spawner_max_age_hours;
        let gc_cancel = cancel.child_token();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(std::time::Duration::from_secs(3600));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = gc_cancel.cancelled() => return,
                    _ = ticker.tick() => {
                        let now_ms = SystemClock.epoch_ms();
                        match spawner.cleanup_idle_workers(max_age_hours, now_ms).await {
                            Ok(stats) if stats.cleaned > 0 || stats.errors > 0 => {
                                tracing::info!(
                                    cleaned = stats.cleaned,
                                    errors = stats.errors,
                                    "idle session workers cleaned up"
                                );
                            }
                            Ok(_) => {}
                            Err(err) => tracing::warn!(error = %err, "session worker cleanup failed"),
                        }
                    }
                }
            }
        });
    }

    let sweeper = Arc::new(Sweeper::new(
        Arc::clone(&registry),
        Arc::clone(&queue),
        config.sweeper.clone(),
        clock,
    ));
    let sweep_handle = tokio::spawn(Sweeper::run(Arc::clone(&sweeper), cancel.child_token()));

    let state = AppState {
        store,
        queue,
        registry,
        sessions,
        cron,
        config: Arc::clone(&config),
    };
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "control plane listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await?;

    cancel.cancel();
    let _ = sweep_handle.await;
    Ok(())
}
