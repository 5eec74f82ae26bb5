// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Background maintenance loops.
//!
//! One periodic sweep drives three concerns: heartbeat frames on every
//! push channel, liveness reaping of workers whose channel stopped
//! draining (their claimed tasks go back to `pending`), and
//! re-advertisement of claimable tasks that may have been shed under
//! backpressure. Every loop iteration is bounded; nothing retries forever.

use crate::queue::TaskQueue;
use crate::registry::WorkerRegistry;
use sb_core::{Clock, WorkerStatus};
use sb_storage::TenantScope;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// Claimed tasks of a dead worker are reaped only after this grace
    /// period from the worker's disappearance.
    pub claim_grace: Duration,
    /// Upper bound on tasks re-advertised per sweep.
    pub readvertise_limit: usize,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self { claim_grace: Duration::from_secs(300), readvertise_limit: 100 }
    }
}

/// Periodic heartbeat / liveness / re-advertisement loop.
pub struct Sweeper<C: Clock> {
    registry: Arc<WorkerRegistry<C>>,
    queue: Arc<TaskQueue<C>>,
    config: SweeperConfig,
    clock: C,
    /// Workers seen stale, with the sweep timestamp that first saw them.
    pending_reaps: parking_lot::Mutex<std::collections::HashMap<sb_core::WorkerId, u64>>,
}

impl<C: Clock> Sweeper<C> {
    pub fn new(
        registry: Arc<WorkerRegistry<C>>,
        queue: Arc<TaskQueue<C>>,
        config: SweeperConfig,
        clock: C,
    ) -> Self {
        Self {
            registry,
            queue,
            config,
            clock,
            pending_reaps: parking_lot::Mutex::new(std::collections::HashMap::new()),
        }
    }

    /// Run until cancelled, ticking at the registry's heartbeat interval.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let interval = self.registry.config().heartbeat_interval;
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("sweeper shutting down");
                    return;
                }
                _ = ticker.tick() => {
                    self.sweep_once().await;
                }
            }
        }
    }

    /// One full pass. Public so tests can drive sweeps deterministically.
    pub async fn sweep_once(&self) {
        self.registry.broadcast_heartbeat();
        self.reap_stale_workers().await;
        match self.queue.readvertise_pending(self.config.readvertise_limit).await {
            Ok(count) if count > 0 => {
                tracing::debug!(count, "re-advertised pending tasks");
            }
            Ok(_) => {}
            Err(err) => tracing::warn!(error = %err, "re-advertisement failed"),
        }
    }

    /// Close channels that stopped draining; once a dead worker has been
    /// gone past the claim grace period, requeue its tasks.
    async fn reap_stale_workers(&self) {
        let now_ms = self.clock.epoch_ms();
        let stale = self.registry.stale_workers();
        for worker_id in stale {
            tracing::warn!(%worker_id, "closing stale push channel");
            self.registry.unregister(&worker_id);
            if let Err(err) = self
                .queue
                .store()
                .set_worker_liveness(&TenantScope::Admin, &worker_id, WorkerStatus::Offline, now_ms)
                .await
            {
                tracing::warn!(%worker_id, error = %err, "liveness write failed");
            }
            self.pending_reaps.lock().entry(worker_id).or_insert(now_ms);
        }

        let grace_ms = self.config.claim_grace.as_millis() as u64;
        let due: Vec<sb_core::WorkerId> = self
            .pending_reaps
            .lock()
            .iter()
            .filter(|(worker_id, seen_ms)| {
                // A reconnect cancels the pending reap.
                !self.registry.is_connected(worker_id)
                    && now_ms.saturating_sub(**seen_ms) >= grace_ms
            })
            .map(|(worker_id, _)| worker_id.clone())
            .collect();
        for worker_id in due {
            match self.queue.requeue_abandoned(&worker_id).await {
                Ok(requeued) => {
                    if !requeued.is_empty() {
                        tracing::warn!(
                            %worker_id,
                            count = requeued.len(),
                            "requeued tasks from dead worker"
                        );
                    }
                    self.pending_reaps.lock().remove(&worker_id);
                }
                Err(err) => {
                    tracing::warn!(%worker_id, error = %err, "requeue of abandoned tasks failed");
                }
            }
        }
        // Reconnected workers no longer need reaping.
        self.pending_reaps.lock().retain(|worker_id, _| !self.registry.is_connected(worker_id));
    }
}

#[cfg(test)]
#[path = "sweep_tests.rs"]
mod tests;
