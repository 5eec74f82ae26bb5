// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task queue: materialization, claim arbitration, and status reporting.
//!
//! Every task takes exactly one delivery route, stamped into its routing
//! metadata: tasks flagged for a dynamically spawned session worker go to
//! the event bus as `queued`; everything else is advertised on the push
//! stream as `pending`. State is durable in the store before any external
//! notification that references it.

use crate::registry::WorkerRegistry;
use sb_adapters::{EventEnvelope, EventSink, PublishError};
use sb_core::routing::{route, RouteRequest, RoutingConfig};
use sb_core::{Clock, CodebaseTarget, DeliveryRoute, SessionId, Task, TaskDraft, TaskId, TaskStatus, WorkerId};
use sb_storage::{
    CancelOutcome, ClaimOutcome, StoreError, TaskFilter, TaskRelease, TenantScope, UpdateOutcome,
};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("codebase {0} not found")]
    CodebaseNotFound(String),

    #[error("session {0} has ended")]
    SessionEnded(SessionId),

    #[error("session {0} not found")]
    SessionNotFound(SessionId),

    /// Release status must be terminal (or the idempotent `running`).
    #[error("invalid release status {0}")]
    InvalidReleaseStatus(TaskStatus),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Publish(#[from] PublishError),
}

/// The dispatch queue. All durable state lives in the store; the queue
/// orchestrates routing, single-route notification, and the claim
/// protocol's side effects.
pub struct TaskQueue<C: Clock> {
    store: Arc<dyn sb_storage::Store>,
    events: Arc<dyn EventSink>,
    registry: Arc<WorkerRegistry<C>>,
    routing: RoutingConfig,
    clock: C,
}

impl<C: Clock> TaskQueue<C> {
    pub fn new(
        store: Arc<dyn sb_storage::Store>,
        events: Arc<dyn EventSink>,
        registry: Arc<WorkerRegistry<C>>,
        routing: RoutingConfig,
        clock: C,
    ) -> Self {
        Self { store, events, registry, routing, clock }
    }

    pub fn store(&self) -> &Arc<dyn sb_storage::Store> {
        &self.store
    }

    pub fn registry(&self) -> &Arc<WorkerRegistry<C>> {
        &self.registry
    }

    pub fn routing_config(&self) -> &RoutingConfig {
        &self.routing
    }

    /// Create a task: validate its target, run the routing policy, persist,
    /// then notify exactly one fabric.
    pub async fn create_task(
        &self,
        scope: &TenantScope,
        mut draft: TaskDraft,
    ) -> Result<Task, QueueError> {
        if let CodebaseTarget::Codebase(id) = &draft.codebase {
            if self.store.get_codebase(scope, id).await?.is_none() {
                return Err(QueueError::CodebaseNotFound(id.to_string()));
            }
        }
        if let Some(session_id) = draft.session_id {
            match self.store.get_session(scope, &session_id).await? {
                None => return Err(QueueError::SessionNotFound(session_id)),
                Some(session) if !session.is_active() => {
                    return Err(QueueError::SessionEnded(session_id));
                }
                Some(_) => {}
            }
        }

        let (decision, mut metadata) = route(
            RouteRequest {
                prompt: &draft.prompt,
                agent_type: &draft.agent_type,
                files: &draft.files,
                metadata: &draft.metadata,
                model: draft.model.as_deref(),
                model_ref: draft.model_ref.as_deref(),
                target_agent_name: draft.target_agent_name.as_deref(),
                worker_personality: draft.worker_personality.as_deref(),
            },
            &self.routing,
        );

        // Exactly one delivery route per task.
        let delivery = if metadata.flag("knative") && self.events.is_enabled() {
            DeliveryRoute::Events
        } else {
            DeliveryRoute::Stream
        };
        metadata.routing_mut().delivery = Some(delivery);

        draft.model = decision
            .model_ref
            .as_ref()
            .map(|m| m.wire())
            .or(draft.model.take());
        draft.target_agent_name = decision.target_agent_name.clone();
        draft.worker_personality = decision.worker_personality.clone();
        if draft.required_capabilities.is_empty() {
            draft.required_capabilities = decision.required_capabilities.clone();
        }
        draft.metadata = metadata;

        let now_ms = self.clock.epoch_ms();
        let mut task = Task::from_draft(draft, now_ms);
        task.model_ref = decision.model_ref.clone();
        if delivery == DeliveryRoute::Events {
            task.apply_status(TaskStatus::Queued, now_ms)
                .map_err(StoreError::InvalidTransition)?;
        }

        // Durable before any notification that references the new state.
        self.store.upsert_task(scope, task.clone()).await?;
        tracing::info!(
            task_id = %task.id,
            complexity = %decision.complexity,
            model_tier = %decision.model_tier,
            delivery = %delivery,
            "task created"
        );

        match delivery {
            DeliveryRoute::Stream => {
                self.registry.broadcast_task_available(&task);
            }
            DeliveryRoute::Events => {
                if let Err(err) = self.events.publish(EventEnvelope::task_created(&task)).await {
                    // The event bus was this task's sole route; record the
                    // failure on the task and surface it as a task failure.
                    tracing::error!(task_id = %task.id, error = %err, "event delivery failed");
                    task.metadata
                        .extras
                        .insert("delivery_error".to_string(), serde_json::json!(err.to_string()));
                    task.apply_status(TaskStatus::Failed, self.clock.epoch_ms())
                        .map_err(StoreError::InvalidTransition)?;
                    task.error = Some(format!("event delivery failed: {err}"));
                    self.store.upsert_task(scope, task.clone()).await?;
                }
            }
        }
        Ok(task)
    }

    pub async fn get_task(
        &self,
        scope: &TenantScope,
        id: &TaskId,
    ) -> Result<Option<Task>, QueueError> {
        Ok(self.store.get_task(scope, id).await?)
    }

    pub async fn list_tasks(
        &self,
        scope: &TenantScope,
        filter: TaskFilter,
    ) -> Result<Vec<Task>, QueueError> {
        Ok(self.store.list_tasks(scope, filter).await?)
    }

    /// Atomic claim. The winner gets the full payload; everyone else hears
    /// `task_claimed` on their stream.
    pub async fn claim_task(
        &self,
        scope: &TenantScope,
        id: &TaskId,
        worker_id: &WorkerId,
    ) -> Result<ClaimOutcome, QueueError> {
        let outcome = self
            .store
            .claim_task(scope, id, worker_id, self.clock.epoch_ms())
            .await?;
        if let ClaimOutcome::Claimed(task) = &outcome {
            tracing::info!(task_id = %id, %worker_id, "task claimed");
            self.registry.broadcast_task_claimed(id, worker_id);
            self.publish_update(task).await;
        }
        Ok(outcome)
    }

    /// Idempotent `running` report, optionally attaching a session id.
    pub async fn mark_running(
        &self,
        scope: &TenantScope,
        id: &TaskId,
        worker_id: &WorkerId,
        session_id: Option<SessionId>,
    ) -> Result<UpdateOutcome, QueueError> {
        let outcome = self
            .store
            .mark_running(scope, id, worker_id, session_id, self.clock.epoch_ms())
            .await?;
        if let UpdateOutcome::Updated(task) = &outcome {
            self.publish_update(task).await;
        }
        Ok(outcome)
    }

    /// Terminal report from a worker.
    pub async fn release_task(
        &self,
        scope: &TenantScope,
        release: TaskRelease,
    ) -> Result<UpdateOutcome, QueueError> {
        if !release.status.is_terminal() {
            return Err(QueueError::InvalidReleaseStatus(release.status));
        }
        let outcome = self
            .store
            .release_task(scope, release, self.clock.epoch_ms())
            .await?;
        if let UpdateOutcome::Updated(task) = &outcome {
            tracing::info!(task_id = %task.id, status = %task.status, "task released");
            self.publish_update(task).await;
        }
        Ok(outcome)
    }

    /// Client-side cancel: direct in pre-claim states, advisory interrupt
    /// once a worker owns the task.
    pub async fn cancel_task(
        &self,
        scope: &TenantScope,
        id: &TaskId,
    ) -> Result<CancelOutcome, QueueError> {
        let outcome = self.store.cancel_task(scope, id, self.clock.epoch_ms()).await?;
        match &outcome {
            CancelOutcome::Cancelled(task) => {
                tracing::info!(task_id = %id, "task cancelled");
                self.publish_update(task).await;
            }
            CancelOutcome::Claimed(task) => {
                if let Some(worker_id) = &task.worker_id {
                    let sent =
                        self.registry.send_interrupt(worker_id, id, "cancellation requested");
                    tracing::info!(task_id = %id, %worker_id, sent, "cancel became interrupt");
                }
            }
            _ => {}
        }
        Ok(outcome)
    }

    /// Cancel every non-terminal task of a session, exactly once each.
    /// Returns the cancelled tasks; owning workers of claimed tasks get an
    /// interrupt so they stop work they can no longer report.
    pub async fn cancel_session_tasks(
        &self,
        scope: &TenantScope,
        session_id: &SessionId,
        reason: &str,
    ) -> Result<Vec<Task>, QueueError> {
        let cancelled = self
            .store
            .cancel_session_tasks(scope, session_id, reason, self.clock.epoch_ms())
            .await?;
        for task in &cancelled {
            if let Some(worker_id) = &task.worker_id {
                self.registry.send_interrupt(worker_id, &task.id, reason);
            }
            self.publish_update(task).await;
        }
        Ok(cancelled)
    }

    /// Crash recovery: requeue every task still claimed by a dead worker
    /// and re-advertise it. At-least-once delivery, not exactly-once.
    pub async fn requeue_abandoned(&self, worker_id: &WorkerId) -> Result<Vec<Task>, QueueError> {
        let scope = TenantScope::Admin;
        let claimed = self
            .store
            .list_tasks(&scope, TaskFilter::default().worker_id(worker_id.clone()))
            .await?;
        let mut requeued = Vec::new();
        for task in claimed {
            if !task.status.is_claimed() {
                continue;
            }
            if let Some(reset) = self.store.requeue_task(&scope, &task.id, worker_id).await? {
                tracing::warn!(
                    task_id = %reset.id,
                    %worker_id,
                    "requeued task abandoned by dead worker"
                );
                self.registry.broadcast_task_available(&reset);
                requeued.push(reset);
            }
        }
        Ok(requeued)
    }

    /// Re-advertise claimable stream-route tasks (backpressure recovery).
    pub async fn readvertise_pending(&self, limit: usize) -> Result<usize, QueueError> {
        let pending = self
            .store
            .list_tasks(
                &TenantScope::Admin,
                TaskFilter::default().status(TaskStatus::Pending).limit(limit),
            )
            .await?;
        let mut advertised = 0;
        for task in &pending {
            if task.metadata.delivery() == Some(DeliveryRoute::Events) {
                continue;
            }
            if self.registry.broadcast_task_available(task) > 0 {
                advertised += 1;
            }
        }
        Ok(advertised)
    }

    /// Best-effort `task.updated`; the push stream is authoritative for
    /// connected workers, so a failed status event never fails the call.
    async fn publish_update(&self, task: &Task) {
        if !self.events.is_enabled() {
            return;
        }
        if let Err(err) = self.events.publish(EventEnvelope::task_updated(task)).await {
            tracing::warn!(task_id = %task.id, error = %err, "task.updated publish failed");
        }
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
