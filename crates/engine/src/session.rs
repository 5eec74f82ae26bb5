// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session lifecycle.
//!
//! Sessions group tasks that share one dynamically provisioned worker.
//! Creating a session spawns (or reuses) the per-session worker service;
//! ending one cancels every non-terminal task exactly once, tears the
//! service down, and publishes `session.ended`.

use crate::queue::{QueueError, TaskQueue};
use sb_adapters::{EventEnvelope, EventSink, SpawnError, SpawnOutcome, WorkerSpawner};
use sb_core::{Clock, CodebaseId, Session, SessionId, SessionStatus, Task, TenantId};
use sb_storage::{Store, StoreError, TenantScope};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session {0} not found")]
    NotFound(SessionId),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Spawn(#[from] SpawnError),
}

/// What ending a session did.
#[derive(Debug)]
pub struct SessionEndSummary {
    pub session: Session,
    pub cancelled_tasks: Vec<Task>,
    /// Whether the external worker service was deleted (false when the
    /// spawner is disabled or the delete failed best-effort).
    pub worker_deleted: bool,
}

/// Session orchestration over the store, the queue, and the spawner.
pub struct SessionManager<C: Clock> {
    store: Arc<dyn Store>,
    queue: Arc<TaskQueue<C>>,
    spawner: Arc<dyn WorkerSpawner>,
    events: Arc<dyn EventSink>,
    clock: C,
}

impl<C: Clock> SessionManager<C> {
    pub fn new(
        store: Arc<dyn Store>,
        queue: Arc<TaskQueue<C>>,
        spawner: Arc<dyn WorkerSpawner>,
        events: Arc<dyn EventSink>,
        clock: C,
    ) -> Self {
        Self { store, queue, spawner, events, clock }
    }

    /// Create (or return) the active session for a codebase and reconcile
    /// its worker. At most one active session exists per codebase.
    pub async fn create_session(
        &self,
        scope: &TenantScope,
        session_id: SessionId,
        tenant_id: TenantId,
        codebase_id: CodebaseId,
    ) -> Result<(Session, SpawnOutcome), SessionError> {
        if let Some(existing) =
            self.store.active_session_for_codebase(scope, &codebase_id).await?
        {
            tracing::info!(session_id = %existing.id, "reusing active session");
            let outcome = self
                .spawner
                .create_session_worker(
                    existing.id.as_str(),
                    tenant_id.as_str(),
                    codebase_id.as_str(),
                )
                .await?;
            return Ok((existing, outcome));
        }

        let outcome = self
            .spawner
            .create_session_worker(session_id.as_str(), tenant_id.as_str(), codebase_id.as_str())
            .await?;
        let service_name = match &outcome {
            SpawnOutcome::Spawned(worker) => Some(worker.service_name.clone()),
            SpawnOutcome::Disabled => None,
        };

        let session = Session {
            id: session_id,
            tenant_id,
            codebase_id,
            status: SessionStatus::Active,
            service_name,
            created_at_ms: self.clock.epoch_ms(),
            ended_at_ms: None,
        };
        self.store.upsert_session(scope, session.clone()).await?;
        tracing::info!(session_id = %session.id, "session created");

        if self.events.is_enabled() {
            let envelope = EventEnvelope::session_event(
                &session.id,
                sb_adapters::events::SESSION_CREATED,
                serde_json::json!({
                    "session_id": session.id,
                    "tenant_id": session.tenant_id,
                    "codebase_id": session.codebase_id,
                }),
            );
            if let Err(err) = self.events.publish(envelope).await {
                tracing::warn!(session_id = %session.id, error = %err, "session.created publish failed");
            }
        }

        Ok((session, outcome))
    }

    /// End a session: cancel its tasks with a fixed reason, tear down the
    /// worker, publish `session.ended`.
    pub async fn end_session(
        &self,
        scope: &TenantScope,
        session_id: &SessionId,
    ) -> Result<SessionEndSummary, SessionError> {
        let Some(session) =
            self.store.end_session(scope, session_id, self.clock.epoch_ms()).await?
        else {
            return Err(SessionError::NotFound(*session_id));
        };

        let cancelled_tasks =
            self.queue.cancel_session_tasks(scope, session_id, "Session ended").await?;

        let worker_deleted = match self.spawner.delete_session_worker(session_id.as_str()).await {
            Ok(deleted) => deleted,
            Err(err) => {
                tracing::warn!(%session_id, error = %err, "session worker teardown failed");
                false
            }
        };

        if self.events.is_enabled() {
            let envelope = EventEnvelope::session_event(
                session_id,
                sb_adapters::events::SESSION_ENDED,
                serde_json::json!({
                    "session_id": session_id,
                    "cancelled_tasks": cancelled_tasks.iter().map(|t| t.id).collect::<Vec<_>>(),
                }),
            );
            if let Err(err) = self.events.publish(envelope).await {
                tracing::warn!(%session_id, error = %err, "session.ended publish failed");
            }
        }

        tracing::info!(
            %session_id,
            cancelled = cancelled_tasks.len(),
            worker_deleted,
            "session ended"
        );
        Ok(SessionEndSummary { session, cancelled_tasks, worker_deleted })
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
