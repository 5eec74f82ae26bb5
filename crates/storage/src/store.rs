// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `Store` trait and operation result types.

use crate::error::StoreError;
use crate::scope::TenantScope;
use async_trait::async_trait;
use sb_core::{
    Codebase, CodebaseId, CodebaseTarget, Cronjob, CronjobId, Session, SessionId, Task, TaskId,
    TaskStatus, Tenant, TenantId, Worker, WorkerId, WorkerStatus,
};
use std::collections::BTreeSet;

/// Result of the atomic claim write.
///
/// At most one concurrent caller observes `Claimed` for a given task id;
/// everyone else gets `AlreadyClaimed`. This is the single ordering
/// guarantee the queue provides.
#[derive(Debug)]
pub enum ClaimOutcome {
    Claimed(Box<Task>),
    AlreadyClaimed,
    NotFound,
}

/// Result of a conditional task mutation.
#[derive(Debug)]
pub enum UpdateOutcome {
    Updated(Box<Task>),
    /// Idempotent rewrite absorbed without change (repeated `running`,
    /// repeated identical terminal status).
    Unchanged(Box<Task>),
    /// The condition failed: mismatched worker id or an illegal transition
    /// from a terminal state. The row is untouched.
    Conflict { reason: &'static str },
    NotFound,
}

/// Result of a client-side cancel.
#[derive(Debug)]
pub enum CancelOutcome {
    /// Pre-claim cancel succeeded.
    Cancelled(Box<Task>),
    /// The task is claimed; cancellation becomes an advisory interrupt for
    /// the owning worker.
    Claimed(Box<Task>),
    /// Already terminal; nothing was mutated.
    Terminal(Box<Task>),
    NotFound,
}

/// Terminal report from a worker.
#[derive(Debug, Clone)]
pub struct TaskRelease {
    pub task_id: TaskId,
    pub worker_id: WorkerId,
    pub status: TaskStatus,
    pub result: Option<String>,
    pub error: Option<String>,
    pub session_id: Option<SessionId>,
    pub model_used: Option<String>,
}

/// Filter for task listings. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub codebase: Option<CodebaseTarget>,
    pub status: Option<TaskStatus>,
    pub session_id: Option<SessionId>,
    pub worker_id: Option<WorkerId>,
    pub limit: Option<usize>,
}

impl TaskFilter {
    sb_core::setters! {
        option {
            codebase: CodebaseTarget,
            status: TaskStatus,
            session_id: SessionId,
            worker_id: WorkerId,
            limit: usize,
        }
    }
}

/// Transactional persistence for every control-plane entity.
///
/// Contracts: mutations are durable before the call returns; listings are
/// ordered by priority (desc) then creation time (asc); a mutation whose
/// target is invisible under the scope affects zero rows and reports
/// `NotFound` rather than revealing the row exists.
#[async_trait]
pub trait Store: Send + Sync {
    // ── tenants ────────────────────────────────────────────────────────

    async fn upsert_tenant(&self, tenant: Tenant) -> Result<(), StoreError>;

    /// Tenant rows are control-plane metadata; lookups run unscoped.
    async fn get_tenant(&self, id: &TenantId) -> Result<Option<Tenant>, StoreError>;

    // ── codebases ──────────────────────────────────────────────────────

    async fn upsert_codebase(
        &self,
        scope: &TenantScope,
        codebase: Codebase,
    ) -> Result<(), StoreError>;

    async fn get_codebase(
        &self,
        scope: &TenantScope,
        id: &CodebaseId,
    ) -> Result<Option<Codebase>, StoreError>;

    /// Returns false when the codebase was not visible under the scope.
    async fn delete_codebase(
        &self,
        scope: &TenantScope,
        id: &CodebaseId,
    ) -> Result<bool, StoreError>;

    async fn list_codebases(&self, scope: &TenantScope) -> Result<Vec<Codebase>, StoreError>;

    // ── tasks ──────────────────────────────────────────────────────────

    async fn upsert_task(&self, scope: &TenantScope, task: Task) -> Result<(), StoreError>;

    async fn get_task(&self, scope: &TenantScope, id: &TaskId)
        -> Result<Option<Task>, StoreError>;

    async fn list_tasks(
        &self,
        scope: &TenantScope,
        filter: TaskFilter,
    ) -> Result<Vec<Task>, StoreError>;

    /// Single conditional write: succeeds iff the row is still claimable.
    async fn claim_task(
        &self,
        scope: &TenantScope,
        id: &TaskId,
        worker_id: &WorkerId,
        now_ms: u64,
    ) -> Result<ClaimOutcome, StoreError>;

    /// Idempotent `running` report; may attach the worker's session id.
    async fn mark_running(
        &self,
        scope: &TenantScope,
        id: &TaskId,
        worker_id: &WorkerId,
        session_id: Option<SessionId>,
        now_ms: u64,
    ) -> Result<UpdateOutcome, StoreError>;

    /// Terminal report, conditional on the worker id matching.
    async fn release_task(
        &self,
        scope: &TenantScope,
        release: TaskRelease,
        now_ms: u64,
    ) -> Result<UpdateOutcome, StoreError>;

    /// Client-side cancel (pre-claim only; claimed tasks report `Claimed`).
    async fn cancel_task(
        &self,
        scope: &TenantScope,
        id: &TaskId,
        now_ms: u64,
    ) -> Result<CancelOutcome, StoreError>;

    /// Crash recovery: reset a claimed task to `pending`, clearing its
    /// worker. Returns the reset task, or `None` when the condition
    /// (claimed by `worker_id`) no longer holds.
    async fn requeue_task(
        &self,
        scope: &TenantScope,
        id: &TaskId,
        worker_id: &WorkerId,
    ) -> Result<Option<Task>, StoreError>;

    /// Transition every non-terminal task of the session to `cancelled`
    /// with the given reason, exactly once. Returns the tasks that changed.
    async fn cancel_session_tasks(
        &self,
        scope: &TenantScope,
        session_id: &SessionId,
        reason: &str,
        now_ms: u64,
    ) -> Result<Vec<Task>, StoreError>;

    // ── workers ────────────────────────────────────────────────────────

    async fn upsert_worker(&self, scope: &TenantScope, worker: Worker) -> Result<(), StoreError>;

    async fn get_worker(
        &self,
        scope: &TenantScope,
        id: &WorkerId,
    ) -> Result<Option<Worker>, StoreError>;

    async fn list_workers(&self, scope: &TenantScope) -> Result<Vec<Worker>, StoreError>;

    async fn set_worker_liveness(
        &self,
        scope: &TenantScope,
        id: &WorkerId,
        status: WorkerStatus,
        now_ms: u64,
    ) -> Result<(), StoreError>;

    /// Replace the declared codebase set. Returns false when the worker is
    /// not visible under the scope.
    async fn set_worker_codebases(
        &self,
        scope: &TenantScope,
        id: &WorkerId,
        codebases: BTreeSet<String>,
    ) -> Result<bool, StoreError>;

    // ── sessions ───────────────────────────────────────────────────────

    async fn upsert_session(&self, scope: &TenantScope, session: Session)
        -> Result<(), StoreError>;

    async fn get_session(
        &self,
        scope: &TenantScope,
        id: &SessionId,
    ) -> Result<Option<Session>, StoreError>;

    /// Mark the session ended. Idempotent; returns the session when visible.
    async fn end_session(
        &self,
        scope: &TenantScope,
        id: &SessionId,
        now_ms: u64,
    ) -> Result<Option<Session>, StoreError>;

    /// The active session for a codebase, when session mode is in use.
    /// At most one exists per `(tenant, codebase)`.
    async fn active_session_for_codebase(
        &self,
        scope: &TenantScope,
        codebase_id: &CodebaseId,
    ) -> Result<Option<Session>, StoreError>;

    // ── cronjobs ───────────────────────────────────────────────────────

    async fn upsert_cronjob(&self, scope: &TenantScope, job: Cronjob) -> Result<(), StoreError>;

    async fn get_cronjob(
        &self,
        scope: &TenantScope,
        id: &CronjobId,
    ) -> Result<Option<Cronjob>, StoreError>;

    async fn delete_cronjob(
        &self,
        scope: &TenantScope,
        id: &CronjobId,
    ) -> Result<bool, StoreError>;

    async fn list_cronjobs(&self, scope: &TenantScope) -> Result<Vec<Cronjob>, StoreError>;

    async fn list_enabled_cronjobs(&self, scope: &TenantScope)
        -> Result<Vec<Cronjob>, StoreError>;
}
