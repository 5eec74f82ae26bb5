// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory store.
//!
//! Used for local development (no `SB_DATABASE_URL`) and throughout the
//! test suites. Honors the same scope-visibility contract as the Postgres
//! store: a mutation whose target belongs to another tenant affects zero
//! rows and reports `NotFound`.

use crate::error::StoreError;
use crate::scope::TenantScope;
use crate::store::{
    CancelOutcome, ClaimOutcome, Store, TaskFilter, TaskRelease, UpdateOutcome,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use sb_core::{
    Codebase, CodebaseId, Cronjob, CronjobId, Session, SessionId, SessionStatus, Task, TaskId,
    TaskStatus, Tenant, TenantId, Worker, WorkerId, WorkerStatus,
};
use std::cmp::Reverse;
use std::collections::{BTreeSet, HashMap};

#[derive(Default)]
struct Inner {
    tenants: HashMap<TenantId, Tenant>,
    codebases: HashMap<CodebaseId, Codebase>,
    tasks: HashMap<TaskId, Task>,
    workers: HashMap<WorkerId, Worker>,
    sessions: HashMap<SessionId, Session>,
    cronjobs: HashMap<CronjobId, Cronjob>,
}

/// In-memory implementation of [`Store`].
#[derive(Default)]
pub struct MemStore {
    inner: Mutex<Inner>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sort_tasks(tasks: &mut Vec<Task>) {
    tasks.sort_by_key(|t| (Reverse(t.priority), t.created_at_ms));
}

#[async_trait]
impl Store for MemStore {
    async fn upsert_tenant(&self, tenant: Tenant) -> Result<(), StoreError> {
        self.inner.lock().tenants.insert(tenant.id, tenant);
        Ok(())
    }

    async fn get_tenant(&self, id: &TenantId) -> Result<Option<Tenant>, StoreError> {
        Ok(self.inner.lock().tenants.get(id).cloned())
    }

    async fn upsert_codebase(
        &self,
        scope: &TenantScope,
        codebase: Codebase,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if let Some(existing) = inner.codebases.get(&codebase.id) {
            if !scope.can_see(&existing.tenant_id) {
                return Ok(());
            }
        }
        inner.codebases.insert(codebase.id, codebase);
        Ok(())
    }

    async fn get_codebase(
        &self,
        scope: &TenantScope,
        id: &CodebaseId,
    ) -> Result<Option<Codebase>, StoreError> {
        let inner = self.inner.lock();
        Ok(inner.codebases.get(id).filter(|c| scope.can_see(&c.tenant_id)).cloned())
    }

    async fn delete_codebase(
        &self,
        scope: &TenantScope,
        id: &CodebaseId,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock();
        let visible =
            inner.codebases.get(id).map(|c| scope.can_see(&c.tenant_id)).unwrap_or(false);
        if visible {
            inner.codebases.remove(id);
        }
        Ok(visible)
    }

    async fn list_codebases(&self, scope: &TenantScope) -> Result<Vec<Codebase>, StoreError> {
        let inner = self.inner.lock();
        let mut codebases: Vec<Codebase> =
            inner.codebases.values().filter(|c| scope.can_see(&c.tenant_id)).cloned().collect();
        codebases.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(codebases)
    }

    async fn upsert_task(&self, scope: &TenantScope, task: Task) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if let Some(existing) = inner.tasks.get(&task.id) {
            if !scope.can_see(&existing.tenant_id) {
                return Ok(());
            }
        }
        inner.tasks.insert(task.id, task);
        Ok(())
    }

    async fn get_task(
        &self,
        scope: &TenantScope,
        id: &TaskId,
    ) -> Result<Option<Task>, StoreError> {
        let inner = self.inner.lock();
        Ok(inner.tasks.get(id).filter(|t| scope.can_see(&t.tenant_id)).cloned())
    }

    async fn list_tasks(
        &self,
        scope: &TenantScope,
        filter: TaskFilter,
    ) -> Result<Vec<Task>, StoreError> {
        let inner = self.inner.lock();
        let mut tasks: Vec<Task> = inner
            .tasks
            .values()
            .filter(|t| scope.can_see(&t.tenant_id))
            .filter(|t| filter.codebase.as_ref().is_none_or(|c| &t.codebase == c))
            .filter(|t| filter.status.is_none_or(|s| t.status == s))
            .filter(|t| filter.session_id.as_ref().is_none_or(|s| t.session_id.as_ref() == Some(s)))
            .filter(|t| filter.worker_id.as_ref().is_none_or(|w| t.worker_id.as_ref() == Some(w)))
            .cloned()
            .collect();
        sort_tasks(&mut tasks);
        if let Some(limit) = filter.limit {
            tasks.truncate(limit);
        }
        Ok(tasks)
    }

    async fn claim_task(
        &self,
        scope: &TenantScope,
        id: &TaskId,
        worker_id: &WorkerId,
        now_ms: u64,
    ) -> Result<ClaimOutcome, StoreError> {
        let mut inner = self.inner.lock();
        let Some(task) = inner.tasks.get_mut(id).filter(|t| scope.can_see(&t.tenant_id)) else {
            return Ok(ClaimOutcome::NotFound);
        };
        if !task.status.is_claimable() {
            return Ok(ClaimOutcome::AlreadyClaimed);
        }
        task.apply_status(TaskStatus::Assigned, now_ms)?;
        task.worker_id = Some(worker_id.clone());
        Ok(ClaimOutcome::Claimed(Box::new(task.clone())))
    }

    async fn mark_running(
        &self,
        scope: &TenantScope,
        id: &TaskId,
        worker_id: &WorkerId,
        session_id: Option<SessionId>,
        now_ms: u64,
    ) -> Result<UpdateOutcome, StoreError> {
        let mut inner = self.inner.lock();
        let Some(task) = inner.tasks.get_mut(id).filter(|t| scope.can_see(&t.tenant_id)) else {
            return Ok(UpdateOutcome::NotFound);
        };
        if task.worker_id.as_ref() != Some(worker_id) {
            return Ok(UpdateOutcome::Conflict { reason: "worker id does not match claim" });
        }
        if task.status.is_terminal() {
            return Ok(UpdateOutcome::Conflict { reason: "task is terminal" });
        }
        let mut changed = task.apply_status(TaskStatus::Running, now_ms)?;
        if let Some(session_id) = session_id {
            if task.session_id != Some(session_id) {
                task.session_id = Some(session_id);
                changed = true;
            }
        }
        let snapshot = Box::new(task.clone());
        Ok(if changed {
            UpdateOutcome::Updated(snapshot)
        } else {
            UpdateOutcome::Unchanged(snapshot)
        })
    }

    async fn release_task(
        &self,
        scope: &TenantScope,
        release: TaskRelease,
        now_ms: u64,
    ) -> Result<UpdateOutcome, StoreError> {
        let mut inner = self.inner.lock();
        let Some(task) =
            inner.tasks.get_mut(&release.task_id).filter(|t| scope.can_see(&t.tenant_id))
        else {
            return Ok(UpdateOutcome::NotFound);
        };
        if task.worker_id.as_ref() != Some(&release.worker_id) {
            return Ok(UpdateOutcome::Conflict { reason: "worker id does not match claim" });
        }
        if task.status.is_terminal() {
            return Ok(if task.status == release.status {
                UpdateOutcome::Unchanged(Box::new(task.clone()))
            } else {
                UpdateOutcome::Conflict { reason: "task is terminal" }
            });
        }
        task.apply_status(release.status, now_ms)?;
        if release.result.is_some() {
            task.result = release.result;
        }
        if release.error.is_some() {
            task.error = release.error;
        }
        if release.model_used.is_some() {
            task.model_used = release.model_used;
        }
        if let Some(session_id) = release.session_id {
            task.session_id = Some(session_id);
        }
        Ok(UpdateOutcome::Updated(Box::new(task.clone())))
    }

    async fn cancel_task(
        &self,
        scope: &TenantScope,
        id: &TaskId,
        now_ms: u64,
    ) -> Result<CancelOutcome, StoreError> {
        let mut inner = self.inner.lock();
        let Some(task) = inner.tasks.get_mut(id).filter(|t| scope.can_see(&t.tenant_id)) else {
            return Ok(CancelOutcome::NotFound);
        };
        if task.status.is_terminal() {
            return Ok(CancelOutcome::Terminal(Box::new(task.clone())));
        }
        if task.status.is_claimed() {
            return Ok(CancelOutcome::Claimed(Box::new(task.clone())));
        }
        task.apply_status(TaskStatus::Cancelled, now_ms)?;
        Ok(CancelOutcome::Cancelled(Box::new(task.clone())))
    }

    async fn requeue_task(
        &self,
        scope: &TenantScope,
        id: &TaskId,
        worker_id: &WorkerId,
    ) -> Result<Option<Task>, StoreError> {
        let mut inner = self.inner.lock();
        let Some(task) = inner.tasks.get_mut(id).filter(|t| scope.can_see(&t.tenant_id)) else {
            return Ok(None);
        };
        if !task.status.is_claimed() || task.worker_id.as_ref() != Some(worker_id) {
            return Ok(None);
        }
        task.reset_for_requeue();
        Ok(Some(task.clone()))
    }

    async fn cancel_session_tasks(
        &self,
        scope: &TenantScope,
        session_id: &SessionId,
        reason: &str,
        now_ms: u64,
    ) -> Result<Vec<Task>, StoreError> {
        let mut inner = self.inner.lock();
        let mut cancelled = Vec::new();
        for task in inner.tasks.values_mut() {
            if !scope.can_see(&task.tenant_id)
                || task.session_id.as_ref() != Some(session_id)
                || task.status.is_terminal()
            {
                continue;
            }
            task.apply_status(TaskStatus::Cancelled, now_ms)?;
            task.error = Some(reason.to_string());
            cancelled.push(task.clone());
        }
        sort_tasks(&mut cancelled);
        Ok(cancelled)
    }

    async fn upsert_worker(&self, scope: &TenantScope, worker: Worker) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if let Some(existing) = inner.workers.get(&worker.id) {
            if !scope.can_see(&existing.tenant_id) {
                return Ok(());
            }
        }
        inner.workers.insert(worker.id.clone(), worker);
        Ok(())
    }

    async fn get_worker(
        &self,
        scope: &TenantScope,
        id: &WorkerId,
    ) -> Result<Option<Worker>, StoreError> {
        let inner = self.inner.lock();
        Ok(inner.workers.get(id).filter(|w| scope.can_see(&w.tenant_id)).cloned())
    }

    async fn list_workers(&self, scope: &TenantScope) -> Result<Vec<Worker>, StoreError> {
        let inner = self.inner.lock();
        let mut workers: Vec<Worker> =
            inner.workers.values().filter(|w| scope.can_see(&w.tenant_id)).cloned().collect();
        workers.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        Ok(workers)
    }

    async fn set_worker_liveness(
        &self,
        scope: &TenantScope,
        id: &WorkerId,
        status: WorkerStatus,
        now_ms: u64,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if let Some(worker) = inner.workers.get_mut(id).filter(|w| scope.can_see(&w.tenant_id)) {
            worker.status = status;
            worker.last_seen_ms = now_ms;
        }
        Ok(())
    }

    async fn set_worker_codebases(
        &self,
        scope: &TenantScope,
        id: &WorkerId,
        codebases: BTreeSet<String>,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock();
        match inner.workers.get_mut(id).filter(|w| scope.can_see(&w.tenant_id)) {
            Some(worker) => {
                worker.codebases = codebases;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn upsert_session(
        &self,
        scope: &TenantScope,
        session: Session,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if let Some(existing) = inner.sessions.get(&session.id) {
            if !scope.can_see(&existing.tenant_id) {
                return Ok(());
            }
        }
        inner.sessions.insert(session.id, session);
        Ok(())
    }

    async fn get_session(
        &self,
        scope: &TenantScope,
        id: &SessionId,
    ) -> Result<Option<Session>, StoreError> {
        let inner = self.inner.lock();
        Ok(inner.sessions.get(id).filter(|s| scope.can_see(&s.tenant_id)).cloned())
    }

    async fn end_session(
        &self,
        scope: &TenantScope,
        id: &SessionId,
        now_ms: u64,
    ) -> Result<Option<Session>, StoreError> {
        let mut inner = self.inner.lock();
        let Some(session) = inner.sessions.get_mut(id).filter(|s| scope.can_see(&s.tenant_id))
        else {
            return Ok(None);
        };
        if session.status == SessionStatus::Active {
            session.status = SessionStatus::Ended;
            session.ended_at_ms = Some(now_ms);
        }
        Ok(Some(session.clone()))
    }

    async fn active_session_for_codebase(
        &self,
        scope: &TenantScope,
        codebase_id: &CodebaseId,
    ) -> Result<Option<Session>, StoreError> {
        let inner = self.inner.lock();
        Ok(inner
            .sessions
            .values()
            .find(|s| {
                scope.can_see(&s.tenant_id)
                    && s.codebase_id == *codebase_id
                    && s.status == SessionStatus::Active
            })
            .cloned())
    }

    async fn upsert_cronjob(&self, scope: &TenantScope, job: Cronjob) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if let Some(existing) = inner.cronjobs.get(&job.id) {
            if !scope.can_see(&existing.tenant_id) {
                return Ok(());
            }
        }
        inner.cronjobs.insert(job.id, job);
        Ok(())
    }

    async fn get_cronjob(
        &self,
        scope: &TenantScope,
        id: &CronjobId,
    ) -> Result<Option<Cronjob>, StoreError> {
        let inner = self.inner.lock();
        Ok(inner.cronjobs.get(id).filter(|j| scope.can_see(&j.tenant_id)).cloned())
    }

    async fn delete_cronjob(
        &self,
        scope: &TenantScope,
        id: &CronjobId,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock();
        let visible =
            inner.cronjobs.get(id).map(|j| scope.can_see(&j.tenant_id)).unwrap_or(false);
        if visible {
            inner.cronjobs.remove(id);
        }
        Ok(visible)
    }

    async fn list_cronjobs(&self, scope: &TenantScope) -> Result<Vec<Cronjob>, StoreError> {
        let inner = self.inner.lock();
        let mut jobs: Vec<Cronjob> =
            inner.cronjobs.values().filter(|j| scope.can_see(&j.tenant_id)).cloned().collect();
        jobs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(jobs)
    }

    async fn list_enabled_cronjobs(
        &self,
        scope: &TenantScope,
    ) -> Result<Vec<Cronjob>, StoreError> {
        let mut jobs = self.list_cronjobs(scope).await?;
        jobs.retain(|j| j.enabled);
        Ok(jobs)
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
