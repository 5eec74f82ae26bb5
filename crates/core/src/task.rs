// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task entity and state machine.
//!
//! Lifecycle: `pending → queued → assigned → running → (completed | failed
//! | cancelled)`. Cancellation is allowed from any pre-claim state; repeated
//! `running` reports and repeated identical terminal writes are absorbed
//! without mutating timestamps. Terminal states never transition.

use crate::codebase::CodebaseTarget;
use crate::metadata::TaskMetadata;
use crate::model::ModelRef;
use crate::session::SessionId;
use crate::tenant::TenantId;
use crate::worker::WorkerId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

crate::define_id! {
    /// Unique identifier for a task.
    ///
    /// Tasks are referenced by id across the queue, the push fabric, and
    /// the event bus; the id is minted once at creation and never reused.
    pub struct TaskId("tsk-");
}

/// Status of a task in the dispatch lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Created, waiting to be claimed via the push stream.
    Pending,
    /// Created, routed to the event fabric for a session worker.
    Queued,
    /// Claimed by a worker, not yet reported running.
    Assigned,
    /// Worker reported execution started.
    Running,
    Completed,
    Failed,
    Cancelled,
}

crate::simple_display! {
    TaskStatus {
        Pending => "pending",
        Queued => "queued",
        Assigned => "assigned",
        Running => "running",
        Completed => "completed",
        Failed => "failed",
        Cancelled => "cancelled",
    }
}

impl TaskStatus {
    /// Parse the lowercase wire/storage rendering.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(TaskStatus::Pending),
            "queued" => Some(TaskStatus::Queued),
            "assigned" => Some(TaskStatus::Assigned),
            "running" => Some(TaskStatus::Running),
            "completed" => Some(TaskStatus::Completed),
            "failed" => Some(TaskStatus::Failed),
            "cancelled" => Some(TaskStatus::Cancelled),
            _ => None,
        }
    }

    /// Terminal states never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled)
    }

    /// States in which a worker may still win the claim race.
    pub fn is_claimable(&self) -> bool {
        matches!(self, TaskStatus::Pending | TaskStatus::Queued)
    }

    /// True once a worker owns the task.
    pub fn is_claimed(&self) -> bool {
        matches!(self, TaskStatus::Assigned | TaskStatus::Running)
    }

    /// Whether `next` is a legal transition from this state.
    ///
    /// Repeated `running` writes are legal (idempotent); repeated identical
    /// terminal writes are handled by [`Task::apply_status`] as
    /// acknowledged no-ops rather than transitions.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        match (self, next) {
            (Pending, Queued) => true,
            (Pending | Queued, Assigned) => true,
            (Pending | Queued, Cancelled) => true,
            // Event-route tasks fail pre-claim when their sole delivery
            // route is exhausted.
            (Queued, Failed) => true,
            (Assigned, Running) => true,
            (Running, Running) => true,
            (Assigned | Running, Completed | Failed | Cancelled) => true,
            _ => false,
        }
    }
}

/// Attempted transition that the state machine forbids.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("illegal task transition {from} → {to}")]
pub struct InvalidTransition {
    pub from: TaskStatus,
    pub to: TaskStatus,
}

/// A unit of work: a prompt plus routing metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub tenant_id: TenantId,
    #[serde(rename = "codebase_id")]
    pub codebase: CodebaseTarget,
    pub title: String,
    pub prompt: String,
    pub agent_type: String,
    /// Higher is more urgent.
    pub priority: i32,
    /// Requested model in wire form, as handed to the worker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Requested model reference (canonical `provider:model`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_ref: Option<ModelRef>,
    /// Model the worker actually used, reported on release.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_used: Option<String>,
    /// When set, only this agent may claim the task.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_agent_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_personality: Option<String>,
    #[serde(default)]
    pub required_capabilities: Vec<String>,
    pub status: TaskStatus,
    /// Set iff the task has been claimed (and kept through terminal states).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_id: Option<WorkerId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub metadata: TaskMetadata,
    pub created_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at_ms: Option<u64>,
}

impl Task {
    /// Materialize a task from a draft. The typed model reference is
    /// filled in by the queue once routing has resolved it.
    pub fn from_draft(draft: TaskDraft, now_ms: u64) -> Self {
        Self {
            id: draft.id,
            tenant_id: draft.tenant_id,
            codebase: draft.codebase,
            title: draft.title,
            prompt: draft.prompt,
            agent_type: draft.agent_type,
            priority: draft.priority,
            model: draft.model,
            model_ref: None,
            model_used: None,
            target_agent_name: draft.target_agent_name,
            worker_personality: draft.worker_personality,
            required_capabilities: draft.required_capabilities,
            status: TaskStatus::Pending,
            worker_id: None,
            session_id: draft.session_id,
            result: None,
            error: None,
            metadata: draft.metadata,
            created_at_ms: now_ms,
            started_at_ms: None,
            completed_at_ms: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Apply a status transition, enforcing the state machine.
    ///
    /// Returns `Ok(true)` when the task changed, `Ok(false)` for absorbed
    /// idempotent rewrites (repeated `running`, repeated identical terminal
    /// status). Timestamps are set once and never reset.
    pub fn apply_status(
        &mut self,
        next: TaskStatus,
        now_ms: u64,
    ) -> Result<bool, InvalidTransition> {
        if self.status == next && (next.is_terminal() || next == TaskStatus::Running) {
            return Ok(false);
        }
        if !self.status.can_transition_to(next) {
            return Err(InvalidTransition { from: self.status, to: next });
        }
        self.status = next;
        match next {
            TaskStatus::Running => {
                if self.started_at_ms.is_none() {
                    self.started_at_ms = Some(now_ms);
                }
            }
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled => {
                if self.completed_at_ms.is_none() {
                    self.completed_at_ms = Some(now_ms);
                }
            }
            _ => {}
        }
        Ok(true)
    }

    /// Crash-recovery reset: back to `pending` with the worker cleared.
    ///
    /// This deliberately steps outside the forward-only state machine; it is
    /// only reachable from the liveness reaper for `assigned`/`running`
    /// tasks whose worker disappeared.
    pub fn reset_for_requeue(&mut self) {
        self.status = TaskStatus::Pending;
        self.worker_id = None;
        self.started_at_ms = None;
    }
}

/// Inputs for creating a task, before routing.
///
/// `files` feed complexity inference only and are not persisted. `model`
/// and `model_ref` carry the raw request strings; the routing policy
/// resolves them into the task's typed reference.
#[derive(Debug, Clone)]
pub struct TaskDraft {
    pub id: TaskId,
    pub tenant_id: TenantId,
    pub codebase: CodebaseTarget,
    pub title: String,
    pub prompt: String,
    pub agent_type: String,
    pub priority: i32,
    pub files: Vec<String>,
    pub model: Option<String>,
    pub model_ref: Option<String>,
    pub target_agent_name: Option<String>,
    pub worker_personality: Option<String>,
    pub required_capabilities: Vec<String>,
    pub session_id: Option<SessionId>,
    pub metadata: TaskMetadata,
}

impl TaskDraft {
    pub fn new(tenant_id: impl Into<TenantId>, title: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            id: TaskId::new(),
            tenant_id: tenant_id.into(),
            codebase: CodebaseTarget::Global,
            title: title.into(),
            prompt: prompt.into(),
            agent_type: "build".to_string(),
            priority: 0,
            files: Vec::new(),
            model: None,
            model_ref: None,
            target_agent_name: None,
            worker_personality: None,
            required_capabilities: Vec::new(),
            session_id: None,
            metadata: TaskMetadata::default(),
        }
    }

    crate::setters! {
        into {
            codebase: CodebaseTarget,
            agent_type: String,
        }
        set {
            priority: i32,
            files: Vec<String>,
            required_capabilities: Vec<String>,
            metadata: TaskMetadata,
        }
        option {
            model: String,
            model_ref: String,
            target_agent_name: String,
            worker_personality: String,
            session_id: SessionId,
        }
    }
}

crate::builder! {
    pub struct TaskBuilder => Task {
        into {
            id: TaskId = "tsk-test",
            tenant_id: TenantId = "tnt-test",
            title: String = "test task",
            prompt: String = "do the thing",
            agent_type: String = "build",
        }
        set {
            codebase: CodebaseTarget = CodebaseTarget::Global,
            priority: i32 = 0,
            required_capabilities: Vec<String> = Vec::new(),
            status: TaskStatus = TaskStatus::Pending,
            metadata: TaskMetadata = TaskMetadata::default(),
            created_at_ms: u64 = 0,
        }
        option {
            model: String = None,
            model_ref: ModelRef = None,
            model_used: String = None,
            target_agent_name: String = None,
            worker_personality: String = None,
            worker_id: WorkerId = None,
            session_id: SessionId = None,
            result: String = None,
            error: String = None,
            started_at_ms: u64 = None,
            completed_at_ms: u64 = None,
        }
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
