// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP request and response bodies.
//!
//! Task responses serialize the `sb_core::Task` entity directly; these
//! types cover the request side and the few composite responses.

use sb_core::Task;
use serde::{Deserialize, Serialize};

/// `POST /v1/tasks`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateTaskRequest {
    /// `null`/absent targets the global pool; `"global"` is accepted as an
    /// alias; `"__pending__"` targets the pending-registration pool.
    #[serde(default)]
    pub codebase_id: Option<String>,
    pub title: String,
    pub prompt: String,
    #[serde(default)]
    pub agent_type: Option<String>,
    /// File references, used for complexity inference only.
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub model_ref: Option<String>,
    #[serde(default)]
    pub worker_personality: Option<String>,
    #[serde(default)]
    pub target_agent_name: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

/// `POST /v1/worker/tasks/claim`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimTaskRequest {
    pub task_id: String,
}

/// `POST /v1/worker/tasks/release`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseTaskRequest {
    pub task_id: String,
    /// `completed`, `failed`, `cancelled`, or the idempotent `running`.
    pub status: String,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    /// Defaults to the `X-Worker-ID` header when absent.
    #[serde(default)]
    pub worker_id: Option<String>,
    #[serde(default)]
    pub model_used: Option<String>,
}

/// `PUT /v1/worker/codebases`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateCodebasesRequest {
    pub codebases: Vec<String>,
}

/// `POST /v1/worker/heartbeat`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HeartbeatRequest {
    #[serde(default)]
    pub worker_id: Option<String>,
}

/// `POST /v1/codebases`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterCodebaseRequest {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub agent_config: Option<serde_json::Value>,
}

/// `POST /v1/cronjobs`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCronjobRequest {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub cron_expression: String,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub task_template: Option<serde_json::Value>,
}

fn default_enabled() -> bool {
    true
}

/// `POST /v1/tasks/{id}/cancel`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelTaskResponse {
    /// `cancelled` for pre-claim cancels, `interrupt_requested` once a
    /// worker owns the task.
    pub status: String,
    pub task: Task,
}

/// `POST /v1/cronjobs/internal/{job_id}/trigger`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerCronResponse {
    pub task_id: String,
    pub routing: serde_json::Value,
}

/// Uniform error body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[cfg(test)]
#[path = "api_tests.rs"]
mod tests;
