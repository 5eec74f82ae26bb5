// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client-facing task endpoints.

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use sb_core::{CodebaseTarget, SessionId, Task, TaskDraft, TaskId, TaskMetadata, TaskStatus};
use sb_storage::{CancelOutcome, TaskFilter};
use sb_wire::{CancelTaskResponse, CreateTaskRequest};
use serde::Deserialize;

pub async fn create_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<Task>), ApiError> {
    if request.title.trim().is_empty() {
        return Err(ApiError::BadRequest("title must not be empty".to_string()));
    }
    if request.prompt.trim().is_empty() {
        return Err(ApiError::BadRequest("prompt must not be empty".to_string()));
    }

    let scope = state.scope(&headers);
    let tenant_id = match scope.tenant_id() {
        Some(tenant) => *tenant,
        None => return Err(ApiError::BadRequest("tenant scope required".to_string())),
    };

    let metadata = request
        .metadata
        .map(TaskMetadata::from_value)
        .unwrap_or_default();

    let mut draft = TaskDraft::new(tenant_id, request.title, request.prompt)
        .codebase(CodebaseTarget::from_wire(request.codebase_id.as_deref()))
        .agent_type(request.agent_type.unwrap_or_else(|| "build".to_string()))
        .priority(request.priority)
        .files(request.files)
        .metadata(metadata);
    if let Some(model) = request.model {
        draft = draft.model(model);
    }
    if let Some(model_ref) = request.model_ref {
        draft = draft.model_ref(model_ref);
    }
    if let Some(personality) = request.worker_personality {
        draft = draft.worker_personality(personality);
    }
    if let Some(target) = request.target_agent_name {
        draft = draft.target_agent_name(target);
    }
    if let Some(session_id) = request.session_id {
        draft = draft.session_id(SessionId::from_string(session_id));
    }

    let task = state.queue.create_task(&scope, draft).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

#[derive(Debug, Default, Deserialize)]
pub struct ListTasksQuery {
    #[serde(default)]
    pub codebase_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    100
}

pub async fn list_tasks(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListTasksQuery>,
) -> Result<Json<Vec<Task>>, ApiError> {
    let scope = state.scope(&headers);
    let mut filter = TaskFilter::default().limit(query.limit);
    if let Some(codebase_id) = &query.codebase_id {
        filter = filter.codebase(CodebaseTarget::from_wire(Some(codebase_id)));
    }
    if let Some(raw) = &query.status {
        let status = TaskStatus::parse(raw)
            .ok_or_else(|| ApiError::BadRequest(format!("unknown status {raw:?}")))?;
        filter = filter.status(status);
    }
    if let Some(session_id) = &query.session_id {
        filter = filter.session_id(SessionId::from_string(session_id));
    }
    let tasks = state.queue.list_tasks(&scope, filter).await?;
    Ok(Json(tasks))
}

pub async fn get_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Task>, ApiError> {
    let scope = state.scope(&headers);
    let task = state
        .queue
        .get_task(&scope, &TaskId::from_string(&id))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("task {id} not found")))?;
    Ok(Json(task))
}

pub async fn cancel_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<CancelTaskResponse>, ApiError> {
    let scope = state.scope(&headers);
    let outcome = state.queue.cancel_task(&scope, &TaskId::from_string(&id)).await?;
    match outcome {
        CancelOutcome::Cancelled(task) => Ok(Json(CancelTaskResponse {
            status: "cancelled".to_string(),
            task: *task,
        })),
        CancelOutcome::Claimed(task) => Ok(Json(CancelTaskResponse {
            status: "interrupt_requested".to_string(),
            task: *task,
        })),
        CancelOutcome::Terminal(task) => Err(ApiError::Conflict(format!(
            "task {id} is already {}",
            task.status
        ))),
        CancelOutcome::NotFound => Err(ApiError::NotFound(format!("task {id} not found"))),
    }
}
