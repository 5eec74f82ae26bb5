// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker-facing endpoints: the push stream and its short-lived
//! companions (claim, release, heartbeat, declared-codebase update).

use crate::error::ApiError;
use crate::state::{
    header_list, header_str, AppState, CAPABILITIES_HEADER, CODEBASES_HEADER,
    PERSONALITY_HEADER, WORKER_ID_HEADER, WORKER_NAME_HEADER,
};
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures_util::stream::Stream;
use sb_core::{Clock, SessionId, SystemClock, Task, TaskId, TaskStatus, Worker, WorkerId, WorkerStatus};
use sb_storage::{ClaimOutcome, TaskRelease, UpdateOutcome};
use sb_wire::{ClaimTaskRequest, HeartbeatRequest, ReleaseTaskRequest, UpdateCodebasesRequest};
use std::convert::Infallible;
use std::time::Duration;

/// Pull the worker identity out of the request headers.
fn worker_identity(state: &AppState, headers: &HeaderMap) -> Result<Worker, ApiError> {
    let worker_id = header_str(headers, WORKER_ID_HEADER)
        .ok_or_else(|| ApiError::BadRequest(format!("{WORKER_ID_HEADER} header required")))?;
    let scope = state.scope(headers);
    let tenant_id = match scope.tenant_id() {
        Some(tenant) => *tenant,
        None => return Err(ApiError::BadRequest("tenant scope required".to_string())),
    };
    Ok(Worker {
        id: WorkerId::new(worker_id),
        tenant_id,
        name: header_str(headers, WORKER_NAME_HEADER).unwrap_or(worker_id).to_string(),
        capabilities: header_list(headers, CAPABILITIES_HEADER),
        codebases: header_list(headers, CODEBASES_HEADER),
        models: Default::default(),
        personality: header_str(headers, PERSONALITY_HEADER).map(str::to_string),
        status: WorkerStatus::Online,
        last_seen_ms: SystemClock.epoch_ms(),
    })
}

fn require_worker_id(headers: &HeaderMap, body_worker: Option<&str>) -> Result<WorkerId, ApiError> {
    body_worker
        .or_else(|| header_str(headers, WORKER_ID_HEADER))
        .map(WorkerId::new)
        .ok_or_else(|| ApiError::BadRequest("worker id required".to_string()))
}

/// `GET /v1/worker/tasks/stream` — the long-lived push stream.
///
/// Registers the worker, upserts its row, and adapts the logical channel
/// into a server-sent event stream. Dropping the connection unregisters
/// the channel; tasks still assigned to the worker enter the liveness
/// countdown.
pub async fn task_stream(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let worker = worker_identity(&state, &headers)?;
    let scope = state.scope(&headers);
    state.store.upsert_worker(&scope, worker.clone()).await?;

    tracing::info!(worker_id = %worker.id, name = %worker.name, "worker stream opened");
    let channel = state.registry.register(worker);

    let stream = futures_util::stream::unfold(channel, |channel| async move {
        let frame = channel.next_frame().await?;
        let event = Event::default()
            .event(frame.event_name())
            .data(frame.payload().to_string());
        Some((Ok(event), channel))
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(10))))
}

/// `POST /v1/worker/tasks/claim` — atomic claim; 200/409/404.
pub async fn claim_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ClaimTaskRequest>,
) -> Result<Json<Task>, ApiError> {
    let worker_id = require_worker_id(&headers, None)?;
    let scope = state.scope(&headers);
    let task_id = TaskId::from_string(&request.task_id);
    match state.queue.claim_task(&scope, &task_id, &worker_id).await? {
        ClaimOutcome::Claimed(task) => Ok(Json(*task)),
        ClaimOutcome::AlreadyClaimed => Err(ApiError::Conflict(format!(
            "task {} already claimed",
            request.task_id
        ))),
        ClaimOutcome::NotFound => {
            Err(ApiError::NotFound(format!("task {} not found", request.task_id)))
        }
    }
}

/// `POST /v1/worker/tasks/release` — status report. `running` is the
/// idempotent in-progress report; terminal statuses release the task.
pub async fn release_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ReleaseTaskRequest>,
) -> Result<Json<Task>, ApiError> {
    let worker_id = require_worker_id(&headers, request.worker_id.as_deref())?;
    let scope = state.scope(&headers);
    let task_id = TaskId::from_string(&request.task_id);
    let status = TaskStatus::parse(&request.status)
        .ok_or_else(|| ApiError::BadRequest(format!("unknown status {:?}", request.status)))?;
    let session_id = request.session_id.as_deref().map(SessionId::from_string);

    let outcome = if status == TaskStatus::Running {
        state.queue.mark_running(&scope, &task_id, &worker_id, session_id).await?
    } else {
        state
            .queue
            .release_task(
                &scope,
                TaskRelease {
                    task_id,
                    worker_id,
                    status,
                    result: request.result,
                    error: request.error,
                    session_id,
                    model_used: request.model_used,
                },
            )
            .await?
    };

    match outcome {
        UpdateOutcome::Updated(task) | UpdateOutcome::Unchanged(task) => Ok(Json(*task)),
        UpdateOutcome::Conflict { reason } => Err(ApiError::Conflict(reason.to_string())),
        UpdateOutcome::NotFound => {
            Err(ApiError::NotFound(format!("task {} not found", request.task_id)))
        }
    }
}

/// `POST /v1/worker/heartbeat` — liveness signal outside the stream.
pub async fn heartbeat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<HeartbeatRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let worker_id = require_worker_id(&headers, request.worker_id.as_deref())?;
    let scope = state.scope(&headers);
    state
        .store
        .set_worker_liveness(&scope, &worker_id, WorkerStatus::Online, SystemClock.epoch_ms())
        .await?;
    Ok(Json(serde_json::json!({
        "ok": true,
        "connected": state.registry.is_connected(&worker_id),
    })))
}

/// `PUT /v1/worker/codebases` — replace the declared codebase set.
pub async fn update_codebases(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<UpdateCodebasesRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let worker_id = require_worker_id(&headers, None)?;
    let scope = state.scope(&headers);
    let codebases: std::collections::BTreeSet<String> =
        request.codebases.into_iter().collect();
    let updated = state
        .store
        .set_worker_codebases(&scope, &worker_id, codebases.clone())
        .await?;
    if !updated {
        return Err(ApiError::NotFound(format!("worker {worker_id} not registered")));
    }
    Ok(Json(serde_json::json!({"ok": true, "codebases": codebases})))
}
