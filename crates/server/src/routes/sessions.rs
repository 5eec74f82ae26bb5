// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session endpoints.

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use sb_core::{CodebaseId, SessionId};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    /// Caller-chosen id (DNS-label-safe when the spawner is enabled);
    /// generated when absent.
    #[serde(default)]
    pub session_id: Option<String>,
    pub codebase_id: String,
}

/// `POST /v1/sessions` — open a session and reconcile its worker.
pub async fn create_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let scope = state.scope(&headers);
    let tenant_id = match scope.tenant_id() {
        Some(tenant) => *tenant,
        None => return Err(ApiError::BadRequest("tenant scope required".to_string())),
    };
    let codebase_id = CodebaseId::from_string(&request.codebase_id);
    if state.store.get_codebase(&scope, &codebase_id).await?.is_none() {
        return Err(ApiError::NotFound(format!(
            "codebase {} not found",
            request.codebase_id
        )));
    }
    let session_id = request
        .session_id
        .map(SessionId::from_string)
        .unwrap_or_default();

    let (session, outcome) = state
        .sessions
        .create_session(&scope, session_id, tenant_id, codebase_id)
        .await?;
    let worker = match outcome {
        sb_adapters::SpawnOutcome::Disabled => serde_json::json!({"status": "disabled"}),
        sb_adapters::SpawnOutcome::Spawned(worker) => serde_json::json!({
            "status": "spawned",
            "service_name": worker.service_name,
            "url": worker.url,
        }),
    };
    Ok((StatusCode::CREATED, Json(serde_json::json!({"session": session, "worker": worker}))))
}

pub async fn end_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let scope = state.scope(&headers);
    let summary = state.sessions.end_session(&scope, &SessionId::from_string(&id)).await?;
    Ok(Json(serde_json::json!({
        "session": summary.session,
        "cancelled_tasks": summary.cancelled_tasks.iter().map(|t| t.id).collect::<Vec<_>>(),
        "worker_deleted": summary.worker_deleted,
    })))
}
