// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Codebase registration endpoints.

use crate::error::ApiError;
use crate::state::{header_str, AppState, WORKER_ID_HEADER};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use sb_core::{Clock, Codebase, CodebaseId, CodebaseStatus, SystemClock, WorkerId};
use sb_wire::RegisterCodebaseRequest;

pub async fn register_codebase(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<RegisterCodebaseRequest>,
) -> Result<(StatusCode, Json<Codebase>), ApiError> {
    if request.name.trim().is_empty() || request.path.trim().is_empty() {
        return Err(ApiError::BadRequest("name and path must not be empty".to_string()));
    }
    let scope = state.scope(&headers);
    let tenant_id = match scope.tenant_id() {
        Some(tenant) => *tenant,
        None => return Err(ApiError::BadRequest("tenant scope required".to_string())),
    };

    let codebase = Codebase {
        id: request.id.map(CodebaseId::from_string).unwrap_or_default(),
        tenant_id,
        name: request.name,
        path: request.path,
        description: request.description.unwrap_or_default(),
        worker_id: header_str(&headers, WORKER_ID_HEADER).map(WorkerId::new),
        status: CodebaseStatus::Idle,
        agent_config: request
            .agent_config
            .and_then(|v| v.as_object().cloned())
            .unwrap_or_default(),
        registered_at_ms: SystemClock.epoch_ms(),
        last_triggered_ms: None,
    };
    state.store.upsert_codebase(&scope, codebase.clone()).await?;
    tracing::info!(codebase_id = %codebase.id, name = %codebase.name, "codebase registered");
    Ok((StatusCode::CREATED, Json(codebase)))
}

pub async fn list_codebases(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Codebase>>, ApiError> {
    let scope = state.scope(&headers);
    Ok(Json(state.store.list_codebases(&scope).await?))
}

pub async fn delete_codebase(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let scope = state.scope(&headers);
    let deleted = state.store.delete_codebase(&scope, &CodebaseId::from_string(&id)).await?;
    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("codebase {id} not found")))
    }
}
