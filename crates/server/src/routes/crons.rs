// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cronjob endpoints, including the internal trigger callback.

use crate::error::ApiError;
use crate::state::{header_str, AppState, CRON_SIGNATURE_HEADER};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use sb_core::{Clock, Cronjob, CronjobId, SystemClock, TaskTemplate};
use sb_engine::{CronDriver, TriggerMode};
use sb_wire::{CreateCronjobRequest, TriggerCronResponse};

pub async fn create_cronjob(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateCronjobRequest>,
) -> Result<(StatusCode, Json<Cronjob>), ApiError> {
    if request.name.trim().is_empty() || request.cron_expression.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "name and cron_expression must not be empty".to_string(),
        ));
    }
    let scope = state.scope(&headers);
    let tenant_id = match scope.tenant_id() {
        Some(tenant) => *tenant,
        None => return Err(ApiError::BadRequest("tenant scope required".to_string())),
    };
    let task_template: TaskTemplate = request
        .task_template
        .map(serde_json::from_value)
        .transpose()
        .map_err(|e| ApiError::BadRequest(format!("invalid task_template: {e}")))?
        .unwrap_or_default();

    let job = Cronjob {
        id: request.id.map(CronjobId::from_string).unwrap_or_default(),
        tenant_id,
        name: request.name,
        cron_expression: request.cron_expression,
        timezone: request.timezone,
        enabled: request.enabled,
        task_template,
        created_at_ms: SystemClock.epoch_ms(),
    };
    state.store.upsert_cronjob(&scope, job.clone()).await?;

    // Every enabled cronjob must have a matching external schedule; in the
    // knative driver the resource is reconciled inline so drift is visible
    // to the caller.
    if state.cron.driver() == CronDriver::Knative {
        state.cron.reconcile_cronjob(&job).await?;
    }
    tracing::info!(job_id = %job.id, name = %job.name, "cronjob registered");
    Ok((StatusCode::CREATED, Json(job)))
}

pub async fn list_cronjobs(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Cronjob>>, ApiError> {
    let scope = state.scope(&headers);
    Ok(Json(state.store.list_cronjobs(&scope).await?))
}

pub async fn delete_cronjob(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let scope = state.scope(&headers);
    let job_id = CronjobId::from_string(&id);
    let deleted = state.store.delete_cronjob(&scope, &job_id).await?;
    if !deleted {
        return Err(ApiError::NotFound(format!("cronjob {id} not found")));
    }
    if state.cron.driver() == CronDriver::Knative {
        if let Err(err) = state.cron.delete_cronjob(&job_id, None).await {
            tracing::warn!(%job_id, error = %err, "external cronjob delete failed");
        }
    }
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /v1/cronjobs/internal/{job_id}/trigger` — callback from the
/// external scheduler. Guarded by the shared-secret signature header;
/// rejected with 401 otherwise.
pub async fn internal_trigger(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(job_id): Path<String>,
) -> Result<Json<TriggerCronResponse>, ApiError> {
    let expected = &state.config.cron.internal_token;
    if expected.is_empty() {
        return Err(ApiError::Unauthorized(
            "internal trigger is not configured".to_string(),
        ));
    }
    let provided = header_str(&headers, CRON_SIGNATURE_HEADER).unwrap_or_default();
    if !constant_time_eq(provided.as_bytes(), expected.as_bytes()) {
        tracing::warn!(%job_id, "internal trigger rejected: bad signature");
        return Err(ApiError::Unauthorized("invalid cron signature".to_string()));
    }

    let (task, decision) = state
        .cron
        .dispatch(&state.queue, &CronjobId::from_string(&job_id), TriggerMode::Scheduled)
        .await?;

    Ok(Json(TriggerCronResponse {
        task_id: task.id.to_string(),
        routing: serde_json::json!({
            "complexity": decision.complexity,
            "model_tier": decision.model_tier,
            "model_ref": decision.model_ref,
            "target_agent_name": decision.target_agent_name,
            "worker_personality": decision.worker_personality,
        }),
    }))
}

/// Length-constant comparison for the shared secret.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
