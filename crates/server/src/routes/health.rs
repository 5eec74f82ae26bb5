// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Health endpoint.

use crate::state::AppState;
use axum::extract::State;
use axum::Json;

pub async fn healthz(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "connected_workers": state.registry.connected_workers().len(),
        "events_enabled": state.config.events.enabled,
        "spawner_enabled": state.config.spawner.enabled,
        "cron_driver": state.config.cron_driver.to_string(),
    }))
}
