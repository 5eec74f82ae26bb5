// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Model-resolution configuration echo.
//!
//! Workers call this to learn the selector table and the control plane's
//! resolver hints (subcall ref, fallback chain) without shipping the
//! configuration out of band.

use crate::state::AppState;
use axum::extract::State;
use axum::Json;

pub async fn list_models(State(state): State<AppState>) -> Json<serde_json::Value> {
    let routing = &state.config.routing;
    Json(serde_json::json!({
        "selectors": routing.selectors,
        "auto_model": routing.auto_model,
        "tier_models": {
            "fast": routing.model_fast,
            "balanced": routing.model_balanced,
            "heavy": routing.model_heavy,
        },
        "subcall_model_ref": state.config.subcall_model_ref,
        "fallback_chain": state.config.model_fallback_chain,
        "controller_fallback_allowed": state.config.controller_fallback_allowed,
    }))
}
