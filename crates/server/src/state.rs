// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared request-handler state.
//!
//! All components are explicitly constructed and injected; there is no
//! process-wide singleton. Handlers derive the tenant scope from the
//! `X-Tenant-ID` header populated by the upstream auth middleware; absent
//! headers fall back to the configured default tenant, never to the
//! administrative scope.

use crate::env::Config;
use axum::http::HeaderMap;
use sb_core::SystemClock;
use sb_engine::{CronReconciler, SessionManager, TaskQueue, WorkerRegistry};
use sb_storage::{Store, TenantScope};
use std::sync::Arc;

/// Header carrying the authenticated tenant id.
pub const TENANT_HEADER: &str = "x-tenant-id";
/// Worker identity headers on worker-facing endpoints.
pub const WORKER_ID_HEADER: &str = "x-worker-id";
pub const WORKER_NAME_HEADER: &str = "x-agent-name";
pub const CAPABILITIES_HEADER: &str = "x-capabilities";
pub const CODEBASES_HEADER: &str = "x-codebases";
pub const PERSONALITY_HEADER: &str = "x-personality";
/// Shared-secret header on the internal cron trigger endpoint.
pub const CRON_SIGNATURE_HEADER: &str = "x-cron-signature";

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub queue: Arc<TaskQueue<SystemClock>>,
    pub registry: Arc<WorkerRegistry<SystemClock>>,
    pub sessions: Arc<SessionManager<SystemClock>>,
    pub cron: Arc<CronReconciler>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Tenant scope for a client request.
    pub fn scope(&self, headers: &HeaderMap) -> TenantScope {
        let tenant = headers
            .get(TENANT_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(&self.config.default_tenant);
        TenantScope::tenant(tenant)
    }
}

/// Read an optional string header.
pub fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim).filter(|v| !v.is_empty())
}

/// Parse a comma-separated header into a set.
pub fn header_list(headers: &HeaderMap, name: &str) -> std::collections::BTreeSet<String> {
    header_str(headers, name)
        .map(|raw| {
            raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect()
        })
        .unwrap_or_default()
}
