// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-session worker spawner.
//!
//! Reconciles "one external worker per session" intent against the
//! orchestrator: each session gets a Knative Service running the worker
//! container plus a Trigger routing its events, both rendered from
//! templates stored in a ConfigMap. Services scale to zero when idle and
//! are garbage-collected after a maximum age.

use crate::cluster::{api_status, dynamic_api, is_dns_label_safe};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::{Api, DeleteParams, DynamicObject, ListParams, PostParams};
use kube::Client;
use std::collections::HashMap;
use thiserror::Error;

const SERVICE_GROUP: &str = "serving.knative.dev";
const EVENTING_GROUP: &str = "eventing.knative.dev";
const SERVICE_TEMPLATE: &str = "service-template.yaml";
const TRIGGER_TEMPLATE: &str = "trigger-template.yaml";

/// Label keys stamped on spawned resources.
pub const SESSION_LABEL: &str = "switchboard.dev/session";
pub const TENANT_LABEL: &str = "switchboard.dev/tenant";
pub const CODEBASE_LABEL: &str = "switchboard.dev/codebase";

#[derive(Debug, Error)]
pub enum SpawnError {
    /// The template ConfigMap is missing or empty. Fatal.
    #[error("template configmap unavailable: {0}")]
    ConfigMissing(String),

    /// Template rendering or parsing failed. Fatal.
    #[error("template error: {0}")]
    Template(String),

    /// Identifier not safe for manifest substitution.
    #[error("invalid session id {0:?}: must be a lowercase DNS label")]
    InvalidSessionId(String),

    /// The orchestrator denied the request. Fatal.
    #[error("orchestrator forbade the operation: {0}")]
    Forbidden(String),

    /// Transient orchestrator failure; safe to retry.
    #[error("orchestrator error: {0}")]
    Api(String),
}

fn classify(err: kube::Error) -> SpawnError {
    match api_status(&err) {
        Some(403) => SpawnError::Forbidden(err.to_string()),
        _ => SpawnError::Api(err.to_string()),
    }
}

/// Observed state of a session worker service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionWorkerState {
    Pending,
    Creating,
    Ready,
    Running,
    ScaledToZero,
    Failed,
    NotFound,
}

sb_core::simple_display! {
    SessionWorkerState {
        Pending => "pending",
        Creating => "creating",
        Ready => "ready",
        Running => "running",
        ScaledToZero => "scaled_to_zero",
        Failed => "failed",
        NotFound => "not_found",
    }
}

/// Status snapshot for one session worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionWorkerInfo {
    pub session_id: String,
    pub tenant_id: String,
    pub codebase_id: String,
    pub state: SessionWorkerState,
    pub url: Option<String>,
    pub created_at_ms: Option<u64>,
    pub error: Option<String>,
}

impl SessionWorkerInfo {
    fn absent(session_id: &str, state: SessionWorkerState, error: Option<String>) -> Self {
        Self {
            session_id: session_id.to_string(),
            tenant_id: String::new(),
            codebase_id: String::new(),
            state,
            url: None,
            created_at_ms: None,
            error,
        }
    }
}

/// A successfully provisioned session worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnedWorker {
    pub session_id: String,
    pub service_name: String,
    pub trigger_name: String,
    pub url: Option<String>,
}

/// Result of a spawn request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpawnOutcome {
    /// The feature flag is off; nothing was created.
    Disabled,
    Spawned(SpawnedWorker),
}

/// Garbage-collection statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupStats {
    pub cleaned: u32,
    pub errors: u32,
}

/// Provisioning of per-session worker services.
#[async_trait]
pub trait WorkerSpawner: Send + Sync {
    async fn create_session_worker(
        &self,
        session_id: &str,
        tenant_id: &str,
        codebase_id: &str,
    ) -> Result<SpawnOutcome, SpawnError>;

    /// Best-effort delete; absent resources count as success.
    async fn delete_session_worker(&self, session_id: &str) -> Result<bool, SpawnError>;

    async fn get_worker_status(&self, session_id: &str) -> Result<SessionWorkerInfo, SpawnError>;

    async fn list_session_workers(
        &self,
        tenant_id: Option<&str>,
    ) -> Result<Vec<SessionWorkerInfo>, SpawnError>;

    /// Delete session workers older than the cutoff.
    async fn cleanup_idle_workers(
        &self,
        max_age_hours: u64,
        now_ms: u64,
    ) -> Result<CleanupStats, SpawnError>;
}

#[derive(Debug, Clone)]
pub struct KnativeSpawnerConfig {
    pub enabled: bool,
    pub namespace: String,
    pub configmap_name: String,
    /// Substituted for the WORKSPACE_SIZE placeholder in templates.
    pub workspace_size: String,
}

impl Default for KnativeSpawnerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            namespace: "switchboard".to_string(),
            configmap_name: "switchboard-session-worker-template".to_string(),
            workspace_size: "10Gi".to_string(),
        }
    }
}

pub fn service_name(session_id: &str) -> String {
    format!("sb-session-{session_id}")
}

pub fn trigger_name(session_id: &str) -> String {
    format!("sb-trigger-session-{session_id}")
}

/// Substitute placeholders and parse the result.
///
/// Values are validated before substitution; the rendered document is
/// parsed rather than re-serialized so malformed output fails here instead
/// of at the API server.
pub(crate) fn render_template(
    template: &str,
    session_id: &str,
    tenant_id: &str,
    codebase_id: &str,
    workspace_size: &str,
) -> Result<serde_json::Value, SpawnError> {
    for value in [session_id, tenant_id, codebase_id] {
        if !is_dns_label_safe(value) {
            return Err(SpawnError::Template(format!(
                "substituted value {value:?} is not a lowercase DNS label"
            )));
        }
    }
    if workspace_size.is_empty() || !workspace_size.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return Err(SpawnError::Template(format!(
            "workspace size {workspace_size:?} is not alphanumeric"
        )));
    }

    let rendered = template
        .replace("SESSION_ID", session_id)
        .replace("TENANT_ID", tenant_id)
        .replace("CODEBASE_ID", codebase_id)
        .replace("WORKSPACE_SIZE", workspace_size);

    serde_yaml::from_str(&rendered)
        .map_err(|e| SpawnError::Template(format!("rendered template does not parse: {e}")))
}

fn object_state(obj: &DynamicObject) -> (SessionWorkerState, Option<String>) {
    let status = obj.data.get("status");
    let url = status
        .and_then(|s| s.get("url"))
        .and_then(serde_json::Value::as_str)
        .map(str::to_string);
    let ready = status
        .and_then(|s| s.get("conditions"))
        .and_then(serde_json::Value::as_array)
        .and_then(|conditions| {
            conditions.iter().find(|c| c.get("type").and_then(|t| t.as_str()) == Some("Ready"))
        })
        .and_then(|c| c.get("status"))
        .and_then(serde_json::Value::as_str);
    let state = match ready {
        Some("True") => SessionWorkerState::Ready,
        Some("False") => SessionWorkerState::Failed,
        Some(_) => SessionWorkerState::Pending,
        None => SessionWorkerState::Creating,
    };
    (state, url)
}

fn object_info(obj: &DynamicObject) -> SessionWorkerInfo {
    let labels = obj.metadata.labels.clone().unwrap_or_default();
    let name = obj.metadata.name.clone().unwrap_or_default();
    let session_id = labels
        .get(SESSION_LABEL)
        .cloned()
        .unwrap_or_else(|| name.strip_prefix("sb-session-").unwrap_or(&name).to_string());
    let (state, url) = object_state(obj);
    SessionWorkerInfo {
        session_id,
        tenant_id: labels.get(TENANT_LABEL).cloned().unwrap_or_default(),
        codebase_id: labels.get(CODEBASE_LABEL).cloned().unwrap_or_default(),
        state,
        url,
        created_at_ms: obj
            .metadata
            .creation_timestamp
            .as_ref()
            .map(|t| t.0.timestamp_millis().max(0) as u64),
        error: None,
    }
}

/// Knative-backed implementation of [`WorkerSpawner`].
pub struct KnativeSpawner {
    config: KnativeSpawnerConfig,
    client: tokio::sync::OnceCell<Client>,
    templates: tokio::sync::OnceCell<HashMap<String, String>>,
}

impl KnativeSpawner {
    pub fn new(config: KnativeSpawnerConfig) -> Self {
        Self {
            config,
            client: tokio::sync::OnceCell::new(),
            templates: tokio::sync::OnceCell::new(),
        }
    }

    async fn client(&self) -> Result<&Client, SpawnError> {
        self.client
            .get_or_try_init(|| async {
                Client::try_default().await.map_err(|e| {
                    SpawnError::Api(format!("failed to initialize orchestrator client: {e}"))
                })
            })
            .await
    }

    /// Load service/trigger templates from the ConfigMap, once.
    async fn templates(&self) -> Result<&HashMap<String, String>, SpawnError> {
        let client = self.client().await?.clone();
        let namespace = self.config.namespace.clone();
        let name = self.config.configmap_name.clone();
        self.templates
            .get_or_try_init(|| async move {
                let configmaps: Api<ConfigMap> = Api::namespaced(client, &namespace);
                let configmap = configmaps.get(&name).await.map_err(|e| {
                    if api_status(&e) == Some(404) {
                        SpawnError::ConfigMissing(format!(
                            "configmap {name} not found in namespace {namespace}"
                        ))
                    } else {
                        classify(e)
                    }
                })?;
                let data: HashMap<String, String> =
                    configmap.data.map(|d| d.into_iter().collect()).unwrap_or_default();
                if data.is_empty() {
                    return Err(SpawnError::ConfigMissing(format!("configmap {name} has no data")));
                }
                tracing::info!(count = data.len(), configmap = %name, "loaded worker templates");
                Ok(data)
            })
            .await
    }

    fn services_api(&self, client: Client) -> Api<DynamicObject> {
        dynamic_api(client, &self.config.namespace, SERVICE_GROUP, "v1", "Service", "services")
    }

    fn triggers_api(&self, client: Client) -> Api<DynamicObject> {
        dynamic_api(client, &self.config.namespace, EVENTING_GROUP, "v1", "Trigger", "triggers")
    }

    async fn render(
        &self,
        key: &str,
        session_id: &str,
        tenant_id: &str,
        codebase_id: &str,
    ) -> Result<DynamicObject, SpawnError> {
        let templates = self.templates().await?;
        let template = templates
            .get(key)
            .ok_or_else(|| SpawnError::Template(format!("template {key} not found")))?;
        let value = render_template(
            template,
            session_id,
            tenant_id,
            codebase_id,
            &self.config.workspace_size,
        )?;
        serde_json::from_value(value)
            .map_err(|e| SpawnError::Template(format!("rendered template is not an object: {e}")))
    }

    async fn delete_object(
        &self,
        api: &Api<DynamicObject>,
        name: &str,
        kind: &str,
    ) -> Result<bool, SpawnError> {
        match api.delete(name, &DeleteParams::default()).await {
            Ok(_) => {
                tracing::info!(%name, kind, "deleted session worker resource");
                Ok(true)
            }
            Err(e) if api_status(&e) == Some(404) => Ok(true),
            Err(e) => {
                tracing::error!(%name, kind, error = %e, "failed to delete session worker resource");
                Ok(false)
            }
        }
    }
}

#[async_trait]
impl WorkerSpawner for KnativeSpawner {
    async fn create_session_worker(
        &self,
        session_id: &str,
        tenant_id: &str,
        codebase_id: &str,
    ) -> Result<SpawnOutcome, SpawnError> {
        if !self.config.enabled {
            return Ok(SpawnOutcome::Disabled);
        }
        if !is_dns_label_safe(session_id) {
            return Err(SpawnError::InvalidSessionId(session_id.to_string()));
        }

        let service_name = service_name(session_id);
        let trigger_name = trigger_name(session_id);
        tracing::info!(
            session_id,
            tenant_id,
            codebase_id,
            %service_name,
            "creating session worker"
        );

        let client = self.client().await?.clone();
        let services = self.services_api(client.clone());
        let triggers = self.triggers_api(client);
        let pp = PostParams::default();

        let service_body =
            self.render(SERVICE_TEMPLATE, session_id, tenant_id, codebase_id).await?;
        match services.create(&pp, &service_body).await {
            Ok(_) => tracing::info!(%service_name, "created session worker service"),
            Err(e) if api_status(&e) == Some(409) => {
                tracing::info!(%service_name, "session worker service already exists");
            }
            Err(e) => return Err(classify(e)),
        }

        let trigger_body =
            self.render(TRIGGER_TEMPLATE, session_id, tenant_id, codebase_id).await?;
        match triggers.create(&pp, &trigger_body).await {
            Ok(_) => tracing::info!(%trigger_name, "created session worker trigger"),
            Err(e) if api_status(&e) == Some(409) => {
                tracing::info!(%trigger_name, "session worker trigger already exists");
            }
            Err(e) => {
                // Roll the service back so a failed spawn leaves nothing behind.
                let _ = self.delete_object(&services, &service_name, "Service").await;
                return Err(classify(e));
            }
        }

        let url = match services.get(&service_name).await {
            Ok(service) => object_state(&service).1,
            Err(_) => None,
        };

        Ok(SpawnOutcome::Spawned(SpawnedWorker {
            session_id: session_id.to_string(),
            service_name,
            trigger_name,
            url,
        }))
    }

    async fn delete_session_worker(&self, session_id: &str) -> Result<bool, SpawnError> {
        if !self.config.enabled {
            return Ok(false);
        }
        let client = self.client().await?.clone();
        let services = self.services_api(client.clone());
        let triggers = self.triggers_api(client);

        let trigger_ok =
            self.delete_object(&triggers, &trigger_name(session_id), "Trigger").await?;
        let service_ok =
            self.delete_object(&services, &service_name(session_id), "Service").await?;
        Ok(trigger_ok && service_ok)
    }

    async fn get_worker_status(&self, session_id: &str) -> Result<SessionWorkerInfo, SpawnError> {
        if !self.config.enabled {
            return Ok(SessionWorkerInfo::absent(
                session_id,
                SessionWorkerState::NotFound,
                Some("session worker spawning is disabled".to_string()),
            ));
        }
        let client = self.client().await?.clone();
        let services = self.services_api(client);
        match services.get(&service_name(session_id)).await {
            Ok(service) => {
                let mut info = object_info(&service);
                info.session_id = session_id.to_string();
                Ok(info)
            }
            Err(e) if api_status(&e) == Some(404) => {
                Ok(SessionWorkerInfo::absent(session_id, SessionWorkerState::NotFound, None))
            }
            Err(e) => Ok(SessionWorkerInfo::absent(
                session_id,
                SessionWorkerState::Failed,
                Some(e.to_string()),
            )),
        }
    }

    async fn list_session_workers(
        &self,
        tenant_id: Option<&str>,
    ) -> Result<Vec<SessionWorkerInfo>, SpawnError> {
        if !self.config.enabled {
            return Ok(Vec::new());
        }
        let client = self.client().await?.clone();
        let services = self.services_api(client);
        let selector = match tenant_id {
            Some(tenant) => format!("{TENANT_LABEL}={tenant}"),
            None => SESSION_LABEL.to_string(),
        };
        let list = services
            .list(&ListParams::default().labels(&selector))
            .await
            .map_err(classify)?;
        Ok(list.items.iter().map(object_info).collect())
    }

    async fn cleanup_idle_workers(
        &self,
        max_age_hours: u64,
        now_ms: u64,
    ) -> Result<CleanupStats, SpawnError> {
        if !self.config.enabled {
            return Ok(CleanupStats::default());
        }
        let cutoff_ms = now_ms.saturating_sub(max_age_hours * 3_600_000);
        let mut stats = CleanupStats::default();
        for worker in self.list_session_workers(None).await? {
            let Some(created) = worker.created_at_ms else { continue };
            if created >= cutoff_ms {
                continue;
            }
            tracing::info!(
                session_id = %worker.session_id,
                created_at_ms = created,
                "cleaning up idle session worker"
            );
            if self.delete_session_worker(&worker.session_id).await? {
                stats.cleaned += 1;
            } else {
                stats.errors += 1;
            }
        }
        tracing::info!(cleaned = stats.cleaned, errors = stats.errors, "idle worker cleanup done");
        Ok(stats)
    }
}

/// In-memory spawner for tests.
#[cfg(any(test, feature = "test-support"))]
pub struct FakeSpawner {
    enabled: bool,
    workers: parking_lot::Mutex<HashMap<String, SessionWorkerInfo>>,
}

#[cfg(any(test, feature = "test-support"))]
impl FakeSpawner {
    pub fn new() -> Self {
        Self { enabled: true, workers: parking_lot::Mutex::new(HashMap::new()) }
    }

    pub fn disabled() -> Self {
        Self { enabled: false, workers: parking_lot::Mutex::new(HashMap::new()) }
    }

    pub fn spawned_sessions(&self) -> Vec<String> {
        let mut sessions: Vec<String> = self.workers.lock().keys().cloned().collect();
        sessions.sort();
        sessions
    }
}

#[cfg(any(test, feature = "test-support"))]
impl Default for FakeSpawner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl WorkerSpawner for FakeSpawner {
    async fn create_session_worker(
        &self,
        session_id: &str,
        tenant_id: &str,
        codebase_id: &str,
    ) -> Result<SpawnOutcome, SpawnError> {
        if !self.enabled {
            return Ok(SpawnOutcome::Disabled);
        }
        if !is_dns_label_safe(session_id) {
            return Err(SpawnError::InvalidSessionId(session_id.to_string()));
        }
        let info = SessionWorkerInfo {
            session_id: session_id.to_string(),
            tenant_id: tenant_id.to_string(),
            codebase_id: codebase_id.to_string(),
            state: SessionWorkerState::Ready,
            url: Some(format!("http://{}.fake.local", service_name(session_id))),
            created_at_ms: Some(0),
            error: None,
        };
        let url = info.url.clone();
        self.workers.lock().insert(session_id.to_string(), info);
        Ok(SpawnOutcome::Spawned(SpawnedWorker {
            session_id: session_id.to_string(),
            service_name: service_name(session_id),
            trigger_name: trigger_name(session_id),
            url,
        }))
    }

    async fn delete_session_worker(&self, session_id: &str) -> Result<bool, SpawnError> {
        if !self.enabled {
            return Ok(false);
        }
        self.workers.lock().remove(session_id);
        Ok(true)
    }

    async fn get_worker_status(&self, session_id: &str) -> Result<SessionWorkerInfo, SpawnError> {
        Ok(self
            .workers
            .lock()
            .get(session_id)
            .cloned()
            .unwrap_or_else(|| {
                SessionWorkerInfo::absent(session_id, SessionWorkerState::NotFound, None)
            }))
    }

    async fn list_session_workers(
        &self,
        tenant_id: Option<&str>,
    ) -> Result<Vec<SessionWorkerInfo>, SpawnError> {
        let mut workers: Vec<SessionWorkerInfo> = self
            .workers
            .lock()
            .values()
            .filter(|w| tenant_id.is_none_or(|t| w.tenant_id == t))
            .cloned()
            .collect();
        workers.sort_by(|a, b| a.session_id.cmp(&b.session_id));
        Ok(workers)
    }

    async fn cleanup_idle_workers(
        &self,
        max_age_hours: u64,
        now_ms: u64,
    ) -> Result<CleanupStats, SpawnError> {
        let cutoff_ms = now_ms.saturating_sub(max_age_hours * 3_600_000);
        let stale: Vec<String> = self
            .workers
            .lock()
            .values()
            .filter(|w| w.created_at_ms.is_some_and(|c| c < cutoff_ms))
            .map(|w| w.session_id.clone())
            .collect();
        let mut stats = CleanupStats::default();
        for session_id in stale {
            self.workers.lock().remove(&session_id);
            stats.cleaned += 1;
        }
        Ok(stats)
    }
}

#[cfg(test)]
#[path = "spawner_tests.rs"]
mod tests;
