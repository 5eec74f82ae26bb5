// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cron reconciliation against the orchestrator.
//!
//! Each persisted cronjob maps to one external CronJob resource whose only
//! job is an authenticated HTTP callback to the control plane's internal
//! trigger endpoint at fire time. Resource names are derived
//! deterministically from the cronjob id so reconciliation is idempotent:
//! read, then patch or create, keyed by the same name every run.

use crate::cluster::api_status;
use async_trait::async_trait;
use k8s_openapi::api::batch::v1::CronJob;
use kube::api::{Api, DeleteParams, Patch, PatchParams, PostParams};
use kube::Client;
use sb_core::{Cronjob, CronjobId};
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CronError {
    /// Required configuration is missing (e.g. the internal token). Fatal.
    #[error("cron configuration error: {0}")]
    Config(String),

    #[error("cronjob body error: {0}")]
    Body(String),

    /// The orchestrator denied the request. Fatal.
    #[error("orchestrator forbade the operation: {0}")]
    Forbidden(String),

    /// Transient orchestrator failure; safe to retry on the next pass.
    #[error("orchestrator error: {0}")]
    Api(String),

    #[error("namespace {0:?} not found")]
    NamespaceMissing(String),
}

fn classify(err: kube::Error) -> CronError {
    match api_status(&err) {
        Some(403) => CronError::Forbidden(err.to_string()),
        _ => CronError::Api(err.to_string()),
    }
}

/// What the reconciler did for one cronjob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileAction {
    Created,
    Updated,
}

sb_core::simple_display! {
    ReconcileAction {
        Created => "created",
        Updated => "updated",
    }
}

/// Result of reconciling a single cronjob resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronReconcileResult {
    pub job_id: CronjobId,
    pub action: ReconcileAction,
    pub namespace: String,
    pub resource_name: String,
}

/// External CronJob management, one resource per persisted cronjob.
#[async_trait]
pub trait CronOrchestrator: Send + Sync {
    /// Create-or-patch the resource for `job`. `tenant_namespace` is the
    /// owning tenant's namespace hint, when one exists.
    async fn reconcile(
        &self,
        job: &Cronjob,
        tenant_namespace: Option<&str>,
    ) -> Result<CronReconcileResult, CronError>;

    /// Delete the resource. Absent resources count as success.
    async fn delete(
        &self,
        job_id: &CronjobId,
        tenant_namespace: Option<&str>,
    ) -> Result<bool, CronError>;
}

#[derive(Debug, Clone)]
pub struct KnativeCronConfig {
    pub default_namespace: String,
    /// Shared secret the trigger pod presents to the internal endpoint.
    pub internal_token: String,
    pub trigger_base_url: String,
    pub job_image: String,
    pub service_account: Option<String>,
    /// Route cronjobs into tenant namespaces when the tenant has one.
    pub tenant_namespace_mode: bool,
    /// Permit tenant namespaces that differ from the default.
    pub allow_cross_namespace: bool,
    pub starting_deadline_secs: i64,
    pub success_history_limit: i32,
    pub failure_history_limit: i32,
    pub job_ttl_secs: i32,
}

impl Default for KnativeCronConfig {
    fn default() -> Self {
        Self {
            default_namespace: "switchboard".to_string(),
            internal_token: String::new(),
            trigger_base_url: "http://127.0.0.1:8080".to_string(),
            job_image: "curlimages/curl:8.11.1".to_string(),
            service_account: None,
            tenant_namespace_mode: false,
            allow_cross_namespace: false,
            starting_deadline_secs: 300,
            success_history_limit: 1,
            failure_history_limit: 3,
            job_ttl_secs: 600,
        }
    }
}

/// Deterministic, length-bounded resource name for a cronjob id.
pub fn cronjob_resource_name(job_id: &CronjobId) -> String {
    let digest = Sha256::digest(job_id.as_str().as_bytes());
    let mut hex = String::with_capacity(20);
    for byte in digest.iter().take(10) {
        hex.push_str(&format!("{byte:02x}"));
    }
    format!("sb-cron-{hex}")
}

/// Build the CronJob manifest for a persisted cronjob.
///
/// `suspend` is the inversion of the cronjob's enabled flag; concurrency is
/// forbidden so fires never overlap per job.
pub fn build_cronjob_body(
    job: &Cronjob,
    namespace: &str,
    config: &KnativeCronConfig,
) -> Result<serde_json::Value, CronError> {
    if config.internal_token.is_empty() {
        return Err(CronError::Config(
            "internal trigger token must be set for the knative cron driver".to_string(),
        ));
    }

    let name = cronjob_resource_name(&job.id);
    let tenant_label = job.tenant_id.to_string();
    let trigger_command = "set -eu; \
         curl -fsS --max-time 30 -X POST \
         \"${SB_CRON_TRIGGER_BASE_URL}/v1/cronjobs/internal/${SB_CRONJOB_ID}/trigger\" \
         -H \"X-Cron-Signature: ${SB_CRON_INTERNAL_TOKEN}\" \
         -H \"Content-Type: application/json\"";

    let mut pod_spec = serde_json::json!({
        "restartPolicy": "Never",
        "containers": [{
            "name": "trigger",
            "image": config.job_image,
            "imagePullPolicy": "IfNotPresent",
            "env": [
                {"name": "SB_CRON_TRIGGER_BASE_URL", "value": config.trigger_base_url},
                {"name": "SB_CRON_INTERNAL_TOKEN", "value": config.internal_token},
                {"name": "SB_CRONJOB_ID", "value": job.id.as_str()},
            ],
            "command": ["/bin/sh", "-c", trigger_command],
        }],
    });
    if let Some(service_account) = &config.service_account {
        pod_spec["serviceAccountName"] = serde_json::json!(service_account);
    }

    let mut spec = serde_json::json!({
        "schedule": job.cron_expression,
        "suspend": !job.enabled,
        "concurrencyPolicy": "Forbid",
        "startingDeadlineSeconds": config.starting_deadline_secs,
        "successfulJobsHistoryLimit": config.success_history_limit,
        "failedJobsHistoryLimit": config.failure_history_limit,
        "jobTemplate": {
            "spec": {
                "ttlSecondsAfterFinished": config.job_ttl_secs,
                "template": {
                    "metadata": {
                        "labels": {
                            "switchboard.dev/cronjob-id": job.id.as_str(),
                            "switchboard.dev/tenant": tenant_label,
                        }
                    },
                    "spec": pod_spec,
                }
            }
        },
    });
    if let Some(timezone) = &job.timezone {
        spec["timeZone"] = serde_json::json!(timezone);
    }

    Ok(serde_json::json!({
        "apiVersion": "batch/v1",
        "kind": "CronJob",
        "metadata": {
            "name": name,
            "namespace": namespace,
            "labels": {
                "app.kubernetes.io/managed-by": "switchboard",
                "switchboard.dev/component": "cron",
                "switchboard.dev/cronjob-id": job.id.as_str(),
                "switchboard.dev/tenant": job.tenant_id.as_str(),
            },
        },
        "spec": spec,
    }))
}

/// Kubernetes-backed implementation of [`CronOrchestrator`].
pub struct KnativeCronManager {
    config: KnativeCronConfig,
    client: tokio::sync::OnceCell<Client>,
}

impl KnativeCronManager {
    pub fn new(config: KnativeCronConfig) -> Self {
        Self { config, client: tokio::sync::OnceCell::new() }
    }

    async fn client(&self) -> Result<&Client, CronError> {
        self.client
            .get_or_try_init(|| async {
                Client::try_default().await.map_err(|e| {
                    CronError::Api(format!("failed to initialize orchestrator client: {e}"))
                })
            })
            .await
    }

    /// Resolve the namespace for a cronjob, honoring tenant-namespace mode
    /// and the cross-namespace allowance.
    pub fn resolve_namespace(&self, tenant_namespace: Option<&str>) -> String {
        let default = self.config.default_namespace.clone();
        if !self.config.tenant_namespace_mode {
            return default;
        }
        let Some(tenant_namespace) = tenant_namespace.filter(|ns| !ns.is_empty()) else {
            return default;
        };
        if tenant_namespace != default && !self.config.allow_cross_namespace {
            tracing::warn!(
                tenant_namespace,
                "tenant namespace ignored: cross-namespace cronjobs are not allowed"
            );
            return default;
        }
        tenant_namespace.to_string()
    }

    async fn ensure_namespace(&self, namespace: &str) -> Result<(), CronError> {
        use k8s_openapi::api::core::v1::Namespace;
        let client = self.client().await?.clone();
        let namespaces: Api<Namespace> = Api::all(client);
        match namespaces.get(namespace).await {
            Ok(_) => Ok(()),
            Err(e) if api_status(&e) == Some(404) => {
                Err(CronError::NamespaceMissing(namespace.to_string()))
            }
            Err(e) => Err(classify(e)),
        }
    }
}

#[async_trait]
impl CronOrchestrator for KnativeCronManager {
    async fn reconcile(
        &self,
        job: &Cronjob,
        tenant_namespace: Option<&str>,
    ) -> Result<CronReconcileResult, CronError> {
        let namespace = self.resolve_namespace(tenant_namespace);
        self.ensure_namespace(&namespace).await?;
        let name = cronjob_resource_name(&job.id);
        let body = build_cronjob_body(job, &namespace, &self.config)?;
        let cronjob: CronJob = serde_json::from_value(body)
            .map_err(|e| CronError::Body(format!("manifest does not parse: {e}")))?;

        let client = self.client().await?.clone();
        let api: Api<CronJob> = Api::namespaced(client, &namespace);

        // Read-before-write gives create-or-patch semantics keyed by the
        // deterministic name.
        let action = match api.get(&name).await {
            Ok(_) => {
                api.patch(&name, &PatchParams::default(), &Patch::Merge(&cronjob))
                    .await
                    .map_err(classify)?;
                ReconcileAction::Updated
            }
            Err(e) if api_status(&e) == Some(404) => {
                api.create(&PostParams::default(), &cronjob).await.map_err(classify)?;
                ReconcileAction::Created
            }
            Err(e) => return Err(classify(e)),
        };

        tracing::info!(
            job_id = %job.id,
            %namespace,
            resource = %name,
            action = %action,
            "reconciled cronjob resource"
        );
        Ok(CronReconcileResult { job_id: job.id, action, namespace, resource_name: name })
    }

    async fn delete(
        &self,
        job_id: &CronjobId,
        tenant_namespace: Option<&str>,
    ) -> Result<bool, CronError> {
        let namespace = self.resolve_namespace(tenant_namespace);
        let name = cronjob_resource_name(job_id);
        let client = self.client().await?.clone();
        let api: Api<CronJob> = Api::namespaced(client, &namespace);
        match api.delete(&name, &DeleteParams::default()).await {
            Ok(_) => Ok(true),
            Err(e) if api_status(&e) == Some(404) => Ok(true),
            Err(e) => Err(classify(e)),
        }
    }
}

/// Recording orchestrator for tests: resources keyed by deterministic name.
#[cfg(any(test, feature = "test-support"))]
pub struct FakeCronOrchestrator {
    resources: parking_lot::Mutex<std::collections::HashMap<String, serde_json::Value>>,
    config: KnativeCronConfig,
}

#[cfg(any(test, feature = "test-support"))]
impl FakeCronOrchestrator {
    pub fn new() -> Self {
        Self {
            resources: parking_lot::Mutex::new(std::collections::HashMap::new()),
            config: KnativeCronConfig {
                internal_token: "test-token".to_string(),
                ..KnativeCronConfig::default()
            },
        }
    }

    pub fn resource_count(&self) -> usize {
        self.resources.lock().len()
    }

    pub fn resource(&self, name: &str) -> Option<serde_json::Value> {
        self.resources.lock().get(name).cloned()
    }
}

#[cfg(any(test, feature = "test-support"))]
impl Default for FakeCronOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl CronOrchestrator for FakeCronOrchestrator {
    async fn reconcile(
        &self,
        job: &Cronjob,
        tenant_namespace: Option<&str>,
    ) -> Result<CronReconcileResult, CronError> {
        let namespace =
            tenant_namespace.unwrap_or(&self.config.default_namespace).to_string();
        let name = cronjob_resource_name(&job.id);
        let body = build_cronjob_body(job, &namespace, &self.config)?;
        let action = if self.resources.lock().insert(name.clone(), body).is_some() {
            ReconcileAction::Updated
        } else {
            ReconcileAction::Created
        };
        Ok(CronReconcileResult { job_id: job.id, action, namespace, resource_name: name })
    }

    async fn delete(
        &self,
        job_id: &CronjobId,
        _tenant_namespace: Option<&str>,
    ) -> Result<bool, CronError> {
        self.resources.lock().remove(&cronjob_resource_name(job_id));
        Ok(true)
    }
}

#[cfg(test)]
#[path = "cron_tests.rs"]
mod tests;
