// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cron reconciliation and fire-time dispatch.
//!
//! In the `knative` driver mode every persisted cronjob is mirrored to an
//! external CronJob resource; the cluster scheduler does the timing and
//! calls back into the control plane, which materializes a task through
//! the router and the queue. The `app` in-process scheduler is not
//! supported; `disabled` turns scheduling off entirely.

use crate::queue::{QueueError, TaskQueue};
use sb_adapters::{CronError, CronOrchestrator, CronReconcileResult};
use sb_core::{Clock, Cronjob, CronjobId, RoutingDecision, TaskDraft, TaskMetadata};
use sb_core::{CodebaseTarget, Task};
use sb_storage::{Store, StoreError, TenantScope};
use std::sync::Arc;
use thiserror::Error;

/// Scheduler mode, selected by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CronDriver {
    /// In-process scheduler; recognized but unsupported.
    App,
    Knative,
    Disabled,
}

sb_core::simple_display! {
    CronDriver {
        App => "app",
        Knative => "knative",
        Disabled => "disabled",
    }
}

impl CronDriver {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "app" => Some(CronDriver::App),
            "knative" => Some(CronDriver::Knative),
            "disabled" => Some(CronDriver::Disabled),
            _ => None,
        }
    }
}

/// Why a cron fire was triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerMode {
    Scheduled,
    Manual,
}

sb_core::simple_display! {
    TriggerMode {
        Scheduled => "scheduled",
        Manual => "manual",
    }
}

#[derive(Debug, Error)]
pub enum CronDispatchError {
    #[error("cronjob {0} not found")]
    NotFound(CronjobId),

    #[error("cron driver {0} does not reconcile external resources")]
    DriverInactive(CronDriver),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Orchestrator(#[from] CronError),
}

/// Aggregate result of a full reconciliation pass.
#[derive(Debug, Default)]
pub struct CronReconcileSummary {
    pub checked: usize,
    pub reconciled: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

/// Keeps external CronJob resources in sync with persisted cronjobs and
/// materializes tasks when the scheduler fires.
pub struct CronReconciler {
    store: Arc<dyn Store>,
    orchestrator: Arc<dyn CronOrchestrator>,
    driver: CronDriver,
}

impl CronReconciler {
    pub fn new(
        store: Arc<dyn Store>,
        orchestrator: Arc<dyn CronOrchestrator>,
        driver: CronDriver,
    ) -> Self {
        Self { store, orchestrator, driver }
    }

    pub fn driver(&self) -> CronDriver {
        self.driver
    }

    async fn tenant_namespace(&self, job: &Cronjob) -> Result<Option<String>, StoreError> {
        Ok(self.store.get_tenant(&job.tenant_id).await?.and_then(|t| t.namespace))
    }

    /// Create-or-patch the external resource for one cronjob.
    pub async fn reconcile_cronjob(
        &self,
        job: &Cronjob,
    ) -> Result<CronReconcileResult, CronDispatchError> {
        if self.driver != CronDriver::Knative {
            return Err(CronDispatchError::DriverInactive(self.driver));
        }
        let namespace = self.tenant_namespace(job).await?;
        Ok(self.orchestrator.reconcile(job, namespace.as_deref()).await?)
    }

    /// Delete the external resource for a cronjob id.
    pub async fn delete_cronjob(
        &self,
        job_id: &CronjobId,
        tenant_namespace: Option<&str>,
    ) -> Result<bool, CronDispatchError> {
        if self.driver != CronDriver::Knative {
            return Ok(false);
        }
        Ok(self.orchestrator.delete(job_id, tenant_namespace).await?)
    }

    /// Reconcile every persisted cronjob. Runs under administrative scope;
    /// failures are collected per job rather than aborting the pass.
    pub async fn reconcile_all(&self) -> CronReconcileSummary {
        let mut summary = CronReconcileSummary::default();
        if self.driver != CronDriver::Knative {
            summary.errors.push(format!("cron driver {} is not active", self.driver));
            return summary;
        }
        let jobs = match self.store.list_cronjobs(&TenantScope::Admin).await {
            Ok(jobs) => jobs,
            Err(err) => {
                summary.errors.push(format!("listing cronjobs failed: {err}"));
                return summary;
            }
        };
        summary.checked = jobs.len();
        for job in &jobs {
            match self.reconcile_cronjob(job).await {
                Ok(result) => {
                    tracing::debug!(
                        job_id = %job.id,
                        resource = %result.resource_name,
                        action = %result.action,
                        "cronjob reconciled"
                    );
                    summary.reconciled += 1;
                }
                Err(err) => {
                    summary.failed += 1;
                    summary.errors.push(format!("cronjob={} reconcile failed: {err}", job.id));
                }
            }
        }
        tracing::info!(
            checked = summary.checked,
            reconciled = summary.reconciled,
            failed = summary.failed,
            "cron reconciliation pass complete"
        );
        summary
    }

    /// Fire a cronjob: materialize a task from its template through the
    /// router and the queue, stamping scheduler metadata for traceability.
    pub async fn dispatch<C: Clock>(
        &self,
        queue: &TaskQueue<C>,
        job_id: &CronjobId,
        mode: TriggerMode,
    ) -> Result<(Task, RoutingDecision), CronDispatchError> {
        // Cron fires span tenants; the lookup is an audited admin path.
        let Some(job) = self.store.get_cronjob(&TenantScope::Admin, job_id).await? else {
            return Err(CronDispatchError::NotFound(*job_id));
        };

        let template = &job.task_template;
        let run_id = uuid::Uuid::new_v4().to_string();

        let prompt = template
            .prompt
            .clone()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| format!("Run cronjob \"{}\".", job.name));
        let title = template.title.clone().filter(|t| !t.trim().is_empty()).unwrap_or_else(|| {
            let prefix = match mode {
                TriggerMode::Manual => "Manual",
                TriggerMode::Scheduled => "Cronjob",
            };
            format!("{prefix}: {}", job.name)
        });

        let mut metadata = TaskMetadata::from_value(serde_json::Value::Object(
            template.metadata.clone(),
        ));
        metadata
            .extras
            .entry("cronjob_id".to_string())
            .or_insert_with(|| serde_json::json!(job.id));
        metadata
            .extras
            .entry("cronjob_run_id".to_string())
            .or_insert_with(|| serde_json::json!(run_id));
        metadata
            .extras
            .entry("trigger_mode".to_string())
            .or_insert_with(|| serde_json::json!(mode.to_string()));
        if metadata.tenant_id.is_none() {
            metadata.tenant_id = Some(job.tenant_id.to_string());
        }

        let mut draft = TaskDraft::new(job.tenant_id, title, prompt)
            .codebase(CodebaseTarget::from_wire(template.codebase_id.as_deref()))
            .agent_type(template.agent_type.clone().unwrap_or_else(|| "build".to_string()))
            .priority(template.priority)
            .metadata(metadata);
        if let Some(model) = &template.model {
            draft = draft.model(model.clone());
        }
        if let Some(model_ref) = &template.model_ref {
            draft = draft.model_ref(model_ref.clone());
        }
        if let Some(personality) = &template.worker_personality {
            draft = draft.worker_personality(personality.clone());
        }

        let scope = TenantScope::Tenant(job.tenant_id);
        let task = queue.create_task(&scope, draft).await?;

        let decision = decision_from_task(&task, queue.routing_config());
        tracing::info!(
            job_id = %job.id,
            task_id = %task.id,
            run_id = %run_id,
            mode = %mode,
            "cron fire dispatched"
        );
        Ok((task, decision))
    }
}

/// Reconstruct the routing decision from a routed task's metadata stamp.
fn decision_from_task(task: &Task, config: &sb_core::RoutingConfig) -> RoutingDecision {
    let routing = task.metadata.routing.clone().unwrap_or_default();
    RoutingDecision {
        complexity: routing.complexity.unwrap_or(sb_core::Complexity::Standard),
        model_tier: routing.model_tier.unwrap_or(sb_core::ModelTier::Balanced),
        model_ref: routing
            .model_ref
            .as_deref()
            .and_then(|raw| config.normalize_model_ref(Some(raw))),
        model_source: routing.model_source.unwrap_or(sb_core::ModelSource::Unresolved),
        target_agent_name: routing.target_agent_name,
        worker_personality: routing.worker_personality,
        required_capabilities: task.required_capabilities.clone(),
    }
}

#[cfg(test)]
#[path = "cron_tests.rs"]
mod tests;
