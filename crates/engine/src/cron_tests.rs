// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::registry::{RegistryConfig, WorkerRegistry};
use sb_adapters::{FakeCronOrchestrator, FakeEventSink, ReconcileAction};
use sb_core::{Cronjob, FakeClock, TaskStatus, TaskTemplate, Tenant};
use sb_storage::MemStore;
use yare::parameterized;

struct Fixture {
    reconciler: CronReconciler,
    queue: TaskQueue<FakeClock>,
    store: Arc<MemStore>,
    orchestrator: Arc<FakeCronOrchestrator>,
}

fn fixture(driver: CronDriver) -> Fixture {
    let clock = FakeClock::new();
    let store = Arc::new(MemStore::new());
    let orchestrator = Arc::new(FakeCronOrchestrator::new());
    let registry = Arc::new(WorkerRegistry::new(RegistryConfig::default(), clock.clone()));
    let queue = TaskQueue::new(
        store.clone() as Arc<dyn Store>,
        Arc::new(FakeEventSink::disabled()),
        registry,
        sb_core::RoutingConfig::default(),
        clock,
    );
    let reconciler = CronReconciler::new(
        store.clone() as Arc<dyn Store>,
        orchestrator.clone() as Arc<dyn CronOrchestrator>,
        driver,
    );
    Fixture { reconciler, queue, store, orchestrator }
}

#[parameterized(
    app = { "app", CronDriver::App },
    knative = { "knative", CronDriver::Knative },
    disabled = { "disabled", CronDriver::Disabled },
)]
fn driver_parsing(raw: &str, expected: CronDriver) {
    assert_eq!(CronDriver::parse(raw), Some(expected));
}

#[test]
fn unknown_driver_rejected() {
    assert_eq!(CronDriver::parse("quartz"), None);
}

#[tokio::test]
async fn reconcile_all_converges_and_counts() {
    let f = fixture(CronDriver::Knative);
    for name in ["a", "b", "c"] {
        let job = Cronjob::builder().id(format!("crn-{name}")).tenant_id("tnt-a").name(name).build();
        f.store.upsert_cronjob(&TenantScope::Admin, job).await.unwrap();
    }

    let summary = f.reconciler.reconcile_all().await;
    assert_eq!(summary.checked, 3);
    assert_eq!(summary.reconciled, 3);
    assert_eq!(summary.failed, 0);
    assert_eq!(f.orchestrator.resource_count(), 3);

    // Idempotent: a second pass converges to the same three resources.
    let summary = f.reconciler.reconcile_all().await;
    assert_eq!(summary.reconciled, 3);
    assert_eq!(f.orchestrator.resource_count(), 3);
}

#[tokio::test]
async fn reconcile_uses_tenant_namespace_when_present() {
    let f = fixture(CronDriver::Knative);
    let tenant = Tenant::builder().id("tnt-ns").namespace("tenant-space").build();
    f.store.upsert_tenant(tenant).await.unwrap();
    let job = Cronjob::builder().id("crn-1").tenant_id("tnt-ns").build();

    let result = f.reconciler.reconcile_cronjob(&job).await.unwrap();
    assert_eq!(result.action, ReconcileAction::Created);
    assert_eq!(result.namespace, "tenant-space");
}

#[tokio::test]
async fn inactive_driver_rejects_reconcile() {
    let f = fixture(CronDriver::Disabled);
    let job = Cronjob::builder().build();
    let err = f.reconciler.reconcile_cronjob(&job).await.unwrap_err();
    assert!(matches!(err, CronDispatchError::DriverInactive(CronDriver::Disabled)));

    let summary = f.reconciler.reconcile_all().await;
    assert_eq!(summary.reconciled, 0);
    assert!(!summary.errors.is_empty());
}

#[tokio::test]
async fn dispatch_materializes_task_through_router() {
    let f = fixture(CronDriver::Knative);
    let template = TaskTemplate {
        title: Some("health".to_string()),
        prompt: Some("ping".to_string()),
        agent_type: Some("noop".to_string()),
        ..TaskTemplate::default()
    };
    let job = Cronjob::builder()
        .id("crn-health")
        .tenant_id("tnt-a")
        .name("health")
        .cron_expression("*/5 * * * *")
        .task_template(template)
        .build();
    f.store.upsert_cronjob(&TenantScope::Admin, job.clone()).await.unwrap();

    let (task, decision) =
        f.reconciler.dispatch(&f.queue, &job.id, TriggerMode::Scheduled).await.unwrap();

    assert_eq!(task.title, "health");
    assert_eq!(task.prompt, "ping");
    assert_eq!(task.agent_type, "noop");
    assert_eq!(task.status, TaskStatus::Pending);
    // Routing metadata reflects the router's decision for the template.
    let routing = task.metadata.routing.as_ref().unwrap();
    assert_eq!(routing.complexity, Some(decision.complexity));
    assert_eq!(task.metadata.extras["cronjob_id"], "crn-health");
    assert_eq!(task.metadata.extras["trigger_mode"], "scheduled");
    assert!(task.metadata.extras.contains_key("cronjob_run_id"));
    assert_eq!(task.metadata.tenant_id.as_deref(), Some("tnt-a"));

    // The task is visible under the owning tenant's scope.
    let scope = TenantScope::tenant("tnt-a");
    assert!(f.store.get_task(&scope, &task.id).await.unwrap().is_some());
}

#[tokio::test]
async fn dispatch_defaults_title_and_prompt() {
    let f = fixture(CronDriver::Knative);
    let job = Cronjob::builder().id("crn-bare").name("nightly-sync").build();
    f.store.upsert_cronjob(&TenantScope::Admin, job.clone()).await.unwrap();

    let (task, _) =
        f.reconciler.dispatch(&f.queue, &job.id, TriggerMode::Scheduled).await.unwrap();
    assert_eq!(task.title, "Cronjob: nightly-sync");
    assert_eq!(task.prompt, "Run cronjob \"nightly-sync\".");

    let (manual, _) =
        f.reconciler.dispatch(&f.queue, &job.id, TriggerMode::Manual).await.unwrap();
    assert_eq!(manual.title, "Manual: nightly-sync");
}

#[tokio::test]
async fn dispatch_unknown_job_is_not_found() {
    let f = fixture(CronDriver::Knative);
    let err = f
        .reconciler
        .dispatch(&f.queue, &CronjobId::from_string("crn-missing"), TriggerMode::Scheduled)
        .await
        .unwrap_err();
    assert!(matches!(err, CronDispatchError::NotFound(_)));
}

#[tokio::test]
async fn delete_is_noop_for_inactive_driver() {
    let f = fixture(CronDriver::Disabled);
    let deleted =
        f.reconciler.delete_cronjob(&CronjobId::from_string("crn-1"), None).await.unwrap();
    assert!(!deleted);
}
