// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::registry::{RegistryConfig, WorkerRegistry};
use sb_adapters::{FakeEventSink, FakeSpawner};
use sb_core::{FakeClock, TaskDraft, TaskStatus, WorkerId};
use sb_storage::{MemStore, TaskRelease, UpdateOutcome};

struct Fixture {
    manager: SessionManager<FakeClock>,
    queue: Arc<TaskQueue<FakeClock>>,
    store: Arc<MemStore>,
    events: Arc<FakeEventSink>,
    spawner: Arc<FakeSpawner>,
}

fn fixture() -> Fixture {
    let clock = FakeClock::new();
    let store = Arc::new(MemStore::new());
    let events = Arc::new(FakeEventSink::new());
    let spawner = Arc::new(FakeSpawner::new());
    let registry = Arc::new(WorkerRegistry::new(RegistryConfig::default(), clock.clone()));
    let queue = Arc::new(TaskQueue::new(
        store.clone() as Arc<dyn Store>,
        events.clone() as Arc<dyn EventSink>,
        registry,
        sb_core::RoutingConfig::default(),
        clock.clone(),
    ));
    let manager = SessionManager::new(
        store.clone() as Arc<dyn Store>,
        queue.clone(),
        spawner.clone() as Arc<dyn WorkerSpawner>,
        events.clone() as Arc<dyn EventSink>,
        clock,
    );
    Fixture { manager, queue, store, events, spawner }
}

fn scope() -> TenantScope {
    TenantScope::tenant("tnt-a")
}

#[tokio::test]
async fn create_session_spawns_worker_and_persists() {
    let f = fixture();
    let (session, outcome) = f
        .manager
        .create_session(
            &scope(),
            SessionId::from_string("sess-1"),
            TenantId::from_string("tnt-a"),
            CodebaseId::from_string("cbs-1"),
        )
        .await
        .unwrap();

    assert!(session.is_active());
    assert_eq!(session.service_name.as_deref(), Some("sb-session-sess-1"));
    assert!(matches!(outcome, SpawnOutcome::Spawned(_)));
    assert_eq!(f.spawner.spawned_sessions(), vec!["sess-1".to_string()]);
    assert!(f.events.published_types().contains(&"session.created".to_string()));

    let stored = f.store.get_session(&scope(), &session.id).await.unwrap().unwrap();
    assert_eq!(stored, session);
}

#[tokio::test]
async fn second_create_for_same_codebase_reuses_active_session() {
    let f = fixture();
    let (first, _) = f
        .manager
        .create_session(
            &scope(),
            SessionId::from_string("sess-1"),
            TenantId::from_string("tnt-a"),
            CodebaseId::from_string("cbs-1"),
        )
        .await
        .unwrap();
    let (second, _) = f
        .manager
        .create_session(
            &scope(),
            SessionId::from_string("sess-2"),
            TenantId::from_string("tnt-a"),
            CodebaseId::from_string("cbs-1"),
        )
        .await
        .unwrap();

    // At most one active session per (tenant, codebase).
    assert_eq!(second.id, first.id);
    assert_eq!(f.spawner.spawned_sessions(), vec!["sess-1".to_string()]);
}

#[tokio::test]
async fn end_session_cancels_tasks_exactly_once_and_tears_down() {
    let f = fixture();
    let session_id = SessionId::from_string("sess-1");
    let (session, _) = f
        .manager
        .create_session(
            &scope(),
            session_id,
            TenantId::from_string("tnt-a"),
            CodebaseId::from_string("cbs-1"),
        )
        .await
        .unwrap();

    // Two pending tasks and one running task bound to the session.
    for title in ["one", "two"] {
        f.queue
            .create_task(&scope(), TaskDraft::new("tnt-a", title, "p").session_id(session_id))
            .await
            .unwrap();
    }
    let running = f
        .queue
        .create_task(&scope(), TaskDraft::new("tnt-a", "three", "p").session_id(session_id))
        .await
        .unwrap();
    let worker = WorkerId::new("w-1");
    f.queue.claim_task(&scope(), &running.id, &worker).await.unwrap();
    f.queue.mark_running(&scope(), &running.id, &worker, Some(session_id)).await.unwrap();

    let summary = f.manager.end_session(&scope(), &session.id).await.unwrap();
    assert_eq!(summary.cancelled_tasks.len(), 3);
    assert!(summary
        .cancelled_tasks
        .iter()
        .all(|t| t.status == TaskStatus::Cancelled
            && t.error.as_deref() == Some("Session ended")));
    assert!(summary.worker_deleted);
    assert!(f.spawner.spawned_sessions().is_empty());
    assert!(f.events.published_types().contains(&"session.ended".to_string()));

    // A late release from the worker of the running task conflicts.
    let release = TaskRelease {
        task_id: running.id,
        worker_id: worker,
        status: TaskStatus::Completed,
        result: Some("done".to_string()),
        error: None,
        session_id: None,
        model_used: None,
    };
    let outcome = f.queue.release_task(&scope(), release).await.unwrap();
    assert!(matches!(outcome, UpdateOutcome::Conflict { .. }));

    // Ending again cancels nothing further.
    let summary = f.manager.end_session(&scope(), &session.id).await.unwrap();
    assert!(summary.cancelled_tasks.is_empty());
}

#[tokio::test]
async fn end_unknown_session_is_not_found() {
    let f = fixture();
    let err = f
        .manager
        .end_session(&scope(), &SessionId::from_string("ses-missing"))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::NotFound(_)));
}

#[tokio::test]
async fn disabled_spawner_still_creates_the_session() {
    let clock = FakeClock::new();
    let store = Arc::new(MemStore::new());
    let events = Arc::new(FakeEventSink::disabled());
    let registry = Arc::new(WorkerRegistry::new(RegistryConfig::default(), clock.clone()));
    let queue = Arc::new(TaskQueue::new(
        store.clone() as Arc<dyn Store>,
        events.clone() as Arc<dyn EventSink>,
        registry,
        sb_core::RoutingConfig::default(),
        clock.clone(),
    ));
    let manager = SessionManager::new(
        store as Arc<dyn Store>,
        queue,
        Arc::new(FakeSpawner::disabled()) as Arc<dyn WorkerSpawner>,
        events as Arc<dyn EventSink>,
        clock,
    );

    let (session, outcome) = manager
        .create_session(
            &scope(),
            SessionId::from_string("sess-1"),
            TenantId::from_string("tnt-a"),
            CodebaseId::from_string("cbs-1"),
        )
        .await
        .unwrap();
    assert_eq!(outcome, SpawnOutcome::Disabled);
    assert!(session.service_name.is_none());
}
