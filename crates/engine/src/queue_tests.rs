// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::registry::RegistryConfig;
use sb_adapters::FakeEventSink;
use sb_core::{FakeClock, TaskMetadata, Worker};
use sb_storage::{MemStore, Store};
use serde_json::json;

struct Fixture {
    queue: TaskQueue<FakeClock>,
    store: Arc<MemStore>,
    events: Arc<FakeEventSink>,
    registry: Arc<WorkerRegistry<FakeClock>>,
    clock: FakeClock,
}

fn fixture() -> Fixture {
    fixture_with_events(Arc::new(FakeEventSink::new()))
}

fn fixture_with_events(events: Arc<FakeEventSink>) -> Fixture {
    let clock = FakeClock::new();
    let store = Arc::new(MemStore::new());
    let registry = Arc::new(WorkerRegistry::new(RegistryConfig::default(), clock.clone()));
    let queue = TaskQueue::new(
        store.clone() as Arc<dyn sb_storage::Store>,
        events.clone() as Arc<dyn EventSink>,
        registry.clone(),
        sb_core::RoutingConfig::default(),
        clock.clone(),
    );
    Fixture { queue, store, events, registry, clock }
}

fn scope() -> TenantScope {
    TenantScope::tenant("tnt-a")
}

fn draft(title: &str, prompt: &str) -> TaskDraft {
    TaskDraft::new("tnt-a", title, prompt)
}

#[tokio::test]
async fn create_routes_and_persists_with_stream_delivery() {
    let f = fixture();
    let task = f.queue.create_task(&scope(), draft("rename foo", "rename foo to bar")).await.unwrap();

    assert_eq!(task.status, TaskStatus::Pending);
    let routing = task.metadata.routing.as_ref().unwrap();
    assert_eq!(routing.complexity, Some(sb_core::Complexity::Quick));
    assert_eq!(routing.model_tier, Some(sb_core::ModelTier::Fast));
    assert_eq!(routing.delivery, Some(DeliveryRoute::Stream));

    // Durable before notification.
    let stored = f.store.get_task(&scope(), &task.id).await.unwrap().unwrap();
    assert_eq!(stored, task);
}

#[tokio::test]
async fn create_rejects_unknown_codebase() {
    let f = fixture();
    let unknown = draft("t", "p").codebase(CodebaseTarget::from_wire(Some("cbs-missing")));
    let err = f.queue.create_task(&scope(), unknown).await.unwrap_err();
    assert!(matches!(err, QueueError::CodebaseNotFound(_)));
}

#[tokio::test]
async fn create_accepts_global_and_pending_sentinels() {
    let f = fixture();
    let global = draft("t", "p");
    assert!(f.queue.create_task(&scope(), global).await.is_ok());

    let pending =
        draft("t", "p").codebase(CodebaseTarget::from_wire(Some("__pending__")));
    assert!(f.queue.create_task(&scope(), pending).await.is_ok());
}

#[tokio::test]
async fn create_rejects_task_for_ended_session() {
    let f = fixture();
    let session = sb_core::Session::builder()
        .id("ses-1")
        .tenant_id("tnt-a")
        .status(sb_core::SessionStatus::Ended)
        .build();
    f.store.upsert_session(&scope(), session).await.unwrap();

    let err = f
        .queue
        .create_task(&scope(), draft("t", "p").session_id(SessionId::from_string("ses-1")))
        .await
        .unwrap_err();
    assert!(matches!(err, QueueError::SessionEnded(_)));
}

#[tokio::test]
async fn knative_flag_routes_to_event_fabric_as_queued() {
    let f = fixture();
    let mut metadata = TaskMetadata::default();
    metadata.knative = Some(true);
    let task = f
        .queue
        .create_task(&scope(), draft("session work", "do it").metadata(metadata))
        .await
        .unwrap();

    assert_eq!(task.status, TaskStatus::Queued);
    assert_eq!(task.metadata.delivery(), Some(DeliveryRoute::Events));
    assert_eq!(f.events.published_types(), vec!["task.created".to_string()]);
}

#[tokio::test]
async fn knative_task_is_never_stream_broadcast() {
    let f = fixture();
    let channel = f.registry.register(Worker::builder().id("w-1").build());
    // Drain the connected frame.
    channel.next_frame().await.unwrap();

    let mut metadata = TaskMetadata::default();
    metadata.knative = Some(true);
    f.queue.create_task(&scope(), draft("t", "p").metadata(metadata)).await.unwrap();

    // Only one delivery route: nothing on the stream beyond connected.
    assert!(channel.channel_id().starts_with("chn-"));
    assert_eq!(f.registry.dropped_frames(&"w-1".into()), 0);
    let buffered = tokio::time::timeout(
        std::time::Duration::from_millis(20),
        channel.next_frame(),
    )
    .await;
    assert!(buffered.is_err(), "no frame should arrive for an events-route task");
}

#[tokio::test]
async fn event_delivery_failure_fails_the_task() {
    let events = Arc::new(FakeEventSink::new());
    events.set_fail(true);
    let f = fixture_with_events(events);

    let mut metadata = TaskMetadata::default();
    metadata.knative = Some(true);
    let task =
        f.queue.create_task(&scope(), draft("t", "p").metadata(metadata)).await.unwrap();

    assert_eq!(task.status, TaskStatus::Failed);
    assert!(task.error.as_deref().unwrap_or("").contains("event delivery failed"));
    assert!(task.metadata.extras.contains_key("delivery_error"));
    let stored = f.store.get_task(&scope(), &task.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TaskStatus::Failed);
}

#[tokio::test]
async fn claim_notifies_losers_and_updates_store() {
    let f = fixture();
    let loser = f.registry.register(Worker::builder().id("w-lose").build());
    loser.next_frame().await.unwrap();

    let task = f.queue.create_task(&scope(), draft("t", "p")).await.unwrap();
    // Drain the announcement the loser just received.
    loser.next_frame().await.unwrap();

    let outcome = f.queue.claim_task(&scope(), &task.id, &WorkerId::new("w-win")).await.unwrap();
    assert!(matches!(outcome, ClaimOutcome::Claimed(_)));

    match loser.next_frame().await.unwrap() {
        sb_wire::PushFrame::TaskClaimed { task_id, worker_id } => {
            assert_eq!(task_id, task.id);
            assert_eq!(worker_id, "w-win");
        }
        other => panic!("expected task_claimed, got {other:?}"),
    }

    let second =
        f.queue.claim_task(&scope(), &task.id, &WorkerId::new("w-late")).await.unwrap();
    assert!(matches!(second, ClaimOutcome::AlreadyClaimed));
}

#[tokio::test]
async fn repeated_announcements_allow_at_most_one_claim() {
    let f = fixture();
    let task = f.queue.create_task(&scope(), draft("t", "p")).await.unwrap();
    // Advertising repeatedly (sweep re-advertisement) must not enable a
    // second claim.
    f.queue.readvertise_pending(10).await.unwrap();
    f.queue.readvertise_pending(10).await.unwrap();

    let first = f.queue.claim_task(&scope(), &task.id, &WorkerId::new("w-1")).await.unwrap();
    let second = f.queue.claim_task(&scope(), &task.id, &WorkerId::new("w-2")).await.unwrap();
    assert!(matches!(first, ClaimOutcome::Claimed(_)));
    assert!(matches!(second, ClaimOutcome::AlreadyClaimed));
}

#[tokio::test]
async fn release_lifecycle_happy_path() {
    let f = fixture();
    let task = f.queue.create_task(&scope(), draft("t", "p")).await.unwrap();
    let worker = WorkerId::new("w-1");
    f.queue.claim_task(&scope(), &task.id, &worker).await.unwrap();
    f.clock.advance(std::time::Duration::from_secs(1));
    f.queue.mark_running(&scope(), &task.id, &worker, None).await.unwrap();

    let release = TaskRelease {
        task_id: task.id,
        worker_id: worker,
        status: TaskStatus::Completed,
        result: Some("done".to_string()),
        error: None,
        session_id: None,
        model_used: Some("anthropic/claude-sonnet-4".to_string()),
    };
    let outcome = f.queue.release_task(&scope(), release).await.unwrap();
    match outcome {
        UpdateOutcome::Updated(task) => {
            assert_eq!(task.status, TaskStatus::Completed);
            assert_eq!(task.result.as_deref(), Some("done"));
            assert_eq!(task.model_used.as_deref(), Some("anthropic/claude-sonnet-4"));
        }
        other => panic!("expected Updated, got {other:?}"),
    }
}

#[tokio::test]
async fn release_rejects_non_terminal_status() {
    let f = fixture();
    let task = f.queue.create_task(&scope(), draft("t", "p")).await.unwrap();
    let release = TaskRelease {
        task_id: task.id,
        worker_id: WorkerId::new("w-1"),
        status: TaskStatus::Running,
        result: None,
        error: None,
        session_id: None,
        model_used: None,
    };
    let err = f.queue.release_task(&scope(), release).await.unwrap_err();
    assert!(matches!(err, QueueError::InvalidReleaseStatus(TaskStatus::Running)));
}

#[tokio::test]
async fn cancel_preclaim_cancels_directly() {
    let f = fixture();
    let task = f.queue.create_task(&scope(), draft("t", "p")).await.unwrap();
    let outcome = f.queue.cancel_task(&scope(), &task.id).await.unwrap();
    assert!(matches!(outcome, CancelOutcome::Cancelled(_)));

    // Terminal cancel conflicts and leaves the task untouched.
    let outcome = f.queue.cancel_task(&scope(), &task.id).await.unwrap();
    assert!(matches!(outcome, CancelOutcome::Terminal(_)));
}

#[tokio::test]
async fn cancel_after_claim_sends_interrupt() {
    let f = fixture();
    let channel = f.registry.register(Worker::builder().id("w-own").build());
    channel.next_frame().await.unwrap();

    let task = f.queue.create_task(&scope(), draft("t", "p")).await.unwrap();
    channel.next_frame().await.unwrap();
    f.queue.claim_task(&scope(), &task.id, &WorkerId::new("w-own")).await.unwrap();

    let outcome = f.queue.cancel_task(&scope(), &task.id).await.unwrap();
    assert!(matches!(outcome, CancelOutcome::Claimed(_)));

    match channel.next_frame().await.unwrap() {
        sb_wire::PushFrame::Interrupt { task_id, .. } => assert_eq!(task_id, task.id),
        other => panic!("expected interrupt, got {other:?}"),
    }
    // The task itself is not mutated by the advisory interrupt.
    let stored = f.store.get_task(&scope(), &task.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TaskStatus::Assigned);
}

#[tokio::test]
async fn requeue_abandoned_resets_and_readvertises() {
    let f = fixture();
    let task = f.queue.create_task(&scope(), draft("t", "p")).await.unwrap();
    let dead = WorkerId::new("w-dead");
    f.queue.claim_task(&scope(), &task.id, &dead).await.unwrap();

    let survivor = f.registry.register(Worker::builder().id("w-alive").build());
    survivor.next_frame().await.unwrap();

    let requeued = f.queue.requeue_abandoned(&dead).await.unwrap();
    assert_eq!(requeued.len(), 1);
    assert_eq!(requeued[0].status, TaskStatus::Pending);
    assert!(requeued[0].worker_id.is_none());

    match survivor.next_frame().await.unwrap() {
        sb_wire::PushFrame::TaskAvailable(announcement) => {
            assert_eq!(announcement.task_id, task.id);
        }
        other => panic!("expected re-advertisement, got {other:?}"),
    }

    // The survivor can claim and complete it.
    let outcome =
        f.queue.claim_task(&scope(), &task.id, &WorkerId::new("w-alive")).await.unwrap();
    assert!(matches!(outcome, ClaimOutcome::Claimed(_)));
}

#[tokio::test]
async fn task_updated_events_published_when_sink_enabled() {
    let f = fixture();
    let task = f.queue.create_task(&scope(), draft("t", "p")).await.unwrap();
    f.queue.claim_task(&scope(), &task.id, &WorkerId::new("w-1")).await.unwrap();
    let release = TaskRelease {
        task_id: task.id,
        worker_id: WorkerId::new("w-1"),
        status: TaskStatus::Completed,
        result: None,
        error: None,
        session_id: None,
        model_used: None,
    };
    f.queue.release_task(&scope(), release).await.unwrap();

    let types = f.events.published_types();
    assert_eq!(
        types.iter().filter(|t| t.as_str() == "task.updated").count(),
        2,
        "claim and release each publish task.updated: {types:?}"
    );
}

#[tokio::test]
async fn personality_routing_flows_into_the_task() {
    let clock = FakeClock::new();
    let store = Arc::new(MemStore::new());
    let registry = Arc::new(WorkerRegistry::new(RegistryConfig::default(), clock.clone()));
    let mut routing = sb_core::RoutingConfig::default();
    routing.personality_agents.insert("reviewer".into(), "code-reviewer".into());
    routing.personality_models.insert("reviewer".into(), "anthropic:claude-sonnet-4".into());
    let queue = TaskQueue::new(
        store as Arc<dyn sb_storage::Store>,
        Arc::new(FakeEventSink::disabled()) as Arc<dyn EventSink>,
        registry,
        routing,
        clock,
    );

    let task = queue
        .create_task(&scope(), draft("review", "review the change").worker_personality("reviewer"))
        .await
        .unwrap();

    assert_eq!(task.target_agent_name.as_deref(), Some("code-reviewer"));
    assert_eq!(task.model_ref.as_ref().unwrap().canonical(), "anthropic:claude-sonnet-4");
    assert_eq!(task.model.as_deref(), Some("anthropic/claude-sonnet-4"));
    assert_eq!(task.metadata.to_value()["model"], json!("anthropic/claude-sonnet-4"));
}
