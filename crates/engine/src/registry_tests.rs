// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use sb_core::{FakeClock, TaskStatus};

fn registry() -> WorkerRegistry<FakeClock> {
    WorkerRegistry::new(RegistryConfig::default(), FakeClock::new())
}

fn small_registry(capacity: usize) -> WorkerRegistry<FakeClock> {
    WorkerRegistry::new(
        RegistryConfig { buffer_capacity: capacity, ..RegistryConfig::default() },
        FakeClock::new(),
    )
}

fn worker_for(id: &str, codebases: &[&str]) -> Worker {
    Worker::builder()
        .id(id)
        .codebases(codebases.iter().map(|s| s.to_string()).collect())
        .build()
}

fn task_for(codebase: Option<&str>) -> Task {
    Task::builder().codebase(CodebaseTarget::from_wire(codebase)).build()
}

async fn drain_connected(channel: &WorkerChannel<FakeClock>) {
    match channel.next_frame().await {
        Some(PushFrame::Connected { .. }) => {}
        other => panic!("expected connected frame first, got {other:?}"),
    }
}

#[tokio::test]
async fn first_frame_is_connected_with_channel_id() {
    let registry = registry();
    let channel = registry.register(worker_for("w-1", &["cbs-1"]));
    match channel.next_frame().await {
        Some(PushFrame::Connected { channel_id, worker_id }) => {
            assert_eq!(channel_id, channel.channel_id());
            assert_eq!(worker_id, "w-1");
        }
        other => panic!("expected connected, got {other:?}"),
    }
}

#[tokio::test]
async fn fan_out_matches_declared_codebases() {
    let registry = registry();
    let matching = registry.register(worker_for("w-match", &["cbs-1"]));
    let other = registry.register(worker_for("w-other", &["cbs-2"]));
    drain_connected(&matching).await;
    drain_connected(&other).await;

    let recipients = registry.broadcast_task_available(&task_for(Some("cbs-1")));
    assert_eq!(recipients, 1);

    match matching.next_frame().await {
        Some(PushFrame::TaskAvailable(announcement)) => {
            assert_eq!(announcement.task_id, "tsk-test");
        }
        other => panic!("expected task_available, got {other:?}"),
    }
}

#[tokio::test]
async fn global_tasks_reach_only_global_pool_workers() {
    let registry = registry();
    let _global = registry.register(worker_for("w-global", &[]));
    let _sentinel = registry.register(worker_for("w-sentinel", &["global"]));
    let _scoped = registry.register(worker_for("w-scoped", &["cbs-1"]));

    let recipients = registry.broadcast_task_available(&task_for(None));
    assert_eq!(recipients, 2);
}

#[tokio::test]
async fn pending_registration_tasks_reach_everyone() {
    let registry = registry();
    let _a = registry.register(worker_for("w-a", &["cbs-1"]));
    let _b = registry.register(worker_for("w-b", &[]));
    let recipients = registry.broadcast_task_available(&task_for(Some("__pending__")));
    assert_eq!(recipients, 2);
}

#[tokio::test]
async fn capability_superset_required() {
    let registry = registry();
    let capable = Worker::builder()
        .id("w-cap")
        .capabilities(["build".to_string(), "gpu".to_string()].into())
        .build();
    let _capable = registry.register(capable);
    let _plain = registry.register(worker_for("w-plain", &[]));

    let mut task = task_for(None);
    task.required_capabilities = vec!["gpu".to_string()];
    assert_eq!(registry.broadcast_task_available(&task), 1);
}

#[tokio::test]
async fn target_agent_name_matches_identity() {
    let registry = registry();
    let named = Worker::builder().id("w-1").name("code-reviewer").build();
    let _named = registry.register(named);
    let _other = registry.register(worker_for("w-2", &[]));

    let mut task = task_for(None);
    task.target_agent_name = Some("code-reviewer".to_string());
    assert_eq!(registry.broadcast_task_available(&task), 1);
}

#[tokio::test]
async fn personality_must_match_when_specified() {
    let registry = registry();
    let reviewer = Worker::builder().id("w-rev").personality("reviewer").build();
    let _reviewer = registry.register(reviewer);
    let _plain = registry.register(worker_for("w-plain", &[]));

    let mut task = task_for(None);
    task.worker_personality = Some("reviewer".to_string());
    assert_eq!(registry.broadcast_task_available(&task), 1);
}

#[tokio::test]
async fn backpressure_sheds_oldest_task_available_never_heartbeats() {
    let registry = small_registry(3);
    let channel = registry.register(worker_for("w-slow", &[]));
    // Buffer: [connected]. Two announcements fill it to capacity.
    let first = Task::builder().id("tsk-first").build();
    let second = Task::builder().id("tsk-second").build();
    let third = Task::builder().id("tsk-third").build();
    registry.broadcast_task_available(&first);
    registry.broadcast_task_available(&second);
    // Heartbeat on a full buffer evicts the oldest announcement.
    registry.broadcast_heartbeat();
    // A further announcement evicts the next-oldest announcement.
    registry.broadcast_task_available(&third);
    assert_eq!(registry.dropped_frames(&"w-slow".into()), 2);

    drain_connected(&channel).await;
    match channel.next_frame().await {
        Some(PushFrame::Heartbeat { .. }) => {}
        other => panic!("expected heartbeat to survive, got {other:?}"),
    }
    match channel.next_frame().await {
        Some(PushFrame::TaskAvailable(announcement)) => {
            assert_eq!(announcement.task_id, "tsk-third");
        }
        other => panic!("expected the newest announcement, got {other:?}"),
    }
}

#[tokio::test]
async fn unregister_closes_the_stream() {
    let registry = registry();
    let channel = registry.register(worker_for("w-1", &[]));
    drain_connected(&channel).await;
    registry.unregister(&"w-1".into());
    assert_eq!(channel.next_frame().await, None);
    assert!(!registry.is_connected(&"w-1".into()));
}

#[tokio::test]
async fn dropping_the_channel_unregisters_the_worker() {
    let registry = registry();
    let channel = registry.register(worker_for("w-1", &[]));
    assert!(registry.is_connected(&"w-1".into()));
    drop(channel);
    assert!(!registry.is_connected(&"w-1".into()));
}

#[tokio::test]
async fn reconnect_replaces_channel_and_drop_of_old_keeps_new() {
    let registry = registry();
    let old = registry.register(worker_for("w-1", &[]));
    let new = registry.register(worker_for("w-1", &[]));
    // The replaced channel is closed.
    assert_eq!(old.next_frame().await.map(|f| f.event_name()), Some("connected"));
    assert_eq!(old.next_frame().await, None);
    // Dropping the old handle must not evict the new registration.
    drop(old);
    assert!(registry.is_connected(&"w-1".into()));
    drop(new);
    assert!(!registry.is_connected(&"w-1".into()));
}

#[tokio::test]
async fn task_claimed_goes_to_everyone_but_the_winner() {
    let registry = registry();
    let winner = registry.register(worker_for("w-win", &[]));
    let loser = registry.register(worker_for("w-lose", &[]));
    drain_connected(&winner).await;
    drain_connected(&loser).await;

    registry.broadcast_task_claimed(&"tsk-1".into(), &"w-win".into());
    match loser.next_frame().await {
        Some(PushFrame::TaskClaimed { task_id, worker_id }) => {
            assert_eq!(task_id, "tsk-1");
            assert_eq!(worker_id, "w-win");
        }
        other => panic!("expected task_claimed, got {other:?}"),
    }
    assert!(winner.channel_id() != loser.channel_id());
}

#[tokio::test]
async fn interrupt_reaches_the_owning_worker() {
    let registry = registry();
    let channel = registry.register(worker_for("w-own", &[]));
    drain_connected(&channel).await;

    assert!(registry.send_interrupt(&"w-own".into(), &"tsk-1".into(), "client cancel"));
    assert!(!registry.send_interrupt(&"w-gone".into(), &"tsk-1".into(), "client cancel"));
    match channel.next_frame().await {
        Some(PushFrame::Interrupt { task_id, reason }) => {
            assert_eq!(task_id, "tsk-1");
            assert_eq!(reason, "client cancel");
        }
        other => panic!("expected interrupt, got {other:?}"),
    }
}

#[tokio::test]
async fn stale_workers_detected_after_liveness_window() {
    let clock = FakeClock::new();
    let registry = WorkerRegistry::new(
        RegistryConfig {
            heartbeat_interval: std::time::Duration::from_secs(10),
            liveness_misses: 3,
            ..RegistryConfig::default()
        },
        clock.clone(),
    );
    let channel = registry.register(worker_for("w-1", &[]));
    drain_connected(&channel).await;

    assert!(registry.stale_workers().is_empty());
    clock.advance(std::time::Duration::from_secs(31));
    assert_eq!(registry.stale_workers(), vec![sb_core::WorkerId::new("w-1")]);

    // Draining resets the window.
    registry.broadcast_heartbeat();
    channel.next_frame().await;
    assert!(registry.stale_workers().is_empty());
}

#[test]
fn eligibility_checks_claimable_status_independent() {
    // The predicate ignores status: arbitration happens at claim time.
    let worker = worker_for("w-1", &["cbs-1"]);
    let mut task = task_for(Some("cbs-1"));
    task.status = TaskStatus::Pending;
    assert!(super::eligible(&worker, &task));
}
