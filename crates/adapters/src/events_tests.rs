// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use sb_core::{SessionId, Task, TaskStatus, WorkerId};

#[test]
fn task_created_envelope_carries_routing_tuple() {
    let task = Task::builder()
        .id("tsk-1")
        .model("anthropic/claude-sonnet-4")
        .session_id(SessionId::from_string("ses-9"))
        .build();
    let envelope = EventEnvelope::task_created(&task);

    assert_eq!(envelope.event_type, TASK_CREATED);
    assert_eq!(envelope.session_id, "ses-9");
    assert_eq!(envelope.extensions["taskid"], "tsk-1");
    assert_eq!(envelope.extensions["model"], "anthropic/claude-sonnet-4");
    assert_eq!(envelope.body["prompt"], "do the thing");
    assert_eq!(envelope.body["tenant_id"], "tnt-test");
}

#[test]
fn task_updated_envelope_carries_status_and_worker() {
    let mut task = Task::builder().id("tsk-2").status(TaskStatus::Running).build();
    task.worker_id = Some(WorkerId::new("w-1"));
    let envelope = EventEnvelope::task_updated(&task);

    assert_eq!(envelope.event_type, TASK_UPDATED);
    assert_eq!(envelope.extensions["taskstatus"], "running");
    assert_eq!(envelope.extensions["workerid"], "w-1");
    assert_eq!(envelope.body["status"], "running");
}

#[test]
fn envelope_ids_are_unique() {
    let a = EventEnvelope::new(TASK_CREATED, "ses-1");
    let b = EventEnvelope::new(TASK_CREATED, "ses-1");
    assert_ne!(a.event_id, b.event_id);
}

#[test]
fn session_event_wraps_body() {
    let session = SessionId::from_string("ses-3");
    let envelope = EventEnvelope::session_event(
        &session,
        SESSION_ENDED,
        serde_json::json!({"reason": "client request"}),
    );
    assert_eq!(envelope.event_type, SESSION_ENDED);
    assert_eq!(envelope.body["reason"], "client request");
}

#[tokio::test]
async fn disabled_publisher_is_a_noop_success() {
    let publisher = HttpEventPublisher::new(EventPublisherConfig {
        enabled: false,
        // Guaranteed-unreachable sink: a no-op must not touch the network.
        sink_url: "http://127.0.0.1:1/broker".to_string(),
        ..EventPublisherConfig::default()
    });
    assert!(!publisher.is_enabled());
    let envelope = EventEnvelope::new(TASK_CREATED, "ses-1");
    publisher.publish(envelope).await.unwrap();
}

#[test]
fn type_prefixing_is_idempotent() {
    let publisher = HttpEventPublisher::new(EventPublisherConfig::default());
    assert_eq!(publisher.full_type("task.created"), "switchboard.task.created");
    assert_eq!(publisher.full_type("switchboard.task.created"), "switchboard.task.created");
}

#[tokio::test]
async fn fake_sink_records_and_fails_on_demand() {
    let sink = FakeEventSink::new();
    sink.publish(EventEnvelope::new(TASK_CREATED, "ses-1")).await.unwrap();
    assert_eq!(sink.published_types(), vec![TASK_CREATED.to_string()]);

    sink.set_fail(true);
    let err = sink.publish(EventEnvelope::new(TASK_UPDATED, "ses-1")).await.unwrap_err();
    assert!(matches!(err, PublishError::SinkUnavailable(_)));
}
