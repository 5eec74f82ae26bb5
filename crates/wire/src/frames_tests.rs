// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use sb_core::{CodebaseTarget, Task};
use yare::parameterized;

fn announcement() -> TaskAnnouncement {
    let task = Task::builder()
        .id("tsk-1")
        .codebase(CodebaseTarget::from_wire(Some("cbs-1")))
        .title("rename foo")
        .priority(2)
        .target_agent_name("code-reviewer")
        .model_ref(sb_core::ModelRef::parse("anthropic:claude-sonnet-4").unwrap())
        .build();
    TaskAnnouncement::from_task(&task)
}

#[test]
fn announcement_omits_the_prompt() {
    let frame = PushFrame::TaskAvailable(announcement());
    let encoded = frame.encode();
    assert!(!encoded.contains("do the thing"));
    assert!(encoded.contains("\"task_id\":\"tsk-1\""));
    assert!(encoded.contains("\"model_ref\":\"anthropic:claude-sonnet-4\""));
}

#[test]
fn encoding_uses_text_event_framing() {
    let frame = PushFrame::Heartbeat { seq: 3, time_ms: 12_000 };
    let encoded = frame.encode();
    assert!(encoded.starts_with("event: heartbeat\ndata: "));
    assert!(encoded.ends_with("\n\n"));
}

#[parameterized(
    connected = { PushFrame::Connected { channel_id: "ch-1".into(), worker_id: "w-1".into() } },
    heartbeat = { PushFrame::Heartbeat { seq: 9, time_ms: 42 } },
    claimed = { PushFrame::TaskClaimed { task_id: "tsk-1".into(), worker_id: "w-2".into() } },
    interrupt = { PushFrame::Interrupt { task_id: "tsk-1".into(), reason: "client cancel".into() } },
)]
fn frames_round_trip(frame: PushFrame) {
    let decoded =
        PushFrame::decode(frame.event_name(), &frame.payload().to_string()).unwrap();
    assert_eq!(decoded, frame);
}

#[test]
fn task_available_round_trips() {
    let frame = PushFrame::TaskAvailable(announcement());
    let decoded = PushFrame::decode("task_available", &frame.payload().to_string()).unwrap();
    assert_eq!(decoded, frame);
}

#[test]
fn unknown_event_is_rejected() {
    let err = PushFrame::decode("mystery", "{}").unwrap_err();
    assert_eq!(err, FrameError::UnknownEvent("mystery".to_string()));
}

#[test]
fn malformed_payload_is_rejected() {
    let err = PushFrame::decode("heartbeat", "not json").unwrap_err();
    assert!(matches!(err, FrameError::BadPayload(_)));
}

#[test]
fn only_task_available_is_droppable() {
    assert!(PushFrame::TaskAvailable(announcement()).is_droppable());
    assert!(!PushFrame::Heartbeat { seq: 0, time_ms: 0 }.is_droppable());
    assert!(!PushFrame::Connected { channel_id: "c".into(), worker_id: "w".into() }.is_droppable());
}
