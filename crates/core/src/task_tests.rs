// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    pending_to_queued = { TaskStatus::Pending, TaskStatus::Queued, true },
    pending_to_assigned = { TaskStatus::Pending, TaskStatus::Assigned, true },
    queued_to_assigned = { TaskStatus::Queued, TaskStatus::Assigned, true },
    pending_to_cancelled = { TaskStatus::Pending, TaskStatus::Cancelled, true },
    queued_to_cancelled = { TaskStatus::Queued, TaskStatus::Cancelled, true },
    queued_to_failed = { TaskStatus::Queued, TaskStatus::Failed, true },
    pending_to_failed = { TaskStatus::Pending, TaskStatus::Failed, false },
    assigned_to_running = { TaskStatus::Assigned, TaskStatus::Running, true },
    running_to_completed = { TaskStatus::Running, TaskStatus::Completed, true },
    running_to_failed = { TaskStatus::Running, TaskStatus::Failed, true },
    assigned_to_completed = { TaskStatus::Assigned, TaskStatus::Completed, true },
    running_to_cancelled = { TaskStatus::Running, TaskStatus::Cancelled, true },
    pending_to_running = { TaskStatus::Pending, TaskStatus::Running, false },
    queued_to_running = { TaskStatus::Queued, TaskStatus::Running, false },
    completed_to_running = { TaskStatus::Completed, TaskStatus::Running, false },
    completed_to_failed = { TaskStatus::Completed, TaskStatus::Failed, false },
    cancelled_to_assigned = { TaskStatus::Cancelled, TaskStatus::Assigned, false },
    failed_to_pending = { TaskStatus::Failed, TaskStatus::Pending, false },
    assigned_to_pending = { TaskStatus::Assigned, TaskStatus::Pending, false },
)]
fn transition_legality(from: TaskStatus, to: TaskStatus, allowed: bool) {
    assert_eq!(from.can_transition_to(to), allowed);
}

#[test]
fn status_predicates() {
    assert!(TaskStatus::Pending.is_claimable());
    assert!(TaskStatus::Queued.is_claimable());
    assert!(!TaskStatus::Assigned.is_claimable());
    assert!(TaskStatus::Assigned.is_claimed());
    assert!(TaskStatus::Running.is_claimed());
    assert!(TaskStatus::Completed.is_terminal());
    assert!(TaskStatus::Failed.is_terminal());
    assert!(TaskStatus::Cancelled.is_terminal());
    assert!(!TaskStatus::Running.is_terminal());
}

#[test]
fn apply_status_sets_started_once() {
    let mut task = Task::builder().status(TaskStatus::Assigned).build();
    assert!(task.apply_status(TaskStatus::Running, 100).unwrap());
    assert_eq!(task.started_at_ms, Some(100));

    // Second RUNNING report is absorbed without resetting the timestamp.
    assert!(!task.apply_status(TaskStatus::Running, 200).unwrap());
    assert_eq!(task.started_at_ms, Some(100));
}

#[test]
fn apply_status_sets_completed_once() {
    let mut task = Task::builder().status(TaskStatus::Running).started_at_ms(50u64).build();
    assert!(task.apply_status(TaskStatus::Completed, 300).unwrap());
    assert_eq!(task.completed_at_ms, Some(300));
    assert_eq!(task.status, TaskStatus::Completed);

    // Repeated identical terminal write is acknowledged without change.
    assert!(!task.apply_status(TaskStatus::Completed, 999).unwrap());
    assert_eq!(task.completed_at_ms, Some(300));
}

#[test]
fn terminal_states_reject_other_transitions() {
    let mut task = Task::builder().status(TaskStatus::Completed).build();
    let err = task.apply_status(TaskStatus::Failed, 10).unwrap_err();
    assert_eq!(err, InvalidTransition { from: TaskStatus::Completed, to: TaskStatus::Failed });
    assert_eq!(task.status, TaskStatus::Completed);
}

#[test]
fn cancel_before_claim_is_legal() {
    let mut task = Task::builder().build();
    assert!(task.apply_status(TaskStatus::Cancelled, 10).unwrap());
    assert_eq!(task.completed_at_ms, Some(10));
}

#[test]
fn reset_for_requeue_clears_worker_and_start() {
    let mut task = Task::builder()
        .status(TaskStatus::Running)
        .worker_id("worker-1")
        .started_at_ms(10u64)
        .build();
    task.reset_for_requeue();
    assert_eq!(task.status, TaskStatus::Pending);
    assert!(task.worker_id.is_none());
    assert!(task.started_at_ms.is_none());
}

#[test]
fn from_draft_defaults() {
    let draft = TaskDraft::new("tnt-a", "title", "prompt")
        .codebase(CodebaseTarget::from_wire(Some("cbs-x")))
        .priority(3)
        .worker_personality("reviewer");
    let task = Task::from_draft(draft, 42);
    assert_eq!(task.status, TaskStatus::Pending);
    assert_eq!(task.priority, 3);
    assert_eq!(task.created_at_ms, 42);
    assert_eq!(task.worker_personality.as_deref(), Some("reviewer"));
    assert!(task.worker_id.is_none());
}

#[test]
fn task_serde_round_trip() {
    let task = Task::builder()
        .codebase(CodebaseTarget::from_wire(Some("cbs-one")))
        .model_ref(ModelRef::parse("anthropic:claude-sonnet-4").unwrap())
        .build();
    let json = serde_json::to_value(&task).unwrap();
    assert_eq!(json["codebase_id"], "cbs-one");
    assert_eq!(json["model_ref"], "anthropic:claude-sonnet-4");
    let parsed: Task = serde_json::from_value(json).unwrap();
    assert_eq!(parsed, task);
}

#[test]
fn global_task_serializes_null_codebase() {
    let task = Task::builder().build();
    let json = serde_json::to_value(&task).unwrap();
    assert!(json["codebase_id"].is_null());
}
