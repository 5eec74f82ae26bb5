// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

#[test]
fn create_task_request_minimal_body() {
    let request: CreateTaskRequest = serde_json::from_value(json!({
        "title": "rename foo",
        "prompt": "rename foo to bar",
    }))
    .unwrap();
    assert_eq!(request.codebase_id, None);
    assert_eq!(request.agent_type, None);
    assert_eq!(request.priority, 0);
    assert!(request.files.is_empty());
}

#[test]
fn create_task_request_full_body() {
    let request: CreateTaskRequest = serde_json::from_value(json!({
        "codebase_id": "cbs-1",
        "title": "t",
        "prompt": "p",
        "agent_type": "plan",
        "files": ["a.py"],
        "priority": 3,
        "worker_personality": "reviewer",
        "metadata": {"budget": "low"},
    }))
    .unwrap();
    assert_eq!(request.codebase_id.as_deref(), Some("cbs-1"));
    assert_eq!(request.worker_personality.as_deref(), Some("reviewer"));
    assert_eq!(request.metadata.unwrap()["budget"], "low");
}

#[test]
fn release_request_defaults() {
    let request: ReleaseTaskRequest = serde_json::from_value(json!({
        "task_id": "tsk-1",
        "status": "completed",
    }))
    .unwrap();
    assert_eq!(request.status, "completed");
    assert!(request.result.is_none());
    assert!(request.worker_id.is_none());
}

#[test]
fn cronjob_request_enabled_by_default() {
    let request: CreateCronjobRequest = serde_json::from_value(json!({
        "name": "health",
        "cron_expression": "*/5 * * * *",
    }))
    .unwrap();
    assert!(request.enabled);
    assert!(request.task_template.is_none());
}

#[test]
fn missing_required_fields_fail_to_parse() {
    let malformed: Result<CreateTaskRequest, _> =
        serde_json::from_value(json!({"title": "no prompt"}));
    assert!(malformed.is_err());
}
