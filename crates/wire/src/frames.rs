// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Push-stream frames.
//!
//! The push fabric writes discrete text-framed events down each worker's
//! stream: an `event:` line naming the frame, a `data:` line carrying a
//! JSON payload, and a blank-line terminator. `task_available` carries the
//! minimal routing tuple only; the worker pulls the full task via a claim
//! request.

use sb_core::{ModelRef, Task, TaskId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum FrameError {
    #[error("unknown frame event {0:?}")]
    UnknownEvent(String),
    #[error("frame payload does not parse: {0}")]
    BadPayload(String),
}

/// Minimal routing tuple advertised to eligible workers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskAnnouncement {
    pub task_id: TaskId,
    pub codebase_id: Option<String>,
    pub title: String,
    pub priority: i32,
    #[serde(default)]
    pub required_capabilities: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_agent_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_personality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_ref: Option<String>,
}

impl TaskAnnouncement {
    pub fn from_task(task: &Task) -> Self {
        Self {
            task_id: task.id,
            codebase_id: task.codebase.to_wire(),
            title: task.title.clone(),
            priority: task.priority,
            required_capabilities: task.required_capabilities.clone(),
            target_agent_name: task.target_agent_name.clone(),
            worker_personality: task.worker_personality.clone(),
            model_ref: task.model_ref.as_ref().map(ModelRef::canonical),
        }
    }
}

/// One server-to-worker event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "frame", rename_all = "snake_case")]
pub enum PushFrame {
    /// First frame after registration, carrying the logical channel id.
    Connected { channel_id: String, worker_id: String },
    /// Periodic keep-alive. Never dropped by backpressure.
    Heartbeat { seq: u64, time_ms: u64 },
    TaskAvailable(TaskAnnouncement),
    /// Another worker won the claim; recipients may drop local state.
    TaskClaimed { task_id: TaskId, worker_id: String },
    /// Advisory cancellation for a task this worker owns.
    Interrupt { task_id: TaskId, reason: String },
}

impl PushFrame {
    /// The `event:` line value.
    pub fn event_name(&self) -> &'static str {
        match self {
            PushFrame::Connected { .. } => "connected",
            PushFrame::Heartbeat { .. } => "heartbeat",
            PushFrame::TaskAvailable(_) => "task_available",
            PushFrame::TaskClaimed { .. } => "task_claimed",
            PushFrame::Interrupt { .. } => "interrupt",
        }
    }

    /// The `data:` line payload.
    pub fn payload(&self) -> serde_json::Value {
        match self {
            PushFrame::Connected { channel_id, worker_id } => serde_json::json!({
                "channel_id": channel_id,
                "worker_id": worker_id,
            }),
            PushFrame::Heartbeat { seq, time_ms } => serde_json::json!({
                "seq": seq,
                "time_ms": time_ms,
            }),
            PushFrame::TaskAvailable(announcement) => {
                serde_json::to_value(announcement).unwrap_or_default()
            }
            PushFrame::TaskClaimed { task_id, worker_id } => serde_json::json!({
                "task_id": task_id,
                "worker_id": worker_id,
            }),
            PushFrame::Interrupt { task_id, reason } => serde_json::json!({
                "task_id": task_id,
                "reason": reason,
            }),
        }
    }

    /// Render the full text framing (`event:` + `data:` + blank line).
    pub fn encode(&self) -> String {
        format!("event: {}\ndata: {}\n\n", self.event_name(), self.payload())
    }

    /// Parse a frame from its event name and data payload.
    pub fn decode(event: &str, data: &str) -> Result<Self, FrameError> {
        let payload: serde_json::Value =
            serde_json::from_str(data).map_err(|e| FrameError::BadPayload(e.to_string()))?;
        let frame = match event {
            "connected" | "heartbeat" | "task_claimed" | "interrupt" => {
                let mut tagged = serde_json::Map::new();
                tagged.insert("frame".to_string(), serde_json::Value::String(event.to_string()));
                if let serde_json::Value::Object(fields) = payload {
                    tagged.extend(fields);
                }
                serde_json::from_value(serde_json::Value::Object(tagged))
                    .map_err(|e| FrameError::BadPayload(e.to_string()))?
            }
            "task_available" => {
                let announcement: TaskAnnouncement = serde_json::from_value(payload)
                    .map_err(|e| FrameError::BadPayload(e.to_string()))?;
                PushFrame::TaskAvailable(announcement)
            }
            other => return Err(FrameError::UnknownEvent(other.to_string())),
        };
        Ok(frame)
    }

    /// True for frames that may be shed under backpressure.
    pub fn is_droppable(&self) -> bool {
        matches!(self, PushFrame::TaskAvailable(_))
    }
}

#[cfg(test)]
#[path = "frames_tests.rs"]
mod tests;
