// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Outbound event publisher.
//!
//! Events are posted to an HTTP sink (a Knative broker ingress in
//! production) with CloudEvents binary-mode framing: the envelope travels
//! in `ce-*` headers, the payload as a JSON body. Delivery is fire-and-
//! forget with a bounded exponential-backoff retry; when publishing is
//! disabled the sink is a no-op returning success, which is the default
//! for local development.

use async_trait::async_trait;
use chrono::Utc;
use sb_core::{SessionId, Task};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

/// Event types emitted by the dispatch core. The configured source domain
/// is prepended on the wire (`switchboard.task.created`).
pub const TASK_CREATED: &str = "task.created";
pub const TASK_UPDATED: &str = "task.updated";
pub const SESSION_CREATED: &str = "session.created";
pub const SESSION_ENDED: &str = "session.ended";

#[derive(Debug, Error)]
pub enum PublishError {
    /// The sink is unreachable or answered 404; retried, then surfaced.
    #[error("event sink unavailable: {0}")]
    SinkUnavailable(String),

    #[error("event publish timed out after {0:?}")]
    Timeout(Duration),

    /// 4xx from the sink; terminal, never retried.
    #[error("event rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),
}

/// A structured event ready for delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct EventEnvelope {
    /// Unprefixed type (`task.created`); the publisher adds the source
    /// domain on the wire.
    pub event_type: String,
    pub event_id: String,
    pub session_id: String,
    /// CloudEvents extension attributes (`ce-<key>` headers).
    pub extensions: BTreeMap<String, String>,
    pub body: serde_json::Value,
}

impl EventEnvelope {
    pub fn new(event_type: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            event_id: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            extensions: BTreeMap::new(),
            body: serde_json::Value::Null,
        }
    }

    fn extension(mut self, key: &str, value: Option<String>) -> Self {
        if let Some(value) = value {
            self.extensions.insert(key.to_string(), value);
        }
        self
    }

    /// `task.created` — the task is ready to be routed to session workers.
    pub fn task_created(task: &Task) -> Self {
        let session = task.session_id.map(|s| s.to_string()).unwrap_or_default();
        Self::new(TASK_CREATED, session.clone())
            .extension("taskid", Some(task.id.to_string()))
            .extension("agent", Some(task.agent_type.clone()))
            .extension("model", task.model.clone())
            .extension("tenant", Some(task.tenant_id.to_string()))
            .with_body(serde_json::json!({
                "task_id": task.id,
                "session_id": session,
                "codebase_id": task.codebase,
                "title": task.title,
                "prompt": task.prompt,
                "agent": task.agent_type,
                "priority": task.priority,
                "model": task.model,
                "model_ref": task.model_ref,
                "target_agent_name": task.target_agent_name,
                "required_capabilities": task.required_capabilities,
                "tenant_id": task.tenant_id,
                "metadata": task.metadata,
            }))
    }

    /// `task.updated` — status change, optionally carrying result/error.
    pub fn task_updated(task: &Task) -> Self {
        let session = task.session_id.map(|s| s.to_string()).unwrap_or_default();
        Self::new(TASK_UPDATED, session.clone())
            .extension("taskid", Some(task.id.to_string()))
            .extension("taskstatus", Some(task.status.to_string()))
            .extension("workerid", task.worker_id.as_ref().map(|w| w.to_string()))
            .with_body(serde_json::json!({
                "task_id": task.id,
                "session_id": session,
                "status": task.status,
                "result": task.result,
                "error": task.error,
                "worker_id": task.worker_id,
            }))
    }

    /// Generic `session.*` event.
    pub fn session_event(
        session_id: &SessionId,
        event_type: &str,
        body: serde_json::Value,
    ) -> Self {
        Self::new(event_type, session_id.to_string()).with_body(body)
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = body;
        self
    }
}

/// Fire-and-forget delivery of structured events.
#[async_trait]
pub trait EventSink: Send + Sync {
    fn is_enabled(&self) -> bool;

    /// Deliver one event. Implementations retry transient failures with
    /// bounded backoff; a returned error means delivery definitively failed.
    async fn publish(&self, envelope: EventEnvelope) -> Result<(), PublishError>;
}

#[derive(Debug, Clone)]
pub struct EventPublisherConfig {
    pub enabled: bool,
    pub sink_url: String,
    /// CloudEvents `source` attribute and type prefix.
    pub source: String,
    pub retry_max: u32,
    pub retry_initial_delay: Duration,
    pub timeout: Duration,
}

impl Default for EventPublisherConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            sink_url: "http://broker-ingress.knative-eventing.svc.cluster.local/switchboard/task-broker"
                .to_string(),
            source: "switchboard".to_string(),
            retry_max: 3,
            retry_initial_delay: Duration::from_secs(1),
            timeout: Duration::from_secs(10),
        }
    }
}

/// HTTP implementation of [`EventSink`].
pub struct HttpEventPublisher {
    config: EventPublisherConfig,
    client: reqwest::Client,
}

impl HttpEventPublisher {
    pub fn new(config: EventPublisherConfig) -> Self {
        Self { config, client: reqwest::Client::new() }
    }

    fn full_type(&self, event_type: &str) -> String {
        let prefix = format!("{}.", self.config.source);
        if event_type.starts_with(&prefix) {
            event_type.to_string()
        } else {
            format!("{prefix}{event_type}")
        }
    }

    async fn attempt(&self, envelope: &EventEnvelope) -> Result<(), PublishError> {
        let now = Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        let mut request = self
            .client
            .post(&self.config.sink_url)
            .timeout(self.config.timeout)
            .header("ce-specversion", "1.0")
            .header("ce-type", self.full_type(&envelope.event_type))
            .header("ce-source", &self.config.source)
            .header("ce-id", &envelope.event_id)
            .header("ce-time", now)
            .header("ce-session", &envelope.session_id)
            .json(&envelope.body);
        for (key, value) in &envelope.extensions {
            request = request.header(format!("ce-{key}"), value);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                PublishError::Timeout(self.config.timeout)
            } else if e.is_connect() {
                PublishError::SinkUnavailable(format!(
                    "cannot connect to {}: {e}",
                    self.config.sink_url
                ))
            } else {
                PublishError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        if status.as_u16() == 404 {
            Err(PublishError::SinkUnavailable(format!(
                "sink not found at {} (404)",
                self.config.sink_url
            )))
        } else if status.is_server_error() {
            Err(PublishError::Transport(format!("sink error {status}: {body}")))
        } else {
            Err(PublishError::Rejected { status: status.as_u16(), body })
        }
    }
}

#[async_trait]
impl EventSink for HttpEventPublisher {
    fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    async fn publish(&self, envelope: EventEnvelope) -> Result<(), PublishError> {
        if !self.config.enabled {
            tracing::debug!(event_type = %envelope.event_type, "event sink disabled, skipping");
            return Ok(());
        }

        let mut delay = self.config.retry_initial_delay;
        let mut last_error = None;
        for attempt in 0..=self.config.retry_max {
            match self.attempt(&envelope).await {
                Ok(()) => {
                    tracing::debug!(
                        event_type = %envelope.event_type,
                        event_id = %envelope.event_id,
                        attempt,
                        "event published"
                    );
                    return Ok(());
                }
                // 4xx (other than the 404 broker-missing case) is terminal.
                Err(err @ PublishError::Rejected { .. }) => return Err(err),
                Err(err) => {
                    tracing::warn!(
                        event_type = %envelope.event_type,
                        attempt = attempt + 1,
                        attempts = self.config.retry_max + 1,
                        error = %err,
                        "event publish attempt failed"
                    );
                    last_error = Some(err);
                }
            }
            if attempt < self.config.retry_max {
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
        }
        Err(last_error
            .unwrap_or_else(|| PublishError::Transport("publish failed".to_string())))
    }
}

/// Recording sink for tests. Delivery can be forced to fail.
#[cfg(any(test, feature = "test-support"))]
pub struct FakeEventSink {
    enabled: bool,
    fail: parking_lot::Mutex<bool>,
    published: parking_lot::Mutex<Vec<EventEnvelope>>,
}

#[cfg(any(test, feature = "test-support"))]
impl FakeEventSink {
    pub fn new() -> Self {
        Self {
            enabled: true,
            fail: parking_lot::Mutex::new(false),
            published: parking_lot::Mutex::new(Vec::new()),
        }
    }

    pub fn disabled() -> Self {
        Self { enabled: false, ..Self::new() }
    }

    pub fn set_fail(&self, fail: bool) {
        *self.fail.lock() = fail;
    }

    pub fn published(&self) -> Vec<EventEnvelope> {
        self.published.lock().clone()
    }

    pub fn published_types(&self) -> Vec<String> {
        self.published.lock().iter().map(|e| e.event_type.clone()).collect()
    }
}

#[cfg(any(test, feature = "test-support"))]
impl Default for FakeEventSink {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl EventSink for FakeEventSink {
    fn is_enabled(&self) -> bool {
        self.enabled
    }

    async fn publish(&self, envelope: EventEnvelope) -> Result<(), PublishError> {
        if !self.enabled {
            return Ok(());
        }
        if *self.fail.lock() {
            return Err(PublishError::SinkUnavailable("fake sink failure".to_string()));
        }
        self.published.lock().push(envelope);
        Ok(())
    }
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
