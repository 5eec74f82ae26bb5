// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task metadata bags.
//!
//! Metadata is a tagged union: well-known keys are typed fields, everything
//! else is opaque JSON carried in `extras` and preserved end-to-end. The
//! router reads hint keys (budget, latency, quality, tier clamps) from the
//! extras without interpreting anything it does not recognize.

use crate::routing::{Complexity, ModelSource, ModelTier};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Which fabric a task was advertised on. Exactly one route is chosen per
/// task and stamped into the routing metadata for audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryRoute {
    /// Push stream to connected workers.
    Stream,
    /// Event-bus fan-out to dynamically spawned workers.
    Events,
}

crate::simple_display! {
    DeliveryRoute {
        Stream => "stream",
        Events => "events",
    }
}

/// The `routing` sub-object written by the policy engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoutingMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity: Option<Complexity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_tier: Option<ModelTier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_source: Option<ModelSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_agent_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_personality: Option<String>,
    /// Policy version stamp, e.g. `"switchboard.routing.v1"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery: Option<DeliveryRoute>,
    #[serde(flatten)]
    pub extras: Map<String, Value>,
}

impl RoutingMeta {
    fn str_field(&self, key: &str) -> Option<&str> {
        let value = match key {
            "model_ref" => self.model_ref.as_deref(),
            "target_agent_name" => self.target_agent_name.as_deref(),
            "worker_personality" => self.worker_personality.as_deref(),
            _ => self.extras.get(key).and_then(Value::as_str),
        };
        value.map(str::trim).filter(|s| !s.is_empty())
    }
}

/// Free-form task metadata with a well-known-keys projection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routing: Option<RoutingMeta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_ref: Option<String>,
    /// Wire-form (`provider/model`) mirror of `model_ref`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_agent_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_personality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity: Option<Complexity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_tier: Option<ModelTier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notify_email: Option<String>,
    /// Set when the task is routed to a dynamically spawned session worker;
    /// such tasks are delivered via the event bus, never the push stream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knative: Option<bool>,
    /// Everything else, preserved verbatim.
    #[serde(flatten)]
    pub extras: Map<String, Value>,
}

impl TaskMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from an arbitrary JSON object (unknown keys land in `extras`).
    pub fn from_value(value: Value) -> Self {
        serde_json::from_value(value).unwrap_or_default()
    }

    /// Render back to a JSON object.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| Value::Object(Map::new()))
    }

    fn known_str(&self, key: &str) -> Option<&str> {
        let value = match key {
            "model_ref" => self.model_ref.as_deref(),
            "model" => self.model.as_deref(),
            "target_agent_name" => self.target_agent_name.as_deref(),
            "worker_personality" => self.worker_personality.as_deref(),
            "tenant_id" => self.tenant_id.as_deref(),
            "session_id" => self.session_id.as_deref(),
            "notify_email" => self.notify_email.as_deref(),
            _ => None,
        };
        value.map(str::trim).filter(|s| !s.is_empty())
    }

    /// Look up the first non-empty string hint among `keys`, checking typed
    /// fields, then extras, then the `routing` sub-object.
    pub fn str_hint(&self, keys: &[&str]) -> Option<&str> {
        for key in keys {
            if let Some(v) = self.known_str(key) {
                return Some(v);
            }
            if let Some(v) = self
                .extras
                .get(*key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
            {
                return Some(v);
            }
        }
        let routing = self.routing.as_ref()?;
        keys.iter().find_map(|key| routing.str_field(key))
    }

    /// Truthy flag lookup: `true`, `"true"`, `"1"`, `"yes"`, `"on"`.
    pub fn flag(&self, key: &str) -> bool {
        let value = match key {
            "knative" => return self.knative.unwrap_or(false),
            _ => self.extras.get(key),
        };
        match value {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => {
                matches!(s.trim().to_lowercase().as_str(), "true" | "1" | "yes" | "on")
            }
            _ => false,
        }
    }

    /// Required-capability list, when the caller supplied one.
    pub fn required_capabilities(&self) -> Vec<String> {
        self.extras
            .get("required_capabilities")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Mutable access to the routing sub-object, creating it when absent.
    pub fn routing_mut(&mut self) -> &mut RoutingMeta {
        self.routing.get_or_insert_with(RoutingMeta::default)
    }

    /// The audited delivery route, when one has been stamped.
    pub fn delivery(&self) -> Option<DeliveryRoute> {
        self.routing.as_ref().and_then(|r| r.delivery)
    }
}

#[cfg(test)]
#[path = "metadata_tests.rs"]
mod tests;
