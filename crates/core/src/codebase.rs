// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Codebase records and task targeting.
//!
//! A codebase is an opaque workspace owned (usually) by one worker. The
//! control plane never interprets the path; only the owning worker does.

use crate::tenant::TenantId;
use crate::worker::WorkerId;
use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for a registered codebase.
    pub struct CodebaseId("cbs-");
}

/// Sentinel accepted on the wire for tasks not bound to any codebase.
pub const GLOBAL_SENTINEL: &str = "global";

/// Sentinel for registration tasks claimable before a codebase exists.
pub const PENDING_SENTINEL: &str = "__pending__";

/// Where a task is aimed: a concrete codebase, the global pool, or the
/// pending-registration pool.
///
/// The wire form is `Option<String>`: `None`/`"global"` → `Global`,
/// `"__pending__"` → `PendingRegistration`, anything else → `Codebase`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CodebaseTarget {
    Global,
    PendingRegistration,
    Codebase(CodebaseId),
}

impl CodebaseTarget {
    /// Parse the wire representation, normalizing the `"global"` alias.
    pub fn from_wire(value: Option<&str>) -> Self {
        match value {
            None => CodebaseTarget::Global,
            Some(GLOBAL_SENTINEL) => CodebaseTarget::Global,
            Some(PENDING_SENTINEL) => CodebaseTarget::PendingRegistration,
            Some(id) => CodebaseTarget::Codebase(CodebaseId::from_string(id)),
        }
    }

    /// Wire representation (`None` for the global pool).
    pub fn to_wire(&self) -> Option<String> {
        match self {
            CodebaseTarget::Global => None,
            CodebaseTarget::PendingRegistration => Some(PENDING_SENTINEL.to_string()),
            CodebaseTarget::Codebase(id) => Some(id.to_string()),
        }
    }

    /// The concrete codebase id, if any.
    pub fn codebase_id(&self) -> Option<&CodebaseId> {
        match self {
            CodebaseTarget::Codebase(id) => Some(id),
            _ => None,
        }
    }

    /// True for targets any worker may claim without declaring a codebase.
    pub fn is_open_pool(&self) -> bool {
        matches!(self, CodebaseTarget::Global | CodebaseTarget::PendingRegistration)
    }
}

impl Serialize for CodebaseTarget {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_wire().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for CodebaseTarget {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Option::<String>::deserialize(deserializer)?;
        Ok(CodebaseTarget::from_wire(value.as_deref()))
    }
}

/// Lifecycle status of a codebase's agent, as last reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodebaseStatus {
    Idle,
    Running,
    Error,
    Stopped,
}

crate::simple_display! {
    CodebaseStatus {
        Idle => "idle",
        Running => "running",
        Error => "error",
        Stopped => "stopped",
    }
}

/// A codebase registered for agent work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Codebase {
    pub id: CodebaseId,
    pub tenant_id: TenantId,
    pub name: String,
    /// Opaque to the control plane; only the owning worker interprets it.
    pub path: String,
    #[serde(default)]
    pub description: String,
    /// Worker that owns this codebase, when one has registered it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_id: Option<WorkerId>,
    pub status: CodebaseStatus,
    /// Free-form agent configuration, preserved end-to-end.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub agent_config: serde_json::Map<String, serde_json::Value>,
    pub registered_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_triggered_ms: Option<u64>,
}

crate::builder! {
    pub struct CodebaseBuilder => Codebase {
        into {
            id: CodebaseId = "cbs-test",
            tenant_id: TenantId = "tnt-test",
            name: String = "test-codebase",
            path: String = "/srv/repos/test",
            description: String = "",
        }
        set {
            status: CodebaseStatus = CodebaseStatus::Idle,
            agent_config: serde_json::Map<String, serde_json::Value> = serde_json::Map::new(),
        }
        option {
            worker_id: WorkerId = None,
            last_triggered_ms: u64 = None,
        }
        computed {
            registered_at_ms: u64 = 0,
        }
    }
}

#[cfg(test)]
#[path = "codebase_tests.rs"]
mod tests;
