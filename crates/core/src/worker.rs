// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker records.
//!
//! Workers self-report their capability set, declared codebases, and
//! supported models on connect; all three are advisory inputs to routing.
//! The registry (sb-engine) owns liveness; the store owns the durable row.

use crate::codebase::{CodebaseId, GLOBAL_SENTINEL};
use crate::tenant::TenantId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Stable identifier for a worker instance.
///
/// Worker ids are chosen by the worker itself (stable across reconnects),
/// so this is a plain string newtype rather than a generated id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkerId(pub String);

impl WorkerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for WorkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for WorkerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for WorkerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl PartialEq<str> for WorkerId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for WorkerId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl std::borrow::Borrow<str> for WorkerId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Connection status of a worker as recorded in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    Online,
    Offline,
}

crate::simple_display! {
    WorkerStatus {
        Online => "online",
        Offline => "offline",
    }
}

/// A worker known to the control plane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Worker {
    pub id: WorkerId,
    pub tenant_id: TenantId,
    pub name: String,
    /// Self-reported capability set (advisory for routing).
    #[serde(default)]
    pub capabilities: BTreeSet<String>,
    /// Declared codebase ids this worker serves. The `"global"` sentinel
    /// (or an empty set) opts into the global pool.
    #[serde(default)]
    pub codebases: BTreeSet<String>,
    /// Model references the worker claims to support (`provider:model`).
    #[serde(default)]
    pub models: BTreeSet<String>,
    /// Personality tag used by target matching, when the worker declares one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personality: Option<String>,
    pub status: WorkerStatus,
    pub last_seen_ms: u64,
}

impl Worker {
    /// True when this worker declared the given codebase.
    pub fn serves_codebase(&self, codebase: &CodebaseId) -> bool {
        self.codebases.contains(codebase.as_str())
    }

    /// True when this worker accepts global-pool tasks.
    pub fn serves_global_pool(&self) -> bool {
        self.codebases.is_empty() || self.codebases.contains(GLOBAL_SENTINEL)
    }

    /// True when the worker's capabilities cover every required capability.
    pub fn has_capabilities(&self, required: &[String]) -> bool {
        required.iter().all(|c| self.capabilities.contains(c))
    }
}

crate::builder! {
    pub struct WorkerBuilder => Worker {
        into {
            id: WorkerId = "worker-test",
            tenant_id: TenantId = "tnt-test",
            name: String = "test-worker",
        }
        set {
            capabilities: BTreeSet<String> = BTreeSet::new(),
            codebases: BTreeSet<String> = BTreeSet::new(),
            models: BTreeSet<String> = BTreeSet::new(),
            status: WorkerStatus = WorkerStatus::Online,
            last_seen_ms: u64 = 0,
        }
        option {
            personality: String = None,
        }
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
