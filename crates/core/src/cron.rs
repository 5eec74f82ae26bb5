// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cronjob records and task templates.

use crate::tenant::TenantId;
use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for a persisted cronjob.
    pub struct CronjobId("crn-");
}

/// Template from which a cron fire materializes a task.
///
/// Fields mirror the task-creation request; anything absent falls back to
/// the dispatch defaults (`agent_type = "build"`, priority 0, a synthesized
/// title and prompt naming the cronjob).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskTemplate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codebase_id: Option<String>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_personality: Option<String>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// A persisted cron schedule.
///
/// Every enabled cronjob must have a matching external schedule resource;
/// the reconciler (sb-adapters) owns that mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cronjob {
    pub id: CronjobId,
    pub tenant_id: TenantId,
    pub name: String,
    /// Standard five-field cron expression, opaque to the control plane
    /// (the external scheduler interprets it).
    pub cron_expression: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    pub enabled: bool,
    pub task_template: TaskTemplate,
    pub created_at_ms: u64,
}

crate::builder! {
    pub struct CronjobBuilder => Cronjob {
        into {
            id: CronjobId = "crn-test",
            tenant_id: TenantId = "tnt-test",
            name: String = "test-cron",
            cron_expression: String = "*/5 * * * *",
        }
        set {
            enabled: bool = true,
            task_template: TaskTemplate = TaskTemplate::default(),
        }
        option {
            timezone: String = None,
        }
        computed {
            created_at_ms: u64 = 0,
        }
    }
}
