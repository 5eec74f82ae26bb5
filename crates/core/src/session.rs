// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session records.
//!
//! A session groups tasks that share one dynamically provisioned worker
//! instance. At most one active session exists per `(tenant, codebase)`
//! when session mode is in use.

use crate::codebase::CodebaseId;
use crate::tenant::TenantId;
use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for a session.
    pub struct SessionId("ses-");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Ended,
}

crate::simple_display! {
    SessionStatus {
        Active => "active",
        Ended => "ended",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub tenant_id: TenantId,
    pub codebase_id: CodebaseId,
    pub status: SessionStatus,
    /// External service name when a per-session worker was provisioned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
    pub created_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at_ms: Option<u64>,
}

impl Session {
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }
}

crate::builder! {
    pub struct SessionBuilder => Session {
        into {
            id: SessionId = "ses-test",
            tenant_id: TenantId = "tnt-test",
            codebase_id: CodebaseId = "cbs-test",
        }
        set {
            status: SessionStatus = SessionStatus::Active,
            created_at_ms: u64 = 0,
        }
        option {
            service_name: String = None,
            ended_at_ms: u64 = None,
        }
    }
}
