// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tenant identity.
//!
//! Every non-global row in the store carries a tenant id; row visibility is
//! filtered by the active scope (see `sb-storage`). The namespace hint is
//! used by the cron reconciler when tenant-namespace mode is enabled.

use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for a tenant.
    pub struct TenantId("tnt-");
}

/// A tenant record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: TenantId,
    pub name: String,
    /// Kubernetes namespace hint for tenant-scoped orchestrator resources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub created_at_ms: u64,
}

crate::builder! {
    pub struct TenantBuilder => Tenant {
        into {
            id: TenantId = "tnt-test",
            name: String = "test-tenant",
        }
        option {
            namespace: String = None,
        }
        computed {
            created_at_ms: u64 = 0,
        }
    }
}
