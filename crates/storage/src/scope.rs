// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tenant scoping.
//!
//! A scope is established before the first statement of every store
//! operation. Under Postgres this sets the connection-local
//! `app.current_tenant_id` attribute that the row-level-security policies
//! filter on; the in-memory store applies the same filter directly.

use sb_core::TenantId;

/// The visibility context for a store operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TenantScope {
    /// Rows owned by this tenant only.
    Tenant(TenantId),
    /// Administrative scope spanning all tenants. Reserved for control-plane
    /// paths that must reconcile across tenants; callers are audited via the
    /// `scope = "admin"` log field.
    Admin,
}

impl TenantScope {
    pub fn tenant(id: impl Into<TenantId>) -> Self {
        TenantScope::Tenant(id.into())
    }

    /// The active tenant id, unless this is the admin scope.
    pub fn tenant_id(&self) -> Option<&TenantId> {
        match self {
            TenantScope::Tenant(id) => Some(id),
            TenantScope::Admin => None,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, TenantScope::Admin)
    }

    /// Whether a row owned by `owner` is visible under this scope.
    pub fn can_see(&self, owner: &TenantId) -> bool {
        match self {
            TenantScope::Tenant(id) => id == owner,
            TenantScope::Admin => true,
        }
    }
}

impl std::fmt::Display for TenantScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TenantScope::Tenant(id) => write!(f, "{}", id),
            TenantScope::Admin => f.write_str("admin"),
        }
    }
}
