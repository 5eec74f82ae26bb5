// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sb-storage: durable persistence for the control plane.
//!
//! The [`Store`] trait is the single seam between the dispatch subsystem
//! and its database. Every operation runs under a [`TenantScope`]: scoped
//! calls can only see and mutate the active tenant's rows, the admin scope
//! (reconciliation, cron firing) spans tenants and is logged as such.
//!
//! Two implementations ship: [`PgStore`] over a Postgres pool with
//! row-level-security enforcement, and [`MemStore`] for local development
//! and tests, which honors the same visibility contract in memory.

mod error;
mod memory;
mod postgres;
mod scope;
mod store;

pub use error::StoreError;
pub use memory::MemStore;
pub use postgres::PgStore;
pub use scope::TenantScope;
pub use store::{
    CancelOutcome, ClaimOutcome, Store, TaskFilter, TaskRelease, UpdateOutcome,
};
