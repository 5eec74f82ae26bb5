// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sb-adapters: clients for the control plane's external collaborators.
//!
//! - [`events`] — outbound event publisher (HTTP sink, CloudEvents framing)
//! - [`spawner`] — per-session worker services on the orchestrator
//! - [`cron`] — CronJob resources mirroring persisted cron schedules
//!
//! Each adapter is reachable through a trait so the dispatch subsystem can
//! run against fakes; the real implementations talk to the event broker via
//! `reqwest` and to Kubernetes via `kube`.

pub mod cluster;
pub mod cron;
pub mod events;
pub mod spawner;

pub use cron::{
    CronError, CronOrchestrator, CronReconcileResult, KnativeCronConfig, KnativeCronManager,
    ReconcileAction,
};
pub use events::{
    EventEnvelope, EventPublisherConfig, EventSink, HttpEventPublisher, PublishError,
};
pub use spawner::{
    CleanupStats, KnativeSpawner, KnativeSpawnerConfig, SessionWorkerInfo, SessionWorkerState,
    SpawnError, SpawnOutcome, SpawnedWorker, WorkerSpawner,
};

#[cfg(any(test, feature = "test-support"))]
pub use cron::FakeCronOrchestrator;
#[cfg(any(test, feature = "test-support"))]
pub use events::FakeEventSink;
#[cfg(any(test, feature = "test-support"))]
pub use spawner::FakeSpawner;
