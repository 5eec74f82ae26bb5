// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sb-wire: wire types shared by the server and worker clients.
//!
//! [`frames`] defines the text-framed events written down a worker's push
//! stream; [`api`] defines the HTTP request/response bodies.

pub mod api;
pub mod frames;

pub use api::{
    CancelTaskResponse, ClaimTaskRequest, CreateCronjobRequest, CreateTaskRequest, ErrorBody,
    HeartbeatRequest, RegisterCodebaseRequest, ReleaseTaskRequest, TriggerCronResponse,
    UpdateCodebasesRequest,
};
pub use frames::{FrameError, PushFrame, TaskAnnouncement};
