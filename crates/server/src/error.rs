// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP error mapping.
//!
//! User-visible messages are sanitized; diagnostic detail goes to the logs
//! keyed by task and session ids. Out-of-scope rows are reported as 404 so
//! existence is never leaked across tenants.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use sb_adapters::{CronError, PublishError, SpawnError};
use sb_engine::{CronDispatchError, QueueError, SessionError};
use sb_storage::StoreError;
use sb_wire::ErrorBody;

/// Error surface of the HTTP layer.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Unauthorized(String),
    UpstreamUnavailable(String),
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(m)
            | ApiError::NotFound(m)
            | ApiError::Conflict(m)
            | ApiError::Unauthorized(m)
            | ApiError::UpstreamUnavailable(m)
            | ApiError::Internal(m) => m,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = %status, error = %self.message(), "request failed");
        }
        (status, Json(ErrorBody { error: self.message().to_string() })).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            // An illegal transition means a caller raced the state machine.
            StoreError::InvalidTransition(e) => ApiError::Conflict(e.to_string()),
            other => {
                tracing::error!(error = %other, "store failure");
                ApiError::Internal("storage failure".to_string())
            }
        }
    }
}

impl From<QueueError> for ApiError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::CodebaseNotFound(id) => {
                ApiError::NotFound(format!("codebase {id} not found"))
            }
            QueueError::SessionNotFound(id) => {
                ApiError::NotFound(format!("session {id} not found"))
            }
            QueueError::SessionEnded(id) => {
                ApiError::Conflict(format!("session {id} has ended"))
            }
            QueueError::InvalidReleaseStatus(status) => {
                ApiError::BadRequest(format!("invalid release status {status}"))
            }
            QueueError::Store(err) => err.into(),
            QueueError::Publish(err) => err.into(),
        }
    }
}

impl From<PublishError> for ApiError {
    fn from(err: PublishError) -> Self {
        match err {
            PublishError::Rejected { status, .. } => {
                ApiError::UpstreamUnavailable(format!("event sink rejected delivery ({status})"))
            }
            other => ApiError::UpstreamUnavailable(other.to_string()),
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound(id) => ApiError::NotFound(format!("session {id} not found")),
            SessionError::Store(err) => err.into(),
            SessionError::Queue(err) => err.into(),
            SessionError::Spawn(err) => err.into(),
        }
    }
}

impl From<SpawnError> for ApiError {
    fn from(err: SpawnError) -> Self {
        match err {
            SpawnError::InvalidSessionId(id) => {
                ApiError::BadRequest(format!("invalid session id {id:?}"))
            }
            SpawnError::ConfigMissing(m) | SpawnError::Template(m) => {
                tracing::error!(error = %m, "spawner configuration failure");
                ApiError::Internal("session worker provisioning is misconfigured".to_string())
            }
            SpawnError::Forbidden(m) => {
                tracing::error!(error = %m, "orchestrator forbade spawn");
                ApiError::UpstreamUnavailable("orchestrator denied the request".to_string())
            }
            SpawnError::Api(m) => ApiError::UpstreamUnavailable(m),
        }
    }
}

impl From<CronDispatchError> for ApiError {
    fn from(err: CronDispatchError) -> Self {
        match err {
            CronDispatchError::NotFound(id) => {
                ApiError::NotFound(format!("cronjob {id} not found"))
            }
            CronDispatchError::DriverInactive(driver) => {
                ApiError::Conflict(format!("cron driver {driver} is not active"))
            }
            CronDispatchError::Store(err) => err.into(),
            CronDispatchError::Queue(err) => err.into(),
            CronDispatchError::Orchestrator(err) => err.into(),
        }
    }
}

impl From<CronError> for ApiError {
    fn from(err: CronError) -> Self {
        match err {
            CronError::Config(m) => {
                tracing::error!(error = %m, "cron configuration failure");
                ApiError::Internal("cron reconciler is misconfigured".to_string())
            }
            CronError::Forbidden(m) => {
                tracing::error!(error = %m, "orchestrator forbade cron write");
                ApiError::UpstreamUnavailable("orchestrator denied the request".to_string())
            }
            other => ApiError::UpstreamUnavailable(other.to_string()),
        }
    }
}
