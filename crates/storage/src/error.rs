// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Store error taxonomy.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("corrupt row {id}: {reason}")]
    CorruptRow { id: String, reason: String },

    /// The state machine rejected a transition. The row is left untouched.
    #[error(transparent)]
    InvalidTransition(#[from] sb_core::task::InvalidTransition),
}
