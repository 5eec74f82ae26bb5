// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Postgres store.
//!
//! Every operation runs in a transaction that first establishes the tenant
//! scope by setting the connection-local `app.current_tenant_id` attribute
//! (`set_config(..., true)` scopes it to the transaction). The schema's
//! row-level-security policies enforce visibility below the application, so
//! a query issued under a mismatched scope cannot read or mutate another
//! tenant's rows even if the application-level filter is wrong.

use crate::error::StoreError;
use crate::scope::TenantScope;
use crate::store::{
    CancelOutcome, ClaimOutcome, Store, TaskFilter, TaskRelease, UpdateOutcome,
};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sb_core::{
    Codebase, CodebaseId, CodebaseTarget, Cronjob, CronjobId, Session, SessionId, SessionStatus,
    Task, TaskId, TaskMetadata, TaskStatus, Worker, WorkerId, WorkerStatus,
};
use sb_core::{ModelRef, TaskTemplate, Tenant, TenantId};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, QueryBuilder, Row, Transaction};
use std::collections::BTreeSet;

const TASK_COLUMNS: &str = "id, tenant_id, codebase_id, title, prompt, agent_type, priority, \
     model, model_ref, model_used, target_agent_name, worker_personality, \
     required_capabilities, status, worker_id, session_id, result, error, metadata, \
     created_at, started_at, completed_at";

/// Postgres implementation of [`Store`].
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect a pool and run pending migrations.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Begin a transaction with the tenant scope attribute set.
    async fn scoped_tx(
        &self,
        scope: &TenantScope,
    ) -> Result<Transaction<'_, Postgres>, StoreError> {
        let mut tx = self.pool.begin().await?;
        match scope {
            TenantScope::Tenant(id) => {
                sqlx::query("SELECT set_config('app.current_tenant_id', $1, true)")
                    .bind(id.as_str())
                    .execute(&mut *tx)
                    .await?;
            }
            TenantScope::Admin => {
                tracing::debug!(scope = "admin", "unscoped store transaction");
            }
        }
        Ok(tx)
    }
}

fn ms_to_dt(ms: u64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms as i64).single().unwrap_or_default()
}

fn dt_to_ms(dt: DateTime<Utc>) -> u64 {
    dt.timestamp_millis().max(0) as u64
}

fn string_set(value: serde_json::Value) -> BTreeSet<String> {
    value
        .as_array()
        .map(|items| {
            items.iter().filter_map(serde_json::Value::as_str).map(str::to_string).collect()
        })
        .unwrap_or_default()
}

fn set_json(set: &BTreeSet<String>) -> serde_json::Value {
    serde_json::Value::Array(set.iter().cloned().map(serde_json::Value::String).collect())
}

fn corrupt(id: &str, reason: impl std::fmt::Display) -> StoreError {
    StoreError::CorruptRow { id: id.to_string(), reason: reason.to_string() }
}

fn task_from_row(row: &PgRow) -> Result<Task, StoreError> {
    let id: String = row.try_get("id")?;
    let status: String = row.try_get("status")?;
    let status = TaskStatus::parse(&status)
        .ok_or_else(|| corrupt(&id, format!("unknown task status {status:?}")))?;
    let model_ref: Option<String> = row.try_get("model_ref")?;
    let model_ref = match model_ref {
        Some(raw) => Some(ModelRef::parse(&raw).map_err(|e| corrupt(&id, e))?),
        None => None,
    };
    let capabilities: serde_json::Value = row.try_get("required_capabilities")?;
    let metadata: serde_json::Value = row.try_get("metadata")?;
    Ok(Task {
        id: TaskId::from_string(&id),
        tenant_id: TenantId::from_string(row.try_get::<String, _>("tenant_id")?),
        codebase: CodebaseTarget::from_wire(row.try_get::<Option<String>, _>("codebase_id")?.as_deref()),
        title: row.try_get("title")?,
        prompt: row.try_get("prompt")?,
        agent_type: row.try_get("agent_type")?,
        priority: row.try_get("priority")?,
        model: row.try_get("model")?,
        model_ref,
        model_used: row.try_get("model_used")?,
        target_agent_name: row.try_get("target_agent_name")?,
        worker_personality: row.try_get("worker_personality")?,
        required_capabilities: string_set(capabilities).into_iter().collect(),
        status,
        worker_id: row.try_get::<Option<String>, _>("worker_id")?.map(WorkerId::new),
        session_id: row.try_get::<Option<String>, _>("session_id")?.map(SessionId::from_string),
        result: row.try_get("result")?,
        error: row.try_get("error")?,
        metadata: TaskMetadata::from_value(metadata),
        created_at_ms: dt_to_ms(row.try_get("created_at")?),
        started_at_ms: row.try_get::<Option<DateTime<Utc>>, _>("started_at")?.map(dt_to_ms),
        completed_at_ms: row.try_get::<Option<DateTime<Utc>>, _>("completed_at")?.map(dt_to_ms),
    })
}

fn codebase_from_row(row: &PgRow) -> Result<Codebase, StoreError> {
    let id: String = row.try_get("id")?;
    let status: String = row.try_get("status")?;
    let status = serde_json::from_value(serde_json::Value::String(status.clone()))
        .map_err(|_| corrupt(&id, format!("unknown codebase status {status:?}")))?;
    let agent_config: serde_json::Value = row.try_get("agent_config")?;
    Ok(Codebase {
        id: CodebaseId::from_string(&id),
        tenant_id: TenantId::from_string(row.try_get::<String, _>("tenant_id")?),
        name: row.try_get("name")?,
        path: row.try_get("path")?,
        description: row.try_get("description")?,
        worker_id: row.try_get::<Option<String>, _>("worker_id")?.map(WorkerId::new),
        status,
        agent_config: agent_config.as_object().cloned().unwrap_or_default(),
        registered_at_ms: dt_to_ms(row.try_get("registered_at")?),
        last_triggered_ms: row
            .try_get::<Option<DateTime<Utc>>, _>("last_triggered")?
            .map(dt_to_ms),
    })
}

fn worker_from_row(row: &PgRow) -> Result<Worker, StoreError> {
    let id: String = row.try_get("id")?;
    let status: String = row.try_get("status")?;
    let status = match status.as_str() {
        "online" => WorkerStatus::Online,
        "offline" => WorkerStatus::Offline,
        other => return Err(corrupt(&id, format!("unknown worker status {other:?}"))),
    };
    Ok(Worker {
        id: WorkerId::new(id),
        tenant_id: TenantId::from_string(row.try_get::<String, _>("tenant_id")?),
        name: row.try_get("name")?,
        capabilities: string_set(row.try_get("capabilities")?),
        codebases: string_set(row.try_get("codebases")?),
        models: string_set(row.try_get("models")?),
        personality: row.try_get("personality")?,
        status,
        last_seen_ms: dt_to_ms(row.try_get("last_seen")?),
    })
}

fn session_from_row(row: &PgRow) -> Result<Session, StoreError> {
    let id: String = row.try_get("id")?;
    let status: String = row.try_get("status")?;
    let status = match status.as_str() {
        "active" => SessionStatus::Active,
        "ended" => SessionStatus::Ended,
        other => return Err(corrupt(&id, format!("unknown session status {other:?}"))),
    };
    Ok(Session {
        id: SessionId::from_string(&id),
        tenant_id: TenantId::from_string(row.try_get::<String, _>("tenant_id")?),
        codebase_id: CodebaseId::from_string(row.try_get::<String, _>("codebase_id")?),
        status,
        service_name: row.try_get("service_name")?,
        created_at_ms: dt_to_ms(row.try_get("created_at")?),
        ended_at_ms: row.try_get::<Option<DateTime<Utc>>, _>("ended_at")?.map(dt_to_ms),
    })
}

fn cronjob_from_row(row: &PgRow) -> Result<Cronjob, StoreError> {
    let id: String = row.try_get("id")?;
    let template: serde_json::Value = row.try_get("task_template")?;
    let task_template: TaskTemplate =
        serde_json::from_value(template).map_err(|e| corrupt(&id, e))?;
    Ok(Cronjob {
        id: CronjobId::from_string(&id),
        tenant_id: TenantId::from_string(row.try_get::<String, _>("tenant_id")?),
        name: row.try_get("name")?,
        cron_expression: row.try_get("cron_expression")?,
        timezone: row.try_get("timezone")?,
        enabled: row.try_get("enabled")?,
        task_template,
        created_at_ms: dt_to_ms(row.try_get("created_at")?),
    })
}

/// Write every mutable task column back to the row.
async fn update_task_row(
    tx: &mut Transaction<'_, Postgres>,
    task: &Task,
) -> Result<(), StoreError> {
    sqlx::query(
        "UPDATE tasks SET status = $2, worker_id = $3, session_id = $4, result = $5, \
         error = $6, model_used = $7, metadata = $8, started_at = $9, completed_at = $10 \
         WHERE id = $1",
    )
    .bind(task.id.as_str())
    .bind(task.status.to_string())
    .bind(task.worker_id.as_ref().map(WorkerId::as_str))
    .bind(task.session_id.as_ref().map(SessionId::as_str))
    .bind(task.result.as_deref())
    .bind(task.error.as_deref())
    .bind(task.model_used.as_deref())
    .bind(task.metadata.to_value())
    .bind(task.started_at_ms.map(ms_to_dt))
    .bind(task.completed_at_ms.map(ms_to_dt))
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn fetch_task_for_update(
    tx: &mut Transaction<'_, Postgres>,
    id: &TaskId,
) -> Result<Option<Task>, StoreError> {
    let row = sqlx::query(&format!(
        "SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1 FOR UPDATE"
    ))
    .bind(id.as_str())
    .fetch_optional(&mut **tx)
    .await?;
    row.as_ref().map(task_from_row).transpose()
}

#[async_trait]
impl Store for PgStore {
    async fn upsert_tenant(&self, tenant: Tenant) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO tenants (id, name, namespace, created_at) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (id) DO UPDATE SET name = $2, namespace = $3",
        )
        .bind(tenant.id.as_str())
        .bind(&tenant.name)
        .bind(tenant.namespace.as_deref())
        .bind(ms_to_dt(tenant.created_at_ms))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_tenant(&self, id: &TenantId) -> Result<Option<Tenant>, StoreError> {
        let row = sqlx::query("SELECT * FROM tenants WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| {
            Ok(Tenant {
                id: TenantId::from_string(row.try_get::<String, _>("id")?),
                name: row.try_get("name")?,
                namespace: row.try_get("namespace")?,
                created_at_ms: dt_to_ms(row.try_get("created_at")?),
            })
        })
        .transpose()
    }

    async fn upsert_codebase(
        &self,
        scope: &TenantScope,
        codebase: Codebase,
    ) -> Result<(), StoreError> {
        let mut tx = self.scoped_tx(scope).await?;
        sqlx::query(
            "INSERT INTO codebases (id, tenant_id, name, path, description, worker_id, status, \
             agent_config, registered_at, last_triggered) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             ON CONFLICT (id) DO UPDATE SET name = $3, path = $4, description = $5, \
             worker_id = $6, status = $7, agent_config = $8, last_triggered = $10",
        )
        .bind(codebase.id.as_str())
        .bind(codebase.tenant_id.as_str())
        .bind(&codebase.name)
        .bind(&codebase.path)
        .bind(&codebase.description)
        .bind(codebase.worker_id.as_ref().map(WorkerId::as_str))
        .bind(codebase.status.to_string())
        .bind(serde_json::Value::Object(codebase.agent_config.clone()))
        .bind(ms_to_dt(codebase.registered_at_ms))
        .bind(codebase.last_triggered_ms.map(ms_to_dt))
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get_codebase(
        &self,
        scope: &TenantScope,
        id: &CodebaseId,
    ) -> Result<Option<Codebase>, StoreError> {
        let mut tx = self.scoped_tx(scope).await?;
        let row = sqlx::query("SELECT * FROM codebases WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&mut *tx)
            .await?;
        tx.commit().await?;
        row.as_ref().map(codebase_from_row).transpose()
    }

    async fn delete_codebase(
        &self,
        scope: &TenantScope,
        id: &CodebaseId,
    ) -> Result<bool, StoreError> {
        let mut tx = self.scoped_tx(scope).await?;
        let result = sqlx::query("DELETE FROM codebases WHERE id = $1")
            .bind(id.as_str())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_codebases(&self, scope: &TenantScope) -> Result<Vec<Codebase>, StoreError> {
        let mut tx = self.scoped_tx(scope).await?;
        let rows = sqlx::query("SELECT * FROM codebases ORDER BY name")
            .fetch_all(&mut *tx)
            .await?;
        tx.commit().await?;
        rows.iter().map(codebase_from_row).collect()
    }

    async fn upsert_task(&self, scope: &TenantScope, task: Task) -> Result<(), StoreError> {
        let mut tx = self.scoped_tx(scope).await?;
        sqlx::query(
            "INSERT INTO tasks (id, tenant_id, codebase_id, title, prompt, agent_type, priority, \
             model, model_ref, model_used, target_agent_name, worker_personality, \
             required_capabilities, status, worker_id, session_id, result, error, metadata, \
             created_at, started_at, completed_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, \
             $17, $18, $19, $20, $21, $22) \
             ON CONFLICT (id) DO UPDATE SET status = $14, worker_id = $15, session_id = $16, \
             result = $17, error = $18, model_used = $10, metadata = $19, started_at = $21, \
             completed_at = $22",
        )
        .bind(task.id.as_str())
        .bind(task.tenant_id.as_str())
        .bind(task.codebase.to_wire())
        .bind(&task.title)
        .bind(&task.prompt)
        .bind(&task.agent_type)
        .bind(task.priority)
        .bind(task.model.as_deref())
        .bind(task.model_ref.as_ref().map(ModelRef::canonical))
        .bind(task.model_used.as_deref())
        .bind(task.target_agent_name.as_deref())
        .bind(task.worker_personality.as_deref())
        .bind(serde_json::Value::Array(
            task.required_capabilities.iter().cloned().map(serde_json::Value::String).collect(),
        ))
        .bind(task.status.to_string())
        .bind(task.worker_id.as_ref().map(WorkerId::as_str))
        .bind(task.session_id.as_ref().map(SessionId::as_str))
        .bind(task.result.as_deref())
        .bind(task.error.as_deref())
        .bind(task.metadata.to_value())
        .bind(ms_to_dt(task.created_at_ms))
        .bind(task.started_at_ms.map(ms_to_dt))
        .bind(task.completed_at_ms.map(ms_to_dt))
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get_task(
        &self,
        scope: &TenantScope,
        id: &TaskId,
    ) -> Result<Option<Task>, StoreError> {
        let mut tx = self.scoped_tx(scope).await?;
        let row = sqlx::query(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1"))
            .bind(id.as_str())
            .fetch_optional(&mut *tx)
            .await?;
        tx.commit().await?;
        row.as_ref().map(task_from_row).transpose()
    }

    async fn list_tasks(
        &self,
        scope: &TenantScope,
        filter: TaskFilter,
    ) -> Result<Vec<Task>, StoreError> {
        let mut tx = self.scoped_tx(scope).await?;
        let mut query = QueryBuilder::new(format!("SELECT {TASK_COLUMNS} FROM tasks WHERE 1=1"));
        match &filter.codebase {
            Some(CodebaseTarget::Global) => {
                query.push(" AND codebase_id IS NULL");
            }
            Some(target) => {
                query.push(" AND codebase_id = ");
                query.push_bind(target.to_wire());
            }
            None => {}
        }
        if let Some(status) = filter.status {
            query.push(" AND status = ");
            query.push_bind(status.to_string());
        }
        if let Some(session_id) = &filter.session_id {
            query.push(" AND session_id = ");
            query.push_bind(session_id.as_str().to_string());
        }
        if let Some(worker_id) = &filter.worker_id {
            query.push(" AND worker_id = ");
            query.push_bind(worker_id.as_str().to_string());
        }
        query.push(" ORDER BY priority DESC, created_at ASC");
        if let Some(limit) = filter.limit {
            query.push(" LIMIT ");
            query.push_bind(limit as i64);
        }
        let rows = query.build().fetch_all(&mut *tx).await?;
        tx.commit().await?;
        rows.iter().map(task_from_row).collect()
    }

    async fn claim_task(
        &self,
        scope: &TenantScope,
        id: &TaskId,
        worker_id: &WorkerId,
        _now_ms: u64,
    ) -> Result<ClaimOutcome, StoreError> {
        let mut tx = self.scoped_tx(scope).await?;
        // One conditional write: at most one caller observes a row here.
        let row = sqlx::query(&format!(
            "UPDATE tasks SET status = 'assigned', worker_id = $2 \
             WHERE id = $1 AND status IN ('pending', 'queued') \
             RETURNING {TASK_COLUMNS}"
        ))
        .bind(id.as_str())
        .bind(worker_id.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let outcome = match row {
            Some(row) => ClaimOutcome::Claimed(Box::new(task_from_row(&row)?)),
            None => {
                let exists = sqlx::query("SELECT 1 FROM tasks WHERE id = $1")
                    .bind(id.as_str())
                    .fetch_optional(&mut *tx)
                    .await?
                    .is_some();
                if exists {
                    ClaimOutcome::AlreadyClaimed
                } else {
                    ClaimOutcome::NotFound
                }
            }
        };
        tx.commit().await?;
        Ok(outcome)
    }

    async fn mark_running(
        &self,
        scope: &TenantScope,
        id: &TaskId,
        worker_id: &WorkerId,
        session_id: Option<SessionId>,
        now_ms: u64,
    ) -> Result<UpdateOutcome, StoreError> {
        let mut tx = self.scoped_tx(scope).await?;
        let Some(mut task) = fetch_task_for_update(&mut tx, id).await? else {
            return Ok(UpdateOutcome::NotFound);
        };
        if task.worker_id.as_ref() != Some(worker_id) {
            return Ok(UpdateOutcome::Conflict { reason: "worker id does not match claim" });
        }
        if task.status.is_terminal() {
            return Ok(UpdateOutcome::Conflict { reason: "task is terminal" });
        }
        let mut changed = task.apply_status(TaskStatus::Running, now_ms)?;
        if let Some(session_id) = session_id {
            if task.session_id != Some(session_id) {
                task.session_id = Some(session_id);
                changed = true;
            }
        }
        if changed {
            update_task_row(&mut tx, &task).await?;
            tx.commit().await?;
            Ok(UpdateOutcome::Updated(Box::new(task)))
        } else {
            tx.commit().await?;
            Ok(UpdateOutcome::Unchanged(Box::new(task)))
        }
    }

    async fn release_task(
        &self,
        scope: &TenantScope,
        release: TaskRelease,
        now_ms: u64,
    ) -> Result<UpdateOutcome, StoreError> {
        let mut tx = self.scoped_tx(scope).await?;
        let Some(mut task) = fetch_task_for_update(&mut tx, &release.task_id).await? else {
            return Ok(UpdateOutcome::NotFound);
        };
        if task.worker_id.as_ref() != Some(&release.worker_id) {
            return Ok(UpdateOutcome::Conflict { reason: "worker id does not match claim" });
        }
        if task.status.is_terminal() {
            return Ok(if task.status == release.status {
                UpdateOutcome::Unchanged(Box::new(task))
            } else {
                UpdateOutcome::Conflict { reason: "task is terminal" }
            });
        }
        task.apply_status(release.status, now_ms)?;
        if release.result.is_some() {
            task.result = release.result;
        }
        if release.error.is_some() {
            task.error = release.error;
        }
        if release.model_used.is_some() {
            task.model_used = release.model_used;
        }
        if let Some(session_id) = release.session_id {
            task.session_id = Some(session_id);
        }
        update_task_row(&mut tx, &task).await?;
        tx.commit().await?;
        Ok(UpdateOutcome::Updated(Box::new(task)))
    }

    async fn cancel_task(
        &self,
        scope: &TenantScope,
        id: &TaskId,
        now_ms: u64,
    ) -> Result<CancelOutcome, StoreError> {
        let mut tx = self.scoped_tx(scope).await?;
        let Some(mut task) = fetch_task_for_update(&mut tx, id).await? else {
            return Ok(CancelOutcome::NotFound);
        };
        if task.status.is_terminal() {
            return Ok(CancelOutcome::Terminal(Box::new(task)));
        }
        if task.status.is_claimed() {
            return Ok(CancelOutcome::Claimed(Box::new(task)));
        }
        task.apply_status(TaskStatus::Cancelled, now_ms)?;
        update_task_row(&mut tx, &task).await?;
        tx.commit().await?;
        Ok(CancelOutcome::Cancelled(Box::new(task)))
    }

    async fn requeue_task(
        &self,
        scope: &TenantScope,
        id: &TaskId,
        worker_id: &WorkerId,
    ) -> Result<Option<Task>, StoreError> {
        let mut tx = self.scoped_tx(scope).await?;
        let Some(mut task) = fetch_task_for_update(&mut tx, id).await? else {
            return Ok(None);
        };
        if !task.status.is_claimed() || task.worker_id.as_ref() != Some(worker_id) {
            return Ok(None);
        }
        task.reset_for_requeue();
        update_task_row(&mut tx, &task).await?;
        tx.commit().await?;
        Ok(Some(task))
    }

    async fn cancel_session_tasks(
        &self,
        scope: &TenantScope,
        session_id: &SessionId,
        reason: &str,
        now_ms: u64,
    ) -> Result<Vec<Task>, StoreError> {
        let mut tx = self.scoped_tx(scope).await?;
        let rows = sqlx::query(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE session_id = $1 \
             AND status NOT IN ('completed', 'failed', 'cancelled') FOR UPDATE"
        ))
        .bind(session_id.as_str())
        .fetch_all(&mut *tx)
        .await?;

        let mut cancelled = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut task = task_from_row(row)?;
            task.apply_status(TaskStatus::Cancelled, now_ms)?;
            task.error = Some(reason.to_string());
            update_task_row(&mut tx, &task).await?;
            cancelled.push(task);
        }
        tx.commit().await?;
        Ok(cancelled)
    }

    async fn upsert_worker(&self, scope: &TenantScope, worker: Worker) -> Result<(), StoreError> {
        let mut tx = self.scoped_tx(scope).await?;
        sqlx::query(
            "INSERT INTO workers (id, tenant_id, name, capabilities, codebases, models, \
             personality, status, last_seen) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (tenant_id, id) DO UPDATE SET name = $3, capabilities = $4, \
             codebases = $5, models = $6, personality = $7, status = $8, last_seen = $9",
        )
        .bind(worker.id.as_str())
        .bind(worker.tenant_id.as_str())
        .bind(&worker.name)
        .bind(set_json(&worker.capabilities))
        .bind(set_json(&worker.codebases))
        .bind(set_json(&worker.models))
        .bind(worker.personality.as_deref())
        .bind(worker.status.to_string())
        .bind(ms_to_dt(worker.last_seen_ms))
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get_worker(
        &self,
        scope: &TenantScope,
        id: &WorkerId,
    ) -> Result<Option<Worker>, StoreError> {
        let mut tx = self.scoped_tx(scope).await?;
        let row = sqlx::query("SELECT * FROM workers WHERE id = $1 LIMIT 1")
            .bind(id.as_str())
            .fetch_optional(&mut *tx)
            .await?;
        tx.commit().await?;
        row.as_ref().map(worker_from_row).transpose()
    }

    async fn list_workers(&self, scope: &TenantScope) -> Result<Vec<Worker>, StoreError> {
        let mut tx = self.scoped_tx(scope).await?;
        let rows = sqlx::query("SELECT * FROM workers ORDER BY id").fetch_all(&mut *tx).await?;
        tx.commit().await?;
        rows.iter().map(worker_from_row).collect()
    }

    async fn set_worker_liveness(
        &self,
        scope: &TenantScope,
        id: &WorkerId,
        status: WorkerStatus,
        now_ms: u64,
    ) -> Result<(), StoreError> {
        let mut tx = self.scoped_tx(scope).await?;
        sqlx::query("UPDATE workers SET status = $2, last_seen = $3 WHERE id = $1")
            .bind(id.as_str())
            .bind(status.to_string())
            .bind(ms_to_dt(now_ms))
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn set_worker_codebases(
        &self,
        scope: &TenantScope,
        id: &WorkerId,
        codebases: BTreeSet<String>,
    ) -> Result<bool, StoreError> {
        let mut tx = self.scoped_tx(scope).await?;
        let result = sqlx::query("UPDATE workers SET codebases = $2 WHERE id = $1")
            .bind(id.as_str())
            .bind(set_json(&codebases))
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn upsert_session(
        &self,
        scope: &TenantScope,
        session: Session,
    ) -> Result<(), StoreError> {
        let mut tx = self.scoped_tx(scope).await?;
        sqlx::query(
            "INSERT INTO sessions (id, tenant_id, codebase_id, status, service_name, created_at, \
             ended_at) VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (id) DO UPDATE SET status = $4, service_name = $5, ended_at = $7",
        )
        .bind(session.id.as_str())
        .bind(session.tenant_id.as_str())
        .bind(session.codebase_id.as_str())
        .bind(session.status.to_string())
        .bind(session.service_name.as_deref())
        .bind(ms_to_dt(session.created_at_ms))
        .bind(session.ended_at_ms.map(ms_to_dt))
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get_session(
        &self,
        scope: &TenantScope,
        id: &SessionId,
    ) -> Result<Option<Session>, StoreError> {
        let mut tx = self.scoped_tx(scope).await?;
        let row = sqlx::query("SELECT * FROM sessions WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&mut *tx)
            .await?;
        tx.commit().await?;
        row.as_ref().map(session_from_row).transpose()
    }

    async fn end_session(
        &self,
        scope: &TenantScope,
        id: &SessionId,
        now_ms: u64,
    ) -> Result<Option<Session>, StoreError> {
        let mut tx = self.scoped_tx(scope).await?;
        let row = sqlx::query(
            "UPDATE sessions SET status = 'ended', \
             ended_at = COALESCE(ended_at, $2) WHERE id = $1 RETURNING *",
        )
        .bind(id.as_str())
        .bind(ms_to_dt(now_ms))
        .fetch_optional(&mut *tx)
        .await?;
        tx.commit().await?;
        row.as_ref().map(session_from_row).transpose()
    }

    async fn active_session_for_codebase(
        &self,
        scope: &TenantScope,
        codebase_id: &CodebaseId,
    ) -> Result<Option<Session>, StoreError> {
        let mut tx = self.scoped_tx(scope).await?;
        let row = sqlx::query(
            "SELECT * FROM sessions WHERE codebase_id = $1 AND status = 'active' LIMIT 1",
        )
        .bind(codebase_id.as_str())
        .fetch_optional(&mut *tx)
        .await?;
        tx.commit().await?;
        row.as_ref().map(session_from_row).transpose()
    }

    async fn upsert_cronjob(&self, scope: &TenantScope, job: Cronjob) -> Result<(), StoreError> {
        let mut tx = self.scoped_tx(scope).await?;
        sqlx::query(
            "INSERT INTO cronjobs (id, tenant_id, name, cron_expression, timezone, enabled, \
             task_template, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (id) DO UPDATE SET name = $3, cron_expression = $4, timezone = $5, \
             enabled = $6, task_template = $7",
        )
        .bind(job.id.as_str())
        .bind(job.tenant_id.as_str())
        .bind(&job.name)
        .bind(&job.cron_expression)
        .bind(job.timezone.as_deref())
        .bind(job.enabled)
        .bind(serde_json::to_value(&job.task_template).unwrap_or_default())
        .bind(ms_to_dt(job.created_at_ms))
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get_cronjob(
        &self,
        scope: &TenantScope,
        id: &CronjobId,
    ) -> Result<Option<Cronjob>, StoreError> {
        let mut tx = self.scoped_tx(scope).await?;
        let row = sqlx::query("SELECT * FROM cronjobs WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&mut *tx)
            .await?;
        tx.commit().await?;
        row.as_ref().map(cronjob_from_row).transpose()
    }

    async fn delete_cronjob(
        &self,
        scope: &TenantScope,
        id: &CronjobId,
    ) -> Result<bool, StoreError> {
        let mut tx = self.scoped_tx(scope).await?;
        let result = sqlx::query("DELETE FROM cronjobs WHERE id = $1")
            .bind(id.as_str())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_cronjobs(&self, scope: &TenantScope) -> Result<Vec<Cronjob>, StoreError> {
        let mut tx = self.scoped_tx(scope).await?;
        let rows = sqlx::query("SELECT * FROM cronjobs ORDER BY name").fetch_all(&mut *tx).await?;
        tx.commit().await?;
        rows.iter().map(cronjob_from_row).collect()
    }

    async fn list_enabled_cronjobs(
        &self,
        scope: &TenantScope,
    ) -> Result<Vec<Cronjob>, StoreError> {
        let mut tx = self.scoped_tx(scope).await?;
        let rows = sqlx::query("SELECT * FROM cronjobs WHERE enabled ORDER BY name")
            .fetch_all(&mut *tx)
            .await?;
        tx.commit().await?;
        rows.iter().map(cronjob_from_row).collect()
    }
}
