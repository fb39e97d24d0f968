//! `PostgreSQL` implementation of the storage ports.
//!
//! Each [`PgUnitOfWork`] wraps one database transaction and serves every
//! repository through it. Agent state is stored as a JSONB document next to
//! its version column so the optimistic check is a single conditional
//! `UPDATE`. Execution records are write-once via `ON CONFLICT DO NOTHING`.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{PgPool, Postgres, Transaction};

use outlast_types::{
    ActionExecutionRecord, ActionExecutionRepository, AgentResourceNodeRecord,
    AgentResourceNodeRepository, AgentSessionRepository, AgentStateAggregate,
    AgentStateRepository, BedQuality, DeathCause, DomainEvent, EventRepository, EventType,
    ObjectKind, PortError, SessionStatus, TxManager, UnitOfWork, WorldObjectRecord,
    WorldObjectRepository,
};

use crate::error::DbError;

fn pg(err: sqlx::Error) -> PortError {
    DbError::from(err).into()
}

fn json(err: serde_json::Error) -> PortError {
    DbError::from(err).into()
}

fn decode<T: FromStr>(raw: &str) -> Result<T, PortError>
where
    T::Err: std::fmt::Display,
{
    T::from_str(raw).map_err(|e| DbError::Decode(e.to_string()).into())
}

/// Opens [`PgUnitOfWork`]s on a pool.
#[derive(Debug, Clone)]
pub struct PgTxManager {
    pool: PgPool,
}

impl PgTxManager {
    /// Transaction manager over `pool`.
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TxManager for PgTxManager {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, PortError> {
        let tx = self.pool.begin().await.map_err(pg)?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }
}

/// One `PostgreSQL` transaction serving every repository.
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    fn states(&mut self) -> &mut dyn AgentStateRepository {
        self
    }

    fn executions(&mut self) -> &mut dyn ActionExecutionRepository {
        self
    }

    fn events(&mut self) -> &mut dyn EventRepository {
        self
    }

    fn objects(&mut self) -> &mut dyn WorldObjectRepository {
        self
    }

    fn resources(&mut self) -> &mut dyn AgentResourceNodeRepository {
        self
    }

    fn sessions(&mut self) -> &mut dyn AgentSessionRepository {
        self
    }

    async fn commit(self: Box<Self>) -> Result<(), PortError> {
        self.tx.commit().await.map_err(pg)
    }

    async fn rollback(self: Box<Self>) -> Result<(), PortError> {
        self.tx.rollback().await.map_err(pg)
    }
}

// ---------------------------------------------------------------------------
// Agent state
// ---------------------------------------------------------------------------

#[async_trait]
impl AgentStateRepository for PgUnitOfWork {
    async fn get_by_agent_id(&mut self, agent_id: &str) -> Result<AgentStateAggregate, PortError> {
        let row: Option<(Value,)> =
            sqlx::query_as(r"SELECT state FROM agent_states WHERE agent_id = $1")
                .bind(agent_id)
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(pg)?;
        let (state,) = row.ok_or(PortError::NotFound)?;
        serde_json::from_value(state).map_err(json)
    }

    async fn save_with_version(
        &mut self,
        state: &AgentStateAggregate,
        expected_version: i64,
    ) -> Result<(), PortError> {
        let doc = serde_json::to_value(state).map_err(json)?;
        let updated_at = state.updated_at.unwrap_or_else(Utc::now);
        let query = if expected_version == 0 {
            sqlx::query(
                r"INSERT INTO agent_states (agent_id, version, state, updated_at)
                  VALUES ($1, $2, $3, $4)
                  ON CONFLICT (agent_id) DO NOTHING",
            )
            .bind(&state.agent_id)
            .bind(state.version)
            .bind(&doc)
            .bind(updated_at)
        } else {
            sqlx::query(
                r"UPDATE agent_states
                  SET version = $2, state = $3, updated_at = $4
                  WHERE agent_id = $1 AND version = $5",
            )
            .bind(&state.agent_id)
            .bind(state.version)
            .bind(&doc)
            .bind(updated_at)
            .bind(expected_version)
        };
        let result = query.execute(&mut *self.tx).await.map_err(pg)?;

        if result.rows_affected() == 0 {
            tracing::debug!(
                agent_id = %state.agent_id,
                expected_version,
                "State version mismatch"
            );
            return Err(PortError::Conflict);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Executions
// ---------------------------------------------------------------------------

#[async_trait]
impl ActionExecutionRepository for PgUnitOfWork {
    async fn get_by_idempotency_key(
        &mut self,
        agent_id: &str,
        key: &str,
    ) -> Result<Option<ActionExecutionRecord>, PortError> {
        let row: Option<(Value,)> = sqlx::query_as(
            r"SELECT record FROM action_executions
              WHERE agent_id = $1 AND idempotency_key = $2",
        )
        .bind(agent_id)
        .bind(key)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(pg)?;
        row.map(|(record,)| serde_json::from_value(record).map_err(json))
            .transpose()
    }

    async fn save_execution(&mut self, record: &ActionExecutionRecord) -> Result<(), PortError> {
        let doc = serde_json::to_value(record).map_err(json)?;
        let result = sqlx::query(
            r"INSERT INTO action_executions (agent_id, idempotency_key, intent_type, record, applied_at)
              VALUES ($1, $2, $3, $4, $5)
              ON CONFLICT (agent_id, idempotency_key) DO NOTHING",
        )
        .bind(&record.agent_id)
        .bind(&record.idempotency_key)
        .bind(&record.intent_type)
        .bind(&doc)
        .bind(record.applied_at)
        .execute(&mut *self.tx)
        .await
        .map_err(pg)?;
        if result.rows_affected() == 0 {
            return Err(PortError::Conflict);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[async_trait]
impl EventRepository for PgUnitOfWork {
    async fn append(&mut self, agent_id: &str, events: &[DomainEvent]) -> Result<(), PortError> {
        if events.is_empty() {
            return Ok(());
        }
        let len = events.len();
        let mut event_types = Vec::with_capacity(len);
        let mut payloads = Vec::with_capacity(len);
        let mut occurred = Vec::with_capacity(len);
        for evt in events {
            event_types.push(evt.event_type.as_str().to_owned());
            payloads.push(Value::Object(evt.payload.clone()));
            occurred.push(evt.occurred_at);
        }

        // One round-trip, rows inserted in slice order.
        sqlx::query(
            r"INSERT INTO domain_events (agent_id, event_type, payload, occurred_at)
              SELECT $1, t.event_type, t.payload, t.occurred_at
              FROM UNNEST($2::TEXT[], $3::JSONB[], $4::TIMESTAMPTZ[])
                   WITH ORDINALITY AS t(event_type, payload, occurred_at, ord)
              ORDER BY t.ord",
        )
        .bind(agent_id)
        .bind(&event_types)
        .bind(&payloads)
        .bind(&occurred)
        .execute(&mut *self.tx)
        .await
        .map_err(pg)?;

        tracing::debug!(agent_id, count = len, "Appended events");
        Ok(())
    }

    async fn list_by_agent_id(
        &mut self,
        agent_id: &str,
        limit: usize,
    ) -> Result<Vec<DomainEvent>, PortError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows: Vec<(String, Value, DateTime<Utc>)> = sqlx::query_as(
            r"SELECT event_type, payload, occurred_at
              FROM domain_events
              WHERE agent_id = $1
              ORDER BY id DESC
              LIMIT $2",
        )
        .bind(agent_id)
        .bind(limit)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(pg)?;

        rows.into_iter()
            .map(|(event_type, payload, occurred_at)| {
                Ok(DomainEvent::new(
                    decode::<EventType>(&event_type)?,
                    occurred_at,
                    payload,
                ))
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// World objects
// ---------------------------------------------------------------------------

/// A row from the `world_objects` table.
#[derive(Debug, Clone, sqlx::FromRow)]
struct ObjectRow {
    object_id: String,
    owner_agent_id: String,
    kind: String,
    object_type: String,
    x: i32,
    y: i32,
    hp: i32,
    quality: Option<String>,
    capacity_slots: i32,
    used_slots: i32,
    object_state: String,
}

impl ObjectRow {
    fn into_record(self) -> Result<WorldObjectRecord, PortError> {
        Ok(WorldObjectRecord {
            kind: decode::<ObjectKind>(&self.kind)?,
            quality: self
                .quality
                .as_deref()
                .map(decode::<BedQuality>)
                .transpose()?,
            object_id: self.object_id,
            owner_agent_id: self.owner_agent_id,
            object_type: self.object_type,
            x: self.x,
            y: self.y,
            hp: self.hp,
            capacity_slots: self.capacity_slots,
            used_slots: self.used_slots,
            object_state: self.object_state,
        })
    }
}

const OBJECT_COLUMNS: &str = "object_id, owner_agent_id, kind, object_type, x, y, hp, quality, \
                              capacity_slots, used_slots, object_state";

#[async_trait]
impl WorldObjectRepository for PgUnitOfWork {
    async fn get_by_object_id(
        &mut self,
        object_id: &str,
    ) -> Result<Option<WorldObjectRecord>, PortError> {
        let sql = format!("SELECT {OBJECT_COLUMNS} FROM world_objects WHERE object_id = $1");
        let row = sqlx::query_as::<_, ObjectRow>(&sql)
            .bind(object_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(pg)?;
        row.map(ObjectRow::into_record).transpose()
    }

    async fn save(&mut self, object: &WorldObjectRecord) -> Result<(), PortError> {
        let result = sqlx::query(
            r"INSERT INTO world_objects
                (object_id, owner_agent_id, kind, object_type, x, y, hp, quality,
                 capacity_slots, used_slots, object_state)
              VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
              ON CONFLICT (object_id) DO NOTHING",
        )
        .bind(&object.object_id)
        .bind(&object.owner_agent_id)
        .bind(object.kind.as_str())
        .bind(&object.object_type)
        .bind(object.x)
        .bind(object.y)
        .bind(object.hp)
        .bind(object.quality.map(BedQuality::as_str))
        .bind(object.capacity_slots)
        .bind(object.used_slots)
        .bind(&object.object_state)
        .execute(&mut *self.tx)
        .await
        .map_err(pg)?;
        if result.rows_affected() == 0 {
            return Err(PortError::Conflict);
        }
        Ok(())
    }

    async fn update(&mut self, object: &WorldObjectRecord) -> Result<(), PortError> {
        let result = sqlx::query(
            r"UPDATE world_objects
              SET owner_agent_id = $2, kind = $3, object_type = $4, x = $5, y = $6, hp = $7,
                  quality = $8, capacity_slots = $9, used_slots = $10, object_state = $11
              WHERE object_id = $1",
        )
        .bind(&object.object_id)
        .bind(&object.owner_agent_id)
        .bind(object.kind.as_str())
        .bind(&object.object_type)
        .bind(object.x)
        .bind(object.y)
        .bind(object.hp)
        .bind(object.quality.map(BedQuality::as_str))
        .bind(object.capacity_slots)
        .bind(object.used_slots)
        .bind(&object.object_state)
        .execute(&mut *self.tx)
        .await
        .map_err(pg)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound);
        }
        Ok(())
    }

    async fn list_by_agent_id(
        &mut self,
        agent_id: &str,
    ) -> Result<Vec<WorldObjectRecord>, PortError> {
        let sql = format!(
            "SELECT {OBJECT_COLUMNS} FROM world_objects WHERE owner_agent_id = $1 ORDER BY object_id"
        );
        let rows = sqlx::query_as::<_, ObjectRow>(&sql)
            .bind(agent_id)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(pg)?;
        rows.into_iter().map(ObjectRow::into_record).collect()
    }
}

// ---------------------------------------------------------------------------
// Resource depletion
// ---------------------------------------------------------------------------

/// A row from the `agent_resource_nodes` table.
#[derive(Debug, Clone, sqlx::FromRow)]
struct ResourceRow {
    agent_id: String,
    target_id: String,
    resource_type: String,
    x: i32,
    y: i32,
    depleted_until: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ResourceRow> for AgentResourceNodeRecord {
    fn from(row: ResourceRow) -> Self {
        Self {
            agent_id: row.agent_id,
            target_id: row.target_id,
            resource_type: row.resource_type,
            x: row.x,
            y: row.y,
            depleted_until: row.depleted_until,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl AgentResourceNodeRepository for PgUnitOfWork {
    async fn upsert(&mut self, node: &AgentResourceNodeRecord) -> Result<(), PortError> {
        sqlx::query(
            r"INSERT INTO agent_resource_nodes
                (agent_id, target_id, resource_type, x, y, depleted_until, updated_at)
              VALUES ($1, $2, $3, $4, $5, $6, $7)
              ON CONFLICT (agent_id, target_id) DO UPDATE
              SET resource_type = EXCLUDED.resource_type,
                  x = EXCLUDED.x,
                  y = EXCLUDED.y,
                  depleted_until = EXCLUDED.depleted_until,
                  updated_at = EXCLUDED.updated_at",
        )
        .bind(&node.agent_id)
        .bind(&node.target_id)
        .bind(&node.resource_type)
        .bind(node.x)
        .bind(node.y)
        .bind(node.depleted_until)
        .bind(node.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(pg)?;
        Ok(())
    }

    async fn get_by_target_id(
        &mut self,
        agent_id: &str,
        target_id: &str,
    ) -> Result<Option<AgentResourceNodeRecord>, PortError> {
        let row = sqlx::query_as::<_, ResourceRow>(
            r"SELECT agent_id, target_id, resource_type, x, y, depleted_until, updated_at
              FROM agent_resource_nodes
              WHERE agent_id = $1 AND target_id = $2",
        )
        .bind(agent_id)
        .bind(target_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(pg)?;
        Ok(row.map(AgentResourceNodeRecord::from))
    }

    async fn list_by_agent_id(
        &mut self,
        agent_id: &str,
    ) -> Result<Vec<AgentResourceNodeRecord>, PortError> {
        let rows = sqlx::query_as::<_, ResourceRow>(
            r"SELECT agent_id, target_id, resource_type, x, y, depleted_until, updated_at
              FROM agent_resource_nodes
              WHERE agent_id = $1
              ORDER BY target_id",
        )
        .bind(agent_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(pg)?;
        Ok(rows.into_iter().map(AgentResourceNodeRecord::from).collect())
    }
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

#[async_trait]
impl AgentSessionRepository for PgUnitOfWork {
    async fn ensure_active(
        &mut self,
        session_id: &str,
        agent_id: &str,
        start_tick: i64,
    ) -> Result<(), PortError> {
        sqlx::query(
            r"INSERT INTO agent_sessions (id, agent_id, start_tick, status)
              VALUES ($1, $2, $3, $4)
              ON CONFLICT (id) DO NOTHING",
        )
        .bind(session_id)
        .bind(agent_id)
        .bind(start_tick)
        .bind(SessionStatus::Alive.as_str())
        .execute(&mut *self.tx)
        .await
        .map_err(pg)?;
        Ok(())
    }

    async fn close(
        &mut self,
        session_id: &str,
        cause: DeathCause,
        ended_at: DateTime<Utc>,
    ) -> Result<(), PortError> {
        let agent_id = session_id.trim_start_matches("session-");
        sqlx::query(
            r"INSERT INTO agent_sessions (id, agent_id, start_tick, status, death_cause, ended_at)
              VALUES ($1, $2, 0, $3, $4, $5)
              ON CONFLICT (id) DO UPDATE
              SET status = EXCLUDED.status,
                  death_cause = EXCLUDED.death_cause,
                  ended_at = EXCLUDED.ended_at",
        )
        .bind(session_id)
        .bind(agent_id)
        .bind(SessionStatus::Dead.as_str())
        .bind(cause.as_str())
        .bind(ended_at)
        .execute(&mut *self.tx)
        .await
        .map_err(pg)?;
        Ok(())
    }
}
