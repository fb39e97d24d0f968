//! Storage, world, and metrics ports consumed by the action engine.
//!
//! Adapters in `outlast-db` implement the repository traits; the engine only
//! ever sees them through a [`UnitOfWork`] opened by a [`TxManager`]. Every
//! write made through one unit of work becomes visible atomically on
//! [`UnitOfWork::commit`] and is discarded by [`UnitOfWork::rollback`] (or by
//! dropping the unit of work).

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::enums::{DeathCause, ResultCode};
use crate::events::DomainEvent;
use crate::structs::{
    ActionExecutionRecord, AgentResourceNodeRecord, AgentStateAggregate, Position,
    WorldObjectRecord, WorldSnapshot,
};

/// Errors surfaced by port implementations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    /// The requested record does not exist.
    #[error("not found")]
    NotFound,
    /// A versioned or write-once write lost a race.
    #[error("conflict")]
    Conflict,
    /// Any other adapter failure.
    #[error("backend error: {0}")]
    Backend(String),
}

// ---------------------------------------------------------------------------
// Repositories
// ---------------------------------------------------------------------------

/// Version-checked store of agent state.
#[async_trait]
pub trait AgentStateRepository: Send {
    /// Load an agent's state. Fails with [`PortError::NotFound`] when absent.
    async fn get_by_agent_id(&mut self, agent_id: &str) -> Result<AgentStateAggregate, PortError>;

    /// Save `state` only if the stored version equals `expected_version`.
    ///
    /// A missing row is inserted when `expected_version` is zero. Any other
    /// mismatch fails with [`PortError::Conflict`] and writes nothing.
    async fn save_with_version(
        &mut self,
        state: &AgentStateAggregate,
        expected_version: i64,
    ) -> Result<(), PortError>;
}

/// Write-once idempotency store.
#[async_trait]
pub trait ActionExecutionRepository: Send {
    /// Look up a completed action by agent and idempotency key.
    async fn get_by_idempotency_key(
        &mut self,
        agent_id: &str,
        key: &str,
    ) -> Result<Option<ActionExecutionRecord>, PortError>;

    /// Persist a completed action. A duplicate key fails with
    /// [`PortError::Conflict`] and leaves the stored record untouched.
    async fn save_execution(&mut self, record: &ActionExecutionRecord) -> Result<(), PortError>;
}

/// Append-only per-agent event log.
#[async_trait]
pub trait EventRepository: Send {
    /// Append events in order.
    async fn append(&mut self, agent_id: &str, events: &[DomainEvent]) -> Result<(), PortError>;

    /// The most recent `limit` events, newest first.
    async fn list_by_agent_id(
        &mut self,
        agent_id: &str,
        limit: usize,
    ) -> Result<Vec<DomainEvent>, PortError>;
}

/// Store of placed world objects.
#[async_trait]
pub trait WorldObjectRepository: Send {
    /// Look up an object by id.
    async fn get_by_object_id(
        &mut self,
        object_id: &str,
    ) -> Result<Option<WorldObjectRecord>, PortError>;

    /// Insert a new object. A duplicate id fails with [`PortError::Conflict`].
    async fn save(&mut self, object: &WorldObjectRecord) -> Result<(), PortError>;

    /// Replace an existing object. Fails with [`PortError::NotFound`] when absent.
    async fn update(&mut self, object: &WorldObjectRecord) -> Result<(), PortError>;

    /// All objects owned by an agent.
    async fn list_by_agent_id(&mut self, agent_id: &str)
    -> Result<Vec<WorldObjectRecord>, PortError>;
}

/// Per-agent gather-target depletion store.
#[async_trait]
pub trait AgentResourceNodeRepository: Send {
    /// Insert or replace the record for `(agent_id, target_id)`.
    async fn upsert(&mut self, node: &AgentResourceNodeRecord) -> Result<(), PortError>;

    /// Look up a depletion record.
    async fn get_by_target_id(
        &mut self,
        agent_id: &str,
        target_id: &str,
    ) -> Result<Option<AgentResourceNodeRecord>, PortError>;

    /// All depletion records of an agent.
    async fn list_by_agent_id(
        &mut self,
        agent_id: &str,
    ) -> Result<Vec<AgentResourceNodeRecord>, PortError>;
}

/// Session lifecycle marker.
#[async_trait]
pub trait AgentSessionRepository: Send {
    /// Create the session if it does not exist yet. Existing sessions are left alone.
    async fn ensure_active(
        &mut self,
        session_id: &str,
        agent_id: &str,
        start_tick: i64,
    ) -> Result<(), PortError>;

    /// Mark the session dead, creating it first when it was never opened.
    async fn close(
        &mut self,
        session_id: &str,
        cause: DeathCause,
        ended_at: DateTime<Utc>,
    ) -> Result<(), PortError>;
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

/// One transaction spanning every repository.
#[async_trait]
pub trait UnitOfWork: Send {
    /// Agent state repository.
    fn states(&mut self) -> &mut dyn AgentStateRepository;
    /// Execution record repository.
    fn executions(&mut self) -> &mut dyn ActionExecutionRepository;
    /// Event repository.
    fn events(&mut self) -> &mut dyn EventRepository;
    /// World object repository.
    fn objects(&mut self) -> &mut dyn WorldObjectRepository;
    /// Depletion repository.
    fn resources(&mut self) -> &mut dyn AgentResourceNodeRepository;
    /// Session repository.
    fn sessions(&mut self) -> &mut dyn AgentSessionRepository;

    /// Publish every write made through this unit of work.
    async fn commit(self: Box<Self>) -> Result<(), PortError>;

    /// Discard every write made through this unit of work.
    async fn rollback(self: Box<Self>) -> Result<(), PortError>;
}

/// Opens units of work.
#[async_trait]
pub trait TxManager: Send + Sync {
    /// Begin a new transaction.
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, PortError>;
}

// ---------------------------------------------------------------------------
// World and metrics
// ---------------------------------------------------------------------------

/// Source of per-call world snapshots.
#[async_trait]
pub trait WorldProvider: Send + Sync {
    /// Snapshot of the world around `center` as seen by `agent_id`.
    async fn snapshot_for_agent(
        &self,
        agent_id: &str,
        center: Position,
    ) -> Result<WorldSnapshot, PortError>;
}

/// Observability sink for action outcomes.
pub trait ActionMetrics: Send + Sync {
    /// A call completed with `result_code`.
    fn record_success(&self, result_code: ResultCode);
    /// A call lost an optimistic-concurrency race.
    fn record_conflict(&self);
    /// A call failed for any other reason.
    fn record_failure(&self);
}

/// Metrics sink that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl ActionMetrics for NoopMetrics {
    fn record_success(&self, _result_code: ResultCode) {}
    fn record_conflict(&self) {}
    fn record_failure(&self) {}
}
