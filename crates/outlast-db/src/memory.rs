//! Transactional in-memory store.
//!
//! A single async mutex guards every table. [`MemoryStore::begin`] takes the
//! lock for the lifetime of the unit of work and hands out a working copy of
//! the tables. `commit` publishes the copy and `rollback` (or drop) discards
//! it, so a failed action leaves no trace. Units of work are serialized,
//! which is plenty for the binary and for tests.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use outlast_types::{
    ActionExecutionRecord, ActionExecutionRepository, AgentResourceNodeRecord,
    AgentResourceNodeRepository, AgentSession, AgentSessionRepository, AgentStateAggregate,
    AgentStateRepository, DeathCause, DomainEvent, EventRepository, PortError, SessionStatus,
    TxManager, UnitOfWork, WorldObjectRecord, WorldObjectRepository,
};

/// `(agent_id, key)` composite key.
type AgentKey = (String, String);

#[derive(Debug, Clone, Default)]
struct Tables {
    states: BTreeMap<String, AgentStateAggregate>,
    executions: BTreeMap<AgentKey, ActionExecutionRecord>,
    /// Oldest first.
    events: BTreeMap<String, Vec<DomainEvent>>,
    objects: BTreeMap<String, WorldObjectRecord>,
    resources: BTreeMap<AgentKey, AgentResourceNodeRecord>,
    sessions: BTreeMap<String, AgentSession>,
}

/// In-memory implementation of every storage port.
///
/// Cloning yields another handle onto the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Write `state` directly, bypassing the version check.
    pub async fn seed_state(&self, state: AgentStateAggregate) {
        let mut tables = self.tables.lock().await;
        tables.states.insert(state.agent_id.clone(), state);
    }

    /// Write `object` directly.
    pub async fn seed_object(&self, object: WorldObjectRecord) {
        let mut tables = self.tables.lock().await;
        tables.objects.insert(object.object_id.clone(), object);
    }

    /// Append `events` directly.
    pub async fn seed_events(&self, agent_id: &str, events: Vec<DomainEvent>) {
        let mut tables = self.tables.lock().await;
        tables
            .events
            .entry(agent_id.to_owned())
            .or_default()
            .extend(events);
    }

    /// Committed state of an agent.
    pub async fn state(&self, agent_id: &str) -> Option<AgentStateAggregate> {
        self.tables.lock().await.states.get(agent_id).cloned()
    }

    /// Committed events of an agent, oldest first.
    pub async fn events(&self, agent_id: &str) -> Vec<DomainEvent> {
        self.tables
            .lock()
            .await
            .events
            .get(agent_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Committed execution record.
    pub async fn execution(&self, agent_id: &str, key: &str) -> Option<ActionExecutionRecord> {
        self.tables
            .lock()
            .await
            .executions
            .get(&(agent_id.to_owned(), key.to_owned()))
            .cloned()
    }

    /// Number of committed execution records.
    pub async fn execution_count(&self) -> usize {
        self.tables.lock().await.executions.len()
    }

    /// Committed depletion record.
    pub async fn resource(&self, agent_id: &str, target_id: &str) -> Option<AgentResourceNodeRecord> {
        self.tables
            .lock()
            .await
            .resources
            .get(&(agent_id.to_owned(), target_id.to_owned()))
            .cloned()
    }

    /// Committed world object.
    pub async fn object(&self, object_id: &str) -> Option<WorldObjectRecord> {
        self.tables.lock().await.objects.get(object_id).cloned()
    }

    /// Committed session.
    pub async fn session(&self, session_id: &str) -> Option<AgentSession> {
        self.tables.lock().await.sessions.get(session_id).cloned()
    }
}

#[async_trait]
impl TxManager for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, PortError> {
        let guard = Arc::clone(&self.tables).lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryUnitOfWork { guard, working }))
    }
}

/// One serialized transaction over a [`MemoryStore`].
#[derive(Debug)]
pub struct MemoryUnitOfWork {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
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
        let Self { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), PortError> {
        Ok(())
    }
}

#[async_trait]
impl AgentStateRepository for MemoryUnitOfWork {
    async fn get_by_agent_id(&mut self, agent_id: &str) -> Result<AgentStateAggregate, PortError> {
        self.working
            .states
            .get(agent_id)
            .cloned()
            .ok_or(PortError::NotFound)
    }

    async fn save_with_version(
        &mut self,
        state: &AgentStateAggregate,
        expected_version: i64,
    ) -> Result<(), PortError> {
        let stored = self.working.states.get(&state.agent_id).map(|s| s.version);
        match stored {
            Some(version) if version == expected_version => {}
            None if expected_version == 0 => {}
            _ => return Err(PortError::Conflict),
        }
        self.working
            .states
            .insert(state.agent_id.clone(), state.clone());
        Ok(())
    }
}

#[async_trait]
impl ActionExecutionRepository for MemoryUnitOfWork {
    async fn get_by_idempotency_key(
        &mut self,
        agent_id: &str,
        key: &str,
    ) -> Result<Option<ActionExecutionRecord>, PortError> {
        Ok(self
            .working
            .executions
            .get(&(agent_id.to_owned(), key.to_owned()))
            .cloned())
    }

    async fn save_execution(&mut self, record: &ActionExecutionRecord) -> Result<(), PortError> {
        let key = (record.agent_id.clone(), record.idempotency_key.clone());
        if self.working.executions.contains_key(&key) {
            return Err(PortError::Conflict);
        }
        self.working.executions.insert(key, record.clone());
        Ok(())
    }
}

#[async_trait]
impl EventRepository for MemoryUnitOfWork {
    async fn append(&mut self, agent_id: &str, events: &[DomainEvent]) -> Result<(), PortError> {
        self.working
            .events
            .entry(agent_id.to_owned())
            .or_default()
            .extend_from_slice(events);
        Ok(())
    }

    async fn list_by_agent_id(
        &mut self,
        agent_id: &str,
        limit: usize,
    ) -> Result<Vec<DomainEvent>, PortError> {
        Ok(self
            .working
            .events
            .get(agent_id)
            .map(|events| events.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl WorldObjectRepository for MemoryUnitOfWork {
    async fn get_by_object_id(
        &mut self,
        object_id: &str,
    ) -> Result<Option<WorldObjectRecord>, PortError> {
        Ok(self.working.objects.get(object_id).cloned())
    }

    async fn save(&mut self, object: &WorldObjectRecord) -> Result<(), PortError> {
        if self.working.objects.contains_key(&object.object_id) {
            return Err(PortError::Conflict);
        }
        self.working
            .objects
            .insert(object.object_id.clone(), object.clone());
        Ok(())
    }

    async fn update(&mut self, object: &WorldObjectRecord) -> Result<(), PortError> {
        let slot = self
            .working
            .objects
            .get_mut(&object.object_id)
            .ok_or(PortError::NotFound)?;
        *slot = object.clone();
        Ok(())
    }

    async fn list_by_agent_id(
        &mut self,
        agent_id: &str,
    ) -> Result<Vec<WorldObjectRecord>, PortError> {
        Ok(self
            .working
            .objects
            .values()
            .filter(|o| o.owner_agent_id == agent_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl AgentResourceNodeRepository for MemoryUnitOfWork {
    async fn upsert(&mut self, node: &AgentResourceNodeRecord) -> Result<(), PortError> {
        self.working.resources.insert(
            (node.agent_id.clone(), node.target_id.clone()),
            node.clone(),
        );
        Ok(())
    }

    async fn get_by_target_id(
        &mut self,
        agent_id: &str,
        target_id: &str,
    ) -> Result<Option<AgentResourceNodeRecord>, PortError> {
        Ok(self
            .working
            .resources
            .get(&(agent_id.to_owned(), target_id.to_owned()))
            .cloned())
    }

    async fn list_by_agent_id(
        &mut self,
        agent_id: &str,
    ) -> Result<Vec<AgentResourceNodeRecord>, PortError> {
        Ok(self
            .working
            .resources
            .values()
            .filter(|r| r.agent_id == agent_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl AgentSessionRepository for MemoryUnitOfWork {
    async fn ensure_active(
        &mut self,
        session_id: &str,
        agent_id: &str,
        start_tick: i64,
    ) -> Result<(), PortError> {
        self.working
            .sessions
            .entry(session_id.to_owned())
            .or_insert_with(|| AgentSession {
                id: session_id.to_owned(),
                agent_id: agent_id.to_owned(),
                start_tick,
                ended_at: None,
                status: SessionStatus::Alive,
                death_cause: None,
            });
        Ok(())
    }

    async fn close(
        &mut self,
        session_id: &str,
        cause: DeathCause,
        ended_at: DateTime<Utc>,
    ) -> Result<(), PortError> {
        let session = self
            .working
            .sessions
            .entry(session_id.to_owned())
            .or_insert_with(|| AgentSession {
                id: session_id.to_owned(),
                agent_id: session_id.trim_start_matches("session-").to_owned(),
                start_tick: 0,
                ended_at: None,
                status: SessionStatus::Alive,
                death_cause: None,
            });
        session.status = SessionStatus::Dead;
        session.death_cause = Some(cause);
        session.ended_at = Some(ended_at);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use serde_json::json;

    use outlast_types::EventType;

    use super::*;

    fn event(n: i64) -> DomainEvent {
        DomainEvent::new(EventType::ActionSettled, Utc::now(), json!({"n": n}))
    }

    #[tokio::test]
    async fn commit_publishes_writes() {
        let store = MemoryStore::new();
        let mut uow = store.begin().await.unwrap();
        uow.states()
            .save_with_version(&AgentStateAggregate::fresh("a1"), 0)
            .await
            .unwrap();
        uow.commit().await.unwrap();
        assert_eq!(store.state("a1").await.unwrap().version, 1);
    }

    #[tokio::test]
    async fn rollback_discards_writes() {
        let store = MemoryStore::new();
        let mut uow = store.begin().await.unwrap();
        uow.states()
            .save_with_version(&AgentStateAggregate::fresh("a1"), 0)
            .await
            .unwrap();
        uow.events().append("a1", &[event(1)]).await.unwrap();
        uow.rollback().await.unwrap();
        assert!(store.state("a1").await.is_none());
        assert!(store.events("a1").await.is_empty());
    }

    #[tokio::test]
    async fn dropped_unit_of_work_discards_writes() {
        let store = MemoryStore::new();
        {
            let mut uow = store.begin().await.unwrap();
            uow.events().append("a1", &[event(1)]).await.unwrap();
        }
        assert!(store.events("a1").await.is_empty());
    }

    #[tokio::test]
    async fn stale_version_is_a_conflict() {
        let store = MemoryStore::new();
        store.seed_state(AgentStateAggregate::fresh("a1")).await;
        let mut uow = store.begin().await.unwrap();
        let mut state = uow.states().get_by_agent_id("a1").await.unwrap();
        state.version = 2;
        let err = uow.states().save_with_version(&state, 0).await.unwrap_err();
        assert_eq!(err, PortError::Conflict);
        uow.states().save_with_version(&state, 1).await.unwrap();
        uow.commit().await.unwrap();
        assert_eq!(store.state("a1").await.unwrap().version, 2);
    }

    #[tokio::test]
    async fn executions_are_write_once() {
        let store = MemoryStore::new();
        let record = ActionExecutionRecord {
            agent_id: "a1".into(),
            idempotency_key: "k1".into(),
            intent_type: "move".into(),
            dt_minutes: 30,
            result: outlast_types::ActionResult {
                updated_state: AgentStateAggregate::fresh("a1"),
                events: Vec::new(),
                result_code: outlast_types::ResultCode::Ok,
            },
            world_time_before_seconds: 0,
            world_time_after_seconds: 1_800,
            applied_at: Utc::now(),
        };
        let mut uow = store.begin().await.unwrap();
        uow.executions().save_execution(&record).await.unwrap();
        assert_eq!(
            uow.executions().save_execution(&record).await.unwrap_err(),
            PortError::Conflict
        );
        let found = uow.executions().get_by_idempotency_key("a1", "k1").await.unwrap();
        assert_eq!(found, Some(record));
    }

    #[tokio::test]
    async fn events_list_newest_first() {
        let store = MemoryStore::new();
        store.seed_events("a1", vec![event(1), event(2), event(3)]).await;
        let mut uow = store.begin().await.unwrap();
        let listed = uow.events().list_by_agent_id("a1", 2).await.unwrap();
        let ns: Vec<_> = listed.iter().filter_map(|e| e.payload_i64("n")).collect();
        assert_eq!(ns, vec![3, 2]);
    }

    #[tokio::test]
    async fn sessions_open_once_and_close() {
        let store = MemoryStore::new();
        let mut uow = store.begin().await.unwrap();
        uow.sessions().ensure_active("session-a1", "a1", 1).await.unwrap();
        uow.sessions().ensure_active("session-a1", "a1", 7).await.unwrap();
        uow.sessions()
            .close("session-a1", DeathCause::Starvation, Utc::now())
            .await
            .unwrap();
        uow.commit().await.unwrap();
        let session = store.session("session-a1").await.unwrap();
        assert_eq!(session.start_tick, 1);
        assert_eq!(session.status, SessionStatus::Dead);
        assert_eq!(session.death_cause, Some(DeathCause::Starvation));
    }
}
