//! Startup seeding of configured agents.

use tracing::info;

use outlast_types::{AgentStateAggregate, PortError, TxManager};

/// Create a fresh state for every agent in `agent_ids` that has none yet.
///
/// Runs in one unit of work and returns the number of agents created.
pub async fn seed_agents(tx: &dyn TxManager, agent_ids: &[String]) -> Result<usize, PortError> {
    let mut uow = tx.begin().await?;
    let mut created = 0_usize;
    for agent_id in agent_ids.iter().map(|id| id.trim()).filter(|id| !id.is_empty()) {
        match uow.states().get_by_agent_id(agent_id).await {
            Ok(_) => continue,
            Err(PortError::NotFound) => {}
            Err(err) => {
                uow.rollback().await?;
                return Err(err);
            }
        }
        if let Err(err) = uow
            .states()
            .save_with_version(&AgentStateAggregate::fresh(agent_id), 0)
            .await
        {
            uow.rollback().await?;
            return Err(err);
        }
        created = created.saturating_add(1);
    }
    uow.commit().await?;
    info!(requested = agent_ids.len(), created, "Bootstrap agents seeded");
    Ok(created)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use outlast_db::MemoryStore;

    use super::*;

    #[tokio::test]
    async fn seeds_only_missing_agents() {
        let store = MemoryStore::new();
        let mut existing = AgentStateAggregate::fresh("a1");
        existing.version = 7;
        store.seed_state(existing).await;

        let ids = vec!["a1".to_owned(), " a2 ".to_owned(), String::new()];
        let created = seed_agents(&store, &ids).await.unwrap();
        assert_eq!(created, 1);
        assert_eq!(store.state("a1").await.unwrap().version, 7);
        assert_eq!(store.state("a2").await.unwrap().version, 1);

        assert_eq!(seed_agents(&store, &ids).await.unwrap(), 0);
    }
}
