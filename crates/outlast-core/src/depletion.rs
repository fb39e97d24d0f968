//! Gather targets and their respawn windows.
//!
//! A gather target id has the form `res_<x>_<y>_<resource>`. Depletion is
//! stored per agent and per target by the pipeline; this module parses target
//! ids and also derives remaining respawn time from the event window, which
//! covers gathers logged without a stored record.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Duration, Utc};

use outlast_types::{ActionType, AgentResourceNodeRecord, DomainEvent, Position};

use crate::config::PolicyConfig;

/// A parsed gather target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceTarget {
    /// Tile of the resource node.
    pub pos: Position,
    /// Lower-cased resource name.
    pub resource: String,
}

impl ResourceTarget {
    /// Canonical form of `target_id`, or the trimmed input when it does not
    /// parse.
    pub fn canonical_id(target_id: &str) -> String {
        Self::parse(target_id).map_or_else(|| target_id.trim().to_owned(), |t| t.to_string())
    }

    /// Parse `res_<x>_<y>_<resource>`. Returns `None` for anything else.
    pub fn parse(target_id: &str) -> Option<Self> {
        let mut parts = target_id.trim().splitn(4, '_');
        if parts.next()? != "res" {
            return None;
        }
        let x = parts.next()?.parse().ok()?;
        let y = parts.next()?.parse().ok()?;
        let resource = parts.next()?.trim().to_lowercase();
        if resource.is_empty() {
            return None;
        }
        Some(Self {
            pos: Position::new(x, y),
            resource,
        })
    }
}

impl fmt::Display for ResourceTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "res_{}_{}_{}", self.pos.x, self.pos.y, self.resource)
    }
}

/// Respawn window of `resource`.
pub fn respawn_duration(policy: &PolicyConfig, resource: &str) -> Duration {
    let key = resource.trim().to_lowercase();
    let minutes = policy
        .respawn_minutes
        .get(&key)
        .copied()
        .unwrap_or(policy.default_respawn_minutes);
    Duration::try_minutes(minutes).unwrap_or_else(Duration::zero)
}

/// Targets still depleted at `now`, with whole seconds until respawn.
///
/// Keys are canonical target ids. Only the latest gather of each target
/// counts. Remaining time is floored and never reported as less than one
/// second.
pub fn depleted_targets(
    events: &[DomainEvent],
    now: DateTime<Utc>,
    policy: &PolicyConfig,
) -> BTreeMap<String, i64> {
    let mut latest: BTreeMap<String, (DateTime<Utc>, String)> = BTreeMap::new();
    for evt in events {
        if !evt.is_settled(ActionType::Gather.as_str()) {
            continue;
        }
        let Some(target_id) = evt.decision_param_str("target_id").map(str::trim) else {
            continue;
        };
        let Some(target) = ResourceTarget::parse(target_id) else {
            continue;
        };
        let key = target.to_string();
        let newer = latest
            .get(&key)
            .is_none_or(|(at, _)| evt.occurred_at > *at);
        if newer {
            latest.insert(key, (evt.occurred_at, target.resource));
        }
    }

    latest
        .into_iter()
        .filter_map(|(target_id, (gathered_at, resource))| {
            let until = gathered_at.checked_add_signed(respawn_duration(policy, &resource))?;
            let remaining = until.signed_duration_since(now).num_seconds();
            (until > now).then_some((target_id, remaining.max(1)))
        })
        .collect()
}

/// Depletion record for a gather of `target_id` at `now`.
///
/// The record is keyed by the canonical id. `None` when the id does not
/// parse as a resource target.
pub fn depletion_record(
    agent_id: &str,
    target_id: &str,
    now: DateTime<Utc>,
    policy: &PolicyConfig,
) -> Option<AgentResourceNodeRecord> {
    let target = ResourceTarget::parse(target_id)?;
    let depleted_until = now.checked_add_signed(respawn_duration(policy, &target.resource))?;
    Some(AgentResourceNodeRecord {
        agent_id: agent_id.to_owned(),
        target_id: target.to_string(),
        resource_type: target.resource,
        x: target.pos.x,
        y: target.pos.y,
        depleted_until,
        updated_at: now,
    })
}

/// Whole seconds until `until`, floored and at least one. `None` once passed.
pub fn remaining_seconds(until: DateTime<Utc>, now: DateTime<Utc>) -> Option<i64> {
    (until > now).then(|| until.signed_duration_since(now).num_seconds().max(1))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use serde_json::json;

    use outlast_types::EventType;

    use super::*;

    fn gathered(target: &str, at: DateTime<Utc>) -> DomainEvent {
        DomainEvent::new(
            EventType::ActionSettled,
            at,
            json!({"decision": {"intent": "gather", "params": {"target_id": target}}}),
        )
    }

    #[test]
    fn parses_negative_coordinates() {
        let target = ResourceTarget::parse("res_-3_5_Wood").unwrap();
        assert_eq!(target.pos, Position::new(-3, 5));
        assert_eq!(target.resource, "wood");
        assert_eq!(target.to_string(), "res_-3_5_wood");
    }

    #[test]
    fn rejects_malformed_ids() {
        assert!(ResourceTarget::parse("tree_1_2_wood").is_none());
        assert!(ResourceTarget::parse("res_a_2_wood").is_none());
        assert!(ResourceTarget::parse("res_1_2_").is_none());
        assert!(ResourceTarget::parse("res_1_2").is_none());
    }

    #[test]
    fn display_normalizes_resource_name() {
        let target = ResourceTarget::parse(" res_0_-3_Stone ").unwrap();
        assert_eq!(target.pos, Position::new(0, -3));
        assert_eq!(target.to_string(), "res_0_-3_stone");
        assert_eq!(ResourceTarget::canonical_id(" res_0_-3_Stone "), "res_0_-3_stone");
        assert_eq!(ResourceTarget::canonical_id(" tree "), "tree");
    }

    #[test]
    fn respawn_by_resource() {
        let policy = PolicyConfig::default();
        assert_eq!(respawn_duration(&policy, "berry"), Duration::minutes(30));
        assert_eq!(respawn_duration(&policy, "wood"), Duration::minutes(60));
        assert_eq!(respawn_duration(&policy, "mystery"), Duration::minutes(60));
    }

    #[test]
    fn depleted_targets_uses_latest_gather() {
        let now = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
        let events = vec![
            gathered("res_1_1_stone", now - Duration::minutes(10)),
            gathered("res_2_2_wood", now - Duration::minutes(70)),
            gathered("res_2_2_wood", now - Duration::minutes(80)),
        ];
        let depleted = depleted_targets(&events, now, &PolicyConfig::default());
        assert_eq!(depleted.len(), 1);
        let remaining = depleted.get("res_1_1_stone").copied().unwrap();
        assert!((2900..=3600).contains(&remaining));
    }

    #[test]
    fn depletion_record_sets_deadline() {
        let now = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
        let record = depletion_record("a1", " res_0_0_Wood ", now, &PolicyConfig::default()).unwrap();
        assert_eq!(record.target_id, "res_0_0_wood");
        assert_eq!(record.resource_type, "wood");
        assert_eq!(record.depleted_until, now + Duration::minutes(60));
        assert!(depletion_record("a1", "tree", now, &PolicyConfig::default()).is_none());
    }

    #[test]
    fn remaining_seconds_floors_with_minimum() {
        let now = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
        assert_eq!(remaining_seconds(now + Duration::milliseconds(2500), now), Some(2));
        assert_eq!(remaining_seconds(now + Duration::milliseconds(300), now), Some(1));
        assert_eq!(remaining_seconds(now, now), None);
    }
}
