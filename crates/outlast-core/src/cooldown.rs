//! Cooldowns derived from the recent event window.
//!
//! There is no timer store. The most recent `action_settled` event whose
//! `decision.intent` matches an action type is the start of that type's
//! cooldown.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::json;

use outlast_types::{ActionType, DomainEvent, EventType};

/// Cooldown length in seconds by action type.
pub type CooldownTable = BTreeMap<ActionType, i64>;

/// Seconds until `action_type` is ready again, or `None` when it is ready.
///
/// Partial seconds round up and a running cooldown never reports less
/// than one second.
pub fn remaining_for_action(
    events: &[DomainEvent],
    action_type: ActionType,
    now: DateTime<Utc>,
    table: &CooldownTable,
) -> Option<i64> {
    let cooldown_ms = table.get(&action_type)?.checked_mul(1000)?;
    let last = latest_settled_at(events, action_type)?;
    let elapsed_ms = now.signed_duration_since(last).num_milliseconds();
    let remaining_ms = cooldown_ms.checked_sub(elapsed_ms)?;
    if remaining_ms <= 0 {
        return None;
    }
    let seconds = remaining_ms.checked_add(999)?.checked_div(1000)?;
    Some(seconds.max(1))
}

/// Remaining seconds for every configured action type still cooling down.
pub fn remaining_by_action(
    events: &[DomainEvent],
    now: DateTime<Utc>,
    table: &CooldownTable,
) -> BTreeMap<ActionType, i64> {
    table
        .keys()
        .filter_map(|t| remaining_for_action(events, *t, now, table).map(|r| (*t, r)))
        .collect()
}

/// Like [`remaining_by_action`], counting `current` as settled at `now`.
pub fn remaining_by_action_with_current(
    events: &[DomainEvent],
    now: DateTime<Utc>,
    current: ActionType,
    table: &CooldownTable,
) -> BTreeMap<ActionType, i64> {
    let mut extended = events.to_vec();
    extended.push(DomainEvent::new(
        EventType::ActionSettled,
        now,
        json!({"decision": {"intent": current.as_str()}}),
    ));
    remaining_by_action(&extended, now, table)
}

fn latest_settled_at(events: &[DomainEvent], action_type: ActionType) -> Option<DateTime<Utc>> {
    events
        .iter()
        .filter(|evt| evt.is_settled(action_type.as_str()))
        .map(|evt| evt.occurred_at)
        .max()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn table() -> CooldownTable {
        BTreeMap::from([(ActionType::Move, 60), (ActionType::Build, 300)])
    }

    fn settled(intent: &str, at: DateTime<Utc>) -> DomainEvent {
        DomainEvent::new(
            EventType::ActionSettled,
            at,
            json!({"decision": {"intent": intent}}),
        )
    }

    fn now() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn running_cooldown_reports_remaining() {
        let events = vec![settled("move", now() - Duration::seconds(30))];
        assert_eq!(
            remaining_for_action(&events, ActionType::Move, now(), &table()),
            Some(30)
        );
    }

    #[test]
    fn expired_cooldown_is_ready() {
        let events = vec![settled("move", now() - Duration::seconds(61))];
        assert_eq!(
            remaining_for_action(&events, ActionType::Move, now(), &table()),
            None
        );
    }

    #[test]
    fn partial_second_rounds_up() {
        let events = vec![settled("move", now() - Duration::milliseconds(59_500))];
        assert_eq!(
            remaining_for_action(&events, ActionType::Move, now(), &table()),
            Some(1)
        );
    }

    #[test]
    fn most_recent_matching_event_wins() {
        let events = vec![
            settled("move", now() - Duration::seconds(10)),
            settled("move", now() - Duration::seconds(50)),
            settled("gather", now()),
        ];
        assert_eq!(
            remaining_for_action(&events, ActionType::Move, now(), &table()),
            Some(50)
        );
    }

    #[test]
    fn unconfigured_type_has_no_cooldown() {
        let events = vec![settled("gather", now())];
        assert_eq!(
            remaining_for_action(&events, ActionType::Gather, now(), &table()),
            None
        );
    }

    #[test]
    fn with_current_includes_in_flight_intent() {
        let by_action = remaining_by_action_with_current(&[], now(), ActionType::Build, &table());
        assert_eq!(by_action, BTreeMap::from([(ActionType::Build, 300)]));
        assert!(remaining_by_action(&[], now(), &table()).is_empty());
    }
}
