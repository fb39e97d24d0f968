//! Response assembly helpers.

use serde_json::{Value, json};

use outlast_types::{DomainEvent, EventType};

/// Summary of the first `action_settled` event's result.
///
/// `None` when no settlement happened (rest start) or the event carries no
/// result object.
pub fn settlement_summary(events: &[DomainEvent]) -> Option<Value> {
    let settled = events
        .iter()
        .find(|e| e.event_type == EventType::ActionSettled)?;
    let result = settled.result()?;
    let field = |key: &str| result.get(key).cloned().unwrap_or(Value::Null);
    Some(json!({
        "hp_loss": field("hp_loss"),
        "inventory_delta": field("inventory_delta"),
        "vitals_delta": field("vitals_delta"),
        "vitals_change_reasons": field("vitals_change_reasons"),
    }))
}

/// World-time window recorded on the first event carrying both bounds.
pub fn world_time_window_from_events(events: &[DomainEvent]) -> Option<(i64, i64)> {
    events.iter().find_map(|evt| {
        Some((
            evt.payload_i64("world_time_before_seconds")?,
            evt.payload_i64("world_time_after_seconds")?,
        ))
    })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[test]
    fn summary_reads_settled_result() {
        let events = vec![
            DomainEvent::new(EventType::RestStarted, Utc::now(), json!({})),
            DomainEvent::new(
                EventType::ActionSettled,
                Utc::now(),
                json!({"result": {"hp_loss": 2, "inventory_delta": {"wood": 1}, "seed_gained": true}}),
            ),
        ];
        let summary = settlement_summary(&events);
        assert_eq!(
            summary,
            Some(json!({
                "hp_loss": 2,
                "inventory_delta": {"wood": 1},
                "vitals_delta": null,
                "vitals_change_reasons": null,
            }))
        );
    }

    #[test]
    fn summary_absent_without_settlement() {
        let events = vec![DomainEvent::new(EventType::RestStarted, Utc::now(), json!({}))];
        assert!(settlement_summary(&events).is_none());
    }

    #[test]
    fn window_comes_from_first_complete_event() {
        let events = vec![
            DomainEvent::new(EventType::CriticalHp, Utc::now(), json!({"world_time_before_seconds": 1})),
            DomainEvent::new(
                EventType::ActionSettled,
                Utc::now(),
                json!({"world_time_before_seconds": 60, "world_time_after_seconds": 660}),
            ),
        ];
        assert_eq!(world_time_window_from_events(&events), Some((60, 660)));
        assert_eq!(world_time_window_from_events(&[]), None);
    }
}
