//! Domain events appended to each agent's event stream.
//!
//! Payloads are free-form JSON objects, but the `action_settled` shape is a
//! contract: cooldown, depletion, seed pity, and delta derivation all read
//! fields back out of past events. The accessors below are the only place
//! those field names are spelled out for readers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use ts_rs::TS;

use crate::enums::EventType;

/// JSON object payload of an event.
pub type Payload = Map<String, Value>;

/// One append-only entry in an agent's event stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct DomainEvent {
    /// Event type tag.
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// When the event occurred.
    pub occurred_at: DateTime<Utc>,
    /// Event-specific data.
    #[ts(type = "Record<string, unknown>")]
    pub payload: Payload,
}

impl DomainEvent {
    /// Build an event from a JSON value. Non-object values yield an empty payload.
    pub fn new(event_type: EventType, occurred_at: DateTime<Utc>, payload: Value) -> Self {
        let payload = match payload {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            event_type,
            occurred_at,
            payload,
        }
    }

    /// `decision.intent` of an `action_settled` event.
    pub fn decision_intent(&self) -> Option<&str> {
        self.payload
            .get("decision")
            .and_then(|d| d.get("intent"))
            .and_then(Value::as_str)
    }

    /// `decision.params.<key>` as a string.
    pub fn decision_param_str(&self, key: &str) -> Option<&str> {
        self.payload
            .get("decision")
            .and_then(|d| d.get("params"))
            .and_then(|p| p.get(key))
            .and_then(Value::as_str)
    }

    /// The `result` object of an `action_settled` event.
    pub fn result(&self) -> Option<&Map<String, Value>> {
        self.payload.get("result").and_then(Value::as_object)
    }

    /// Integer field at the top level of the payload.
    pub fn payload_i64(&self, key: &str) -> Option<i64> {
        self.payload.get(key).and_then(Value::as_i64)
    }

    /// Insert or replace a top-level payload field.
    pub fn set(&mut self, key: &str, value: Value) {
        self.payload.insert(key.to_owned(), value);
    }

    /// Whether this is an `action_settled` event for `intent`.
    pub fn is_settled(&self, intent: &str) -> bool {
        self.event_type == EventType::ActionSettled && self.decision_intent() == Some(intent)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn settled() -> DomainEvent {
        DomainEvent::new(
            EventType::ActionSettled,
            DateTime::<Utc>::from_timestamp(60, 0).unwrap(),
            json!({
                "decision": {"intent": "gather", "params": {"target_id": "res_0_0_wood"}},
                "result": {"seed_gained": false},
                "world_time_after_seconds": 90,
            }),
        )
    }

    #[test]
    fn accessors_read_contract_fields() {
        let event = settled();
        assert_eq!(event.decision_intent(), Some("gather"));
        assert_eq!(event.decision_param_str("target_id"), Some("res_0_0_wood"));
        assert_eq!(event.payload_i64("world_time_after_seconds"), Some(90));
        assert!(event.result().is_some());
        assert!(event.is_settled("gather"));
        assert!(!event.is_settled("move"));
    }

    #[test]
    fn serializes_type_tag() {
        let value = serde_json::to_value(settled()).unwrap();
        assert_eq!(value["type"], "action_settled");
    }

    #[test]
    fn non_object_payload_becomes_empty() {
        let event = DomainEvent::new(EventType::GameOver, Utc::now(), json!(3));
        assert!(event.payload.is_empty());
    }
}
