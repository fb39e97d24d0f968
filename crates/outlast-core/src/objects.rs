//! Owned world objects: beds, boxes, and farm plots.
//!
//! Object actions are prepared before prechecks run (the referenced object is
//! loaded and its JSON state parsed and checked) and applied during persist.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use outlast_agents::inventory;
use outlast_types::{
    ActionIntent, ActionType, AgentStateAggregate, BedQuality, DomainEvent, EventType,
    ObjectKind, UnitOfWork, WorldObjectRecord,
};

use crate::config::PipelineConfig;
use crate::error::ActionError;

/// Contents of a box object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxState {
    /// Stored item counts.
    #[serde(default)]
    pub inventory: BTreeMap<String, i32>,
}

/// Growth stage of a farm plot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FarmStage {
    /// Empty and ready for planting.
    #[default]
    Idle,
    /// Planted, waiting for `ready_at_unix`.
    Growing,
    /// Ready for harvest.
    Ready,
}

/// State of a farm plot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FarmState {
    /// Growth stage.
    #[serde(default)]
    pub state: FarmStage,
    /// Unix seconds of planting.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub planted_at_unix: i64,
    /// Unix seconds at which the crop is ready.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub ready_at_unix: i64,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_zero(v: &i64) -> bool {
    *v == 0
}

impl FarmState {
    /// Whether the plot can be harvested at `now`.
    pub fn harvestable(&self, now: DateTime<Utc>) -> bool {
        match self.state {
            FarmStage::Ready => true,
            FarmStage::Growing => self.ready_at_unix > 0 && now.timestamp() >= self.ready_at_unix,
            FarmStage::Idle => false,
        }
    }
}

/// Parsed object state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectState {
    /// A bed with its quality.
    Bed(BedQuality),
    /// A box with its contents.
    Box(BoxState),
    /// A farm plot with its growth state.
    Farm(FarmState),
}

/// An object referenced by the intent, loaded and validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedObject {
    /// The stored record.
    pub record: WorldObjectRecord,
    /// Its parsed state.
    pub state: ObjectState,
}

fn is_kind(record: &WorldObjectRecord, kind: ObjectKind, object_type: &str) -> bool {
    record.kind == kind || record.object_type.trim().eq_ignore_ascii_case(object_type)
}

fn parse_box_state(raw: &str) -> Result<BoxState, serde_json::Error> {
    if raw.trim().is_empty() {
        return Ok(BoxState::default());
    }
    serde_json::from_str(raw)
}

fn parse_farm_state(raw: &str) -> Result<FarmState, serde_json::Error> {
    if raw.trim().is_empty() {
        return Ok(FarmState::default());
    }
    serde_json::from_str(raw)
}

/// Requested item counts keyed by item type, positive counts only.
fn requested_items(intent: &ActionIntent) -> BTreeMap<String, i32> {
    let mut out = BTreeMap::new();
    for item in intent.params.items.iter().filter(|i| i.count > 0) {
        let entry = out.entry(item.item_type.clone()).or_insert(0_i32);
        *entry = entry.saturating_add(item.count);
    }
    out
}

async fn load_owned(
    uow: &mut dyn UnitOfWork,
    agent_id: &str,
    object_id: Option<&str>,
) -> Result<WorldObjectRecord, ActionError> {
    let object_id = object_id.map(str::trim).unwrap_or_default();
    match uow.objects().get_by_object_id(object_id).await? {
        Some(record) if record.owner_agent_id == agent_id => Ok(record),
        _ => Err(ActionError::precondition("object_not_found")),
    }
}

/// Load and validate the object an intent refers to.
///
/// Returns `None` for intents that do not reference an object.
pub async fn prepare_object_action(
    uow: &mut dyn UnitOfWork,
    pipeline: &PipelineConfig,
    now: DateTime<Utc>,
    state: &AgentStateAggregate,
    intent: &ActionIntent,
) -> Result<Option<PreparedObject>, ActionError> {
    let agent_id = state.agent_id.as_str();
    let params = &intent.params;
    match intent.action_type {
        ActionType::Sleep => {
            let record = load_owned(uow, agent_id, params.bed_id.as_deref()).await?;
            if !is_kind(&record, ObjectKind::Bed, "bed") {
                return Err(ActionError::precondition("not_a_bed"));
            }
            if record.pos() != state.position {
                return Err(ActionError::precondition("not_at_bed"));
            }
            let quality = record.quality.unwrap_or_default();
            Ok(Some(PreparedObject {
                record,
                state: ObjectState::Bed(quality),
            }))
        }
        ActionType::ContainerDeposit | ActionType::ContainerWithdraw => {
            let record = load_owned(uow, agent_id, params.container_id.as_deref()).await?;
            if !is_kind(&record, ObjectKind::Box, "box") {
                return Err(ActionError::precondition("not_a_box"));
            }
            let contents = parse_box_state(&record.object_state).map_err(|err| {
                debug!(object_id = %record.object_id, %err, "unreadable box state");
                ActionError::precondition("box_state_invalid")
            })?;
            let requested = requested_items(intent);
            let total = requested
                .values()
                .fold(0_i32, |acc, qty| acc.saturating_add(*qty));
            let deposit = intent.action_type == ActionType::ContainerDeposit;
            let source = if deposit {
                &state.inventory
            } else {
                &contents.inventory
            };
            if requested
                .iter()
                .any(|(item, need)| inventory::count_of(source, item) < *need)
            {
                return Err(ActionError::precondition("items_missing"));
            }
            if deposit {
                if record.capacity_slots > 0
                    && record.used_slots.saturating_add(total) > record.capacity_slots
                {
                    return Err(ActionError::ContainerFull);
                }
            } else {
                let capacity = if state.inventory_capacity > 0 {
                    state.inventory_capacity
                } else {
                    pipeline.default_inventory_capacity
                };
                if inventory::total_items(&state.inventory).saturating_add(total) > capacity {
                    return Err(ActionError::InventoryFull);
                }
            }
            Ok(Some(PreparedObject {
                record,
                state: ObjectState::Box(contents),
            }))
        }
        ActionType::FarmPlant | ActionType::FarmHarvest => {
            let record = load_owned(uow, agent_id, params.farm_id.as_deref()).await?;
            if !is_kind(&record, ObjectKind::Farm, "farm_plot") {
                return Err(ActionError::precondition("not_a_farm"));
            }
            let farm = parse_farm_state(&record.object_state).map_err(|err| {
                debug!(object_id = %record.object_id, %err, "unreadable farm state");
                ActionError::precondition("farm_state_invalid")
            })?;
            let ok = if intent.action_type == ActionType::FarmPlant {
                farm.state == FarmStage::Idle
            } else {
                farm.harvestable(now)
            };
            if !ok {
                return Err(ActionError::precondition("farm_not_ready"));
            }
            Ok(Some(PreparedObject {
                record,
                state: ObjectState::Farm(farm),
            }))
        }
        _ => Ok(None),
    }
}

fn encode<T: Serialize>(value: &T) -> Result<String, ActionError> {
    serde_json::to_string(value)
        .map_err(|e| ActionError::Port(outlast_types::PortError::Backend(e.to_string())))
}

/// Apply the planned mutation of a prepared object.
pub async fn apply_object_action(
    uow: &mut dyn UnitOfWork,
    pipeline: &PipelineConfig,
    now: DateTime<Utc>,
    intent: &ActionIntent,
    prepared: &PreparedObject,
) -> Result<(), ActionError> {
    let mut record = prepared.record.clone();
    match (&prepared.state, intent.action_type) {
        (ObjectState::Box(contents), ActionType::ContainerDeposit) => {
            let mut contents = contents.clone();
            for (item, qty) in requested_items(intent) {
                inventory::add_item(&mut contents.inventory, &item, qty)?;
                record.used_slots = record.used_slots.saturating_add(qty);
            }
            record.object_state = encode(&contents)?;
        }
        (ObjectState::Box(contents), ActionType::ContainerWithdraw) => {
            let mut contents = contents.clone();
            for (item, qty) in requested_items(intent) {
                inventory::consume_item(&mut contents.inventory, &item, qty);
                record.used_slots = record.used_slots.saturating_sub(qty).max(0);
            }
            record.object_state = encode(&contents)?;
        }
        (ObjectState::Farm(_), ActionType::FarmPlant) => {
            let grow = Duration::try_minutes(pipeline.farm_grow_minutes)
                .unwrap_or_else(Duration::zero);
            let ready_at = now.checked_add_signed(grow).unwrap_or(now);
            record.object_state = encode(&FarmState {
                state: FarmStage::Growing,
                planted_at_unix: now.timestamp(),
                ready_at_unix: ready_at.timestamp(),
            })?;
        }
        (ObjectState::Farm(_), ActionType::FarmHarvest) => {
            record.object_state = encode(&FarmState::default())?;
        }
        _ => return Ok(()),
    }
    uow.objects().update(&record).await?;
    Ok(())
}

/// Defaults of a freshly built object of `object_type`:
/// `(object_type, quality, capacity_slots, object_state)`.
pub fn built_object_defaults(
    object_type: &str,
    pipeline: &PipelineConfig,
) -> (String, Option<BedQuality>, i32, String) {
    let normalized = object_type.trim().to_lowercase();
    match normalized.as_str() {
        "box" => (
            normalized,
            None,
            pipeline.box_capacity_slots,
            r#"{"inventory":{}}"#.to_owned(),
        ),
        "farm_plot" => (normalized, None, 0, r#"{"state":"IDLE"}"#.to_owned()),
        "bed_good" => ("bed".to_owned(), Some(BedQuality::Good), 0, String::new()),
        "bed" | "bed_rough" => ("bed".to_owned(), Some(BedQuality::Rough), 0, String::new()),
        _ => (normalized, None, 0, String::new()),
    }
}

fn payload_i32(evt: &DomainEvent, key: &str) -> i32 {
    evt.payload_i64(key)
        .and_then(|v| i32::try_from(v).ok())
        .unwrap_or(0)
}

/// Create one object per `build_completed` event and return their ids.
pub async fn create_built_objects(
    uow: &mut dyn UnitOfWork,
    pipeline: &PipelineConfig,
    agent_id: &str,
    idempotency_key: &str,
    intent: &ActionIntent,
    events: &[DomainEvent],
) -> Result<Vec<String>, ActionError> {
    let mut ids = Vec::new();
    for evt in events.iter().filter(|e| e.event_type == EventType::BuildCompleted) {
        let kind = evt
            .payload
            .get("kind")
            .and_then(Value::as_str)
            .and_then(|k| ObjectKind::from_str(k).ok())
            .unwrap_or(ObjectKind::Bed);
        let requested = intent.params.object_type.as_deref().unwrap_or_default();
        let (object_type, quality, capacity_slots, object_state) =
            built_object_defaults(requested, pipeline);
        let hp = payload_i32(evt, "hp");
        let object_id = format!("obj-{agent_id}-{idempotency_key}");
        let record = WorldObjectRecord {
            object_id: object_id.clone(),
            owner_agent_id: agent_id.to_owned(),
            kind,
            object_type,
            x: payload_i32(evt, "x"),
            y: payload_i32(evt, "y"),
            hp: if hp > 0 { hp } else { 100 },
            quality,
            capacity_slots,
            used_slots: 0,
            object_state,
        };
        uow.objects().save(&record).await?;
        ids.push(object_id);
    }
    Ok(ids)
}

/// Record `ids` on the `action_settled` result.
pub fn attach_built_object_ids(events: &mut [DomainEvent], ids: &[String]) {
    if ids.is_empty() {
        return;
    }
    for evt in events
        .iter_mut()
        .filter(|e| e.event_type == EventType::ActionSettled)
    {
        let result = evt
            .payload
            .entry("result")
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
        if let Value::Object(map) = result {
            map.insert("built_object_ids".to_owned(), serde_json::json!(ids));
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn farm_state_round_trips_upper_case() {
        let farm: FarmState = serde_json::from_str(r#"{"state":"GROWING","ready_at_unix":100}"#).unwrap();
        assert_eq!(farm.state, FarmStage::Growing);
        let now = DateTime::<Utc>::from_timestamp(100, 0).unwrap();
        assert!(farm.harvestable(now));
        assert!(!farm.harvestable(DateTime::<Utc>::from_timestamp(99, 0).unwrap()));
        assert_eq!(
            serde_json::to_string(&FarmState::default()).unwrap(),
            r#"{"state":"IDLE"}"#
        );
    }

    #[test]
    fn empty_box_state_is_empty_inventory() {
        assert_eq!(parse_box_state("").unwrap(), BoxState::default());
        assert!(parse_box_state("not json").is_err());
    }

    #[test]
    fn built_defaults_by_type() {
        let pipeline = PipelineConfig::default();
        let (ty, quality, cap, state) = built_object_defaults("box", &pipeline);
        assert_eq!((ty.as_str(), quality, cap), ("box", None, 60));
        assert_eq!(state, r#"{"inventory":{}}"#);
        let (ty, quality, _, _) = built_object_defaults("bed_good", &pipeline);
        assert_eq!((ty.as_str(), quality), ("bed", Some(BedQuality::Good)));
        let (_, quality, _, _) = built_object_defaults("bed", &pipeline);
        assert_eq!(quality, Some(BedQuality::Rough));
    }

    #[test]
    fn built_ids_attach_to_settled_result() {
        let mut events = vec![DomainEvent::new(
            EventType::ActionSettled,
            Utc::now(),
            json!({"result": {"hp_loss": 0}}),
        )];
        attach_built_object_ids(&mut events, &["obj-a1-k1".to_owned()]);
        let result = events.first().and_then(DomainEvent::result).unwrap();
        assert_eq!(result.get("built_object_ids"), Some(&json!(["obj-a1-k1"])));
        assert_eq!(result.get("hp_loss"), Some(&json!(0)));
    }
}
