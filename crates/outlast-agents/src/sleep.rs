//! Instant sleep settlement.
//!
//! Sleeping in an owned bed settles with zero elapsed minutes: energy and HP
//! recovery are granted at once (rounded up after the bed-quality ratio) and
//! no drain applies.

use chrono::{DateTime, Utc};
use serde_json::json;

use outlast_types::{ActionIntent, AgentStateAggregate, BedQuality, ResultCode, WorldSnapshot};

use crate::config::{Ratio, SettlementConfig};
use crate::error::SettlementError;
use crate::scaling::ceil_ratio;
use crate::settlement::{SettledPayload, SettlementResult, VitalReasons, add_hp_delta};
use crate::status::enrich_state;

/// Settle a sleep in a bed of `quality` without advancing time.
pub fn settle_instant_sleep(
    config: &SettlementConfig,
    state: &AgentStateAggregate,
    intent: &ActionIntent,
    quality: BedQuality,
    now: DateTime<Utc>,
    snapshot: &WorldSnapshot,
) -> Result<SettlementResult, SettlementError> {
    let ratio = match quality {
        BedQuality::Good => config.good_bed_ratio,
        BedQuality::Rough => Ratio::ONE,
    };
    let energy = ceil_ratio(config.sleep_energy_recovery, ratio.num, ratio.den)?;
    let hp = ceil_ratio(config.sleep_hp_recovery, ratio.num, ratio.den)?;

    let mut next = state.clone();
    let mut reasons = VitalReasons::default();
    next.vitals.energy = next
        .vitals
        .energy
        .checked_add(energy)
        .ok_or_else(|| SettlementError::overflow("sleep energy"))?;
    reasons.energy.push("ACTION_SLEEP_RECOVERY", energy);
    add_hp_delta(
        &mut next.vitals.hp,
        hp,
        config.max_hp,
        "ACTION_SLEEP_RECOVERY",
        &mut reasons.hp,
    )?;
    next.version = next
        .version
        .checked_add(1)
        .ok_or_else(|| SettlementError::overflow("version"))?;
    next.updated_at = Some(now);
    enrich_state(&mut next, config, snapshot);

    let params = json!({
        "bed_id": intent.params.bed_id.as_deref().unwrap_or_default(),
        "bed_quality": quality.as_str(),
    });
    let event = SettledPayload {
        before: state,
        after: &next,
        intent: intent.action_type,
        params,
        dt_minutes: 0,
        world_time_before: snapshot.world_time_seconds,
        hp_loss: 0,
        reasons: &reasons,
    }
    .into_event(now);

    Ok(SettlementResult {
        updated_state: next,
        events: vec![event],
        result_code: ResultCode::Ok,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use outlast_types::ActionType;

    use super::*;

    fn sleep(state: &AgentStateAggregate, quality: BedQuality) -> SettlementResult {
        let mut intent = ActionIntent::bare(ActionType::Sleep);
        intent.params.bed_id = Some("bed-1".into());
        settle_instant_sleep(
            &SettlementConfig::default(),
            state,
            &intent,
            quality,
            Utc::now(),
            &WorldSnapshot::default(),
        )
        .unwrap()
    }

    #[test]
    fn good_bed_rounds_recovery_up() {
        let mut state = AgentStateAggregate::fresh("a1");
        state.vitals.hp = 50;
        state.vitals.energy = 10;
        let result = sleep(&state, BedQuality::Good);
        assert_eq!(result.updated_state.vitals.energy, 63);
        assert_eq!(result.updated_state.vitals.hp, 59);
        assert_eq!(result.updated_state.version, state.version + 1);
    }

    #[test]
    fn rough_bed_caps_hp() {
        let mut state = AgentStateAggregate::fresh("a1");
        state.vitals.hp = 98;
        let result = sleep(&state, BedQuality::Rough);
        assert_eq!(result.updated_state.vitals.hp, 100);
        let event = &result.events[0];
        assert_eq!(event.payload["settled_dt_minutes"], 0);
        assert_eq!(
            event.payload["world_time_before_seconds"],
            event.payload["world_time_after_seconds"]
        );
        assert_eq!(
            event.payload["result"]["vitals_change_reasons"]["hp"][0]["delta"],
            2
        );
        assert_eq!(event.payload["decision"]["params"]["bed_quality"], "ROUGH");
    }

    #[test]
    fn sleep_clears_exhaustion() {
        let mut state = AgentStateAggregate::fresh("a1");
        state.vitals.energy = 0;
        state.status_effects = vec![outlast_types::StatusEffect::Exhausted];
        let result = sleep(&state, BedQuality::Rough);
        assert_eq!(result.updated_state.vitals.energy, 35);
        assert!(result.updated_state.status_effects.is_empty());
    }
}
