//! Gathering from a visible resource node.

use async_trait::async_trait;
use outlast_types::{ActionIntent, Position, TimeOfDay, UnitOfWork, WorldSnapshot};

use crate::config::PipelineConfig;
use crate::context::{ActionContext, ExecuteMode, Services};
use crate::depletion::{self, ResourceTarget};
use crate::error::ActionError;
use crate::registry::ActionHandler;

use super::common::{SettleOptions, settle_and_plan, standard_precheck};

/// Handler for `gather`.
#[derive(Debug, Clone, Copy, Default)]
pub struct GatherHandler;

/// Check that the gather target can be seen from `center`.
///
/// The view is a square of the snapshot's radius. At night only targets
/// within the night vision distance (Manhattan) are visible.
pub fn validate_target_visibility(
    center: Position,
    intent: &ActionIntent,
    snapshot: &WorldSnapshot,
    pipeline: &PipelineConfig,
) -> Result<(), ActionError> {
    let Some(target_id) = intent.params.target_id.as_deref().filter(|t| !t.trim().is_empty())
    else {
        return Ok(());
    };
    let target = ResourceTarget::parse(target_id)
        .ok_or(ActionError::precondition("malformed_target_id"))?;
    let radius = if snapshot.view_radius > 0 {
        snapshot.view_radius
    } else {
        pipeline.default_view_radius
    };
    let dx = target.pos.x.saturating_sub(center.x).saturating_abs();
    let dy = target.pos.y.saturating_sub(center.y).saturating_abs();
    if dx > radius || dy > radius {
        return Err(ActionError::TargetOutOfView);
    }
    if snapshot.time_of_day == TimeOfDay::Night
        && dx.saturating_add(dy) > pipeline.night_vision_radius
    {
        return Err(ActionError::TargetNotVisible);
    }
    let Some(tile) = snapshot.tile_at(target.pos) else {
        return Err(ActionError::TargetNotVisible);
    };
    let matches = tile
        .resource
        .as_deref()
        .is_some_and(|r| r.trim().eq_ignore_ascii_case(&target.resource));
    if !matches {
        return Err(ActionError::precondition("target_resource_mismatch"));
    }
    Ok(())
}

/// Reject a target this agent depleted and that has not respawned.
///
/// The stored depletion record wins. Without one, gathers in the recent
/// event window still count.
async fn ensure_not_depleted(
    svc: &Services<'_>,
    uow: &mut dyn UnitOfWork,
    ac: &ActionContext,
) -> Result<(), ActionError> {
    let Some(target_id) = ac.scratch.intent.params.target_id.as_deref() else {
        return Ok(());
    };
    let target_id = ResourceTarget::canonical_id(target_id);
    let now = ac.input.now;
    let remaining = match uow
        .resources()
        .get_by_target_id(&ac.input.agent_id, &target_id)
        .await?
    {
        Some(record) => depletion::remaining_seconds(record.depleted_until, now),
        None => depletion::depleted_targets(&ac.view.events_before, now, &svc.config.policy)
            .get(&target_id)
            .copied(),
    };
    match remaining {
        Some(remaining_seconds) => Err(ActionError::ResourceDepleted {
            target_id,
            remaining_seconds,
        }),
        None => Ok(()),
    }
}

#[async_trait]
impl ActionHandler for GatherHandler {
    async fn precheck(
        &self,
        svc: &Services<'_>,
        uow: &mut dyn UnitOfWork,
        ac: &mut ActionContext,
    ) -> Result<(), ActionError> {
        standard_precheck(svc, uow, ac).await?;
        validate_target_visibility(
            ac.view.state_working.position,
            &ac.scratch.intent,
            &ac.view.snapshot,
            &svc.config.pipeline,
        )?;
        ensure_not_depleted(svc, uow, ac).await
    }

    async fn execute_and_plan(
        &self,
        svc: &Services<'_>,
        uow: &mut dyn UnitOfWork,
        ac: &mut ActionContext,
    ) -> Result<ExecuteMode, ActionError> {
        let opts = SettleOptions {
            narrow_gather: true,
            seed_pity: true,
            gather_depletion: true,
            object_action: true,
            create_built: true,
        };
        settle_and_plan(svc, uow, ac, opts).await
    }
}

#[cfg(test)]
mod tests {
    use outlast_types::{ActionType, Tile};

    use super::*;

    fn gather(target: &str) -> ActionIntent {
        let mut intent = ActionIntent::bare(ActionType::Gather);
        intent.params.target_id = Some(target.to_owned());
        intent
    }

    fn snapshot(time_of_day: TimeOfDay) -> WorldSnapshot {
        let mut tree = Tile::grass(2, 0);
        tree.resource = Some("wood".to_owned());
        let mut far_tree = Tile::grass(3, 2);
        far_tree.resource = Some("wood".to_owned());
        WorldSnapshot {
            time_of_day,
            view_radius: 5,
            visible_tiles: vec![Tile::grass(0, 0), tree, far_tree],
            ..WorldSnapshot::default()
        }
    }

    fn check(target: &str, time_of_day: TimeOfDay) -> Result<(), ActionError> {
        validate_target_visibility(
            Position::new(0, 0),
            &gather(target),
            &snapshot(time_of_day),
            &PipelineConfig::default(),
        )
    }

    #[test]
    fn visible_matching_target_passes() {
        assert_eq!(check("res_2_0_wood", TimeOfDay::Day), Ok(()));
    }

    #[test]
    fn outside_square_radius_is_out_of_view() {
        assert_eq!(check("res_6_0_wood", TimeOfDay::Day), Err(ActionError::TargetOutOfView));
    }

    #[test]
    fn night_limits_manhattan_distance() {
        assert_eq!(check("res_3_2_wood", TimeOfDay::Day), Ok(()));
        assert_eq!(check("res_3_2_wood", TimeOfDay::Night), Err(ActionError::TargetNotVisible));
        assert_eq!(check("res_2_0_wood", TimeOfDay::Night), Ok(()));
    }

    #[test]
    fn resource_mismatch_and_missing_tile() {
        assert_eq!(
            check("res_2_0_stone", TimeOfDay::Day),
            Err(ActionError::precondition("target_resource_mismatch"))
        );
        assert_eq!(check("res_1_1_wood", TimeOfDay::Day), Err(ActionError::TargetNotVisible));
    }

    #[test]
    fn malformed_target_fails_precondition() {
        assert_eq!(
            check("tree_2_0", TimeOfDay::Day),
            Err(ActionError::precondition("malformed_target_id"))
        );
    }
}
