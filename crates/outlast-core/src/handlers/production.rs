//! Actions that consume inventory: build, plant, craft, eat.

use async_trait::async_trait;

use outlast_agents::{inventory, production};
use outlast_types::{ActionIntent, AgentStateAggregate, UnitOfWork};

use crate::context::{ActionContext, ExecuteMode, Services};
use crate::error::ActionError;
use crate::registry::ActionHandler;

use super::common::{SettleOptions, settle_and_plan, standard_precheck};

/// Handler for `build`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildHandler;

/// Handler for `farm_plant`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FarmPlantHandler;

/// Handler for `craft`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CraftHandler;

/// Handler for `eat`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EatHandler;

/// The agent can pay for the requested structure.
pub fn can_build(state: &AgentStateAggregate, intent: &ActionIntent) -> bool {
    intent
        .params
        .object_type
        .as_deref()
        .and_then(production::build_def)
        .is_some_and(|def| inventory::has_all(&state.inventory, def.cost))
}

/// The agent holds every recipe input.
pub fn can_craft(state: &AgentStateAggregate, intent: &ActionIntent) -> bool {
    intent
        .params
        .recipe_id
        .and_then(production::recipe)
        .is_some_and(|recipe| inventory::has_all(&state.inventory, recipe.inputs))
}

/// The item is a known food and the agent holds enough of it.
pub fn can_eat(state: &AgentStateAggregate, intent: &ActionIntent) -> bool {
    let Some(item) = intent.params.item_type.as_deref().map(str::trim) else {
        return false;
    };
    production::food_recovery(item).is_some()
        && inventory::count_of(&state.inventory, item) >= intent.params.count.max(1)
}

#[async_trait]
impl ActionHandler for BuildHandler {
    async fn precheck(
        &self,
        svc: &Services<'_>,
        uow: &mut dyn UnitOfWork,
        ac: &mut ActionContext,
    ) -> Result<(), ActionError> {
        standard_precheck(svc, uow, ac).await?;
        if !can_build(&ac.view.state_working, &ac.scratch.intent) {
            return Err(ActionError::precondition("insufficient_build_materials"));
        }
        Ok(())
    }

    async fn execute_and_plan(
        &self,
        svc: &Services<'_>,
        uow: &mut dyn UnitOfWork,
        ac: &mut ActionContext,
    ) -> Result<ExecuteMode, ActionError> {
        settle_and_plan(svc, uow, ac, SettleOptions::OBJECTS).await
    }
}

#[async_trait]
impl ActionHandler for FarmPlantHandler {
    async fn precheck(
        &self,
        svc: &Services<'_>,
        uow: &mut dyn UnitOfWork,
        ac: &mut ActionContext,
    ) -> Result<(), ActionError> {
        standard_precheck(svc, uow, ac).await?;
        if ac.view.state_working.item_count("seed") < 1 {
            return Err(ActionError::precondition("no_seed"));
        }
        Ok(())
    }

    async fn execute_and_plan(
        &self,
        svc: &Services<'_>,
        uow: &mut dyn UnitOfWork,
        ac: &mut ActionContext,
    ) -> Result<ExecuteMode, ActionError> {
        settle_and_plan(svc, uow, ac, SettleOptions::OBJECTS).await
    }
}

#[async_trait]
impl ActionHandler for CraftHandler {
    async fn precheck(
        &self,
        svc: &Services<'_>,
        uow: &mut dyn UnitOfWork,
        ac: &mut ActionContext,
    ) -> Result<(), ActionError> {
        standard_precheck(svc, uow, ac).await?;
        if !can_craft(&ac.view.state_working, &ac.scratch.intent) {
            return Err(ActionError::precondition("insufficient_recipe_inputs"));
        }
        Ok(())
    }

    async fn execute_and_plan(
        &self,
        svc: &Services<'_>,
        uow: &mut dyn UnitOfWork,
        ac: &mut ActionContext,
    ) -> Result<ExecuteMode, ActionError> {
        settle_and_plan(svc, uow, ac, SettleOptions::OBJECTS).await
    }
}

#[async_trait]
impl ActionHandler for EatHandler {
    async fn precheck(
        &self,
        svc: &Services<'_>,
        uow: &mut dyn UnitOfWork,
        ac: &mut ActionContext,
    ) -> Result<(), ActionError> {
        standard_precheck(svc, uow, ac).await?;
        if !can_eat(&ac.view.state_working, &ac.scratch.intent) {
            return Err(ActionError::precondition("not_enough_food"));
        }
        Ok(())
    }

    async fn execute_and_plan(
        &self,
        svc: &Services<'_>,
        uow: &mut dyn UnitOfWork,
        ac: &mut ActionContext,
    ) -> Result<ExecuteMode, ActionError> {
        settle_and_plan(svc, uow, ac, SettleOptions::OBJECTS).await
    }
}

#[cfg(test)]
mod tests {
    use outlast_types::ActionType;

    use super::*;

    fn state_with(items: &[(&str, i32)]) -> AgentStateAggregate {
        let mut state = AgentStateAggregate::fresh("a1");
        for (item, qty) in items {
            state.inventory.insert((*item).to_owned(), *qty);
        }
        state
    }

    #[test]
    fn build_needs_full_cost() {
        let mut intent = ActionIntent::bare(ActionType::Build);
        intent.params.object_type = Some("box".to_owned());
        assert!(can_build(&state_with(&[("wood", 4)]), &intent));
        assert!(!can_build(&state_with(&[("wood", 3)]), &intent));
        intent.params.object_type = Some("castle".to_owned());
        assert!(!can_build(&state_with(&[("wood", 40)]), &intent));
    }

    #[test]
    fn craft_needs_inputs() {
        let mut intent = ActionIntent::bare(ActionType::Craft);
        intent.params.recipe_id = Some(1);
        assert!(can_craft(&state_with(&[("wood", 2)]), &intent));
        assert!(!can_craft(&state_with(&[("wood", 1)]), &intent));
        intent.params.recipe_id = Some(99);
        assert!(!can_craft(&state_with(&[("wood", 9)]), &intent));
    }

    #[test]
    fn eat_needs_known_food_in_stock() {
        let mut intent = ActionIntent::bare(ActionType::Eat);
        intent.params.item_type = Some("berry".to_owned());
        intent.params.count = 2;
        assert!(can_eat(&state_with(&[("berry", 2)]), &intent));
        assert!(!can_eat(&state_with(&[("berry", 1)]), &intent));
        intent.params.item_type = Some("stone".to_owned());
        assert!(!can_eat(&state_with(&[("stone", 5)]), &intent));
    }
}
