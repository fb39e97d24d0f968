//! Stateless handlers, one per action type.
//!
//! Each handler implements [`ActionHandler`](crate::registry::ActionHandler):
//! a read-only precheck followed by execution that fills the write plan.
//! Most actions share the standard precheck (dead agent, session, cooldown)
//! and the common settle-and-plan step, and differ only in extra
//! preconditions.

mod basic;
mod common;
mod gather;
mod ongoing;
mod production;

pub use basic::{
    ContainerDepositHandler, ContainerWithdrawHandler, FarmHarvestHandler, MoveHandler,
    RetreatHandler, SleepHandler,
};
pub use gather::{GatherHandler, validate_target_visibility};
pub use ongoing::{RestHandler, TerminateHandler};
pub use production::{
    BuildHandler, CraftHandler, EatHandler, FarmPlantHandler, can_build, can_craft, can_eat,
};
