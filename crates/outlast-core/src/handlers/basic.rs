//! Actions that only need the standard precheck.

use async_trait::async_trait;

use outlast_types::UnitOfWork;

use crate::context::{ActionContext, ExecuteMode, Services};
use crate::error::ActionError;
use crate::registry::ActionHandler;

use super::common::{SettleOptions, settle_and_plan, standard_precheck};

/// Handler for `move`. The destination is resolved while building context.
#[derive(Debug, Clone, Copy, Default)]
pub struct MoveHandler;

/// Handler for `retreat`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetreatHandler;

/// Handler for `sleep`. Settles instantly in the prepared bed.
#[derive(Debug, Clone, Copy, Default)]
pub struct SleepHandler;

/// Handler for `farm_harvest`. Readiness is checked when the plot is prepared.
#[derive(Debug, Clone, Copy, Default)]
pub struct FarmHarvestHandler;

/// Handler for `container_deposit`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContainerDepositHandler;

/// Handler for `container_withdraw`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContainerWithdrawHandler;

async fn settle_with_objects(
    svc: &Services<'_>,
    uow: &mut dyn UnitOfWork,
    ac: &mut ActionContext,
) -> Result<ExecuteMode, ActionError> {
    settle_and_plan(svc, uow, ac, SettleOptions::OBJECTS).await
}

#[async_trait]
impl ActionHandler for MoveHandler {
    async fn precheck(
        &self,
        svc: &Services<'_>,
        uow: &mut dyn UnitOfWork,
        ac: &mut ActionContext,
    ) -> Result<(), ActionError> {
        standard_precheck(svc, uow, ac).await
    }

    async fn execute_and_plan(
        &self,
        svc: &Services<'_>,
        uow: &mut dyn UnitOfWork,
        ac: &mut ActionContext,
    ) -> Result<ExecuteMode, ActionError> {
        settle_with_objects(svc, uow, ac).await
    }
}

#[async_trait]
impl ActionHandler for RetreatHandler {
    async fn precheck(
        &self,
        svc: &Services<'_>,
        uow: &mut dyn UnitOfWork,
        ac: &mut ActionContext,
    ) -> Result<(), ActionError> {
        standard_precheck(svc, uow, ac).await
    }

    async fn execute_and_plan(
        &self,
        svc: &Services<'_>,
        uow: &mut dyn UnitOfWork,
        ac: &mut ActionContext,
    ) -> Result<ExecuteMode, ActionError> {
        settle_with_objects(svc, uow, ac).await
    }
}

#[async_trait]
impl ActionHandler for SleepHandler {
    async fn precheck(
        &self,
        svc: &Services<'_>,
        uow: &mut dyn UnitOfWork,
        ac: &mut ActionContext,
    ) -> Result<(), ActionError> {
        standard_precheck(svc, uow, ac).await
    }

    async fn execute_and_plan(
        &self,
        svc: &Services<'_>,
        uow: &mut dyn UnitOfWork,
        ac: &mut ActionContext,
    ) -> Result<ExecuteMode, ActionError> {
        settle_with_objects(svc, uow, ac).await
    }
}

#[async_trait]
impl ActionHandler for FarmHarvestHandler {
    async fn precheck(
        &self,
        svc: &Services<'_>,
        uow: &mut dyn UnitOfWork,
        ac: &mut ActionContext,
    ) -> Result<(), ActionError> {
        standard_precheck(svc, uow, ac).await
    }

    async fn execute_and_plan(
        &self,
        svc: &Services<'_>,
        uow: &mut dyn UnitOfWork,
        ac: &mut ActionContext,
    ) -> Result<ExecuteMode, ActionError> {
        settle_with_objects(svc, uow, ac).await
    }
}

#[async_trait]
impl ActionHandler for ContainerDepositHandler {
    async fn precheck(
        &self,
        svc: &Services<'_>,
        uow: &mut dyn UnitOfWork,
        ac: &mut ActionContext,
    ) -> Result<(), ActionError> {
        standard_precheck(svc, uow, ac).await
    }

    async fn execute_and_plan(
        &self,
        svc: &Services<'_>,
        uow: &mut dyn UnitOfWork,
        ac: &mut ActionContext,
    ) -> Result<ExecuteMode, ActionError> {
        settle_with_objects(svc, uow, ac).await
    }
}

#[async_trait]
impl ActionHandler for ContainerWithdrawHandler {
    async fn precheck(
        &self,
        svc: &Services<'_>,
        uow: &mut dyn UnitOfWork,
        ac: &mut ActionContext,
    ) -> Result<(), ActionError> {
        standard_precheck(svc, uow, ac).await
    }

    async fn execute_and_plan(
        &self,
        svc: &Services<'_>,
        uow: &mut dyn UnitOfWork,
        ac: &mut ActionContext,
    ) -> Result<ExecuteMode, ActionError> {
        settle_with_objects(svc, uow, ac).await
    }
}
