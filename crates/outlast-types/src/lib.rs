//! Shared type definitions for the Outlast action engine.
//!
//! This crate is the single source of truth for the types exchanged between
//! the settlement domain, the action engine, and the storage adapters. Types
//! flow downstream to `TypeScript` via `ts-rs` for the dashboard.
//!
//! # Modules
//!
//! - [`enums`] -- Enumeration types (actions, events, world, objects)
//! - [`structs`] -- Agent state, world snapshot, and storage records
//! - [`actions`] -- Request, intent, and response types
//! - [`events`] -- Domain events and payload accessors
//! - [`ports`] -- Repository, transaction, world, and metrics traits

pub mod actions;
pub mod enums;
pub mod events;
pub mod ports;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use actions::{
    ActionIntent, ActionRequest, ActionResponse, IntentParams, ItemAmount, RequestedIntent,
};
pub use enums::{
    ActionType, BedQuality, Biome, DeathCause, EventType, ObjectKind, ParseEnumError, ResultCode,
    SessionStatus, StatusEffect, TileKind, TimeOfDay, Zone,
};
pub use events::{DomainEvent, Payload};
pub use ports::{
    ActionExecutionRepository, ActionMetrics, AgentResourceNodeRepository, AgentSessionRepository,
    AgentStateRepository, EventRepository, NoopMetrics, PortError, TxManager, UnitOfWork,
    WorldObjectRepository, WorldProvider,
};
pub use structs::{
    ActionExecutionRecord, ActionResult, AgentResourceNodeRecord, AgentSession,
    AgentStateAggregate, OngoingAction, Position, Tile, Vitals, WorldObjectRecord, WorldSnapshot,
    session_id_for,
};

#[cfg(test)]
mod tests {
    //! `TypeScript` binding generation for every exported type.

    #[test]
    fn export_bindings() {
        // ts-rs writes the bindings to `bindings/` relative to the crate root.
        use ts_rs::TS;

        // Enums
        let _ = crate::enums::ActionType::export_all();
        let _ = crate::enums::ResultCode::export_all();
        let _ = crate::enums::DeathCause::export_all();
        let _ = crate::enums::EventType::export_all();
        let _ = crate::enums::TimeOfDay::export_all();
        let _ = crate::enums::TileKind::export_all();
        let _ = crate::enums::Zone::export_all();
        let _ = crate::enums::Biome::export_all();
        let _ = crate::enums::ObjectKind::export_all();
        let _ = crate::enums::BedQuality::export_all();
        let _ = crate::enums::SessionStatus::export_all();
        let _ = crate::enums::StatusEffect::export_all();

        // Structs
        let _ = crate::structs::Vitals::export_all();
        let _ = crate::structs::Position::export_all();
        let _ = crate::structs::OngoingAction::export_all();
        let _ = crate::structs::AgentStateAggregate::export_all();
        let _ = crate::structs::Tile::export_all();
        let _ = crate::structs::WorldSnapshot::export_all();
        let _ = crate::structs::ActionResult::export_all();
        let _ = crate::structs::ActionExecutionRecord::export_all();
        let _ = crate::structs::WorldObjectRecord::export_all();
        let _ = crate::structs::AgentResourceNodeRecord::export_all();
        let _ = crate::structs::AgentSession::export_all();

        // Events
        let _ = crate::events::DomainEvent::export_all();

        // Actions
        let _ = crate::actions::ItemAmount::export_all();
        let _ = crate::actions::IntentParams::export_all();
        let _ = crate::actions::RequestedIntent::export_all();
        let _ = crate::actions::ActionIntent::export_all();
        let _ = crate::actions::ActionRequest::export_all();
        let _ = crate::actions::ActionResponse::export_all();
    }
}
