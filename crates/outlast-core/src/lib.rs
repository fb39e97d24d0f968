//! The Outlast action resolution engine.
//!
//! This crate turns one agent action request into a settled, persisted
//! outcome. [`ActionEngine::execute`] validates the request, replays known
//! idempotency keys, finalizes due ongoing actions, dispatches to the
//! per-action handler, and applies the resulting write plan inside a single
//! unit of work.
//!
//! # Modules
//!
//! - [`pipeline`] -- The [`ActionEngine`] orchestrator.
//! - [`registry`] -- Action specs, the [`ActionHandler`] trait, and request
//!   validation.
//! - [`handlers`] -- One stateless handler per action type.
//! - [`context`] -- Per-request scratch state and the write plan.
//! - [`finalizer`] -- Settling ongoing rest.
//! - [`cooldown`] and [`depletion`] -- Time gates derived from the event log.
//! - [`movement`] and [`retreat`] -- Move and retreat resolution.
//! - [`objects`] -- Beds, boxes, and farm plots.
//! - [`config`] -- Configuration loading from `outlast-config.yaml`.
//! - [`clock`], [`metrics`], [`world`] -- Time, counters, and a fixed world.
//!
//! [`ActionHandler`]: registry::ActionHandler

pub mod clock;
pub mod config;
pub mod context;
pub mod cooldown;
pub mod depletion;
pub mod error;
pub mod finalizer;
pub mod handlers;
pub mod metrics;
pub mod movement;
pub mod objects;
pub mod pipeline;
pub mod registry;
pub mod response;
pub mod retreat;
pub mod world;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, EngineConfig};
pub use error::ActionError;
pub use metrics::{InMemoryMetrics, MetricsSnapshot};
pub use pipeline::ActionEngine;
pub use registry::ActionRegistry;
pub use world::StaticWorldProvider;
