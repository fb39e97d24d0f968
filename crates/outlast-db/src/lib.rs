//! Storage adapters for the Outlast action engine.
//!
//! Both adapters implement the ports from `outlast-types`: a
//! [`TxManager`](outlast_types::TxManager) that opens a
//! [`UnitOfWork`](outlast_types::UnitOfWork) serving every repository inside
//! one transaction.
//!
//! # Modules
//!
//! - [`memory`] -- Transactional in-memory store for the binary and tests
//! - [`postgres`] -- `PostgreSQL` connection pool and migrations
//! - [`pg_store`] -- `PostgreSQL` unit of work
//! - [`error`] -- Shared error types

pub mod error;
pub mod memory;
pub mod pg_store;
pub mod postgres;

pub use error::DbError;
pub use memory::{MemoryStore, MemoryUnitOfWork};
pub use pg_store::{PgTxManager, PgUnitOfWork};
pub use postgres::{PostgresConfig, PostgresPool};
