//! Action engine binary for Outlast.
//!
//! Wires configuration, logging, storage, and the world provider into an
//! [`ActionEngine`] and serves newline-delimited JSON requests from stdin.
//! Responses go to stdout, one per line. Logs go to stderr.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `outlast-config.yaml` (or `OUTLAST_CONFIG`)
//! 2. Initialize structured logging (tracing)
//! 3. Select the store: `PostgreSQL` when a URL is configured, else memory
//! 4. Seed the bootstrap agents
//! 5. Serve requests until end of input
//! 6. Log the counters

mod bootstrap;
mod error;
mod serve;

use std::path::PathBuf;
use std::sync::Arc;

use tokio::io::BufReader;
use tracing::info;
use tracing_subscriber::EnvFilter;

use outlast_core::config::LoggingConfig;
use outlast_core::{ActionEngine, EngineConfig, InMemoryMetrics, StaticWorldProvider};
use outlast_db::{MemoryStore, PostgresConfig, PostgresPool};
use outlast_types::TxManager;

use crate::error::EngineError;

/// Default configuration file, relative to the working directory.
const DEFAULT_CONFIG_PATH: &str = "outlast-config.yaml";

/// Square radius of the open field served to every agent.
const FIELD_RADIUS: i32 = 5;

/// Application entry point.
///
/// # Errors
///
/// Returns an error if startup fails or stdin/stdout break.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let config = load_config()?;

    // 2. Initialize structured logging.
    init_logging(&config.logging)?;
    info!(
        log_level = %config.logging.level,
        postgres = !config.infrastructure.postgres_url.is_empty(),
        bootstrap_agents = config.bootstrap.agents.len(),
        "outlast-engine starting"
    );

    // 3. Select the store.
    let (tx, pool) = open_store(&config).await?;

    // 4. Seed bootstrap agents.
    bootstrap::seed_agents(tx.as_ref(), &config.bootstrap.agents)
        .await
        .map_err(EngineError::from)?;

    // 5. Serve.
    let metrics = Arc::new(InMemoryMetrics::new());
    let engine = ActionEngine::new(
        tx,
        Arc::new(StaticWorldProvider::open_field(FIELD_RADIUS)),
        config,
    )
    .with_metrics(Arc::clone(&metrics) as Arc<dyn outlast_types::ActionMetrics>);

    let stdin = BufReader::new(tokio::io::stdin());
    let stats = serve::serve(&engine, stdin, tokio::io::stdout()).await?;

    // 6. Report.
    let counters = metrics.snapshot();
    info!(
        answered = stats.answered,
        rejected = stats.rejected,
        ok = counters.ok,
        game_over = counters.game_over,
        conflicts = counters.conflicts,
        failures = counters.failures,
        "outlast-engine stopped"
    );
    if let Some(pool) = pool {
        pool.close().await;
    }
    Ok(())
}

/// Load configuration from `OUTLAST_CONFIG` or the default path.
///
/// A missing file yields the built-in defaults.
fn load_config() -> Result<EngineConfig, EngineError> {
    let path = std::env::var_os("OUTLAST_CONFIG")
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    if path.exists() {
        Ok(EngineConfig::from_file(&path)?)
    } else {
        let mut config = EngineConfig::default();
        config.infrastructure.apply_env_overrides();
        Ok(config)
    }
}

/// Install the global tracing subscriber on stderr.
///
/// `RUST_LOG` takes precedence over the configured level.
fn init_logging(logging: &LoggingConfig) -> Result<(), EngineError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&logging.level).map_err(|e| EngineError::Logging {
            message: format!("invalid log level {:?}: {e}", logging.level),
        })?,
    };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);
    if logging.format.eq_ignore_ascii_case("json") {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

/// The configured store, plus the pool to close on shutdown when it is `PostgreSQL`.
async fn open_store(
    config: &EngineConfig,
) -> Result<(Arc<dyn TxManager>, Option<PostgresPool>), EngineError> {
    let url = config.infrastructure.postgres_url.trim();
    if url.is_empty() {
        info!("Using in-memory store");
        return Ok((Arc::new(MemoryStore::new()), None));
    }
    let pg_config =
        PostgresConfig::new(url).with_max_connections(config.infrastructure.max_connections);
    let pool = PostgresPool::connect(&pg_config).await?;
    pool.run_migrations().await?;
    Ok((Arc::new(pool.tx_manager()), Some(pool)))
}
