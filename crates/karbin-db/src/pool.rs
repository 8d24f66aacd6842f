//! PostgreSQL pool setup and health logging.

use std::time::{Duration, Instant};

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{debug, info, warn};

use karbin_core::{defaults, Error, Result};

/// Seconds to wait for a free connection before a query fails.
pub const ACQUIRE_TIMEOUT_SECS: u64 = 30;

/// Seconds an unused connection stays open.
pub const IDLE_TIMEOUT_SECS: u64 = 600;

/// Pool sizing for the job and user stores.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: defaults::DB_MAX_CONNECTIONS,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(ACQUIRE_TIMEOUT_SECS),
            idle_timeout: Duration::from_secs(IDLE_TIMEOUT_SECS),
        }
    }
}

impl PoolConfig {
    /// A pool pinned to exactly one connection, so session state such as
    /// `search_path` applies to every query.
    pub fn single_connection() -> Self {
        Self {
            max_connections: 1,
            min_connections: 1,
            ..Self::default()
        }
    }
}

/// Open a pool against `database_url`.
pub async fn connect_pool(database_url: &str, config: &PoolConfig) -> Result<PgPool> {
    let start = Instant::now();

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .connect(database_url)
        .await
        .map_err(Error::Database)?;

    info!(
        subsystem = "db",
        component = "pool",
        op = "connect",
        max_connections = config.max_connections,
        pool_size = pool.size(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Database pool ready"
    );
    Ok(pool)
}

/// Log how many connections are open and idle. Warns when every open
/// connection is busy.
pub fn log_pool_health(pool: &PgPool) {
    let size = pool.size();
    let idle = pool.num_idle();

    if idle == 0 && size > 0 {
        warn!(
            subsystem = "db",
            component = "pool",
            op = "health",
            pool_size = size,
            "All pooled connections are busy"
        );
    } else {
        debug!(
            subsystem = "db",
            component = "pool",
            op = "health",
            pool_size = size,
            pool_idle = idle,
            "Pool health"
        );
    }
}
