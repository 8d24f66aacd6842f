//! # karbin-db
//!
//! PostgreSQL access layer for the karbin job recommender.
//!
//! This crate provides:
//! - Connection pool management
//! - The candidate-filter SQL builder
//! - [`JobStore`](karbin_core::JobStore) and [`UserStore`](karbin_core::UserStore)
//!   implementations over the job inventory and user profile tables
//!
//! ## Example
//!
//! ```rust,ignore
//! use karbin_db::{Database, UserStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/karbin").await?;
//!     let prefs = db.users.preferences(1).await?;
//!     println!("{prefs:?}");
//!     Ok(())
//! }
//! ```
pub mod candidate_filter;
pub mod jobs;
pub mod pool;
pub mod users;

// Test fixtures for integration tests
// Note: Always compiled so integration tests (in tests/) can use DEFAULT_TEST_DATABASE_URL
pub mod test_fixtures;

use std::sync::Arc;

// Re-export core types
pub use karbin_core::*;

pub use candidate_filter::{CandidateFilterQueryBuilder, QueryParam};
pub use jobs::PgJobStore;
pub use pool::{connect_pool, log_pool_health, PoolConfig};
pub use users::PgUserStore;

/// Database handle bundling the pool and the stores built on it.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Job inventory reads.
    pub jobs: Arc<PgJobStore>,
    /// User profile reads.
    pub users: Arc<PgUserStore>,
}

impl Database {
    /// Create a database handle from an existing pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            jobs: Arc::new(PgJobStore::new(pool.clone())),
            users: Arc::new(PgUserStore::new(pool.clone())),
            pool,
        }
    }

    /// Connect with default pool configuration.
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with_config(url, &PoolConfig::default()).await
    }

    /// Connect with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: &PoolConfig) -> Result<Self> {
        let pool = connect_pool(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Log open and idle connection counts.
    pub fn log_pool_health(&self) {
        log_pool_health(&self.pool);
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}
