//! # tavle-db
//!
//! PostgreSQL database layer for tavle.
//!
//! This crate provides:
//! - Connection pool management
//! - Repository implementations for events, edit locks, rate limiting,
//!   and settings
//! - Filesystem storage for uploaded event media
//!
//! ## Example
//!
//! ```rust,ignore
//! use tavle_db::Database;
//! use tavle_core::{EventFilter, EventRepository};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/tavle").await?;
//!     let upcoming = db.events.list_published(EventFilter::All, 50).await?;
//!     println!("{} upcoming events", upcoming.len());
//!     Ok(())
//! }
//! ```

pub mod events;
pub mod file_storage;
pub mod locks;
pub mod pool;
pub mod rate_limit;
pub mod settings;

// Test fixtures for integration tests
// Note: Always compiled so integration tests (in tests/) can use DEFAULT_TEST_DATABASE_URL
pub mod test_fixtures;

// Re-export core types
pub use tavle_core::*;

pub use events::PgEventRepository;
pub use file_storage::{FilesystemBackend, StorageBackend, StoredObject};
pub use locks::PgLockRepository;
pub use pool::{create_pool, create_pool_with_config, PoolConfig};
pub use rate_limit::PgRateLimitRepository;
pub use settings::PgSettingsRepository;

/// Combined database context with all repositories.
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Event repository for listing, upsert, and lifecycle transitions.
    pub events: PgEventRepository,
    /// Edit lock repository for the admin editor.
    pub locks: PgLockRepository,
    /// Sliding-window submission rate limiter.
    pub rate_limits: PgRateLimitRepository,
    /// Settings and admin allow-list repository.
    pub settings: PgSettingsRepository,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            events: PgEventRepository::new(pool.clone()),
            locks: PgLockRepository::new(pool.clone()),
            rate_limits: PgRateLimitRepository::new(pool.clone()),
            settings: PgSettingsRepository::new(pool.clone()),
            pool,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
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

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self::new(self.pool.clone())
    }
}
