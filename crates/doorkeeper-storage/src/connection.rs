//! SQLite pool setup.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::ConnectOptions;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};

use crate::error::{StorageError, StorageResult};
use doorkeeper_core::config::StorageConfig;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Where the database lives and how the pool is sized.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub database_path: String,

    /// Only the controller loop writes, so two connections are enough.
    pub max_connections: u32,

    pub acquire_timeout: Duration,

    /// Apply embedded migrations when opening.
    pub migrate_on_open: bool,
}

impl DatabaseConfig {
    pub fn new(database_path: impl Into<String>) -> Self {
        Self {
            database_path: database_path.into(),
            max_connections: 2,
            acquire_timeout: Duration::from_secs(10),
            migrate_on_open: true,
        }
    }

    /// Open without touching the schema.
    pub fn without_migrations(mut self) -> Self {
        self.migrate_on_open = false;
        self
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::new(doorkeeper_core::constants::DEFAULT_DATABASE_PATH)
    }
}

impl From<&StorageConfig> for DatabaseConfig {
    fn from(config: &StorageConfig) -> Self {
        Self::new(config.database_path.clone())
    }
}

/// Pooled handle on the store's SQLite file.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open the file, creating it and its directory if missing.
    ///
    /// ```no_run
    /// use doorkeeper_storage::connection::{Database, DatabaseConfig};
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let db = Database::new(DatabaseConfig::new("/var/lib/doorkeeper/store.db")).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn new(config: DatabaseConfig) -> StorageResult<Self> {
        ensure_parent_dir(Path::new(&config.database_path))?;

        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", config.database_path))
            .map_err(|e| {
                StorageError::Configuration(format!("bad path {}: {e}", config.database_path))
            })?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            // A mutation is on disk before the admin menu reports it.
            .synchronous(SqliteSynchronous::Full)
            .busy_timeout(BUSY_TIMEOUT)
            .disable_statement_logging();

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        if config.migrate_on_open {
            db.migrate().await?;
        }

        tracing::debug!(path = %config.database_path, "Database opened");
        Ok(db)
    }

    /// Single-connection, migrated, in-memory database.
    pub async fn in_memory() -> StorageResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(SqliteConnectOptions::from_str("sqlite::memory:")?)
            .await?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Apply the migrations embedded from the workspace `migrations/`
    /// directory. Safe to repeat.
    pub async fn migrate(&self) -> StorageResult<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Round-trip a trivial query.
    pub async fn health_check(&self) -> StorageResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

fn ensure_parent_dir(path: &Path) -> StorageResult<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.exists() => {
            std::fs::create_dir_all(parent).map_err(StorageError::Directory)
        }
        _ => Ok(()),
    }
}
