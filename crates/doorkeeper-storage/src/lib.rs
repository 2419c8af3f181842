//! Persistent storage for the doorkeeper access controller.
//!
//! Two layers:
//!
//! - [`KeyValueStore`]: namespaced get/put/remove by key, backed by SQLite
//!   ([`SqliteKvStore`]) or memory ([`MemoryKvStore`]).
//! - [`CredentialStore`]: the password, the ordered allowed-card list and
//!   the admin identity, laid out as flat keys on top of the first layer.
//!
//! # Examples
//!
//! ```no_run
//! use doorkeeper_core::ControllerConfig;
//! use doorkeeper_storage::{AnyKvStore, CredentialStore, Database, DatabaseConfig, SqliteKvStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ControllerConfig::default();
//! let db = Database::new(DatabaseConfig::from(&config.storage)).await?;
//!
//! let kv = SqliteKvStore::new(db.pool().clone(), config.storage.namespace.clone());
//! let store = CredentialStore::from_config(AnyKvStore::Sqlite(kv), &config)?;
//!
//! println!("{} cards allowed", store.card_count().await?);
//! # Ok(())
//! # }
//! ```
//!
//! # Durability
//!
//! The SQLite connection runs with `synchronous = FULL`, so a mutation has
//! reached disk when its future resolves.

pub mod connection;
pub mod credentials;
pub mod error;
pub mod kv;

pub use connection::{Database, DatabaseConfig};
pub use credentials::CredentialStore;
pub use error::{StorageError, StorageResult};
pub use kv::{AnyKvStore, KeyValueStore, MemoryKvStore, SqliteKvStore};
