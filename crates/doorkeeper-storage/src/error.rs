use thiserror::Error;

/// Failures of the persistent store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Schema migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A cell holds text the reader cannot interpret.
    #[error("Key '{key}' holds unreadable value '{raw}'")]
    CorruptValue { key: String, raw: String },

    #[error("Invalid store configuration: {0}")]
    Configuration(String),

    #[error("Cannot create database directory: {0}")]
    Directory(#[source] std::io::Error),

    /// The backend refused the operation.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StorageError {
    pub fn corrupt(key: &str, raw: impl Into<String>) -> Self {
        Self::CorruptValue {
            key: key.to_string(),
            raw: raw.into(),
        }
    }
}

impl From<doorkeeper_core::Error> for StorageError {
    fn from(err: doorkeeper_core::Error) -> Self {
        Self::Configuration(err.to_string())
    }
}

pub type StorageResult<T> = Result<T, StorageError>;
