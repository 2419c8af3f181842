//! Errors shared by every doorkeeper crate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// A tag UID that is not 4-10 bytes of hex.
    #[error("Invalid credential format: {0}")]
    InvalidCredential(String),

    /// The controller tried to leave a phase for one it may not enter.
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed configuration file: {0}")]
    Json(#[from] serde_json::Error),

    /// A configuration value outside its allowed range.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A configuration value that must be set was left empty.
    #[error("Missing configuration key: {0}")]
    MissingConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;
