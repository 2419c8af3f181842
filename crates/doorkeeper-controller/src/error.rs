use thiserror::Error;

use doorkeeper_storage::StorageError;

/// Errors that stop the controller from being built.
///
/// Once running, the controller logs failures and carries on; nothing is
/// returned from the event loop.
#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("Invalid controller configuration: {0}")]
    Config(#[from] doorkeeper_core::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub type ControllerResult<T> = std::result::Result<T, ControllerError>;
