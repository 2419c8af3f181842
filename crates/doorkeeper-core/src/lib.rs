//! Shared building blocks for the doorkeeper access controller.
//!
//! This crate holds the types every other crate agrees on: the normalized
//! [`Credential`] identifier, the workspace [`Error`] type, compiled-in
//! defaults in [`constants`], and the runtime [`config::ControllerConfig`].

pub mod config;
pub mod constants;
pub mod error;
pub mod types;

pub use config::ControllerConfig;
pub use error::{Error, Result};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
