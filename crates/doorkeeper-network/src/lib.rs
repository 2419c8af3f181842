//! Network side of the doorkeeper access controller.
//!
//! - [`LinkStatus`]: the shared "connected" flag read by the controller.
//! - [`ConnectivityMonitor`]: background task that keeps the flag current.
//! - [`NotificationDispatcher`]: fire-and-forget reporting of every scan
//!   decision to an observer over plain HTTP.
//!
//! Nothing here can block or fail an access decision.
//!
//! # Example
//!
//! ```no_run
//! use doorkeeper_core::{ControllerConfig, Credential};
//! use doorkeeper_network::{
//!     AccessNotifier, ConnectivityMonitor, DispatchTiming, HttpTransport, LinkStatus,
//!     NotificationDispatcher, PendingNotification, TcpProbe,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ControllerConfig::default();
//! let link = LinkStatus::new();
//!
//! ConnectivityMonitor::new(
//!     TcpProbe::from_config(&config.network),
//!     link.clone(),
//!     config.network.reconnect_interval(),
//! )
//! .spawn();
//!
//! let dispatcher = NotificationDispatcher::new(
//!     HttpTransport::from_config(&config.network)?,
//!     link,
//!     DispatchTiming::from(&config.network),
//! );
//!
//! dispatcher.dispatch(PendingNotification::allowed(Credential::new("AABBCCDD")?));
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod link;
pub mod notifier;

pub use error::{NetworkError, NetworkResult};
pub use link::{ConnectivityMonitor, LinkProbe, LinkStatus, TcpProbe};
pub use notifier::{
    AccessNotifier, DispatchStats, DispatchTiming, HttpTransport, NotificationDispatcher,
    NotifyRequest, NotifyTransport, PendingNotification,
};
