//! Link state shared between the controller and background network work.
//!
//! ```text
//! ConnectivityMonitor ──probe──► peer
//!        │
//!        ▼ set_connected
//!    LinkStatus ◄── is_connected ── AccessController (status line)
//!        ▲
//!        └── request_reconnect / wait_connected ── notification tasks
//! ```

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use doorkeeper_core::config::NetworkConfig;

/// Shared "connected" flag.
///
/// Cheap to clone; all clones see the same flag.
#[derive(Debug, Clone, Default)]
pub struct LinkStatus {
    connected: Arc<AtomicBool>,
    reconnect: Arc<Notify>,
}

impl LinkStatus {
    /// Create a flag that starts disconnected.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current link state.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Record the link state. Returns `true` if it changed.
    pub fn set_connected(&self, connected: bool) -> bool {
        let previous = self.connected.swap(connected, Ordering::AcqRel);
        if previous != connected {
            if connected {
                info!("Network link up");
            } else {
                warn!("Network link down");
            }
        }
        previous != connected
    }

    /// Ask the monitor to probe now instead of at its next interval.
    pub fn request_reconnect(&self) {
        self.reconnect.notify_one();
    }

    /// Resolves when someone calls [`request_reconnect`](Self::request_reconnect).
    pub async fn reconnect_requested(&self) {
        self.reconnect.notified().await;
    }

    /// Wait up to `timeout` for the link, checking every `poll`.
    pub async fn wait_connected(&self, timeout: Duration, poll: Duration) -> bool {
        let deadline = Instant::now() + timeout;

        loop {
            if self.is_connected() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            tokio::time::sleep(poll.min(deadline - now)).await;
        }
    }
}

/// A way of finding out whether the peer is reachable.
pub trait LinkProbe: Send + Sync + 'static {
    /// Attempt to reach the peer once.
    fn probe(&self) -> impl Future<Output = bool> + Send;
}

/// Probe that opens (and immediately drops) a TCP connection.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    addr: String,
    timeout: Duration,
}

impl TcpProbe {
    /// Probe `addr` (`host:port`) with a connect timeout.
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            timeout,
        }
    }

    /// Probe the configured link address.
    pub fn from_config(config: &NetworkConfig) -> Self {
        Self::new(config.link_probe_addr.clone(), config.connect_timeout())
    }
}

impl LinkProbe for TcpProbe {
    async fn probe(&self) -> bool {
        match tokio::time::timeout(self.timeout, TcpStream::connect(&self.addr)).await {
            Ok(Ok(_stream)) => true,
            Ok(Err(e)) => {
                debug!(addr = %self.addr, error = %e, "Link probe failed");
                false
            }
            Err(_) => {
                debug!(addr = %self.addr, timeout_ms = self.timeout.as_millis() as u64, "Link probe timed out");
                false
            }
        }
    }
}

/// Background task keeping [`LinkStatus`] current.
///
/// Probes once per `interval`, or immediately when a reconnect is
/// requested. Never stops on its own.
pub struct ConnectivityMonitor<P: LinkProbe> {
    probe: P,
    status: LinkStatus,
    interval: Duration,
}

impl<P: LinkProbe> ConnectivityMonitor<P> {
    /// Create a monitor writing to `status`.
    pub fn new(probe: P, status: LinkStatus, interval: Duration) -> Self {
        Self {
            probe,
            status,
            interval,
        }
    }

    /// Probe once and record the result.
    pub async fn check_once(&self) -> bool {
        let reachable = self.probe.probe().await;
        self.status.set_connected(reachable);
        reachable
    }

    /// Probe forever.
    pub async fn run(self) {
        loop {
            self.check_once().await;

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = self.status.reconnect_requested() => {
                    debug!("Reconnect requested");
                }
            }
        }
    }

    /// Run on a new task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}
