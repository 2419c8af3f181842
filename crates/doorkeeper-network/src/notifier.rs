//! Fire-and-forget reporting of access decisions.
//!
//! Every scan produces one [`PendingNotification`]. The controller hands it
//! to an [`AccessNotifier`] and moves on; the [`NotificationDispatcher`]
//! spawns a task per notification that waits briefly for the link, makes a
//! single request and logs what happened. Nothing is retried and nothing is
//! reported back to the caller.
//!
//! On the wire a notification is one HTTP GET:
//!
//! ```text
//! GET /notify?status=ok&id=AABBCCDD
//! GET /notify?status=bad
//! ```

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use doorkeeper_core::Credential;
use doorkeeper_core::config::NetworkConfig;
use doorkeeper_core::constants::{NOTIFY_ID_MAX_LEN, STATUS_BAD, STATUS_OK};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{NetworkError, NetworkResult};
use crate::link::LinkStatus;

/// Outcome of one scan, owned by whoever delivers it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingNotification {
    /// Whether the door opened.
    pub allowed: bool,

    /// The scanned tag, if any.
    pub uid: Option<Credential>,
}

impl PendingNotification {
    /// A granted scan.
    pub fn allowed(uid: Credential) -> Self {
        Self {
            allowed: true,
            uid: Some(uid),
        }
    }

    /// A refused scan.
    pub fn denied(uid: Option<Credential>) -> Self {
        Self {
            allowed: false,
            uid,
        }
    }
}

/// Query parameters of one notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyRequest {
    /// `ok` or `bad`.
    pub status: &'static str,

    /// Uppercase UID, at most 32 characters. Only sent for granted scans.
    pub id: Option<String>,
}

impl NotifyRequest {
    /// Query pairs in wire order.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("status", self.status.to_string())];
        if let Some(id) = &self.id {
            pairs.push(("id", id.clone()));
        }
        pairs
    }
}

impl From<&PendingNotification> for NotifyRequest {
    fn from(notification: &PendingNotification) -> Self {
        if !notification.allowed {
            return Self {
                status: STATUS_BAD,
                id: None,
            };
        }

        let id = notification
            .uid
            .as_ref()
            .map(|uid| uid.truncated(NOTIFY_ID_MAX_LEN).to_uppercase())
            .filter(|id| !id.is_empty());

        Self {
            status: STATUS_OK,
            id,
        }
    }
}

/// Delivers one request to the observer. Returns the HTTP status code.
pub trait NotifyTransport: Send + Sync + 'static {
    fn deliver(&self, request: NotifyRequest) -> impl Future<Output = NetworkResult<u16>> + Send;
}

/// Plain-HTTP transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
}

impl HttpTransport {
    /// Create a transport for `url` with connect and whole-request timeouts.
    ///
    /// # Errors
    /// Returns `NetworkError::Http` if the client cannot be built.
    pub fn new(
        url: impl Into<String>,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> NetworkResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Create a transport for the configured observer.
    pub fn from_config(config: &NetworkConfig) -> NetworkResult<Self> {
        Self::new(
            config.notify_url(),
            config.connect_timeout(),
            config.request_timeout(),
        )
    }
}

impl NotifyTransport for HttpTransport {
    async fn deliver(&self, request: NotifyRequest) -> NetworkResult<u16> {
        let response = self
            .client
            .get(&self.url)
            .query(&request.query_pairs())
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    NetworkError::connection(e.to_string())
                } else {
                    NetworkError::Http(e)
                }
            })?;

        let code = response.status().as_u16();
        if response.status().is_success() {
            Ok(code)
        } else {
            Err(NetworkError::Status { code })
        }
    }
}

/// Something that accepts notifications without making the caller wait.
pub trait AccessNotifier: Send + Sync {
    /// Take ownership of `notification` and return immediately.
    fn dispatch(&self, notification: PendingNotification);
}

/// Snapshot of dispatcher counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Tasks not yet finished.
    pub in_flight: usize,

    /// Requests the peer acknowledged.
    pub delivered: u64,

    /// Requests that failed for any reason.
    pub failed: u64,
}

#[derive(Debug, Default)]
struct Counters {
    in_flight: AtomicUsize,
    delivered: AtomicU64,
    failed: AtomicU64,
}

/// Timing of the per-notification link wait.
#[derive(Debug, Clone, Copy)]
pub struct DispatchTiming {
    /// How long to wait for the link before trying anyway.
    pub connect_wait: Duration,

    /// How often to re-check the link while waiting.
    pub link_poll: Duration,
}

impl From<&NetworkConfig> for DispatchTiming {
    fn from(config: &NetworkConfig) -> Self {
        Self {
            connect_wait: config.connect_wait(),
            link_poll: config.link_poll(),
        }
    }
}

/// Spawns one independent task per notification.
///
/// There is no bound on outstanding tasks: a burst of scans against a slow
/// peer keeps one task per scan alive until its request times out.
pub struct NotificationDispatcher<T: NotifyTransport> {
    transport: Arc<T>,
    link: LinkStatus,
    timing: DispatchTiming,
    counters: Arc<Counters>,
}

impl<T: NotifyTransport> Clone for NotificationDispatcher<T> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            link: self.link.clone(),
            timing: self.timing,
            counters: self.counters.clone(),
        }
    }
}

impl<T: NotifyTransport> NotificationDispatcher<T> {
    /// Create a dispatcher.
    pub fn new(transport: T, link: LinkStatus, timing: DispatchTiming) -> Self {
        Self {
            transport: Arc::new(transport),
            link,
            timing,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Current counters.
    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            in_flight: self.counters.in_flight.load(Ordering::SeqCst),
            delivered: self.counters.delivered.load(Ordering::SeqCst),
            failed: self.counters.failed.load(Ordering::SeqCst),
        }
    }

    async fn deliver_one(
        transport: Arc<T>,
        link: LinkStatus,
        timing: DispatchTiming,
        counters: Arc<Counters>,
        notification: PendingNotification,
    ) {
        let start = Instant::now();

        if !link.is_connected() {
            link.request_reconnect();
            if !link
                .wait_connected(timing.connect_wait, timing.link_poll)
                .await
            {
                debug!("Link still down, attempting notification anyway");
            }
        }

        let request = NotifyRequest::from(&notification);
        let status = request.status;

        match transport.deliver(request).await {
            Ok(code) => {
                counters.delivered.fetch_add(1, Ordering::SeqCst);
                info!(
                    status,
                    http_status = code,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Notification delivered"
                );
            }
            Err(e) => {
                counters.failed.fetch_add(1, Ordering::SeqCst);
                warn!(
                    status,
                    error = %e,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Notification failed"
                );
            }
        }

        counters.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl<T: NotifyTransport> AccessNotifier for NotificationDispatcher<T> {
    fn dispatch(&self, notification: PendingNotification) {
        self.counters.in_flight.fetch_add(1, Ordering::SeqCst);

        tokio::spawn(Self::deliver_one(
            self.transport.clone(),
            self.link.clone(),
            self.timing,
            self.counters.clone(),
            notification,
        ));
    }
}
