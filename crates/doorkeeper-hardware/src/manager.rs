//! Merges the keypad and the tag reader into one ordered event stream.
//!
//! ```text
//! keypad task ──┐
//!               ├──► mpsc (bounded) ──► AccessController
//! reader task ──┘
//! ```
//!
//! Each device gets its own task. Events queue in the channel while the
//! controller is inside a blocking sequence (door cycle, flash message) and
//! are consumed in arrival order afterwards. A full channel makes the device
//! task wait, so keys are never dropped.

use crate::devices::{AnyKeypadDevice, AnyRfidDevice};
use crate::traits::{KeypadDevice, RfidDevice};
use crate::{CardData, KeypadInput, Result};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinSet;
use tokio::time::{Duration, Instant};

/// Capacity of the merged event channel.
const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Minimum delay between two reads of the same device.
const MIN_POLL_INTERVAL_MS: u64 = 10;

/// Pause before retrying a send into a full channel.
const BACKPRESSURE_DELAY_MS: u64 = 100;

/// Unified event from any input peripheral.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum PeripheralEvent {
    /// Key pressed on the keypad.
    KeypadInput(KeypadInput),

    /// Tag read by the credential reader.
    CardRead(CardData),

    /// A read failed.
    ///
    /// After a disconnect the device task terminates; after a garbled read
    /// it keeps polling.
    DeviceError {
        /// Type of device that encountered the error.
        device_type: DeviceType,

        /// Error message.
        error: String,
    },
}

/// Type of input peripheral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceType {
    /// Keypad device.
    Keypad,

    /// RFID reader device.
    Rfid,
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Keypad => write!(f, "Keypad"),
            Self::Rfid => write!(f, "RFID"),
        }
    }
}

/// Which input devices the manager starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeripheralConfig {
    /// Enable keypad device.
    pub keypad_enabled: bool,

    /// Enable RFID reader device.
    pub rfid_enabled: bool,
}

impl Default for PeripheralConfig {
    fn default() -> Self {
        Self {
            keypad_enabled: true,
            rfid_enabled: true,
        }
    }
}

/// Receiving end of the merged event stream.
///
/// Owns the device tasks; dropping the handle closes the channel and the
/// tasks stop at their next send.
pub struct PeripheralHandle {
    /// Event receiver for consuming events from devices.
    event_rx: mpsc::Receiver<PeripheralEvent>,

    /// Running device tasks.
    tasks: JoinSet<Result<()>>,
}

impl PeripheralHandle {
    /// Receive the next event from any peripheral.
    ///
    /// Returns `None` once every device task has ended. Cancel safe, so it
    /// can sit in a `tokio::select!` next to a timer.
    pub async fn recv(&mut self) -> Option<PeripheralEvent> {
        self.event_rx.recv().await
    }

    /// Abort the device tasks and wait for them.
    ///
    /// Device failures were already reported as events; here they are only
    /// counted into the log.
    pub async fn shutdown(mut self) -> Result<()> {
        self.tasks.abort_all();

        let mut failed = 0usize;
        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Err(e) if e.is_cancelled() => {}
                Ok(Err(_)) | Err(_) => failed += 1,
            }
        }

        if failed > 0 {
            tracing::warn!(failed, "Peripheral tasks ended abnormally");
        } else {
            tracing::debug!("Peripheral tasks stopped");
        }
        Ok(())
    }
}

/// Manages the keypad and the credential reader.
///
/// # Lifecycle
///
/// 1. Create manager with configuration
/// 2. Register devices using `register_*` methods
/// 3. Optionally probe the reader with [`check_reader`](Self::check_reader)
/// 4. Call `start()` to spawn device tasks and get the event handle
pub struct PeripheralManager {
    keypad: Option<AnyKeypadDevice>,
    rfid: Option<AnyRfidDevice>,
    event_tx: mpsc::Sender<PeripheralEvent>,
    event_rx: mpsc::Receiver<PeripheralEvent>,
    config: PeripheralConfig,
}

impl PeripheralManager {
    /// Create new peripheral manager with configuration.
    ///
    /// # Examples
    ///
    /// ```
    /// use doorkeeper_hardware::manager::{PeripheralManager, PeripheralConfig};
    ///
    /// let manager = PeripheralManager::new(PeripheralConfig::default());
    /// ```
    pub fn new(config: PeripheralConfig) -> Self {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            keypad: None,
            rfid: None,
            event_tx,
            event_rx,
            config,
        }
    }

    /// Register keypad device.
    pub fn register_keypad(&mut self, device: AnyKeypadDevice) {
        self.keypad = Some(device);
    }

    /// Register RFID device.
    pub fn register_rfid(&mut self, device: AnyRfidDevice) {
        self.rfid = Some(device);
    }

    /// Probe the registered reader's version register.
    ///
    /// A missing reader, an unreadable register, or a register reading
    /// `0x00`/`0xFF` is logged as a wiring problem and reported as `false`.
    /// Startup continues either way.
    pub async fn check_reader(&self) -> bool {
        let Some(reader) = &self.rfid else {
            tracing::warn!("No RFID reader registered");
            return false;
        };

        match reader.get_reader_info().await {
            Ok(info) if info.is_present() => {
                tracing::info!(name = %info.name, version = format!("0x{:02X}", info.version), "RFID reader detected");
                true
            }
            Ok(info) => {
                tracing::warn!(
                    version = format!("0x{:02X}", info.version),
                    "RFID reader not responding, check wiring"
                );
                false
            }
            Err(e) => {
                tracing::warn!(error = %e, "RFID reader probe failed, check wiring");
                false
            }
        }
    }

    /// Spawn one task per enabled device and return the event handle.
    pub fn start(mut self) -> PeripheralHandle {
        let mut tasks = JoinSet::new();

        if self.config.keypad_enabled
            && let Some(device) = self.keypad.take()
        {
            tasks.spawn(Self::keypad_task(device, self.event_tx.clone()));
        }

        if self.config.rfid_enabled
            && let Some(device) = self.rfid.take()
        {
            tasks.spawn(Self::rfid_task(device, self.event_tx.clone()));
        }

        tracing::debug!(tasks = tasks.len(), "Peripheral manager started");

        PeripheralHandle {
            event_rx: self.event_rx,
            tasks,
        }
    }

    async fn keypad_task(
        mut device: AnyKeypadDevice,
        tx: mpsc::Sender<PeripheralEvent>,
    ) -> Result<()> {
        loop {
            let start = Instant::now();

            let open = match device.read_input().await {
                Ok(input) => Self::forward(&tx, PeripheralEvent::KeypadInput(input)).await,
                Err(e) => Self::read_failed(&tx, DeviceType::Keypad, e).await?,
            };
            if !open {
                return Ok(());
            }

            Self::rate_limit(start).await;
        }
    }

    async fn rfid_task(mut device: AnyRfidDevice, tx: mpsc::Sender<PeripheralEvent>) -> Result<()> {
        loop {
            let start = Instant::now();

            let open = match device.read_card().await {
                Ok(card) => Self::forward(&tx, PeripheralEvent::CardRead(card)).await,
                Err(e) => Self::read_failed(&tx, DeviceType::Rfid, e).await?,
            };
            // Every read, good or garbled, is acknowledged so the same tag
            // is not reported twice.
            if let Err(e) = device.halt().await {
                tracing::debug!(error = %e, "RFID halt failed");
            }
            if !open {
                return Ok(());
            }

            Self::rate_limit(start).await;
        }
    }

    /// Send an event, waiting once if the channel is full.
    ///
    /// Returns `false` when the receiver is gone.
    async fn forward(tx: &mpsc::Sender<PeripheralEvent>, event: PeripheralEvent) -> bool {
        match tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                tracing::debug!("Peripheral event channel full");
                tokio::time::sleep(Duration::from_millis(BACKPRESSURE_DELAY_MS)).await;
                tx.send(event).await.is_ok()
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Report a failed read.
    ///
    /// Returns `Err` for a fatal failure, ending the device task; otherwise
    /// whether the channel is still open.
    async fn read_failed(
        tx: &mpsc::Sender<PeripheralEvent>,
        device_type: DeviceType,
        error: crate::HardwareError,
    ) -> Result<bool> {
        if error.is_fatal() {
            tracing::error!(%device_type, error = %error, "Peripheral device failed");
        } else {
            tracing::warn!(%device_type, error = %error, "Peripheral read discarded");
        }

        let event = PeripheralEvent::DeviceError {
            device_type,
            error: error.to_string(),
        };
        let open = tx.send(event).await.is_ok();

        if error.is_fatal() {
            Err(error)
        } else {
            Ok(open)
        }
    }

    async fn rate_limit(start: Instant) {
        let min = Duration::from_millis(MIN_POLL_INTERVAL_MS);
        let elapsed = start.elapsed();
        if elapsed < min {
            tokio::time::sleep(min - elapsed).await;
        }
    }
}
