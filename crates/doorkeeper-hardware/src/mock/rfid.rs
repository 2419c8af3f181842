//! Mock credential reader for testing and development.
//!
//! Tags are presented through a [`MockRfidHandle`]; the handle also counts
//! halt acknowledgements so tests can check the read/halt protocol, and can
//! inject a garbled read the way a collision or CRC failure would surface.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::{
    HardwareError, Result,
    traits::{CardData, CardType, RfidDevice},
    types::ReaderInfo,
};
use tokio::sync::mpsc;

/// Version register value of a healthy MFRC522.
const MOCK_READER_VERSION: u8 = 0x92;

/// Mock RFID reader for testing and development.
///
/// # Examples
///
/// ```
/// use doorkeeper_hardware::mock::MockRfid;
/// use doorkeeper_hardware::traits::RfidDevice;
///
/// #[tokio::main]
/// async fn main() -> doorkeeper_hardware::Result<()> {
///     let (mut reader, handle) = MockRfid::new();
///
///     handle.present_uid(vec![0x04, 0xAB, 0xCD, 0xEF]).await?;
///
///     let card = reader.read_card().await?;
///     assert_eq!(card.uid_hex(), "04ABCDEF");
///     reader.halt().await?;
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockRfid {
    /// Channel receiver for presented tags and injected read failures
    event_rx: mpsc::Receiver<Result<CardData>>,

    /// Device name
    name: String,

    /// Version register reported by `get_reader_info`
    version: u8,

    /// Shared halt counter
    halts: Arc<AtomicUsize>,
}

impl MockRfid {
    /// Create a new mock reader with the default name.
    pub fn new() -> (Self, MockRfidHandle) {
        Self::with_version(MOCK_READER_VERSION)
    }

    /// Create a mock reader reporting a specific version register.
    ///
    /// `0x00` or `0xFF` simulate a reader that is not wired up.
    pub fn with_version(version: u8) -> (Self, MockRfidHandle) {
        let (event_tx, event_rx) = mpsc::channel(32);
        let halts = Arc::new(AtomicUsize::new(0));

        let reader = Self {
            event_rx,
            name: "Mock RFID Reader".to_string(),
            version,
            halts: halts.clone(),
        };

        let handle = MockRfidHandle { event_tx, halts };

        (reader, handle)
    }
}

impl RfidDevice for MockRfid {
    async fn read_card(&mut self) -> Result<CardData> {
        self.event_rx
            .recv()
            .await
            .unwrap_or_else(|| Err(HardwareError::disconnected("RFID event channel")))
    }

    async fn halt(&mut self) -> Result<()> {
        self.halts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get_reader_info(&self) -> Result<ReaderInfo> {
        Ok(ReaderInfo::new(self.name.clone(), self.version))
    }
}

/// Handle for presenting tags to a mock reader.
#[derive(Debug, Clone)]
pub struct MockRfidHandle {
    /// Channel sender for presented tags
    event_tx: mpsc::Sender<Result<CardData>>,

    /// Shared halt counter
    halts: Arc<AtomicUsize>,
}

impl MockRfidHandle {
    /// Present a tag with the given UID bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the UID length is invalid or the reader is gone.
    pub async fn present_uid(&self, uid: Vec<u8>) -> Result<()> {
        let card = CardData::new(uid, CardType::MifareClassic1K)?;
        self.push(Ok(card)).await
    }

    /// Make the next read fail with unusable data.
    ///
    /// # Errors
    ///
    /// Returns an error if the reader is gone.
    pub async fn present_garbled(&self, reason: &str) -> Result<()> {
        self.push(Err(HardwareError::invalid_data(reason.to_string())))
            .await
    }

    async fn push(&self, read: Result<CardData>) -> Result<()> {
        self.event_tx
            .send(read)
            .await
            .map_err(|_| HardwareError::disconnected("RFID event channel"))
    }

    /// Present a tag given as hex text, e.g. `"AABBCCDD"`.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid UID or the reader is gone.
    pub async fn present_hex(&self, hex: &str) -> Result<()> {
        let credential = doorkeeper_core::Credential::new(hex)
            .map_err(|e| HardwareError::invalid_data(e.to_string()))?;
        self.present_uid(credential.to_uid_bytes()).await
    }

    /// Number of halt acknowledgements the reader has received.
    pub fn halt_count(&self) -> usize {
        self.halts.load(Ordering::SeqCst)
    }
}
