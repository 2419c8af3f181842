//! Common types shared across hardware device implementations.

use serde::{Deserialize, Serialize};

/// Generic device information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Device name (e.g., "4x4 Matrix Keypad").
    pub name: String,

    /// Device model identifier.
    pub model: String,

    /// Optional firmware version string.
    pub firmware_version: Option<String>,
}

impl DeviceInfo {
    /// Create a new DeviceInfo with required fields.
    pub fn new(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            firmware_version: None,
        }
    }

    /// Set the firmware version.
    pub fn with_firmware_version(mut self, firmware_version: impl Into<String>) -> Self {
        self.firmware_version = Some(firmware_version.into());
        self
    }
}

/// RFID reader information.
///
/// Readers in the MFRC522 family report a version register; `0x00` and
/// `0xFF` mean nothing answered on the bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderInfo {
    /// Reader name (e.g., "MFRC522").
    pub name: String,

    /// Raw version register value.
    pub version: u8,
}

impl ReaderInfo {
    /// Create a new ReaderInfo.
    pub fn new(name: impl Into<String>, version: u8) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }

    /// Whether a reader actually answered.
    ///
    /// # Examples
    ///
    /// ```
    /// use doorkeeper_hardware::ReaderInfo;
    ///
    /// assert!(ReaderInfo::new("MFRC522", 0x92).is_present());
    /// assert!(!ReaderInfo::new("MFRC522", 0x00).is_present());
    /// assert!(!ReaderInfo::new("MFRC522", 0xFF).is_present());
    /// ```
    pub fn is_present(&self) -> bool {
        !matches!(self.version, 0x00 | 0xFF)
    }
}

/// Position the door actuator can be driven to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoorPosition {
    /// Latch released.
    Open,

    /// Actuator at rest, holding nothing.
    Neutral,

    /// Latch engaged.
    Close,
}

impl DoorPosition {
    /// Servo pulse width for this position, in microseconds.
    pub fn pulse_width_us(self) -> u16 {
        match self {
            Self::Open => 1700,
            Self::Neutral => 1500,
            Self::Close => 1310,
        }
    }
}

impl std::fmt::Display for DoorPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Neutral => write!(f, "neutral"),
            Self::Close => write!(f, "close"),
        }
    }
}
