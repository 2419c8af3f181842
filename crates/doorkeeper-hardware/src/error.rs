//! Peripheral failures.
//!
//! Input devices fail by going away or by handing over data the controller
//! cannot interpret. Only the first ends that device's reader task.

/// Result type alias for peripheral operations.
pub type Result<T> = std::result::Result<T, HardwareError>;

#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// The device (or the channel standing in for it) is gone.
    #[error("{device} disconnected")]
    Disconnected { device: String },

    /// A key symbol, tag UID or screen coordinate that cannot be used.
    #[error("Invalid data: {message}")]
    InvalidData { message: String },
}

impl HardwareError {
    pub fn disconnected(device: impl Into<String>) -> Self {
        Self::Disconnected {
            device: device.into(),
        }
    }

    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }

    /// Whether the device should be considered gone for good.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Disconnected { .. })
    }
}
