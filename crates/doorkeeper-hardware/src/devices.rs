//! Concrete input device types owned by the peripheral manager.
//!
//! `async fn` in a trait rules out `Box<dyn KeypadDevice>`, so each input
//! kind gets an enum with one variant per driver. A hardware driver is added
//! as another variant.

use crate::mock::{MockKeypad, MockRfid};
use crate::traits::{KeypadDevice, RfidDevice};
use crate::{CardData, DeviceInfo, KeypadInput, ReaderInfo, Result};

/// Any keypad the manager can poll.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyKeypadDevice {
    /// Channel-fed keypad used by tests and the console front end.
    Mock(MockKeypad),
}

impl KeypadDevice for AnyKeypadDevice {
    async fn read_input(&mut self) -> Result<KeypadInput> {
        match self {
            Self::Mock(keypad) => keypad.read_input().await,
        }
    }

    async fn get_info(&self) -> Result<DeviceInfo> {
        match self {
            Self::Mock(keypad) => keypad.get_info().await,
        }
    }
}

/// Any tag reader the manager can poll.
///
/// ```
/// use doorkeeper_hardware::devices::AnyRfidDevice;
/// use doorkeeper_hardware::mock::MockRfid;
/// use doorkeeper_hardware::traits::RfidDevice;
///
/// # #[tokio::main]
/// # async fn main() -> doorkeeper_hardware::Result<()> {
/// let (unwired, _tags) = MockRfid::with_version(0x00);
/// let reader = AnyRfidDevice::Mock(unwired);
///
/// assert!(!reader.get_reader_info().await?.is_present());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyRfidDevice {
    /// Channel-fed reader used by tests and the console front end.
    Mock(MockRfid),
}

impl RfidDevice for AnyRfidDevice {
    async fn read_card(&mut self) -> Result<CardData> {
        match self {
            Self::Mock(reader) => reader.read_card().await,
        }
    }

    async fn halt(&mut self) -> Result<()> {
        match self {
            Self::Mock(reader) => reader.halt().await,
        }
    }

    async fn get_reader_info(&self) -> Result<ReaderInfo> {
        match self {
            Self::Mock(reader) => reader.get_reader_info().await,
        }
    }
}
