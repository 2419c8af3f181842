//! Hardware abstraction layer for the doorkeeper access controller.
//!
//! Every peripheral on the door unit sits behind a trait so the controller
//! can run against real drivers or against the mocks in [`mock`]:
//!
//! - [`KeypadDevice`]: 4x4 matrix keypad
//! - [`RfidDevice`]: MFRC522-style tag reader
//! - [`DisplayDevice`]: 20x4 character LCD
//! - [`DoorActuator`]: servo latch
//! - [`Buzzer`]: PWM alarm buzzer
//!
//! All I/O is asynchronous using native `async fn` in traits. Input devices
//! are polled by the [`PeripheralManager`], which merges them into one
//! event stream.
//!
//! # Example
//!
//! ```no_run
//! use doorkeeper_hardware::traits::{KeypadDevice, KeypadInput};
//! use doorkeeper_hardware::Result;
//!
//! async fn read_code<K: KeypadDevice>(keypad: &mut K) -> Result<String> {
//!     let mut code = String::new();
//!
//!     loop {
//!         match keypad.read_input().await? {
//!             KeypadInput::Hash => break,
//!             KeypadInput::Star => {
//!                 code.pop();
//!             }
//!             other => {
//!                 if let Some(ch) = other.as_text() {
//!                     code.push(ch);
//!                 }
//!             }
//!         }
//!     }
//!
//!     Ok(code)
//! }
//! ```
//!
//! [`KeypadDevice`]: traits::KeypadDevice
//! [`RfidDevice`]: traits::RfidDevice
//! [`DisplayDevice`]: traits::DisplayDevice
//! [`DoorActuator`]: traits::DoorActuator
//! [`Buzzer`]: traits::Buzzer

pub mod devices;
pub mod error;
pub mod manager;
pub mod mock;
pub mod text;
pub mod traits;
pub mod types;

pub use error::{HardwareError, Result};
pub use traits::{
    Buzzer, CardData, CardType, DisplayDevice, DoorActuator, KeypadDevice, KeypadInput,
    MAX_UID_LENGTH, MIN_UID_LENGTH, RfidDevice,
};
pub use types::{DeviceInfo, DoorPosition, ReaderInfo};

pub use manager::{
    DeviceType, PeripheralConfig, PeripheralEvent, PeripheralHandle, PeripheralManager,
};
