//! Access control logic for the doorkeeper door controller.
//!
//! [`AccessController`] turns keypad and tag events into door cycles,
//! alarms and admin-menu edits of the credential store. The
//! [`StateMachine`] validates every screen change; the [`AlarmManager`]
//! keeps the alarm pulsing while the controller is busy elsewhere.
//!
//! # Example
//!
//! ```no_run
//! use doorkeeper_controller::{AccessController, ControllerDevices};
//! use doorkeeper_core::ControllerConfig;
//! use doorkeeper_hardware::devices::{AnyKeypadDevice, AnyRfidDevice};
//! use doorkeeper_hardware::mock::{MockBuzzer, MockDoor, MockKeypad, MockRfid, VirtualDisplay};
//! use doorkeeper_hardware::{PeripheralConfig, PeripheralManager};
//! use doorkeeper_network::{DispatchTiming, HttpTransport, LinkStatus, NotificationDispatcher};
//! use doorkeeper_storage::{AnyKvStore, MemoryKvStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ControllerConfig::default();
//!
//! let (keypad, _keys) = MockKeypad::new();
//! let (reader, _tags) = MockRfid::new();
//! let mut manager = PeripheralManager::new(PeripheralConfig::default());
//! manager.register_keypad(AnyKeypadDevice::Mock(keypad));
//! manager.register_rfid(AnyRfidDevice::Mock(reader));
//!
//! let link = LinkStatus::new();
//! let notifier = NotificationDispatcher::new(
//!     HttpTransport::from_config(&config.network)?,
//!     link.clone(),
//!     DispatchTiming::from(&config.network),
//! );
//!
//! let (display, _screen) = VirtualDisplay::lcd2004();
//! let (door, _door) = MockDoor::new();
//! let (buzzer, _buzzer) = MockBuzzer::new();
//!
//! let controller = AccessController::new(
//!     config,
//!     AnyKvStore::Memory(MemoryKvStore::new()),
//!     ControllerDevices { display, door, buzzer },
//!     notifier,
//!     link,
//!     manager.start(),
//! )?;
//! controller.run().await;
//! # Ok(())
//! # }
//! ```

pub mod alarm;
pub mod controller;
pub mod error;
pub mod screens;
pub mod state_machine;

pub use alarm::{AlarmManager, AlarmTick};
pub use controller::{AccessController, ControllerDevices, ScanDecision};
pub use error::{ControllerError, ControllerResult};
pub use state_machine::{
    AdminMenuState, ControllerState, StateMachine, StatePhase, StateTransition,
};
