//! Mock device implementations for testing and development.
//!
//! Each mock comes with a handle: input mocks take injected events through
//! it, output mocks expose what they were told to do.

pub mod buzzer;
pub mod display;
pub mod door;
pub mod keypad;
pub mod rfid;

pub use buzzer::{MockBuzzer, MockBuzzerHandle};
pub use display::{DisplayHandle, VirtualDisplay};
pub use door::{MockDoor, MockDoorHandle};
pub use keypad::{MockKeypad, MockKeypadHandle};
pub use rfid::{MockRfid, MockRfidHandle};
