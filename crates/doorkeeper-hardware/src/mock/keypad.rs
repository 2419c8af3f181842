//! Channel-fed 4x4 keypad.
//!
//! Keys typed on a [`MockKeypadHandle`] come out of
//! [`KeypadDevice::read_input`] in the order they were pressed. The console
//! front end and the controller tests both drive the door through it.

use tokio::sync::mpsc;

use crate::{
    HardwareError, Result,
    traits::{KeypadDevice, KeypadInput},
    types::DeviceInfo,
};

const KEY_BUFFER: usize = 32;
const CHANNEL: &str = "Keypad input channel";

/// Keypad whose presses arrive from a [`MockKeypadHandle`].
///
/// ```
/// use doorkeeper_hardware::mock::MockKeypad;
/// use doorkeeper_hardware::traits::{KeypadDevice, KeypadInput};
///
/// # #[tokio::main]
/// # async fn main() -> doorkeeper_hardware::Result<()> {
/// let (mut keypad, keys) = MockKeypad::new();
///
/// keys.send_symbols("7*").await?;
///
/// assert_eq!(keypad.read_input().await?, KeypadInput::Digit(7));
/// assert!(keypad.read_input().await?.is_delete());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct MockKeypad {
    presses: mpsc::Receiver<KeypadInput>,
    label: String,
}

impl MockKeypad {
    pub fn new() -> (Self, MockKeypadHandle) {
        Self::labelled("Mock Keypad")
    }

    /// A keypad reporting `label` as its device name.
    pub fn labelled(label: &str) -> (Self, MockKeypadHandle) {
        let (tx, presses) = mpsc::channel(KEY_BUFFER);
        let keypad = Self {
            presses,
            label: label.to_string(),
        };
        (keypad, MockKeypadHandle { tx })
    }
}

impl KeypadDevice for MockKeypad {
    async fn read_input(&mut self) -> Result<KeypadInput> {
        self.presses
            .recv()
            .await
            .ok_or_else(|| HardwareError::disconnected(CHANNEL))
    }

    async fn get_info(&self) -> Result<DeviceInfo> {
        Ok(DeviceInfo::new(self.label.clone(), "Mock 4x4 Keypad").with_firmware_version("1.0.0"))
    }
}

/// Typing end of a [`MockKeypad`]. Clones share the same keypad.
#[derive(Debug, Clone)]
pub struct MockKeypadHandle {
    tx: mpsc::Sender<KeypadInput>,
}

impl MockKeypadHandle {
    /// Press one key.
    pub async fn press(&self, key: KeypadInput) -> Result<()> {
        self.tx
            .send(key)
            .await
            .map_err(|_| HardwareError::disconnected(CHANNEL))
    }

    /// Type a run of key symbols such as `"1234#"` or `"3"`.
    ///
    /// # Errors
    ///
    /// Fails on a symbol that is not on the keypad or once the keypad is
    /// dropped. Keys before the failing one have already been pressed.
    pub async fn send_symbols(&self, symbols: &str) -> Result<()> {
        for symbol in symbols.chars() {
            self.press(KeypadInput::from_symbol(symbol)?).await?;
        }
        Ok(())
    }

    /// Type `digits` and then `#`.
    pub async fn send_pin(&self, digits: &[u8]) -> Result<()> {
        for &d in digits {
            self.press(KeypadInput::digit(d)?).await?;
        }
        self.press(KeypadInput::Hash).await
    }
}
