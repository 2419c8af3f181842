//! Hardware device trait definitions.
//!
//! These traits are the contract between the access controller and its
//! collaborators: two input devices (keypad, credential reader) and three
//! output devices (character display, door actuator, buzzer). Mock and real
//! drivers implement the same traits, so the controller never knows which
//! one it is talking to.
//!
//! All traits use native `async fn` methods (Rust 1.90 + Edition 2024 RPITIT),
//! eliminating the need for the `async_trait` macro.

#![allow(async_fn_in_trait)]

use doorkeeper_core::Credential;

use crate::error::{HardwareError, Result};
use crate::types::{DeviceInfo, DoorPosition, ReaderInfo};

/// A single key press from the 4x4 matrix keypad.
///
/// The keypad carries digits `0-9`, four letters `A-D`, `*` and `#`.
/// `#` submits, `*` deletes the last character, and `C`/`D` leave the
/// admin menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeypadInput {
    /// Numeric digit (0-9).
    Digit(u8),

    /// Letter key (A-D).
    Letter(char),

    /// Star key (*), used as delete.
    Star,

    /// Hash key (#), used as submit.
    Hash,
}

impl KeypadInput {
    /// Create a digit input.
    ///
    /// # Errors
    ///
    /// Returns an error if the digit is greater than 9.
    ///
    /// # Examples
    ///
    /// ```
    /// use doorkeeper_hardware::traits::KeypadInput;
    ///
    /// let input = KeypadInput::digit(5).unwrap();
    /// assert_eq!(input.symbol(), '5');
    ///
    /// assert!(KeypadInput::digit(10).is_err());
    /// ```
    pub fn digit(d: u8) -> Result<Self> {
        if d > 9 {
            return Err(HardwareError::invalid_data(format!(
                "Digit must be 0-9, got {}",
                d
            )));
        }
        Ok(Self::Digit(d))
    }

    /// Parse a keypad symbol as printed on the key cap.
    ///
    /// Letters are accepted in either case.
    ///
    /// # Errors
    ///
    /// Returns an error for any character not on the keypad.
    ///
    /// # Examples
    ///
    /// ```
    /// use doorkeeper_hardware::traits::KeypadInput;
    ///
    /// assert_eq!(KeypadInput::from_symbol('#').unwrap(), KeypadInput::Hash);
    /// assert_eq!(KeypadInput::from_symbol('c').unwrap(), KeypadInput::Letter('C'));
    /// assert!(KeypadInput::from_symbol('E').is_err());
    /// ```
    pub fn from_symbol(symbol: char) -> Result<Self> {
        match symbol.to_ascii_uppercase() {
            c @ '0'..='9' => Ok(Self::Digit(c as u8 - b'0')),
            c @ 'A'..='D' => Ok(Self::Letter(c)),
            '*' => Ok(Self::Star),
            '#' => Ok(Self::Hash),
            other => Err(HardwareError::invalid_data(format!(
                "Unknown key symbol '{}'",
                other
            ))),
        }
    }

    /// The character printed on the key.
    pub fn symbol(&self) -> char {
        match self {
            Self::Digit(d) => char::from(b'0' + d),
            Self::Letter(c) => *c,
            Self::Star => '*',
            Self::Hash => '#',
        }
    }

    /// Character appended to an input buffer, if this key edits text.
    pub fn as_text(&self) -> Option<char> {
        match self {
            Self::Digit(_) | Self::Letter(_) => Some(self.symbol()),
            Self::Star | Self::Hash => None,
        }
    }

    /// Check if this input is a digit.
    pub fn is_digit(&self) -> bool {
        matches!(self, Self::Digit(_))
    }

    /// Get the digit value if this is a digit input.
    pub fn as_digit(&self) -> Option<u8> {
        match self {
            Self::Digit(d) => Some(*d),
            _ => None,
        }
    }

    /// `#` confirms the current buffer.
    pub fn is_submit(&self) -> bool {
        matches!(self, Self::Hash)
    }

    /// `*` removes the last buffered character.
    pub fn is_delete(&self) -> bool {
        matches!(self, Self::Star)
    }

    /// `C` or `D` leave the admin menu from any screen.
    pub fn is_menu_exit(&self) -> bool {
        matches!(self, Self::Letter('C' | 'D'))
    }
}

impl std::fmt::Display for KeypadInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Keypad device abstraction.
///
/// # Object Safety and Dynamic Dispatch
///
/// This trait is NOT object-safe because `async fn` methods return
/// `impl Future`. Use generic type parameters, or the enum wrapper from the
/// [`devices`](crate::devices) module where a concrete type is needed:
///
/// ```no_run
/// use doorkeeper_hardware::devices::AnyKeypadDevice;
/// use doorkeeper_hardware::traits::KeypadDevice;
/// use doorkeeper_hardware::mock::MockKeypad;
///
/// # async fn example() -> doorkeeper_hardware::Result<()> {
/// let (keypad, _handle) = MockKeypad::new();
/// let mut any_keypad = AnyKeypadDevice::Mock(keypad);
///
/// let input = any_keypad.read_input().await?;
/// # Ok(())
/// # }
/// ```
pub trait KeypadDevice: Send + Sync {
    /// Read the next key press.
    ///
    /// Waits asynchronously until a key is pressed; produces nothing while
    /// idle.
    ///
    /// # Errors
    ///
    /// Returns an error if the device is disconnected or a communication
    /// error occurs.
    async fn read_input(&mut self) -> Result<KeypadInput>;

    /// Get device information.
    async fn get_info(&self) -> Result<DeviceInfo>;
}

/// Card family reported by the reader.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CardType {
    /// Mifare Classic 1K (1024 bytes).
    MifareClassic1K,

    /// Mifare Ultralight (64 bytes).
    MifareUltralight,

    /// Unknown card type with raw SAK/ATQA bytes.
    Unknown(Vec<u8>),
}

impl CardType {
    /// Get a human-readable name for the card type.
    pub fn name(&self) -> &str {
        match self {
            Self::MifareClassic1K => "Mifare Classic 1K",
            Self::MifareUltralight => "Mifare Ultralight",
            Self::Unknown(_) => "Unknown",
        }
    }
}

/// Minimum UID length in bytes (per ISO 14443 specification).
pub const MIN_UID_LENGTH: usize = doorkeeper_core::constants::MIN_UID_LENGTH;

/// Maximum UID length in bytes (per ISO 14443 specification).
pub const MAX_UID_LENGTH: usize = doorkeeper_core::constants::MAX_UID_LENGTH;

/// A tag read by the credential reader.
#[derive(Debug, Clone)]
pub struct CardData {
    /// Tag unique identifier (4-10 bytes).
    pub uid: Vec<u8>,

    /// Card type identification.
    pub card_type: CardType,

    /// Timestamp when the card was read.
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl CardData {
    /// Create new card data with the current timestamp.
    ///
    /// # Errors
    ///
    /// Returns an error if the UID length is not within 4-10 bytes.
    ///
    /// # Examples
    ///
    /// ```
    /// use doorkeeper_hardware::traits::{CardData, CardType};
    ///
    /// let card = CardData::new(vec![0x04, 0xAB, 0xCD, 0xEF], CardType::MifareClassic1K).unwrap();
    /// assert_eq!(card.uid_hex(), "04ABCDEF");
    ///
    /// assert!(CardData::new(vec![0x01], CardType::MifareClassic1K).is_err());
    /// ```
    pub fn new(uid: Vec<u8>, card_type: CardType) -> Result<Self> {
        let uid_len = uid.len();
        if !(MIN_UID_LENGTH..=MAX_UID_LENGTH).contains(&uid_len) {
            return Err(HardwareError::invalid_data(format!(
                "Card UID length must be between {} and {} bytes, got {}",
                MIN_UID_LENGTH, MAX_UID_LENGTH, uid_len
            )));
        }

        Ok(Self {
            uid,
            card_type,
            timestamp: chrono::Utc::now(),
        })
    }

    /// Get the UID as an uppercase hexadecimal string.
    pub fn uid_hex(&self) -> String {
        self.uid.iter().map(|b| format!("{:02X}", b)).collect()
    }

    /// The normalized credential for this tag.
    ///
    /// # Errors
    ///
    /// Returns an error if the UID cannot form a credential.
    pub fn credential(&self) -> Result<Credential> {
        Credential::from_uid_bytes(&self.uid)
            .map_err(|e| HardwareError::invalid_data(e.to_string()))
    }
}

/// Credential reader abstraction (RFID/NFC).
///
/// Every successful [`read_card`](RfidDevice::read_card) must be followed by
/// [`halt`](RfidDevice::halt) before the next read, so the same tag is not
/// reported twice while it stays in the field.
pub trait RfidDevice: Send + Sync {
    /// Wait for a tag and return its data.
    ///
    /// # Errors
    ///
    /// Returns an error if the device is disconnected or the read fails.
    async fn read_card(&mut self) -> Result<CardData>;

    /// Acknowledge the last read and put the tag to sleep.
    async fn halt(&mut self) -> Result<()>;

    /// Query reader identity and version register.
    async fn get_reader_info(&self) -> Result<ReaderInfo>;
}

/// Character display (HD44780-style LCD).
pub trait DisplayDevice: Send + Sync {
    /// Blank every cell and home the cursor.
    async fn clear(&mut self) -> Result<()>;

    /// Move the cursor to `column`, `row` (0-based).
    ///
    /// # Errors
    ///
    /// Returns an error if the position is outside the display.
    async fn set_cursor(&mut self, column: usize, row: usize) -> Result<()>;

    /// Print text starting at the cursor. Text past the last column is
    /// dropped.
    async fn print(&mut self, text: &str) -> Result<()>;

    /// Columns and rows of the display.
    fn dimensions(&self) -> (usize, usize);

    /// Move the cursor and print.
    async fn print_at(&mut self, column: usize, row: usize, text: &str) -> Result<()> {
        self.set_cursor(column, row).await?;
        self.print(text).await
    }
}

/// Door latch actuator (hobby servo).
pub trait DoorActuator: Send + Sync {
    /// Drive the actuator to `position`. Returns once the command is issued;
    /// the caller decides how long to hold it.
    async fn drive(&mut self, position: DoorPosition) -> Result<()>;
}

/// Piezo buzzer driven by PWM.
pub trait Buzzer: Send + Sync {
    /// Set the PWM duty cycle; `0` is silent.
    async fn set_duty(&mut self, duty: u8) -> Result<()>;
}
