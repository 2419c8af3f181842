//! Compiled-in defaults for the doorkeeper controller.
//!
//! Every value here is only a default: the runtime source of truth is
//! [`ControllerConfig`](crate::config::ControllerConfig), which starts from
//! these constants and may override any of them from a configuration file.
//!
//! # Usage
//!
//! ```
//! use doorkeeper_core::constants::*;
//! use std::time::Duration;
//!
//! assert_eq!(DEFAULT_PASSWORD, "1234");
//! assert_eq!(MAX_FAILED_ATTEMPTS, 3);
//!
//! let alarm = Duration::from_millis(ALARM_DURATION_MS);
//! assert_eq!(alarm.as_secs(), 15);
//! ```

// ============================================================================
// Credentials
// ============================================================================

/// Password stored on first run when the store has none.
pub const DEFAULT_PASSWORD: &str = "1234";

/// Maximum number of guest credentials in the allowed set.
pub const MAX_CARDS: usize = 60;

/// Maximum number of characters accepted into any keypad buffer.
pub const MAX_INPUT_LENGTH: usize = 16;

/// Consecutive wrong passwords that trip the alarm.
pub const MAX_FAILED_ATTEMPTS: u32 = 3;

/// Raw UID of the factory admin tag.
pub const DEFAULT_ADMIN_UID: [u8; 4] = [0xAC, 0x64, 0x91, 0x05];

/// Minimum UID length in bytes (ISO 14443).
pub const MIN_UID_LENGTH: usize = 4;

/// Maximum UID length in bytes (ISO 14443).
pub const MAX_UID_LENGTH: usize = 10;

// ============================================================================
// Timing (milliseconds)
// ============================================================================

/// How long the alarm sounds unless an admin silences it.
pub const ALARM_DURATION_MS: u64 = 15_000;

/// Half-period of the pulsing alarm tone.
pub const ALARM_TOGGLE_PERIOD_MS: u64 = 300;

/// Inactivity bound for every admin menu wait.
pub const ADMIN_TIMEOUT_MS: u64 = 15_000;

/// Time the door actuator is driven before returning to neutral.
pub const DOOR_PULSE_MS: u64 = 800;

/// How long the door stays open between the two pulses.
pub const DOOR_OPEN_DWELL_MS: u64 = 3_000;

/// Granularity of bounded waits; background work is serviced this often.
pub const POLL_INTERVAL_MS: u64 = 30;

/// Period of the idle service tick (alarm pulse, link status redraw).
pub const SERVICE_INTERVAL_MS: u64 = 50;

// ============================================================================
// Network
// ============================================================================

/// Longest a dispatch waits for the link to come up before trying anyway.
pub const LINK_CONNECT_WAIT_MS: u64 = 3_000;

/// Poll interval while waiting for the link.
pub const LINK_POLL_INTERVAL_MS: u64 = 200;

/// Period between background connectivity probes.
pub const RECONNECT_INTERVAL_MS: u64 = 3_000;

/// TCP connect timeout for a notification request.
pub const NOTIFY_CONNECT_TIMEOUT_MS: u64 = 1_500;

/// Overall timeout for a notification request.
pub const NOTIFY_REQUEST_TIMEOUT_MS: u64 = 5_000;

/// Maximum length of the identifier sent with a notification.
///
/// # Examples
///
/// ```
/// use doorkeeper_core::constants::NOTIFY_ID_MAX_LEN;
/// use doorkeeper_core::Credential;
///
/// let long = Credential::new(&"AB".repeat(10)).unwrap();
/// assert!(long.truncated(NOTIFY_ID_MAX_LEN).len() <= NOTIFY_ID_MAX_LEN);
/// ```
pub const NOTIFY_ID_MAX_LEN: usize = 32;

/// Default observer base URL.
pub const DEFAULT_PEER_URL: &str = "http://192.168.212.57";

/// Path of the notification endpoint on the observer.
pub const NOTIFY_PATH: &str = "/notify";

/// Status token for an allowed scan.
pub const STATUS_OK: &str = "ok";

/// Status token for a denied scan.
pub const STATUS_BAD: &str = "bad";

// ============================================================================
// Persistent store layout
// ============================================================================

/// Namespace holding all controller keys.
pub const STORE_NAMESPACE: &str = "rfid_store";

/// Key of the password string.
pub const KEY_PASSWORD: &str = "pw";

/// Key of the allowed-credential count.
pub const KEY_CARD_COUNT: &str = "n";

/// Prefix of the per-index credential keys (`uid0`, `uid1`, ...).
pub const KEY_CARD_PREFIX: &str = "uid";

/// Default SQLite database file.
pub const DEFAULT_DATABASE_PATH: &str = "doorkeeper.db";

// ============================================================================
// Display
// ============================================================================

/// Character columns of the LCD.
pub const LCD_COLUMNS: usize = 20;

/// Rows of the LCD.
pub const LCD_ROWS: usize = 4;

/// Row reserved for the network status line.
pub const STATUS_ROW: usize = 3;

/// Placeholder drawn for each entered password character.
pub const MASK_CHAR: char = '*';

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_row_fits_display() {
        assert!(STATUS_ROW < LCD_ROWS);
    }

    #[test]
    fn test_default_password_fits_buffer() {
        assert!(!DEFAULT_PASSWORD.is_empty());
        assert!(DEFAULT_PASSWORD.len() <= MAX_INPUT_LENGTH);
    }

    #[test]
    fn test_admin_uid_length_valid() {
        assert!((MIN_UID_LENGTH..=MAX_UID_LENGTH).contains(&DEFAULT_ADMIN_UID.len()));
    }

    #[test]
    fn test_alarm_period_divides_duration() {
        assert_eq!(ALARM_DURATION_MS % ALARM_TOGGLE_PERIOD_MS, 0);
    }
}
