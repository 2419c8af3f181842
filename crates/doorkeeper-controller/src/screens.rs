//! Screen text, beeps and hold times.

use std::time::Duration;

use doorkeeper_core::constants::MASK_CHAR;

/// Main prompt, first line.
pub const PROMPT_TITLE: &str = "Scan tag / Enter pw";
/// Main prompt, key help.
pub const PROMPT_HELP: &str = "# = Enter * = Del";
/// Status line when the peer is reachable.
pub const NET_CONNECTED: &str = "Net: Connected";
/// Status line when the peer is not reachable.
pub const NET_DISCONNECTED: &str = "Net: Disconnected";

pub const WELCOME_ADMIN: &str = "Welcome Admin!!";
pub const WELCOME_GUEST: &str = "Welcome !!";
pub const CARD_PREFIX: &str = "Card:";
pub const OPENING: &str = "Opening door...";
pub const CLOSING: &str = "Closing door...";
pub const LOCKED: &str = "LOCK!!";
pub const ALARM_STOPPED: &str = "Alarm stopped";

pub const ADMIN_TITLE: &str = "ADMIN MODE";
pub const ADMIN_OPTIONS: &str = "1:CHG 2:DEL 3:ADD";
pub const ADMIN_EXIT_HINT: &str = "C:Exit";
pub const ADMIN_EXIT: &str = "Exit Admin";
pub const ADMIN_TIMEOUT: &str = "Admin timeout";

pub const CHANGE_TITLE: &str = "CHANGE PASS";
pub const CHANGE_PROMPT: &str = "Enter new pass:";
pub const SAVED: &str = "SAVED";
pub const NO_INPUT: &str = "No input";
pub const NOT_SAVED: &str = "Not saved";

pub const DELETE_PROMPT: &str = "DEL TAG: Scan";
pub const DELETED: &str = "Deleted:";
pub const NOT_FOUND: &str = "Not found";
pub const ADD_PROMPT: &str = "ADD TAG: Scan";
pub const ADDED: &str = "Added:";
pub const EXISTS_OR_FULL: &str = "Exists/Full";
pub const NO_CARD: &str = "No card";

/// Keypad buffer row on the main prompt and the password-change screen.
pub const INPUT_ROW: usize = 2;

/// One buzzer sound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Beep {
    /// PWM duty while sounding.
    pub duty: u8,
    /// How long it sounds.
    pub duration: Duration,
}

impl Beep {
    const fn new(duty: u8, ms: u64) -> Self {
        Self {
            duty,
            duration: Duration::from_millis(ms),
        }
    }
}

pub const BEEP_ADMIN: Beep = Beep::new(200, 200);
pub const BEEP_GUEST: Beep = Beep::new(120, 150);
pub const BEEP_LOCK: Beep = Beep::new(180, 200);
pub const BEEP_SAVED: Beep = Beep::new(160, 150);
pub const BEEP_SUCCESS: Beep = Beep::new(160, 120);
pub const BEEP_FAILURE: Beep = Beep::new(60, 200);

pub const LOCK_GAP: Duration = Duration::from_millis(150);
pub const LOCK_TAIL: Duration = Duration::from_millis(400);
pub const EXIT_HOLD: Duration = Duration::from_millis(300);
pub const ADMIN_TIMEOUT_HOLD: Duration = Duration::from_millis(600);
pub const NO_INPUT_HOLD: Duration = Duration::from_millis(600);
pub const SAVED_HOLD: Duration = Duration::from_millis(800);
pub const RESULT_HOLD: Duration = Duration::from_millis(900);
pub const NO_CARD_HOLD: Duration = Duration::from_millis(700);
pub const ALARM_STOPPED_HOLD: Duration = Duration::from_millis(700);

/// One mask character per entered character.
///
/// ```
/// use doorkeeper_controller::screens::masked;
///
/// assert_eq!(masked("1234"), "****");
/// assert_eq!(masked(""), "");
/// ```
pub fn masked(input: &str) -> String {
    std::iter::repeat_n(MASK_CHAR, input.chars().count()).collect()
}

/// Status line text.
pub fn net_status(connected: bool) -> &'static str {
    if connected {
        NET_CONNECTED
    } else {
        NET_DISCONNECTED
    }
}
