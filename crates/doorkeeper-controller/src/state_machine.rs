//! Access controller state machine.
//!
//! Tracks which screen the controller is on and validates every move
//! between screens against a fixed transition table.
//!
//! # States
//!
//! - `MainPrompt`: waiting for a password or a tag, holding the keypad buffer
//! - `DoorCycle`: running the open/dwell/close actuator sequence
//! - `WrongAttempt`: showing the "LOCK!!" flash
//! - `AlarmActive`: alarm sounding; the keypad buffer stays usable
//! - `AdminMenu`: admin root menu or one of its sub-screens
//!
//! # Valid Transitions
//!
//! - MainPrompt → DoorCycle / WrongAttempt / AlarmActive
//! - DoorCycle → MainPrompt / AdminMenu / AlarmActive
//! - WrongAttempt → MainPrompt / AlarmActive
//! - AlarmActive → MainPrompt / DoorCycle / WrongAttempt / AlarmActive
//! - AdminMenu → AdminMenu / MainPrompt
//!
//! `DoorCycle → AlarmActive` and `WrongAttempt → AlarmActive` return to the
//! alarm screen when the alarm is still running after the sequence.
//!
//! # Examples
//!
//! ```
//! use doorkeeper_controller::{ControllerState, StateMachine, StatePhase};
//!
//! let mut machine = StateMachine::new();
//! assert_eq!(machine.phase(), StatePhase::MainPrompt);
//!
//! machine.transition_to(ControllerState::DoorCycle).unwrap();
//! assert!(machine.transition_to(ControllerState::WrongAttempt).is_err());
//! ```

use std::collections::VecDeque;
use std::fmt;

use doorkeeper_core::{Error, Result};

/// Maximum number of state transitions to keep in history.
const MAX_HISTORY_SIZE: usize = 100;

/// Sub-screen of the admin menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminMenuState {
    /// "ADMIN MODE" with the option list.
    Root,

    /// Collecting a new password.
    ChangePassword {
        /// Keys entered so far.
        draft: String,
    },

    /// Waiting for the tag to remove.
    DeleteCard,

    /// Waiting for the tag to add.
    AddCard,
}

/// Full controller state, including the data each state owns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerState {
    /// Idle prompt.
    MainPrompt {
        /// Password characters typed so far.
        input: String,
    },

    /// Door sequence in progress.
    DoorCycle,

    /// Rejection flash in progress.
    WrongAttempt,

    /// Alarm sounding.
    AlarmActive {
        /// Password characters typed so far.
        input: String,
    },

    /// Admin menu.
    AdminMenu(AdminMenuState),
}

impl ControllerState {
    /// Empty main prompt, the initial and recovery state.
    pub fn idle() -> Self {
        Self::MainPrompt {
            input: String::new(),
        }
    }

    /// Data-free discriminant used for transition checks and history.
    pub fn phase(&self) -> StatePhase {
        match self {
            Self::MainPrompt { .. } => StatePhase::MainPrompt,
            Self::DoorCycle => StatePhase::DoorCycle,
            Self::WrongAttempt => StatePhase::WrongAttempt,
            Self::AlarmActive { .. } => StatePhase::AlarmActive,
            Self::AdminMenu(_) => StatePhase::AdminMenu,
        }
    }

    /// Keypad buffer, for states that have one.
    pub fn input(&self) -> Option<&str> {
        match self {
            Self::MainPrompt { input } | Self::AlarmActive { input } => Some(input),
            Self::AdminMenu(AdminMenuState::ChangePassword { draft }) => Some(draft),
            _ => None,
        }
    }
}

/// Phase of the controller without per-state data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatePhase {
    /// Idle prompt.
    MainPrompt,

    /// Door sequence in progress.
    DoorCycle,

    /// Rejection flash in progress.
    WrongAttempt,

    /// Alarm sounding.
    AlarmActive,

    /// Admin menu.
    AdminMenu,
}

impl fmt::Display for StatePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phase_str = match self {
            StatePhase::MainPrompt => "MainPrompt",
            StatePhase::DoorCycle => "DoorCycle",
            StatePhase::WrongAttempt => "WrongAttempt",
            StatePhase::AlarmActive => "AlarmActive",
            StatePhase::AdminMenu => "AdminMenu",
        };
        write!(f, "{}", phase_str)
    }
}

impl StatePhase {
    /// Check if a transition to `target` is allowed from this phase.
    ///
    /// # Examples
    ///
    /// ```
    /// use doorkeeper_controller::StatePhase;
    ///
    /// assert!(StatePhase::MainPrompt.can_transition_to(&StatePhase::DoorCycle));
    /// assert!(!StatePhase::MainPrompt.can_transition_to(&StatePhase::AdminMenu));
    /// ```
    pub fn can_transition_to(&self, target: &StatePhase) -> bool {
        matches!(
            (self, target),
            (
                StatePhase::MainPrompt,
                StatePhase::DoorCycle | StatePhase::WrongAttempt | StatePhase::AlarmActive
            ) | (
                StatePhase::DoorCycle,
                StatePhase::MainPrompt | StatePhase::AdminMenu | StatePhase::AlarmActive
            ) | (
                StatePhase::WrongAttempt,
                StatePhase::MainPrompt | StatePhase::AlarmActive
            ) | (
                StatePhase::AlarmActive,
                StatePhase::MainPrompt
                    | StatePhase::DoorCycle
                    | StatePhase::WrongAttempt
                    | StatePhase::AlarmActive
            ) | (
                StatePhase::AdminMenu,
                StatePhase::AdminMenu | StatePhase::MainPrompt
            )
        )
    }
}

/// A single recorded state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateTransition {
    pub from: StatePhase,
    pub to: StatePhase,
}

/// State machine for the access controller.
///
/// Not thread-safe; the controller owns it and drives it from a single loop.
///
/// # Examples
///
/// ```
/// use doorkeeper_controller::{ControllerState, StateMachine};
///
/// let mut machine = StateMachine::new();
/// machine.input_mut().unwrap().push('1');
/// machine.transition_to(ControllerState::WrongAttempt).unwrap();
/// machine.transition_to(ControllerState::idle()).unwrap();
///
/// assert_eq!(machine.history().len(), 2);
/// ```
#[derive(Debug)]
pub struct StateMachine {
    /// Current state, with its data.
    current_state: ControllerState,

    /// History of transitions (limited to MAX_HISTORY_SIZE).
    history: VecDeque<StateTransition>,
}

impl StateMachine {
    /// Create a machine on an empty main prompt.
    pub fn new() -> Self {
        Self {
            current_state: ControllerState::idle(),
            history: VecDeque::with_capacity(MAX_HISTORY_SIZE),
        }
    }

    /// Current state.
    pub fn current_state(&self) -> &ControllerState {
        &self.current_state
    }

    /// Current phase.
    pub fn phase(&self) -> StatePhase {
        self.current_state.phase()
    }

    /// Keypad buffer of the current state, editable in place.
    ///
    /// Edits do not count as transitions and are not recorded.
    pub fn input_mut(&mut self) -> Option<&mut String> {
        match &mut self.current_state {
            ControllerState::MainPrompt { input } | ControllerState::AlarmActive { input } => {
                Some(input)
            }
            ControllerState::AdminMenu(AdminMenuState::ChangePassword { draft }) => Some(draft),
            _ => None,
        }
    }

    /// Recorded transitions, oldest first.
    pub fn history(&self) -> &VecDeque<StateTransition> {
        &self.history
    }

    /// The most recent `count` transitions, oldest first.
    pub fn last_transitions(&self, count: usize) -> Vec<StateTransition> {
        self.history
            .iter()
            .rev()
            .take(count)
            .rev()
            .copied()
            .collect()
    }

    /// Move to `new_state`, validating the phase change.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidStateTransition` if the current phase may not
    /// move to the phase of `new_state`. The machine is left unchanged.
    pub fn transition_to(&mut self, new_state: ControllerState) -> Result<StateTransition> {
        let from = self.phase();
        let to = new_state.phase();

        if !from.can_transition_to(&to) {
            return Err(Error::InvalidStateTransition {
                from: from.to_string(),
                to: to.to_string(),
            });
        }

        let transition = StateTransition { from, to };
        self.perform_state_change(new_state, transition);

        Ok(transition)
    }

    /// Force the machine back to an empty main prompt.
    ///
    /// Used for recovery; always succeeds and is recorded in history.
    pub fn reset(&mut self) -> StateTransition {
        let transition = StateTransition {
            from: self.phase(),
            to: StatePhase::MainPrompt,
        };
        self.perform_state_change(ControllerState::idle(), transition);
        transition
    }

    fn perform_state_change(&mut self, new_state: ControllerState, transition: StateTransition) {
        self.current_state = new_state;
        self.add_to_history(transition);
    }

    fn add_to_history(&mut self, transition: StateTransition) {
        self.history.push_back(transition);
        if self.history.len() > MAX_HISTORY_SIZE {
            self.history.pop_front();
        }
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}
