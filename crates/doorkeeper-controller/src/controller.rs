//! The access controller event loop.
//!
//! One loop consumes the merged keypad/reader event stream and runs every
//! state transition in order. Door cycles, flash messages and admin
//! sub-screens block that loop, but every wait inside them goes through
//! [`AccessController::hold`] or the admin event wait, which keep the alarm
//! pulsing and the status line current between short sleeps. Tags scanned
//! while the admin menu waits for a key are held back and handled once the
//! menu has closed.
//!
//! ```text
//! PeripheralHandle ──events──► AccessController ──dispatch──► AccessNotifier
//!                                  │   ▲
//!            display / door / buzzer   └── LinkStatus (read only)
//!                                  │
//!                                  ▼
//!                           CredentialStore
//! ```

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use doorkeeper_core::constants::{LCD_ROWS, STATUS_ROW};
use doorkeeper_core::{ControllerConfig, Credential};
use doorkeeper_hardware::text::pad_line;
use doorkeeper_hardware::{
    Buzzer, CardData, DisplayDevice, DoorActuator, DoorPosition, KeypadInput, PeripheralEvent,
    PeripheralHandle,
};
use doorkeeper_network::{AccessNotifier, LinkStatus, PendingNotification};
use doorkeeper_storage::{AnyKvStore, CredentialStore};

use crate::alarm::{ALARM_DUTY, AlarmManager, AlarmTick};
use crate::error::ControllerResult;
use crate::screens::{self, Beep, INPUT_ROW};
use crate::state_machine::{AdminMenuState, ControllerState, StateMachine, StatePhase};

/// Output devices the controller drives.
#[derive(Debug)]
pub struct ControllerDevices<D, A, B> {
    /// Character display.
    pub display: D,

    /// Door actuator.
    pub door: A,

    /// PWM buzzer.
    pub buzzer: B,
}

/// How a scanned tag was classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanDecision {
    /// The admin tag.
    Admin,

    /// A tag in the allowed set.
    Allowed,

    /// Anything else.
    Denied,
}

impl ScanDecision {
    /// Whether the scan counts as allowed when reported.
    pub fn is_allowed(&self) -> bool {
        !matches!(self, ScanDecision::Denied)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CardAction {
    Add,
    Remove,
}

/// Door access controller.
///
/// Owns the output devices, the credential store and the state machine.
/// Inputs arrive through a [`PeripheralHandle`]; scan outcomes leave
/// through an [`AccessNotifier`].
pub struct AccessController<D, A, B, N>
where
    D: DisplayDevice,
    A: DoorActuator,
    B: Buzzer,
    N: AccessNotifier,
{
    config: ControllerConfig,
    store: CredentialStore,
    display: D,
    door: A,
    buzzer: B,
    notifier: N,
    link: LinkStatus,
    inputs: PeripheralHandle,
    inputs_closed: bool,
    deferred_scans: VecDeque<CardData>,
    machine: StateMachine,
    alarm: AlarmManager,
    failed_attempts: u32,
    password: String,
    prompt_visible: bool,
    shown_link: Option<bool>,
    beeping: bool,
}

impl<D, A, B, N> AccessController<D, A, B, N>
where
    D: DisplayDevice,
    A: DoorActuator,
    B: Buzzer,
    N: AccessNotifier,
{
    /// Build a controller.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::Config` if the configuration does not
    /// validate or the admin UID is malformed.
    pub fn new(
        config: ControllerConfig,
        kv: AnyKvStore,
        devices: ControllerDevices<D, A, B>,
        notifier: N,
        link: LinkStatus,
        inputs: PeripheralHandle,
    ) -> ControllerResult<Self> {
        config.validate()?;
        let store = CredentialStore::from_config(kv, &config)?;
        let alarm = AlarmManager::new(
            config.timing.alarm_duration(),
            config.timing.alarm_toggle_period(),
        );

        Ok(Self {
            store,
            display: devices.display,
            door: devices.door,
            buzzer: devices.buzzer,
            notifier,
            link,
            inputs,
            inputs_closed: false,
            deferred_scans: VecDeque::new(),
            machine: StateMachine::new(),
            alarm,
            failed_attempts: 0,
            password: config.default_password.clone(),
            prompt_visible: false,
            shown_link: None,
            beeping: false,
            config,
        })
    }

    /// Current state.
    pub fn state(&self) -> &ControllerState {
        self.machine.current_state()
    }

    /// The state machine, with its transition history.
    pub fn machine(&self) -> &StateMachine {
        &self.machine
    }

    /// Consecutive wrong passwords since the last reset.
    pub fn failed_attempts(&self) -> u32 {
        self.failed_attempts
    }

    /// Whether the alarm is sounding.
    pub fn alarm_active(&self) -> bool {
        self.alarm.is_active()
    }

    /// The credential store.
    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// Put the outputs at rest, load the password and draw the prompt.
    pub async fn start(&mut self) {
        self.drive(DoorPosition::Neutral).await;
        self.set_buzzer(0).await;
        self.password = self.store.load_password().await;
        self.draw_prompt().await;
        info!(
            max_cards = self.store.max_cards(),
            "Access controller started"
        );
    }

    /// Run until the input stream closes, then shut the peripherals down.
    pub async fn run(mut self) {
        self.start().await;
        while self.step().await {}

        info!("Input stream closed, stopping controller");
        self.alarm.stop();
        self.set_buzzer(0).await;
        if let Err(e) = self.inputs.shutdown().await {
            warn!(error = %e, "Peripheral shutdown reported an error");
        }
    }

    /// Run for about `duration`, then return.
    ///
    /// A sequence that starts before the deadline runs to completion.
    /// Returns `false` if the input stream closed.
    pub async fn run_for(&mut self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        while Instant::now() < deadline {
            if !self.step().await {
                return false;
            }
        }
        true
    }

    /// Handle at most one event, then service the alarm and status line.
    ///
    /// Held-back scans go first. Waits no longer than one service interval.
    /// Returns `false` once the input stream has closed.
    pub async fn step(&mut self) -> bool {
        if let Some(card) = self.deferred_scans.pop_front() {
            self.handle_card(card).await;
            self.service().await;
            return true;
        }
        if self.inputs_closed {
            return false;
        }

        let tick = self.config.timing.service_interval();
        tokio::select! {
            event = self.inputs.recv() => match event {
                Some(event) => self.handle_event(event).await,
                None => self.inputs_closed = true,
            },
            _ = tokio::time::sleep(tick) => {}
        }

        self.service().await;
        !self.inputs_closed
    }

    /// Process one event from the main prompt.
    pub async fn handle_event(&mut self, event: PeripheralEvent) {
        match event {
            PeripheralEvent::KeypadInput(key) => self.handle_key(key).await,
            PeripheralEvent::CardRead(card) => self.handle_card(card).await,
            other => log_unhandled(&other),
        }
    }

    async fn handle_key(&mut self, key: KeypadInput) {
        let max_len = self.config.max_input_length;
        let Some(input) = self.machine.input_mut() else {
            debug!(phase = %self.machine.phase(), "Key ignored outside prompt");
            return;
        };

        if key.is_submit() {
            let attempt = std::mem::take(input);
            self.submit_password(attempt).await;
        } else if key.is_delete() {
            input.pop();
            self.draw_input_row().await;
        } else if let Some(ch) = key.as_text() {
            if input.chars().count() < max_len {
                input.push(ch);
            }
            self.draw_input_row().await;
        }
    }

    async fn submit_password(&mut self, attempt: String) {
        if attempt == self.password {
            info!("Password accepted");
            self.failed_attempts = 0;
            self.enter(ControllerState::DoorCycle);
            self.welcome(screens::WELCOME_GUEST, "", screens::BEEP_GUEST)
                .await;
            self.door_cycle().await;
            self.return_to_prompt(String::new()).await;
            return;
        }

        self.failed_attempts += 1;
        warn!(
            attempts = self.failed_attempts,
            max = self.config.max_failed_attempts,
            "Wrong password"
        );

        if self.failed_attempts >= self.config.max_failed_attempts {
            self.failed_attempts = 0;
            self.alarm.start(Instant::now());
            self.enter(ControllerState::AlarmActive {
                input: String::new(),
            });
            self.draw_prompt().await;
            self.service().await;
        } else {
            self.enter(ControllerState::WrongAttempt);
            self.lock_flash().await;
            self.return_to_prompt(String::new()).await;
        }
    }

    async fn handle_card(&mut self, card: CardData) {
        let Some(credential) = scanned_credential(&card) else {
            return;
        };
        let decision = self.report_scan(&credential).await;
        let input = self
            .machine
            .input_mut()
            .map(std::mem::take)
            .unwrap_or_default();

        match decision {
            ScanDecision::Admin if self.alarm.is_active() => {
                self.alarm.stop();
                self.set_buzzer(0).await;
                info!("Alarm stopped by admin");
                self.enter(ControllerState::MainPrompt { input });
                self.flash(
                    &[screens::ALARM_STOPPED],
                    Some(screens::BEEP_SUCCESS),
                    screens::ALARM_STOPPED_HOLD,
                )
                .await;
                self.draw_prompt().await;
            }
            ScanDecision::Admin => {
                self.failed_attempts = 0;
                self.enter(ControllerState::DoorCycle);
                self.welcome(screens::WELCOME_ADMIN, "", screens::BEEP_ADMIN)
                    .await;
                self.door_cycle().await;
                self.admin_menu().await;
                self.password = self.store.load_password().await;
                info!("Admin menu closed");
                self.return_to_prompt(input).await;
            }
            ScanDecision::Allowed => {
                self.failed_attempts = 0;
                self.enter(ControllerState::DoorCycle);
                let who = format!("{}{}", screens::CARD_PREFIX, credential);
                self.welcome(screens::WELCOME_GUEST, &who, screens::BEEP_GUEST)
                    .await;
                self.door_cycle().await;
                self.return_to_prompt(input).await;
            }
            ScanDecision::Denied => {
                self.enter(ControllerState::WrongAttempt);
                self.lock_flash().await;
                self.return_to_prompt(input).await;
            }
        }
    }

    /// Classify a scan and hand the outcome to the notifier.
    async fn report_scan(&self, credential: &Credential) -> ScanDecision {
        let decision = if self.store.is_admin(credential) {
            ScanDecision::Admin
        } else if self.store.is_allowed(credential).await {
            ScanDecision::Allowed
        } else {
            ScanDecision::Denied
        };

        info!(uid = %credential, decision = ?decision, "Card scanned");

        let notification = if decision.is_allowed() {
            PendingNotification::allowed(credential.clone())
        } else {
            PendingNotification::denied(Some(credential.clone()))
        };
        self.notifier.dispatch(notification);

        decision
    }

    async fn admin_menu(&mut self) {
        self.enter(ControllerState::AdminMenu(AdminMenuState::Root));
        info!("Admin menu opened");
        self.show(&[
            screens::ADMIN_TITLE,
            screens::ADMIN_OPTIONS,
            screens::ADMIN_EXIT_HINT,
        ])
        .await;

        let deadline = Instant::now() + self.config.timing.admin_timeout();
        loop {
            let Some(event) = self.next_event(deadline).await else {
                info!("Admin menu timed out");
                self.flash(&[screens::ADMIN_TIMEOUT], None, screens::ADMIN_TIMEOUT_HOLD)
                    .await;
                return;
            };

            match event {
                PeripheralEvent::KeypadInput(key) if key.is_menu_exit() => {
                    return self.exit_admin().await;
                }
                PeripheralEvent::KeypadInput(key) => match key.as_digit() {
                    Some(1) => return self.change_password().await,
                    Some(2) => return self.edit_cards(CardAction::Remove).await,
                    Some(3) => return self.edit_cards(CardAction::Add).await,
                    _ => debug!(key = %key, "Admin menu key ignored"),
                },
                PeripheralEvent::CardRead(card) => self.defer_scan(card),
                other => log_unhandled(&other),
            }
        }
    }

    /// Keep a scan that arrived mid-menu for the main loop.
    fn defer_scan(&mut self, card: CardData) {
        debug!(uid = %card.uid_hex(), "Scan held until admin menu closes");
        self.deferred_scans.push_back(card);
    }

    async fn exit_admin(&mut self) {
        self.flash(&[screens::ADMIN_EXIT], None, screens::EXIT_HOLD)
            .await;
    }

    async fn change_password(&mut self) {
        self.enter(ControllerState::AdminMenu(AdminMenuState::ChangePassword {
            draft: String::new(),
        }));
        self.show(&[screens::CHANGE_TITLE, screens::CHANGE_PROMPT])
            .await;

        let timeout = self.config.timing.admin_timeout();
        let max_len = self.config.max_input_length;
        let mut deadline = Instant::now() + timeout;

        loop {
            let Some(event) = self.next_event(deadline).await else {
                let draft = self
                    .machine
                    .input_mut()
                    .map(std::mem::take)
                    .unwrap_or_default();
                if draft.is_empty() {
                    self.flash(&[screens::NO_INPUT], None, screens::NO_INPUT_HOLD)
                        .await;
                } else {
                    info!("Password change timed out, draft discarded");
                    self.flash(&[screens::NOT_SAVED], None, screens::NO_INPUT_HOLD)
                        .await;
                }
                return;
            };

            let key = match event {
                PeripheralEvent::KeypadInput(key) => key,
                PeripheralEvent::CardRead(card) => {
                    self.defer_scan(card);
                    continue;
                }
                other => {
                    log_unhandled(&other);
                    continue;
                }
            };

            deadline = Instant::now() + timeout;
            if key.is_menu_exit() {
                return self.exit_admin().await;
            }

            let Some(draft) = self.machine.input_mut() else {
                return;
            };
            if key.is_submit() {
                if draft.is_empty() {
                    continue;
                }
                let draft = std::mem::take(draft);
                return self.commit_password(draft).await;
            } else if key.is_delete() {
                draft.pop();
            } else if let Some(ch) = key.as_text()
                && draft.chars().count() < max_len
            {
                draft.push(ch);
            }
            self.draw_input_row().await;
        }
    }

    async fn commit_password(&mut self, password: String) {
        match self.store.change_password(&password).await {
            Ok(true) => {
                self.password = password;
                self.flash(
                    &[screens::SAVED],
                    Some(screens::BEEP_SAVED),
                    screens::SAVED_HOLD,
                )
                .await;
            }
            Ok(false) => {
                self.flash(&[screens::NO_INPUT], None, screens::NO_INPUT_HOLD)
                    .await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to persist new password");
                self.flash(
                    &[screens::NOT_SAVED],
                    Some(screens::BEEP_FAILURE),
                    screens::NO_INPUT_HOLD,
                )
                .await;
            }
        }
    }

    async fn edit_cards(&mut self, action: CardAction) {
        let (sub_state, prompt) = match action {
            CardAction::Add => (AdminMenuState::AddCard, screens::ADD_PROMPT),
            CardAction::Remove => (AdminMenuState::DeleteCard, screens::DELETE_PROMPT),
        };
        self.enter(ControllerState::AdminMenu(sub_state));
        self.show(&[prompt]).await;

        let deadline = Instant::now() + self.config.timing.admin_timeout();
        loop {
            let Some(event) = self.next_event(deadline).await else {
                self.flash(&[screens::NO_CARD], None, screens::NO_CARD_HOLD)
                    .await;
                return;
            };

            match event {
                PeripheralEvent::KeypadInput(key) if key.is_menu_exit() => {
                    return self.exit_admin().await;
                }
                PeripheralEvent::KeypadInput(_) => {}
                PeripheralEvent::CardRead(card) => {
                    let Some(credential) = scanned_credential(&card) else {
                        continue;
                    };
                    self.report_scan(&credential).await;
                    return self.apply_card(action, credential).await;
                }
                other => log_unhandled(&other),
            }
        }
    }

    async fn apply_card(&mut self, action: CardAction, credential: Credential) {
        let result = match action {
            CardAction::Add => self.store.add_card(&credential).await,
            CardAction::Remove => self.store.remove_card(&credential).await,
        };
        let changed = result.unwrap_or_else(|e| {
            warn!(uid = %credential, action = ?action, error = %e, "Card store update failed");
            false
        });

        let uid = credential.as_str();
        match (action, changed) {
            (CardAction::Add, true) => {
                self.show(&[screens::ADDED, uid]).await;
                self.beep(screens::BEEP_SUCCESS).await;
            }
            (CardAction::Remove, true) => {
                self.show(&[screens::DELETED, uid]).await;
                self.beep(screens::BEEP_SUCCESS).await;
            }
            (CardAction::Add, false) => {
                self.show(&[screens::EXISTS_OR_FULL]).await;
                self.beep(screens::BEEP_FAILURE).await;
            }
            (CardAction::Remove, false) => {
                self.show(&[screens::NOT_FOUND]).await;
                self.beep(screens::BEEP_FAILURE).await;
            }
        }
        self.hold(screens::RESULT_HOLD).await;
    }

    async fn welcome(&mut self, title: &str, who: &str, beep: Beep) {
        self.show(&[title, who]).await;
        self.beep(beep).await;
    }

    async fn door_cycle(&mut self) {
        let pulse = self.config.timing.door_pulse();
        let start = Instant::now();
        info!("Door cycle started");

        self.show(&[screens::OPENING]).await;
        self.drive(DoorPosition::Open).await;
        self.hold(pulse).await;
        self.drive(DoorPosition::Neutral).await;
        self.hold(self.config.timing.door_open_dwell()).await;

        self.write_line(0, screens::CLOSING).await;
        self.drive(DoorPosition::Close).await;
        self.hold(pulse).await;
        self.drive(DoorPosition::Neutral).await;

        info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Door cycle finished"
        );
    }

    async fn lock_flash(&mut self) {
        self.show(&[screens::LOCKED]).await;
        self.beep(screens::BEEP_LOCK).await;
        self.hold(screens::LOCK_GAP).await;
        self.beep(screens::BEEP_LOCK).await;
        self.hold(screens::LOCK_TAIL).await;
    }

    async fn flash(&mut self, lines: &[&str], beep: Option<Beep>, hold: Duration) {
        self.show(lines).await;
        if let Some(beep) = beep {
            self.beep(beep).await;
        }
        self.hold(hold).await;
    }

    async fn beep(&mut self, beep: Beep) {
        self.beeping = true;
        self.set_buzzer(beep.duty).await;
        self.hold(beep.duration).await;
        self.beeping = false;

        let resume = if self.alarm.output_on() { ALARM_DUTY } else { 0 };
        self.set_buzzer(resume).await;
    }

    /// Wait `duration` while keeping the alarm and status line serviced.
    ///
    /// Input events stay queued until the caller returns to the loop.
    pub async fn hold(&mut self, duration: Duration) {
        let deadline = Instant::now() + duration;
        let poll = self.config.timing.poll_interval();

        loop {
            self.service().await;
            let now = Instant::now();
            if now >= deadline {
                return;
            }
            tokio::time::sleep(poll.min(deadline - now)).await;
        }
    }

    /// Next input event before `deadline`, servicing between polls.
    async fn next_event(&mut self, deadline: Instant) -> Option<PeripheralEvent> {
        let poll = self.config.timing.poll_interval();

        loop {
            self.service().await;
            let now = Instant::now();
            if now >= deadline || self.inputs_closed {
                return None;
            }

            tokio::select! {
                event = self.inputs.recv() => match event {
                    Some(event) => return Some(event),
                    None => self.inputs_closed = true,
                },
                _ = tokio::time::sleep(poll.min(deadline - now)) => {}
            }
        }
    }

    /// Alarm pulse and status-line refresh.
    async fn service(&mut self) {
        match self.alarm.poll(Instant::now()) {
            AlarmTick::Output(on) if !self.beeping => {
                self.set_buzzer(if on { ALARM_DUTY } else { 0 }).await;
            }
            AlarmTick::Expired => {
                self.set_buzzer(0).await;
                if self.machine.phase() == StatePhase::AlarmActive {
                    let input = self
                        .machine
                        .input_mut()
                        .map(std::mem::take)
                        .unwrap_or_default();
                    self.enter(ControllerState::MainPrompt { input });
                    self.draw_prompt().await;
                }
            }
            _ => {}
        }

        let connected = self.link.is_connected();
        if self.prompt_visible && self.shown_link != Some(connected) {
            self.draw_status_row(connected).await;
        }
    }

    async fn return_to_prompt(&mut self, input: String) {
        let state = if self.alarm.is_active() {
            ControllerState::AlarmActive { input }
        } else {
            ControllerState::MainPrompt { input }
        };
        self.enter(state);
        self.draw_prompt().await;
    }

    fn enter(&mut self, state: ControllerState) {
        match self.machine.transition_to(state) {
            Ok(transition) => debug!(from = %transition.from, to = %transition.to, "State changed"),
            Err(e) => {
                error!(error = %e, "Rejected state change, resetting to prompt");
                self.machine.reset();
            }
        }
    }

    async fn show(&mut self, lines: &[&str]) {
        self.prompt_visible = false;
        if let Err(e) = self.display.clear().await {
            warn!(error = %e, "Display clear failed");
        }
        for (row, line) in lines.iter().enumerate().take(LCD_ROWS) {
            self.write_line(row, line).await;
        }
    }

    async fn draw_prompt(&mut self) {
        let input = screens::masked(self.machine.current_state().input().unwrap_or_default());
        self.show(&[screens::PROMPT_TITLE, screens::PROMPT_HELP, input.as_str()])
            .await;
        self.draw_status_row(self.link.is_connected()).await;
        self.prompt_visible = true;
    }

    async fn draw_input_row(&mut self) {
        let input = screens::masked(self.machine.current_state().input().unwrap_or_default());
        self.write_line(INPUT_ROW, &input).await;
    }

    async fn draw_status_row(&mut self, connected: bool) {
        self.write_line(STATUS_ROW, screens::net_status(connected))
            .await;
        self.shown_link = Some(connected);
    }

    /// Print `text` on `row`, padded to the full width.
    async fn write_line(&mut self, row: usize, text: &str) {
        let (columns, _) = self.display.dimensions();
        let line = pad_line(text, columns);
        if let Err(e) = self.display.print_at(0, row, &line).await {
            warn!(row, error = %e, "Display write failed");
        }
    }

    async fn drive(&mut self, position: DoorPosition) {
        if let Err(e) = self.door.drive(position).await {
            warn!(position = ?position, error = %e, "Door actuator failed");
        }
    }

    async fn set_buzzer(&mut self, duty: u8) {
        if let Err(e) = self.buzzer.set_duty(duty).await {
            warn!(duty, error = %e, "Buzzer failed");
        }
    }
}

fn scanned_credential(card: &CardData) -> Option<Credential> {
    match card.credential() {
        Ok(credential) => Some(credential),
        Err(e) => {
            warn!(uid = %card.uid_hex(), error = %e, "Unreadable tag ignored");
            None
        }
    }
}

fn log_unhandled(event: &PeripheralEvent) {
    match event {
        PeripheralEvent::DeviceError { device_type, error } => {
            error!(device = %device_type, error = %error, "Input device failed");
        }
        other => debug!(event = ?other, "Event ignored"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::Future;
    use std::sync::{Arc, Mutex};

    use doorkeeper_hardware::devices::{AnyKeypadDevice, AnyRfidDevice};
    use doorkeeper_hardware::mock::{
        DisplayHandle, MockBuzzer, MockBuzzerHandle, MockDoor, MockDoorHandle, MockKeypad,
        MockKeypadHandle, MockRfid, MockRfidHandle, VirtualDisplay,
    };
    use doorkeeper_hardware::{PeripheralConfig, PeripheralManager};
    use doorkeeper_storage::{KeyValueStore, MemoryKvStore};
    use tokio::time::sleep;

    #[derive(Clone, Default)]
    struct RecordingNotifier {
        sent: Arc<Mutex<Vec<PendingNotification>>>,
    }

    impl RecordingNotifier {
        fn sent(&self) -> Vec<PendingNotification> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl AccessNotifier for RecordingNotifier {
        fn dispatch(&self, notification: PendingNotification) {
            self.sent.lock().unwrap().push(notification);
        }
    }

    type TestController =
        AccessController<VirtualDisplay, MockDoor, MockBuzzer, RecordingNotifier>;

    struct Rig {
        controller: TestController,
        keypad: MockKeypadHandle,
        rfid: MockRfidHandle,
        screen: DisplayHandle,
        door: MockDoorHandle,
        buzzer: MockBuzzerHandle,
        notifier: RecordingNotifier,
        kv: MemoryKvStore,
        link: LinkStatus,
    }

    async fn rig() -> Rig {
        let (keypad_device, keypad) = MockKeypad::new();
        let (rfid_device, rfid) = MockRfid::new();
        let mut manager = PeripheralManager::new(PeripheralConfig::default());
        manager.register_keypad(AnyKeypadDevice::Mock(keypad_device));
        manager.register_rfid(AnyRfidDevice::Mock(rfid_device));

        let (display, screen) = VirtualDisplay::lcd2004();
        let (door_device, door) = MockDoor::new();
        let (buzzer_device, buzzer) = MockBuzzer::new();
        let notifier = RecordingNotifier::default();
        let kv = MemoryKvStore::new();
        let link = LinkStatus::new();

        let mut controller = AccessController::new(
            ControllerConfig::default(),
            AnyKvStore::Memory(kv.clone()),
            ControllerDevices {
                display,
                door: door_device,
                buzzer: buzzer_device,
            },
            notifier.clone(),
            link.clone(),
            manager.start(),
        )
        .unwrap();
        controller.start().await;

        Rig {
            controller,
            keypad,
            rfid,
            screen,
            door,
            buzzer,
            notifier,
            kv,
            link,
        }
    }

    /// Run the controller until `script` finishes.
    async fn drive(controller: &mut TestController, script: impl Future<Output = ()>) {
        tokio::select! {
            _ = controller.run_for(Duration::from_secs(3600)) => panic!("controller stopped early"),
            _ = script => {}
        }
    }

    fn ms(ms: u64) -> Duration {
        Duration::from_millis(ms)
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_draws_prompt() {
        let rig = rig().await;

        assert_eq!(rig.screen.line(0).trim_end(), screens::PROMPT_TITLE);
        assert_eq!(rig.screen.line(1).trim_end(), screens::PROMPT_HELP);
        assert_eq!(rig.screen.line(3).trim_end(), screens::NET_DISCONNECTED);
        assert_eq!(rig.door.last_position(), Some(DoorPosition::Neutral));
        assert_eq!(rig.kv.get_string("pw").await.unwrap().as_deref(), Some("1234"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_are_masked_and_editable() {
        let mut rig = rig().await;

        rig.keypad.send_symbols("12A*3").await.unwrap();
        rig.controller.run_for(ms(200)).await;

        assert_eq!(rig.screen.line(2).trim_end(), "***");
        assert_eq!(rig.controller.state().input(), Some("123"));
        assert!(rig.controller.machine().history().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_input_capped_at_max_length() {
        let mut rig = rig().await;

        rig.keypad.send_symbols("12345678901234567890").await.unwrap();
        rig.controller.run_for(ms(500)).await;

        assert_eq!(rig.controller.state().input().map(str::len), Some(16));
    }

    #[tokio::test(start_paused = true)]
    async fn test_correct_password_runs_door_cycle() {
        let mut rig = rig().await;

        rig.keypad.send_pin(&[1, 2, 3, 4]).await.unwrap();
        rig.controller.run_for(ms(6000)).await;

        assert_eq!(
            rig.door.positions(),
            vec![
                DoorPosition::Neutral,
                DoorPosition::Open,
                DoorPosition::Neutral,
                DoorPosition::Close,
                DoorPosition::Neutral
            ]
        );
        assert_eq!(rig.controller.state(), &ControllerState::idle());
        assert_eq!(rig.screen.line(0).trim_end(), screens::PROMPT_TITLE);
        assert!(rig.notifier.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_door_cycle_screens_and_timing() {
        let Rig {
            mut controller,
            keypad,
            screen,
            door,
            ..
        } = rig().await;

        drive(&mut controller, async {
            keypad.send_pin(&[1, 2, 3, 4]).await.unwrap();
            sleep(ms(100)).await;
            assert_eq!(screen.line(0).trim_end(), screens::WELCOME_GUEST);

            sleep(ms(1000)).await;
            assert_eq!(screen.line(0).trim_end(), screens::OPENING);
            assert_eq!(door.last_position(), Some(DoorPosition::Neutral));
            assert_eq!(door.open_count(), 1);

            sleep(ms(3200)).await;
            assert_eq!(screen.line(0).trim_end(), screens::CLOSING);
            assert_eq!(door.last_position(), Some(DoorPosition::Close));

            sleep(ms(1000)).await;
            assert_eq!(screen.line(0).trim_end(), screens::PROMPT_TITLE);
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_wrong_password_flashes_lock() {
        let Rig {
            mut controller,
            keypad,
            screen,
            buzzer,
            door,
            ..
        } = rig().await;

        drive(&mut controller, async {
            keypad.send_pin(&[9, 9, 9, 9]).await.unwrap();
            sleep(ms(200)).await;
            assert_eq!(screen.line(0).trim_end(), screens::LOCKED);

            sleep(ms(1500)).await;
            assert_eq!(buzzer.pulse_count(), 2);
            assert_eq!(screen.line(0).trim_end(), screens::PROMPT_TITLE);
            assert_eq!(screen.line(2).trim_end(), "");
        })
        .await;

        assert_eq!(controller.failed_attempts(), 1);
        assert!(!controller.alarm_active());
        assert_eq!(door.open_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_alarm_pulses_then_expires() {
        let mut rig = rig().await;
        for _ in 0..3 {
            rig.keypad.send_pin(&[0]).await.unwrap();
        }
        rig.controller.run_for(ms(3000)).await;
        assert!(rig.controller.alarm_active());
        let pulses = rig.buzzer.pulse_count();

        rig.controller.run_for(ms(3000)).await;
        assert!(rig.buzzer.pulse_count() >= pulses + 4);

        rig.controller.run_for(ms(15_000)).await;
        assert!(!rig.controller.alarm_active());
        assert!(!rig.buzzer.is_sounding());
        assert_eq!(rig.controller.machine().phase(), StatePhase::MainPrompt);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keypad_usable_during_alarm() {
        let mut rig = rig().await;
        for _ in 0..3 {
            rig.keypad.send_pin(&[0]).await.unwrap();
        }
        rig.controller.run_for(ms(3000)).await;
        assert!(rig.controller.alarm_active());

        rig.keypad.send_pin(&[1, 2, 3, 4]).await.unwrap();
        rig.controller.run_for(ms(6000)).await;

        assert_eq!(rig.door.open_count(), 1);
        assert!(rig.controller.alarm_active());
        assert_eq!(rig.controller.machine().phase(), StatePhase::AlarmActive);
    }

    #[tokio::test(start_paused = true)]
    async fn test_alarm_restarts_after_three_more_failures() {
        let mut rig = rig().await;
        for _ in 0..3 {
            rig.keypad.send_pin(&[0]).await.unwrap();
        }
        rig.controller.run_for(ms(3000)).await;
        let first_end = rig.controller.alarm.ends_at().unwrap();

        for _ in 0..3 {
            rig.keypad.send_pin(&[0]).await.unwrap();
        }
        rig.controller.run_for(ms(3000)).await;

        assert!(rig.controller.alarm.ends_at().unwrap() > first_end);
        assert_eq!(rig.controller.failed_attempts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_keeps_typed_input() {
        let mut rig = rig().await;

        rig.keypad.send_symbols("12").await.unwrap();
        rig.controller.run_for(ms(100)).await;
        rig.rfid.present_hex("DEADBEEF").await.unwrap();
        rig.controller.run_for(ms(2000)).await;

        assert_eq!(rig.controller.state().input(), Some("12"));
        assert_eq!(rig.screen.line(2).trim_end(), "**");
    }

    #[tokio::test(start_paused = true)]
    async fn test_guest_welcome_shows_card() {
        let Rig {
            mut controller,
            rfid,
            screen,
            notifier,
            ..
        } = rig().await;
        let card = Credential::new("AABBCCDD").unwrap();
        controller.store().add_card(&card).await.unwrap();

        drive(&mut controller, async {
            rfid.present_hex("aabbccdd").await.unwrap();
            sleep(ms(50)).await;
            assert_eq!(screen.line(0).trim_end(), screens::WELCOME_GUEST);
            assert_eq!(screen.line(1).trim_end(), "Card:AABBCCDD");
            assert_eq!(notifier.sent(), vec![PendingNotification::allowed(card.clone())]);
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_password_change_saves_on_submit() {
        let Rig {
            mut controller,
            keypad,
            rfid,
            screen,
            buzzer,
            kv,
            ..
        } = rig().await;

        drive(&mut controller, async {
            rfid.present_hex("AC649105").await.unwrap();
            sleep(ms(5000)).await;
            assert_eq!(screen.line(0).trim_end(), screens::ADMIN_TITLE);

            keypad.send_symbols("1#56789*").await.unwrap();
            sleep(ms(200)).await;
            assert_eq!(screen.line(0).trim_end(), screens::CHANGE_TITLE);
            assert_eq!(screen.line(2).trim_end(), "****");

            let pulses = buzzer.pulse_count();
            keypad.send_symbols("#").await.unwrap();
            sleep(ms(50)).await;
            assert_eq!(screen.line(0).trim_end(), screens::SAVED);
            assert_eq!(buzzer.pulse_count(), pulses + 1);

            sleep(ms(1000)).await;
            assert_eq!(screen.line(0).trim_end(), screens::PROMPT_TITLE);
        })
        .await;

        assert_eq!(kv.get_string("pw").await.unwrap().as_deref(), Some("5678"));
        assert_eq!(controller.password, "5678");
    }

    #[tokio::test(start_paused = true)]
    async fn test_password_change_timeout_discards_draft() {
        let Rig {
            mut controller,
            keypad,
            rfid,
            screen,
            kv,
            ..
        } = rig().await;

        drive(&mut controller, async {
            rfid.present_hex("AC649105").await.unwrap();
            sleep(ms(5000)).await;
            keypad.send_symbols("142").await.unwrap();

            sleep(ms(14_000)).await;
            assert_eq!(screen.line(0).trim_end(), screens::CHANGE_TITLE);

            sleep(ms(1100)).await;
            assert_eq!(screen.line(0).trim_end(), screens::NOT_SAVED);

            sleep(ms(700)).await;
            assert_eq!(screen.line(0).trim_end(), screens::PROMPT_TITLE);
        })
        .await;

        assert_eq!(kv.get_string("pw").await.unwrap().as_deref(), Some("1234"));
        assert_eq!(controller.state(), &ControllerState::idle());
    }

    #[tokio::test(start_paused = true)]
    async fn test_password_change_without_keys_reports_no_input() {
        let Rig {
            mut controller,
            keypad,
            rfid,
            screen,
            ..
        } = rig().await;

        drive(&mut controller, async {
            rfid.present_hex("AC649105").await.unwrap();
            sleep(ms(5000)).await;
            keypad.send_symbols("1").await.unwrap();
            sleep(ms(15_100)).await;
            assert_eq!(screen.line(0).trim_end(), screens::NO_INPUT);
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_admin_menu_times_out() {
        let Rig {
            mut controller,
            rfid,
            screen,
            ..
        } = rig().await;

        drive(&mut controller, async {
            rfid.present_hex("AC649105").await.unwrap();
            sleep(ms(19_900)).await;
            assert_eq!(screen.line(0).trim_end(), screens::ADMIN_TIMEOUT);
            sleep(ms(700)).await;
        })
        .await;

        assert_eq!(controller.state(), &ControllerState::idle());
        let last = controller.machine().last_transitions(2);
        assert_eq!(last[0].to, StatePhase::AdminMenu);
        assert_eq!(last[1].to, StatePhase::MainPrompt);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exit_key_leaves_card_prompt() {
        let Rig {
            mut controller,
            keypad,
            rfid,
            screen,
            ..
        } = rig().await;

        drive(&mut controller, async {
            rfid.present_hex("AC649105").await.unwrap();
            sleep(ms(5000)).await;
            keypad.send_symbols("3").await.unwrap();
            sleep(ms(100)).await;
            assert_eq!(screen.line(0).trim_end(), screens::ADD_PROMPT);

            keypad.send_symbols("12D").await.unwrap();
            sleep(ms(100)).await;
            assert_eq!(screen.line(0).trim_end(), screens::ADMIN_EXIT);
            sleep(ms(500)).await;
        })
        .await;

        assert_eq!(controller.state(), &ControllerState::idle());
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_unknown_card_reports_not_found() {
        let Rig {
            mut controller,
            keypad,
            rfid,
            screen,
            ..
        } = rig().await;

        drive(&mut controller, async {
            rfid.present_hex("AC649105").await.unwrap();
            sleep(ms(5000)).await;
            keypad.send_symbols("2").await.unwrap();
            sleep(ms(100)).await;
            assert_eq!(screen.line(0).trim_end(), screens::DELETE_PROMPT);

            rfid.present_hex("01020304").await.unwrap();
            sleep(ms(100)).await;
            assert_eq!(screen.line(0).trim_end(), screens::NOT_FOUND);
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_add_card_store_failure_reported() {
        let Rig {
            mut controller,
            keypad,
            rfid,
            screen,
            kv,
            ..
        } = rig().await;

        drive(&mut controller, async {
            rfid.present_hex("AC649105").await.unwrap();
            sleep(ms(5000)).await;
            keypad.send_symbols("3").await.unwrap();
            sleep(ms(100)).await;

            kv.set_fail_writes(true);
            rfid.present_hex("AABBCCDD").await.unwrap();
            sleep(ms(100)).await;
            assert_eq!(screen.line(0).trim_end(), screens::EXISTS_OR_FULL);
            sleep(ms(1200)).await;
            assert_eq!(screen.line(0).trim_end(), screens::PROMPT_TITLE);
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_link_change_redraws_status_line() {
        let mut rig = rig().await;

        rig.link.set_connected(true);
        rig.controller.run_for(ms(100)).await;

        assert_eq!(rig.screen.line(3).trim_end(), screens::NET_CONNECTED);
    }

    #[tokio::test(start_paused = true)]
    async fn test_link_change_waits_for_prompt() {
        let Rig {
            mut controller,
            keypad,
            screen,
            link,
            ..
        } = rig().await;

        drive(&mut controller, async {
            keypad.send_pin(&[1, 2, 3, 4]).await.unwrap();
            sleep(ms(500)).await;
            link.set_connected(true);
            sleep(ms(100)).await;
            assert!(!screen.contains(screens::NET_CONNECTED));

            sleep(ms(5000)).await;
            assert_eq!(screen.line(3).trim_end(), screens::NET_CONNECTED);
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_device_error_is_not_fatal() {
        let mut rig = rig().await;

        rig.controller
            .handle_event(PeripheralEvent::DeviceError {
                device_type: doorkeeper_hardware::DeviceType::Rfid,
                error: "bus fault".to_string(),
            })
            .await;
        rig.keypad.send_pin(&[1, 2, 3, 4]).await.unwrap();
        rig.controller.run_for(ms(6000)).await;

        assert_eq!(rig.door.open_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_when_inputs_close() {
        let (display, _screen) = VirtualDisplay::lcd2004();
        let (door, _door) = MockDoor::new();
        let (buzzer, buzzer_handle) = MockBuzzer::new();
        let inputs = PeripheralManager::new(PeripheralConfig::default()).start();

        let controller = AccessController::new(
            ControllerConfig::default(),
            AnyKvStore::Memory(MemoryKvStore::new()),
            ControllerDevices {
                display,
                door,
                buzzer,
            },
            RecordingNotifier::default(),
            LinkStatus::new(),
            inputs,
        )
        .unwrap();

        controller.run().await;
        assert!(!buzzer_handle.is_sounding());
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let (display, _screen) = VirtualDisplay::lcd2004();
        let (door, _door) = MockDoor::new();
        let (buzzer, _buzzer) = MockBuzzer::new();
        let config = ControllerConfig {
            admin_uid: "XYZ".to_string(),
            ..ControllerConfig::default()
        };
        let inputs = PeripheralManager::new(PeripheralConfig::default()).start();

        let result = AccessController::new(
            config,
            AnyKvStore::Memory(MemoryKvStore::new()),
            ControllerDevices {
                display,
                door,
                buzzer,
            },
            RecordingNotifier::default(),
            LinkStatus::new(),
            inputs,
        );

        assert!(matches!(result, Err(crate::ControllerError::Config(_))));
    }
}
