//! Timed, pulsing alarm.
//!
//! The manager only does the bookkeeping: the controller calls
//! [`AlarmManager::poll`] on every loop iteration (including inside door
//! cycles and flash holds) and applies the returned [`AlarmTick`] to the
//! buzzer.

use std::time::Duration;

use tokio::time::Instant;

/// Buzzer duty while the alarm tone is on.
pub const ALARM_DUTY: u8 = 255;

/// What the buzzer should do after a poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmTick {
    /// No alarm running.
    Idle,

    /// Alarm running, output already in the right phase.
    Unchanged,

    /// Alarm running, output must switch on (`true`) or off (`false`).
    Output(bool),

    /// The alarm just ran out. Output must be silenced.
    Expired,
}

/// Alarm timer and pulse generator.
#[derive(Debug)]
pub struct AlarmManager {
    duration: Duration,
    period: Duration,
    started_at: Option<Instant>,
    output_on: bool,
}

impl AlarmManager {
    /// Create an inactive alarm lasting `duration`, toggling every `period`.
    pub fn new(duration: Duration, period: Duration) -> Self {
        Self {
            duration,
            period,
            started_at: None,
            output_on: false,
        }
    }

    /// Start (or restart) the alarm. Returns the end time.
    pub fn start(&mut self, now: Instant) -> Instant {
        self.started_at = Some(now);
        self.output_on = false;
        tracing::warn!(duration_ms = self.duration.as_millis() as u64, "Alarm started");
        now + self.duration
    }

    /// Stop the alarm. Returns whether it was running.
    ///
    /// The caller must silence the buzzer; the manager has no output of its
    /// own.
    pub fn stop(&mut self) -> bool {
        self.output_on = false;
        self.started_at.take().is_some()
    }

    /// Whether the alarm is running.
    pub fn is_active(&self) -> bool {
        self.started_at.is_some()
    }

    /// Whether the tone is in an on-phase as of the last poll.
    pub fn output_on(&self) -> bool {
        self.output_on
    }

    /// When the running alarm will end.
    pub fn ends_at(&self) -> Option<Instant> {
        self.started_at.map(|start| start + self.duration)
    }

    /// Advance to `now`.
    ///
    /// The tone is on while `elapsed / period` is even, so it sounds
    /// immediately on start.
    pub fn poll(&mut self, now: Instant) -> AlarmTick {
        let Some(started_at) = self.started_at else {
            return AlarmTick::Idle;
        };

        let elapsed = now.saturating_duration_since(started_at);
        if elapsed >= self.duration {
            self.stop();
            tracing::info!("Alarm expired");
            return AlarmTick::Expired;
        }

        let period_ms = self.period.as_millis().max(1);
        let on = (elapsed.as_millis() / period_ms) % 2 == 0;
        if on == self.output_on {
            return AlarmTick::Unchanged;
        }

        self.output_on = on;
        AlarmTick::Output(on)
    }
}
