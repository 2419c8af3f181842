//! Mock PWM buzzer that records duty changes.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::Result;
use crate::traits::Buzzer;

type History = Arc<Mutex<Vec<u8>>>;

fn lock(history: &History) -> MutexGuard<'_, Vec<u8>> {
    history.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Simulated buzzer.
#[derive(Debug)]
pub struct MockBuzzer {
    history: History,
}

impl MockBuzzer {
    /// Create a silent buzzer.
    pub fn new() -> (Self, MockBuzzerHandle) {
        let history = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                history: history.clone(),
            },
            MockBuzzerHandle { history },
        )
    }
}

impl Buzzer for MockBuzzer {
    async fn set_duty(&mut self, duty: u8) -> Result<()> {
        tracing::trace!(duty, "Buzzer duty set");
        lock(&self.history).push(duty);
        Ok(())
    }
}

/// Observer for a [`MockBuzzer`].
#[derive(Debug, Clone)]
pub struct MockBuzzerHandle {
    history: History,
}

impl MockBuzzerHandle {
    /// Current duty; `0` when silent or never driven.
    pub fn duty(&self) -> u8 {
        lock(&self.history).last().copied().unwrap_or(0)
    }

    /// Whether the buzzer is currently sounding.
    pub fn is_sounding(&self) -> bool {
        self.duty() != 0
    }

    /// Number of silent-to-sounding transitions so far.
    pub fn pulse_count(&self) -> usize {
        let history = lock(&self.history);
        let mut previous = 0;
        let mut pulses = 0;
        for &duty in history.iter() {
            if previous == 0 && duty != 0 {
                pulses += 1;
            }
            previous = duty;
        }
        pulses
    }

    /// Every duty written, oldest first.
    pub fn history(&self) -> Vec<u8> {
        lock(&self.history).clone()
    }
}
