//! Mock door actuator that records every commanded position.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::Result;
use crate::traits::DoorActuator;
use crate::types::DoorPosition;

type History = Arc<Mutex<Vec<DoorPosition>>>;

fn lock(history: &History) -> MutexGuard<'_, Vec<DoorPosition>> {
    history.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Simulated servo latch.
///
/// # Examples
///
/// ```
/// use doorkeeper_hardware::mock::MockDoor;
/// use doorkeeper_hardware::traits::DoorActuator;
/// use doorkeeper_hardware::DoorPosition;
///
/// #[tokio::main]
/// async fn main() -> doorkeeper_hardware::Result<()> {
///     let (mut door, handle) = MockDoor::new();
///
///     door.drive(DoorPosition::Open).await?;
///     door.drive(DoorPosition::Neutral).await?;
///
///     assert_eq!(handle.positions(), vec![DoorPosition::Open, DoorPosition::Neutral]);
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockDoor {
    history: History,
}

impl MockDoor {
    /// Create a door that starts with no recorded movement.
    pub fn new() -> (Self, MockDoorHandle) {
        let history = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                history: history.clone(),
            },
            MockDoorHandle { history },
        )
    }
}

impl DoorActuator for MockDoor {
    async fn drive(&mut self, position: DoorPosition) -> Result<()> {
        tracing::debug!(%position, pulse_us = position.pulse_width_us(), "Door actuator driven");
        lock(&self.history).push(position);
        Ok(())
    }
}

/// Observer for a [`MockDoor`].
#[derive(Debug, Clone)]
pub struct MockDoorHandle {
    history: History,
}

impl MockDoorHandle {
    /// Every position commanded so far, oldest first.
    pub fn positions(&self) -> Vec<DoorPosition> {
        lock(&self.history).clone()
    }

    /// Number of times the door was driven open.
    pub fn open_count(&self) -> usize {
        lock(&self.history)
            .iter()
            .filter(|p| **p == DoorPosition::Open)
            .count()
    }

    /// Most recent position, if the door has moved.
    pub fn last_position(&self) -> Option<DoorPosition> {
        lock(&self.history).last().copied()
    }
}
