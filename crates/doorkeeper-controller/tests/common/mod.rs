//! Shared rig for controller integration tests.
//!
//! Builds a controller over mock peripherals and a caller-chosen store and
//! notifier, already started and showing the main prompt.

#![allow(dead_code)]

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use doorkeeper_controller::{AccessController, ControllerDevices};
use doorkeeper_core::ControllerConfig;
use doorkeeper_hardware::devices::{AnyKeypadDevice, AnyRfidDevice};
use doorkeeper_hardware::mock::{
    DisplayHandle, MockBuzzer, MockBuzzerHandle, MockDoor, MockDoorHandle, MockKeypad,
    MockKeypadHandle, MockRfid, MockRfidHandle, VirtualDisplay,
};
use doorkeeper_hardware::{PeripheralConfig, PeripheralManager};
use doorkeeper_network::{AccessNotifier, LinkStatus, PendingNotification};
use doorkeeper_storage::AnyKvStore;

pub mod test_data {
    pub const ADMIN_UID: &str = "AC649105";
    pub const GUEST_UID: &str = "AABBCCDD";
    pub const UNKNOWN_UID: &str = "DEADBEEF";
    pub const DEFAULT_PIN: [u8; 4] = [1, 2, 3, 4];
    pub const WRONG_PIN: [u8; 4] = [9, 9, 9, 9];
}

/// Time from a successful scan or password until the prompt is back.
pub const DOOR_CYCLE: Duration = Duration::from_millis(5500);

/// Time from an admin scan until the admin menu is up.
pub const ADMIN_ENTRY: Duration = Duration::from_millis(5000);

pub type TestController<N> = AccessController<VirtualDisplay, MockDoor, MockBuzzer, N>;

pub struct Station<N: AccessNotifier> {
    pub controller: TestController<N>,
    pub keypad: MockKeypadHandle,
    pub rfid: MockRfidHandle,
    pub screen: DisplayHandle,
    pub door: MockDoorHandle,
    pub buzzer: MockBuzzerHandle,
    pub link: LinkStatus,
}

pub async fn station<N: AccessNotifier>(
    config: ControllerConfig,
    kv: AnyKvStore,
    notifier: N,
    link: LinkStatus,
) -> Station<N> {
    let (keypad_device, keypad) = MockKeypad::new();
    let (rfid_device, rfid) = MockRfid::new();
    let mut manager = PeripheralManager::new(PeripheralConfig::default());
    manager.register_keypad(AnyKeypadDevice::Mock(keypad_device));
    manager.register_rfid(AnyRfidDevice::Mock(rfid_device));

    let (display, screen) = VirtualDisplay::lcd2004();
    let (door_device, door) = MockDoor::new();
    let (buzzer_device, buzzer) = MockBuzzer::new();

    let mut controller = AccessController::new(
        config,
        kv,
        ControllerDevices {
            display,
            door: door_device,
            buzzer: buzzer_device,
        },
        notifier,
        link.clone(),
        manager.start(),
    )
    .unwrap();
    controller.start().await;

    Station {
        controller,
        keypad,
        rfid,
        screen,
        door,
        buzzer,
        link,
    }
}

/// Run the controller until `script` finishes.
pub async fn drive<N: AccessNotifier>(
    controller: &mut TestController<N>,
    script: impl Future<Output = ()>,
) {
    tokio::select! {
        _ = controller.run_for(Duration::from_secs(3600)) => panic!("controller stopped early"),
        _ = script => {}
    }
}

pub fn ms(ms: u64) -> Duration {
    Duration::from_millis(ms)
}

/// Notifier that only records what it was handed.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<PendingNotification>>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<PendingNotification> {
        self.sent.lock().unwrap().clone()
    }
}

impl AccessNotifier for RecordingNotifier {
    fn dispatch(&self, notification: PendingNotification) {
        self.sent.lock().unwrap().push(notification);
    }
}

/// Poll `screen` until `row` shows `text`. Panics after five seconds.
///
/// For tests that run on the wall clock, where exact sleeps would race.
pub async fn wait_for_line(screen: &DisplayHandle, row: usize, text: &str) {
    let waited = tokio::time::timeout(Duration::from_secs(5), async {
        while screen.line(row).trim_end() != text {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;

    if waited.is_err() {
        panic!("row {row} never showed {text:?}, screen was:\n{}", screen.render());
    }
}
