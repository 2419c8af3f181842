//! End-to-end access scenarios over mock peripherals and an in-memory store.
//!
//! Run with: cargo test --package doorkeeper-controller --test access_scenarios

mod common;

use common::test_data::{ADMIN_UID, DEFAULT_PIN, GUEST_UID, UNKNOWN_UID, WRONG_PIN};
use common::{ADMIN_ENTRY, DOOR_CYCLE, RecordingNotifier, Station, drive, ms, station};
use doorkeeper_controller::screens;
use doorkeeper_controller::{ControllerState, StatePhase};
use doorkeeper_core::{ControllerConfig, Credential};
use doorkeeper_network::{LinkStatus, PendingNotification};
use doorkeeper_storage::{AnyKvStore, KeyValueStore, MemoryKvStore};
use tokio::time::sleep;

async fn memory_station() -> (Station<RecordingNotifier>, RecordingNotifier, MemoryKvStore) {
    let kv = MemoryKvStore::new();
    let notifier = RecordingNotifier::default();
    let station = station(
        ControllerConfig::default(),
        AnyKvStore::Memory(kv.clone()),
        notifier.clone(),
        LinkStatus::new(),
    )
    .await;
    (station, notifier, kv)
}

fn card(hex: &str) -> Credential {
    Credential::new(hex).unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_default_password_opens_on_first_boot() {
    let (mut station, notifier, kv) = memory_station().await;

    assert_eq!(kv.get_string("pw").await.unwrap().as_deref(), Some("1234"));

    station.keypad.send_pin(&DEFAULT_PIN).await.unwrap();
    station.controller.run_for(DOOR_CYCLE).await;

    assert_eq!(station.door.open_count(), 1);
    assert_eq!(station.controller.failed_attempts(), 0);
    assert_eq!(station.controller.state(), &ControllerState::idle());
    assert!(notifier.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_third_failure_raises_alarm_and_admin_silences_it() {
    let (mut station, notifier, _kv) = memory_station().await;

    for attempt in 1..=2 {
        station.keypad.send_pin(&WRONG_PIN).await.unwrap();
        station.controller.run_for(ms(1500)).await;
        assert_eq!(station.controller.failed_attempts(), attempt);
        assert!(!station.controller.alarm_active());
    }

    station.keypad.send_pin(&WRONG_PIN).await.unwrap();
    station.controller.run_for(ms(1000)).await;
    assert!(station.controller.alarm_active());
    assert_eq!(station.controller.failed_attempts(), 0);
    assert_eq!(station.controller.machine().phase(), StatePhase::AlarmActive);
    assert!(station.buzzer.pulse_count() >= 3);

    station.rfid.present_hex(ADMIN_UID).await.unwrap();
    station.controller.run_for(ms(1500)).await;

    assert!(!station.controller.alarm_active());
    assert!(!station.buzzer.is_sounding());
    assert_eq!(station.controller.machine().phase(), StatePhase::MainPrompt);
    assert_eq!(station.screen.line(0).trim_end(), screens::PROMPT_TITLE);
    assert_eq!(station.door.open_count(), 0);
    assert_eq!(notifier.sent(), vec![PendingNotification::allowed(card(ADMIN_UID))]);
}

#[tokio::test(start_paused = true)]
async fn test_alarm_silences_itself_after_duration() {
    let (mut station, _notifier, _kv) = memory_station().await;

    for _ in 0..3 {
        station.keypad.send_pin(&WRONG_PIN).await.unwrap();
    }
    station.controller.run_for(ms(4000)).await;
    assert!(station.controller.alarm_active());

    station.controller.run_for(ms(15_000)).await;

    assert!(!station.controller.alarm_active());
    assert!(!station.buzzer.is_sounding());
    assert_eq!(station.screen.line(0).trim_end(), screens::PROMPT_TITLE);
}

#[tokio::test(start_paused = true)]
async fn test_admin_adds_card_which_then_opens_door() {
    let (station, notifier, _kv) = memory_station().await;
    let Station {
        mut controller,
        keypad,
        rfid,
        screen,
        door,
        ..
    } = station;

    drive(&mut controller, async {
        rfid.present_hex(ADMIN_UID).await.unwrap();
        sleep(ADMIN_ENTRY).await;
        assert_eq!(screen.line(0).trim_end(), screens::ADMIN_TITLE);
        assert_eq!(door.open_count(), 1);

        keypad.send_symbols("3").await.unwrap();
        sleep(ms(100)).await;
        assert_eq!(screen.line(0).trim_end(), screens::ADD_PROMPT);

        rfid.present_hex(GUEST_UID).await.unwrap();
        sleep(ms(100)).await;
        assert_eq!(screen.line(0).trim_end(), screens::ADDED);
        assert_eq!(screen.line(1).trim_end(), GUEST_UID);

        sleep(ms(1200)).await;
        assert_eq!(screen.line(0).trim_end(), screens::PROMPT_TITLE);
    })
    .await;

    assert!(controller.store().is_allowed(&card(GUEST_UID)).await);

    rfid.present_hex(GUEST_UID).await.unwrap();
    controller.run_for(DOOR_CYCLE).await;

    assert_eq!(door.open_count(), 2);
    assert_eq!(controller.failed_attempts(), 0);
    assert_eq!(
        notifier.sent(),
        vec![
            PendingNotification::allowed(card(ADMIN_UID)),
            PendingNotification::denied(Some(card(GUEST_UID))),
            PendingNotification::allowed(card(GUEST_UID)),
        ]
    );
}

/// Scan an allowed guest while the admin menu shows `title` after `keys`,
/// then leave the menu.
async fn guest_scanned_inside_admin_menu(keys: &str, title: &str) {
    let (station, notifier, _kv) = memory_station().await;
    let Station {
        mut controller,
        keypad,
        rfid,
        screen,
        door,
        ..
    } = station;
    controller.store().add_card(&card(GUEST_UID)).await.unwrap();

    drive(&mut controller, async {
        rfid.present_hex(ADMIN_UID).await.unwrap();
        sleep(ADMIN_ENTRY).await;
        keypad.send_symbols(keys).await.unwrap();
        sleep(ms(100)).await;
        assert_eq!(screen.line(0).trim_end(), title);

        rfid.present_hex(GUEST_UID).await.unwrap();
        sleep(ms(500)).await;
        assert_eq!(screen.line(0).trim_end(), title);
        assert_eq!(door.open_count(), 1);
        assert_eq!(notifier.sent().len(), 1);

        keypad.send_symbols("C").await.unwrap();
        sleep(DOOR_CYCLE + ms(1000)).await;
        assert_eq!(screen.line(0).trim_end(), screens::PROMPT_TITLE);
    })
    .await;

    assert_eq!(door.open_count(), 2);
    assert_eq!(
        notifier.sent(),
        vec![
            PendingNotification::allowed(card(ADMIN_UID)),
            PendingNotification::allowed(card(GUEST_UID)),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_guest_scan_at_admin_root_opens_after_exit() {
    guest_scanned_inside_admin_menu("", screens::ADMIN_TITLE).await;
}

#[tokio::test(start_paused = true)]
async fn test_guest_scan_during_password_change_opens_after_exit() {
    guest_scanned_inside_admin_menu("1", screens::CHANGE_TITLE).await;
}

#[tokio::test(start_paused = true)]
async fn test_admin_removes_card() {
    let (station, _notifier, _kv) = memory_station().await;
    let Station {
        mut controller,
        keypad,
        rfid,
        screen,
        door,
        ..
    } = station;
    controller.store().add_card(&card(GUEST_UID)).await.unwrap();

    drive(&mut controller, async {
        rfid.present_hex(ADMIN_UID).await.unwrap();
        sleep(ADMIN_ENTRY).await;
        keypad.send_symbols("2").await.unwrap();
        sleep(ms(100)).await;

        rfid.present_hex(GUEST_UID).await.unwrap();
        sleep(ms(100)).await;
        assert_eq!(screen.line(0).trim_end(), screens::DELETED);
        assert_eq!(screen.line(1).trim_end(), GUEST_UID);
        sleep(ms(1200)).await;
    })
    .await;

    assert!(!controller.store().is_allowed(&card(GUEST_UID)).await);

    rfid.present_hex(GUEST_UID).await.unwrap();
    controller.run_for(ms(2000)).await;

    assert_eq!(door.open_count(), 1);
    assert_eq!(screen.line(0).trim_end(), screens::PROMPT_TITLE);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_card_is_denied_without_counting() {
    let (mut station, notifier, _kv) = memory_station().await;

    station.rfid.present_hex(UNKNOWN_UID).await.unwrap();
    station.controller.run_for(ms(1500)).await;

    assert_eq!(station.door.open_count(), 0);
    assert_eq!(station.controller.failed_attempts(), 0);
    assert_eq!(station.rfid.halt_count(), 1);
    assert_eq!(
        notifier.sent(),
        vec![PendingNotification::denied(Some(card(UNKNOWN_UID)))]
    );
}

#[tokio::test(start_paused = true)]
async fn test_changed_password_replaces_old_one() {
    let (station, _notifier, kv) = memory_station().await;
    let Station {
        mut controller,
        keypad,
        rfid,
        screen,
        door,
        ..
    } = station;

    drive(&mut controller, async {
        rfid.present_hex(ADMIN_UID).await.unwrap();
        sleep(ADMIN_ENTRY).await;
        keypad.send_symbols("1").await.unwrap();
        keypad.send_pin(&[4, 3, 2, 1]).await.unwrap();
        sleep(ms(100)).await;
        assert_eq!(screen.line(0).trim_end(), screens::SAVED);
        sleep(ms(1000)).await;
    })
    .await;

    assert_eq!(kv.get_string("pw").await.unwrap().as_deref(), Some("4321"));

    keypad.send_pin(&DEFAULT_PIN).await.unwrap();
    controller.run_for(ms(1500)).await;
    assert_eq!(door.open_count(), 1);
    assert_eq!(controller.failed_attempts(), 1);

    keypad.send_pin(&[4, 3, 2, 1]).await.unwrap();
    controller.run_for(DOOR_CYCLE).await;
    assert_eq!(door.open_count(), 2);
    assert_eq!(controller.failed_attempts(), 0);
}
