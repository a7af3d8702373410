//! Connection and pairing state machine through the facade.

mod common;

use common::*;
use embassy_time::{Duration, MockDriver};
use hogp::ble::connection::{ConnectFailReason, ConnectionState, PairingState};
use hogp::ble::stack::{GattServerEvent, LinkState, PairingVariant};
use hogp::config::HidConfig;
use hogp::descriptor::HidProfile;
use hogp::event::ConnectionEvent;

#[test]
fn link_lifecycle_happy_path() {
    let (hid, _stack) = setup(HidProfile::Keyboard);
    assert_eq!(hid.connection_state(), ConnectionState::Disconnected);
    assert!(!hid.is_connected());

    hid.handle_event(GattServerEvent::ConnectionStateChange {
        peer: PEER,
        status: 0,
        new_state: LinkState::Connecting,
    });
    assert_eq!(hid.connection_state(), ConnectionState::Connecting);

    connect(&hid);
    assert_eq!(hid.connection_state(), ConnectionState::Connected(PEER));
    assert!(hid.is_connected());

    disconnect(&hid, 0);
    assert_eq!(hid.connection_state(), ConnectionState::Disconnected);
}

#[test]
fn failed_connection_keeps_reason_until_reset() {
    let (hid, _stack) = setup(HidProfile::Keyboard);
    hid.handle_event(GattServerEvent::ConnectionStateChange {
        peer: PEER,
        status: 133,
        new_state: LinkState::Connected,
    });
    assert_eq!(
        hid.connection_state(),
        ConnectionState::Failed(ConnectFailReason::Status(133))
    );
    assert!(!hid.is_connected());

    hid.reset_connection();
    assert_eq!(hid.connection_state(), ConnectionState::Disconnected);
}

#[test]
fn connecting_times_out_into_failed() {
    let config = HidConfig {
        connection_timeout: Duration::from_secs(30),
        ..Default::default()
    };
    let (hid, _stack) = setup_with_config(HidProfile::Keyboard, config);

    hid.handle_event(GattServerEvent::ConnectionStateChange {
        peer: PEER,
        status: 0,
        new_state: LinkState::Connecting,
    });
    hid.poll();
    assert_eq!(hid.connection_state(), ConnectionState::Connecting);

    MockDriver::get().advance(Duration::from_secs(31));
    hid.poll();
    assert_eq!(
        hid.connection_state(),
        ConnectionState::Failed(ConnectFailReason::Timeout)
    );
}

#[test]
fn pairing_is_auto_accepted_and_completion_is_broadcast() {
    let (hid, _stack) = setup(HidProfile::Keyboard);
    connect(&hid);
    assert_eq!(hid.pairing_state(), PairingState::None);

    let (_, mut stream) = hid.connection_stream().expect("subscriber slot");

    hid.handle_event(GattServerEvent::PairingRequest {
        peer: PEER,
        variant: PairingVariant::PasskeyConfirmation,
    });
    assert_eq!(
        hid.pairing_state(),
        PairingState::Bonding(PairingVariant::PasskeyConfirmation)
    );
    // Pairing may proceed while the link stays connected.
    assert!(hid.is_connected());

    hid.handle_event(GattServerEvent::PairingComplete {
        peer: PEER,
        success: true,
    });
    assert_eq!(hid.pairing_state(), PairingState::Bonded);

    let mut saw_complete = false;
    while let Some(record) = stream.try_next_message_pure() {
        if matches!(
            record.event,
            ConnectionEvent::PairingComplete { success: true, .. }
        ) {
            saw_complete = true;
        }
    }
    assert!(saw_complete);
}

#[test]
fn rejected_pairing_lands_in_rejected() {
    let (hid, _stack) = setup(HidProfile::Keyboard);
    connect(&hid);
    hid.handle_event(GattServerEvent::PairingRequest {
        peer: PEER,
        variant: PairingVariant::Pin,
    });
    hid.handle_event(GattServerEvent::PairingComplete {
        peer: PEER,
        success: false,
    });
    assert_eq!(hid.pairing_state(), PairingState::Rejected);
}

#[test]
fn disconnect_clears_pairing_state() {
    let (hid, _stack) = setup(HidProfile::Keyboard);
    connect(&hid);
    hid.handle_event(GattServerEvent::PairingRequest {
        peer: PEER,
        variant: PairingVariant::Consent,
    });
    hid.handle_event(GattServerEvent::PairingComplete {
        peer: PEER,
        success: true,
    });
    disconnect(&hid, 0);
    assert_eq!(hid.pairing_state(), PairingState::None);
}

#[test]
fn state_changes_are_observed_in_order() {
    let (hid, _stack) = setup(HidProfile::Keyboard);
    let (snapshot, mut stream) = hid.connection_stream().expect("subscriber slot");
    assert_eq!(snapshot.connection, ConnectionState::Disconnected);

    connect(&hid);
    disconnect(&hid, 5);

    let states: Vec<ConnectionState> = std::iter::from_fn(|| stream.try_next_message_pure())
        .filter_map(|record| match record.event {
            ConnectionEvent::StateChanged(state) => Some(state),
            _ => None,
        })
        .collect();
    assert_eq!(
        states,
        vec![
            ConnectionState::Connected(PEER),
            ConnectionState::Disconnected
        ]
    );
}
