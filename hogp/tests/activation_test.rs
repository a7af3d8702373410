//! Service activation policy: single service, composite exclusivity,
//! idempotence, resource errors.

mod common;

use common::*;
use hogp::config::HidConfig;
use hogp::descriptor::HidProfile;
use hogp::error::Error;
use hogp::event::ConnectionEvent;
use hogp::ble::stack::StackError;

#[test]
fn activating_a_second_profile_removes_the_first() {
    let (hid, stack) = setup(HidProfile::Mouse);
    assert!(stack.service_uuids().contains(&0x1812));

    hid.activate(HidProfile::Keyboard).unwrap();

    // At most one HID service registered at any time.
    let hid_services = stack
        .service_uuids()
        .iter()
        .filter(|&&u| u == 0x1812)
        .count();
    assert_eq!(hid_services, 1);
    assert_eq!(hid.active_profile(), Some(HidProfile::Keyboard));

    // Removal observable before the add.
    hid.with_diagnostics(|diag| {
        let events: Vec<ConnectionEvent> = diag.connection_history().map(|r| r.event).collect();
        let removed = events
            .iter()
            .position(|e| *e == ConnectionEvent::ServiceRemoved(HidProfile::Mouse))
            .expect("ServiceRemoved(Mouse)");
        let added = events
            .iter()
            .position(|e| *e == ConnectionEvent::ServiceAdded(HidProfile::Keyboard))
            .expect("ServiceAdded(Keyboard)");
        assert!(removed < added);
    });
}

#[test]
fn composite_displaces_per_device_profiles() {
    let (hid, stack) = setup(HidProfile::Keyboard);
    hid.activate(HidProfile::Composite).unwrap();
    assert_eq!(hid.active_profile(), Some(HidProfile::Composite));
    let hid_services = stack
        .service_uuids()
        .iter()
        .filter(|&&u| u == 0x1812)
        .count();
    assert_eq!(hid_services, 1);
}

#[test]
fn activation_is_idempotent_and_deactivation_of_inactive_is_a_noop() {
    let (hid, _stack) = setup(HidProfile::Keyboard);
    // Benign re-activation.
    assert!(hid.activate(HidProfile::Keyboard).is_ok());
    assert_eq!(hid.active_profile(), Some(HidProfile::Keyboard));
    // Deactivating something inactive succeeds and changes nothing.
    assert!(hid.deactivate(HidProfile::Mouse).is_ok());
    assert_eq!(hid.active_profile(), Some(HidProfile::Keyboard));
}

#[test]
fn deactivate_clears_cccds_and_profile() {
    let (hid, stack) = setup(HidProfile::Mouse);
    connect(&hid);
    enable_input_notifications(&hid, &stack);
    let input = hid.input_handle().unwrap();

    hid.deactivate(HidProfile::Mouse).unwrap();
    assert_eq!(hid.active_profile(), None);
    assert_eq!(
        hid.cccd_state(input),
        hogp::ble::notify::CccdState::Disabled
    );
    assert!(!stack.service_uuids().contains(&0x1812));
    // Intents have nowhere to go now.
    assert!(!hid.move_mouse(1, 1));
}

#[test]
fn server_full_is_surfaced_and_leaves_no_half_registered_service() {
    let stack = MockGattServer::new();
    let hid = hogp::initialize(stack.clone(), HidConfig::default()).unwrap();

    stack.0.borrow_mut().fail_add_service = Some(StackError::ServerFull);
    assert_eq!(hid.activate(HidProfile::Keyboard), Err(Error::ServerFull));
    assert_eq!(hid.active_profile(), None);

    // Caller may retry once the stack has room again.
    stack.0.borrow_mut().fail_add_service = None;
    assert!(hid.activate(HidProfile::Keyboard).is_ok());
    assert_eq!(hid.active_profile(), Some(HidProfile::Keyboard));
}

#[test]
fn add_service_failure_maps_to_the_resource_error() {
    let stack = MockGattServer::new();
    let hid = hogp::initialize(stack.clone(), HidConfig::default()).unwrap();
    stack.0.borrow_mut().fail_add_service = Some(StackError::AddServiceFailed);
    assert_eq!(hid.activate(HidProfile::Mouse), Err(Error::AddServiceFailed));
}

#[test]
fn unsupported_platform_fails_initialize() {
    let stack = MockGattServer::new();
    stack.0.borrow_mut().fail_open = true;
    match hogp::initialize(stack, HidConfig::default()) {
        Err(Error::PeripheralNotSupported) => {}
        other => panic!("expected PeripheralNotSupported, got {:?}", other.is_ok()),
    }
}
