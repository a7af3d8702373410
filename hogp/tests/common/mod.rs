//! Shared test harness: a recording mock GATT stack plus helpers to bring
//! the engine into a connected, notification-enabled state.

use std::cell::RefCell;
use std::rc::Rc;

use hogp::ble::constants::{BleCharacteristics, Uuid16};
use hogp::ble::stack::{
    AttHandle, AttStatus, GattServerEvent, GattServerOps, LinkState, PeerId, ServiceDef,
    StackError,
};
use hogp::config::HidConfig;
use hogp::descriptor::HidProfile;
use hogp::HidPeripheral;

// Init logger for tests
#[ctor::ctor]
pub fn init_log() {
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Debug)
        .is_test(true)
        .try_init();
}

pub const PEER: PeerId = PeerId([0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);

/// Everything the mock stack records.
#[derive(Debug, Clone, PartialEq)]
pub enum StackCall {
    Open,
    AddService(u16),
    RemoveService(u16),
    Notify { handle: AttHandle, value: Vec<u8> },
    Response {
        req_id: u32,
        status: AttStatus,
        offset: u16,
        value: Vec<u8>,
    },
}

#[derive(Default)]
pub struct MockState {
    pub calls: Vec<StackCall>,
    pub services: Vec<ServiceDef>,
    pub fail_open: bool,
    pub fail_add_service: Option<StackError>,
    pub fail_notify: Option<StackError>,
}

/// Recording stack double. Clones share state.
#[derive(Clone, Default)]
pub struct MockGattServer(pub Rc<RefCell<MockState>>);

impl MockGattServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Payloads of every `notify` call, in order.
    pub fn notified(&self) -> Vec<Vec<u8>> {
        self.0
            .borrow()
            .calls
            .iter()
            .filter_map(|c| match c {
                StackCall::Notify { value, .. } => Some(value.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn notify_count(&self) -> usize {
        self.notified().len()
    }

    /// Responses sent back to the central, in order.
    pub fn responses(&self) -> Vec<(u32, AttStatus, Vec<u8>)> {
        self.0
            .borrow()
            .calls
            .iter()
            .filter_map(|c| match c {
                StackCall::Response {
                    req_id,
                    status,
                    value,
                    ..
                } => Some((*req_id, *status, value.clone())),
                _ => None,
            })
            .collect()
    }

    /// Uuids of the services currently registered.
    pub fn service_uuids(&self) -> Vec<u16> {
        self.0.borrow().services.iter().map(|s| s.uuid.0).collect()
    }

    /// Find a characteristic of a registered service by uuid.
    pub fn find_char(&self, uuid: u16) -> Option<(AttHandle, Option<AttHandle>)> {
        self.0.borrow().services.iter().find_map(|s| {
            s.characteristics
                .iter()
                .find(|c| c.uuid == Uuid16(uuid))
                .map(|c| (c.value_handle, c.cccd_handle))
        })
    }

    /// CCCD handle of the characteristic whose value handle is `handle`.
    pub fn cccd_of(&self, handle: AttHandle) -> Option<AttHandle> {
        self.0.borrow().services.iter().find_map(|s| {
            s.characteristics
                .iter()
                .find(|c| c.value_handle == handle)
                .and_then(|c| c.cccd_handle)
        })
    }
}

impl GattServerOps for MockGattServer {
    fn open(&mut self) -> Result<(), StackError> {
        if self.0.borrow().fail_open {
            return Err(StackError::NotSupported);
        }
        self.0.borrow_mut().calls.push(StackCall::Open);
        Ok(())
    }

    fn add_service(&mut self, service: &ServiceDef) -> Result<(), StackError> {
        let mut state = self.0.borrow_mut();
        if let Some(e) = state.fail_add_service {
            return Err(e);
        }
        state.calls.push(StackCall::AddService(service.uuid.0));
        state.services.push(service.clone());
        Ok(())
    }

    fn remove_service(&mut self, uuid: Uuid16) -> Result<(), StackError> {
        let mut state = self.0.borrow_mut();
        let before = state.services.len();
        state.services.retain(|s| s.uuid != uuid);
        if state.services.len() == before {
            return Err(StackError::ServiceNotFound);
        }
        state.calls.push(StackCall::RemoveService(uuid.0));
        Ok(())
    }

    fn notify(&mut self, _peer: PeerId, handle: AttHandle, value: &[u8]) -> Result<(), StackError> {
        let mut state = self.0.borrow_mut();
        if let Some(e) = state.fail_notify {
            return Err(e);
        }
        state.calls.push(StackCall::Notify {
            handle,
            value: value.to_vec(),
        });
        Ok(())
    }

    fn send_response(
        &mut self,
        _peer: PeerId,
        req_id: u32,
        status: AttStatus,
        offset: u16,
        value: &[u8],
    ) {
        self.0.borrow_mut().calls.push(StackCall::Response {
            req_id,
            status,
            offset,
            value: value.to_vec(),
        });
    }
}

/// Engine with `profile` active on a fresh mock stack.
pub fn setup(profile: HidProfile) -> (HidPeripheral<MockGattServer>, MockGattServer) {
    setup_with_config(profile, HidConfig::default())
}

pub fn setup_with_config(
    profile: HidProfile,
    config: HidConfig,
) -> (HidPeripheral<MockGattServer>, MockGattServer) {
    let stack = MockGattServer::new();
    let hid = hogp::initialize(stack.clone(), config).expect("initialize");
    hid.activate(profile).expect("activate");
    (hid, stack)
}

/// Simulate the central connecting.
pub fn connect(hid: &HidPeripheral<MockGattServer>) {
    hid.handle_event(GattServerEvent::ConnectionStateChange {
        peer: PEER,
        status: 0,
        new_state: LinkState::Connected,
    });
}

/// Simulate the central dropping the link.
pub fn disconnect(hid: &HidPeripheral<MockGattServer>, reason: u8) {
    hid.handle_event(GattServerEvent::ConnectionStateChange {
        peer: PEER,
        status: reason,
        new_state: LinkState::Disconnected,
    });
}

/// Central writes `0x0001` to the CCCD of the characteristic whose value
/// handle is `handle`.
pub fn enable_cccd(hid: &HidPeripheral<MockGattServer>, stack: &MockGattServer, handle: AttHandle) {
    let cccd = stack.cccd_of(handle).expect("characteristic has a CCCD");
    hid.handle_event(GattServerEvent::DescriptorWrite {
        peer: PEER,
        req_id: 1,
        handle: cccd,
        value: heapless::Vec::from_slice(&[0x01, 0x00]).unwrap(),
        response_needed: true,
        offset: 0,
    });
}

/// Enable notifications on the active profile's input report.
pub fn enable_input_notifications(hid: &HidPeripheral<MockGattServer>, stack: &MockGattServer) {
    let handle = hid.input_handle().expect("input characteristic");
    enable_cccd(hid, stack, handle);
}

/// Stack acks the in-flight notification.
pub fn ack(hid: &HidPeripheral<MockGattServer>, success: bool) {
    hid.handle_event(GattServerEvent::NotificationSent {
        peer: PEER,
        success,
    });
}

/// Central writes a byte to the HID Control Point.
pub fn write_control_point(
    hid: &HidPeripheral<MockGattServer>,
    stack: &MockGattServer,
    byte: u8,
) {
    let (handle, _) = stack
        .find_char(BleCharacteristics::HidControlPoint as u16)
        .expect("control point");
    hid.handle_event(GattServerEvent::CharacteristicWrite {
        peer: PEER,
        req_id: 7,
        handle,
        value: heapless::Vec::from_slice(&[byte]).unwrap(),
        response_needed: false,
        offset: 0,
    });
}
