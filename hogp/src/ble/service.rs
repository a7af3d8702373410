//! HID service registry: builds the GATT service tables and dispatches
//! reads and writes addressed to them.

use heapless::Vec;
use hogp_types::led_indicator::LedIndicator;

use super::constants::{
    BleCharacteristics, BleDescriptor, BleService, Uuid16, CONTROL_POINT_EXIT_SUSPEND,
    CONTROL_POINT_SUSPEND,
};
use super::stack::{AttHandle, AttStatus, CharacteristicDef, DescriptorDef, Properties, ServiceDef};
use crate::config::ProtocolMode;
use crate::descriptor::{self, HidProfile, ReportType};
use crate::ATT_VALUE_MAX;

/// What a characteristic write meant, for the facade to act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WriteOutcome {
    /// Protocol Mode changed.
    ProtocolMode(ProtocolMode),
    /// Control Point suspend flag is now this value.
    Suspended(bool),
    /// An output report delivered LED state.
    OutputReport(LedIndicator),
    /// Accepted but nothing for the facade to do.
    Accepted,
}

/// Incrementally lays out a service's attribute table, assigning handles.
struct ServiceBuilder {
    def: ServiceDef,
    next_handle: AttHandle,
}

impl ServiceBuilder {
    fn new(uuid: Uuid16, first_handle: AttHandle) -> Self {
        Self {
            def: ServiceDef {
                uuid,
                characteristics: Vec::new(),
            },
            next_handle: first_handle,
        }
    }

    fn alloc(&mut self) -> AttHandle {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }

    /// Add a characteristic. A CCCD is allocated automatically when the
    /// properties include notify.
    fn add_characteristic(&mut self, uuid: Uuid16, props: Properties, value: &[u8]) -> AttHandle {
        let value_handle = self.alloc();
        let cccd_handle = if props.notify {
            let handle = self.alloc();
            Some(handle)
        } else {
            None
        };
        let mut descriptors = Vec::new();
        if let Some(handle) = cccd_handle {
            let _ = descriptors.push(DescriptorDef {
                handle,
                uuid: BleDescriptor::ClientCharacteristicConfiguration.uuid(),
                value: Vec::from_slice(&[0x00, 0x00]).unwrap_or_default(),
            });
        }
        let _ = self.def.characteristics.push(CharacteristicDef {
            uuid,
            props,
            value_handle,
            cccd_handle,
            descriptors,
            value: Vec::from_slice(value).unwrap_or_default(),
        });
        value_handle
    }

    /// Attach a Report Reference descriptor to the most recent characteristic.
    fn add_report_reference(&mut self, report_id: u8, report_type: ReportType) {
        let handle = self.alloc();
        if let Some(last) = self.def.characteristics.last_mut() {
            let _ = last.descriptors.push(DescriptorDef {
                handle,
                uuid: BleDescriptor::ReportReference.uuid(),
                value: Vec::from_slice(&[report_id, report_type as u8]).unwrap_or_default(),
            });
        }
    }

    fn build(self) -> (ServiceDef, AttHandle) {
        (self.def, self.next_handle)
    }
}

/// Owns the registered service tables plus the per-link HID state the host
/// writes into them (protocol mode, suspend flag, LED state).
pub(crate) struct ServiceRegistry {
    next_handle: AttHandle,
    hid: Option<(HidProfile, ServiceDef)>,
    battery: Option<ServiceDef>,
    protocol_mode: ProtocolMode,
    suspended: bool,
    led_state: LedIndicator,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self {
            next_handle: 0x0010,
            hid: None,
            battery: None,
            protocol_mode: ProtocolMode::Report,
            suspended: false,
            led_state: LedIndicator::new(),
        }
    }

    pub fn protocol_mode(&self) -> ProtocolMode {
        self.protocol_mode
    }

    pub fn suspended(&self) -> bool {
        self.suspended
    }

    pub fn led_state(&self) -> LedIndicator {
        self.led_state
    }

    pub fn hid_profile(&self) -> Option<HidProfile> {
        self.hid.as_ref().map(|(profile, _)| *profile)
    }

    pub fn hid_service(&self) -> Option<&ServiceDef> {
        self.hid.as_ref().map(|(_, def)| def)
    }

    pub fn battery_service(&self) -> Option<&ServiceDef> {
        self.battery.as_ref()
    }

    /// Build the HID service table for `profile` and remember it.
    pub fn install_hid(&mut self, profile: HidProfile, hid_info_flags: u8) -> &ServiceDef {
        let mut builder = ServiceBuilder::new(BleService::HidService.uuid(), self.next_handle);

        builder.add_characteristic(
            BleCharacteristics::HidInfo.uuid(),
            Properties::new().read(),
            &[
                0x11, 0x01, // HID version: 1.11
                0x00, // Country Code
                hid_info_flags,
            ],
        );
        builder.add_characteristic(
            BleCharacteristics::ReportMap.uuid(),
            Properties::new().read(),
            descriptor::descriptor_of(profile),
        );
        builder.add_characteristic(
            BleCharacteristics::HidControlPoint.uuid(),
            Properties::new().write_without_response(),
            &[0x00],
        );
        builder.add_characteristic(
            BleCharacteristics::ProtocolMode.uuid(),
            Properties::new().read().write_without_response(),
            &[self.protocol_mode as u8],
        );

        let input_spec = descriptor::report_spec_of(profile, ReportType::Input)
            .unwrap_or(descriptor::ReportSpec {
                report_id: 0,
                report_type: ReportType::Input,
                length_bytes: 8,
                layout: descriptor::ReportLayout::Keyboard,
            });
        let zeroed = [0u8; 16];
        builder.add_characteristic(
            BleCharacteristics::HidReport.uuid(),
            Properties::new().read().notify(),
            &zeroed[..input_spec.length_bytes],
        );
        builder.add_report_reference(input_spec.report_id, ReportType::Input);

        match profile {
            HidProfile::Keyboard => {
                builder.add_characteristic(
                    BleCharacteristics::HidReport.uuid(),
                    Properties::new().read().write().write_without_response(),
                    &[0x00],
                );
                builder.add_report_reference(descriptor::KEYBOARD_REPORT_ID, ReportType::Output);
                builder.add_characteristic(
                    BleCharacteristics::BootKeyboardInput.uuid(),
                    Properties::new().read().notify(),
                    &[0u8; 8],
                );
            }
            HidProfile::Mouse => {
                builder.add_characteristic(
                    BleCharacteristics::BootMouseInput.uuid(),
                    Properties::new().read().notify(),
                    &[0u8; 3],
                );
            }
            HidProfile::Consumer | HidProfile::Composite => {}
        }

        let (def, next) = builder.build();
        self.next_handle = next;
        self.hid = Some((profile, def));
        &self.hid.as_ref().unwrap().1
    }

    /// Forget the HID service table; returns the removed profile.
    pub fn remove_hid(&mut self) -> Option<HidProfile> {
        self.hid.take().map(|(profile, _)| profile)
    }

    /// Build and remember the battery service table.
    pub fn install_battery(&mut self) -> &ServiceDef {
        let mut builder = ServiceBuilder::new(BleService::BatteryService.uuid(), self.next_handle);
        builder.add_characteristic(
            BleCharacteristics::BatteryLevel.uuid(),
            Properties::new().read().notify(),
            &[100],
        );
        let (def, next) = builder.build();
        self.next_handle = next;
        self.battery = Some(def);
        self.battery.as_ref().unwrap()
    }

    /// Restore the per-link defaults. Called on every new link.
    pub fn reset_link(&mut self, default_mode: ProtocolMode) {
        self.protocol_mode = default_mode;
        self.suspended = false;
        self.set_protocol_mode_value();
    }

    fn services(&self) -> impl Iterator<Item = &ServiceDef> {
        self.hid
            .iter()
            .map(|(_, def)| def)
            .chain(self.battery.iter())
    }

    fn services_mut(&mut self) -> impl Iterator<Item = &mut ServiceDef> {
        self.hid
            .iter_mut()
            .map(|(_, def)| def)
            .chain(self.battery.iter_mut())
    }

    fn find_char(&self, handle: AttHandle) -> Option<&CharacteristicDef> {
        self.services()
            .flat_map(|s| s.characteristics.iter())
            .find(|c| c.value_handle == handle)
    }

    fn find_char_mut(&mut self, handle: AttHandle) -> Option<&mut CharacteristicDef> {
        self.services_mut()
            .flat_map(|s| s.characteristics.iter_mut())
            .find(|c| c.value_handle == handle)
    }

    fn find_descriptor(&self, handle: AttHandle) -> Option<&DescriptorDef> {
        self.services()
            .flat_map(|s| s.characteristics.iter())
            .flat_map(|c| c.descriptors.iter())
            .find(|d| d.handle == handle)
    }

    /// The characteristic a CCCD handle belongs to.
    pub fn char_of_cccd(&self, handle: AttHandle) -> Option<&CharacteristicDef> {
        self.services()
            .flat_map(|s| s.characteristics.iter())
            .find(|c| c.cccd_handle == Some(handle))
    }

    /// Handle of the HID input report characteristic for the current link's
    /// protocol mode (boot reroutes keyboard/mouse input when available).
    pub fn input_handle(&self) -> Option<AttHandle> {
        let (profile, def) = self.hid.as_ref()?;
        if self.protocol_mode == ProtocolMode::Boot {
            let boot_uuid = match profile {
                HidProfile::Keyboard => Some(BleCharacteristics::BootKeyboardInput.uuid()),
                HidProfile::Mouse => Some(BleCharacteristics::BootMouseInput.uuid()),
                _ => None,
            };
            if let Some(uuid) = boot_uuid {
                if let Some(c) = def.characteristics.iter().find(|c| c.uuid == uuid) {
                    return Some(c.value_handle);
                }
            }
        }
        def.characteristics
            .iter()
            .find(|c| c.uuid == BleCharacteristics::HidReport.uuid() && c.props.notify)
            .map(|c| c.value_handle)
    }

    /// Handle of the battery level characteristic.
    pub fn battery_handle(&self) -> Option<AttHandle> {
        self.battery.as_ref().and_then(|def| {
            def.characteristics
                .iter()
                .find(|c| c.uuid == BleCharacteristics::BatteryLevel.uuid())
                .map(|c| c.value_handle)
        })
    }

    /// Cache `value` as the last value of a characteristic, so reads
    /// observe the most recent write/notification.
    pub fn set_char_value(&mut self, handle: AttHandle, value: &[u8]) {
        if let Some(c) = self.find_char_mut(handle) {
            c.value = Vec::from_slice(value).unwrap_or_default();
        }
    }

    /// Serve a read of a characteristic value or descriptor from `offset`.
    pub fn on_read(&self, handle: AttHandle, offset: u16) -> Result<Vec<u8, ATT_VALUE_MAX>, AttStatus> {
        let value: &[u8] = if let Some(c) = self.find_char(handle) {
            if !c.props.read {
                return Err(AttStatus::ReadNotPermitted);
            }
            &c.value
        } else if let Some(d) = self.find_descriptor(handle) {
            &d.value
        } else {
            return Err(AttStatus::AttributeNotFound);
        };
        let offset = offset as usize;
        if offset > value.len() {
            return Err(AttStatus::InvalidOffset);
        }
        Ok(Vec::from_slice(&value[offset..]).unwrap_or_default())
    }

    /// Apply a characteristic write from the central.
    pub fn on_write(&mut self, handle: AttHandle, value: &[u8]) -> Result<WriteOutcome, AttStatus> {
        let (uuid, writable) = match self.find_char(handle) {
            Some(c) => (c.uuid, c.props.writable()),
            // Writes to unknown characteristics are not permitted.
            None => return Err(AttStatus::WriteNotPermitted),
        };
        if !writable {
            return Err(AttStatus::WriteNotPermitted);
        }

        if uuid == BleCharacteristics::ProtocolMode.uuid() {
            if value.len() != 1 {
                return Err(AttStatus::InvalidAttributeValueLength);
            }
            return match ProtocolMode::from_byte(value[0]) {
                Some(mode) => {
                    self.protocol_mode = mode;
                    self.set_protocol_mode_value();
                    Ok(WriteOutcome::ProtocolMode(mode))
                }
                // Reserved values are ignored, per HOGP.
                None => Ok(WriteOutcome::Accepted),
            };
        }

        if uuid == BleCharacteristics::HidControlPoint.uuid() {
            if value.len() != 1 {
                return Err(AttStatus::InvalidAttributeValueLength);
            }
            match value[0] {
                CONTROL_POINT_SUSPEND => self.suspended = true,
                CONTROL_POINT_EXIT_SUSPEND => self.suspended = false,
                _ => return Ok(WriteOutcome::Accepted),
            }
            return Ok(WriteOutcome::Suspended(self.suspended));
        }

        if uuid == BleCharacteristics::HidReport.uuid() {
            // Output report: LED bitmap, parsed and recorded but consumed
            // silently.
            if value.is_empty() {
                return Err(AttStatus::InvalidAttributeValueLength);
            }
            let led = LedIndicator::from_bits(value[0]);
            self.led_state = led;
            self.set_char_value(handle, value);
            return Ok(WriteOutcome::OutputReport(led));
        }

        self.set_char_value(handle, value);
        Ok(WriteOutcome::Accepted)
    }

    fn set_protocol_mode_value(&mut self) {
        let mode = self.protocol_mode as u8;
        let uuid = BleCharacteristics::ProtocolMode.uuid();
        for c in self.services_mut().flat_map(|s| s.characteristics.iter_mut()) {
            if c.uuid == uuid {
                c.value = Vec::from_slice(&[mode]).unwrap_or_default();
            }
        }
    }
}
