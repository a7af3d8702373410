//! GATT/HID assigned numbers used by the engine.
//!
//! Full reference: https://www.bluetooth.com/specifications/assigned-numbers/

/// 16-bit Bluetooth SIG UUID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Uuid16(pub u16);

/// Service uuids used by the peripheral
pub enum BleService {
    DeviceInformation = 0x180A,
    BatteryService = 0x180F,
    HidService = 0x1812,
}

/// Characteristic uuids used by the peripheral
pub enum BleCharacteristics {
    BatteryLevel = 0x2A19,
    BootKeyboardInput = 0x2A22,
    BootMouseInput = 0x2A33,
    HidInfo = 0x2A4A,
    ReportMap = 0x2A4B,
    HidControlPoint = 0x2A4C,
    HidReport = 0x2A4D,
    ProtocolMode = 0x2A4E,
}

pub enum BleDescriptor {
    ClientCharacteristicConfiguration = 0x2902,
    ReportReference = 0x2908,
}

impl BleService {
    pub fn uuid(self) -> Uuid16 {
        Uuid16(self as u16)
    }
}

impl BleCharacteristics {
    pub fn uuid(self) -> Uuid16 {
        Uuid16(self as u16)
    }
}

impl BleDescriptor {
    pub fn uuid(self) -> Uuid16 {
        Uuid16(self as u16)
    }
}

/// HID Control Point command bytes.
pub const CONTROL_POINT_SUSPEND: u8 = 0x00;
pub const CONTROL_POINT_EXIT_SUSPEND: u8 = 0x01;
