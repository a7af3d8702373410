//! Report descriptor catalog and input report types.
//!
//! The report maps are hand-written byte blobs rather than macro output:
//! the consumer map is a bitmask over an explicit usage list and the
//! combined map concatenates three collections without report ids, neither
//! of which `#[gen_hid_descriptor]` can express. Each report struct gets a
//! manual [`SerializedDescriptor`] impl instead, and is marshalled with
//! `ssmarshal` on the notify path.

use serde::Serialize;
use usbd_hid::descriptor::{AsInputReport, SerializedDescriptor};

/// Report id of the keyboard input/output reports.
pub const KEYBOARD_REPORT_ID: u8 = 0x01;
/// Report id of the standalone mouse input report.
pub const MOUSE_REPORT_ID: u8 = 0x01;
/// Report id of the consumer-control input report.
pub const CONSUMER_REPORT_ID: u8 = 0x02;

/// HID profiles the engine can publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HidProfile {
    Keyboard,
    Mouse,
    Consumer,
    /// Single characteristic carrying media + mouse + keyboard payloads
    /// with no report ids, for centrals that mishandle multi-service maps.
    Composite,
}

/// HID report type byte as used in the Report Reference descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReportType {
    Input = 0x01,
    Output = 0x02,
    Feature = 0x03,
}

/// Shape of a report payload, for consumers that decode raw bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReportLayout {
    /// `[modifiers, reserved, key0..key5]`
    Keyboard,
    /// `[buttons, dx, dy, wheel]`
    Mouse,
    /// `[mask_lo, mask_hi]`
    Consumer,
    /// `[mask_lo, mask_hi, buttons, dx, dy, wheel, modifiers, reserved, key0..key5]`
    Combined,
    /// One byte of LED bits, Num Lock first.
    LedBitmap,
}

/// Layout metadata for one report of a profile.
///
/// `length_bytes` is the payload length the encoder writes; the report id
/// is never part of the payload on the BLE transport (it travels in the
/// Report Reference descriptor instead).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ReportSpec {
    pub report_id: u8,
    pub report_type: ReportType,
    pub length_bytes: usize,
    pub layout: ReportLayout,
}

/// Keyboard report map: report id 1, 8 modifier bits, reserved byte,
/// 5 LED output bits + 3 padding, 6 key slots over the full usage range.
#[rustfmt::skip]
pub const KEYBOARD_REPORT_DESC: &[u8] = &[
    0x05, 0x01,       // Usage Page (Generic Desktop)
    0x09, 0x06,       // Usage (Keyboard)
    0xA1, 0x01,       // Collection (Application)
    0x85, 0x01,       //   Report ID (1)
    0x05, 0x07,       //   Usage Page (Keyboard/Keypad)
    0x19, 0xE0,       //   Usage Minimum (Left Control)
    0x29, 0xE7,       //   Usage Maximum (Right GUI)
    0x15, 0x00,       //   Logical Minimum (0)
    0x25, 0x01,       //   Logical Maximum (1)
    0x75, 0x01,       //   Report Size (1)
    0x95, 0x08,       //   Report Count (8)
    0x81, 0x02,       //   Input (Data,Var,Abs)     ; modifier bits
    0x75, 0x08,       //   Report Size (8)
    0x95, 0x01,       //   Report Count (1)
    0x81, 0x01,       //   Input (Const)            ; reserved byte
    0x05, 0x08,       //   Usage Page (LEDs)
    0x19, 0x01,       //   Usage Minimum (Num Lock)
    0x29, 0x05,       //   Usage Maximum (Kana)
    0x75, 0x01,       //   Report Size (1)
    0x95, 0x05,       //   Report Count (5)
    0x91, 0x02,       //   Output (Data,Var,Abs)    ; LED bits
    0x75, 0x03,       //   Report Size (3)
    0x95, 0x01,       //   Report Count (1)
    0x91, 0x01,       //   Output (Const)           ; LED padding
    0x05, 0x07,       //   Usage Page (Keyboard/Keypad)
    0x19, 0x00,       //   Usage Minimum (0)
    0x29, 0xFF,       //   Usage Maximum (255)
    0x15, 0x00,       //   Logical Minimum (0)
    0x26, 0xFF, 0x00, //   Logical Maximum (255)
    0x75, 0x08,       //   Report Size (8)
    0x95, 0x06,       //   Report Count (6)
    0x81, 0x00,       //   Input (Data,Array)       ; key slots
    0xC0,             // End Collection
];

/// Mouse report map with report id 1: 3 buttons + 5 padding bits, then
/// X/Y/Wheel as signed 8-bit relative values.
#[rustfmt::skip]
pub const MOUSE_REPORT_DESC: &[u8] = &[
    0x05, 0x01,       // Usage Page (Generic Desktop)
    0x09, 0x02,       // Usage (Mouse)
    0xA1, 0x01,       // Collection (Application)
    0x85, 0x01,       //   Report ID (1)
    0x09, 0x01,       //   Usage (Pointer)
    0xA1, 0x00,       //   Collection (Physical)
    0x05, 0x09,       //     Usage Page (Buttons)
    0x19, 0x01,       //     Usage Minimum (Button 1)
    0x29, 0x03,       //     Usage Maximum (Button 3)
    0x15, 0x00,       //     Logical Minimum (0)
    0x25, 0x01,       //     Logical Maximum (1)
    0x95, 0x03,       //     Report Count (3)
    0x75, 0x01,       //     Report Size (1)
    0x81, 0x02,       //     Input (Data,Var,Abs)   ; button bits
    0x95, 0x01,       //     Report Count (1)
    0x75, 0x05,       //     Report Size (5)
    0x81, 0x01,       //     Input (Const)          ; button padding
    0x05, 0x01,       //     Usage Page (Generic Desktop)
    0x09, 0x30,       //     Usage (X)
    0x09, 0x31,       //     Usage (Y)
    0x09, 0x38,       //     Usage (Wheel)
    0x15, 0x81,       //     Logical Minimum (-127)
    0x25, 0x7F,       //     Logical Maximum (127)
    0x75, 0x08,       //     Report Size (8)
    0x95, 0x03,       //     Report Count (3)
    0x81, 0x06,       //     Input (Data,Var,Rel)
    0xC0,             //   End Collection
    0xC0,             // End Collection
];

/// The same mouse map without a report id, as embedded in the combined map.
#[rustfmt::skip]
pub const MOUSE_REPORT_DESC_NO_ID: &[u8] = &[
    0x05, 0x01,       // Usage Page (Generic Desktop)
    0x09, 0x02,       // Usage (Mouse)
    0xA1, 0x01,       // Collection (Application)
    0x09, 0x01,       //   Usage (Pointer)
    0xA1, 0x00,       //   Collection (Physical)
    0x05, 0x09,       //     Usage Page (Buttons)
    0x19, 0x01,       //     Usage Minimum (Button 1)
    0x29, 0x03,       //     Usage Maximum (Button 3)
    0x15, 0x00,       //     Logical Minimum (0)
    0x25, 0x01,       //     Logical Maximum (1)
    0x95, 0x03,       //     Report Count (3)
    0x75, 0x01,       //     Report Size (1)
    0x81, 0x02,       //     Input (Data,Var,Abs)
    0x95, 0x01,       //     Report Count (1)
    0x75, 0x05,       //     Report Size (5)
    0x81, 0x01,       //     Input (Const)
    0x05, 0x01,       //     Usage Page (Generic Desktop)
    0x09, 0x30,       //     Usage (X)
    0x09, 0x31,       //     Usage (Y)
    0x09, 0x38,       //     Usage (Wheel)
    0x15, 0x81,       //     Logical Minimum (-127)
    0x25, 0x7F,       //     Logical Maximum (127)
    0x75, 0x08,       //     Report Size (8)
    0x95, 0x03,       //     Report Count (3)
    0x81, 0x06,       //     Input (Data,Var,Rel)
    0xC0,             //   End Collection
    0xC0,             // End Collection
];

/// Consumer-control report map: report id 2, a 16-bit bitmask with one bit
/// per declared usage. Bit order matches [`hogp_types::media_key::MediaKeys`].
#[rustfmt::skip]
pub const CONSUMER_REPORT_DESC: &[u8] = &[
    0x05, 0x0C,       // Usage Page (Consumer Devices)
    0x09, 0x01,       // Usage (Consumer Control)
    0xA1, 0x01,       // Collection (Application)
    0x85, 0x02,       //   Report ID (2)
    0x15, 0x00,       //   Logical Minimum (0)
    0x25, 0x01,       //   Logical Maximum (1)
    0x75, 0x01,       //   Report Size (1)
    0x95, 0x10,       //   Report Count (16)
    0x09, 0xCD,       //   Usage (Play/Pause)
    0x09, 0xB5,       //   Usage (Scan Next Track)
    0x09, 0xB6,       //   Usage (Scan Previous Track)
    0x09, 0xE9,       //   Usage (Volume Increment)
    0x09, 0xEA,       //   Usage (Volume Decrement)
    0x09, 0xE2,       //   Usage (Mute)
    0x09, 0xB7,       //   Usage (Stop)
    0x09, 0xB8,       //   Usage (Eject)
    0x09, 0xB2,       //   Usage (Record)
    0x09, 0xB3,       //   Usage (Fast Forward)
    0x09, 0xB4,       //   Usage (Rewind)
    0x0A, 0x8A, 0x01, //   Usage (AL Email Reader)
    0x0A, 0x92, 0x01, //   Usage (AL Calculator)
    0x0A, 0x21, 0x02, //   Usage (AC Search)
    0x0A, 0x23, 0x02, //   Usage (AC Home)
    0x0A, 0x24, 0x02, //   Usage (AC Back)
    0x81, 0x02,       //   Input (Data,Var,Abs)
    0xC0,             // End Collection
];

/// Combined report map: media + mouse + keyboard collections with no report
/// ids, yielding one 14-byte input report
/// `[mask_lo, mask_hi, buttons, dx, dy, wheel, modifiers, reserved, key0..key5]`.
#[rustfmt::skip]
pub const COMBINED_REPORT_DESC: &[u8] = &[
    // Consumer control, 16-bit bitmask
    0x05, 0x0C,       // Usage Page (Consumer Devices)
    0x09, 0x01,       // Usage (Consumer Control)
    0xA1, 0x01,       // Collection (Application)
    0x15, 0x00,       //   Logical Minimum (0)
    0x25, 0x01,       //   Logical Maximum (1)
    0x75, 0x01,       //   Report Size (1)
    0x95, 0x10,       //   Report Count (16)
    0x09, 0xCD,       //   Usage (Play/Pause)
    0x09, 0xB5,       //   Usage (Scan Next Track)
    0x09, 0xB6,       //   Usage (Scan Previous Track)
    0x09, 0xE9,       //   Usage (Volume Increment)
    0x09, 0xEA,       //   Usage (Volume Decrement)
    0x09, 0xE2,       //   Usage (Mute)
    0x09, 0xB7,       //   Usage (Stop)
    0x09, 0xB8,       //   Usage (Eject)
    0x09, 0xB2,       //   Usage (Record)
    0x09, 0xB3,       //   Usage (Fast Forward)
    0x09, 0xB4,       //   Usage (Rewind)
    0x0A, 0x8A, 0x01, //   Usage (AL Email Reader)
    0x0A, 0x92, 0x01, //   Usage (AL Calculator)
    0x0A, 0x21, 0x02, //   Usage (AC Search)
    0x0A, 0x23, 0x02, //   Usage (AC Home)
    0x0A, 0x24, 0x02, //   Usage (AC Back)
    0x81, 0x02,       //   Input (Data,Var,Abs)
    0xC0,             // End Collection
    // Mouse
    0x05, 0x01,       // Usage Page (Generic Desktop)
    0x09, 0x02,       // Usage (Mouse)
    0xA1, 0x01,       // Collection (Application)
    0x09, 0x01,       //   Usage (Pointer)
    0xA1, 0x00,       //   Collection (Physical)
    0x05, 0x09,       //     Usage Page (Buttons)
    0x19, 0x01,       //     Usage Minimum (Button 1)
    0x29, 0x03,       //     Usage Maximum (Button 3)
    0x15, 0x00,       //     Logical Minimum (0)
    0x25, 0x01,       //     Logical Maximum (1)
    0x95, 0x03,       //     Report Count (3)
    0x75, 0x01,       //     Report Size (1)
    0x81, 0x02,       //     Input (Data,Var,Abs)
    0x95, 0x01,       //     Report Count (1)
    0x75, 0x05,       //     Report Size (5)
    0x81, 0x01,       //     Input (Const)
    0x05, 0x01,       //     Usage Page (Generic Desktop)
    0x09, 0x30,       //     Usage (X)
    0x09, 0x31,       //     Usage (Y)
    0x09, 0x38,       //     Usage (Wheel)
    0x15, 0x81,       //     Logical Minimum (-127)
    0x25, 0x7F,       //     Logical Maximum (127)
    0x75, 0x08,       //     Report Size (8)
    0x95, 0x03,       //     Report Count (3)
    0x81, 0x06,       //     Input (Data,Var,Rel)
    0xC0,             //   End Collection
    0xC0,             // End Collection
    // Keyboard
    0x05, 0x01,       // Usage Page (Generic Desktop)
    0x09, 0x06,       // Usage (Keyboard)
    0xA1, 0x01,       // Collection (Application)
    0x05, 0x07,       //   Usage Page (Keyboard/Keypad)
    0x19, 0xE0,       //   Usage Minimum (Left Control)
    0x29, 0xE7,       //   Usage Maximum (Right GUI)
    0x15, 0x00,       //   Logical Minimum (0)
    0x25, 0x01,       //   Logical Maximum (1)
    0x75, 0x01,       //   Report Size (1)
    0x95, 0x08,       //   Report Count (8)
    0x81, 0x02,       //   Input (Data,Var,Abs)
    0x75, 0x08,       //   Report Size (8)
    0x95, 0x01,       //   Report Count (1)
    0x81, 0x01,       //   Input (Const)
    0x19, 0x00,       //   Usage Minimum (0)
    0x29, 0xFF,       //   Usage Maximum (255)
    0x15, 0x00,       //   Logical Minimum (0)
    0x26, 0xFF, 0x00, //   Logical Maximum (255)
    0x75, 0x08,       //   Report Size (8)
    0x95, 0x06,       //   Report Count (6)
    0x81, 0x00,       //   Input (Data,Array)
    0xC0,             // End Collection
];

/// The report map blob published for `profile`.
pub fn descriptor_of(profile: HidProfile) -> &'static [u8] {
    match profile {
        HidProfile::Keyboard => KEYBOARD_REPORT_DESC,
        HidProfile::Mouse => MOUSE_REPORT_DESC,
        HidProfile::Consumer => CONSUMER_REPORT_DESC,
        HidProfile::Composite => COMBINED_REPORT_DESC,
    }
}

/// Layout metadata for the report of `profile` in direction `report_type`.
///
/// Returns `None` for directions the profile does not carry (only the
/// keyboard has an output report).
pub fn report_spec_of(profile: HidProfile, report_type: ReportType) -> Option<ReportSpec> {
    match (profile, report_type) {
        (HidProfile::Keyboard, ReportType::Input) => Some(ReportSpec {
            report_id: KEYBOARD_REPORT_ID,
            report_type: ReportType::Input,
            length_bytes: 8,
            layout: ReportLayout::Keyboard,
        }),
        (HidProfile::Keyboard, ReportType::Output) => Some(ReportSpec {
            report_id: KEYBOARD_REPORT_ID,
            report_type: ReportType::Output,
            length_bytes: 1,
            layout: ReportLayout::LedBitmap,
        }),
        (HidProfile::Mouse, ReportType::Input) => Some(ReportSpec {
            report_id: MOUSE_REPORT_ID,
            report_type: ReportType::Input,
            length_bytes: 4,
            layout: ReportLayout::Mouse,
        }),
        (HidProfile::Consumer, ReportType::Input) => Some(ReportSpec {
            report_id: CONSUMER_REPORT_ID,
            report_type: ReportType::Input,
            length_bytes: 2,
            layout: ReportLayout::Consumer,
        }),
        (HidProfile::Composite, ReportType::Input) => Some(ReportSpec {
            report_id: 0,
            report_type: ReportType::Input,
            length_bytes: 14,
            layout: ReportLayout::Combined,
        }),
        _ => None,
    }
}

/// 8-byte keyboard input report.
#[derive(Serialize, Default, Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KeyboardReport {
    pub modifier: u8,
    pub reserved: u8,
    pub keycodes: [u8; 6],
}

impl SerializedDescriptor for KeyboardReport {
    fn desc() -> &'static [u8] {
        KEYBOARD_REPORT_DESC
    }
}
impl AsInputReport for KeyboardReport {
    fn serialize(&self, buffer: &mut [u8]) -> Result<usize, usbd_hid::descriptor::BufferOverflow> {
        ssmarshal::serialize(buffer, self).map_err(|_| usbd_hid::descriptor::BufferOverflow)
    }
}

/// 4-byte mouse input report.
#[derive(Serialize, Default, Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MouseReport {
    pub buttons: u8,
    pub x: i8,
    pub y: i8,
    pub wheel: i8,
}

impl SerializedDescriptor for MouseReport {
    fn desc() -> &'static [u8] {
        MOUSE_REPORT_DESC
    }
}
impl AsInputReport for MouseReport {
    fn serialize(&self, buffer: &mut [u8]) -> Result<usize, usbd_hid::descriptor::BufferOverflow> {
        ssmarshal::serialize(buffer, self).map_err(|_| usbd_hid::descriptor::BufferOverflow)
    }
}

/// 2-byte consumer-control input report, little-endian bitmask.
#[derive(Serialize, Default, Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConsumerReport {
    pub usage_bits: u16,
}

impl SerializedDescriptor for ConsumerReport {
    fn desc() -> &'static [u8] {
        CONSUMER_REPORT_DESC
    }
}
impl AsInputReport for ConsumerReport {
    fn serialize(&self, buffer: &mut [u8]) -> Result<usize, usbd_hid::descriptor::BufferOverflow> {
        ssmarshal::serialize(buffer, self).map_err(|_| usbd_hid::descriptor::BufferOverflow)
    }
}

/// 14-byte combined input report.
#[derive(Serialize, Default, Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CombinedReport {
    pub media: u16,
    pub buttons: u8,
    pub x: i8,
    pub y: i8,
    pub wheel: i8,
    pub modifier: u8,
    pub reserved: u8,
    pub keycodes: [u8; 6],
}

impl SerializedDescriptor for CombinedReport {
    fn desc() -> &'static [u8] {
        COMBINED_REPORT_DESC
    }
}
impl AsInputReport for CombinedReport {
    fn serialize(&self, buffer: &mut [u8]) -> Result<usize, usbd_hid::descriptor::BufferOverflow> {
        ssmarshal::serialize(buffer, self).map_err(|_| usbd_hid::descriptor::BufferOverflow)
    }
}

/// An input report produced by the encoder, tagged by shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Report {
    Keyboard(KeyboardReport),
    Mouse(MouseReport),
    Consumer(ConsumerReport),
    Combined(CombinedReport),
}

impl Report {
    /// Marshal the report into its wire payload.
    pub fn to_bytes(&self) -> heapless::Vec<u8, { crate::REPORT_PAYLOAD_MAX }> {
        let mut buf = [0u8; crate::REPORT_PAYLOAD_MAX];
        // Fixed-size integer fields only, so marshalling cannot fail.
        let n = match self {
            Report::Keyboard(r) => ssmarshal::serialize(&mut buf, r),
            Report::Mouse(r) => ssmarshal::serialize(&mut buf, r),
            Report::Consumer(r) => ssmarshal::serialize(&mut buf, r),
            Report::Combined(r) => ssmarshal::serialize(&mut buf, r),
        }
        .unwrap_or(0);
        heapless::Vec::from_slice(&buf[..n]).unwrap_or_default()
    }
}
