//! Tunable configuration for the engine.

use embassy_time::Duration;

/// Severity filter for the in-memory diagnostic log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
    Verbose = 4,
}

/// HID protocol mode as written to the Protocol Mode characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProtocolMode {
    Boot = 0x00,
    #[default]
    Report = 0x01,
}

impl ProtocolMode {
    pub(crate) fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(ProtocolMode::Boot),
            0x01 => Some(ProtocolMode::Report),
            _ => None,
        }
    }
}

/// Engine configuration. `Default` gives the values a typical host wants.
pub struct HidConfig {
    /// Severity filter for diagnostic log entries.
    pub log_level: LogLevel,
    /// Bound on the per-link notification queue, 1..=128.
    pub max_queue_per_link: usize,
    /// Hard timeout on the `Connecting` state.
    pub connection_timeout: Duration,
    /// Protocol mode restored on every new link.
    pub default_protocol_mode: ProtocolMode,
    /// Flags byte of the HID Information characteristic.
    /// 0x03 = remote wake + normally connectable; constrained peripherals
    /// may use 0x01.
    pub hid_info_flags: u8,
}

impl Default for HidConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            max_queue_per_link: 32,
            connection_timeout: Duration::from_secs(30),
            default_protocol_mode: ProtocolMode::Report,
            hid_info_flags: 0x03,
        }
    }
}

impl HidConfig {
    /// Queue bound clamped into the storage the engine actually has.
    pub(crate) fn queue_bound(&self) -> usize {
        self.max_queue_per_link.clamp(1, crate::NOTIFICATION_QUEUE_DEPTH)
    }
}
