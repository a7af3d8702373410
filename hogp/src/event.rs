//! Event types carried by the diagnostic streams.

use embassy_time::Instant;
use heapless::Vec;

use crate::ble::connection::{ConnectionState, PairingState};
use crate::ble::stack::{AttHandle, PeerId};
use crate::config::LogLevel;
use crate::descriptor::HidProfile;
use crate::REPORT_PAYLOAD_MAX;

/// Whether a report left the peripheral or arrived from the central.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReportDirection {
    Sent,
    Received,
}

/// One report observed by the tap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRecord {
    pub direction: ReportDirection,
    pub char_handle: AttHandle,
    pub payload: Vec<u8, REPORT_PAYLOAD_MAX>,
    pub success: bool,
    pub timestamp: Instant,
}

impl ReportRecord {
    pub fn new(direction: ReportDirection, char_handle: AttHandle, payload: &[u8], success: bool) -> Self {
        Self {
            direction,
            char_handle,
            payload: Vec::from_slice(payload).unwrap_or_default(),
            success,
            timestamp: Instant::now(),
        }
    }
}

/// Link, pairing and service lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectionEvent {
    StateChanged(ConnectionState),
    PairingChanged(PairingState),
    DeviceConnected { peer: PeerId },
    DeviceDisconnected { reason: u8 },
    PairingComplete { peer: PeerId, success: bool },
    ServiceAdded(HidProfile),
    ServiceRemoved(HidProfile),
    AdvertisingStarted,
    AdvertisingStopped,
}

/// A [`ConnectionEvent`] stamped on arrival at the tap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnectionRecord {
    pub event: ConnectionEvent,
    pub timestamp: Instant,
}

impl ConnectionRecord {
    pub fn new(event: ConnectionEvent) -> Self {
        Self {
            event,
            timestamp: Instant::now(),
        }
    }
}

/// One filtered log line kept in the in-memory ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: &'static str,
    pub timestamp: Instant,
}

/// A named measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MetricSample {
    pub name: &'static str,
    pub value: i64,
    pub unit: &'static str,
    pub timestamp: Instant,
}

/// Everything the tap can broadcast, tagged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticEvent {
    Log(LogEntry),
    Report(ReportRecord),
    Connection(ConnectionRecord),
    Metric(MetricSample),
}

impl DiagnosticEvent {
    pub fn metric(name: &'static str, value: i64, unit: &'static str) -> Self {
        DiagnosticEvent::Metric(MetricSample {
            name,
            value,
            unit,
            timestamp: Instant::now(),
        })
    }

    /// Monotonic timestamp of the wrapped event.
    pub fn timestamp(&self) -> Instant {
        match self {
            DiagnosticEvent::Log(e) => e.timestamp,
            DiagnosticEvent::Report(e) => e.timestamp,
            DiagnosticEvent::Metric(e) => e.timestamp,
            DiagnosticEvent::Connection(e) => e.timestamp,
        }
    }
}
