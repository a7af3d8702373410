//! Notification engine: per-link CCCD state and the single in-flight
//! ack-driven send queue.
//!
//! The drain is a state machine, not a chain of awaits: `notify` on the
//! stack only initiates a send, and the queue stays blocked until the
//! stack's completion callback arrives. Requests whose CCCD is disabled at
//! dequeue time are dropped without blocking the rest of the queue.

use embassy_time::Instant;
use heapless::{Deque, Vec};

use super::stack::{AttHandle, GattServerOps, PeerId};
use crate::config::LogLevel;
use crate::diagnostics::{DiagStreams, DiagnosticsTap};
use crate::error::Error;
use crate::event::{ReportDirection, ReportRecord};
use crate::{NOTIFICATION_QUEUE_DEPTH, REPORT_PAYLOAD_MAX};

/// Queue priority. Release/zero reports go in High so a release is never
/// lost behind a storm of moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Priority {
    Normal,
    High,
}

/// Per-characteristic, per-link notification enablement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CccdState {
    #[default]
    Disabled,
    NotificationsEnabled,
    IndicationsEnabled,
}

impl CccdState {
    /// Parse the two CCCD bytes (little-endian u16).
    pub fn from_bytes(value: &[u8]) -> Option<Self> {
        if value.len() < 2 {
            return None;
        }
        match u16::from_le_bytes([value[0], value[1]]) {
            0x0000 => Some(CccdState::Disabled),
            0x0001 => Some(CccdState::NotificationsEnabled),
            0x0002 => Some(CccdState::IndicationsEnabled),
            _ => None,
        }
    }

    pub fn to_bytes(self) -> [u8; 2] {
        let raw: u16 = match self {
            CccdState::Disabled => 0x0000,
            CccdState::NotificationsEnabled => 0x0001,
            CccdState::IndicationsEnabled => 0x0002,
        };
        raw.to_le_bytes()
    }
}

/// A queued notification. Owned exclusively by the engine until the stack
/// reports the send result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRequest {
    pub peer: PeerId,
    pub char_handle: AttHandle,
    pub value: Vec<u8, REPORT_PAYLOAD_MAX>,
    pub enqueue_time: Instant,
    pub priority: Priority,
}

pub(crate) struct NotificationEngine {
    queue: Deque<NotificationRequest, NOTIFICATION_QUEUE_DEPTH>,
    bound: usize,
    in_flight: Option<NotificationRequest>,
    cccds: Vec<(AttHandle, CccdState), 8>,
}

impl NotificationEngine {
    pub fn new(bound: usize) -> Self {
        Self {
            queue: Deque::new(),
            bound: bound.clamp(1, NOTIFICATION_QUEUE_DEPTH),
            in_flight: None,
            cccds: Vec::new(),
        }
    }

    pub fn cccd_state(&self, handle: AttHandle) -> CccdState {
        self.cccds
            .iter()
            .find(|(h, _)| *h == handle)
            .map(|(_, s)| *s)
            .unwrap_or_default()
    }

    pub fn set_cccd(&mut self, handle: AttHandle, state: CccdState) {
        if let Some(entry) = self.cccds.iter_mut().find(|(h, _)| *h == handle) {
            entry.1 = state;
        } else {
            let _ = self.cccds.push((handle, state));
        }
    }

    /// Drop all CCCD state; the per-link lifecycle ends at disconnect.
    pub fn clear_cccds(&mut self) {
        self.cccds.clear();
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Append a request, evicting the oldest strictly-lower-priority entry
    /// when the queue is at its bound, then kick the drain if idle.
    pub fn enqueue<S: GattServerOps>(
        &mut self,
        request: NotificationRequest,
        stack: &mut S,
        diag: &mut DiagnosticsTap,
        streams: &DiagStreams,
    ) -> Result<(), Error> {
        if self.queue.len() >= self.bound {
            let victim = self
                .queue
                .iter()
                .position(|queued| queued.priority < request.priority);
            match victim {
                Some(index) => {
                    self.remove_at(index);
                    diag.log(streams, LogLevel::Debug, "notify queue full, evicted oldest low-priority request");
                }
                None => {
                    diag.log(streams, LogLevel::Debug, "notify queue full");
                    return Err(Error::QueueFull);
                }
            }
        }
        let _ = self.queue.push_back(request);
        if self.in_flight.is_none() {
            self.drain(stack, diag, streams);
        }
        Ok(())
    }

    /// Pop and send until something is in flight or the queue is dry.
    pub fn drain<S: GattServerOps>(
        &mut self,
        stack: &mut S,
        diag: &mut DiagnosticsTap,
        streams: &DiagStreams,
    ) {
        while self.in_flight.is_none() {
            let Some(request) = self.queue.pop_front() else {
                break;
            };
            if self.cccd_state(request.char_handle) != CccdState::NotificationsEnabled {
                debug!("dropping notification: CCCD disabled for handle {}", request.char_handle);
                diag.log(streams, LogLevel::Debug, "notification dropped: notifications not enabled");
                continue;
            }
            match stack.notify(request.peer, request.char_handle, &request.value) {
                Ok(()) => {
                    self.in_flight = Some(request);
                }
                Err(e) => {
                    warn!("notify initiation failed: {:?}", e);
                    diag.record_report(
                        streams,
                        ReportRecord::new(ReportDirection::Sent, request.char_handle, &request.value, false),
                    );
                }
            }
        }
    }

    /// Stack callback: the in-flight notification finished.
    pub fn on_notify_complete<S: GattServerOps>(
        &mut self,
        success: bool,
        stack: &mut S,
        diag: &mut DiagnosticsTap,
        streams: &DiagStreams,
    ) {
        if let Some(request) = self.in_flight.take() {
            diag.record_report(
                streams,
                ReportRecord::new(ReportDirection::Sent, request.char_handle, &request.value, success),
            );
            if !success {
                diag.log(streams, LogLevel::Debug, "notification send failed");
            }
        }
        // No automatic retries.
        self.drain(stack, diag, streams);
    }

    /// Disconnect: empty the queue and fail the in-flight request.
    pub fn flush(&mut self, diag: &mut DiagnosticsTap, streams: &DiagStreams) {
        if let Some(request) = self.in_flight.take() {
            diag.record_report(
                streams,
                ReportRecord::new(ReportDirection::Sent, request.char_handle, &request.value, false),
            );
        }
        if !self.queue.is_empty() {
            diag.log(streams, LogLevel::Debug, "notification queue flushed");
        }
        self.queue.clear();
    }

    /// Remove the element at `index`, preserving the order of the rest.
    fn remove_at(&mut self, index: usize) {
        let len = self.queue.len();
        for i in 0..len {
            if let Some(item) = self.queue.pop_front() {
                if i != index {
                    let _ = self.queue.push_back(item);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cccd_parse() {
        assert_eq!(CccdState::from_bytes(&[0x01, 0x00]), Some(CccdState::NotificationsEnabled));
        assert_eq!(CccdState::from_bytes(&[0x02, 0x00]), Some(CccdState::IndicationsEnabled));
        assert_eq!(CccdState::from_bytes(&[0x00, 0x00]), Some(CccdState::Disabled));
        assert_eq!(CccdState::from_bytes(&[0x01]), None);
        assert_eq!(CccdState::from_bytes(&[0x03, 0x00]), None);
    }

    #[test]
    fn priority_order() {
        assert!(Priority::Normal < Priority::High);
    }
}
