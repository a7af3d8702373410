//! GATT server facade.
//!
//! Converts raw stack callbacks into engine transitions and routes intents
//! into the notification queue. Everything here runs on the single logical
//! executor; read/write handling completes synchronously, only notification
//! completion is deferred (it arrives back as `NotificationSent`).

use embassy_time::Instant;
use heapless::Vec;
use hogp_types::led_indicator::LedIndicator;
use hogp_types::media_key::MediaKeys;
use hogp_types::modifier::HidModifiers;
use hogp_types::mouse_button::MouseButtons;

use super::activation::ServiceActivator;
use super::connection::{ConnectFailReason, ConnectionManager, LinkSnapshot};
use super::constants::BleService;
use super::notify::{CccdState, NotificationEngine, NotificationRequest, Priority};
use super::service::{ServiceRegistry, WriteOutcome};
use super::stack::{
    AttHandle, AttStatus, GattServerEvent, GattServerOps, LinkState, PeerId, StackError,
};
use crate::config::{HidConfig, LogLevel, ProtocolMode};
use crate::descriptor::{HidProfile, KeyboardReport, Report};
use crate::diagnostics::{DiagStreams, DiagnosticsTap};
use crate::encoder::ReportEncoder;
use crate::error::Error;
use crate::event::{ConnectionEvent, ReportDirection, ReportRecord};
use crate::REPORT_PAYLOAD_MAX;

pub(crate) struct Engine<S: GattServerOps> {
    stack: S,
    config: HidConfig,
    registry: ServiceRegistry,
    activator: ServiceActivator,
    notify: NotificationEngine,
    conn: ConnectionManager,
    encoder: ReportEncoder,
    pub(crate) diag: DiagnosticsTap,
    advertising: bool,
}

impl<S: GattServerOps> Engine<S> {
    pub fn new(mut stack: S, config: HidConfig, streams: &DiagStreams) -> Result<Self, Error> {
        stack.open().map_err(|e| {
            error!("GATT server open failed: {:?}", e);
            Error::PeripheralNotSupported
        })?;
        let mut engine = Self {
            stack,
            notify: NotificationEngine::new(config.queue_bound()),
            conn: ConnectionManager::new(config.connection_timeout),
            diag: DiagnosticsTap::new(config.log_level),
            registry: ServiceRegistry::new(),
            activator: ServiceActivator::new(),
            encoder: ReportEncoder::new(),
            advertising: false,
            config,
        };
        // The battery service rides along with whichever HID service is
        // active.
        let battery = engine.registry.install_battery().clone();
        if let Err(e) = engine.stack.add_service(&battery) {
            warn!("battery service registration failed: {:?}", e);
            engine.diag.log(streams, LogLevel::Warn, "battery service registration failed");
        }
        Ok(engine)
    }

    // Service activation

    pub fn activate(&mut self, profile: HidProfile, streams: &DiagStreams) -> Result<(), Error> {
        let displaced = self.activator.plan_activate(profile)?;
        if let Some(old) = displaced {
            self.remove_hid(old, streams)?;
        }
        let def = self.registry.install_hid(profile, self.config.hid_info_flags).clone();
        if let Err(e) = self.stack.add_service(&def) {
            self.registry.remove_hid();
            return Err(match e {
                StackError::ServerFull => Error::ServerFull,
                _ => Error::AddServiceFailed,
            });
        }
        self.activator.committed_add(profile);
        info!("HID service activated: {:?}", profile);
        self.diag.record_connection(streams, ConnectionEvent::ServiceAdded(profile));
        Ok(())
    }

    pub fn deactivate(&mut self, profile: HidProfile, streams: &DiagStreams) -> Result<(), Error> {
        if !self.activator.is_active(profile) {
            // Deactivating an inactive profile is a no-op.
            return Ok(());
        }
        self.remove_hid(profile, streams)
    }

    fn remove_hid(&mut self, profile: HidProfile, streams: &DiagStreams) -> Result<(), Error> {
        // Pending notifications target handles that are about to vanish.
        self.notify.flush(&mut self.diag, streams);
        if let Some(def) = self.registry.hid_service() {
            for c in def.characteristics.iter() {
                self.notify.set_cccd(c.value_handle, CccdState::Disabled);
            }
        }
        if let Err(e) = self.stack.remove_service(BleService::HidService.uuid()) {
            warn!("service removal failed: {:?}", e);
        }
        self.registry.remove_hid();
        self.activator.committed_remove(profile);
        info!("HID service deactivated: {:?}", profile);
        self.diag.record_connection(streams, ConnectionEvent::ServiceRemoved(profile));
        Ok(())
    }

    pub fn active_profile(&self) -> Option<HidProfile> {
        self.activator.active()
    }

    // Event dispatch from the stack

    pub fn handle_event(&mut self, event: GattServerEvent, streams: &DiagStreams) {
        match event {
            GattServerEvent::ConnectionStateChange { peer, status, new_state } => {
                self.on_connection_state_change(peer, status, new_state, streams)
            }
            GattServerEvent::CharacteristicRead { peer, req_id, offset, handle } => {
                self.on_characteristic_read(peer, req_id, offset, handle, streams)
            }
            GattServerEvent::CharacteristicWrite {
                peer,
                req_id,
                handle,
                value,
                response_needed,
                offset: _,
            } => self.on_characteristic_write(peer, req_id, handle, &value, response_needed, streams),
            GattServerEvent::DescriptorWrite {
                peer,
                req_id,
                handle,
                value,
                response_needed,
                offset: _,
            } => self.on_descriptor_write(peer, req_id, handle, &value, response_needed, streams),
            GattServerEvent::NotificationSent { peer: _, success } => {
                self.notify
                    .on_notify_complete(success, &mut self.stack, &mut self.diag, streams)
            }
            GattServerEvent::PairingRequest { peer, variant } => {
                let accepted = self.conn.begin_pairing(variant);
                debug!("pairing request from {:?}, variant {:?}, accepted {}", peer, variant, accepted);
                self.diag.log(streams, LogLevel::Info, "pairing request auto-accepted");
                self.diag
                    .record_connection(streams, ConnectionEvent::PairingChanged(self.conn.pairing()));
            }
            GattServerEvent::PairingComplete { peer, success } => {
                self.conn.finish_pairing(success);
                info!("pairing complete, success {}", success);
                self.diag
                    .record_connection(streams, ConnectionEvent::PairingComplete { peer, success });
                self.diag
                    .record_connection(streams, ConnectionEvent::PairingChanged(self.conn.pairing()));
            }
        }
    }

    fn on_connection_state_change(
        &mut self,
        peer: PeerId,
        status: u8,
        new_state: LinkState,
        streams: &DiagStreams,
    ) {
        match new_state {
            LinkState::Connecting => {
                self.conn.set_connecting();
            }
            LinkState::Connected => {
                if status == 0 {
                    self.conn.set_connected(peer);
                    // Fresh link: CCCDs disabled, protocol mode back to the
                    // default, suspend lifted, queue empty.
                    self.registry.reset_link(self.config.default_protocol_mode);
                    self.notify.flush(&mut self.diag, streams);
                    self.notify.clear_cccds();
                    info!("connected: {:?}", peer);
                    self.diag
                        .record_connection(streams, ConnectionEvent::DeviceConnected { peer });
                } else {
                    warn!("connection failed, status {}", status);
                    self.conn.set_failed(ConnectFailReason::Status(status));
                }
            }
            LinkState::Disconnecting => {
                self.conn.set_disconnecting();
            }
            LinkState::Disconnected => {
                self.notify.flush(&mut self.diag, streams);
                self.notify.clear_cccds();
                self.registry.reset_link(self.config.default_protocol_mode);
                self.conn.set_disconnected();
                info!("disconnected, reason {}", status);
                self.diag
                    .record_connection(streams, ConnectionEvent::DeviceDisconnected { reason: status });
            }
        }
        self.diag
            .record_connection(streams, ConnectionEvent::StateChanged(self.conn.state()));
    }

    fn on_characteristic_read(
        &mut self,
        peer: PeerId,
        req_id: u32,
        offset: u16,
        handle: AttHandle,
        streams: &DiagStreams,
    ) {
        let result = self.read_attribute(handle, offset);
        match result {
            Ok(value) => self
                .stack
                .send_response(peer, req_id, AttStatus::Success, offset, &value),
            Err(status) => {
                warn!("read of handle {} rejected: {:?}", handle, status);
                self.diag.log(streams, LogLevel::Warn, "GATT read rejected");
                self.stack.send_response(peer, req_id, status, offset, &[]);
            }
        }
    }

    fn read_attribute(
        &self,
        handle: AttHandle,
        offset: u16,
    ) -> Result<Vec<u8, { crate::ATT_VALUE_MAX }>, AttStatus> {
        // CCCD state is per-link and owned by the notification engine.
        if let Some(c) = self.registry.char_of_cccd(handle) {
            let bytes = self.notify.cccd_state(c.value_handle).to_bytes();
            let offset = offset as usize;
            if offset > bytes.len() {
                return Err(AttStatus::InvalidOffset);
            }
            return Ok(Vec::from_slice(&bytes[offset..]).unwrap_or_default());
        }
        self.registry.on_read(handle, offset)
    }

    fn on_characteristic_write(
        &mut self,
        peer: PeerId,
        req_id: u32,
        handle: AttHandle,
        value: &[u8],
        response_needed: bool,
        streams: &DiagStreams,
    ) {
        match self.registry.on_write(handle, value) {
            Ok(outcome) => {
                if response_needed {
                    self.stack
                        .send_response(peer, req_id, AttStatus::Success, 0, &[]);
                }
                match outcome {
                    WriteOutcome::ProtocolMode(mode) => {
                        info!("protocol mode set to {:?}", mode);
                        self.diag.log(streams, LogLevel::Info, "protocol mode changed");
                    }
                    WriteOutcome::Suspended(suspended) => {
                        info!("control point: suspended={}", suspended);
                        self.diag.log(
                            streams,
                            LogLevel::Info,
                            if suspended { "host suspended" } else { "host resumed" },
                        );
                    }
                    WriteOutcome::OutputReport(led) => {
                        debug!("output report: LED state {:?}", led);
                        self.diag.record_report(
                            streams,
                            ReportRecord::new(ReportDirection::Received, handle, value, true),
                        );
                    }
                    WriteOutcome::Accepted => {}
                }
            }
            Err(status) => {
                warn!("write to handle {} rejected: {:?}", handle, status);
                self.diag.log(streams, LogLevel::Warn, "GATT write rejected");
                if response_needed {
                    self.stack.send_response(peer, req_id, status, 0, &[]);
                }
            }
        }
    }

    fn on_descriptor_write(
        &mut self,
        peer: PeerId,
        req_id: u32,
        handle: AttHandle,
        value: &[u8],
        response_needed: bool,
        streams: &DiagStreams,
    ) {
        let Some(char_handle) = self.registry.char_of_cccd(handle).map(|c| c.value_handle) else {
            // Report Reference and friends are read-only.
            warn!("descriptor write to non-CCCD handle {}", handle);
            if response_needed {
                self.stack
                    .send_response(peer, req_id, AttStatus::WriteNotPermitted, 0, &[]);
            }
            return;
        };
        if value.len() != 2 {
            if response_needed {
                self.stack
                    .send_response(peer, req_id, AttStatus::InvalidAttributeValueLength, 0, &[]);
            }
            return;
        }
        match CccdState::from_bytes(value) {
            Some(state) => {
                debug!("CCCD for handle {} set to {:?}", char_handle, state);
                self.notify.set_cccd(char_handle, state);
                self.diag.log(
                    streams,
                    LogLevel::Debug,
                    match state {
                        CccdState::Disabled => "notifications disabled",
                        CccdState::NotificationsEnabled => "notifications enabled",
                        CccdState::IndicationsEnabled => "indications enabled",
                    },
                );
                if response_needed {
                    self.stack
                        .send_response(peer, req_id, AttStatus::Success, 0, &[]);
                }
            }
            None => {
                if response_needed {
                    self.stack
                        .send_response(peer, req_id, AttStatus::UnlikelyError, 0, &[]);
                }
            }
        }
    }

    /// Enforce timers; called periodically by the run loop.
    pub fn poll(&mut self, streams: &DiagStreams) {
        if self.conn.poll_timeout(Instant::now()) {
            warn!("connection attempt timed out");
            self.diag.log(streams, LogLevel::Warn, "connecting timed out");
            self.diag
                .record_connection(streams, ConnectionEvent::StateChanged(self.conn.state()));
        }
    }

    // Link state

    pub fn snapshot(&self) -> LinkSnapshot {
        self.conn.snapshot()
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_connected()
    }

    pub fn reset_connection(&mut self, streams: &DiagStreams) {
        self.conn.reset();
        self.diag
            .record_connection(streams, ConnectionEvent::StateChanged(self.conn.state()));
    }

    pub fn keyboard_led_state(&self) -> LedIndicator {
        self.registry.led_state()
    }

    pub fn cccd_state(&self, char_handle: AttHandle) -> CccdState {
        self.notify.cccd_state(char_handle)
    }

    pub fn input_handle(&self) -> Option<AttHandle> {
        self.registry.input_handle()
    }

    pub fn pending_notifications(&self) -> usize {
        self.notify.pending()
    }

    // Advertising status; the advertiser itself lives outside the engine.

    pub fn start_advertising(&mut self, streams: &DiagStreams) -> bool {
        if !self.advertising {
            self.advertising = true;
            info!("advertising started");
            self.diag
                .record_connection(streams, ConnectionEvent::AdvertisingStarted);
        }
        true
    }

    pub fn stop_advertising(&mut self, streams: &DiagStreams) -> bool {
        if self.advertising {
            self.advertising = false;
            info!("advertising stopped");
            self.diag
                .record_connection(streams, ConnectionEvent::AdvertisingStopped);
        }
        true
    }

    pub fn is_advertising(&self) -> bool {
        self.advertising
    }

    // Intents

    pub fn send_keys(
        &mut self,
        keys: &[u8],
        modifiers: HidModifiers,
        streams: &DiagStreams,
    ) -> Result<(), Error> {
        let report = match self.active_profile() {
            Some(HidProfile::Keyboard) => Report::Keyboard(self.encoder.press_key(keys, modifiers)?),
            Some(HidProfile::Composite) => {
                self.encoder.press_key(keys, modifiers)?;
                Report::Combined(self.encoder.combined_snapshot())
            }
            _ => return Err(Error::ProfileNotActive),
        };
        self.enqueue_input(report, Priority::Normal, streams)
    }

    pub fn release_keys(&mut self, streams: &DiagStreams) -> Result<(), Error> {
        let report = match self.active_profile() {
            Some(HidProfile::Keyboard) => Report::Keyboard(self.encoder.release_all_keys()),
            Some(HidProfile::Composite) => {
                self.encoder.release_all_keys();
                Report::Combined(self.encoder.combined_snapshot())
            }
            _ => return Err(Error::ProfileNotActive),
        };
        self.enqueue_input(report, Priority::High, streams)
    }

    pub fn type_text(&mut self, text: &str, streams: &DiagStreams) -> Result<(), Error> {
        let profile = match self.active_profile() {
            Some(p @ (HidProfile::Keyboard | HidProfile::Composite)) => p,
            _ => return Err(Error::ProfileNotActive),
        };
        let op = self.diag.start_op("type_text");
        for (press, release) in self.encoder.type_text(text) {
            let result = self
                .enqueue_keyboard_frame(profile, press, Priority::Normal, streams)
                .and_then(|_| self.enqueue_keyboard_frame(profile, release, Priority::High, streams));
            if let Err(e) = result {
                self.diag.end_op(streams, op, false);
                return Err(e);
            }
        }
        self.diag.end_op(streams, op, true);
        Ok(())
    }

    fn enqueue_keyboard_frame(
        &mut self,
        profile: HidProfile,
        frame: KeyboardReport,
        priority: Priority,
        streams: &DiagStreams,
    ) -> Result<(), Error> {
        let report = match profile {
            HidProfile::Composite => Report::Combined(self.encoder.combined_with_keys(&frame)),
            _ => Report::Keyboard(frame),
        };
        self.enqueue_input(report, priority, streams)
    }

    pub fn move_mouse(&mut self, dx: i16, dy: i16, streams: &DiagStreams) -> Result<(), Error> {
        let report = match self.active_profile() {
            Some(HidProfile::Mouse) => Report::Mouse(self.encoder.move_mouse(dx, dy)),
            Some(HidProfile::Composite) => Report::Combined(self.encoder.combined_motion(dx, dy, 0)),
            _ => return Err(Error::ProfileNotActive),
        };
        self.enqueue_input(report, Priority::Normal, streams)
    }

    pub fn press_button(&mut self, buttons: MouseButtons, streams: &DiagStreams) -> Result<(), Error> {
        let report = match self.active_profile() {
            Some(HidProfile::Mouse) => Report::Mouse(self.encoder.press_button(buttons)),
            Some(HidProfile::Composite) => {
                self.encoder.press_button(buttons);
                Report::Combined(self.encoder.combined_snapshot())
            }
            _ => return Err(Error::ProfileNotActive),
        };
        self.enqueue_input(report, Priority::Normal, streams)
    }

    pub fn release_buttons(&mut self, streams: &DiagStreams) -> Result<(), Error> {
        let report = match self.active_profile() {
            Some(HidProfile::Mouse) => Report::Mouse(self.encoder.release_buttons()),
            Some(HidProfile::Composite) => {
                self.encoder.release_buttons();
                Report::Combined(self.encoder.combined_snapshot())
            }
            _ => return Err(Error::ProfileNotActive),
        };
        self.enqueue_input(report, Priority::High, streams)
    }

    pub fn click(&mut self, buttons: MouseButtons, streams: &DiagStreams) -> Result<(), Error> {
        self.press_button(buttons, streams)?;
        self.release_buttons(streams)
    }

    pub fn scroll(&mut self, delta: i16, streams: &DiagStreams) -> Result<(), Error> {
        let report = match self.active_profile() {
            Some(HidProfile::Mouse) => Report::Mouse(self.encoder.scroll(delta)),
            Some(HidProfile::Composite) => Report::Combined(self.encoder.combined_motion(0, 0, delta)),
            _ => return Err(Error::ProfileNotActive),
        };
        self.enqueue_input(report, Priority::Normal, streams)
    }

    pub fn media(&mut self, mask: MediaKeys, press: bool, streams: &DiagStreams) -> Result<(), Error> {
        let report = match self.active_profile() {
            Some(HidProfile::Consumer) => Report::Consumer(self.encoder.media(mask, press)),
            Some(HidProfile::Composite) => {
                self.encoder.media(mask, press);
                Report::Combined(self.encoder.combined_snapshot())
            }
            _ => return Err(Error::ProfileNotActive),
        };
        let priority = if press { Priority::Normal } else { Priority::High };
        self.enqueue_input(report, priority, streams)
    }

    pub fn media_tap(&mut self, mask: MediaKeys, streams: &DiagStreams) -> Result<(), Error> {
        self.media(mask, true, streams)?;
        self.media(mask, false, streams)
    }

    pub fn send_combined(
        &mut self,
        media: MediaKeys,
        buttons: MouseButtons,
        x: i16,
        y: i16,
        streams: &DiagStreams,
    ) -> Result<(), Error> {
        if self.active_profile() != Some(HidProfile::Composite) {
            return Err(Error::ProfileNotActive);
        }
        let report = Report::Combined(self.encoder.combined(media, buttons, x, y));
        self.enqueue_input(report, Priority::Normal, streams)
    }

    pub fn set_battery_level(&mut self, percent: u8, streams: &DiagStreams) -> Result<(), Error> {
        let level = percent.min(100);
        let Some(handle) = self.registry.battery_handle() else {
            return Err(Error::ProfileNotActive);
        };
        self.registry.set_char_value(handle, &[level]);
        let Some(peer) = self.conn.peer() else {
            // Not connected: the cached value is enough.
            return Ok(());
        };
        let request = NotificationRequest {
            peer,
            char_handle: handle,
            value: Vec::from_slice(&[level]).unwrap_or_default(),
            enqueue_time: Instant::now(),
            priority: Priority::Normal,
        };
        self.notify
            .enqueue(request, &mut self.stack, &mut self.diag, streams)
    }

    /// Common input path: gate on link and suspend state, marshal, cache
    /// the value for reads, then queue.
    fn enqueue_input(
        &mut self,
        report: Report,
        priority: Priority,
        streams: &DiagStreams,
    ) -> Result<(), Error> {
        let Some(peer) = self.conn.peer() else {
            self.diag.log(streams, LogLevel::Debug, "input dropped: not connected");
            return Err(Error::NotConnected);
        };
        if self.registry.suspended() {
            self.diag.log(streams, LogLevel::Debug, "input dropped: suspended");
            return Err(Error::Suspended);
        }
        let Some(handle) = self.registry.input_handle() else {
            return Err(Error::ProfileNotActive);
        };
        let mut value: Vec<u8, REPORT_PAYLOAD_MAX> = report.to_bytes();
        // The boot mouse report is just buttons/dx/dy.
        if self.registry.protocol_mode() == ProtocolMode::Boot
            && matches!(report, Report::Mouse(_))
        {
            value.truncate(3);
        }
        self.registry.set_char_value(handle, &value);
        let request = NotificationRequest {
            peer,
            char_handle: handle,
            value,
            enqueue_time: Instant::now(),
            priority,
        };
        self.notify
            .enqueue(request, &mut self.stack, &mut self.diag, streams)
    }

    /// Tear the server down, removing registered services.
    pub fn close(mut self, streams: &DiagStreams) -> S {
        if let Some(profile) = self.activator.active() {
            let _ = self.remove_hid(profile, streams);
        }
        if self.registry.battery_service().is_some() {
            let _ = self.stack.remove_service(BleService::BatteryService.uuid());
        }
        self.stack
    }
}
