//! # hogp
//!
//! A BLE HID-over-GATT (HOGP) peripheral engine. The crate turns any host
//! with a peripheral-capable GATT server into a keyboard, a three-button
//! mouse with scroll wheel, and a consumer-control (media) device.
//!
//! The engine is radio-agnostic: bind your platform's GATT server to
//! [`ble::stack::GattServerOps`], feed its callbacks in as
//! [`ble::stack::GattServerEvent`]s, and drive input through the intent
//! API on [`HidPeripheral`]. All state transitions are serialized on the
//! single logical executor delivering those events; the only deferred
//! operation is notification completion.

// Enable std in test
#![cfg_attr(not(test), no_std)]

// This mod MUST go first, so that the others see its macros.
mod fmt;

pub mod ble;
pub mod config;
pub mod descriptor;
pub mod diagnostics;
pub mod encoder;
pub mod error;
pub mod event;

use core::cell::RefCell;

use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::Timer;
use hogp_types::media_key::{self, MediaKeys};
use hogp_types::modifier::HidModifiers;
use hogp_types::mouse_button::MouseButtons;

use crate::ble::connection::{ConnectionState, LinkSnapshot, PairingState};
use crate::ble::notify::CccdState;
use crate::ble::server::Engine;
use crate::ble::stack::{AttHandle, GattServerEvent, GattServerOps};
use crate::config::HidConfig;
use crate::descriptor::HidProfile;
use crate::diagnostics::{ConnectionStream, DiagStreams, DiagnosticsTap, EventStream, OpToken, ReportStream};
use crate::error::Error;

pub use hogp_types as types;

/// Mutex flavor used by every channel and stream in the crate.
pub type RawMutex = CriticalSectionRawMutex;

/// Compile-time storage of the notification queue; the runtime bound
/// (`HidConfig::max_queue_per_link`) stays at or below this.
pub const NOTIFICATION_QUEUE_DEPTH: usize = 128;
/// Largest input report payload (the combined report, with headroom).
pub const REPORT_PAYLOAD_MAX: usize = 16;
/// Largest cached attribute value (the combined report map).
pub const ATT_VALUE_MAX: usize = 256;
/// Largest characteristic/descriptor write the engine accepts.
pub const WRITE_PAYLOAD_MAX: usize = 32;
/// Capacity of the stack event channel consumed by [`HidPeripheral::run`].
pub const EVENT_CHANNEL_SIZE: usize = 16;
/// Retained report history entries.
pub const REPORT_HISTORY_DEPTH: usize = 256;
/// Retained connection event entries.
pub const CONNECTION_HISTORY_DEPTH: usize = 256;
/// Retained log entries.
pub const LOG_HISTORY_DEPTH: usize = 256;
/// Per-stream buffered messages before drop-oldest kicks in.
pub const DIAG_STREAM_CAP: usize = 8;
/// Concurrent subscribers per stream.
pub const DIAG_STREAM_SUBS: usize = 4;
/// Publisher slots per stream (immediate publishers don't count).
pub const DIAG_STREAM_PUBS: usize = 1;
/// Distinct named operations tracked by the metrics tap.
pub const OP_SUMMARY_SLOTS: usize = 8;

/// Timer-poll period of the run loop, for the connecting timeout.
const POLL_PERIOD_MS: u64 = 250;

/// Channel feeding stack callbacks into [`HidPeripheral::run`].
pub type EventChannel = Channel<RawMutex, GattServerEvent, EVENT_CHANNEL_SIZE>;

/// Root handle of the engine, returned by [`initialize`].
///
/// Intent methods return plain `bool` success for composability with
/// host bindings; structured outcomes flow through the streams.
pub struct HidPeripheral<S: GattServerOps> {
    engine: RefCell<Engine<S>>,
    streams: DiagStreams,
}

/// Bring the engine up on the given stack binding.
///
/// Fails with [`Error::PeripheralNotSupported`] when the stack cannot open
/// a GATT server.
pub fn initialize<S: GattServerOps>(stack: S, config: HidConfig) -> Result<HidPeripheral<S>, Error> {
    let streams = DiagStreams::new();
    let engine = Engine::new(stack, config, &streams)?;
    Ok(HidPeripheral {
        engine: RefCell::new(engine),
        streams,
    })
}

impl<S: GattServerOps> HidPeripheral<S> {
    // Stack event entry points

    /// Feed one stack callback into the engine.
    pub fn handle_event(&self, event: GattServerEvent) {
        self.engine.borrow_mut().handle_event(event, &self.streams);
    }

    /// Enforce timers (the `Connecting` timeout). Called by [`run`], or
    /// directly by hosts that drive the engine manually.
    pub fn poll(&self) {
        self.engine.borrow_mut().poll(&self.streams);
    }

    /// Drive the engine from an event channel. Never returns.
    pub async fn run(&self, events: &EventChannel) -> ! {
        loop {
            match select(events.receive(), Timer::after_millis(POLL_PERIOD_MS)).await {
                Either::First(event) => self.handle_event(event),
                Either::Second(_) => self.poll(),
            }
        }
    }

    // Service activation

    /// Publish `profile` on the GATT server, displacing whichever profile
    /// was active. Activating an already-active profile is a no-op.
    pub fn activate(&self, profile: HidProfile) -> Result<(), Error> {
        match self.engine.borrow_mut().activate(profile, &self.streams) {
            Err(Error::AlreadyActive) => Ok(()),
            other => other,
        }
    }

    /// Remove `profile` from the GATT server and clear its CCCDs.
    /// Deactivating an inactive profile is a no-op.
    pub fn deactivate(&self, profile: HidProfile) -> Result<(), Error> {
        self.engine.borrow_mut().deactivate(profile, &self.streams)
    }

    pub fn active_profile(&self) -> Option<HidProfile> {
        self.engine.borrow().active_profile()
    }

    // Advertising status only; packet crafting lives with the host.

    pub fn start_advertising(&self) -> bool {
        self.engine.borrow_mut().start_advertising(&self.streams)
    }

    pub fn stop_advertising(&self) -> bool {
        self.engine.borrow_mut().stop_advertising(&self.streams)
    }

    pub fn is_advertising(&self) -> bool {
        self.engine.borrow().is_advertising()
    }

    // Link state

    pub fn is_connected(&self) -> bool {
        self.engine.borrow().is_connected()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.engine.borrow().snapshot().connection
    }

    pub fn pairing_state(&self) -> PairingState {
        self.engine.borrow().snapshot().pairing
    }

    /// Leave `Failed` and allow a new connection attempt.
    pub fn reset_connection(&self) {
        self.engine.borrow_mut().reset_connection(&self.streams);
    }

    /// LED state parsed from the last keyboard output report.
    pub fn keyboard_led_state(&self) -> hogp_types::led_indicator::LedIndicator {
        self.engine.borrow().keyboard_led_state()
    }

    /// Per-link CCCD state of a characteristic.
    pub fn cccd_state(&self, char_handle: AttHandle) -> CccdState {
        self.engine.borrow().cccd_state(char_handle)
    }

    /// Value handle the next input report will be notified on.
    pub fn input_handle(&self) -> Option<AttHandle> {
        self.engine.borrow().input_handle()
    }

    /// Requests currently waiting in the notification queue.
    pub fn pending_notifications(&self) -> usize {
        self.engine.borrow().pending_notifications()
    }

    // Keyboard intents

    pub fn send_key(&self, key: u8, modifiers: u8) -> bool {
        self.send_keys(&[key], modifiers)
    }

    pub fn send_keys(&self, keys: &[u8], modifiers: u8) -> bool {
        self.engine
            .borrow_mut()
            .send_keys(keys, HidModifiers::from_bits(modifiers), &self.streams)
            .is_ok()
    }

    pub fn release_keys(&self) -> bool {
        self.engine.borrow_mut().release_keys(&self.streams).is_ok()
    }

    pub fn type_text(&self, text: &str) -> bool {
        self.engine.borrow_mut().type_text(text, &self.streams).is_ok()
    }

    // Mouse intents

    pub fn move_mouse(&self, dx: i16, dy: i16) -> bool {
        self.engine.borrow_mut().move_mouse(dx, dy, &self.streams).is_ok()
    }

    pub fn press_button(&self, buttons: u8) -> bool {
        self.engine
            .borrow_mut()
            .press_button(MouseButtons::from_bits(buttons), &self.streams)
            .is_ok()
    }

    pub fn release_buttons(&self) -> bool {
        self.engine.borrow_mut().release_buttons(&self.streams).is_ok()
    }

    pub fn click(&self, buttons: u8) -> bool {
        self.engine
            .borrow_mut()
            .click(MouseButtons::from_bits(buttons), &self.streams)
            .is_ok()
    }

    pub fn scroll(&self, delta: i16) -> bool {
        self.engine.borrow_mut().scroll(delta, &self.streams).is_ok()
    }

    // Media intents

    pub fn media(&self, mask: MediaKeys, press: bool) -> bool {
        self.engine.borrow_mut().media(mask, press, &self.streams).is_ok()
    }

    pub fn play_pause(&self) -> bool {
        self.media_tap(media_key::PLAY_PAUSE)
    }

    pub fn next_track(&self) -> bool {
        self.media_tap(media_key::NEXT_TRACK)
    }

    pub fn prev_track(&self) -> bool {
        self.media_tap(media_key::PREV_TRACK)
    }

    pub fn volume_up(&self) -> bool {
        self.media_tap(media_key::VOLUME_UP)
    }

    pub fn volume_down(&self) -> bool {
        self.media_tap(media_key::VOLUME_DOWN)
    }

    pub fn mute(&self) -> bool {
        self.media_tap(media_key::MUTE)
    }

    fn media_tap(&self, mask: MediaKeys) -> bool {
        self.engine.borrow_mut().media_tap(mask, &self.streams).is_ok()
    }

    // Composite intent

    pub fn send_combined(&self, media: u16, buttons: u8, x: i16, y: i16) -> bool {
        self.engine
            .borrow_mut()
            .send_combined(
                MediaKeys::from_bits(media),
                MouseButtons::from_bits(buttons),
                x,
                y,
                &self.streams,
            )
            .is_ok()
    }

    // Battery

    pub fn set_battery_level(&self, percent: u8) -> bool {
        self.engine
            .borrow_mut()
            .set_battery_level(percent, &self.streams)
            .is_ok()
    }

    // Observability

    /// Current link snapshot plus the hot connection stream. The snapshot
    /// replays the most recent state so a new subscriber misses nothing.
    pub fn connection_stream(&self) -> Option<(LinkSnapshot, ConnectionStream<'_>)> {
        let snapshot = self.engine.borrow().snapshot();
        self.streams.connection_stream().map(|sub| (snapshot, sub))
    }

    /// Hot stream of sent and received reports.
    pub fn report_stream(&self) -> Option<ReportStream<'_>> {
        self.streams.report_stream()
    }

    /// Hot stream of every tagged diagnostic event.
    pub fn event_stream(&self) -> Option<EventStream<'_>> {
        self.streams.event_stream()
    }

    /// Read access to the retained histories and op summaries.
    pub fn with_diagnostics<R>(&self, f: impl FnOnce(&DiagnosticsTap) -> R) -> R {
        f(&self.engine.borrow().diag)
    }

    /// Broadcast a named measurement through the event stream.
    pub fn metric_record(&self, name: &'static str, value: i64, unit: &'static str) {
        self.engine
            .borrow()
            .diag
            .metric_record(&self.streams, name, value, unit);
    }

    /// Begin timing a named operation.
    pub fn start_op(&self, name: &'static str) -> OpToken {
        self.engine.borrow().diag.start_op(name)
    }

    /// Finish a timed operation and fold it into its summary.
    pub fn end_op(&self, token: OpToken, success: bool) {
        self.engine
            .borrow_mut()
            .diag
            .end_op(&self.streams, token, success);
    }

    /// Tear the server down and hand the stack binding back.
    pub fn close(self) -> S {
        self.engine.into_inner().close(&self.streams)
    }
}
