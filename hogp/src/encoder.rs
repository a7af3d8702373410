//! Intent-to-report encoding.
//!
//! The encoder is a pure transformation layer: it owns the per-profile
//! report state (pressed keys, held buttons, latched media bits) and turns
//! high-level intents into descriptor-conformant reports. It knows nothing
//! about connections or queues and is freely clonable.

use hogp_types::keycode::{self, HidKeyCode};
use hogp_types::media_key::MediaKeys;
use hogp_types::modifier::{self, HidModifiers};
use hogp_types::mouse_button::MouseButtons;

use crate::descriptor::{CombinedReport, ConsumerReport, KeyboardReport, MouseReport};
use crate::error::Error;

/// Maximum concurrent non-modifier keys in the keyboard report.
pub const MAX_KEYS: usize = 6;

fn clamp_delta(v: i16) -> i8 {
    v.clamp(-127, 127) as i8
}

#[derive(Debug, Default, Clone)]
pub struct ReportEncoder {
    keyboard: KeyboardReport,
    mouse: MouseReport,
    media: ConsumerReport,
}

impl ReportEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode a set of pressed keys plus a modifier byte.
    ///
    /// Slots are filled in the order given, duplicates collapse, unused
    /// slots stay zero. More than [`MAX_KEYS`] distinct keys is an error.
    pub fn press_key(&mut self, keys: &[u8], modifiers: HidModifiers) -> Result<KeyboardReport, Error> {
        let mut keycodes = [0u8; MAX_KEYS];
        let mut filled = 0;
        for &key in keys {
            if key == 0 || keycodes[..filled].contains(&key) {
                continue;
            }
            if filled == MAX_KEYS {
                return Err(Error::TooManyKeys);
            }
            keycodes[filled] = key;
            filled += 1;
        }
        self.keyboard = KeyboardReport {
            modifier: modifiers.into_bits(),
            reserved: 0,
            keycodes,
        };
        Ok(self.keyboard)
    }

    /// All-zero keyboard report; also clears the held key state.
    pub fn release_all_keys(&mut self) -> KeyboardReport {
        self.keyboard = KeyboardReport::default();
        self.keyboard
    }

    /// Press+release report pairs for each mappable character of `text`.
    ///
    /// Unsupported characters are skipped silently. The iterator is finite
    /// and not restartable.
    pub fn type_text<'a>(&self, text: &'a str) -> TextReports<'a> {
        TextReports { bytes: text.as_bytes(), index: 0 }
    }

    /// Relative move. Deltas saturate into the i8 report fields, held
    /// buttons are preserved, the wheel stays still.
    pub fn move_mouse(&mut self, dx: i16, dy: i16) -> MouseReport {
        self.mouse.x = clamp_delta(dx);
        self.mouse.y = clamp_delta(dy);
        self.mouse.wheel = 0;
        self.mouse
    }

    /// OR `buttons` into the held button state.
    pub fn press_button(&mut self, buttons: MouseButtons) -> MouseReport {
        self.mouse.buttons |= buttons.into_bits();
        self.mouse.x = 0;
        self.mouse.y = 0;
        self.mouse.wheel = 0;
        self.mouse
    }

    /// Release every held button.
    pub fn release_buttons(&mut self) -> MouseReport {
        self.mouse.buttons = 0;
        self.mouse.x = 0;
        self.mouse.y = 0;
        self.mouse.wheel = 0;
        self.mouse
    }

    /// A press report followed by a release report. The caller is
    /// responsible for sending them in order.
    pub fn click(&mut self, buttons: MouseButtons) -> (MouseReport, MouseReport) {
        let press = self.press_button(buttons);
        let release = self.release_buttons();
        (press, release)
    }

    /// Vertical scroll. Held buttons are preserved, x/y stay still.
    pub fn scroll(&mut self, delta: i16) -> MouseReport {
        self.mouse.x = 0;
        self.mouse.y = 0;
        self.mouse.wheel = clamp_delta(delta);
        self.mouse
    }

    /// Set or clear media bits.
    pub fn media(&mut self, mask: MediaKeys, press: bool) -> ConsumerReport {
        if press {
            self.media.usage_bits |= mask.into_bits();
        } else {
            self.media.usage_bits &= !mask.into_bits();
        }
        self.media
    }

    /// Press-then-release pair for a media key tap.
    pub fn media_tap(&mut self, mask: MediaKeys) -> (ConsumerReport, ConsumerReport) {
        let press = self.media(mask, true);
        let release = self.media(mask, false);
        (press, release)
    }

    /// Build the combined report: latches media and button state, clamps
    /// the deltas, and carries the current keyboard bytes in the tail.
    pub fn combined(
        &mut self,
        media: MediaKeys,
        buttons: MouseButtons,
        dx: i16,
        dy: i16,
    ) -> CombinedReport {
        self.media.usage_bits = media.into_bits();
        self.mouse.buttons = buttons.into_bits();
        CombinedReport {
            media: self.media.usage_bits,
            buttons: self.mouse.buttons,
            x: clamp_delta(dx),
            y: clamp_delta(dy),
            wheel: 0,
            modifier: self.keyboard.modifier,
            reserved: 0,
            keycodes: self.keyboard.keycodes,
        }
    }

    /// Combined report with motion only; latched state rides along.
    pub fn combined_motion(&self, dx: i16, dy: i16, wheel: i16) -> CombinedReport {
        let mut report = self.combined_snapshot();
        report.x = clamp_delta(dx);
        report.y = clamp_delta(dy);
        report.wheel = clamp_delta(wheel);
        report
    }

    /// The combined report for the current latched state, motion still.
    ///
    /// Motion fields are relative, so a snapshot never repeats them.
    pub fn combined_snapshot(&self) -> CombinedReport {
        CombinedReport {
            media: self.media.usage_bits,
            buttons: self.mouse.buttons,
            x: 0,
            y: 0,
            wheel: 0,
            modifier: self.keyboard.modifier,
            reserved: 0,
            keycodes: self.keyboard.keycodes,
        }
    }

    /// Combined report carrying the given keyboard frame over the current
    /// latched media/button state.
    pub fn combined_with_keys(&self, keys: &KeyboardReport) -> CombinedReport {
        let mut report = self.combined_snapshot();
        report.modifier = keys.modifier;
        report.keycodes = keys.keycodes;
        report
    }

    /// Currently held mouse buttons.
    pub fn buttons(&self) -> MouseButtons {
        MouseButtons::from_bits(self.mouse.buttons)
    }
}

/// Finite iterator of (press, release) keyboard report pairs for a string.
pub struct TextReports<'a> {
    bytes: &'a [u8],
    index: usize,
}

impl Iterator for TextReports<'_> {
    type Item = (KeyboardReport, KeyboardReport);

    fn next(&mut self) -> Option<Self::Item> {
        while self.index < self.bytes.len() {
            let ascii = self.bytes[self.index];
            self.index += 1;
            let (keycode, shifted) = keycode::from_ascii(ascii);
            if keycode == HidKeyCode::No {
                continue;
            }
            let modifier = if shifted { modifier::LSHIFT } else { HidModifiers::new() };
            let press = KeyboardReport {
                modifier: modifier.into_bits(),
                reserved: 0,
                keycodes: [keycode.usage(), 0, 0, 0, 0, 0],
            };
            return Some((press, KeyboardReport::default()));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn press_key_fills_slots_in_order() {
        let mut encoder = ReportEncoder::new();
        let report = encoder
            .press_key(&[0x04, 0x05, 0x06], modifier::LCTRL)
            .unwrap();
        assert_eq!(report.modifier, 0x01);
        assert_eq!(report.keycodes, [0x04, 0x05, 0x06, 0, 0, 0]);
    }

    #[test]
    fn press_key_rejects_seven_keys() {
        let mut encoder = ReportEncoder::new();
        let err = encoder
            .press_key(&[1, 2, 3, 4, 5, 6, 7], HidModifiers::new())
            .unwrap_err();
        assert_eq!(err, Error::TooManyKeys);
    }

    #[test]
    fn press_key_collapses_duplicates() {
        let mut encoder = ReportEncoder::new();
        let report = encoder
            .press_key(&[0x04, 0x04, 0x05], HidModifiers::new())
            .unwrap();
        assert_eq!(report.keycodes, [0x04, 0x05, 0, 0, 0, 0]);
    }

    #[test]
    fn move_preserves_buttons() {
        let mut encoder = ReportEncoder::new();
        encoder.press_button(hogp_types::mouse_button::LEFT);
        let report = encoder.move_mouse(300, -300);
        assert_eq!(report.buttons, 0x01);
        assert_eq!(report.x, 127);
        assert_eq!(report.y, -127);
        assert_eq!(report.wheel, 0);
    }

    #[test]
    fn scroll_clamps_and_keeps_position_still() {
        let mut encoder = ReportEncoder::new();
        let report = encoder.scroll(-1000);
        assert_eq!((report.x, report.y, report.wheel), (0, 0, -127));
    }

    #[test]
    fn type_text_skips_unmappable() {
        let encoder = ReportEncoder::new();
        let pairs: std::vec::Vec<_> = encoder.type_text("aé!").collect();
        // 'é' is not ASCII-mappable; 'a' and '!' are.
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].0.keycodes[0], 0x04);
        assert_eq!(pairs[1].0.modifier, 0x02);
        assert_eq!(pairs[1].0.keycodes[0], 0x1E);
    }

    #[test]
    fn media_tap_sets_then_clears() {
        let mut encoder = ReportEncoder::new();
        let (press, release) = encoder.media_tap(hogp_types::media_key::PLAY_PAUSE);
        assert_eq!(press.usage_bits, 0x0001);
        assert_eq!(release.usage_bits, 0x0000);
    }
}
