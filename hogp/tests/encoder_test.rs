//! Encoder properties over the public API.

mod common;

use hogp::encoder::ReportEncoder;
use hogp::types::modifier::HidModifiers;
use hogp::types::mouse_button;

#[test]
fn press_key_property_sweep() {
    // For any key set of up to six distinct usages and any modifier byte,
    // byte 0 is the modifier, byte 1 is zero, and the slots carry each
    // usage exactly once, zero padded.
    let key_sets: &[&[u8]] = &[
        &[],
        &[0x04],
        &[0x04, 0x05],
        &[0x1E, 0x1F, 0x20, 0x21],
        &[0x04, 0x05, 0x06, 0x07, 0x08, 0x09],
    ];
    for modifier in [0x00u8, 0x02, 0x05, 0xFF] {
        for keys in key_sets {
            let mut encoder = ReportEncoder::new();
            let report = encoder
                .press_key(keys, HidModifiers::from_bits(modifier))
                .unwrap();
            assert_eq!(report.modifier, modifier);
            assert_eq!(report.reserved, 0);
            for &key in *keys {
                assert_eq!(
                    report.keycodes.iter().filter(|&&k| k == key).count(),
                    1,
                    "usage {key:#x} must appear exactly once"
                );
            }
            for slot in &report.keycodes[keys.len()..] {
                assert_eq!(*slot, 0);
            }
        }
    }
}

#[test]
fn move_mouse_property_sweep() {
    let cases: &[(i16, i16, i8, i8)] = &[
        (0, 0, 0, 0),
        (1, -1, 1, -1),
        (127, -127, 127, -127),
        (128, -128, 127, -127),
        (i16::MAX, i16::MIN, 127, -127),
        (-300, 300, -127, 127),
    ];
    let mut encoder = ReportEncoder::new();
    encoder.press_button(mouse_button::RIGHT);
    for &(dx, dy, ex, ey) in cases {
        let report = encoder.move_mouse(dx, dy);
        assert_eq!(report.x, ex);
        assert_eq!(report.y, ey);
        assert_eq!(report.wheel, 0);
        // Button state survives every move.
        assert_eq!(report.buttons, 0x02);
    }
}

#[test]
fn release_all_keys_is_idempotent() {
    let mut encoder = ReportEncoder::new();
    let _ = encoder.press_key(&[0x04, 0x05], HidModifiers::from_bits(0x02));
    let first = encoder.release_all_keys();
    let second = encoder.release_all_keys();
    assert_eq!(first, second);
    assert_eq!(first.modifier, 0);
    assert_eq!(first.keycodes, [0; 6]);
}

#[test]
fn type_text_full_ascii_table_round_trip() {
    let encoder = ReportEncoder::new();
    let text = "The quick brown fox; 0-9 [brackets] 'quotes' = ok,\tdone\n";
    let pairs: Vec<_> = encoder.type_text(text).collect();
    // Every character in this string is mappable.
    assert_eq!(pairs.len(), text.len());
    for (press, release) in pairs {
        assert_ne!(press.keycodes[0], 0);
        assert_eq!(release.keycodes, [0; 6]);
        assert_eq!(release.modifier, 0);
    }
}

#[test]
fn encoder_is_clonable_and_independent() {
    let mut encoder = ReportEncoder::new();
    encoder.press_button(mouse_button::LEFT);
    let mut fork = encoder.clone();
    fork.release_buttons();
    // The original still holds its button.
    let report = encoder.move_mouse(0, 0);
    assert_eq!(report.buttons, 0x01);
}
