//! Report map conformance: the published blobs parse as HID descriptors
//! and declare the byte lengths the encoder writes.

mod common;

use hogp::descriptor::{
    descriptor_of, report_spec_of, HidProfile, ReportType, CONSUMER_REPORT_DESC,
    KEYBOARD_REPORT_DESC, MOUSE_REPORT_DESC,
};

/// Minimal HID report-descriptor item walker. Accumulates input/output
/// report bit counts per report id, which is all the conformance checks
/// need.
struct ParsedDescriptor {
    /// (report_id, input_bits); id 0 = no report ids in the map.
    inputs: Vec<(u8, usize)>,
    outputs: Vec<(u8, usize)>,
    collections: usize,
}

fn parse(desc: &[u8]) -> ParsedDescriptor {
    let mut inputs: Vec<(u8, usize)> = Vec::new();
    let mut outputs: Vec<(u8, usize)> = Vec::new();
    let mut collections = 0;

    let mut report_size = 0usize;
    let mut report_count = 0usize;
    let mut report_id = 0u8;

    let mut i = 0;
    while i < desc.len() {
        let prefix = desc[i];
        let size = match prefix & 0x03 {
            3 => 4,
            n => n as usize,
        };
        let tag = prefix & 0xFC;
        let data = desc
            .get(i + 1..i + 1 + size)
            .expect("truncated descriptor item");
        let value = data
            .iter()
            .rev()
            .fold(0u32, |acc, &b| (acc << 8) | b as u32);
        match tag {
            0xA0 => collections += 1,  // Collection
            0x84 => report_id = value as u8, // Report ID
            0x74 => report_size = value as usize, // Report Size
            0x94 => report_count = value as usize, // Report Count
            0x80 => {
                // Input
                match inputs.iter_mut().find(|(id, _)| *id == report_id) {
                    Some((_, bits)) => *bits += report_size * report_count,
                    None => inputs.push((report_id, report_size * report_count)),
                }
            }
            0x90 => {
                // Output
                match outputs.iter_mut().find(|(id, _)| *id == report_id) {
                    Some((_, bits)) => *bits += report_size * report_count,
                    None => outputs.push((report_id, report_size * report_count)),
                }
            }
            _ => {}
        }
        i += 1 + size;
    }

    ParsedDescriptor {
        inputs,
        outputs,
        collections,
    }
}

fn input_bytes(parsed: &ParsedDescriptor, report_id: u8) -> usize {
    let bits = parsed
        .inputs
        .iter()
        .find(|(id, _)| *id == report_id)
        .map(|(_, bits)| *bits)
        .unwrap_or(0);
    assert_eq!(bits % 8, 0, "input report not byte aligned");
    bits / 8
}

#[test]
fn every_profile_map_parses_and_matches_its_report_spec() {
    for profile in [
        HidProfile::Keyboard,
        HidProfile::Mouse,
        HidProfile::Consumer,
        HidProfile::Composite,
    ] {
        let parsed = parse(descriptor_of(profile));
        assert!(parsed.collections >= 1, "{:?}: no collection", profile);
        let spec = report_spec_of(profile, ReportType::Input).unwrap();
        assert_eq!(
            input_bytes(&parsed, spec.report_id),
            spec.length_bytes,
            "{:?}: declared input length mismatch",
            profile
        );
    }
}

#[test]
fn keyboard_map_declares_the_led_output_byte() {
    let parsed = parse(KEYBOARD_REPORT_DESC);
    let bits = parsed
        .outputs
        .iter()
        .find(|(id, _)| *id == 0x01)
        .map(|(_, bits)| *bits)
        .unwrap();
    // 5 LED bits + 3 padding
    assert_eq!(bits, 8);
    let spec = report_spec_of(HidProfile::Keyboard, ReportType::Output).unwrap();
    assert_eq!(spec.length_bytes, 1);
}

#[test]
fn keyboard_map_prefix_is_bit_exact() {
    // Collection header and report id, the part centrals key on.
    assert_eq!(
        &KEYBOARD_REPORT_DESC[..8],
        &[0x05, 0x01, 0x09, 0x06, 0xA1, 0x01, 0x85, 0x01]
    );
}

#[test]
fn mouse_map_uses_signed_8bit_relative_axes() {
    let desc = MOUSE_REPORT_DESC;
    // Logical Minimum (-127) / Logical Maximum (127) must be present.
    let has_min = desc.windows(2).any(|w| w == [0x15, 0x81]);
    let has_max = desc.windows(2).any(|w| w == [0x25, 0x7F]);
    assert!(has_min && has_max);
    // Relative flag on the axis input item.
    assert!(desc.windows(2).any(|w| w == [0x81, 0x06]));
}

#[test]
fn consumer_map_fixes_the_contracted_bit_order() {
    // The first six declared usages define the stable bitmask contract:
    // play/pause, next, prev, vol+, vol-, mute.
    let expected = [0xCDu8, 0xB5, 0xB6, 0xE9, 0xEA, 0xE2];
    let usages: Vec<u8> = CONSUMER_REPORT_DESC
        .windows(2)
        .filter(|w| w[0] == 0x09)
        .map(|w| w[1])
        .collect();
    assert_eq!(&usages[1..7], &expected); // usages[0] is Consumer Control
}

#[test]
fn composite_map_has_no_report_ids() {
    let desc = descriptor_of(HidProfile::Composite);
    let mut i = 0;
    while i < desc.len() {
        let prefix = desc[i];
        let size = match prefix & 0x03 {
            3 => 4,
            n => n as usize,
        };
        assert_ne!(prefix & 0xFC, 0x84, "composite map must not carry report ids");
        i += 1 + size;
    }
    let parsed = parse(desc);
    assert_eq!(input_bytes(&parsed, 0), 14);
    assert_eq!(parsed.collections, 4); // consumer + mouse(app+phys) + keyboard
}
