//! # hogp-types
//!
//! Fundamental HID type definitions shared by the hogp engine and its hosts.
//!
//! - [`keycode`] - HID keyboard usage ids and the ASCII translation table
//! - [`modifier`] - modifier byte bitfield (LCtrl..RGui)
//! - [`mouse_button`] - mouse button bitfield
//! - [`media_key`] - consumer-control (media) bitmask
//! - [`led_indicator`] - keyboard LED output bitfield

#![no_std]

pub mod keycode;
pub mod led_indicator;
pub mod media_key;
pub mod modifier;
pub mod mouse_button;
