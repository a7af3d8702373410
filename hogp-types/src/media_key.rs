//! Consumer-control (media) key bitmask.
//!
//! Bit order matches the usage order of the consumer report map, so
//! `into_bits()` is the little-endian report payload. The low six bits are
//! the stable transport contract (play/pause, next, previous, volume up,
//! volume down, mute); the upper bits carry the secondary usages.

use core::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, Not};

use bitfield_struct::bitfield;

/// 16-bit media key bitmask. One bit per usage declared in the report map.
#[bitfield(u16, order = Lsb, defmt = cfg(feature = "defmt"))]
#[derive(Eq, PartialEq)]
pub struct MediaKeys {
    /// Play/Pause (usage 0xCD), mask 0x0001
    #[bits(1)]
    pub play_pause: bool,
    /// Scan Next Track (usage 0xB5), mask 0x0002
    #[bits(1)]
    pub next_track: bool,
    /// Scan Previous Track (usage 0xB6), mask 0x0004
    #[bits(1)]
    pub prev_track: bool,
    /// Volume Increment (usage 0xE9), mask 0x0008
    #[bits(1)]
    pub volume_up: bool,
    /// Volume Decrement (usage 0xEA), mask 0x0010
    #[bits(1)]
    pub volume_down: bool,
    /// Mute (usage 0xE2), mask 0x0020
    #[bits(1)]
    pub mute: bool,
    /// Stop (usage 0xB7)
    #[bits(1)]
    pub stop: bool,
    /// Eject (usage 0xB8)
    #[bits(1)]
    pub eject: bool,
    /// Record (usage 0xB2)
    #[bits(1)]
    pub record: bool,
    /// Fast Forward (usage 0xB3)
    #[bits(1)]
    pub fast_forward: bool,
    /// Rewind (usage 0xB4)
    #[bits(1)]
    pub rewind: bool,
    /// AL Email Reader (usage 0x18A)
    #[bits(1)]
    pub email: bool,
    /// AL Calculator (usage 0x192)
    #[bits(1)]
    pub calculator: bool,
    /// AC Search (usage 0x221)
    #[bits(1)]
    pub browser_search: bool,
    /// AC Home (usage 0x223)
    #[bits(1)]
    pub browser_home: bool,
    /// AC Back (usage 0x224)
    #[bits(1)]
    pub browser_back: bool,
}

pub const PLAY_PAUSE: MediaKeys = MediaKeys::new().with_play_pause(true);
pub const NEXT_TRACK: MediaKeys = MediaKeys::new().with_next_track(true);
pub const PREV_TRACK: MediaKeys = MediaKeys::new().with_prev_track(true);
pub const VOLUME_UP: MediaKeys = MediaKeys::new().with_volume_up(true);
pub const VOLUME_DOWN: MediaKeys = MediaKeys::new().with_volume_down(true);
pub const MUTE: MediaKeys = MediaKeys::new().with_mute(true);

impl BitOr for MediaKeys {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self::from_bits(self.into_bits() | rhs.into_bits())
    }
}
impl BitAnd for MediaKeys {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self::Output {
        Self::from_bits(self.into_bits() & rhs.into_bits())
    }
}
impl Not for MediaKeys {
    type Output = Self;

    fn not(self) -> Self::Output {
        Self::from_bits(!self.into_bits())
    }
}
impl BitOrAssign for MediaKeys {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = *self | rhs;
    }
}
impl BitAndAssign for MediaKeys {
    fn bitand_assign(&mut self, rhs: Self) {
        *self = *self & rhs;
    }
}
