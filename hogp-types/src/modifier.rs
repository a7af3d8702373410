use core::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, Not};

use bitfield_struct::bitfield;

/// Keyboard modifier byte as it appears in byte 0 of the input report.
///
/// | bit7 | bit6 | bit5 | bit4 | bit3 | bit2 | bit1 | bit0 |
/// | ---- | ---- | ---- | ---- | ---- | ---- | ---- | ---- |
/// | RGui | RAlt |RShift|RCtrl | LGui | LAlt |LShift|LCtrl |
#[bitfield(u8, order = Lsb, defmt = cfg(feature = "defmt"))]
#[derive(Eq, PartialEq)]
pub struct HidModifiers {
    #[bits(1)]
    pub left_ctrl: bool,
    #[bits(1)]
    pub left_shift: bool,
    #[bits(1)]
    pub left_alt: bool,
    #[bits(1)]
    pub left_gui: bool,
    #[bits(1)]
    pub right_ctrl: bool,
    #[bits(1)]
    pub right_shift: bool,
    #[bits(1)]
    pub right_alt: bool,
    #[bits(1)]
    pub right_gui: bool,
}

pub const LCTRL: HidModifiers = HidModifiers::new().with_left_ctrl(true);
pub const LSHIFT: HidModifiers = HidModifiers::new().with_left_shift(true);
pub const LALT: HidModifiers = HidModifiers::new().with_left_alt(true);
pub const LGUI: HidModifiers = HidModifiers::new().with_left_gui(true);
pub const RCTRL: HidModifiers = HidModifiers::new().with_right_ctrl(true);
pub const RSHIFT: HidModifiers = HidModifiers::new().with_right_shift(true);
pub const RALT: HidModifiers = HidModifiers::new().with_right_alt(true);
pub const RGUI: HidModifiers = HidModifiers::new().with_right_gui(true);

impl BitOr for HidModifiers {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self::from_bits(self.into_bits() | rhs.into_bits())
    }
}
impl BitAnd for HidModifiers {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self::Output {
        Self::from_bits(self.into_bits() & rhs.into_bits())
    }
}
impl Not for HidModifiers {
    type Output = Self;

    fn not(self) -> Self::Output {
        Self::from_bits(!self.into_bits())
    }
}
impl BitOrAssign for HidModifiers {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = *self | rhs;
    }
}
impl BitAndAssign for HidModifiers {
    fn bitand_assign(&mut self, rhs: Self) {
        *self = *self & rhs;
    }
}
