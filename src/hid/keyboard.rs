//! Keyboard report, as sent on the keyboard interface.
//!
//! Eight bytes per report: the modifier bits (left Ctrl, Shift, Alt, GUI in
//! bits 0..4, right-hand ones above), a constant byte, then up to six key
//! usages. A key stays down on the host for as long as its usage is listed.

pub const KEYBOARD_REPORT_SIZE: usize = 8;

/// Modifier bit masks. Only the left-hand keys are ever pressed.
pub mod modifier {
    pub const LEFT_CTRL: u8 = 0x01;
    pub const LEFT_SHIFT: u8 = 0x02;
    pub const LEFT_ALT: u8 = 0x04;
    pub const LEFT_GUI: u8 = 0x08;
}

#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KeyboardReport {
    pub modifier: u8,
    pub reserved: u8,
    pub keycodes: [u8; 6],
}

impl KeyboardReport {
    /// Nothing held.
    pub const fn empty() -> Self {
        Self {
            modifier: 0,
            reserved: 0,
            keycodes: [0; 6],
        }
    }

    /// Add `usage` to the first free key slot.
    ///
    /// Returns `false` if the key is already down or all six slots are
    /// taken (the report is left unchanged).
    pub fn press(&mut self, usage: u8) -> bool {
        if usage == 0 || self.keycodes.contains(&usage) {
            return false;
        }
        match self.keycodes.iter_mut().find(|k| **k == 0) {
            Some(slot) => {
                *slot = usage;
                true
            }
            None => false,
        }
    }

    /// Remove `usage` from the key slots. Returns `false` if it wasn't down.
    pub fn release(&mut self, usage: u8) -> bool {
        match self.keycodes.iter_mut().find(|k| **k == usage && usage != 0) {
            Some(slot) => {
                *slot = 0;
                true
            }
            None => false,
        }
    }

    /// Returns `true` if `usage` is currently held.
    pub fn is_pressed(&self, usage: u8) -> bool {
        usage != 0 && self.keycodes.contains(&usage)
    }

    /// Write the wire form into `buf`. Returns 0 when `buf` is too short.
    pub fn serialize(&self, buf: &mut [u8]) -> usize {
        let Some(out) = buf.get_mut(..KEYBOARD_REPORT_SIZE) else {
            return 0;
        };
        out[0] = self.modifier;
        out[1] = self.reserved;
        out[2..].copy_from_slice(&self.keycodes);
        KEYBOARD_REPORT_SIZE
    }

    /// No modifier and no key held.
    pub fn is_empty(&self) -> bool {
        *self == Self::empty()
    }
}

/// Report descriptor: modifier bits, a constant byte, the five LED
/// outputs the host may write (ignored) and a six-key usage array.
#[rustfmt::skip]
pub const KEYBOARD_REPORT_DESCRIPTOR: &[u8] = &[
    0x05, 0x01, 0x09, 0x06, 0xA1, 0x01,         // Generic Desktop / Keyboard, application
    // Byte 0: modifiers E0..E7, one bit each.
    0x05, 0x07, 0x19, 0xE0, 0x29, 0xE7,
    0x15, 0x00, 0x25, 0x01, 0x75, 0x01, 0x95, 0x08, 0x81, 0x02,
    // Byte 1: constant.
    0x95, 0x01, 0x75, 0x08, 0x81, 0x01,
    // Output: five LED bits and three bits of padding.
    0x05, 0x08, 0x19, 0x01, 0x29, 0x05, 0x95, 0x05, 0x75, 0x01, 0x91, 0x02,
    0x95, 0x01, 0x75, 0x03, 0x91, 0x01,
    // Bytes 2..8: key usage array.
    0x05, 0x07, 0x19, 0x00, 0x29, 0xFF,
    0x15, 0x00, 0x26, 0xFF, 0x00, 0x95, 0x06, 0x75, 0x08, 0x81, 0x00,
    0xC0,
];
