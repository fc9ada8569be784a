//! Relative mouse report, as sent on the mouse interface.
//!
//! Four bytes per report: button bits (left, right, middle in bits 0..3),
//! then signed X, Y and wheel deltas. The host adds each delta to wherever
//! its cursor already is, so every absolute target has to be reached from a
//! known corner (see [`crate::engine::motion`]).

pub const MOUSE_REPORT_SIZE: usize = 4;

/// Button bit masks.
pub mod button {
    pub const LEFT: u8 = 0x01;
    pub const RIGHT: u8 = 0x02;
    pub const MIDDLE: u8 = 0x04;
}

#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MouseReport {
    pub buttons: u8,
    pub x: i8,
    pub y: i8,
    /// Never driven by the replayer; always 0.
    pub wheel: i8,
}

impl MouseReport {
    pub const fn empty() -> Self {
        Self::motion(0, 0, 0)
    }

    /// Move by `(x, y)` with `buttons` held.
    pub const fn motion(buttons: u8, x: i8, y: i8) -> Self {
        Self {
            buttons,
            x,
            y,
            wheel: 0,
        }
    }

    /// Change the held buttons without moving.
    pub const fn buttons(buttons: u8) -> Self {
        Self::motion(buttons, 0, 0)
    }

    /// Write the wire form into `buf`. Returns 0 when `buf` is too short.
    pub fn serialize(&self, buf: &mut [u8]) -> usize {
        let Some(out) = buf.get_mut(..MOUSE_REPORT_SIZE) else {
            return 0;
        };
        out.copy_from_slice(&[self.buttons, self.x as u8, self.y as u8, self.wheel as u8]);
        MOUSE_REPORT_SIZE
    }

    /// No buttons and no motion.
    pub fn is_idle(&self) -> bool {
        *self == Self::empty()
    }
}

/// Report descriptor: three buttons, relative X/Y and a wheel, each axis
/// limited to ±127.
#[rustfmt::skip]
pub const MOUSE_REPORT_DESCRIPTOR: &[u8] = &[
    0x05, 0x01, 0x09, 0x02, 0xA1, 0x01,         // Generic Desktop / Mouse, application
    0x09, 0x01, 0xA1, 0x00,                     // Pointer, physical
    // Byte 0: buttons 1..3, then five constant bits.
    0x05, 0x09, 0x19, 0x01, 0x29, 0x03,
    0x15, 0x00, 0x25, 0x01, 0x95, 0x03, 0x75, 0x01, 0x81, 0x02,
    0x95, 0x01, 0x75, 0x05, 0x81, 0x01,
    // Bytes 1..3: X, Y, relative.
    0x05, 0x01, 0x09, 0x30, 0x09, 0x31,
    0x15, 0x81, 0x25, 0x7F, 0x75, 0x08, 0x95, 0x02, 0x81, 0x06,
    // Byte 3: wheel, relative.
    0x09, 0x38, 0x15, 0x81, 0x25, 0x7F, 0x75, 0x08, 0x95, 0x01, 0x81, 0x06,
    0xC0, 0xC0,
];
