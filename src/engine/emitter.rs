//! Stateful HID event emitter.
//!
//! Tracks which mouse buttons and keys are held so every report carries the
//! full device state, the same way a physical keyboard or mouse would
//! report it.

use embedded_hal_async::delay::DelayNs;

use crate::config::CLICK_HOLD_MS;
use crate::hid::keyboard::modifier;
use crate::hid::keycodes::char_to_usage;
use crate::hid::{HidReport, KeyboardReport, MouseReport, ReportSink};

use super::step::Button;

/// Owns the report sink and the pacing clock for the runner.
pub struct Emitter<S, D> {
    sink: S,
    delay: D,
    buttons: u8,
    keyboard: KeyboardReport,
}

impl<S: ReportSink, D: DelayNs> Emitter<S, D> {
    pub fn new(sink: S, delay: D) -> Self {
        Self {
            sink,
            delay,
            buttons: 0,
            keyboard: KeyboardReport::empty(),
        }
    }

    /// Mouse buttons currently held.
    pub fn buttons(&self) -> u8 {
        self.buttons
    }

    /// Keyboard state as last reported.
    pub fn keyboard(&self) -> &KeyboardReport {
        &self.keyboard
    }

    pub async fn pause_ms(&mut self, ms: u32) {
        if ms > 0 {
            self.delay.delay_ms(ms).await;
        }
    }

    /// One relative motion report with the current buttons held.
    pub async fn mouse_move(&mut self, dx: i8, dy: i8) {
        let report = MouseReport::motion(self.buttons, dx, dy);
        self.sink.send(HidReport::Mouse(report)).await;
    }

    pub async fn press_button(&mut self, button: Button) {
        self.buttons |= button.mask();
        self.send_buttons().await;
    }

    pub async fn release_button(&mut self, button: Button) {
        self.buttons &= !button.mask();
        self.send_buttons().await;
    }

    /// Press, hold, release.
    pub async fn click(&mut self, button: Button) {
        self.press_button(button).await;
        self.pause_ms(CLICK_HOLD_MS).await;
        self.release_button(button).await;
    }

    pub async fn press_modifier(&mut self, bits: u8) {
        self.keyboard.modifier |= bits;
        self.send_keyboard().await;
    }

    pub async fn release_modifier(&mut self, bits: u8) {
        self.keyboard.modifier &= !bits;
        self.send_keyboard().await;
    }

    /// Press `usage`. A key already down or a full report sends nothing.
    pub async fn press_key(&mut self, usage: u8) {
        if self.keyboard.press(usage) {
            self.send_keyboard().await;
        }
    }

    pub async fn release_key(&mut self, usage: u8) {
        if self.keyboard.release(usage) {
            self.send_keyboard().await;
        }
    }

    /// Press and release `usage` with whatever modifiers are held.
    pub async fn tap_key(&mut self, usage: u8) {
        self.press_key(usage).await;
        self.release_key(usage).await;
    }

    /// Type one character on a US layout, adding shift where needed.
    ///
    /// Returns `false` (and sends nothing) if the character has no key.
    pub async fn type_char(&mut self, c: char) -> bool {
        let Some((usage, shift)) = char_to_usage(c) else {
            return false;
        };
        let shift_needed = shift && self.keyboard.modifier & modifier::LEFT_SHIFT == 0;
        if shift_needed {
            self.press_modifier(modifier::LEFT_SHIFT).await;
        }
        self.tap_key(usage).await;
        if shift_needed {
            self.release_modifier(modifier::LEFT_SHIFT).await;
        }
        true
    }

    /// Release every button, key and modifier still held.
    pub async fn release_all(&mut self) {
        if self.buttons != 0 {
            self.buttons = 0;
            self.send_buttons().await;
        }
        if !self.keyboard.is_empty() {
            self.keyboard = KeyboardReport::empty();
            self.send_keyboard().await;
        }
    }

    async fn send_buttons(&mut self) {
        let report = MouseReport::buttons(self.buttons);
        self.sink.send(HidReport::Mouse(report)).await;
    }

    async fn send_keyboard(&mut self) {
        let report = self.keyboard;
        self.sink.send(HidReport::Keyboard(report)).await;
    }
}
