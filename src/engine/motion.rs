//! Pixel to relative-motion translation.
//!
//! A boot-protocol mouse can only report signed 8-bit displacements, so
//! every move is split into reports of at most [`HID_MAX_DELTA`] per axis.
//! Absolute targets are reached by first driving the cursor into the
//! top-left corner (homing) and then moving relative to that corner.
//! Homing assumes one display whose origin is the top-left pixel.

use embedded_hal_async::delay::DelayNs;

use crate::config::{HID_MAX_DELTA, HOME_REPORT_COUNT, HOME_SETTLE_MS, REPORT_PAUSE_MS};
use crate::hid::ReportSink;

use super::emitter::Emitter;
use super::step::Point;

/// Round to the nearest integer, halves away from zero.
pub fn round_half_away(v: f32) -> i32 {
    if v >= 0.0 {
        (v + 0.5) as i32
    } else {
        (v - 0.5) as i32
    }
}

/// Scale a pixel offset into device motion units.
pub fn to_device_delta(dpx: i32, dpy: i32, counts_per_pixel: f32) -> (i32, i32) {
    (
        round_half_away(dpx as f32 * counts_per_pixel),
        round_half_away(dpy as f32 * counts_per_pixel),
    )
}

/// Splits a device delta into per-report displacements whose sum is the
/// delta exactly.
#[derive(Clone, Debug)]
pub struct RelativeSteps {
    dx: i32,
    dy: i32,
}

impl RelativeSteps {
    pub const fn new(dx: i32, dy: i32) -> Self {
        Self { dx, dy }
    }
}

impl Iterator for RelativeSteps {
    type Item = (i8, i8);

    fn next(&mut self) -> Option<Self::Item> {
        if self.dx == 0 && self.dy == 0 {
            return None;
        }
        let sx = self.dx.clamp(-HID_MAX_DELTA, HID_MAX_DELTA);
        let sy = self.dy.clamp(-HID_MAX_DELTA, HID_MAX_DELTA);
        self.dx -= sx;
        self.dy -= sy;
        Some((sx as i8, sy as i8))
    }
}

impl<S: ReportSink, D: DelayNs> Emitter<S, D> {
    /// Emit `(dx, dy)` device units as clamped relative reports.
    pub async fn emit_relative(&mut self, dx: i32, dy: i32) {
        for (sx, sy) in RelativeSteps::new(dx, dy) {
            self.mouse_move(sx, sy).await;
            self.pause_ms(REPORT_PAUSE_MS).await;
        }
    }

    /// Drive the cursor into the top-left corner of the screen.
    pub async fn home_cursor(&mut self) {
        let max = -(HID_MAX_DELTA as i8);
        for _ in 0..HOME_REPORT_COUNT {
            self.mouse_move(max, max).await;
            self.pause_ms(REPORT_PAUSE_MS).await;
        }
    }

    /// Move by a pixel offset from wherever the cursor is.
    pub async fn move_by_pixels(&mut self, dpx: i32, dpy: i32, counts_per_pixel: f32) {
        let (dx, dy) = to_device_delta(dpx, dpy, counts_per_pixel);
        self.emit_relative(dx, dy).await;
    }

    /// Home, then move to `target` measured from the top-left corner.
    pub async fn move_to_pixel(&mut self, target: Point, counts_per_pixel: f32) {
        self.home_cursor().await;
        self.pause_ms(HOME_SETTLE_MS).await;
        self.move_by_pixels(target.x, target.y, counts_per_pixel)
            .await;
    }
}
