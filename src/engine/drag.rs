//! Press-move-release gestures along a straight line.

use core::num::NonZeroU16;

use embedded_hal_async::delay::DelayNs;

use crate::config::{DRAG_HOLD_MS, DRAG_PRESS_SETTLE_MS, DRAG_RELEASE_SETTLE_MS};
use crate::hid::ReportSink;

use super::emitter::Emitter;
use super::step::{Button, Point};

/// Incremental pixel deltas between `n` evenly spaced waypoints.
///
/// Each delta is measured from the last *emitted* integer point rather
/// than the ideal one, so rounding never accumulates and the final
/// waypoint is exactly `to`. Deltas wider than `i32` (endpoints at
/// opposite extremes) saturate.
#[derive(Clone, Debug)]
pub struct Waypoints {
    from: Point,
    to: Point,
    n: u16,
    i: u16,
    last: (i64, i64),
}

impl Waypoints {
    pub fn new(from: Point, to: Point, n: NonZeroU16) -> Self {
        Self {
            from,
            to,
            n: n.get(),
            i: 0,
            last: (i64::from(from.x), i64::from(from.y)),
        }
    }

    /// Waypoint `i` of `n`: `from + (to - from) * i / n`, rounded half
    /// away from zero. Exact integer math, so any `i32` endpoints work.
    fn ideal(&self, i: u16) -> (i64, i64) {
        let n = i64::from(self.n);
        let i = i64::from(i.min(self.n));
        let lerp = |a: i32, b: i32| {
            let (a, b) = (i64::from(a), i64::from(b));
            div_round_half_away(a * n + (b - a) * i, n)
        };
        (lerp(self.from.x, self.to.x), lerp(self.from.y, self.to.y))
    }
}

/// `num / den` rounded half away from zero, for `den > 0`.
fn div_round_half_away(num: i64, den: i64) -> i64 {
    if num >= 0 {
        (2 * num + den) / (2 * den)
    } else {
        -((-2 * num + den) / (2 * den))
    }
}

fn saturate(v: i64) -> i32 {
    v.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

impl Iterator for Waypoints {
    type Item = (i32, i32);

    fn next(&mut self) -> Option<Self::Item> {
        if self.i >= self.n {
            return None;
        }
        self.i += 1;
        let (x, y) = self.ideal(self.i);
        let delta = (saturate(x - self.last.0), saturate(y - self.last.1));
        self.last = (x, y);
        Some(delta)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (self.n - self.i) as usize;
        (left, Some(left))
    }
}

/// Pause between waypoints: none for an instant drag, otherwise at least 1 ms.
pub fn waypoint_pause_ms(duration_ms: u32, n: NonZeroU16) -> u32 {
    if duration_ms == 0 {
        0
    } else {
        (duration_ms / n.get() as u32).max(1)
    }
}

impl<S: ReportSink, D: DelayNs> Emitter<S, D> {
    /// Drag `button` from `from` to `to` over `duration_ms`.
    ///
    /// The button is always released at the end, even for a zero-length
    /// drag.
    pub async fn drag(
        &mut self,
        from: Point,
        to: Point,
        button: Button,
        duration_ms: u32,
        steps: NonZeroU16,
        counts_per_pixel: f32,
    ) {
        self.move_to_pixel(from, counts_per_pixel).await;
        self.pause_ms(DRAG_PRESS_SETTLE_MS).await;
        self.press_button(button).await;
        self.pause_ms(DRAG_HOLD_MS).await;

        let pause = waypoint_pause_ms(duration_ms, steps);
        for (dx, dy) in Waypoints::new(from, to, steps) {
            if dx != 0 || dy != 0 {
                self.move_by_pixels(dx, dy, counts_per_pixel).await;
            }
            self.pause_ms(pause).await;
        }

        self.pause_ms(DRAG_RELEASE_SETTLE_MS).await;
        self.release_button(button).await;
    }
}
