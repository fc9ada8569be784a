//! Host-side doubles for the report sink and the pacing clock.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::vec::Vec;

use embedded_hal_async::delay::DelayNs;

use crate::hid::{HidReport, KeyboardReport, MouseReport, ReportSink};

/// Records every report it receives. Clones share the same log.
#[derive(Clone, Default)]
pub struct Recorder {
    log: Rc<RefCell<Vec<HidReport>>>,
}

impl Recorder {
    pub fn reports(&self) -> Vec<HidReport> {
        self.log.borrow().clone()
    }

    pub fn mouse_reports(&self) -> Vec<MouseReport> {
        self.log
            .borrow()
            .iter()
            .filter_map(|r| match r {
                HidReport::Mouse(m) => Some(*m),
                _ => None,
            })
            .collect()
    }

    pub fn keyboard_reports(&self) -> Vec<KeyboardReport> {
        self.log
            .borrow()
            .iter()
            .filter_map(|r| match r {
                HidReport::Keyboard(k) => Some(*k),
                _ => None,
            })
            .collect()
    }

    /// Sum of the relative motion of all mouse reports.
    pub fn total_motion(&self) -> (i64, i64) {
        self.mouse_reports()
            .iter()
            .fold((0, 0), |(x, y), m| (x + m.x as i64, y + m.y as i64))
    }
}

impl ReportSink for Recorder {
    async fn send(&mut self, report: HidReport) {
        self.log.borrow_mut().push(report);
    }
}

/// A clock that only advances when slept on. Each sleep yields once so
/// concurrently joined futures get to run.
#[derive(Clone, Default)]
pub struct VirtualDelay {
    elapsed_ns: Rc<Cell<u64>>,
}

impl VirtualDelay {
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ns.get() / 1_000_000
    }

    fn advance(&self, ns: u64) {
        self.elapsed_ns.set(self.elapsed_ns.get() + ns);
    }
}

impl DelayNs for VirtualDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.advance(ns as u64);
        embassy_futures::yield_now().await;
    }

    async fn delay_us(&mut self, us: u32) {
        self.advance(us as u64 * 1_000);
        embassy_futures::yield_now().await;
    }

    async fn delay_ms(&mut self, ms: u32) {
        self.advance(ms as u64 * 1_000_000);
        embassy_futures::yield_now().await;
    }
}
