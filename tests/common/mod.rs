//! Host doubles shared by the integration tests.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use embedded_hal_async::delay::DelayNs;
use hidreplay::engine::{EngineConfig, Point, Step, StepStore};
use hidreplay::hid::{HidReport, KeyboardReport, MouseReport};
use hidreplay::{Error, PeerPosition, Persistence, ReportSink};

/// Records every report. Clones share the same log.
#[derive(Clone, Default)]
pub struct RecordingSink {
    log: Rc<RefCell<Vec<HidReport>>>,
}

impl RecordingSink {
    pub fn mouse(&self) -> Vec<MouseReport> {
        self.log
            .borrow()
            .iter()
            .filter_map(|r| match r {
                HidReport::Mouse(m) => Some(*m),
                _ => None,
            })
            .collect()
    }

    pub fn keyboard(&self) -> Vec<KeyboardReport> {
        self.log
            .borrow()
            .iter()
            .filter_map(|r| match r {
                HidReport::Keyboard(k) => Some(*k),
                _ => None,
            })
            .collect()
    }

    pub fn total_motion(&self) -> (i64, i64) {
        self.mouse()
            .iter()
            .fold((0, 0), |(x, y), m| (x + m.x as i64, y + m.y as i64))
    }

    /// Number of pass-start nudges (a lone `+1` step to the right).
    pub fn nudges(&self) -> usize {
        self.mouse()
            .iter()
            .filter(|m| m.x == 1 && m.y == 0 && m.buttons == 0)
            .count()
    }
}

impl ReportSink for RecordingSink {
    async fn send(&mut self, report: HidReport) {
        self.log.borrow_mut().push(report);
    }
}

/// Clock that advances only when slept on, yielding once per sleep.
#[derive(Clone, Default)]
pub struct VirtualClock {
    elapsed_ns: Rc<Cell<u64>>,
}

impl VirtualClock {
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ns.get() / 1_000_000
    }

    async fn advance(&self, ns: u64) {
        self.elapsed_ns.set(self.elapsed_ns.get() + ns);
        embassy_futures::yield_now().await;
    }
}

impl DelayNs for VirtualClock {
    async fn delay_ns(&mut self, ns: u32) {
        self.advance(ns as u64).await;
    }

    async fn delay_ms(&mut self, ms: u32) {
        self.advance(ms as u64 * 1_000_000).await;
    }
}

/// Clock that advances one millisecond per poll, so a long sleep can be
/// observed (and raced) partway through. Clones share the same time.
#[derive(Clone, Default)]
pub struct TickingClock {
    elapsed_ms: Rc<Cell<u64>>,
}

impl TickingClock {
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms.get()
    }
}

impl DelayNs for TickingClock {
    async fn delay_ns(&mut self, ns: u32) {
        self.delay_ms(ns.div_ceil(1_000_000)).await;
    }

    async fn delay_ms(&mut self, ms: u32) {
        for _ in 0..ms {
            self.elapsed_ms.set(self.elapsed_ms.get() + 1);
            embassy_futures::yield_now().await;
        }
    }
}

/// In-memory persistence. Clones share the saved copy.
#[derive(Clone, Default)]
pub struct MemoryPersistence {
    saved: Rc<RefCell<Option<(EngineConfig, Vec<Step>)>>>,
    saves: Rc<Cell<usize>>,
    failing: Rc<Cell<bool>>,
}

impl MemoryPersistence {
    pub fn saves(&self) -> usize {
        self.saves.get()
    }

    pub fn saved(&self) -> Option<(EngineConfig, Vec<Step>)> {
        self.saved.borrow().clone()
    }

    pub fn fail(&self, failing: bool) {
        self.failing.set(failing);
    }
}

impl Persistence for MemoryPersistence {
    async fn load(&mut self, config: &mut EngineConfig, steps: &mut StepStore) -> Result<(), Error> {
        if self.failing.get() {
            return Err(Error::Storage);
        }
        if let Some((saved_config, saved_steps)) = self.saved.borrow().as_ref() {
            *config = saved_config.clone();
            steps.clear();
            for step in saved_steps {
                steps.push(step.clone())?;
            }
        }
        Ok(())
    }

    async fn save(&mut self, config: &EngineConfig, steps: &[Step]) -> Result<(), Error> {
        if self.failing.get() {
            return Err(Error::Storage);
        }
        *self.saved.borrow_mut() = Some((config.clone(), steps.to_vec()));
        self.saves.set(self.saves.get() + 1);
        Ok(())
    }
}

/// Peer that answers with a fixed position, or not at all.
#[derive(Clone, Default)]
pub struct FakePeer {
    answer: Rc<Cell<Option<Point>>>,
    requests: Rc<RefCell<Vec<Option<u8>>>>,
}

impl FakePeer {
    pub fn at(x: i32, y: i32) -> Self {
        let peer = Self::default();
        peer.answer.set(Some(Point::new(x, y)));
        peer
    }

    /// Capture delays of every request so far (`None` for `pos`).
    pub fn requests(&self) -> Vec<Option<u8>> {
        self.requests.borrow().clone()
    }
}

impl PeerPosition for FakePeer {
    async fn position(&mut self, capture_delay_s: Option<u8>) -> Result<Point, Error> {
        self.requests.borrow_mut().push(capture_delay_s);
        self.answer.get().ok_or(Error::UnreachablePeer)
    }
}
