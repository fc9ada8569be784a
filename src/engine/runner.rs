//! Run-once / run-loop / stop state machine.
//!
//! ```text
//!            start_once                 pass done | stop
//!   Idle ───────────────▶ RunningOnce ──────────────────┐
//!    ▲  │  start_loop(n)                                │
//!    │  └──────────────▶ RunningLoop ── loops hit 0 ────┤
//!    │                        │ stop                    │
//!    │                        ▼                         │
//!    └────────────────── Stopping ◀─────────────────────┘
//! ```
//!
//! [`RunnerControl`] is the request-side handle: start transitions and the
//! stop flag are compare-and-set operations on atomics, everything else is
//! written by the [`Runner`] task. Cancellation is checked before each step
//! and during the pause between passes; a step that has begun always runs
//! to completion, so a drag that pressed its button also releases it.

use core::sync::atomic::{AtomicBool, AtomicI32, AtomicU16, AtomicU8, Ordering};

use embassy_futures::select::select;
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::signal::Signal;
use embedded_hal_async::delay::DelayNs;

use crate::config::{INTER_PASS_PAUSE_MS, NUDGE_PAUSE_MS};
use crate::error::Error;
use crate::hid::ReportSink;

use super::emitter::Emitter;
use super::settings::EngineConfig;
use super::step::{Action, Step};
use super::Engine;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Phase {
    Idle = 0,
    RunningOnce = 1,
    RunningLoop = 2,
    Stopping = 3,
}

impl Phase {
    const fn from_u8(v: u8) -> Self {
        match v {
            1 => Phase::RunningOnce,
            2 => Phase::RunningLoop,
            3 => Phase::Stopping,
            _ => Phase::Idle,
        }
    }

    pub const fn is_idle(self) -> bool {
        matches!(self, Phase::Idle)
    }
}

/// Loop counter value meaning "repeat until stopped".
pub const LOOP_FOREVER: i32 = -1;

/// A consistent-enough view of the runner for status reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RunnerSnapshot {
    pub phase: Phase,
    /// 1-based index of the step in flight, 0 when idle.
    pub step: u16,
    /// [`LOOP_FOREVER`], 0 when not looping, otherwise passes left.
    pub loops_remaining: i32,
}

/// Shared runner state. Lives inside [`Engine`].
pub struct RunnerControl<M: RawMutex> {
    phase: AtomicU8,
    step: AtomicU16,
    loops: AtomicI32,
    stop: AtomicBool,
    wake: Signal<M, ()>,
}

impl<M: RawMutex> Default for RunnerControl<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: RawMutex> RunnerControl<M> {
    pub const fn new() -> Self {
        Self {
            phase: AtomicU8::new(Phase::Idle as u8),
            step: AtomicU16::new(0),
            loops: AtomicI32::new(0),
            stop: AtomicBool::new(false),
            wake: Signal::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        Phase::from_u8(self.phase.load(Ordering::Acquire))
    }

    pub fn is_idle(&self) -> bool {
        self.phase().is_idle()
    }

    pub fn snapshot(&self) -> RunnerSnapshot {
        RunnerSnapshot {
            phase: self.phase(),
            step: self.step.load(Ordering::Relaxed),
            loops_remaining: self.loops.load(Ordering::Relaxed),
        }
    }

    fn begin(&self, to: Phase) -> Result<(), Error> {
        self.phase
            .compare_exchange(
                Phase::Idle as u8,
                to as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map(|_| ())
            .map_err(|_| Error::Busy)
    }

    /// Run the sequence once. `Busy` unless idle.
    pub fn start_once(&self) -> Result<(), Error> {
        self.begin(Phase::RunningOnce)?;
        self.stop.store(false, Ordering::Release);
        self.loops.store(0, Ordering::Relaxed);
        self.wake.signal(());
        Ok(())
    }

    /// Run the sequence `n` times, or until stopped when `n == 0`.
    pub fn start_loop(&self, n: u32) -> Result<(), Error> {
        self.begin(Phase::RunningLoop)?;
        self.stop.store(false, Ordering::Release);
        let loops = if n == 0 {
            LOOP_FOREVER
        } else {
            n.min(i32::MAX as u32) as i32
        };
        self.loops.store(loops, Ordering::Relaxed);
        self.wake.signal(());
        Ok(())
    }

    /// Request a cooperative stop. Stopping an idle runner does nothing.
    pub fn stop(&self) {
        for from in [Phase::RunningOnce, Phase::RunningLoop] {
            if self
                .phase
                .compare_exchange(
                    from as u8,
                    Phase::Stopping as u8,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_ok()
            {
                break;
            }
        }
        self.stop.store(true, Ordering::Release);
        self.wake.signal(());
    }

    /// A stop was requested for the current run.
    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Acquire) || self.phase() == Phase::Stopping
    }

    fn set_step(&self, step: u16) {
        self.step.store(step, Ordering::Relaxed);
    }

    /// Account for a finished pass. Returns `true` if another pass is due.
    fn pass_done(&self) -> bool {
        match self.phase() {
            Phase::RunningLoop => {
                let left = self.loops.load(Ordering::Relaxed);
                if left > 0 {
                    self.loops.store(left - 1, Ordering::Relaxed);
                    left > 1
                } else {
                    left == LOOP_FOREVER
                }
            }
            _ => false,
        }
    }

    fn finish(&self) {
        self.step.store(0, Ordering::Relaxed);
        self.loops.store(0, Ordering::Relaxed);
        self.stop.store(false, Ordering::Release);
        self.phase.store(Phase::Idle as u8, Ordering::Release);
    }
}

/// Executes the step sequence. Owns the HID emitter; only this task ever
/// emits reports.
pub struct Runner<'a, M: RawMutex, S, D> {
    engine: &'a Engine<M>,
    emitter: Emitter<S, D>,
}

impl<'a, M: RawMutex, S: ReportSink, D: DelayNs> Runner<'a, M, S, D> {
    pub fn new(engine: &'a Engine<M>, sink: S, delay: D) -> Self {
        Self {
            engine,
            emitter: Emitter::new(sink, delay),
        }
    }

    /// Serve start requests forever.
    pub async fn run(&mut self) -> ! {
        loop {
            self.serve().await;
        }
    }

    /// Wait for a start request and run until the runner is idle again.
    pub async fn serve(&mut self) {
        let engine = self.engine;
        let ctrl = engine.runner();
        while ctrl.is_idle() {
            ctrl.wake.wait().await;
        }
        // A start raced ahead of the wait above; its wake-up is stale.
        ctrl.wake.reset();

        info!("runner: start ({})", ctrl.phase());
        loop {
            if !self.run_pass().await {
                break;
            }
            if !ctrl.pass_done() || ctrl.stop_requested() {
                break;
            }
            debug!("runner: pass done, {} left", ctrl.snapshot().loops_remaining);
            select(
                self.emitter.pause_ms(INTER_PASS_PAUSE_MS),
                ctrl.wake.wait(),
            )
            .await;
            if ctrl.stop_requested() {
                break;
            }
        }

        self.emitter.release_all().await;
        ctrl.finish();
        info!("runner: idle");
    }

    /// One pass over the sequence. Returns `false` if a stop cut it short.
    async fn run_pass(&mut self) -> bool {
        let engine = self.engine;
        let ctrl = engine.runner();
        self.nudge().await;

        let mut index = 0;
        loop {
            if ctrl.stop_requested() {
                info!("runner: stopped before step {}", index + 1);
                return false;
            }
            let Some(step) = engine.step(index).await else {
                return true;
            };
            let config = engine.config().await;
            index += 1;
            ctrl.set_step(index as u16);
            trace!("runner: step {} {}", index, step.kind().name());
            self.execute(&step, &config).await;
        }
    }

    /// Tiny back-and-forth so the host wakes its cursor.
    async fn nudge(&mut self) {
        self.emitter.mouse_move(1, 0).await;
        self.emitter.pause_ms(NUDGE_PAUSE_MS).await;
        self.emitter.mouse_move(-1, 0).await;
        self.emitter.pause_ms(NUDGE_PAUSE_MS).await;
    }

    async fn execute(&mut self, step: &Step, config: &EngineConfig) {
        let cpp = config.counts_per_pixel;
        let em = &mut self.emitter;
        match &step.action {
            Action::Tap { at, button } => {
                em.move_to_pixel(*at, cpp).await;
                em.click(*button).await;
            }
            Action::Drag {
                from,
                to,
                button,
                duration_ms,
                steps,
            } => {
                em.drag(*from, *to, *button, *duration_ms, *steps, cpp)
                    .await;
            }
            Action::Type { text } => em.type_text(text).await,
            Action::Key { combo } => em.key_combo(combo).await,
            Action::Wait => {}
        }
        em.pause_ms(step.effective_post_delay(config.default_post_delay_ms))
            .await;
    }
}
