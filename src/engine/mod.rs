//! Macro execution engine.
//!
//! [`Engine`] is the state shared between the control link and the runner
//! task: the step store, the runtime configuration and the runner's state.
//! Structural changes to the step sequence are refused while a run is in
//! progress, so the runner always sees a stable sequence.

pub mod drag;
pub mod emitter;
pub mod keys;
pub mod motion;
pub mod runner;
pub mod settings;
pub mod step;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::mutex::{Mutex, MutexGuard};
use serde::Serialize;

use crate::error::Error;
use crate::persist::Persistence;

pub use emitter::Emitter;
pub use runner::{Phase, Runner, RunnerControl, RunnerSnapshot, LOOP_FOREVER};
pub use settings::{ConfigPatch, EngineConfig};
pub use step::{Action, Button, Point, Step, StepKind};
pub use store::{Direction, StepStore};

/// Status as reported over the control link.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Status {
    pub running: bool,
    #[serde(rename = "loop")]
    pub looping: bool,
    /// 1-based index of the step in flight, 0 when idle.
    pub step: u16,
    /// Number of stored steps.
    pub count: u16,
    /// `-1` for an endless loop.
    pub loops_left: i32,
}

pub struct Engine<M: RawMutex> {
    steps: Mutex<M, StepStore>,
    config: Mutex<M, EngineConfig>,
    runner: RunnerControl<M>,
}

impl<M: RawMutex> Default for Engine<M> {
    fn default() -> Self {
        Self::new(EngineConfig::default(), StepStore::new())
    }
}

impl<M: RawMutex> Engine<M> {
    pub fn new(config: EngineConfig, steps: StepStore) -> Self {
        Self {
            steps: Mutex::new(steps),
            config: Mutex::new(config),
            runner: RunnerControl::new(),
        }
    }

    pub fn runner(&self) -> &RunnerControl<M> {
        &self.runner
    }

    pub async fn status(&self) -> Status {
        let snap = self.runner.snapshot();
        let count = self.steps.lock().await.len() as u16;
        Status {
            running: !snap.phase.is_idle(),
            looping: snap.phase == Phase::RunningLoop,
            step: snap.step,
            count,
            loops_left: snap.loops_remaining,
        }
    }

    // Configuration

    /// A copy of the current configuration.
    pub async fn config(&self) -> EngineConfig {
        self.config.lock().await.clone()
    }

    /// Merge `patch` into the configuration. Allowed while running; the
    /// runner picks it up at the next step.
    pub async fn update_config(&self, patch: &ConfigPatch) -> EngineConfig {
        let mut config = self.config.lock().await;
        config.apply(patch);
        config.clone()
    }

    // Steps

    /// A copy of step `index`, if it exists.
    pub async fn step(&self, index: usize) -> Option<Step> {
        self.steps.lock().await.get(index).cloned()
    }

    pub async fn step_count(&self) -> usize {
        self.steps.lock().await.len()
    }

    /// Read access to the whole sequence, e.g. for export. Keep the guard
    /// short-lived: the runner waits on it between steps.
    pub async fn lock_steps(&self) -> MutexGuard<'_, M, StepStore> {
        self.steps.lock().await
    }

    /// Lock the store for a structural change, or fail with `Busy`.
    async fn edit(&self) -> Result<MutexGuard<'_, M, StepStore>, Error> {
        let guard = self.steps.lock().await;
        if self.runner.is_idle() {
            Ok(guard)
        } else {
            warn!("store: edit refused, runner is {}", self.runner.phase());
            Err(Error::Busy)
        }
    }

    /// Append `step`, returning its index.
    pub async fn add(&self, step: Step) -> Result<usize, Error> {
        let mut steps = self.edit().await?;
        steps.push(step).inspect_err(|_| warn!("store: full"))?;
        Ok(steps.len() - 1)
    }

    pub async fn insert(&self, index: usize, step: Step) -> Result<(), Error> {
        self.edit().await?.insert(index, step)
    }

    pub async fn move_step(&self, index: usize, direction: Direction) -> Result<(), Error> {
        self.edit().await?.move_step(index, direction)
    }

    pub async fn delete(&self, index: usize) -> Result<Step, Error> {
        self.edit().await?.remove(index)
    }

    pub async fn clear(&self) -> Result<(), Error> {
        self.edit().await?.clear();
        Ok(())
    }

    /// Rewrite configuration and steps together with `f`, or fail with
    /// `Busy`.
    ///
    /// `f` runs with both locks held and must not leave either half-changed
    /// on error. Payloads are parsed inside `f` so the decoded sequence
    /// never lives across an await.
    pub async fn rewrite<R>(
        &self,
        f: impl FnOnce(&mut EngineConfig, &mut StepStore) -> Result<R, Error>,
    ) -> Result<R, Error> {
        let mut steps = self.edit().await?;
        let mut config = self.config.lock().await;
        f(&mut *config, &mut *steps)
    }

    /// Load the saved macro in place. On failure both halves fall back to
    /// their defaults and the error is returned.
    pub async fn restore<P: Persistence>(&self, persist: &mut P) -> Result<(), Error> {
        let mut steps = self.edit().await?;
        let mut config = self.config.lock().await;
        let result = persist.load(&mut *config, &mut *steps).await;
        if result.is_err() {
            *config = EngineConfig::default();
            steps.clear();
        }
        result
    }

    pub fn start_once(&self) -> Result<(), Error> {
        self.runner.start_once()
    }

    pub fn start_loop(&self, n: u32) -> Result<(), Error> {
        self.runner.start_loop(n)
    }

    pub fn stop(&self) {
        self.runner.stop()
    }
}
