//! Bounded, ordered step sequence.

use crate::config::MAX_STEPS;
use crate::error::Error;

use super::step::Step;

/// Direction for [`StepStore::move_step`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Towards index 0.
    Up,
    /// Towards the end.
    Down,
}

/// The recorded macro: an ordered sequence of at most [`MAX_STEPS`] steps.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StepStore {
    steps: heapless::Vec<Step, MAX_STEPS>,
}

impl StepStore {
    pub const fn new() -> Self {
        Self {
            steps: heapless::Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.steps.is_full()
    }

    pub fn get(&self, index: usize) -> Option<&Step> {
        self.steps.get(index)
    }

    pub fn as_slice(&self) -> &[Step] {
        &self.steps
    }

    pub fn iter(&self) -> core::slice::Iter<'_, Step> {
        self.steps.iter()
    }

    /// Append a step.
    pub fn push(&mut self, step: Step) -> Result<(), Error> {
        self.steps.push(step).map_err(|_| Error::CapacityExceeded)
    }

    /// Insert `step` before `index`. `index == len()` appends.
    pub fn insert(&mut self, index: usize, step: Step) -> Result<(), Error> {
        if index > self.steps.len() {
            return Err(Error::InvalidIndex);
        }
        self.steps
            .insert(index, step)
            .map_err(|_| Error::CapacityExceeded)
    }

    /// Swap the step at `index` with its neighbour in `direction`.
    ///
    /// Moving the first step up or the last step down is a no-op.
    pub fn move_step(&mut self, index: usize, direction: Direction) -> Result<(), Error> {
        if index >= self.steps.len() {
            return Err(Error::InvalidIndex);
        }
        let other = match direction {
            Direction::Up if index > 0 => index - 1,
            Direction::Down if index + 1 < self.steps.len() => index + 1,
            _ => return Ok(()),
        };
        self.steps.swap(index, other);
        Ok(())
    }

    /// Remove and return the step at `index`.
    pub fn remove(&mut self, index: usize) -> Result<Step, Error> {
        if index >= self.steps.len() {
            return Err(Error::InvalidIndex);
        }
        Ok(self.steps.remove(index))
    }

    pub fn clear(&mut self) {
        self.steps.clear();
    }
}

impl<'a> IntoIterator for &'a StepStore {
    type Item = &'a Step;
    type IntoIter = core::slice::Iter<'a, Step>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}
