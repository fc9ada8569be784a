//! Persistence contract for the macro and its configuration.
//!
//! The control layer calls [`Persistence::save`] after every mutating
//! request and [`Persistence::load`] once at boot. The firmware backs it
//! with internal flash (see `storage.rs` in the binary); tests use an
//! in-memory copy.

use crate::engine::{EngineConfig, Step, StepStore};
use crate::error::Error;

#[allow(async_fn_in_trait)]
pub trait Persistence {
    /// Read the saved configuration and steps into `config` and `steps`.
    /// Missing data leaves the defaults in place; corrupt data is an error,
    /// after which either output may be partly written.
    async fn load(&mut self, config: &mut EngineConfig, steps: &mut StepStore)
        -> Result<(), Error>;

    /// Replace the saved copy with `config` and `steps`.
    async fn save(&mut self, config: &EngineConfig, steps: &[Step]) -> Result<(), Error>;
}

impl<P: Persistence + ?Sized> Persistence for &mut P {
    async fn load(
        &mut self,
        config: &mut EngineConfig,
        steps: &mut StepStore,
    ) -> Result<(), Error> {
        (**self).load(config, steps).await
    }

    async fn save(&mut self, config: &EngineConfig, steps: &[Step]) -> Result<(), Error> {
        (**self).save(config, steps).await
    }
}
