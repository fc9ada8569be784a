//! Persistent storage for the macro and its configuration.
//!
//! Uses the nRF52840's internal flash via `sequential-storage` crate so the
//! macro survives power cycles.
//!
//! Storage layout (key-value map, values are `postcard`-encoded):
//!   - `0x01`: the [`EngineConfig`].
//!   - `0x02`: the step count.
//!   - `0x10 + i`: step `i`.
//!
//! Entries past the stored count are stale leftovers of a longer macro and
//! are never read. The flash pages are managed by `sequential-storage`
//! which handles wear levelling and GC.

use defmt::{debug, error, info, warn};
use embassy_embedded_hal::adapter::BlockingAsync;
use embassy_nrf::nvmc::Nvmc;
use embedded_storage_async::nor_flash::NorFlash;
use sequential_storage::cache::NoCache;
use sequential_storage::map::{fetch_item, store_item};
use serde::de::DeserializeOwned;
use serde::Serialize;

use hidreplay::config::{
    MAX_STEPS, STEP_RECORD_CAPACITY, STORAGE_FLASH_PAGE_COUNT, STORAGE_FLASH_PAGE_START,
};
use hidreplay::engine::{EngineConfig, Step, StepStore};
use hidreplay::{Error, Persistence};

/// Flash page size for nRF52840 (4 KB).
const FLASH_PAGE_SIZE: u32 = 4096;

/// Start address of our storage region.
const STORAGE_START: u32 = STORAGE_FLASH_PAGE_START * FLASH_PAGE_SIZE;

/// End address (exclusive) of our storage region.
const STORAGE_END: u32 = (STORAGE_FLASH_PAGE_START + STORAGE_FLASH_PAGE_COUNT) * FLASH_PAGE_SIZE;

const KEY_CONFIG: u8 = 0x01;
const KEY_STEP_COUNT: u8 = 0x02;
const KEY_STEP_BASE: u8 = 0x10;

/// Room for one encoded item plus the key and the map's own bookkeeping.
const MAX_RECORD_SIZE: usize = STEP_RECORD_CAPACITY + 32;

// Every step key must fit in a byte.
const _: () = assert!(KEY_STEP_BASE as usize + MAX_STEPS <= u8::MAX as usize + 1);

/// The on-chip flash as the firmware uses it.
pub type FlashStorage = FlashPersistence<BlockingAsync<Nvmc<'static>>>;

/// [`Persistence`] backed by a NOR flash region.
pub struct FlashPersistence<F> {
    flash: F,
    buf: [u8; MAX_RECORD_SIZE],
}

impl<F: NorFlash> FlashPersistence<F> {
    pub fn new(flash: F) -> Self {
        Self {
            flash,
            buf: [0; MAX_RECORD_SIZE],
        }
    }

    async fn fetch<T: DeserializeOwned>(&mut self, key: u8) -> Result<Option<T>, Error> {
        let item = fetch_item::<u8, &[u8], _>(
            &mut self.flash,
            STORAGE_START..STORAGE_END,
            &mut NoCache::new(),
            &mut self.buf,
            &key,
        )
        .await
        .map_err(|e| {
            error!("Flash read error: {:?}", defmt::Debug2Format(&e));
            Error::Storage
        })?;

        match item {
            Some(data) => postcard::from_bytes(data).map(Some).map_err(|_| {
                warn!("Corrupt flash record {=u8:#x}", key);
                Error::Storage
            }),
            None => Ok(None),
        }
    }

    async fn store<T: Serialize>(&mut self, key: u8, value: &T) -> Result<(), Error> {
        let mut encoded = [0u8; STEP_RECORD_CAPACITY];
        let item: &[u8] = postcard::to_slice(value, &mut encoded).map_err(|_| Error::BufferOverflow)?;

        store_item::<u8, &[u8], _>(
            &mut self.flash,
            STORAGE_START..STORAGE_END,
            &mut NoCache::new(),
            &mut self.buf,
            &key,
            &item,
        )
        .await
        .map_err(|e| {
            error!("Flash write error: {:?}", defmt::Debug2Format(&e));
            Error::Storage
        })
    }
}

impl<F: NorFlash> Persistence for FlashPersistence<F> {
    async fn load(&mut self, config: &mut EngineConfig, steps: &mut StepStore) -> Result<(), Error> {
        let stored_config: EngineConfig = self.fetch(KEY_CONFIG).await?.unwrap_or_default();
        let count: u16 = self.fetch(KEY_STEP_COUNT).await?.unwrap_or(0);

        steps.clear();
        for i in 0..usize::from(count).min(MAX_STEPS) {
            let step: Step = self.fetch(KEY_STEP_BASE + i as u8).await?.ok_or_else(|| {
                warn!("Step {} missing from flash", i);
                Error::Storage
            })?;
            steps.push(step)?;
        }

        info!("Loaded {} steps from flash", steps.len());
        *config = stored_config;
        Ok(())
    }

    async fn save(&mut self, config: &EngineConfig, steps: &[Step]) -> Result<(), Error> {
        self.store(KEY_CONFIG, config).await?;
        for (i, step) in steps.iter().enumerate() {
            self.store(KEY_STEP_BASE + i as u8, step).await?;
        }
        // Count last, so it never names a record that wasn't written.
        self.store(KEY_STEP_COUNT, &(steps.len() as u16)).await?;
        debug!("Saved {} steps to flash", steps.len());
        Ok(())
    }
}
