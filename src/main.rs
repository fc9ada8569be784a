//! hidreplay firmware entry point.
//!
//! Runs on the nRF52840 and enumerates as a USB keyboard + mouse + serial
//! port. The macro and its configuration are restored from flash at boot;
//! the host edits and starts them over the serial control link.
//!
//! Task layout:
//!   - `usb_task`: USB enumeration and endpoint servicing.
//!   - `hid_writer`: drains the report channel into the HID endpoints.
//!   - `runner_task`: executes macro passes, pushing reports into the
//!     channel.
//!   - `control_task`: serves the line protocol and saves every change.

#![no_std]
#![no_main]

mod storage;
mod usb;

use defmt::{info, unwrap, warn};
use embassy_embedded_hal::adapter::BlockingAsync;
use embassy_executor::Spawner;
use embassy_nrf::config::{Config as NrfConfig, HfclkSource};
use embassy_nrf::nvmc::Nvmc;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::Delay;
use embassy_usb::class::cdc_acm::CdcAcmClass;
use embassy_usb::UsbDevice;
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use hidreplay::engine::{Engine, Runner};
use hidreplay::hid::HidReport;

use storage::{FlashPersistence, FlashStorage};
use usb::hid_device::{HidEndpoint, REPORT_CHANNEL_DEPTH};
use usb::UsbDriver;

type AppEngine = Engine<CriticalSectionRawMutex>;

/// Reports from the runner to the HID writer.
static HID_REPORTS: Channel<CriticalSectionRawMutex, HidReport, REPORT_CHANNEL_DEPTH> =
    Channel::new();

static ENGINE: StaticCell<AppEngine> = StaticCell::new();

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    // USB needs the external crystal.
    let mut nrf_config = NrfConfig::default();
    nrf_config.hfclk_source = HfclkSource::ExternalXtal;
    let p = embassy_nrf::init(nrf_config);

    info!("hidreplay starting");

    let mut storage = FlashPersistence::new(BlockingAsync::new(Nvmc::new(p.NVMC)));
    let engine: &'static AppEngine = ENGINE.init_with(AppEngine::default);
    if let Err(e) = engine.restore(&mut storage).await {
        warn!("Stored macro unreadable ({}), starting empty", e);
    }
    let autorun = engine.config().await.autorun;

    let usb = usb::hid_device::init(p.USBD);

    unwrap!(spawner.spawn(usb_task(usb.device)));
    unwrap!(spawner.spawn(hid_writer(usb.keyboard_writer, usb.mouse_writer)));
    unwrap!(spawner.spawn(runner_task(engine)));
    unwrap!(spawner.spawn(control_task(usb.serial, engine, storage)));

    if autorun {
        info!("Autorun: looping forever");
        if let Err(e) = engine.start_loop(0) {
            warn!("Autorun failed: {}", e);
        }
    }
}

#[embassy_executor::task]
async fn usb_task(device: UsbDevice<'static, UsbDriver>) {
    usb::hid_device::run_usb_device(device).await
}

#[embassy_executor::task]
async fn hid_writer(keyboard: HidEndpoint, mouse: HidEndpoint) {
    usb::hid_device::hid_writer_task(keyboard, mouse, HID_REPORTS.receiver()).await
}

#[embassy_executor::task]
async fn runner_task(engine: &'static AppEngine) {
    let mut runner = Runner::new(engine, HID_REPORTS.sender(), Delay);
    runner.run().await
}

#[embassy_executor::task]
async fn control_task(
    serial: CdcAcmClass<'static, UsbDriver>,
    engine: &'static AppEngine,
    storage: FlashStorage,
) {
    usb::link::serve(serial, engine, storage).await
}
