//! USB composite device - keyboard + mouse + serial control port.
//!
//! Initialises the Embassy USB stack on the nRF52840 hardware USB
//! peripheral and exposes two HID endpoints and a CDC-ACM interface.

use defmt::{info, warn};
use embassy_nrf::usb::vbus_detect::HardwareVbusDetect;
use embassy_nrf::usb::Driver;
use embassy_nrf::{self, bind_interrupts, peripherals};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Receiver;
use embassy_usb::class::cdc_acm::{CdcAcmClass, State as CdcState};
use embassy_usb::class::hid::{Config as HidConfig, HidWriter, State as HidState};
use embassy_usb::{Builder, Config, UsbDevice};
use static_cell::StaticCell;

use hidreplay::config;
use hidreplay::hid::keyboard::{KEYBOARD_REPORT_DESCRIPTOR, KEYBOARD_REPORT_SIZE};
use hidreplay::hid::mouse::MOUSE_REPORT_DESCRIPTOR;
use hidreplay::hid::HidReport;

use super::UsbDriver;

bind_interrupts!(struct Irqs {
    USBD => embassy_nrf::usb::InterruptHandler<peripherals::USBD>;
    CLOCK_POWER => embassy_nrf::usb::vbus_detect::InterruptHandler;
});

/// Depth of the engine → HID writer report channel.
pub const REPORT_CHANNEL_DEPTH: usize = 16;

static KB_STATE: StaticCell<HidState> = StaticCell::new();
static MOUSE_STATE: StaticCell<HidState> = StaticCell::new();
static CDC_STATE: StaticCell<CdcState> = StaticCell::new();
static USB_CONFIG_DESC: StaticCell<[u8; 256]> = StaticCell::new();
static USB_BOS_DESC: StaticCell<[u8; 256]> = StaticCell::new();
static USB_MSOS_DESC: StaticCell<[u8; 256]> = StaticCell::new();
static USB_CTRL_BUF: StaticCell<[u8; 128]> = StaticCell::new();

pub type HidEndpoint = HidWriter<'static, UsbDriver, KEYBOARD_REPORT_SIZE>;

/// Build result containing the USB device runner, the two HID writers and
/// the serial control port.
pub struct UsbHidDevice {
    pub device: UsbDevice<'static, UsbDriver>,
    pub keyboard_writer: HidEndpoint,
    pub mouse_writer: HidEndpoint,
    pub serial: CdcAcmClass<'static, UsbDriver>,
}

/// Initialise the USB stack and create the composite device.
///
/// Must be called exactly once.  All static buffers are consumed here.
pub fn init(usbd: peripherals::USBD) -> UsbHidDevice {
    // Create the low-level USB driver with hardware VBUS detection.
    let driver = Driver::new(usbd, Irqs, HardwareVbusDetect::new(Irqs));

    // USB device-level configuration.
    let mut usb_config = Config::new(config::USB_VID, config::USB_PID);
    usb_config.manufacturer = Some(config::USB_MANUFACTURER);
    usb_config.product = Some(config::USB_PRODUCT);
    usb_config.serial_number = Some(config::USB_SERIAL_NUMBER);
    usb_config.max_power = 100; // mA
    usb_config.max_packet_size_0 = 64;

    // CDC-ACM needs an interface association descriptor to live next to
    // the HID interfaces.
    usb_config.device_class = 0xEF;
    usb_config.device_sub_class = 0x02;
    usb_config.device_protocol = 0x01;
    usb_config.composite_with_iads = true;

    // Allocate static descriptor buffers.
    let config_desc = USB_CONFIG_DESC.init([0u8; 256]);
    let bos_desc = USB_BOS_DESC.init([0u8; 256]);
    let msos_desc = USB_MSOS_DESC.init([0u8; 256]);
    let ctrl_buf = USB_CTRL_BUF.init([0u8; 128]);

    let mut builder = Builder::new(
        driver,
        usb_config,
        config_desc,
        bos_desc,
        msos_desc,
        ctrl_buf,
    );

    let kb_state = KB_STATE.init(HidState::new());
    let kb_config = HidConfig {
        report_descriptor: KEYBOARD_REPORT_DESCRIPTOR,
        request_handler: None,
        poll_ms: config::USB_HID_POLL_MS,
        max_packet_size: 8,
    };
    let keyboard_writer = HidWriter::new(&mut builder, kb_state, kb_config);

    let mouse_state = MOUSE_STATE.init(HidState::new());
    let mouse_config = HidConfig {
        report_descriptor: MOUSE_REPORT_DESCRIPTOR,
        request_handler: None,
        poll_ms: config::USB_HID_POLL_MS,
        max_packet_size: 8,
    };
    let mouse_writer = HidWriter::new(&mut builder, mouse_state, mouse_config);

    let cdc_state = CDC_STATE.init(CdcState::new());
    let serial = CdcAcmClass::new(&mut builder, cdc_state, config::USB_CDC_PACKET_SIZE);

    let device = builder.build();

    info!("USB composite device initialised (keyboard + mouse + serial)");

    UsbHidDevice {
        device,
        keyboard_writer,
        mouse_writer,
        serial,
    }
}

/// Run the USB device stack - must be spawned as a dedicated Embassy task.
///
/// This handles USB enumeration, suspend/resume, and endpoint servicing.
/// It runs forever (or until the USB cable is disconnected).
pub async fn run_usb_device(mut device: UsbDevice<'static, UsbDriver>) -> ! {
    info!("USB device task started");
    device.run().await
}

/// HID report forwarding task - reads from the engine's report channel and
/// writes to the appropriate USB HID endpoint.
pub async fn hid_writer_task(
    mut keyboard: HidEndpoint,
    mut mouse: HidEndpoint,
    report_rx: Receiver<'static, CriticalSectionRawMutex, HidReport, REPORT_CHANNEL_DEPTH>,
) -> ! {
    info!("HID writer task started - waiting for reports");

    let mut buf = [0u8; KEYBOARD_REPORT_SIZE];

    loop {
        let report = report_rx.receive().await;
        let n = report.serialize(&mut buf);

        let result = match report {
            HidReport::Keyboard(_) => keyboard.write(&buf[..n]).await,
            HidReport::Mouse(_) => mouse.write(&buf[..n]).await,
        };
        if result.is_err() {
            warn!("USB HID write failed, report dropped: {}", report);
        }
    }
}
