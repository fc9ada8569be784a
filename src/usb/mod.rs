//! USB Device subsystem - presents a composite device to the host.
//!
//! The nRF52840's built-in USB 2.0 Full-Speed controller is driven by
//! `embassy-usb`.  We create a **composite device** with three functions:
//!
//! - HID keyboard (boot protocol)
//! - HID mouse    (boot protocol)
//! - CDC-ACM serial port carrying the line-based control protocol
//!
//! The HID writer task drains the engine's report channel into the two
//! HID endpoints; the control link task serves requests on the serial
//! port.

pub mod hid_device;
pub mod link;

use embassy_nrf::peripherals;
use embassy_nrf::usb::vbus_detect::HardwareVbusDetect;
use embassy_nrf::usb::Driver;

/// The USB driver type used throughout the firmware.
pub type UsbDriver = Driver<'static, peripherals::USBD, HardwareVbusDetect>;
