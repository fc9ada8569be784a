//! hidreplay: replays recorded mouse/keyboard macros as a USB HID device.
//!
//! This library holds everything that doesn't touch hardware: HID report
//! types, the macro engine (step model, motion translation, drag
//! interpolation, key combos, runner), the control protocol and the
//! persistence / peer-position contracts. It builds for the target as
//! `no_std` and runs its tests on the host.
//!
//! Usage: `cargo test --lib` / `cargo test`
//!
//! The firmware binary (`main.rs`, feature `embedded`) adds the USB
//! device, flash storage and the serial control link on top.

#![cfg_attr(not(test), no_std)]

// Must come first: the logging macros are textually scoped.
mod fmt;

pub mod config;
pub mod control;
pub mod engine;
pub mod error;
pub mod hid;
pub mod peer;
pub mod persist;

pub use control::Control;
pub use engine::{Engine, Runner};
pub use error::Error;
pub use hid::{HidReport, ReportSink};
pub use peer::PeerPosition;
pub use persist::Persistence;
