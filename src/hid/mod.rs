//! HID report types and the sink the engine writes them into.
//!
//! The engine never touches the USB stack directly: it pushes
//! [`HidReport`]s into a [`ReportSink`]. On target the sink is the sending
//! half of the channel drained by the USB HID writer task; in tests it is
//! a recorder.

pub mod keyboard;
pub mod keycodes;
pub mod mouse;


pub use keyboard::KeyboardReport;
pub use mouse::MouseReport;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::Sender;

/// A single report bound for one of the two HID interfaces.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HidReport {
    Keyboard(KeyboardReport),
    Mouse(MouseReport),
}

impl HidReport {
    pub fn serialize(&self, buf: &mut [u8]) -> usize {
        match self {
            HidReport::Keyboard(k) => k.serialize(buf),
            HidReport::Mouse(m) => m.serialize(buf),
        }
    }
}

/// Destination for emitted HID reports.
///
/// `send` may wait (e.g. for channel space); the engine awaits every
/// report before emitting the next one, so reports reach the host in
/// order.
#[allow(async_fn_in_trait)]
pub trait ReportSink {
    async fn send(&mut self, report: HidReport);
}

impl<M: RawMutex, const N: usize> ReportSink for Sender<'_, M, HidReport, N> {
    async fn send(&mut self, report: HidReport) {
        Sender::send(self, report).await
    }
}

impl<S: ReportSink + ?Sized> ReportSink for &mut S {
    async fn send(&mut self, report: HidReport) {
        (**self).send(report).await
    }
}
