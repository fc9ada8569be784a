//! Serial control link over CDC-ACM.
//!
//! The host tool talks to the device one line at a time: it sends a
//! request line and reads back one JSON reply line (see
//! [`hidreplay::control`]). While a `pos` / `capture` / `tap-here` request
//! is being served the roles flip: the device writes a peer query line
//! (`{"peer":"pos"}` or `{"peer":"capture","delay":3}`) and waits for the
//! host helper to answer `{"x":..,"y":..}` on the same port.

use defmt::{debug, info, warn};
use embassy_sync::blocking_mutex::raw::{CriticalSectionRawMutex, NoopRawMutex};
use embassy_sync::mutex::Mutex;
use embassy_time::{with_timeout, Duration};
use embassy_usb::class::cdc_acm::{CdcAcmClass, Receiver, Sender};
use embassy_usb::driver::EndpointError;
use heapless::Vec;
use serde::Serialize;
use static_cell::StaticCell;

use hidreplay::config::{
    CONTROL_LINE_CAPACITY, CONTROL_RESPONSE_CAPACITY, PEER_CAPTURE_TIMEOUT_MS,
    PEER_POS_TIMEOUT_MS, USB_CDC_PACKET_SIZE,
};
use hidreplay::control::wire::{self, ErrorReply, PeerReply};
use hidreplay::engine::{Engine, Point};
use hidreplay::{Control, Error, PeerPosition};

use super::UsbDriver;
use crate::storage::FlashStorage;

const PACKET_SIZE: usize = USB_CDC_PACKET_SIZE as usize;

/// Longest accepted peer answer.
const PEER_LINE_CAPACITY: usize = 128;

static LINE_BUF: StaticCell<Vec<u8, CONTROL_LINE_CAPACITY>> = StaticCell::new();
static REPLY_BUF: StaticCell<[u8; CONTROL_RESPONSE_CAPACITY]> = StaticCell::new();

/// Why a line could not be read.
#[derive(Clone, Copy, Debug, PartialEq, Eq, defmt::Format)]
enum LineError {
    /// The line was longer than the buffer; the rest of it was discarded.
    Overflow,
    /// The host closed the port or the cable was pulled.
    Disconnected,
}

impl From<EndpointError> for LineError {
    fn from(_: EndpointError) -> Self {
        LineError::Disconnected
    }
}

/// Both halves of the CDC-ACM port plus the unread tail of the last
/// packet.
pub struct SerialLink<'d> {
    tx: Sender<'d, UsbDriver>,
    rx: Receiver<'d, UsbDriver>,
    packet: [u8; PACKET_SIZE],
    pos: usize,
    len: usize,
}

impl<'d> SerialLink<'d> {
    pub fn new(class: CdcAcmClass<'d, UsbDriver>) -> Self {
        let (tx, rx) = class.split();
        Self {
            tx,
            rx,
            packet: [0; PACKET_SIZE],
            pos: 0,
            len: 0,
        }
    }

    async fn wait_connection(&mut self) {
        self.rx.wait_connection().await;
        self.pos = 0;
        self.len = 0;
    }

    /// Read bytes up to the next `\n` into `line`, dropping `\r`.
    async fn read_line<const N: usize>(&mut self, line: &mut Vec<u8, N>) -> Result<(), LineError> {
        line.clear();
        let mut overflow = false;
        loop {
            if self.pos == self.len {
                self.len = self.rx.read_packet(&mut self.packet).await?;
                self.pos = 0;
                continue;
            }
            let byte = self.packet[self.pos];
            self.pos += 1;
            match byte {
                b'\n' if overflow => return Err(LineError::Overflow),
                b'\n' => return Ok(()),
                b'\r' => {}
                _ => overflow |= line.push(byte).is_err(),
            }
        }
    }

    /// Write `data` followed by a newline, split into packets.
    async fn write_line(&mut self, data: &[u8]) -> Result<(), LineError> {
        let mut chunk = [0u8; PACKET_SIZE];
        let mut filled = 0;
        for &byte in data.iter().chain(b"\n") {
            chunk[filled] = byte;
            filled += 1;
            if filled == PACKET_SIZE {
                self.tx.write_packet(&chunk).await?;
                filled = 0;
            }
        }
        // A short (possibly empty) packet ends the transfer.
        self.tx.write_packet(&chunk[..filled]).await?;
        Ok(())
    }
}

#[derive(Serialize)]
struct PeerQuery {
    peer: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    delay: Option<u8>,
}

/// Asks the host helper for the pointer position over the control link.
pub struct CdcPeer<'a, 'd> {
    link: &'a Mutex<NoopRawMutex, SerialLink<'d>>,
}

impl CdcPeer<'_, '_> {
    async fn query(&mut self, capture_delay_s: Option<u8>) -> Result<Point, Error> {
        let query = PeerQuery {
            peer: if capture_delay_s.is_some() { "capture" } else { "pos" },
            delay: capture_delay_s,
        };
        let mut out = [0u8; PEER_LINE_CAPACITY];
        let n = wire::to_slice(&query, &mut out)?;

        let mut link = self.link.lock().await;
        link.write_line(&out[..n])
            .await
            .map_err(|_| Error::UnreachablePeer)?;

        let mut answer: Vec<u8, PEER_LINE_CAPACITY> = Vec::new();
        link.read_line(&mut answer)
            .await
            .map_err(|_| Error::UnreachablePeer)?;
        let answer = core::str::from_utf8(&answer).map_err(|_| Error::UnreachablePeer)?;
        let reply: PeerReply = wire::from_str(answer).map_err(|_| Error::UnreachablePeer)?;
        reply.position()
    }
}

impl PeerPosition for CdcPeer<'_, '_> {
    async fn position(&mut self, capture_delay_s: Option<u8>) -> Result<Point, Error> {
        let timeout = match capture_delay_s {
            Some(_) => PEER_CAPTURE_TIMEOUT_MS,
            None => PEER_POS_TIMEOUT_MS,
        };
        match with_timeout(Duration::from_millis(timeout), self.query(capture_delay_s)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Peer did not answer within {} ms", timeout);
                Err(Error::Timeout)
            }
        }
    }
}

/// Serve control requests forever.
///
/// Must be called once; it takes the static line and reply buffers.
pub async fn serve(
    class: CdcAcmClass<'static, UsbDriver>,
    engine: &'static Engine<CriticalSectionRawMutex>,
    storage: FlashStorage,
) -> ! {
    let line = LINE_BUF.init(Vec::new());
    let reply = REPLY_BUF.init([0u8; CONTROL_RESPONSE_CAPACITY]);
    let link = Mutex::<NoopRawMutex, _>::new(SerialLink::new(class));
    let mut control = Control::new(engine, storage, CdcPeer { link: &link });

    loop {
        link.lock().await.wait_connection().await;
        info!("Control link connected");

        loop {
            let read = link.lock().await.read_line(line).await;
            let n = match read {
                Ok(()) => match core::str::from_utf8(line) {
                    Ok(request) if request.trim().is_empty() => continue,
                    Ok(request) if wire::is_peer_reply(request) => {
                        debug!("Dropping late peer answer");
                        continue;
                    }
                    Ok(request) => control.handle_line(request, reply).await,
                    Err(_) => error_reply(Error::MalformedInput, reply),
                },
                Err(LineError::Overflow) => {
                    warn!("Control line longer than {} bytes", CONTROL_LINE_CAPACITY);
                    error_reply(Error::BufferOverflow, reply)
                }
                Err(LineError::Disconnected) => break,
            };

            debug!("Control reply: {} bytes", n);
            if link.lock().await.write_line(&reply[..n]).await.is_err() {
                break;
            }
        }

        info!("Control link disconnected");
    }
}

fn error_reply(error: Error, out: &mut [u8]) -> usize {
    wire::to_slice(&ErrorReply { error: error.code() }, out).unwrap_or(0)
}
