//! Peer position service contract.
//!
//! A helper program on the host reports where the pointer currently is, so
//! new steps can be recorded by pointing at the target. It is only used
//! while building a macro; the runner never consults it.

use crate::engine::Point;
use crate::error::Error;

#[allow(async_fn_in_trait)]
pub trait PeerPosition {
    /// The pointer position now, or after `capture_delay_s` seconds when
    /// given. Fails with `UnreachablePeer` or `Timeout`.
    async fn position(&mut self, capture_delay_s: Option<u8>) -> Result<Point, Error>;
}

impl<P: PeerPosition + ?Sized> PeerPosition for &mut P {
    async fn position(&mut self, capture_delay_s: Option<u8>) -> Result<Point, Error> {
        (**self).position(capture_delay_s).await
    }
}
