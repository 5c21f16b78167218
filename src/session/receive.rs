//! Packet delivery channel
//!
//! Every receive runs acquire, extract, copy and release within one call. The
//! acquired driver buffer lives inside a [`PacketGuard`] that borrows the driver
//! mutably, so no other session call can run until it is released, and its `Drop`
//! releases it on every early-return path.

use tracing::{trace, warn};

use super::Session;
use crate::driver::{CaptureDriver, RawBuffer, RawHandle};
use crate::types::{CaptureInfo, Delivery, StreamKind};
use crate::{CaptureError, Result};

/// One acquired packet buffer, released exactly once.
///
/// Payload bytes are only reachable through borrows of the guard, so they cannot
/// outlive the release.
pub struct PacketGuard<'a, D: CaptureDriver> {
    driver: &'a mut D,
    receive: RawHandle,
    buffer: RawBuffer,
    released: bool,
}

impl<'a, D: CaptureDriver> PacketGuard<'a, D> {
    pub(crate) fn new(driver: &'a mut D, receive: RawHandle, buffer: RawBuffer) -> Self {
        Self { driver, receive, buffer, released: false }
    }

    /// Raw native timestamp in 10 ns ticks.
    pub fn ticks(&self) -> u64 {
        self.driver.packet_timestamp(self.buffer)
    }

    /// Validated capture metadata of the buffer.
    pub fn info(&self) -> Result<CaptureInfo> {
        CaptureInfo::from_native(
            self.ticks(),
            self.driver.packet_captured_length(self.buffer),
            self.driver.packet_wire_length(self.buffer),
            D::DESCRIPTOR_LEN,
        )
    }

    /// Exactly captured-length payload bytes past the descriptor header.
    ///
    /// The length comes from this buffer's own descriptor, never from the caller.
    pub fn payload(&self) -> Result<&[u8]> {
        let info = self.info()?;
        let bytes = self.driver.packet_payload(self.buffer, info.captured_length);
        if bytes.len() != info.captured_length {
            return Err(CaptureError::malformed(format!(
                "driver exposed {} payload bytes for a {} byte capture",
                bytes.len(),
                info.captured_length
            )));
        }
        Ok(bytes)
    }

    /// Hand the buffer back to the receive stream.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        self.driver
            .release_packet(self.receive, self.buffer)
            .map_err(|status| CaptureError::release_failed(self.driver.explain(status)))
    }
}

impl<D: CaptureDriver> Drop for PacketGuard<'_, D> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(status) = self.driver.release_packet(self.receive, self.buffer) {
            let reason = self.driver.explain(status);
            warn!(buffer = self.buffer.0, "Packet release failed: {}", reason);
        }
    }
}

impl<D: CaptureDriver> Session<D> {
    /// Acquire the next packet buffer, waiting up to the receive timeout.
    ///
    /// Fails with [`CaptureError::Receive`] when the wait times out or the driver
    /// reports an error; nothing is held in that case.
    pub fn acquire(&mut self) -> Result<PacketGuard<'_, D>> {
        let receive = self.handle(StreamKind::Receive)?;
        match self.driver.acquire_packet(receive, self.receive_timeout) {
            Ok(buffer) => Ok(PacketGuard::new(&mut self.driver, receive, buffer)),
            Err(status) => {
                let timed_out = self.driver.is_timeout(status);
                Err(CaptureError::receive_failed(self.explain(status), timed_out))
            }
        }
    }

    /// Receive one packet into a freshly allocated buffer of exactly
    /// captured-length bytes.
    ///
    /// A failed release is carried in [`Delivery::release_error`] next to the data.
    pub fn receive_new(&mut self) -> Result<Delivery<Vec<u8>>> {
        self.receive_inner(|_, bytes| Ok(bytes.to_vec()))
    }

    /// Receive one packet into `dest`, returning the number of bytes copied.
    ///
    /// `dest` must hold at least captured-length bytes. A shorter buffer yields
    /// [`CaptureError::BufferTooSmall`]; the packet is released and `dest` is left
    /// untouched.
    pub fn receive_into(&mut self, dest: &mut [u8]) -> Result<Delivery<usize>> {
        let capacity = dest.len();
        self.receive_inner(|_, bytes| {
            let target = dest
                .get_mut(..bytes.len())
                .ok_or(CaptureError::BufferTooSmall { needed: bytes.len(), capacity })?;
            target.copy_from_slice(bytes);
            Ok(bytes.len())
        })
    }

    /// Receive one packet and hand its payload to `inspect` without copying.
    ///
    /// The slice borrows the driver buffer and is gone before the release.
    pub fn receive_with<R, F>(&mut self, inspect: F) -> Result<Delivery<R>>
    where
        F: FnOnce(&CaptureInfo, &[u8]) -> R,
    {
        self.receive_inner(|info, bytes| Ok(inspect(info, bytes)))
    }

    fn receive_inner<T, F>(&mut self, sink: F) -> Result<Delivery<T>>
    where
        F: FnOnce(&CaptureInfo, &[u8]) -> Result<T>,
    {
        let guard = self.acquire()?;

        let info = guard.info()?;
        let payload = sink(&info, guard.payload()?)?;

        trace!(
            ticks = info.ticks,
            captured = info.captured_length,
            wire = info.wire_length,
            "Packet received"
        );

        let release_error = guard.release().err();
        if let Some(err) = &release_error {
            warn!("{}", err);
        }

        Ok(Delivery { info, payload, release_error })
    }
}
