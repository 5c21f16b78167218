//! Packet delivery results

use std::sync::Arc;

use super::CaptureInfo;
use crate::{CaptureError, Result};

/// Result of one receive call.
///
/// The metadata and payload are valid even when `release_error` is set: a failed
/// release is reported alongside the data, never instead of it.
#[derive(Debug)]
pub struct Delivery<T> {
    /// Metadata extracted from the packet descriptor
    pub info: CaptureInfo,
    /// Payload bytes, or the number of bytes copied for caller-owned buffers
    pub payload: T,
    /// Set when handing the buffer back to the driver failed
    pub release_error: Option<CaptureError>,
}

impl<T> Delivery<T> {
    /// Whether the packet buffer was released without error.
    pub fn is_clean(&self) -> bool {
        self.release_error.is_none()
    }

    /// Drop the release warning, failing instead when there was one.
    pub fn into_result(self) -> Result<(CaptureInfo, T)> {
        match self.release_error {
            Some(err) => Err(err),
            None => Ok((self.info, self.payload)),
        }
    }
}

/// An owned packet, as forwarded by the capture stream.
#[derive(Debug, Clone)]
pub struct Packet {
    /// Capture metadata
    pub info: CaptureInfo,
    /// Payload bytes (zero-copy sharing via Arc)
    pub data: Arc<[u8]>,
}

impl Packet {
    pub fn new(info: CaptureInfo, data: Vec<u8>) -> Self {
        Self { info, data: data.into() }
    }
}

impl From<Delivery<Vec<u8>>> for Packet {
    fn from(delivery: Delivery<Vec<u8>>) -> Self {
        Packet::new(delivery.info, delivery.payload)
    }
}
