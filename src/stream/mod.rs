//! Async packet capture streams
//!
//! [`spawn_capture`] moves a ready [`Session`](crate::Session) onto a blocking
//! tokio task that receives packets in a loop and forwards them through a bounded
//! channel, exposed as a [`PacketStream`].

mod capture;

pub use capture::{
    CaptureHandle, DEFAULT_CHANNEL_CAPACITY, PacketStream, StreamOptions, spawn_capture,
};
