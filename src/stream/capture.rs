//! Background capture task and its packet stream

use futures::Stream;
use pin_project_lite::pin_project;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, info, warn};

use crate::driver::CaptureDriver;
use crate::session::Session;
use crate::types::Packet;
use crate::{CaptureError, Result};

/// Packets buffered between the capture task and the consumer by default.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Behaviour of a capture task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamOptions {
    /// Stop after this many packets
    pub limit: Option<u64>,
    /// Retry timed-out acquisitions instead of ending the stream
    pub skip_timeouts: bool,
    /// Bounded channel size; a full channel blocks the capture task
    pub channel_capacity: usize,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self { limit: None, skip_timeouts: true, channel_capacity: DEFAULT_CHANNEL_CAPACITY }
    }
}

impl StreamOptions {
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn skip_timeouts(mut self, skip: bool) -> Self {
        self.skip_timeouts = skip;
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }
}

pin_project! {
    /// Packets received by a capture task.
    ///
    /// Yields `Ok` packets until the limit is reached, the task is cancelled, or
    /// an error occurs; an error is yielded once as the last item. Dropping the
    /// stream cancels the task.
    pub struct PacketStream {
        #[pin]
        inner: ReceiverStream<Result<Packet>>,
        _cancel_on_drop: DropGuard,
    }
}

impl Stream for PacketStream {
    type Item = Result<Packet>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.project().inner.poll_next(cx)
    }
}

/// A running capture task.
pub struct CaptureHandle<D: CaptureDriver> {
    packets: PacketStream,
    cancel: CancellationToken,
    task: JoinHandle<Session<D>>,
}

impl<D: CaptureDriver> CaptureHandle<D> {
    /// The packet stream, for polling while keeping the handle.
    pub fn packets(&mut self) -> &mut PacketStream {
        &mut self.packets
    }

    /// Token that stops the task when cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Detach the task and keep only the stream. The session is dropped, closing
    /// its handles, when the task ends.
    pub fn into_stream(self) -> PacketStream {
        self.packets
    }

    /// Stop the task and take the session back.
    ///
    /// Packets still buffered in the channel are discarded. Waits at most one
    /// receive timeout for an acquisition in progress.
    pub async fn stop(self) -> Result<Session<D>> {
        self.cancel.cancel();
        drop(self.packets);
        self.task.await.map_err(|e| CaptureError::CaptureTask { message: e.to_string() })
    }
}

/// Spawn a capture task over `session`.
///
/// The session should have its receive stream open; otherwise the first item is
/// [`CaptureError::NotOpen`]. Must be called from within a tokio runtime.
pub fn spawn_capture<D: CaptureDriver>(
    session: Session<D>,
    options: StreamOptions,
) -> CaptureHandle<D> {
    let (tx, rx) = mpsc::channel(options.channel_capacity.max(1));
    let cancel = CancellationToken::new();

    let task_cancel = cancel.clone();
    let task = tokio::task::spawn_blocking(move || capture_loop(session, options, tx, task_cancel));

    let packets = PacketStream {
        inner: ReceiverStream::new(rx),
        _cancel_on_drop: cancel.clone().drop_guard(),
    };

    CaptureHandle { packets, cancel, task }
}

fn capture_loop<D: CaptureDriver>(
    mut session: Session<D>,
    options: StreamOptions,
    tx: mpsc::Sender<Result<Packet>>,
    cancel: CancellationToken,
) -> Session<D> {
    info!(limit = ?options.limit, "Capture task started");
    let mut delivered = 0u64;

    loop {
        if cancel.is_cancelled() {
            info!(delivered, "Capture task cancelled");
            break;
        }

        if options.limit.is_some_and(|limit| delivered >= limit) {
            info!(delivered, "Capture limit reached");
            break;
        }

        let item = match session.receive_new() {
            Ok(delivery) => {
                delivered += 1;
                Ok(Packet::from(delivery))
            }
            Err(e) if e.is_timeout() && options.skip_timeouts => {
                warn!("Skipping receive timeout: {}", e);
                continue;
            }
            Err(e) => {
                error!(delivered, "Capture task stopped: {}", e);
                let _ = tx.blocking_send(Err(e));
                break;
            }
        };

        if tx.blocking_send(item).is_err() {
            debug!(delivered, "Packet stream dropped, stopping capture");
            break;
        }
    }

    session
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::emulated::{EmulatedDriver, FailPoint, status};
    use crate::test_utils::{TEST_STREAM_ID, frame_sequence, ready_session, session_with_frames};
    use futures::StreamExt;
    use std::time::Duration;

    #[tokio::test]
    async fn limit_ends_stream_and_returns_session() {
        let session = session_with_frames(frame_sequence(5, 64));
        let mut handle = spawn_capture(session, StreamOptions::default().with_limit(3));

        let mut ticks = Vec::new();
        while let Some(item) = handle.packets().next().await {
            ticks.push(item.unwrap().info.ticks);
        }
        assert_eq!(ticks, vec![0, 100_000_000, 200_000_000]);

        let session = handle.stop().await.unwrap();
        assert_eq!(session.driver().queued(TEST_STREAM_ID), 2);
        assert_eq!(session.driver().in_flight(), 0);
    }

    #[tokio::test]
    async fn receive_error_is_last_item() {
        let mut session = session_with_frames(frame_sequence(2, 64));
        session.driver_mut().fail_next(FailPoint::Acquire, status::GENERIC);
        let mut stream = spawn_capture(session, StreamOptions::default()).into_stream();

        let first = stream.next().await.unwrap();
        assert!(matches!(first, Err(CaptureError::Receive { timed_out: false, .. })));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn timeout_ends_stream_when_not_skipped() {
        let session = ready_session(EmulatedDriver::new());
        let mut stream =
            spawn_capture(session, StreamOptions::default().skip_timeouts(false)).into_stream();

        let first = stream.next().await.unwrap();
        assert!(first.unwrap_err().is_timeout());
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn skipped_timeouts_keep_stream_open_until_stop() {
        let session = ready_session(EmulatedDriver::new());
        let mut handle = spawn_capture(session, StreamOptions::default());

        let waited = tokio::time::timeout(Duration::from_millis(20), handle.packets().next()).await;
        assert!(waited.is_err());

        let session = handle.stop().await.unwrap();
        assert!(session.is_open(crate::StreamKind::Receive));
    }

    #[tokio::test]
    async fn release_failure_still_forwards_packet() {
        let mut session = session_with_frames(frame_sequence(1, 64));
        session.driver_mut().fail_next(FailPoint::Release, status::GENERIC);
        let mut stream =
            spawn_capture(session, StreamOptions::default().with_limit(1)).into_stream();

        let packet = stream.next().await.unwrap().unwrap();
        assert_eq!(packet.data.len(), 64);
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn dropping_stream_cancels_task() {
        let handle = spawn_capture(ready_session(EmulatedDriver::new()), StreamOptions::default());
        let token = handle.cancel_token();

        drop(handle.into_stream());
        assert!(token.is_cancelled());
    }
}
