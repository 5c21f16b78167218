//! Capture session: handle lifecycle, NTPL submission, packet delivery and statistics
//!
//! A [`Session`] owns one driver and at most one open handle of each
//! [`StreamKind`]. Stream-specific operations check their handle locally and fail
//! with [`CaptureError::NotOpen`] before reaching the driver.
//!
//! ```text
//! Uninitialized --init--> Initialized --open_config-->  config open  --close_config-->  closed
//!                                     --open_stats--->  stats open   --close_stats--->  closed
//!                                     --open_receive->  receive open --close_receive->  closed
//! ```
//!
//! Every method takes `&mut self`, so calls on one session are serialised by
//! ownership: the transient packet buffer and statistics result are never shared
//! between concurrent calls. Dropping the session closes every open handle and
//! shuts the driver down.

mod filter;
mod receive;
mod stats;

pub use receive::PacketGuard;

use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::{CaptureConfig, DEFAULT_RECEIVE_TIMEOUT_MS};
use crate::driver::{CaptureDriver, DriverResult, RawHandle, Status};
use crate::types::{FilterProgramResult, StreamKind};
use crate::{CaptureError, Result};

/// One capture session over a driver.
pub struct Session<D: CaptureDriver> {
    driver: D,
    initialized: bool,
    config: Option<RawHandle>,
    stats: Option<RawHandle>,
    receive: Option<RawHandle>,
    receive_timeout: Duration,
}

impl<D: CaptureDriver> Session<D> {
    /// Wrap a driver. Nothing is called on it until [`init`](Self::init).
    pub fn new(driver: D) -> Self {
        Self {
            driver,
            initialized: false,
            config: None,
            stats: None,
            receive: None,
            receive_timeout: Duration::from_millis(DEFAULT_RECEIVE_TIMEOUT_MS),
        }
    }

    /// Set the bounded wait used when acquiring a packet.
    pub fn with_receive_timeout(mut self, timeout: Duration) -> Self {
        self.receive_timeout = timeout;
        self
    }

    /// Bring a session up to a ready-to-receive state.
    ///
    /// Initialises the driver, opens the configuration stream, submits the
    /// configured NTPL program, then opens the receive stream on the configured
    /// stream id (and the statistics stream when `open_stats` is set). The first
    /// failure is returned; handles opened so far are closed when the partially
    /// built session drops.
    pub fn bootstrap(
        driver: D,
        config: &CaptureConfig,
    ) -> Result<(Self, Vec<FilterProgramResult>)> {
        config.validate()?;

        let mut session = Session::new(driver).with_receive_timeout(config.receive_timeout());
        session.init()?;
        session.open_config(&config.config_stream)?;

        let program = config.program();
        let mut results = Vec::with_capacity(program.len());
        for statement in &program {
            results.push(session.submit(statement)?);
        }

        session.open_receive(&config.receive_stream, config.stream_id)?;
        if config.open_stats {
            session.open_stats(&config.stats_stream)?;
        }

        info!(
            stream_id = config.stream_id,
            statements = results.len(),
            "Capture session ready"
        );

        Ok((session, results))
    }

    /// Start the driver runtime. Must precede every open.
    pub fn init(&mut self) -> Result<()> {
        self.driver.init().map_err(|status| CaptureError::driver_init(self.explain(status)))?;
        self.initialized = true;
        info!("Capture driver initialised");
        Ok(())
    }

    pub fn open_config(&mut self, name: &str) -> Result<()> {
        self.open_with(StreamKind::Config, "open_config", |driver| driver.open_config(name))
    }

    /// Close the configuration stream.
    ///
    /// The handle counts as closed afterwards even when the driver reports failure.
    pub fn close_config(&mut self) -> Result<()> {
        self.close_with(StreamKind::Config, |driver, handle| driver.close_config(handle))
    }

    pub fn open_stats(&mut self, name: &str) -> Result<()> {
        self.open_with(StreamKind::Stats, "open_stats", |driver| driver.open_stats(name))
    }

    pub fn close_stats(&mut self) -> Result<()> {
        self.close_with(StreamKind::Stats, |driver, handle| driver.close_stats(handle))
    }

    /// Open the receive stream bound to `stream_id`.
    ///
    /// The stream id must have been assigned by a submitted NTPL statement; the
    /// driver reports it otherwise.
    pub fn open_receive(&mut self, name: &str, stream_id: u32) -> Result<()> {
        self.open_with(StreamKind::Receive, "open_receive", |driver| {
            driver.open_receive(name, stream_id)
        })?;
        debug!(stream_id, "Receive stream bound");
        Ok(())
    }

    pub fn close_receive(&mut self) -> Result<()> {
        self.close_with(StreamKind::Receive, |driver, handle| driver.close_receive(handle))
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Whether a handle of `kind` is currently open.
    pub fn is_open(&self, kind: StreamKind) -> bool {
        self.slot(kind).is_some()
    }

    pub fn receive_timeout(&self) -> Duration {
        self.receive_timeout
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Direct access to the driver, e.g. to feed an emulated one.
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    fn slot(&self, kind: StreamKind) -> &Option<RawHandle> {
        match kind {
            StreamKind::Config => &self.config,
            StreamKind::Stats => &self.stats,
            StreamKind::Receive => &self.receive,
        }
    }

    fn slot_mut(&mut self, kind: StreamKind) -> &mut Option<RawHandle> {
        match kind {
            StreamKind::Config => &mut self.config,
            StreamKind::Stats => &mut self.stats,
            StreamKind::Receive => &mut self.receive,
        }
    }

    /// Open handle of `kind`, or `NotOpen`.
    fn handle(&self, kind: StreamKind) -> Result<RawHandle> {
        self.slot(kind).ok_or(CaptureError::NotOpen { stream: kind })
    }

    fn explain(&self, status: Status) -> String {
        self.driver.explain(status)
    }

    fn open_with<F>(&mut self, kind: StreamKind, operation: &'static str, open: F) -> Result<()>
    where
        F: FnOnce(&mut D) -> DriverResult<RawHandle>,
    {
        if !self.initialized {
            return Err(CaptureError::NotInitialized { operation });
        }

        let handle = open(&mut self.driver)
            .map_err(|status| CaptureError::open_failed(kind, self.explain(status)))?;

        if let Some(previous) = self.slot_mut(kind).replace(handle) {
            warn!(stream = %kind, ?previous, "Driver reopened a stream that was still open");
        }

        info!(stream = %kind, "Stream opened");
        Ok(())
    }

    fn close_with<F>(&mut self, kind: StreamKind, close: F) -> Result<()>
    where
        F: FnOnce(&mut D, RawHandle) -> DriverResult<()>,
    {
        let handle = self.slot_mut(kind).take().ok_or(CaptureError::NotOpen { stream: kind })?;

        close(&mut self.driver, handle)
            .map_err(|status| CaptureError::close_failed(kind, self.explain(status)))?;

        info!(stream = %kind, "Stream closed");
        Ok(())
    }
}

impl<D: CaptureDriver> Drop for Session<D> {
    fn drop(&mut self) {
        for kind in StreamKind::ALL {
            let Some(handle) = self.slot_mut(kind).take() else {
                continue;
            };
            let closed = match kind {
                StreamKind::Config => self.driver.close_config(handle),
                StreamKind::Stats => self.driver.close_stats(handle),
                StreamKind::Receive => self.driver.close_receive(handle),
            };
            if let Err(status) = closed {
                warn!(stream = %kind, "Close on drop failed: {}", self.driver.explain(status));
            }
        }

        if self.initialized {
            self.driver.done();
            debug!("Capture driver shut down");
        }
    }
}
