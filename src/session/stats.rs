//! Statistics reader

use tracing::{debug, trace};

use super::Session;
use crate::driver::{CaptureDriver, StatMode};
use crate::types::{PortCounterSnapshot, PortCounters, StreamKind};
use crate::{CaptureError, Result};

impl<D: CaptureDriver> Session<D> {
    /// Poll the counters of one port without clearing them.
    ///
    /// `port` is checked against the number of port blocks the driver returned.
    pub fn read_port(&mut self, port: usize) -> Result<PortCounterSnapshot> {
        let blocks = self.query_stats(StatMode::Poll)?;
        let available = blocks.len();
        let counters = blocks
            .into_iter()
            .nth(port)
            .ok_or(CaptureError::PortOutOfRange { port, available })?;

        trace!(port, pkts = counters.pkts, octets = counters.octets, "Port counters read");
        Ok(PortCounterSnapshot::new(port, counters))
    }

    /// Poll the counters of every port in one query.
    pub fn read_all_ports(&mut self) -> Result<Vec<PortCounterSnapshot>> {
        let blocks = self.query_stats(StatMode::Poll)?;
        trace!(ports = blocks.len(), "All port counters read");
        Ok(blocks
            .into_iter()
            .enumerate()
            .map(|(port, counters)| PortCounterSnapshot::new(port, counters))
            .collect())
    }

    /// Reset the driver's accumulators. Whatever the clearing query returns is
    /// discarded.
    pub fn clear(&mut self) -> Result<()> {
        self.query_stats(StatMode::Clear)?;
        debug!("Port counters cleared");
        Ok(())
    }

    fn query_stats(&mut self, mode: StatMode) -> Result<Vec<PortCounters>> {
        let stats = self.handle(StreamKind::Stats)?;
        self.driver
            .read_stats(stats, mode)
            .map_err(|status| CaptureError::StatsRead { message: self.explain(status) })
    }
}
