//! Filter program loader

use tracing::debug;

use super::Session;
use crate::driver::CaptureDriver;
use crate::ntpl::decode_error_block;
use crate::types::{FilterDiagnostics, FilterProgramResult, StreamKind};
use crate::{CaptureError, Result};

impl<D: CaptureDriver> Session<D> {
    /// Submit one NTPL statement on the configuration stream.
    ///
    /// The statement is passed through untouched. On rejection the driver's error
    /// block is decoded into [`CaptureError::FilterSyntax`]; a block that does not
    /// have the expected layout yields [`CaptureError::MalformedResponse`].
    pub fn submit(&mut self, statement: &str) -> Result<FilterProgramResult> {
        let config = self.handle(StreamKind::Config)?;
        let reply = self.driver.submit_filter(config, statement);

        if reply.status.is_success() {
            debug!(statement, ntpl_id = reply.ntpl_id, "NTPL statement applied");
            return Ok(FilterProgramResult::new(reply.ntpl_id));
        }

        let diagnostics = if reply.error_data.is_empty() {
            FilterDiagnostics::default()
        } else {
            decode_error_block(&reply.error_data)?
        };

        debug!(statement, code = diagnostics.code, "NTPL statement rejected");

        Err(CaptureError::FilterSyntax { message: self.explain(reply.status), diagnostics })
    }
}
