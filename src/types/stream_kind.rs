//! Stream handle classes

use serde::{Deserialize, Serialize};
use std::fmt;

/// The three handle classes a session can hold open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    /// Configuration stream, used for NTPL submission
    Config,
    /// Statistics stream, used for port counter queries
    Stats,
    /// Packet receive stream bound to a stream id
    Receive,
}

impl StreamKind {
    /// All stream kinds, in the order a session closes them.
    pub const ALL: [StreamKind; 3] = [StreamKind::Receive, StreamKind::Stats, StreamKind::Config];

    /// Lowercase name used in log fields and messages.
    pub fn as_str(self) -> &'static str {
        match self {
            StreamKind::Config => "config",
            StreamKind::Stats => "stats",
            StreamKind::Receive => "receive",
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
