//! NTPL submission results

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of a successfully applied NTPL statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterProgramResult {
    /// Identifier assigned by the driver; zero for statements that assign nothing
    pub ntpl_id: u32,
}

impl FilterProgramResult {
    pub fn new(ntpl_id: u32) -> Self {
        Self { ntpl_id }
    }

    /// The assigned identifier, if the statement assigned one.
    pub fn id(&self) -> Option<u32> {
        (self.ntpl_id != 0).then_some(self.ntpl_id)
    }
}

/// Parser diagnostics returned by the driver when it rejects a statement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterDiagnostics {
    /// The three diagnostic lines, in driver order
    pub lines: [String; 3],
    /// Parser error code
    pub code: i32,
}

impl fmt::Display for FilterDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for line in self.lines.iter().filter(|l| !l.is_empty()) {
            if !first {
                f.write_str("\n")?;
            }
            f.write_str(line)?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_id_means_nothing_assigned() {
        assert_eq!(FilterProgramResult::new(0).id(), None);
        assert_eq!(FilterProgramResult::new(12).id(), Some(12));
    }

    #[test]
    fn diagnostics_display_skips_empty_lines() {
        let diagnostics = FilterDiagnostics {
            lines: ["bad token".into(), String::new(), "see docs".into()],
            code: 42,
        };
        assert_eq!(diagnostics.to_string(), "bad token\nsee docs");
    }
}
