//! Lifecycle of one file through a run.

use std::fmt;

use crate::error::{Error, Result};

/// Stages move strictly forward: `Discovered → Classified → Parsed →
/// Measured → Aggregated`. `Skipped` and `Failed` end the lifecycle from any
/// non-terminal stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileState {
    Discovered,
    Classified,
    Parsed,
    Measured,
    Aggregated,
    Skipped,
    Failed,
}

impl FileState {
    fn stage(&self) -> Option<u8> {
        match self {
            FileState::Discovered => Some(0),
            FileState::Classified => Some(1),
            FileState::Parsed => Some(2),
            FileState::Measured => Some(3),
            FileState::Aggregated => Some(4),
            FileState::Skipped | FileState::Failed => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            FileState::Aggregated | FileState::Skipped | FileState::Failed
        )
    }

    pub fn can_advance(&self, next: FileState) -> bool {
        if self.is_terminal() {
            return false;
        }
        match (self.stage(), next.stage()) {
            (Some(from), Some(to)) => to > from,
            // Skipped or Failed
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    pub fn advance(&mut self, next: FileState) -> Result<()> {
        if !self.can_advance(next) {
            return Err(Error::Internal(format!(
                "illegal file state transition {} -> {}",
                self, next
            )));
        }
        *self = next;
        Ok(())
    }
}

impl fmt::Display for FileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FileState::Discovered => "discovered",
            FileState::Classified => "classified",
            FileState::Parsed => "parsed",
            FileState::Measured => "measured",
            FileState::Aggregated => "aggregated",
            FileState::Skipped => "skipped",
            FileState::Failed => "failed",
        };
        f.write_str(name)
    }
}
