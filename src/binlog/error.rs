// ABOUTME: Error taxonomy for the shipping loop
// ABOUTME: Splits fatal (operator intervention) from transient (retry next cycle)

use std::path::PathBuf;
use thiserror::Error;

use crate::tools::ToolOutput;

/// Everything that can go wrong in a shipping cycle.
///
/// The loop keys its skip-vs-abort decision off `is_fatal`: transient
/// failures leave the checkpoint untouched and are retried on the next
/// cycle; fatal failures require operator intervention and stop the run.
#[derive(Debug, Error)]
pub enum ShipError {
    #[error("no checkpoint at {path:?}; run `seed-slave` to bootstrap the slave first")]
    CheckpointMissing { path: PathBuf },

    #[error("checkpoint at {path:?} is unreadable or malformed ({reason}); refusing to guess a position")]
    CheckpointCorrupt { path: PathBuf, reason: String },

    #[error("failed to persist checkpoint to {path:?}: {reason}")]
    CheckpointWrite { path: PathBuf, reason: String },

    #[error("binlog rotated: checkpoint tracks `{recorded}` but master reports `{current}`; resync the slave with `seed-slave --force`")]
    PositionGap { recorded: String, current: String },

    #[error("binlog extraction failed: {detail}")]
    ExtractionFailed { detail: String },

    #[error("segment apply failed: {detail}")]
    ApplyFailed { detail: String },

    #[error("cannot reach {role}: {detail}")]
    Connectivity { role: &'static str, detail: String },
}

impl ShipError {
    pub fn extraction(output: &ToolOutput) -> Self {
        Self::ExtractionFailed {
            detail: output.failure_detail(),
        }
    }

    pub fn apply(output: &ToolOutput) -> Self {
        Self::ApplyFailed {
            detail: output.failure_detail(),
        }
    }

    pub fn connectivity(role: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Connectivity {
            role,
            detail: err.to_string(),
        }
    }

    /// Fatal errors abort the run; everything else skips the cycle and
    /// retries the same unapplied range after the sleep.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::CheckpointMissing { .. }
                | Self::CheckpointCorrupt { .. }
                | Self::PositionGap { .. }
        )
    }
}
