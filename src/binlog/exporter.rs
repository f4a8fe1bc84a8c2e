// ABOUTME: Determines the unshipped binlog range and extracts it into a segment artifact
// ABOUTME: Short-circuits empty ranges and refuses to bridge a binlog rotation

use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::EndpointConfig;
use crate::mysql::{self, MasterStatus};
use crate::tools;

use super::daemon::RangeExporter;
use super::error::ShipError;
use super::state::Checkpoint;

/// Inclusive byte range of binlog offsets shipped in one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogRange {
    pub start: u64,
    pub end: u64,
}

impl LogRange {
    /// Number of binlog offsets covered; a planned range is never empty.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }
}

impl fmt::Display for LogRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// An extracted binlog segment: the artifact on disk plus the exact range
/// it covers. Scoped to one cycle; discarded after a successful apply.
#[derive(Debug, Clone)]
pub struct Segment {
    pub binlog_file: String,
    pub range: LogRange,
    pub artifact: PathBuf,
    /// Size of the produced artifact, taken from the file itself rather
    /// than echoed from the request
    pub bytes: u64,
}

#[derive(Debug)]
pub enum ExportOutcome {
    /// Master position has not advanced past the checkpoint; no tool was invoked
    UpToDate,
    Shipped(Segment),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangePlan {
    UpToDate,
    Ship(LogRange),
}

/// Decide what (if anything) the current cycle should ship.
///
/// A file identifier mismatch means the binlog rotated underneath us; the
/// offsets in the checkpoint are meaningless against the new file, so this
/// is a gap the operator must resolve, never something to paper over.
pub fn plan_range(checkpoint: &Checkpoint, status: &MasterStatus) -> Result<RangePlan, ShipError> {
    if status.file != checkpoint.file {
        return Err(ShipError::PositionGap {
            recorded: checkpoint.to_string(),
            current: format!("{} {}", status.file, status.position),
        });
    }

    if status.position <= checkpoint.position {
        return Ok(RangePlan::UpToDate);
    }

    Ok(RangePlan::Ship(LogRange {
        start: checkpoint.position,
        end: status.position - 1,
    }))
}

/// Production exporter: queries the master's position over a fresh
/// connection, then drives `mysqlbinlog` for the planned range.
pub struct BinlogExporter {
    master: EndpointConfig,
    artifact_dir: PathBuf,
    tool_timeout: Duration,
}

impl BinlogExporter {
    pub fn new(master: EndpointConfig, artifact_dir: PathBuf, tool_timeout: Duration) -> Self {
        Self {
            master,
            artifact_dir,
            tool_timeout,
        }
    }
}

impl RangeExporter for BinlogExporter {
    async fn export(&self, checkpoint: &Checkpoint) -> Result<ExportOutcome, ShipError> {
        let mut conn = mysql::connect(&self.master)
            .await
            .map_err(|e| ShipError::connectivity("master", e))?;
        let status = mysql::master_status(&mut conn)
            .await
            .map_err(|e| ShipError::connectivity("master", e))?;
        let _ = conn.disconnect().await;

        let range = match plan_range(checkpoint, &status)? {
            RangePlan::UpToDate => return Ok(ExportOutcome::UpToDate),
            RangePlan::Ship(range) => range,
        };

        fs::create_dir_all(&self.artifact_dir).map_err(|e| ShipError::ExtractionFailed {
            detail: format!(
                "cannot create artifact directory {:?}: {}",
                self.artifact_dir, e
            ),
        })?;
        let artifact = self.artifact_dir.join(format!("{}.binlog", range));

        let output = tools::extract_binlog(
            &self.master,
            &status.file,
            range,
            &artifact,
            self.tool_timeout,
        )
        .await
        .map_err(|e| ShipError::ExtractionFailed {
            detail: e.to_string(),
        })?;

        if !output.success() {
            return Err(ShipError::extraction(&output));
        }

        // A zero-byte artifact for a non-empty range means the tool silently
        // produced nothing; applying it would advance the checkpoint past
        // data the slave never saw.
        let bytes = fs::metadata(&artifact).map(|m| m.len()).unwrap_or(0);
        if bytes == 0 {
            return Err(ShipError::ExtractionFailed {
                detail: format!("mysqlbinlog produced an empty artifact for range {}", range),
            });
        }

        tracing::debug!(
            "exported binlog range {} ({} bytes) to {:?}",
            range,
            bytes,
            artifact
        );

        Ok(ExportOutcome::Shipped(Segment {
            binlog_file: status.file,
            range,
            artifact,
            bytes,
        }))
    }
}
