// ABOUTME: Applies an exported binlog segment to the slave via the mysql client

use std::time::Duration;

use crate::config::EndpointConfig;
use crate::tools;

use super::daemon::SegmentApplier;
use super::error::ShipError;
use super::exporter::{LogRange, Segment};

/// Feeds segment artifacts to the slave. The apply is only as idempotent as
/// the statements in the segment; re-applying a range after a crash between
/// apply and checkpoint save is an accepted, documented risk (GTID
/// enforcement on both instances is the deployment precondition that makes
/// replay harmless).
pub struct BinlogApplier {
    slave: EndpointConfig,
    tool_timeout: Duration,
}

impl BinlogApplier {
    pub fn new(slave: EndpointConfig, tool_timeout: Duration) -> Self {
        Self {
            slave,
            tool_timeout,
        }
    }
}

impl SegmentApplier for BinlogApplier {
    async fn apply(&self, segment: &Segment) -> Result<LogRange, ShipError> {
        let output = tools::apply_sql_file(&self.slave, &segment.artifact, self.tool_timeout)
            .await
            .map_err(|e| ShipError::ApplyFailed {
                detail: e.to_string(),
            })?;

        if !output.success() {
            return Err(ShipError::apply(&output));
        }

        tracing::debug!(
            "applied segment {:?} (range {}) to slave",
            segment.artifact,
            segment.range
        );
        Ok(segment.range)
    }
}
