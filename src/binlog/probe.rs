// ABOUTME: Advisory row-count comparison between master and slave
// ABOUTME: Observability only; never feeds back into the shipping loop

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use crate::config::EndpointConfig;
use crate::mysql;

use super::daemon::ConsistencyProbe;

/// One coarse cardinality sample from both sides of the pipeline.
#[derive(Debug, Clone)]
pub struct ConsistencyReading {
    pub master_count: u64,
    pub slave_count: u64,
    pub observed_at: DateTime<Utc>,
}

impl ConsistencyReading {
    pub fn in_sync(&self) -> bool {
        self.master_count == self.slave_count
    }

    /// Rows the slave is behind (positive) or ahead (negative, which would
    /// indicate something far stranger than lag).
    pub fn drift(&self) -> i64 {
        self.master_count as i64 - self.slave_count as i64
    }
}

/// Counts rows in the configured table on both instances, each over a fresh
/// connection that is closed before the loop sleeps.
pub struct RowCountProbe {
    master: EndpointConfig,
    slave: EndpointConfig,
    database: String,
    table: String,
}

impl RowCountProbe {
    pub fn new(
        master: EndpointConfig,
        slave: EndpointConfig,
        database: String,
        table: String,
    ) -> Self {
        Self {
            master,
            slave,
            database,
            table,
        }
    }
}

impl ConsistencyProbe for RowCountProbe {
    async fn sample(&self) -> Result<ConsistencyReading> {
        let mut conn = mysql::connect(&self.master)
            .await
            .context("failed to connect to master for probe")?;
        let master_count = mysql::count_rows(&mut conn, &self.database, &self.table).await?;
        let _ = conn.disconnect().await;

        let mut conn = mysql::connect(&self.slave)
            .await
            .context("failed to connect to slave for probe")?;
        let slave_count = mysql::count_rows(&mut conn, &self.database, &self.table).await?;
        let _ = conn.disconnect().await;

        Ok(ConsistencyReading {
            master_count,
            slave_count,
            observed_at: Utc::now(),
        })
    }
}
