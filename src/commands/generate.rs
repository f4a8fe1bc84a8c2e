// ABOUTME: Inserts synthetic write traffic into the master table
// ABOUTME: Fresh connection per batch, mirroring steady application load

use anyhow::{Context, Result};
use mysql_async::prelude::*;

use crate::config::Config;
use crate::mysql;

use super::seed_master::insert_batch_sql;

pub async fn generate(config: &Config, batches: u64, rows_per_batch: u64) -> Result<()> {
    tracing::info!(
        "generating data in master database {} ({} batches of {} rows)",
        config.database,
        batches,
        rows_per_batch
    );

    for batch in 1..=batches {
        let mut conn = mysql::connect(&config.master)
            .await
            .context("failed to connect to master")?;
        conn.query_drop(insert_batch_sql(
            &config.database,
            &config.replication.probe_table,
            rows_per_batch as usize,
        ))
        .await?;
        let total = mysql::count_rows(
            &mut conn,
            &config.database,
            &config.replication.probe_table,
        )
        .await?;
        conn.disconnect().await?;

        tracing::info!(
            "batch {}/{}: inserted {} rows into {}.{}, total {} rows",
            batch,
            batches,
            rows_per_batch,
            config.database,
            config.replication.probe_table,
            total
        );
    }

    Ok(())
}
