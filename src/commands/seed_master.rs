// ABOUTME: Recreates the synthetic test schema on the master
// ABOUTME: Destructive - drops and recreates the configured database

use anyhow::{bail, Context, Result};
use dialoguer::{theme::ColorfulTheme, Confirm};
use mysql_async::prelude::*;

use crate::config::Config;
use crate::mysql::{self, quote_ident};

const INITIAL_BATCHES: usize = 10;
const ROWS_PER_BATCH: usize = 100;

pub async fn seed_master(config: &Config, yes: bool) -> Result<()> {
    if !yes {
        let confirm = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(format!(
                "This drops and recreates database `{}` on {}. Continue?",
                config.database, config.master.host
            ))
            .default(false)
            .interact()?;
        if !confirm {
            bail!("Aborted");
        }
    }

    let db = quote_ident(&config.database);
    let table = quote_ident(&config.replication.probe_table);

    let mut conn = mysql::connect(&config.master)
        .await
        .context("failed to connect to master")?;

    tracing::info!("recreating master database {}", config.database);
    conn.query_drop(format!("DROP DATABASE IF EXISTS {}", db))
        .await?;
    conn.query_drop(format!("CREATE DATABASE {}", db)).await?;
    conn.query_drop(format!(
        "CREATE TABLE {}.{} (
            person_id BIGINT NOT NULL AUTO_INCREMENT,
            PRIMARY KEY (person_id)
        )",
        db, table
    ))
    .await?;

    tracing::info!(
        "generating initial rows in {}.{}",
        config.database,
        config.replication.probe_table
    );
    for _ in 0..INITIAL_BATCHES {
        conn.query_drop(insert_batch_sql(
            &config.database,
            &config.replication.probe_table,
            ROWS_PER_BATCH,
        ))
        .await?;
    }

    let total = mysql::count_rows(
        &mut conn,
        &config.database,
        &config.replication.probe_table,
    )
    .await?;
    conn.disconnect().await?;

    println!(
        "{}.{} seeded with {} rows",
        config.database, config.replication.probe_table, total
    );
    Ok(())
}

/// Multi-row insert of auto-increment-only rows; `()` inserts defaults.
pub(crate) fn insert_batch_sql(database: &str, table: &str, rows: usize) -> String {
    let values = vec!["()"; rows].join(",");
    format!(
        "INSERT INTO {}.{} () VALUES {}",
        quote_ident(database),
        quote_ident(table),
        values
    )
}
