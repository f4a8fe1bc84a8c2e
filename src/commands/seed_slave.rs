// ABOUTME: One-shot slave bootstrap: capture position, dump master, restore slave
// ABOUTME: Writes the initial checkpoint only after the restore succeeds

use anyhow::{bail, Context, Result};

use crate::binlog::{Checkpoint, CheckpointStore};
use crate::config::Config;
use crate::mysql;
use crate::tools;

pub async fn seed_slave(config: &Config, force: bool) -> Result<()> {
    tools::check_required_tools(&["mysqldump", "mysql"])?;

    let store = CheckpointStore::new(config.replication.checkpoint_path.clone());
    if store.exists() && !force {
        bail!(
            "checkpoint already exists at {:?}; re-seeding would discard replication progress.\n\
             Pass --force to reset the slave from a fresh snapshot.",
            store.path()
        );
    }

    // The start position comes from a live query, not a storage-level
    // snapshot. Writes landing between this query and the dump end up in the
    // dump but ahead of the recorded position.
    tracing::warn!(
        "capturing the start position via a live query; this is only safe on an idle master. \
         Deployments with live traffic must capture the position from a storage-level snapshot."
    );

    let mut conn = mysql::connect(&config.master)
        .await
        .context("failed to connect to master")?;
    let status = mysql::master_status(&mut conn).await?;
    conn.disconnect().await?;
    tracing::info!(
        "master is at binlog position {} {}",
        status.file,
        status.position
    );

    std::fs::create_dir_all(&config.replication.artifact_dir).with_context(|| {
        format!(
            "failed to create artifact directory {:?}",
            config.replication.artifact_dir
        )
    })?;
    let dump_path = config.replication.artifact_dir.join("seed-dump.sql");

    tracing::info!(
        "dumping master database {} to {:?}",
        config.database,
        dump_path
    );
    let output = tools::dump_database(
        &config.master,
        &config.database,
        &dump_path,
        config.replication.tool_timeout(),
    )
    .await?;
    if !output.success() {
        bail!("mysqldump failed: {}", output.failure_detail());
    }

    tracing::info!("restoring dump to slave {}", config.slave.host);
    let output = tools::apply_sql_file(
        &config.slave,
        &dump_path,
        config.replication.tool_timeout(),
    )
    .await?;
    if !output.success() {
        bail!("restore to slave failed: {}", output.failure_detail());
    }

    if force {
        store
            .clear()
            .context("failed to clear the previous checkpoint")?;
    }
    let checkpoint = Checkpoint::new(status.file, status.position);
    store
        .save(&checkpoint)
        .context("restored the dump but failed to persist the initial checkpoint")?;

    println!(
        "Slave seeded from master snapshot. Replication will start from {}",
        checkpoint
    );
    Ok(())
}
