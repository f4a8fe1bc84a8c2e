// ABOUTME: Assembles the production daemon and runs the shipping loop
// ABOUTME: --once runs a single cycle; otherwise runs until Ctrl+C

use anyhow::Result;
use std::time::Duration;

use crate::binlog::{
    BinlogApplier, BinlogExporter, DaemonConfig, RowCountProbe, ShipperDaemon,
};
use crate::config::Config;
use crate::tools;

pub async fn start_replication(
    config: &Config,
    once: bool,
    interval_override: Option<u64>,
) -> Result<()> {
    tools::check_required_tools(&["mysqlbinlog", "mysql"])?;

    let repl = &config.replication;
    let daemon_config = DaemonConfig {
        cycle_interval: interval_override
            .map(Duration::from_secs)
            .unwrap_or_else(|| repl.cycle_interval()),
        checkpoint_path: repl.checkpoint_path.clone(),
        keep_artifacts: repl.keep_artifacts,
        alert_after_failures: repl.alert_after_failures,
    };

    let exporter = BinlogExporter::new(
        config.master.clone(),
        repl.artifact_dir.clone(),
        repl.tool_timeout(),
    );
    let applier = BinlogApplier::new(config.slave.clone(), repl.tool_timeout());
    let probe = RowCountProbe::new(
        config.master.clone(),
        config.slave.clone(),
        config.database.clone(),
        repl.probe_table.clone(),
    );

    let daemon = ShipperDaemon::new(exporter, applier, probe, daemon_config);

    if once {
        let stats = daemon.run_cycle().await?;
        match stats.shipped {
            Some(range) => println!(
                "Shipped binlog range {} ({} bytes) in {}ms",
                range, stats.bytes, stats.duration_ms
            ),
            None => println!("Slave is up to date with the master position"),
        }
        if let Some(reading) = stats.reading {
            println!(
                "Row counts: master={} slave={}",
                reading.master_count, reading.slave_count
            );
        }
        return Ok(());
    }

    tracing::info!("starting continuous replication (Ctrl+C to stop)");

    let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel::<()>(1);
    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to listen for Ctrl+C");
        tracing::info!("Received shutdown signal");
        let _ = shutdown_tx.send(());
    });

    daemon.run(shutdown_rx).await
}
