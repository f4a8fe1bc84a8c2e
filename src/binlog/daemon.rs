// ABOUTME: ShipperDaemon - the continuous log-shipping loop
// ABOUTME: Export -> apply -> checkpoint per cycle; the checkpoint advances only on confirmed apply

use anyhow::Result;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::broadcast;

use super::error::ShipError;
use super::exporter::{ExportOutcome, LogRange, Segment};
use super::probe::ConsistencyReading;
use super::state::{Checkpoint, CheckpointStore};

/// Produces the unshipped binlog segment for the current cycle.
#[allow(async_fn_in_trait)]
pub trait RangeExporter {
    async fn export(&self, checkpoint: &Checkpoint) -> Result<ExportOutcome, ShipError>;
}

/// Applies a previously exported segment to the slave, returning the range
/// it covered.
#[allow(async_fn_in_trait)]
pub trait SegmentApplier {
    async fn apply(&self, segment: &Segment) -> Result<LogRange, ShipError>;
}

/// Advisory master/slave cardinality comparison; failures never affect the
/// loop's control decisions.
#[allow(async_fn_in_trait)]
pub trait ConsistencyProbe {
    async fn sample(&self) -> Result<ConsistencyReading>;
}

/// Configuration for the ShipperDaemon.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Delay between shipping cycles
    pub cycle_interval: Duration,
    /// Where the checkpoint record lives
    pub checkpoint_path: PathBuf,
    /// Retain applied artifacts instead of deleting them
    pub keep_artifacts: bool,
    /// Consecutive failed cycles before raising an operator alert
    pub alert_after_failures: u32,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            cycle_interval: Duration::from_secs(1),
            checkpoint_path: PathBuf::from(".binlog-replicator/checkpoint"),
            keep_artifacts: false,
            alert_after_failures: 5,
        }
    }
}

/// What one cycle accomplished.
#[derive(Debug, Clone, Default)]
pub struct CycleStats {
    /// The range shipped and applied this cycle, if the master had advanced
    pub shipped: Option<LogRange>,
    /// Artifact size of the shipped segment
    pub bytes: u64,
    /// Row-count comparison, when the probe succeeded
    pub reading: Option<ConsistencyReading>,
    pub duration_ms: u64,
}

impl CycleStats {
    pub fn was_empty(&self) -> bool {
        self.shipped.is_none()
    }
}

/// ShipperDaemon orchestrates the steady-state replication loop.
///
/// Each cycle runs fully to completion before the next starts:
/// 1. Load the checkpoint
/// 2. Export the unshipped binlog range (empty ranges short-circuit)
/// 3. Apply the segment to the slave
/// 4. Persist the advanced checkpoint, strictly after the apply succeeds
/// 5. Sample the consistency probe
///
/// There is no terminal success state; the loop runs until the shutdown
/// channel fires.
pub struct ShipperDaemon<E, A, P> {
    exporter: E,
    applier: A,
    probe: P,
    store: CheckpointStore,
    config: DaemonConfig,
}

impl<E, A, P> ShipperDaemon<E, A, P>
where
    E: RangeExporter,
    A: SegmentApplier,
    P: ConsistencyProbe,
{
    pub fn new(exporter: E, applier: A, probe: P, config: DaemonConfig) -> Self {
        let store = CheckpointStore::new(config.checkpoint_path.clone());
        Self {
            exporter,
            applier,
            probe,
            store,
            config,
        }
    }

    pub fn checkpoint_store(&self) -> &CheckpointStore {
        &self.store
    }

    /// Run a single shipping cycle.
    ///
    /// On any error the checkpoint is left exactly where it was, so the next
    /// cycle re-attempts the same unapplied range; no range is ever skipped.
    pub async fn run_cycle(&self) -> Result<CycleStats, ShipError> {
        let started = std::time::Instant::now();
        let checkpoint = self.store.load()?;
        let mut stats = CycleStats::default();

        match self.exporter.export(&checkpoint).await? {
            ExportOutcome::UpToDate => {
                tracing::debug!("master position unchanged at {}, nothing to ship", checkpoint);
            }
            ExportOutcome::Shipped(segment) => {
                let applied = self.applier.apply(&segment).await?;

                let next = Checkpoint::new(segment.binlog_file.clone(), applied.end + 1);
                self.store.save(&next)?;
                tracing::info!(
                    "applied binlog range {} ({} bytes), checkpoint advanced to {}",
                    applied,
                    segment.bytes,
                    next
                );

                if !self.config.keep_artifacts {
                    if let Err(e) = std::fs::remove_file(&segment.artifact) {
                        tracing::warn!(
                            "failed to remove applied artifact {:?}: {}",
                            segment.artifact,
                            e
                        );
                    }
                }

                stats.shipped = Some(applied);
                stats.bytes = segment.bytes;
            }
        }

        match self.probe.sample().await {
            Ok(reading) => {
                tracing::info!(
                    "row counts: master={} slave={}{}",
                    reading.master_count,
                    reading.slave_count,
                    if reading.in_sync() { "" } else { " (drift)" }
                );
                stats.reading = Some(reading);
            }
            Err(e) => tracing::warn!("consistency probe failed (ignored): {}", e),
        }

        stats.duration_ms = started.elapsed().as_millis() as u64;
        Ok(stats)
    }

    /// Run the loop until the shutdown channel fires.
    ///
    /// Cancellation is checked at the top of every cycle and raced against
    /// the sleep; an in-flight cycle runs to completion (external tools are
    /// not interruptible mid-operation, and each is bounded by its own
    /// timeout). Transient failures skip the cycle with the checkpoint
    /// untouched; fatal failures abort the run.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
        // A missing or corrupt checkpoint must stop the process before the
        // first cycle; guessing a position risks skipping or replaying log.
        let checkpoint = self.store.load()?;
        tracing::info!("starting replication from checkpoint {}", checkpoint);

        let mut cycles = 0u64;
        let mut consecutive_failures = 0u32;

        loop {
            if shutdown_requested(&mut shutdown) {
                tracing::info!("shutdown signal received, stopping replication loop");
                break;
            }

            cycles += 1;
            match self.run_cycle().await {
                Ok(stats) => {
                    consecutive_failures = 0;
                    match stats.shipped {
                        Some(range) => tracing::info!(
                            "cycle {}: shipped range {} ({} bytes) in {}ms",
                            cycles,
                            range,
                            stats.bytes,
                            stats.duration_ms
                        ),
                        None => tracing::debug!("cycle {}: up to date", cycles),
                    }
                }
                Err(e) if e.is_fatal() => {
                    tracing::error!("cycle {}: fatal error: {}", cycles, e);
                    return Err(e.into());
                }
                Err(e) => {
                    consecutive_failures += 1;
                    tracing::warn!(
                        "cycle {}: {} (checkpoint unchanged, retrying next cycle)",
                        cycles,
                        e
                    );
                    if consecutive_failures >= self.config.alert_after_failures {
                        tracing::error!(
                            "no replication progress for {} consecutive cycles; operator attention required",
                            consecutive_failures
                        );
                    }
                }
            }

            tokio::select! {
                biased;

                _ = shutdown.recv() => {
                    tracing::info!("shutdown signal received, stopping replication loop");
                    break;
                }
                _ = tokio::time::sleep(self.config.cycle_interval) => {}
            }
        }

        Ok(())
    }
}

fn shutdown_requested(shutdown: &mut broadcast::Receiver<()>) -> bool {
    use tokio::sync::broadcast::error::TryRecvError;
    !matches!(shutdown.try_recv(), Err(TryRecvError::Empty))
}
