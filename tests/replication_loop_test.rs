// Scenario tests for the shipping loop, driven through stub exporter/applier
// implementations against a real file-backed checkpoint store.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tempfile::{tempdir, TempDir};
use tokio::sync::broadcast;

use binlog_replicator::binlog::{
    plan_range, Checkpoint, CheckpointStore, ConsistencyProbe, ConsistencyReading, DaemonConfig,
    ExportOutcome, LogRange, RangeExporter, RangePlan, Segment, SegmentApplier, ShipError,
    ShipperDaemon,
};
use binlog_replicator::mysql::MasterStatus;

const BINLOG_FILE: &str = "mysql-bin-changelog.000002";

#[derive(Clone, Default)]
struct Counters {
    extract_calls: Arc<AtomicU32>,
    apply_calls: Arc<AtomicU32>,
    applied: Arc<Mutex<Vec<LogRange>>>,
}

/// Stub master + extraction tool: each export pops the next scripted master
/// position, plans the range exactly like the production exporter, and
/// fabricates an artifact file for non-empty ranges.
struct ScriptedExporter {
    binlog_file: String,
    positions: Mutex<VecDeque<u64>>,
    artifact_dir: PathBuf,
    counters: Counters,
    fail_extraction: bool,
    shutdown_when_drained: Option<broadcast::Sender<()>>,
}

impl ScriptedExporter {
    fn new(positions: &[u64], artifact_dir: PathBuf, counters: Counters) -> Self {
        Self {
            binlog_file: BINLOG_FILE.to_string(),
            positions: Mutex::new(positions.iter().copied().collect()),
            artifact_dir,
            counters,
            fail_extraction: false,
            shutdown_when_drained: None,
        }
    }
}

impl RangeExporter for ScriptedExporter {
    async fn export(&self, checkpoint: &Checkpoint) -> Result<ExportOutcome, ShipError> {
        let position = {
            let mut positions = self.positions.lock().unwrap();
            let position = positions.pop_front().expect("position script exhausted");
            if positions.is_empty() {
                if let Some(tx) = &self.shutdown_when_drained {
                    let _ = tx.send(());
                }
            }
            position
        };

        let status = MasterStatus {
            file: self.binlog_file.clone(),
            position,
        };
        let range = match plan_range(checkpoint, &status)? {
            RangePlan::UpToDate => return Ok(ExportOutcome::UpToDate),
            RangePlan::Ship(range) => range,
        };

        self.counters.extract_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_extraction {
            return Err(ShipError::ExtractionFailed {
                detail: "stubbed extraction failure".to_string(),
            });
        }

        let artifact = self.artifact_dir.join(format!("{}.binlog", range));
        std::fs::write(&artifact, b"-- stub binlog events --").unwrap();
        Ok(ExportOutcome::Shipped(Segment {
            binlog_file: status.file,
            range,
            artifact,
            bytes: 24,
        }))
    }
}

struct CountingApplier {
    counters: Counters,
    /// 1-based call number that fails; every other call succeeds
    fail_on: Option<u32>,
}

impl SegmentApplier for CountingApplier {
    async fn apply(&self, segment: &Segment) -> Result<LogRange, ShipError> {
        let call = self.counters.apply_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on == Some(call) {
            return Err(ShipError::ApplyFailed {
                detail: "stubbed apply failure".to_string(),
            });
        }
        self.counters.applied.lock().unwrap().push(segment.range);
        Ok(segment.range)
    }
}

/// Probe stub; `None` fails every sample, which the loop must ignore.
struct StubProbe {
    counts: Option<(u64, u64)>,
}

impl ConsistencyProbe for StubProbe {
    async fn sample(&self) -> anyhow::Result<ConsistencyReading> {
        match self.counts {
            Some((master_count, slave_count)) => Ok(ConsistencyReading {
                master_count,
                slave_count,
                observed_at: chrono::Utc::now(),
            }),
            None => anyhow::bail!("probe disabled"),
        }
    }
}

struct Harness {
    dir: TempDir,
    counters: Counters,
}

impl Harness {
    fn new() -> Self {
        Self {
            dir: tempdir().unwrap(),
            counters: Counters::default(),
        }
    }

    fn daemon_config(&self) -> DaemonConfig {
        DaemonConfig {
            cycle_interval: Duration::from_millis(10),
            checkpoint_path: self.dir.path().join("checkpoint"),
            keep_artifacts: false,
            alert_after_failures: 3,
        }
    }

    fn store(&self) -> CheckpointStore {
        CheckpointStore::new(self.dir.path().join("checkpoint"))
    }

    fn seed_checkpoint(&self, position: u64) {
        self.store()
            .save(&Checkpoint::new(BINLOG_FILE, position))
            .unwrap();
    }

    fn exporter(&self, positions: &[u64]) -> ScriptedExporter {
        ScriptedExporter::new(
            positions,
            self.dir.path().to_path_buf(),
            self.counters.clone(),
        )
    }

    fn applier(&self) -> CountingApplier {
        CountingApplier {
            counters: self.counters.clone(),
            fail_on: None,
        }
    }
}

#[tokio::test]
async fn scenario_a_ships_range_and_advances_checkpoint() {
    let harness = Harness::new();
    harness.seed_checkpoint(100);

    let daemon = ShipperDaemon::new(
        harness.exporter(&[250]),
        harness.applier(),
        StubProbe {
            counts: Some((1000, 1000)),
        },
        harness.daemon_config(),
    );

    let stats = daemon.run_cycle().await.unwrap();
    assert_eq!(stats.shipped, Some(LogRange { start: 100, end: 249 }));
    assert!(!stats.was_empty());

    let checkpoint = harness.store().load().unwrap();
    assert_eq!(checkpoint, Checkpoint::new(BINLOG_FILE, 250));

    assert_eq!(harness.counters.extract_calls.load(Ordering::SeqCst), 1);
    assert_eq!(harness.counters.apply_calls.load(Ordering::SeqCst), 1);

    let reading = stats.reading.expect("probe reading");
    assert!(reading.in_sync());
}

#[tokio::test]
async fn scenario_b_extraction_failure_leaves_checkpoint_untouched() {
    let harness = Harness::new();
    harness.seed_checkpoint(100);

    let mut exporter = harness.exporter(&[250]);
    exporter.fail_extraction = true;
    let daemon = ShipperDaemon::new(
        exporter,
        harness.applier(),
        StubProbe { counts: None },
        harness.daemon_config(),
    );

    let err = daemon.run_cycle().await.unwrap_err();
    assert!(matches!(err, ShipError::ExtractionFailed { .. }));
    assert!(!err.is_fatal());

    assert_eq!(harness.store().load().unwrap().position, 100);
    assert_eq!(harness.counters.apply_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn scenario_c_apply_failure_prevents_false_advancement() {
    let harness = Harness::new();
    harness.seed_checkpoint(100);

    let applier = CountingApplier {
        counters: harness.counters.clone(),
        fail_on: Some(1),
    };
    let daemon = ShipperDaemon::new(
        harness.exporter(&[250]),
        applier,
        StubProbe { counts: None },
        harness.daemon_config(),
    );

    let err = daemon.run_cycle().await.unwrap_err();
    assert!(matches!(err, ShipError::ApplyFailed { .. }));
    assert!(!err.is_fatal());

    // Extraction succeeded, but the checkpoint must not move
    assert_eq!(harness.counters.extract_calls.load(Ordering::SeqCst), 1);
    assert_eq!(harness.store().load().unwrap().position, 100);
}

#[tokio::test]
async fn scenario_d_idle_master_invokes_no_tools() {
    let harness = Harness::new();
    harness.seed_checkpoint(100);

    let daemon = ShipperDaemon::new(
        harness.exporter(&[100, 100]),
        harness.applier(),
        StubProbe { counts: None },
        harness.daemon_config(),
    );

    for _ in 0..2 {
        let stats = daemon.run_cycle().await.unwrap();
        assert!(stats.was_empty());
    }

    assert_eq!(harness.counters.extract_calls.load(Ordering::SeqCst), 0);
    assert_eq!(harness.counters.apply_calls.load(Ordering::SeqCst), 0);
    assert_eq!(harness.store().load().unwrap().position, 100);
}

#[tokio::test]
async fn applied_ranges_stay_contiguous_across_failures() {
    let harness = Harness::new();
    harness.seed_checkpoint(100);

    // Second apply fails; the failed range must be re-attempted, not skipped
    let applier = CountingApplier {
        counters: harness.counters.clone(),
        fail_on: Some(2),
    };
    let daemon = ShipperDaemon::new(
        harness.exporter(&[250, 400, 400, 520]),
        applier,
        StubProbe { counts: None },
        harness.daemon_config(),
    );

    assert!(daemon.run_cycle().await.is_ok()); // ships [100, 249]
    assert!(daemon.run_cycle().await.is_err()); // [250, 399] apply fails
    assert_eq!(harness.store().load().unwrap().position, 250);
    assert!(daemon.run_cycle().await.is_ok()); // retries [250, 399]
    assert!(daemon.run_cycle().await.is_ok()); // ships [400, 519]

    let applied = harness.counters.applied.lock().unwrap().clone();
    assert_eq!(
        applied,
        vec![
            LogRange { start: 100, end: 249 },
            LogRange { start: 250, end: 399 },
            LogRange { start: 400, end: 519 },
        ]
    );
    for window in applied.windows(2) {
        assert_eq!(window[1].start, window[0].end + 1);
    }
    // Checkpoint advanced exactly once per successful apply
    assert_eq!(harness.store().load().unwrap().position, 520);
}

#[tokio::test]
async fn binlog_rotation_is_fatal() {
    let harness = Harness::new();
    harness
        .store()
        .save(&Checkpoint::new("mysql-bin-changelog.000001", 100))
        .unwrap();

    let daemon = ShipperDaemon::new(
        harness.exporter(&[500]),
        harness.applier(),
        StubProbe { counts: None },
        harness.daemon_config(),
    );

    let err = daemon.run_cycle().await.unwrap_err();
    assert!(matches!(err, ShipError::PositionGap { .. }));
    assert!(err.is_fatal());
    assert_eq!(harness.store().load().unwrap().position, 100);
}

#[tokio::test]
async fn missing_checkpoint_refuses_to_run() {
    let harness = Harness::new();

    let daemon = ShipperDaemon::new(
        harness.exporter(&[]),
        harness.applier(),
        StubProbe { counts: None },
        harness.daemon_config(),
    );

    let err = daemon.run_cycle().await.unwrap_err();
    assert!(matches!(err, ShipError::CheckpointMissing { .. }));
    assert!(err.is_fatal());
}

#[tokio::test]
async fn corrupt_checkpoint_aborts_startup() {
    let harness = Harness::new();
    std::fs::write(harness.dir.path().join("checkpoint"), "not a checkpoint at all").unwrap();

    let daemon = ShipperDaemon::new(
        harness.exporter(&[]),
        harness.applier(),
        StubProbe { counts: None },
        harness.daemon_config(),
    );

    let (_tx, rx) = broadcast::channel::<()>(1);
    let err = daemon.run(rx).await.unwrap_err();
    let ship_err = err.downcast_ref::<ShipError>().expect("ShipError");
    assert!(matches!(ship_err, ShipError::CheckpointCorrupt { .. }));
    assert_eq!(harness.counters.extract_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn shutdown_before_first_cycle_runs_nothing() {
    let harness = Harness::new();
    harness.seed_checkpoint(100);

    let daemon = ShipperDaemon::new(
        harness.exporter(&[]),
        harness.applier(),
        StubProbe { counts: None },
        harness.daemon_config(),
    );

    let (tx, rx) = broadcast::channel::<()>(1);
    tx.send(()).unwrap();
    daemon.run(rx).await.unwrap();

    assert_eq!(harness.counters.extract_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn run_ships_until_shutdown() {
    let harness = Harness::new();
    harness.seed_checkpoint(100);

    let (tx, rx) = broadcast::channel::<()>(1);
    let mut exporter = harness.exporter(&[250, 400]);
    exporter.shutdown_when_drained = Some(tx);

    let daemon = ShipperDaemon::new(
        exporter,
        harness.applier(),
        StubProbe {
            counts: Some((2000, 2000)),
        },
        harness.daemon_config(),
    );

    daemon.run(rx).await.unwrap();

    assert_eq!(harness.counters.apply_calls.load(Ordering::SeqCst), 2);
    assert_eq!(harness.store().load().unwrap().position, 400);
}

#[tokio::test]
async fn applied_artifacts_are_removed_unless_retained() {
    let harness = Harness::new();
    harness.seed_checkpoint(100);

    let daemon = ShipperDaemon::new(
        harness.exporter(&[250]),
        harness.applier(),
        StubProbe { counts: None },
        harness.daemon_config(),
    );
    daemon.run_cycle().await.unwrap();
    assert!(!harness.dir.path().join("100-249.binlog").exists());

    // With keep_artifacts the segment file survives the apply
    let retaining = Harness::new();
    retaining.seed_checkpoint(100);
    let mut config = retaining.daemon_config();
    config.keep_artifacts = true;
    let daemon = ShipperDaemon::new(
        retaining.exporter(&[250]),
        retaining.applier(),
        StubProbe { counts: None },
        config,
    );
    daemon.run_cycle().await.unwrap();
    assert!(retaining.dir.path().join("100-249.binlog").exists());
}
