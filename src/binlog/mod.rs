// ABOUTME: Binlog shipping core - checkpoint, exporter, applier, probe, loop
// ABOUTME: The daemon orchestrates; the other modules each own one concern

pub mod applier;
pub mod daemon;
pub mod error;
pub mod exporter;
pub mod probe;
pub mod state;

pub use applier::BinlogApplier;
pub use daemon::{
    ConsistencyProbe, CycleStats, DaemonConfig, RangeExporter, SegmentApplier, ShipperDaemon,
};
pub use error::ShipError;
pub use exporter::{plan_range, BinlogExporter, ExportOutcome, LogRange, RangePlan, Segment};
pub use probe::{ConsistencyReading, RowCountProbe};
pub use state::{Checkpoint, CheckpointStore};
