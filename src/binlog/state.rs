// ABOUTME: Durable replication checkpoint: binlog file plus next offset to ship
// ABOUTME: Single-record textual persistence, written atomically via temp file + rename

use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::error::ShipError;

/// The one piece of durable replication state: which binlog file the slave
/// is being fed from, and the next offset to ship. The position equals
/// `end + 1` of the last successfully applied range, so consecutive cycles
/// produce contiguous, non-overlapping ranges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    pub file: String,
    pub position: u64,
}

impl Checkpoint {
    pub fn new(file: impl Into<String>, position: u64) -> Self {
        Self {
            file: file.into(),
            position,
        }
    }

    fn parse(record: &str) -> Result<Self, String> {
        let mut parts = record.split_whitespace();
        let (file, position) = match (parts.next(), parts.next(), parts.next()) {
            (Some(file), Some(position), None) => (file, position),
            _ => {
                return Err(format!(
                    "expected `<binlog-file> <position>`, got {:?}",
                    record.trim()
                ))
            }
        };
        let position = position
            .parse()
            .map_err(|_| format!("position {:?} is not an unsigned integer", position))?;
        Ok(Self {
            file: file.to_string(),
            position,
        })
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.file, self.position)
    }
}

/// File-backed checkpoint persistence.
///
/// `save` never truncates in place: the record is written to a temp file in
/// the same directory and renamed over the target, so a crash mid-write can
/// never leave a torn checkpoint behind.
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the persisted checkpoint, distinguishing "never seeded" from
    /// "present but unreadable"; the latter must stop a run rather than be
    /// guessed around.
    pub fn load(&self) -> Result<Checkpoint, ShipError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ShipError::CheckpointMissing {
                    path: self.path.clone(),
                })
            }
            Err(e) => {
                return Err(ShipError::CheckpointCorrupt {
                    path: self.path.clone(),
                    reason: e.to_string(),
                })
            }
        };

        Checkpoint::parse(&contents).map_err(|reason| ShipError::CheckpointCorrupt {
            path: self.path.clone(),
            reason,
        })
    }

    /// Durably persist a checkpoint. Within one binlog file the position may
    /// only move forward; callers invoke this strictly after the applier has
    /// confirmed success.
    pub fn save(&self, checkpoint: &Checkpoint) -> Result<(), ShipError> {
        if let Ok(current) = self.load() {
            if current.file == checkpoint.file && checkpoint.position < current.position {
                return Err(ShipError::CheckpointWrite {
                    path: self.path.clone(),
                    reason: format!(
                        "refusing to move position backwards within {} ({} -> {})",
                        current.file, current.position, checkpoint.position
                    ),
                });
            }
        }

        let write_err = |e: &dyn fmt::Display| ShipError::CheckpointWrite {
            path: self.path.clone(),
            reason: e.to_string(),
        };

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(|e| write_err(&e))?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| write_err(&e))?;
        writeln!(tmp, "{}", checkpoint).map_err(|e| write_err(&e))?;
        tmp.as_file().sync_all().map_err(|e| write_err(&e))?;
        tmp.persist(&self.path).map_err(|e| write_err(&e))?;
        Ok(())
    }

    /// Remove the checkpoint record, e.g. before a forced re-seed.
    pub fn clear(&self) -> Result<(), ShipError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ShipError::CheckpointWrite {
                path: self.path.clone(),
                reason: e.to_string(),
            }),
        }
    }
}
