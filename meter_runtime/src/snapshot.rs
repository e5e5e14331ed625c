//! Snapshot layer — hashed run captures on disk.
//!
//! A snapshot holds the run's persisted JSON plus the canonical hash of
//! the same run. The canonical form excludes timestamps, so a snapshot
//! hash can be checked against a replay of the step log.
//!
//! If a snapshot fails verification, the caller falls back to full replay.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use meter_engine::hashing::canonical_hash;
use meter_engine::run::RunState;
use meter_engine::ENGINE_VERSION;

use crate::snapshot_codec::{encode_run, restore_run, SnapshotError};

/// Snapshot on-disk format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Snapshot {
    /// Number of steps played when the snapshot was taken.
    pub step: u8,
    /// Persisted JSON of the run.
    pub run_json: String,
    /// Canonical hash of the run (timestamps excluded).
    pub hash: String,
    pub engine_version: u32,
}

impl Snapshot {
    /// Decode and validate the captured run.
    pub fn run(&self) -> Result<RunState, SnapshotError> {
        restore_run(&self.run_json)
    }
}

fn snapshot_path(dir: &Path, step: u8) -> PathBuf {
    dir.join(format!("snapshot_{:02}.json", step))
}

/// Write a snapshot of `run` taken after `step` steps.
pub fn save_snapshot(dir: &Path, step: u8, run: &RunState) -> Result<PathBuf, SnapshotError> {
    fs::create_dir_all(dir)?;

    let snap = Snapshot {
        step,
        run_json: encode_run(run)?,
        hash: canonical_hash(run),
        engine_version: ENGINE_VERSION,
    };
    let content =
        serde_json::to_string(&snap).map_err(|e| SnapshotError::Serialization(e.to_string()))?;

    let path = snapshot_path(dir, step);
    let mut file = File::create(&path)?;
    file.write_all(content.as_bytes())?;
    file.sync_all()?;

    Ok(path)
}

/// Load the snapshot taken after `step` steps, if any.
pub fn load_snapshot(dir: &Path, step: u8) -> Result<Option<Snapshot>, SnapshotError> {
    let path = snapshot_path(dir, step);
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(&path)?;
    let snap = serde_json::from_str(&content)
        .map_err(|e| SnapshotError::Deserialization(format!("bad snapshot: {}", e)))?;
    Ok(Some(snap))
}

/// Load the snapshot with the highest step in `dir`.
pub fn load_latest_snapshot(dir: &Path) -> Result<Option<Snapshot>, SnapshotError> {
    if !dir.exists() {
        return Ok(None);
    }

    let mut best: Option<u8> = None;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let step = name
            .to_string_lossy()
            .strip_prefix("snapshot_")
            .and_then(|s| s.strip_suffix(".json"))
            .and_then(|s| s.parse::<u8>().ok());
        if let Some(step) = step {
            best = Some(best.map_or(step, |b| b.max(step)));
        }
    }

    match best {
        Some(step) => load_snapshot(dir, step),
        None => Ok(None),
    }
}

/// The stored hash matches the stored run, and the engine version matches
/// this build.
pub fn verify_snapshot_hash(snap: &Snapshot) -> bool {
    if snap.engine_version != ENGINE_VERSION {
        return false;
    }
    match snap.run() {
        Ok(run) => {
            canonical_hash(&run) == snap.hash && run.step_history.len() == usize::from(snap.step)
        }
        Err(_) => false,
    }
}
