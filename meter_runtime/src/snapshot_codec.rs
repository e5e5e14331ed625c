//! Snapshot codec — deterministic RunState encoder/decoder.
//!
//! Pure codec layer plus file helpers.
//!
//! - `encode_run`:  RunState → JSON string (persisted camelCase shape)
//! - `decode_run`:  JSON string → RunState (strict, unknown fields rejected)
//! - `restore_run`: decode + invariant validation
//! - `export_run_to_file` / `import_run_from_file`: file I/O
//! - `run_hash`:    SHA-256 of the encoded JSON (lowercase hex)

use std::fs;
use std::io;
use std::path::Path;

use sha2::{Digest, Sha256};
use thiserror::Error;

use meter_engine::invariants::try_validate_run_state;
use meter_engine::run::RunState;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("SerializationError: {0}")]
    Serialization(String),
    /// Malformed JSON, missing fields or unknown fields.
    #[error("DeserializationError: {0}")]
    Deserialization(String),
    /// Decoded state breaks a run invariant.
    #[error("InvariantViolation: {0}")]
    InvariantViolation(String),
    #[error("IoError: {0}")]
    Io(#[from] io::Error),
}

// ---------------------------------------------------------------------------
// Encode / decode
// ---------------------------------------------------------------------------

/// Encode a run to compact JSON. Identical runs encode byte-identically.
pub fn encode_run(run: &RunState) -> Result<String, SnapshotError> {
    serde_json::to_string(run).map_err(|e| SnapshotError::Serialization(e.to_string()))
}

/// Decode without validation. Use [`restore_run`] for untrusted input.
pub fn decode_run(json: &str) -> Result<RunState, SnapshotError> {
    serde_json::from_str::<RunState>(json)
        .map_err(|e| SnapshotError::Deserialization(e.to_string()))
}

/// Decode and validate run invariants.
pub fn restore_run(json: &str) -> Result<RunState, SnapshotError> {
    let run = decode_run(json)?;
    try_validate_run_state(&run).map_err(SnapshotError::InvariantViolation)?;
    Ok(run)
}

// ---------------------------------------------------------------------------
// File I/O
// ---------------------------------------------------------------------------

pub fn export_run_to_file(run: &RunState, path: &Path) -> Result<(), SnapshotError> {
    let json = encode_run(run)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, json.as_bytes())?;
    Ok(())
}

/// Read, decode and validate a run file.
pub fn import_run_from_file(path: &Path) -> Result<RunState, SnapshotError> {
    let content = fs::read_to_string(path)?;
    restore_run(&content)
}

// ---------------------------------------------------------------------------
// Hash
// ---------------------------------------------------------------------------

/// SHA-256 of the encoded JSON, for file integrity.
///
/// Differs from `meter_engine::hashing::canonical_hash`, which excludes
/// timestamps and identifies the simulation outcome instead.
pub fn run_hash(run: &RunState) -> Result<String, SnapshotError> {
    let json = encode_run(run)?;
    Ok(sha256_hex(json.as_bytes()))
}

pub(crate) fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}
