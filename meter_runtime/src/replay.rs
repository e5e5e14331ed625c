//! Replay orchestrator — rebuild a run from its inputs.
//!
//! Delegates all scoring to the engine. No cached state.

use meter_engine::config::MeterConfig;
use meter_engine::engine::RunEngine;
use meter_engine::hashing::canonical_hash;
use meter_engine::run::{RunState, StepInput};
use meter_engine::EngineError;

/// Rebuild a run from its seed and step inputs.
///
/// 1. Create a fresh engine seeded with `seed`
/// 2. Apply each input in order
/// 3. Return (final run, canonical hash)
pub fn rebuild_run(
    seed: i64,
    config: &MeterConfig,
    inputs: &[StepInput],
) -> Result<(RunState, String), EngineError> {
    let mut engine = RunEngine::new(seed, config.clone());
    engine.apply_sequence(inputs)?;
    let run = engine.into_run();
    let hash = canonical_hash(&run);
    Ok((run, hash))
}

/// Rebuild a run and return only its canonical hash.
pub fn rebuild_hash(
    seed: i64,
    config: &MeterConfig,
    inputs: &[StepInput],
) -> Result<String, EngineError> {
    rebuild_run(seed, config, inputs).map(|(_, hash)| hash)
}
