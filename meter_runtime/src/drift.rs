//! Drift detection — determinism verification and run comparison.

use meter_engine::config::MeterConfig;
use meter_engine::domain::Delta;
use meter_engine::run::{RunState, StepInput};
use meter_engine::tier::Tier;
use meter_engine::EngineError;

use crate::replay;

/// Replay the same inputs twice and assert identical hashes.
/// Panics on mismatch; engine errors are returned.
pub fn verify_determinism(
    seed: i64,
    config: &MeterConfig,
    inputs: &[StepInput],
) -> Result<String, EngineError> {
    let (_, hash1) = replay::rebuild_run(seed, config, inputs)?;
    let (_, hash2) = replay::rebuild_run(seed, config, inputs)?;

    if hash1 != hash2 {
        panic!(
            "DETERMINISM FAILURE: two replays produced different hashes.\n\
             Run 1: {}\n\
             Run 2: {}",
            hash1, hash2
        );
    }
    Ok(hash1)
}

/// Structured comparison of two runs, `b` relative to `a`.
pub fn compare_runs(a: &RunState, b: &RunState) -> DriftReport {
    let display_a = a.meter_state.display_value;
    let display_b = b.meter_state.display_value;

    let first_divergent_step = a
        .step_history
        .iter()
        .zip(&b.step_history)
        .find(|(ra, rb)| ra != rb)
        .map(|(ra, _)| ra.step_id)
        .or_else(|| {
            // One history is a strict prefix of the other.
            let shared = a.step_history.len().min(b.step_history.len());
            (a.step_history.len() != b.step_history.len()).then(|| shared as u8 + 1)
        });

    let display_deltas = a
        .step_history
        .iter()
        .zip(&b.step_history)
        .map(|(ra, rb)| rb.display_after - ra.display_after)
        .collect();

    DriftReport {
        display_a,
        display_b,
        display_delta: display_b - display_a,
        tier_a: a.meter_state.tier,
        tier_b: b.meter_state.tier,
        tier_changed: a.meter_state.tier != b.meter_state.tier,
        hidden_delta: b.meter_state.hidden_state - a.meter_state.hidden_state,
        display_deltas,
        first_divergent_step,
        rng_diverged: a.rng_state != b.rng_state,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DriftReport {
    pub display_a: f64,
    pub display_b: f64,
    pub display_delta: f64,
    pub tier_a: Tier,
    pub tier_b: Tier,
    pub tier_changed: bool,
    /// Hidden state of `b` minus hidden state of `a`, per dimension.
    pub hidden_delta: Delta,
    /// Per-step `display_after` differences over the shared history.
    pub display_deltas: Vec<f64>,
    /// First step whose record differs, if any.
    pub first_divergent_step: Option<u8>,
    pub rng_diverged: bool,
}

impl DriftReport {
    pub fn is_identical(&self) -> bool {
        self.first_divergent_step.is_none()
            && !self.rng_diverged
            && self.hidden_delta == Delta::ZERO
    }
}
