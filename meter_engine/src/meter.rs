//! Meter engine — turns an applied delta into the next meter state.
//!
//! Pipeline per step:
//!   accumulate → diminishing returns → weighted sum → sigmoid
//!   → noise → streak → momentum → clamp & round → tier
//!
//! Rubber-band is cross-step: the engine only exposes the predicate and
//! the bump; the caller applies the bump to the next step's delta.

use tracing::trace;

use crate::config::MeterConfig;
use crate::domain::{Choice, Delta, HiddenState, MeterState, MeterUpdate, UnluckOptions};
use crate::error::EngineError;
use crate::rng::SeededRng;
use crate::tier::Tier;
use crate::unluck::apply_unluck;

/// Logistic curve centred on `mu` with scale `sigma`, in `(0, 1)`.
pub fn sigmoid(x: f64, mu: f64, sigma: f64) -> f64 {
    1.0 / (1.0 + (-(x - mu) / sigma).exp())
}

/// `sign(v) * |v|^power`.
pub fn diminish(v: f64, power: f64) -> f64 {
    if v == 0.0 {
        0.0
    } else {
        v.signum() * v.abs().powf(power)
    }
}

/// Hidden state as seen by scoring. Diminishing returns act on the
/// running total each step, never on the stored accumulator.
pub fn effective_state(hidden: &HiddenState, config: &MeterConfig) -> Delta {
    let dr = &config.diminishing_returns;
    if dr.enabled {
        hidden.map(|v| diminish(v, dr.power))
    } else {
        *hidden
    }
}

/// Sigmoid-normalized score of a hidden state, before noise and momentum.
pub fn base_score(hidden: &HiddenState, config: &MeterConfig) -> f64 {
    let weighted = config.weights.weighted_sum(&effective_state(hidden, config));
    100.0 * sigmoid(weighted, config.sigmoid.mu, config.sigmoid.sigma)
}

/// Clamp to `[0, 100]` and round to one decimal.
pub fn clamp_display(score: f64) -> f64 {
    (score.clamp(0.0, 100.0) * 10.0).round() / 10.0
}

/// Initial meter state for a new run.
pub fn create_initial_meter_state() -> MeterState {
    MeterState::initial()
}

/// Apply `delta` to `state` and score the result.
///
/// Consumes one PRNG draw when noise is enabled, none otherwise.
pub fn update_meter_state(
    state: &MeterState,
    delta: &Delta,
    rng: &mut SeededRng,
    config: &MeterConfig,
) -> Result<MeterState, EngineError> {
    let hidden_state = state.hidden_state + *delta;
    let mut score = base_score(&hidden_state, config);

    if config.randomness.enabled {
        let [lo, hi] = config.randomness.bounds;
        score += rng.next_float(lo, hi)?;
    }

    // Streak compares the pre-momentum, pre-clamp score.
    let streak = if score > state.display_value {
        state.streak + 1
    } else {
        0
    };

    let momentum = &config.momentum;
    if momentum.enabled && streak >= momentum.streak_threshold {
        score += momentum.bonus;
    }

    let display_value = clamp_display(score);
    trace!(
        target: "meter.update",
        raw_score = score,
        display_value,
        streak,
        "meter scored"
    );

    Ok(MeterState {
        hidden_state,
        display_value,
        tier: Tier::classify(display_value),
        last_delta: Some(*delta),
        streak,
    })
}

/// Run the unluck layers on `delta`, then feed the result to
/// [`update_meter_state`]. Unluck draws always precede the noise draw.
pub fn update_meter_state_with_unluck(
    state: &MeterState,
    delta: &Delta,
    step_id: u8,
    choice: Choice,
    rng: &mut SeededRng,
    config: &MeterConfig,
    options: &UnluckOptions,
) -> Result<MeterUpdate, EngineError> {
    let outcome = apply_unluck(delta, step_id, choice, rng, config, options)?;
    let meter_state = update_meter_state(state, &outcome.delta, rng, config)?;
    Ok(MeterUpdate {
        meter_state,
        unluck_result: outcome.result,
    })
}

/// Whether the next step's delta should receive the rubber-band bump.
pub fn should_apply_rubber_band(state: &MeterState, config: &MeterConfig) -> bool {
    config.rubber_band.enabled && state.display_value < config.rubber_band.threshold
}

/// `delta` with the rubber-band bump added to its System dimension.
pub fn apply_rubber_band_bump(delta: &Delta, config: &MeterConfig) -> Delta {
    Delta {
        s: delta.s + config.rubber_band.bump,
        ..*delta
    }
}
