//! Unluck engine — regular unluck and the Perfect Storm.
//!
//! PRNG draw order for one step (a forced roll or an explicit luck
//! factor consumes no draw):
//!
//!   1. `next()`        regular unluck roll
//!   2. `next_float()`  luck factor           (only if unluck triggered)
//!   3. `next_int()`    unluck message index  (only if unluck triggered)
//!   4. `next()`        Perfect Storm roll    (only if eligible)
//!   5. `next_int()`    storm message index   (only if the storm triggered)
//!
//! This order is part of the replay contract.

use tracing::debug;

use crate::config::{MeterConfig, SpecialUnluckConfig, Weights};
use crate::domain::{Choice, Delta, UnluckOptions, UnluckResult};
use crate::error::EngineError;
use crate::messages::{unluck_messages, PERFECT_STORM_MESSAGES};
use crate::rng::SeededRng;

/// A delta after both unluck layers, plus what happened to it.
#[derive(Debug, Clone, PartialEq)]
pub struct UnluckOutcome {
    pub delta: Delta,
    pub result: UnluckResult,
}

/// Run both unluck layers over `delta` for one step.
pub fn apply_unluck(
    delta: &Delta,
    step_id: u8,
    choice: Choice,
    rng: &mut SeededRng,
    config: &MeterConfig,
    options: &UnluckOptions,
) -> Result<UnluckOutcome, EngineError> {
    let unluck = &config.unluck;
    if !roll(rng, unluck.enabled, unluck.probability, options.force_unluck) {
        return Ok(UnluckOutcome {
            delta: *delta,
            result: UnluckResult::none(),
        });
    }

    let luck_factor = match options.unluck_factor_override {
        Some(factor) => factor,
        None => rng.next_float(unluck.factor_range[0], unluck.factor_range[1])?,
    };
    let mut message = pick_message(rng, unluck_messages(step_id, choice))?;
    let mut adjusted = apply_unluck_scaling(delta, luck_factor, &config.weights);

    debug!(
        target: "meter.unluck",
        step_id,
        choice = %choice,
        luck_factor,
        "unluck triggered"
    );

    let special = &config.special_unluck;
    let mut perfect_storm = false;
    if is_perfect_storm_eligible(step_id, choice, special)
        && roll(rng, special.enabled, special.probability, options.force_perfect_storm)
    {
        adjusted = apply_perfect_storm_penalties(&adjusted, special);
        message = pick_message(rng, PERFECT_STORM_MESSAGES)?;
        perfect_storm = true;
        debug!(target: "meter.unluck", step_id, choice = %choice, "perfect storm triggered");
    }

    Ok(UnluckOutcome {
        delta: adjusted,
        result: UnluckResult {
            unluck_applied: true,
            luck_factor,
            message: Some(message.to_string()),
            perfect_storm,
        },
    })
}

/// Probability-gated roll. A forced roll triggers without drawing; a
/// disabled layer still consumes its draw so the stream stays aligned.
fn roll(rng: &mut SeededRng, enabled: bool, probability: f64, forced: bool) -> bool {
    if forced {
        return true;
    }
    let draw = rng.next();
    enabled && draw < probability
}

fn pick_message(
    rng: &mut SeededRng,
    bank: &'static [&'static str],
) -> Result<&'static str, EngineError> {
    let index = rng.next_int(0, bank.len() as i64 - 1)?;
    Ok(bank[index as usize])
}

/// Weighted impact of a delta: the same dot product the meter scores with.
pub fn weighted_impact(delta: &Delta, weights: &Weights) -> f64 {
    weights.weighted_sum(delta)
}

/// Make a delta worse by `luck_factor`.
///
/// Net-positive (or neutral) deltas lose part of their gains: positive
/// components are multiplied by `luck_factor`. Net-negative deltas have
/// their losses amplified: negative components are multiplied by
/// `2 - luck_factor`. The other sign is left alone either way.
pub fn apply_unluck_scaling(delta: &Delta, luck_factor: f64, weights: &Weights) -> Delta {
    let net_positive = weighted_impact(delta, weights) >= 0.0;
    let multiplier = if net_positive { luck_factor } else { 2.0 - luck_factor };
    delta.map(|v| {
        let targeted = if net_positive { v > 0.0 } else { v < 0.0 };
        if targeted {
            v * multiplier
        } else {
            v
        }
    })
}

/// Perfect Storm fires only on the configured step and choice.
/// The caller is responsible for also requiring regular unluck.
pub fn is_perfect_storm_eligible(
    step_id: u8,
    choice: Choice,
    special: &SpecialUnluckConfig,
) -> bool {
    step_id == special.step && choice == special.choice
}

/// Symmetric per-dimension Perfect Storm penalty.
///
/// For reduction factor `f`, positive values become `v * (1 - f)` and
/// negative values become `v * (1 + f)`. Revenue and System share the
/// scaling-gains factor.
pub fn apply_perfect_storm_penalties(delta: &Delta, special: &SpecialUnluckConfig) -> Delta {
    Delta {
        r: penalize(delta.r, special.scaling_gains_reduction),
        u: penalize(delta.u, special.users_reduction),
        s: penalize(delta.s, special.scaling_gains_reduction),
        c: penalize(delta.c, special.customers_reduction),
        i: penalize(delta.i, special.investors_reduction),
    }
}

fn penalize(v: f64, reduction: f64) -> f64 {
    if v > 0.0 {
        v * (1.0 - reduction)
    } else if v < 0.0 {
        v * (1.0 + reduction)
    } else {
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn forced() -> UnluckOptions {
        UnluckOptions {
            force_unluck: true,
            force_perfect_storm: true,
            unluck_factor_override: Some(0.5),
        }
    }

    #[test]
    fn perfect_storm_penalties_match_reference_values() {
        let special = MeterConfig::default().special_unluck;
        let out = apply_perfect_storm_penalties(&Delta::new(10.0, 5.0, 8.0, 3.0, 2.0), &special);
        assert!((out.r - 5.0).abs() < EPS);
        assert!((out.s - 4.0).abs() < EPS);
        assert!((out.u - 2.5).abs() < EPS);
        assert!((out.c - 0.9).abs() < EPS);
        assert!((out.i - 1.2).abs() < EPS);
    }

    #[test]
    fn perfect_storm_amplifies_losses() {
        let special = MeterConfig::default().special_unluck;
        let out = apply_perfect_storm_penalties(&Delta::new(-4.0, 0.0, -2.0, -10.0, -5.0), &special);
        assert!((out.r + 6.0).abs() < EPS);
        assert_eq!(out.u, 0.0);
        assert!((out.s + 3.0).abs() < EPS);
        assert!((out.c + 17.0).abs() < EPS);
        assert!((out.i + 7.0).abs() < EPS);
    }

    #[test]
    fn scaling_reduces_gains_of_net_positive_delta() {
        let weights = MeterConfig::default().weights;
        let out = apply_unluck_scaling(&Delta::new(10.0, -2.0, 4.0, 0.0, 1.0), 0.5, &weights);
        assert_eq!(out, Delta::new(5.0, -2.0, 2.0, 0.0, 0.5));
    }

    #[test]
    fn scaling_amplifies_losses_of_net_negative_delta() {
        let weights = MeterConfig::default().weights;
        let out = apply_unluck_scaling(&Delta::new(-10.0, 2.0, -4.0, 0.0, 1.0), 0.5, &weights);
        assert_eq!(out, Delta::new(-15.0, 2.0, -6.0, 0.0, 1.0));
    }

    #[test]
    fn no_unluck_consumes_exactly_one_draw() {
        let mut config = MeterConfig::default();
        config.unluck.probability = 0.0;
        let mut rng = SeededRng::new(42);
        let mut reference = SeededRng::new(42);
        let delta = Delta::new(3.0, 3.0, 3.0, 3.0, 3.0);

        let out = apply_unluck(&delta, 1, Choice::A, &mut rng, &config, &UnluckOptions::default())
            .unwrap();
        assert_eq!(out.delta, delta);
        assert_eq!(out.result, UnluckResult::none());
        reference.next();
        assert_eq!(rng.state(), reference.state());
    }

    #[test]
    fn disabled_unluck_still_consumes_roll() {
        let mut config = MeterConfig::default();
        config.unluck.enabled = false;
        config.unluck.probability = 1.0;
        let mut rng = SeededRng::new(7);
        let before = rng.state();
        let out = apply_unluck(&Delta::ZERO, 2, Choice::B, &mut rng, &config, &UnluckOptions::default())
            .unwrap();
        assert!(!out.result.unluck_applied);
        assert_ne!(rng.state(), before);
    }

    #[test]
    fn forced_unluck_skips_the_roll_draw() {
        let config = MeterConfig::default();
        let options = UnluckOptions {
            force_unluck: true,
            ..UnluckOptions::default()
        };
        let mut rng = SeededRng::new(42);
        apply_unluck(&Delta::new(1.0, 1.0, 1.0, 1.0, 1.0), 1, Choice::A, &mut rng, &config, &options)
            .unwrap();

        // factor draw + message draw, no roll
        let mut reference = SeededRng::new(42);
        reference.next_float(0.4, 0.7).unwrap();
        reference.next_int(0, 1).unwrap();
        assert_eq!(rng.state(), reference.state());
    }

    #[test]
    fn factor_override_skips_the_factor_draw() {
        let config = MeterConfig::default();
        let options = UnluckOptions {
            force_unluck: true,
            force_perfect_storm: false,
            unluck_factor_override: Some(0.6),
        };
        let mut rng = SeededRng::new(42);
        let out = apply_unluck(&Delta::new(10.0, 0.0, 0.0, 0.0, 0.0), 1, Choice::A, &mut rng, &config, &options)
            .unwrap();
        assert_eq!(out.result.luck_factor, 0.6);
        assert!((out.delta.r - 6.0).abs() < EPS);

        let mut reference = SeededRng::new(42);
        reference.next_int(0, 1).unwrap();
        assert_eq!(rng.state(), reference.state());
    }

    #[test]
    fn forced_perfect_storm_on_step_4_b() {
        let config = MeterConfig::default();
        let mut rng = SeededRng::new(1);
        let delta = Delta::new(10.0, 5.0, 8.0, 3.0, 2.0);
        let out = apply_unluck(&delta, 4, Choice::B, &mut rng, &config, &forced()).unwrap();

        assert!(out.result.unluck_applied);
        assert!(out.result.perfect_storm);
        let msg = out.result.message.unwrap();
        assert!(PERFECT_STORM_MESSAGES.contains(&msg.as_str()));
        // 0.5 luck factor, then storm penalties
        assert!((out.delta.r - 2.5).abs() < EPS);
        assert!((out.delta.c - 0.45).abs() < EPS);
    }

    #[test]
    fn forced_perfect_storm_skips_the_roll_draw() {
        let config = MeterConfig::default();
        let mut rng = SeededRng::new(42);
        let delta = Delta::new(4.0, 4.0, 4.0, 4.0, 4.0);
        apply_unluck(&delta, 4, Choice::B, &mut rng, &config, &forced()).unwrap();

        // unluck message, storm message; no roll and no factor draw
        let mut reference = SeededRng::new(42);
        reference.next_int(0, 1).unwrap();
        reference.next_int(0, 2).unwrap();
        assert_eq!(rng.state(), reference.state());
    }

    #[test]
    fn eligible_storm_roll_takes_one_draw() {
        let mut config = MeterConfig::default();
        config.special_unluck.probability = 1.0;
        let options = UnluckOptions {
            force_unluck: true,
            force_perfect_storm: false,
            unluck_factor_override: Some(0.5),
        };
        let mut rng = SeededRng::new(42);
        let delta = Delta::new(4.0, 4.0, 4.0, 4.0, 4.0);
        let out = apply_unluck(&delta, 4, Choice::B, &mut rng, &config, &options).unwrap();
        assert!(out.result.perfect_storm);

        let mut reference = SeededRng::new(42);
        reference.next_int(0, 1).unwrap();
        reference.next();
        reference.next_int(0, 2).unwrap();
        assert_eq!(rng.state(), reference.state());
    }

    #[test]
    fn perfect_storm_never_fires_elsewhere() {
        let config = MeterConfig::default();
        for step in 1..=5u8 {
            for choice in [Choice::A, Choice::B] {
                if (step, choice) == (4, Choice::B) {
                    continue;
                }
                let mut rng = SeededRng::new(i64::from(step) * 31);
                let out = apply_unluck(&Delta::new(5.0, 5.0, 5.0, 5.0, 5.0), step, choice, &mut rng, &config, &forced())
                    .unwrap();
                assert!(out.result.unluck_applied);
                assert!(!out.result.perfect_storm, "step {} choice {}", step, choice);
            }
        }
    }

    #[test]
    fn perfect_storm_requires_regular_unluck() {
        let mut config = MeterConfig::default();
        config.unluck.probability = 0.0;
        let options = UnluckOptions {
            force_perfect_storm: true,
            ..UnluckOptions::default()
        };
        let mut rng = SeededRng::new(3);
        let out = apply_unluck(&Delta::new(5.0, 5.0, 5.0, 5.0, 5.0), 4, Choice::B, &mut rng, &config, &options)
            .unwrap();
        assert!(!out.result.perfect_storm);
        assert!(!out.result.unluck_applied);
    }

    #[test]
    fn unknown_step_uses_generic_message() {
        let config = MeterConfig::default();
        let options = UnluckOptions {
            force_unluck: true,
            ..UnluckOptions::default()
        };
        let mut rng = SeededRng::new(11);
        let out = apply_unluck(&Delta::ZERO, 9, Choice::A, &mut rng, &config, &options).unwrap();
        assert_eq!(
            out.result.message.as_deref(),
            Some(crate::messages::GENERIC_UNLUCK_MESSAGES[0])
        );
    }

    #[test]
    fn inverted_factor_range_is_an_error() {
        let mut config = MeterConfig::default();
        config.unluck.factor_range = [0.7, 0.4];
        let options = UnluckOptions {
            force_unluck: true,
            ..UnluckOptions::default()
        };
        let mut rng = SeededRng::new(11);
        let err = apply_unluck(&Delta::ZERO, 1, Choice::A, &mut rng, &config, &options).unwrap_err();
        assert!(matches!(err, EngineError::InvalidRange { op: "next_float", .. }));
    }
}
