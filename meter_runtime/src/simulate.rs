//! Batch simulation — play many seeded runs and summarize outcomes.
//!
//! Each run owns its engine and PRNG; runs never share random state.
//! The random choice strategy draws from its own PRNG so strategy choices
//! never shift the engine's draw sequence.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use meter_engine::config::MeterConfig;
use meter_engine::domain::Choice;
use meter_engine::engine::RunEngine;
use meter_engine::rng::SeededRng;
use meter_engine::run::{RunState, StepInput, FINAL_STEP};
use meter_engine::tier::Tier;
use meter_engine::EngineError;

use crate::scenario::Scenario;

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("scenario has no content for step {0}")]
    MissingStep(u8),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// How a simulated player picks at each step.
#[derive(Debug, Clone, PartialEq)]
pub enum ChoiceStrategy {
    AlwaysA,
    AlwaysB,
    /// Fixed choice per step, step 1 first.
    Sequence([Choice; FINAL_STEP as usize]),
    /// Coin flip per step from a PRNG seeded with `seed + run seed`.
    Random { seed: i64 },
}

impl ChoiceStrategy {
    fn chooser(&self, run_seed: i64) -> impl FnMut(u8) -> Choice + '_ {
        let mut rng = match self {
            ChoiceStrategy::Random { seed } => Some(SeededRng::new(seed.wrapping_add(run_seed))),
            _ => None,
        };
        move |step_id| match self {
            ChoiceStrategy::AlwaysA => Choice::A,
            ChoiceStrategy::AlwaysB => Choice::B,
            ChoiceStrategy::Sequence(choices) => choices[usize::from(step_id - 1)],
            ChoiceStrategy::Random { .. } => match rng.as_mut().map(|r| r.next()) {
                Some(roll) if roll >= 0.5 => Choice::B,
                _ => Choice::A,
            },
        }
    }
}

impl fmt::Display for ChoiceStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChoiceStrategy::AlwaysA => write!(f, "always-a"),
            ChoiceStrategy::AlwaysB => write!(f, "always-b"),
            ChoiceStrategy::Sequence(choices) => {
                let path: String = choices.iter().map(|c| c.as_str()).collect();
                write!(f, "sequence-{}", path)
            }
            ChoiceStrategy::Random { seed } => write!(f, "random-{}", seed),
        }
    }
}

/// Play one full run of `scenario` with `seed`.
pub fn simulate_run(
    scenario: &Scenario,
    config: &MeterConfig,
    seed: i64,
    strategy: &ChoiceStrategy,
) -> Result<RunState, SimulationError> {
    let mut engine = RunEngine::new(seed, config.clone());
    let mut choose = strategy.chooser(seed);

    for step_id in 1..=FINAL_STEP {
        let choice = choose(step_id);
        let delta = scenario
            .delta(step_id, choice)
            .ok_or(SimulationError::MissingStep(step_id))?;
        engine.apply_step(&StepInput::new(step_id, choice, delta))?;
    }

    let run = engine.into_run();
    debug!(
        target: "meter.sim",
        seed,
        display_value = run.meter_state.display_value,
        tier = %run.meter_state.tier,
        "run simulated"
    );
    Ok(run)
}

/// Outcome statistics over a batch of runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub strategy: String,
    pub runs: usize,
    /// Final tier histogram; every tier present, zero when unreached.
    pub tier_counts: BTreeMap<Tier, usize>,
    /// Mean, min and max final display value; all 0 for an empty batch.
    pub mean_display: f64,
    pub min_display: f64,
    pub max_display: f64,
    /// Steps on which unluck fired, across all runs.
    pub unluck_steps: usize,
    /// Runs with at least one unlucky step.
    pub runs_with_unluck: usize,
    pub perfect_storms: usize,
    pub rubber_band_steps: usize,
    #[serde(skip)]
    display_sum: f64,
}

impl BatchSummary {
    fn new(strategy: &ChoiceStrategy) -> Self {
        Self {
            strategy: strategy.to_string(),
            runs: 0,
            tier_counts: Tier::ALL.iter().map(|t| (*t, 0)).collect(),
            mean_display: 0.0,
            min_display: 0.0,
            max_display: 0.0,
            unluck_steps: 0,
            runs_with_unluck: 0,
            perfect_storms: 0,
            rubber_band_steps: 0,
            display_sum: 0.0,
        }
    }

    fn ingest(&mut self, run: &RunState) {
        let display = run.meter_state.display_value;
        if self.runs == 0 {
            self.min_display = display;
            self.max_display = display;
        } else {
            self.min_display = self.min_display.min(display);
            self.max_display = self.max_display.max(display);
        }
        self.display_sum += display;
        self.runs += 1;
        self.mean_display = self.display_sum / self.runs as f64;
        *self.tier_counts.entry(run.meter_state.tier).or_insert(0) += 1;

        let unlucky = run.step_history.iter().filter(|r| r.unluck.unluck_applied).count();
        self.unluck_steps += unlucky;
        if unlucky > 0 {
            self.runs_with_unluck += 1;
        }
        self.perfect_storms += run.step_history.iter().filter(|r| r.unluck.perfect_storm).count();
        self.rubber_band_steps += run.step_history.iter().filter(|r| r.rubber_band_applied).count();
    }

    /// Fraction of runs that ended in `tier`.
    pub fn tier_share(&self, tier: Tier) -> f64 {
        if self.runs == 0 {
            return 0.0;
        }
        self.tier_counts.get(&tier).copied().unwrap_or(0) as f64 / self.runs as f64
    }
}

/// Play one run per seed and summarize.
pub fn simulate_batch(
    scenario: &Scenario,
    config: &MeterConfig,
    seeds: impl IntoIterator<Item = i64>,
    strategy: &ChoiceStrategy,
) -> Result<BatchSummary, SimulationError> {
    let mut summary = BatchSummary::new(strategy);
    for seed in seeds {
        let run = simulate_run(scenario, config, seed, strategy)?;
        summary.ingest(&run);
    }

    info!(
        target: "meter.sim",
        strategy = %summary.strategy,
        runs = summary.runs,
        mean_display = summary.mean_display,
        unluck_steps = summary.unluck_steps,
        perfect_storms = summary.perfect_storms,
        "batch finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_counts_every_run_once() {
        let summary = simulate_batch(
            &Scenario::builtin(),
            &MeterConfig::default(),
            0..200,
            &ChoiceStrategy::AlwaysB,
        )
        .unwrap();
        assert_eq!(summary.runs, 200);
        assert_eq!(summary.tier_counts.values().sum::<usize>(), 200);
        assert_eq!(summary.tier_counts.len(), Tier::ALL.len());
        assert!(summary.min_display <= summary.mean_display);
        assert!(summary.mean_display <= summary.max_display);
        assert!(summary.runs_with_unluck <= summary.unluck_steps);
    }

    #[test]
    fn storms_only_follow_step_four_choice_b() {
        let scenario = Scenario::builtin();
        let config = MeterConfig::default();
        let always_a = simulate_batch(&scenario, &config, 0..300, &ChoiceStrategy::AlwaysA).unwrap();
        assert_eq!(always_a.perfect_storms, 0);
    }

    #[test]
    fn batches_are_reproducible() {
        let scenario = Scenario::builtin();
        let config = MeterConfig::default();
        let strategy = ChoiceStrategy::Random { seed: 99 };
        let first = simulate_batch(&scenario, &config, 0..50, &strategy).unwrap();
        let second = simulate_batch(&scenario, &config, 0..50, &strategy).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn sequence_strategy_follows_choices() {
        let path = [Choice::A, Choice::B, Choice::B, Choice::A, Choice::B];
        let run = simulate_run(
            &Scenario::builtin(),
            &MeterConfig::default(),
            3,
            &ChoiceStrategy::Sequence(path),
        )
        .unwrap();
        let played: Vec<Choice> = run.step_history.iter().map(|r| r.choice).collect();
        assert_eq!(played, path.to_vec());
        assert!(run.is_finished());
    }

    #[test]
    fn deterministic_config_makes_every_seed_equal() {
        let summary = simulate_batch(
            &Scenario::builtin(),
            &MeterConfig::deterministic(),
            0..20,
            &ChoiceStrategy::AlwaysA,
        )
        .unwrap();
        assert_eq!(summary.min_display, summary.max_display);
        assert_eq!(summary.unluck_steps, 0);
    }

    #[test]
    fn short_scenario_is_an_error() {
        let mut scenario = Scenario::builtin();
        scenario.steps.truncate(3);
        let err = simulate_run(&scenario, &MeterConfig::default(), 1, &ChoiceStrategy::AlwaysA)
            .unwrap_err();
        assert!(matches!(err, SimulationError::MissingStep(4)));
    }

    #[test]
    fn mean_is_current_after_every_run() {
        let scenario = Scenario::builtin();
        let config = MeterConfig::default();
        let strategy = ChoiceStrategy::AlwaysA;
        let mut summary = BatchSummary::new(&strategy);
        let mut displays = Vec::new();
        for seed in 0..3 {
            let run = simulate_run(&scenario, &config, seed, &strategy).unwrap();
            displays.push(run.meter_state.display_value);
            summary.ingest(&run);
            let expected = displays.iter().sum::<f64>() / displays.len() as f64;
            assert!((summary.mean_display - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn empty_batch_is_all_zero() {
        let summary = simulate_batch(
            &Scenario::builtin(),
            &MeterConfig::default(),
            std::iter::empty(),
            &ChoiceStrategy::AlwaysA,
        )
        .unwrap();
        assert_eq!(summary.runs, 0);
        assert_eq!(summary.tier_share(Tier::Breakout), 0.0);
    }

    #[test]
    fn summary_serializes_tier_labels() {
        let summary = simulate_batch(
            &Scenario::builtin(),
            &MeterConfig::default(),
            0..5,
            &ChoiceStrategy::AlwaysA,
        )
        .unwrap();
        let v = serde_json::to_value(&summary).unwrap();
        assert!(v["tierCounts"].get("gaining-steam").is_some());
        assert_eq!(v["strategy"], "always-a");
    }
}
