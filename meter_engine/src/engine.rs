//! Run engine — stateful wrapper around the pure meter pipeline.
//!
//! Owns one run's state, PRNG and config. Enforces strict step order
//! (1 through 5, no gaps, nothing after 5), applies queued rubber-band
//! bumps, validates invariants after every step, and records history.

use tracing::{debug, info};

use crate::config::MeterConfig;
use crate::domain::{MeterState, UnluckResult};
use crate::error::EngineError;
use crate::invariants::validate_run_state;
use crate::meter::{apply_rubber_band_bump, should_apply_rubber_band, update_meter_state_with_unluck};
use crate::rng::{RngState, SeededRng};
use crate::run::{RunState, StepInput, StepRecord, FINAL_STEP};
use crate::tier::crosses_tier_boundary;

/// Everything the caller needs after one step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub meter_state: MeterState,
    pub unluck_result: UnluckResult,
    pub record: StepRecord,
    /// The next step's delta will receive the rubber-band bump.
    pub rubber_band_next: bool,
    pub tier_changed: bool,
    pub finished: bool,
}

pub struct RunEngine {
    run: RunState,
    rng: SeededRng,
    config: MeterConfig,
}

impl RunEngine {
    /// Start a fresh run.
    pub fn new(seed: i64, config: MeterConfig) -> Self {
        Self {
            run: RunState::new(seed),
            rng: SeededRng::new(seed),
            config,
        }
    }

    /// Continue a persisted run from its stored PRNG state.
    pub fn resume(run: RunState, config: MeterConfig) -> Self {
        let rng = SeededRng::from_state(run.rng_state);
        Self { run, rng, config }
    }

    pub fn run(&self) -> &RunState {
        &self.run
    }

    pub fn into_run(self) -> RunState {
        self.run
    }

    pub fn config(&self) -> &MeterConfig {
        &self.config
    }

    pub fn rng_state(&self) -> RngState {
        self.rng.state()
    }

    pub fn is_finished(&self) -> bool {
        self.run.is_finished()
    }

    /// Ending title for a finished run.
    pub fn ending(&self) -> Option<&'static str> {
        self.run.final_tier().map(|t| t.ending_title())
    }

    pub fn set_start_time(&mut self, millis: u64) {
        self.run.start_time = millis;
    }

    /// Stamp the end time of a finished run. Returns `false` (and does
    /// nothing) while steps remain.
    pub fn mark_ended(&mut self, millis: u64) -> bool {
        if !self.run.is_finished() {
            return false;
        }
        self.run.end_time = Some(millis);
        true
    }

    /// Play one step.
    ///
    ///   1. Reject finished runs and out-of-order steps
    ///   2. Apply a queued rubber-band bump to the submitted delta
    ///   3. Run unluck + meter update on a scratch PRNG
    ///   4. Commit state, PRNG and history; queue the next bump
    ///   5. Validate invariants on the new run state
    ///
    /// On error nothing is committed, including PRNG draws.
    pub fn apply_step(&mut self, input: &StepInput) -> Result<StepOutcome, EngineError> {
        if self.run.is_finished() {
            return Err(EngineError::RunFinished {
                last_step: FINAL_STEP,
            });
        }
        if input.step_id != self.run.current_step {
            return Err(EngineError::StepOutOfOrder {
                expected: self.run.current_step,
                got: input.step_id,
            });
        }

        let rubber_band_applied = self.run.pending_rubber_band;
        let submitted = if rubber_band_applied {
            apply_rubber_band_bump(&input.delta, &self.config)
        } else {
            input.delta
        };

        let mut rng = self.rng.clone();
        let before = &self.run.meter_state;
        let update = update_meter_state_with_unluck(
            before,
            &submitted,
            input.step_id,
            input.choice,
            &mut rng,
            &self.config,
            &input.options,
        )?;
        let meter_state = update.meter_state;
        let display_before = before.display_value;

        let record = StepRecord {
            step_id: input.step_id,
            choice: input.choice,
            options: input.options,
            submitted_delta: input.delta,
            applied_delta: meter_state.last_delta.unwrap_or(submitted),
            rubber_band_applied,
            display_before,
            display_after: meter_state.display_value,
            tier_after: meter_state.tier,
            unluck: update.unluck_result.clone(),
            rng_state_after: rng.state(),
        };
        let rubber_band_next = should_apply_rubber_band(&meter_state, &self.config);
        let tier_changed = crosses_tier_boundary(display_before, meter_state.display_value);

        self.rng = rng;
        self.run.meter_state = meter_state.clone();
        self.run.step_history.push(record.clone());
        self.run.rng_state = self.rng.state();
        self.run.pending_rubber_band = rubber_band_next;
        self.run.current_step += 1;
        validate_run_state(&self.run);

        debug!(
            target: "meter.run",
            step_id = input.step_id,
            choice = %input.choice,
            display_value = meter_state.display_value,
            tier = %meter_state.tier,
            rubber_band_applied,
            "step applied"
        );

        let finished = self.run.is_finished();
        if finished {
            info!(
                target: "meter.run",
                seed = self.run.seed,
                display_value = meter_state.display_value,
                tier = %meter_state.tier,
                "run finished"
            );
        }

        Ok(StepOutcome {
            meter_state,
            unluck_result: update.unluck_result,
            record,
            rubber_band_next,
            tier_changed,
            finished,
        })
    }

    /// Apply inputs in order, stopping at the first error.
    pub fn apply_sequence(&mut self, inputs: &[StepInput]) -> Result<&RunState, EngineError> {
        for input in inputs {
            self.apply_step(input)?;
        }
        Ok(&self.run)
    }

    /// Reset to the run's seed and re-simulate `inputs` from scratch.
    pub fn replay(&mut self, inputs: &[StepInput]) -> Result<&RunState, EngineError> {
        let seed = self.run.seed;
        self.run = RunState::new(seed);
        self.rng = SeededRng::new(seed);
        self.apply_sequence(inputs)
    }
}
