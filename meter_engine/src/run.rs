//! Run state — one player's five-step playthrough.
//!
//! Plain data, serialized in the persisted run format. The PRNG state is
//! stored alongside the meter so a run resumes without replaying draws.

use serde::{Deserialize, Serialize};

use crate::domain::{Choice, Delta, MeterState, UnluckOptions, UnluckResult};
use crate::rng::{RngState, SeededRng};
use crate::tier::Tier;

/// Number of decisions in a run.
pub const FINAL_STEP: u8 = 5;

/// What the caller submits for one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StepInput {
    pub step_id: u8,
    pub choice: Choice,
    pub delta: Delta,
    #[serde(default)]
    pub options: UnluckOptions,
}

impl StepInput {
    pub fn new(step_id: u8, choice: Choice, delta: Delta) -> Self {
        Self {
            step_id,
            choice,
            delta,
            options: UnluckOptions::default(),
        }
    }

    pub fn with_options(mut self, options: UnluckOptions) -> Self {
        self.options = options;
        self
    }
}

/// History entry for one completed step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StepRecord {
    pub step_id: u8,
    pub choice: Choice,
    /// Unluck overrides the caller submitted with this step.
    #[serde(default)]
    pub options: UnluckOptions,
    /// Delta as submitted by the caller.
    pub submitted_delta: Delta,
    /// Delta after rubber-band and unluck; equals the meter's `lastDelta`.
    pub applied_delta: Delta,
    pub rubber_band_applied: bool,
    pub display_before: f64,
    pub display_after: f64,
    pub tier_after: Tier,
    pub unluck: UnluckResult,
    pub rng_state_after: RngState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RunState {
    pub seed: i64,
    /// Next step to play; `FINAL_STEP + 1` once the run is over.
    pub current_step: u8,
    pub meter_state: MeterState,
    pub step_history: Vec<StepRecord>,
    pub rng_state: RngState,
    /// The next submitted delta gets the rubber-band bump.
    #[serde(default)]
    pub pending_rubber_band: bool,
    /// Milliseconds since the Unix epoch, stamped by the caller.
    #[serde(default)]
    pub start_time: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<u64>,
}

impl RunState {
    /// A fresh run at step 1.
    pub fn new(seed: i64) -> Self {
        Self {
            seed,
            current_step: 1,
            meter_state: MeterState::initial(),
            step_history: Vec::new(),
            rng_state: SeededRng::new(seed).state(),
            pending_rubber_band: false,
            start_time: 0,
            end_time: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.current_step > FINAL_STEP
    }

    /// Tier of a finished run, `None` while steps remain.
    pub fn final_tier(&self) -> Option<Tier> {
        self.is_finished().then_some(self.meter_state.tier)
    }

    /// The inputs that produced this run's history, in order.
    pub fn inputs(&self) -> Vec<StepInput> {
        self.step_history
            .iter()
            .map(|r| {
                StepInput::new(r.step_id, r.choice, r.submitted_delta).with_options(r.options)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_run_starts_at_step_one() {
        let run = RunState::new(42);
        assert_eq!(run.current_step, 1);
        assert!(!run.is_finished());
        assert_eq!(run.final_tier(), None);
        assert_eq!(run.rng_state, SeededRng::new(42).state());
    }

    #[test]
    fn step_input_options_default_when_absent() {
        let json = r#"{"stepId":2,"choice":"B","delta":{"R":1,"U":0,"S":0,"C":0,"I":0}}"#;
        let input: StepInput = serde_json::from_str(json).unwrap();
        assert_eq!(input.options, UnluckOptions::default());
        assert_eq!(input.choice, Choice::B);
    }

    #[test]
    fn run_state_json_is_camel_case() {
        let v = serde_json::to_value(RunState::new(7)).unwrap();
        assert_eq!(v["currentStep"], 1);
        assert!(v.get("meterState").is_some());
        assert!(v.get("stepHistory").is_some());
        assert!(v.get("endTime").is_none());
    }
}
