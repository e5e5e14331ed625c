//! Scenario content — the five decisions of a run and their deltas.

use serde::{Deserialize, Serialize};

use meter_engine::domain::{Choice, Delta};
use meter_engine::run::{StepInput, FINAL_STEP};

/// Authored deltas must stay inside this range on every dimension.
pub const AUTHORED_MIN: f64 = -10.0;
pub const AUTHORED_MAX: f64 = 15.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ChoiceContent {
    pub label: String,
    pub delta: Delta,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StepContent {
    pub step_id: u8,
    pub title: String,
    pub option_a: ChoiceContent,
    pub option_b: ChoiceContent,
}

impl StepContent {
    pub fn option(&self, choice: Choice) -> &ChoiceContent {
        match choice {
            Choice::A => &self.option_a,
            Choice::B => &self.option_b,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Scenario {
    pub name: String,
    pub steps: Vec<StepContent>,
}

impl Scenario {
    /// The bundled five-step startup scenario.
    pub fn builtin() -> Self {
        fn step(id: u8, title: &str, a: (&str, Delta), b: (&str, Delta)) -> StepContent {
            StepContent {
                step_id: id,
                title: title.to_string(),
                option_a: ChoiceContent {
                    label: a.0.to_string(),
                    delta: a.1,
                },
                option_b: ChoiceContent {
                    label: b.0.to_string(),
                    delta: b.1,
                },
            }
        }

        Self {
            name: "garage-to-series-b".to_string(),
            steps: vec![
                step(
                    1,
                    "Launch",
                    ("Demo to angels", Delta::new(2.0, 4.0, -2.0, 1.0, 8.0)),
                    ("Outsource the MVP", Delta::new(3.0, 6.0, -6.0, 2.0, 0.0)),
                ),
                step(
                    2,
                    "First traction",
                    ("Consumer growth hack", Delta::new(0.0, 12.0, -3.0, -2.0, 4.0)),
                    ("Enterprise pilot", Delta::new(8.0, 1.0, 0.0, 9.0, 2.0)),
                ),
                step(
                    3,
                    "Platform",
                    ("Rewrite the core", Delta::new(-4.0, -2.0, 14.0, 0.0, -1.0)),
                    ("Ship on shortcuts", Delta::new(5.0, 7.0, -8.0, 3.0, 2.0)),
                ),
                step(
                    4,
                    "Go to market",
                    ("Hire a sales lead", Delta::new(9.0, 2.0, 0.0, 6.0, 1.0)),
                    ("Raise a bridge round", Delta::new(0.0, 0.0, 2.0, -3.0, 12.0)),
                ),
                step(
                    5,
                    "Scale",
                    ("Open a new market", Delta::new(7.0, 10.0, -4.0, 4.0, 6.0)),
                    ("Strategic partnership", Delta::new(6.0, 4.0, 3.0, 8.0, 3.0)),
                ),
            ],
        }
    }

    pub fn step(&self, step_id: u8) -> Option<&StepContent> {
        self.steps.iter().find(|s| s.step_id == step_id)
    }

    pub fn delta(&self, step_id: u8, choice: Choice) -> Option<Delta> {
        self.step(step_id).map(|s| s.option(choice).delta)
    }

    /// Engine input for playing `choice` at `step_id`.
    pub fn input(&self, step_id: u8, choice: Choice) -> Option<StepInput> {
        self.delta(step_id, choice)
            .map(|delta| StepInput::new(step_id, choice, delta))
    }

    /// Human-readable problems; empty when the scenario is playable.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.steps.len() != usize::from(FINAL_STEP) {
            errors.push(format!(
                "scenario must have {} steps, found {}",
                FINAL_STEP,
                self.steps.len()
            ));
        }

        for (idx, step) in self.steps.iter().enumerate() {
            let expected = idx as u8 + 1;
            if step.step_id != expected {
                errors.push(format!(
                    "step at position {} has id {}, expected {}",
                    idx + 1,
                    step.step_id,
                    expected
                ));
            }
            for choice in [Choice::A, Choice::B] {
                let delta = step.option(choice).delta;
                for (dim, value) in ["R", "U", "S", "C", "I"].iter().zip(delta.to_array()) {
                    if !(AUTHORED_MIN..=AUTHORED_MAX).contains(&value) {
                        errors.push(format!(
                            "step {} choice {} {} = {} outside [{}, {}]",
                            step.step_id, choice, dim, value, AUTHORED_MIN, AUTHORED_MAX
                        ));
                    }
                }
            }
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_scenario_is_valid() {
        let scenario = Scenario::builtin();
        assert!(scenario.validate().is_empty(), "{:?}", scenario.validate());
    }

    #[test]
    fn lookup_by_step_and_choice() {
        let scenario = Scenario::builtin();
        assert_eq!(
            scenario.delta(4, Choice::B),
            Some(Delta::new(0.0, 0.0, 2.0, -3.0, 12.0))
        );
        let input = scenario.input(2, Choice::A).unwrap();
        assert_eq!(input.step_id, 2);
        assert_eq!(input.choice, Choice::A);
        assert!(scenario.input(6, Choice::A).is_none());
    }

    #[test]
    fn out_of_range_delta_is_reported() {
        let mut scenario = Scenario::builtin();
        scenario.steps[2].option_b.delta.u = 16.0;
        let errors = scenario.validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("step 3 choice B U = 16"), "{}", errors[0]);
    }

    #[test]
    fn nan_delta_is_reported() {
        let mut scenario = Scenario::builtin();
        scenario.steps[0].option_a.delta.r = f64::NAN;
        assert_eq!(scenario.validate().len(), 1);
    }

    #[test]
    fn wrong_step_count_and_order_are_reported() {
        let mut scenario = Scenario::builtin();
        scenario.steps.swap(0, 1);
        scenario.steps.pop();
        let errors = scenario.validate();
        assert!(errors.iter().any(|e| e.contains("must have 5 steps")));
        assert!(errors.iter().any(|e| e.contains("has id 2, expected 1")));
    }

    #[test]
    fn scenario_json_roundtrip() {
        let scenario = Scenario::builtin();
        let json = serde_json::to_string(&scenario).unwrap();
        let back: Scenario = serde_json::from_str(&json).unwrap();
        assert_eq!(back, scenario);
    }
}
