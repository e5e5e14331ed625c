//! Meter configuration — tunable constants for the meter and unluck engines.
//!
//! Caller-owned and passed explicitly. Partial JSON overrides are
//! deep-merged over the defaults, then deserialized strictly.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::domain::{Choice, Delta};

/// Allowed deviation of the weight sum from 1.0.
pub const WEIGHT_SUM_TOLERANCE: f64 = 0.01;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config overrides must be a JSON object, got {0}")]
    NotAnObject(&'static str),
    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
}

// ── Sections ───────────────────────────────────────────────────────

/// Per-dimension contribution to the weighted sum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Weights {
    #[serde(rename = "R")]
    pub r: f64,
    #[serde(rename = "U")]
    pub u: f64,
    #[serde(rename = "S")]
    pub s: f64,
    #[serde(rename = "C")]
    pub c: f64,
    #[serde(rename = "I")]
    pub i: f64,
}

impl Weights {
    /// Dot product with a five-dimensional vector.
    pub fn weighted_sum(&self, v: &Delta) -> f64 {
        self.r * v.r + self.u * v.u + self.s * v.s + self.c * v.c + self.i * v.i
    }

    pub fn sum(&self) -> f64 {
        self.r + self.u + self.s + self.c + self.i
    }

    fn to_array(self) -> [f64; 5] {
        [self.r, self.u, self.s, self.c, self.i]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SigmoidParams {
    pub mu: f64,
    pub sigma: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MomentumConfig {
    pub enabled: bool,
    pub bonus: f64,
    pub streak_threshold: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RandomnessConfig {
    pub enabled: bool,
    pub bounds: [f64; 2],
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiminishingReturnsConfig {
    pub enabled: bool,
    pub power: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RubberBandConfig {
    pub enabled: bool,
    pub threshold: f64,
    pub bump: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UnluckConfig {
    pub enabled: bool,
    pub probability: f64,
    pub factor_range: [f64; 2],
}

/// The Perfect Storm layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SpecialUnluckConfig {
    pub enabled: bool,
    pub step: u8,
    pub choice: Choice,
    pub probability: f64,
    /// Applies to Revenue and System.
    pub scaling_gains_reduction: f64,
    pub users_reduction: f64,
    pub customers_reduction: f64,
    pub investors_reduction: f64,
}

/// Complete engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MeterConfig {
    pub weights: Weights,
    pub sigmoid: SigmoidParams,
    pub momentum: MomentumConfig,
    pub randomness: RandomnessConfig,
    pub diminishing_returns: DiminishingReturnsConfig,
    pub rubber_band: RubberBandConfig,
    pub unluck: UnluckConfig,
    pub special_unluck: SpecialUnluckConfig,
}

impl Default for MeterConfig {
    fn default() -> Self {
        Self {
            weights: Weights {
                r: 0.30,
                u: 0.20,
                s: 0.15,
                c: 0.20,
                i: 0.15,
            },
            sigmoid: SigmoidParams {
                mu: 0.0,
                sigma: 8.0,
            },
            momentum: MomentumConfig {
                enabled: true,
                bonus: 2.0,
                streak_threshold: 2,
            },
            randomness: RandomnessConfig {
                enabled: true,
                bounds: [-2.0, 2.0],
            },
            diminishing_returns: DiminishingReturnsConfig {
                enabled: true,
                power: 0.9,
            },
            rubber_band: RubberBandConfig {
                enabled: true,
                threshold: 30.0,
                bump: 3.0,
            },
            unluck: UnluckConfig {
                enabled: true,
                probability: 0.15,
                factor_range: [0.4, 0.7],
            },
            special_unluck: SpecialUnluckConfig {
                enabled: true,
                step: 4,
                choice: Choice::B,
                probability: 0.10,
                scaling_gains_reduction: 0.5,
                users_reduction: 0.5,
                customers_reduction: 0.7,
                investors_reduction: 0.4,
            },
        }
    }
}

impl MeterConfig {
    /// Defaults with `overrides` deep-merged on top.
    pub fn with_overrides(overrides: &Value) -> Result<Self, ConfigError> {
        Self::default().merged(overrides)
    }

    /// This config with `overrides` deep-merged on top.
    ///
    /// Objects merge key by key; any other value replaces wholesale.
    pub fn merged(&self, overrides: &Value) -> Result<Self, ConfigError> {
        if !overrides.is_object() {
            return Err(ConfigError::NotAnObject(json_kind(overrides)));
        }
        let mut base = serde_json::to_value(self)?;
        deep_merge(&mut base, overrides);
        Ok(serde_json::from_value(base)?)
    }

    /// Parse a (possibly partial) JSON config over the defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let overrides: Value = serde_json::from_str(json)?;
        Self::with_overrides(&overrides)
    }

    /// A config with every optional mechanic switched off:
    /// pure weighted-sigmoid scoring.
    pub fn deterministic() -> Self {
        let mut config = Self::default();
        config.momentum.enabled = false;
        config.randomness.enabled = false;
        config.diminishing_returns.enabled = false;
        config.rubber_band.enabled = false;
        config.unluck.enabled = false;
        config.special_unluck.enabled = false;
        config
    }
}

fn deep_merge(base: &mut Value, overrides: &Value) {
    match (base, overrides) {
        (Value::Object(base_map), Value::Object(over_map)) => {
            for (key, over) in over_map {
                match base_map.get_mut(key) {
                    Some(existing) => deep_merge(existing, over),
                    None => {
                        base_map.insert(key.clone(), over.clone());
                    }
                }
            }
        }
        (slot, over) => *slot = over.clone(),
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Check a config for values the engines cannot meaningfully use.
///
/// Returns every problem found, empty when the config is valid.
/// Callers decide whether to reject or proceed.
pub fn validate_config(config: &MeterConfig) -> Vec<String> {
    let mut errors = Vec::new();

    let sum = config.weights.sum();
    if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
        errors.push(format!(
            "weights must sum to 1.0 (±{}), got {:.4}",
            WEIGHT_SUM_TOLERANCE, sum
        ));
    }
    for (name, w) in ["R", "U", "S", "C", "I"].iter().zip(config.weights.to_array()) {
        if !(w >= 0.0) {
            errors.push(format!("weights.{} must be non-negative, got {}", name, w));
        }
    }

    if !(config.sigmoid.sigma > 0.0) {
        errors.push(format!(
            "sigmoid.sigma must be positive, got {}",
            config.sigmoid.sigma
        ));
    }

    let power = config.diminishing_returns.power;
    if !(power > 0.0 && power <= 1.0) {
        errors.push(format!(
            "diminishingReturns.power must be in (0, 1], got {}",
            power
        ));
    }

    let [noise_min, noise_max] = config.randomness.bounds;
    if !(noise_min <= noise_max) {
        errors.push(format!(
            "randomness.bounds min {} must not exceed max {}",
            noise_min, noise_max
        ));
    }

    check_probability(&mut errors, "unluck.probability", config.unluck.probability);
    let [factor_min, factor_max] = config.unluck.factor_range;
    if !(factor_min < factor_max) {
        errors.push(format!(
            "unluck.factorRange min {} must be less than max {}",
            factor_min, factor_max
        ));
    }

    let special = &config.special_unluck;
    check_probability(&mut errors, "specialUnluck.probability", special.probability);
    if !(1..=5).contains(&special.step) {
        errors.push(format!(
            "specialUnluck.step must be between 1 and 5, got {}",
            special.step
        ));
    }
    for (name, f) in [
        ("scalingGainsReduction", special.scaling_gains_reduction),
        ("usersReduction", special.users_reduction),
        ("customersReduction", special.customers_reduction),
        ("investorsReduction", special.investors_reduction),
    ] {
        if !(0.0..=1.0).contains(&f) {
            errors.push(format!("specialUnluck.{} must be in [0, 1], got {}", name, f));
        }
    }

    errors
}

fn check_probability(errors: &mut Vec<String>, name: &str, p: f64) {
    if !(0.0..=1.0).contains(&p) {
        errors.push(format!("{} must be in [0, 1], got {}", name, p));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_are_valid() {
        assert!(validate_config(&MeterConfig::default()).is_empty());
        assert!(validate_config(&MeterConfig::deterministic()).is_empty());
    }

    #[test]
    fn default_perfect_storm_targets_step_4_choice_b() {
        let c = MeterConfig::default();
        assert_eq!(c.special_unluck.step, 4);
        assert_eq!(c.special_unluck.choice, Choice::B);
    }

    #[test]
    fn partial_override_keeps_siblings() {
        let c = MeterConfig::with_overrides(&json!({
            "unluck": { "probability": 0.5 },
            "momentum": { "enabled": false }
        }))
        .unwrap();
        assert_eq!(c.unluck.probability, 0.5);
        assert_eq!(c.unluck.factor_range, [0.4, 0.7]);
        assert!(!c.momentum.enabled);
        assert_eq!(c.momentum.bonus, 2.0);
        assert_eq!(c.weights, MeterConfig::default().weights);
    }

    #[test]
    fn arrays_replace_wholesale() {
        let c = MeterConfig::with_overrides(&json!({
            "randomness": { "bounds": [-1.0, 0.5] }
        }))
        .unwrap();
        assert_eq!(c.randomness.bounds, [-1.0, 0.5]);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = MeterConfig::with_overrides(&json!({ "unluk": { "probability": 1.0 } }));
        assert!(matches!(err, Err(ConfigError::Json(_))));
    }

    #[test]
    fn non_object_override_is_rejected() {
        let err = MeterConfig::with_overrides(&json!([1, 2]));
        assert!(matches!(err, Err(ConfigError::NotAnObject("an array"))));
    }

    #[test]
    fn from_json_str_parses_partial_document() {
        let c = MeterConfig::from_json_str(r#"{"specialUnluck":{"choice":"A"}}"#).unwrap();
        assert_eq!(c.special_unluck.choice, Choice::A);
        assert_eq!(c.special_unluck.step, 4);
    }

    #[test]
    fn validation_reports_every_problem() {
        let mut c = MeterConfig::default();
        c.weights.r = 0.9;
        c.unluck.probability = 1.5;
        c.unluck.factor_range = [0.7, 0.4];
        c.special_unluck.probability = -0.1;
        let errors = validate_config(&c);
        assert_eq!(errors.len(), 4, "{:?}", errors);
        assert!(errors[0].contains("weights must sum"));
        assert!(errors.iter().any(|e| e.contains("unluck.factorRange")));
    }

    #[test]
    fn weight_sum_tolerance_is_inclusive() {
        let mut c = MeterConfig::default();
        c.weights.r += 0.005;
        assert!(validate_config(&c).is_empty());
    }

    #[test]
    fn config_round_trips_through_json() {
        let c = MeterConfig::default();
        let json = serde_json::to_string(&c).unwrap();
        assert!(json.contains("\"factorRange\""));
        assert!(json.contains("\"streakThreshold\""));
        let back: MeterConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(c, back);
    }
}
