//! Canonical hashing of meter and run state.
//!
//! Deterministic canonical serialization + SHA-256.
//!
//! Rules:
//!   - Fixed field order, built by hand (serde_json `preserve_order`)
//!   - Dimensions always in `R, U, S, C, I` order
//!   - Floats in shortest round-trip form, so equal hashes mean
//!     bit-identical values
//!   - Timestamps excluded; two replays of one run hash the same
//!   - `engine_version` first, binding the hash to the scoring rules

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::domain::{Delta, MeterState, UnluckOptions, UnluckResult};
use crate::run::{RunState, StepRecord};
use crate::ENGINE_VERSION;

/// Canonical UTF-8 JSON bytes of a run. No whitespace.
pub fn canonical_serialize(run: &RunState) -> Vec<u8> {
    Value::Object(run_value(run)).to_string().into_bytes()
}

/// SHA-256 of [`canonical_serialize`], lowercase hex.
pub fn canonical_hash(run: &RunState) -> String {
    hex_digest(&canonical_serialize(run))
}

/// SHA-256 of a single meter state's canonical form, lowercase hex.
pub fn meter_state_hash(state: &MeterState) -> String {
    let mut root = Map::new();
    root.insert("engine_version".to_string(), Value::from(ENGINE_VERSION));
    root.insert("meter_state".to_string(), meter_value(state));
    hex_digest(Value::Object(root).to_string().as_bytes())
}

pub(crate) fn hex_digest(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

fn run_value(run: &RunState) -> Map<String, Value> {
    let mut root = Map::new();
    root.insert("engine_version".to_string(), Value::from(ENGINE_VERSION));
    root.insert("seed".to_string(), Value::from(run.seed));
    root.insert("current_step".to_string(), Value::from(run.current_step));
    root.insert("meter_state".to_string(), meter_value(&run.meter_state));
    root.insert(
        "step_history".to_string(),
        Value::Array(run.step_history.iter().map(record_value).collect()),
    );
    root.insert("rng_state".to_string(), Value::from(run.rng_state.0));
    root.insert(
        "pending_rubber_band".to_string(),
        Value::Bool(run.pending_rubber_band),
    );
    root
}

fn meter_value(state: &MeterState) -> Value {
    let mut m = Map::new();
    m.insert("hidden_state".to_string(), delta_value(&state.hidden_state));
    m.insert("display_value".to_string(), Value::from(state.display_value));
    m.insert("tier".to_string(), Value::from(state.tier.label()));
    m.insert(
        "last_delta".to_string(),
        state.last_delta.as_ref().map(delta_value).unwrap_or(Value::Null),
    );
    m.insert("streak".to_string(), Value::from(state.streak));
    Value::Object(m)
}

fn record_value(r: &StepRecord) -> Value {
    let mut m = Map::new();
    m.insert("step_id".to_string(), Value::from(r.step_id));
    m.insert("choice".to_string(), Value::from(r.choice.as_str()));
    m.insert("options".to_string(), options_value(&r.options));
    m.insert("submitted_delta".to_string(), delta_value(&r.submitted_delta));
    m.insert("applied_delta".to_string(), delta_value(&r.applied_delta));
    m.insert(
        "rubber_band_applied".to_string(),
        Value::Bool(r.rubber_band_applied),
    );
    m.insert("display_before".to_string(), Value::from(r.display_before));
    m.insert("display_after".to_string(), Value::from(r.display_after));
    m.insert("tier_after".to_string(), Value::from(r.tier_after.label()));
    m.insert("unluck".to_string(), unluck_value(&r.unluck));
    m.insert("rng_state_after".to_string(), Value::from(r.rng_state_after.0));
    Value::Object(m)
}

fn unluck_value(u: &UnluckResult) -> Value {
    let mut m = Map::new();
    m.insert("unluck_applied".to_string(), Value::Bool(u.unluck_applied));
    m.insert("luck_factor".to_string(), Value::from(u.luck_factor));
    m.insert(
        "message".to_string(),
        u.message.clone().map(Value::String).unwrap_or(Value::Null),
    );
    m.insert("perfect_storm".to_string(), Value::Bool(u.perfect_storm));
    Value::Object(m)
}

fn options_value(o: &UnluckOptions) -> Value {
    let mut m = Map::new();
    m.insert("force_unluck".to_string(), Value::Bool(o.force_unluck));
    m.insert(
        "force_perfect_storm".to_string(),
        Value::Bool(o.force_perfect_storm),
    );
    m.insert(
        "unluck_factor_override".to_string(),
        o.unluck_factor_override.map(Value::from).unwrap_or(Value::Null),
    );
    Value::Object(m)
}

fn delta_value(d: &Delta) -> Value {
    let mut m = Map::new();
    m.insert("R".to_string(), Value::from(d.r));
    m.insert("U".to_string(), Value::from(d.u));
    m.insert("S".to_string(), Value::from(d.s));
    m.insert("C".to_string(), Value::from(d.c));
    m.insert("I".to_string(), Value::from(d.i));
    Value::Object(m)
}
