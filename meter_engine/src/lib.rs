#![forbid(unsafe_code)]

//! Deterministic scaling-meter engine.
//!
//! Five binary decisions drive a hidden five-dimensional state through a
//! seeded scoring pipeline: unluck, diminishing returns, weighted sigmoid,
//! noise, momentum and rubber-band. Given the same seed, config and
//! inputs, every run reproduces bit for bit.
//!
//! No I/O lives here. Persistence, replay and simulation are in
//! `meter_runtime`.

/// Engine v1. Any change to scoring or PRNG draw order requires a bump.
pub const ENGINE_VERSION: u32 = 1;

pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod hashing;
pub mod invariants;
pub mod messages;
pub mod meter;
pub mod rng;
pub mod run;
pub mod tier;
pub mod unluck;

pub use config::{validate_config, MeterConfig};
pub use domain::{Choice, Delta, HiddenState, MeterState, MeterUpdate, UnluckOptions, UnluckResult};
pub use engine::{RunEngine, StepOutcome};
pub use error::EngineError;
pub use rng::{RngState, SeededRng};
pub use run::{RunState, StepInput, StepRecord, FINAL_STEP};
pub use tier::Tier;
