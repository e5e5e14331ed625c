//! Core domain types.
//!
//! Pure data. No scoring logic, no randomness.
//! JSON shape matches the persisted run format (camelCase, `R/U/S/C/I`).

use std::fmt;
use std::ops::{Add, Sub};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::tier::Tier;

// ── Delta ──────────────────────────────────────────────────────────

/// A five-dimensional change to hidden state.
///
/// Authored content keeps each field in `[-10, 15]`; the engine itself
/// places no bound on intermediate values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Delta {
    /// Revenue
    #[serde(rename = "R")]
    pub r: f64,
    /// Users
    #[serde(rename = "U")]
    pub u: f64,
    /// System
    #[serde(rename = "S")]
    pub s: f64,
    /// Customers
    #[serde(rename = "C")]
    pub c: f64,
    /// Investors
    #[serde(rename = "I")]
    pub i: f64,
}

/// The accumulated, never-displayed progress vector. Same shape as a delta.
pub type HiddenState = Delta;

impl Delta {
    pub const ZERO: Delta = Delta {
        r: 0.0,
        u: 0.0,
        s: 0.0,
        c: 0.0,
        i: 0.0,
    };

    pub const fn new(r: f64, u: f64, s: f64, c: f64, i: f64) -> Self {
        Self { r, u, s, c, i }
    }

    /// Apply `f` to every dimension.
    pub fn map(self, mut f: impl FnMut(f64) -> f64) -> Self {
        Self {
            r: f(self.r),
            u: f(self.u),
            s: f(self.s),
            c: f(self.c),
            i: f(self.i),
        }
    }

    /// Dimensions in fixed `R, U, S, C, I` order.
    pub fn to_array(self) -> [f64; 5] {
        [self.r, self.u, self.s, self.c, self.i]
    }

    pub fn is_finite(&self) -> bool {
        self.to_array().iter().all(|v| v.is_finite())
    }
}

impl Add for Delta {
    type Output = Delta;

    fn add(self, rhs: Delta) -> Delta {
        Delta {
            r: self.r + rhs.r,
            u: self.u + rhs.u,
            s: self.s + rhs.s,
            c: self.c + rhs.c,
            i: self.i + rhs.i,
        }
    }
}

impl Sub for Delta {
    type Output = Delta;

    fn sub(self, rhs: Delta) -> Delta {
        Delta {
            r: self.r - rhs.r,
            u: self.u - rhs.u,
            s: self.s - rhs.s,
            c: self.c - rhs.c,
            i: self.i - rhs.i,
        }
    }
}

// ── Choice ─────────────────────────────────────────────────────────

/// One of the two options offered at every step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Choice {
    A,
    B,
}

impl Choice {
    pub fn as_str(self) -> &'static str {
        match self {
            Choice::A => "A",
            Choice::B => "B",
        }
    }
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Choice {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A" => Ok(Choice::A),
            "B" => Ok(Choice::B),
            other => Err(EngineError::InvalidChoice(other.to_string())),
        }
    }
}

// ── Meter state ────────────────────────────────────────────────────

/// Display value of a fresh run.
pub const INITIAL_DISPLAY_VALUE: f64 = 50.0;

/// The player-facing meter plus the hidden state behind it.
///
/// Replaced, never mutated, on each step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MeterState {
    pub hidden_state: HiddenState,
    /// `[0, 100]`, one decimal.
    pub display_value: f64,
    pub tier: Tier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_delta: Option<Delta>,
    pub streak: u32,
}

impl MeterState {
    /// State at the start of every run.
    pub fn initial() -> Self {
        Self {
            hidden_state: Delta::ZERO,
            display_value: INITIAL_DISPLAY_VALUE,
            tier: Tier::classify(INITIAL_DISPLAY_VALUE),
            last_delta: None,
            streak: 0,
        }
    }
}

impl Default for MeterState {
    fn default() -> Self {
        Self::initial()
    }
}

// ── Unluck ─────────────────────────────────────────────────────────

/// Descriptive outcome of the unluck layers for one step. Not stored state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UnluckResult {
    pub unluck_applied: bool,
    /// `1.0` means no effect.
    pub luck_factor: f64,
    pub message: Option<String>,
    pub perfect_storm: bool,
}

impl UnluckResult {
    pub fn none() -> Self {
        Self {
            unluck_applied: false,
            luck_factor: 1.0,
            message: None,
            perfect_storm: false,
        }
    }
}

impl Default for UnluckResult {
    fn default() -> Self {
        Self::none()
    }
}

/// Caller overrides for the unluck layers (testing and tuning).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct UnluckOptions {
    /// Trigger regular unluck without rolling.
    pub force_unluck: bool,
    /// Trigger the Perfect Storm without rolling (still requires eligibility).
    pub force_perfect_storm: bool,
    /// Use this luck factor instead of drawing one.
    pub unluck_factor_override: Option<f64>,
}

/// Result of one meter update that went through the unluck layers.
#[derive(Debug, Clone, PartialEq)]
pub struct MeterUpdate {
    pub meter_state: MeterState,
    pub unluck_result: UnluckResult,
}
