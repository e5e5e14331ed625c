//! Tier classification over the 0–100 display value.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Ordered qualitative bands. Declaration order is tier order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Tier {
    Crash,
    FindingFit,
    GainingSteam,
    ScalingUp,
    Breakout,
}

/// Lower bound of every tier above `Crash`, ascending.
const THRESHOLDS: [(f64, Tier); 4] = [
    (30.0, Tier::FindingFit),
    (50.0, Tier::GainingSteam),
    (70.0, Tier::ScalingUp),
    (85.0, Tier::Breakout),
];

impl Tier {
    pub const ALL: [Tier; 5] = [
        Tier::Crash,
        Tier::FindingFit,
        Tier::GainingSteam,
        Tier::ScalingUp,
        Tier::Breakout,
    ];

    /// Clamp to `[0, 100]`, then pick the highest tier whose lower bound
    /// the value reaches.
    pub fn classify(value: f64) -> Tier {
        let v = if value.is_nan() { 0.0 } else { value.clamp(0.0, 100.0) };
        THRESHOLDS
            .iter()
            .rev()
            .find(|(lower, _)| v >= *lower)
            .map(|(_, tier)| *tier)
            .unwrap_or(Tier::Crash)
    }

    pub fn label(self) -> &'static str {
        match self {
            Tier::Crash => "crash",
            Tier::FindingFit => "finding-fit",
            Tier::GainingSteam => "gaining-steam",
            Tier::ScalingUp => "scaling-up",
            Tier::Breakout => "breakout",
        }
    }

    /// 0 for `Crash` through 4 for `Breakout`.
    pub fn ordinal(self) -> usize {
        self as usize
    }

    /// Inclusive integer display range of the tier.
    pub fn range(self) -> (u8, u8) {
        match self {
            Tier::Crash => (0, 29),
            Tier::FindingFit => (30, 49),
            Tier::GainingSteam => (50, 69),
            Tier::ScalingUp => (70, 84),
            Tier::Breakout => (85, 100),
        }
    }

    /// Title of the ending reached when a run finishes in this tier.
    pub fn ending_title(self) -> &'static str {
        match self {
            Tier::Crash => "Lights Out",
            Tier::FindingFit => "Back to the Whiteboard",
            Tier::GainingSteam => "Steady Climb",
            Tier::ScalingUp => "Series B Bound",
            Tier::Breakout => "Rocket Ship",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Convenience wrapper for [`Tier::classify`].
pub fn tier(value: f64) -> Tier {
    Tier::classify(value)
}

/// Whether `before` and `after` fall in different tiers.
///
/// Notification hint only; not part of meter state.
pub fn crosses_tier_boundary(before: f64, after: f64) -> bool {
    Tier::classify(before) != Tier::classify(after)
}
