//! Hand-written protobuf types for the step log.
//!
//! Uses prost derive macros for encode/decode without prost-build.
//! Field numbers are part of the on-disk format. Never renumber.

use prost::Message;

// ── Frame ──────────────────────────────────────────────────────────

/// One length-prefixed record in a run's step log.
///
/// Sequence 0 is always `RunStarted`; sequence N is step N.
#[derive(Clone, PartialEq, Message)]
pub struct ProtoFrame {
    #[prost(uint64, tag = "1")]
    pub sequence: u64,
    #[prost(oneof = "FrameKind", tags = "2, 3")]
    pub kind: Option<FrameKind>,
}

#[derive(Clone, PartialEq, prost::Oneof)]
pub enum FrameKind {
    #[prost(message, tag = "2")]
    RunStarted(ProtoRunStarted),
    #[prost(message, tag = "3")]
    StepPlayed(ProtoStepInput),
}

// ── Payloads ───────────────────────────────────────────────────────

#[derive(Clone, PartialEq, Message)]
pub struct ProtoRunStarted {
    #[prost(sint64, tag = "1")]
    pub seed: i64,
    #[prost(uint32, tag = "2")]
    pub engine_version: u32,
    #[prost(uint64, tag = "3")]
    pub start_time: u64,
}

#[derive(Clone, PartialEq, Message)]
pub struct ProtoStepInput {
    #[prost(uint32, tag = "1")]
    pub step_id: u32,
    /// "A" or "B".
    #[prost(string, tag = "2")]
    pub choice: String,
    #[prost(message, optional, tag = "3")]
    pub delta: Option<ProtoDelta>,
    #[prost(bool, tag = "4")]
    pub force_unluck: bool,
    #[prost(bool, tag = "5")]
    pub force_perfect_storm: bool,
    #[prost(double, optional, tag = "6")]
    pub unluck_factor_override: Option<f64>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ProtoDelta {
    #[prost(double, tag = "1")]
    pub r: f64,
    #[prost(double, tag = "2")]
    pub u: f64,
    #[prost(double, tag = "3")]
    pub s: f64,
    #[prost(double, tag = "4")]
    pub c: f64,
    #[prost(double, tag = "5")]
    pub i: f64,
}
