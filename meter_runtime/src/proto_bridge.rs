//! Proto ↔ engine conversion bridge.
//!
//! Lossless in both directions: deltas and luck factors travel as
//! doubles, so a replayed input is bit-identical to the one logged.

use thiserror::Error;

use meter_engine::domain::{Delta, UnluckOptions};
use meter_engine::run::StepInput;
use meter_engine::ENGINE_VERSION;

use crate::proto_types::*;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("frame {0} has no payload")]
    MissingKind(u64),
    #[error("frame {sequence}: expected {expected}")]
    UnexpectedKind { sequence: u64, expected: &'static str },
    #[error("frame {0}: step input has no delta")]
    MissingDelta(u64),
    #[error("frame {sequence}: {source}")]
    InvalidChoice {
        sequence: u64,
        source: meter_engine::EngineError,
    },
    #[error("frame {sequence}: step id {step_id} does not fit a step")]
    StepIdOutOfRange { sequence: u64, step_id: u32 },
}

/// Header frame written once, when a run's log is created.
pub fn run_started_frame(seed: i64, start_time: u64) -> ProtoFrame {
    ProtoFrame {
        sequence: 0,
        kind: Some(FrameKind::RunStarted(ProtoRunStarted {
            seed,
            engine_version: ENGINE_VERSION,
            start_time,
        })),
    }
}

pub fn input_to_frame(input: &StepInput) -> ProtoFrame {
    let d = &input.delta;
    ProtoFrame {
        sequence: u64::from(input.step_id),
        kind: Some(FrameKind::StepPlayed(ProtoStepInput {
            step_id: u32::from(input.step_id),
            choice: input.choice.as_str().to_string(),
            delta: Some(ProtoDelta {
                r: d.r,
                u: d.u,
                s: d.s,
                c: d.c,
                i: d.i,
            }),
            force_unluck: input.options.force_unluck,
            force_perfect_storm: input.options.force_perfect_storm,
            unluck_factor_override: input.options.unluck_factor_override,
        })),
    }
}

/// Read the header frame.
pub fn frame_to_run_started(frame: &ProtoFrame) -> Result<&ProtoRunStarted, BridgeError> {
    match frame.kind.as_ref() {
        Some(FrameKind::RunStarted(header)) => Ok(header),
        Some(_) => Err(BridgeError::UnexpectedKind {
            sequence: frame.sequence,
            expected: "run_started",
        }),
        None => Err(BridgeError::MissingKind(frame.sequence)),
    }
}

pub fn frame_to_input(frame: &ProtoFrame) -> Result<StepInput, BridgeError> {
    let step = match frame.kind.as_ref() {
        Some(FrameKind::StepPlayed(step)) => step,
        Some(_) => {
            return Err(BridgeError::UnexpectedKind {
                sequence: frame.sequence,
                expected: "step_played",
            })
        }
        None => return Err(BridgeError::MissingKind(frame.sequence)),
    };

    let step_id = u8::try_from(step.step_id).map_err(|_| BridgeError::StepIdOutOfRange {
        sequence: frame.sequence,
        step_id: step.step_id,
    })?;
    let choice = step
        .choice
        .parse()
        .map_err(|source| BridgeError::InvalidChoice {
            sequence: frame.sequence,
            source,
        })?;
    let d = step
        .delta
        .as_ref()
        .ok_or(BridgeError::MissingDelta(frame.sequence))?;

    Ok(StepInput {
        step_id,
        choice,
        delta: Delta::new(d.r, d.u, d.s, d.c, d.i),
        options: UnluckOptions {
            force_unluck: step.force_unluck,
            force_perfect_storm: step.force_perfect_storm,
            unluck_factor_override: step.unluck_factor_override,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use meter_engine::domain::Choice;
    use prost::Message;

    #[test]
    fn step_input_survives_wire_encoding() {
        let input = StepInput::new(4, Choice::B, Delta::new(0.1, -3.0, 15.0, 2.5, -10.0))
            .with_options(UnluckOptions {
                force_unluck: true,
                force_perfect_storm: false,
                unluck_factor_override: Some(0.55),
            });
        let bytes = input_to_frame(&input).encode_to_vec();
        let frame = ProtoFrame::decode(bytes.as_slice()).unwrap();
        assert_eq!(frame.sequence, 4);
        assert_eq!(frame_to_input(&frame).unwrap(), input);
    }

    #[test]
    fn absent_factor_override_stays_absent() {
        let input = StepInput::new(1, Choice::A, Delta::ZERO);
        let bytes = input_to_frame(&input).encode_to_vec();
        let frame = ProtoFrame::decode(bytes.as_slice()).unwrap();
        assert_eq!(frame_to_input(&frame).unwrap().options.unluck_factor_override, None);
    }

    #[test]
    fn header_is_not_a_step() {
        let frame = run_started_frame(42, 0);
        assert!(matches!(
            frame_to_input(&frame),
            Err(BridgeError::UnexpectedKind { expected: "step_played", .. })
        ));
        assert_eq!(frame_to_run_started(&frame).unwrap().seed, 42);
    }

    #[test]
    fn bad_choice_is_reported() {
        let mut frame = input_to_frame(&StepInput::new(2, Choice::A, Delta::ZERO));
        if let Some(FrameKind::StepPlayed(step)) = frame.kind.as_mut() {
            step.choice = "Z".to_string();
        }
        assert!(matches!(
            frame_to_input(&frame),
            Err(BridgeError::InvalidChoice { sequence: 2, .. })
        ));
    }
}
