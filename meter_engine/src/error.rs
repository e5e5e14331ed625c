//! Engine error taxonomy.
//!
//! Range errors come from the PRNG and surface unchanged through the
//! unluck and meter pipelines. Step errors come from the run engine.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// A draw was requested over an inverted (or NaN) range.
    #[error("{op}: invalid range, min {min} is greater than max {max}")]
    InvalidRange { op: &'static str, min: f64, max: f64 },

    #[error("step {got} is out of order, expected step {expected}")]
    StepOutOfOrder { expected: u8, got: u8 },

    #[error("run already finished after step {last_step}")]
    RunFinished { last_step: u8 },

    #[error("invalid choice {0:?}, expected \"A\" or \"B\"")]
    InvalidChoice(String),
}
