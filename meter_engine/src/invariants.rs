//! Invariant checks for meter and run state.
//!
//! `validate_*` panics: a violation after an engine transition is a bug.
//! `try_validate_*` returns the first violation instead and is used when
//! restoring state from untrusted sources.

use crate::domain::MeterState;
use crate::meter::clamp_display;
use crate::run::{RunState, FINAL_STEP};
use crate::tier::Tier;

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Panics on the first meter-state violation.
pub fn validate_meter_state(state: &MeterState) {
    if let Err(msg) = try_validate_meter_state(state) {
        panic!("Invariant violation: {}", msg);
    }
}

/// Panics on the first run-state violation.
pub fn validate_run_state(run: &RunState) {
    if let Err(msg) = try_validate_run_state(run) {
        panic!("Invariant violation: {}", msg);
    }
}

pub fn try_validate_meter_state(state: &MeterState) -> Result<(), String> {
    check_display_range(state)?;
    check_display_rounding(state)?;
    check_tier_matches(state)?;
    check_finite_vectors(state)?;
    Ok(())
}

pub fn try_validate_run_state(run: &RunState) -> Result<(), String> {
    try_validate_meter_state(&run.meter_state)?;
    check_step_range(run)?;
    check_history_length(run)?;
    check_history_order(run)?;
    check_history_tail(run)?;
    check_end_time(run)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Meter checks
// ---------------------------------------------------------------------------

fn check_display_range(state: &MeterState) -> Result<(), String> {
    let v = state.display_value;
    if !(0.0..=100.0).contains(&v) {
        return Err(format!(
            "[INVARIANT:display_range] displayValue {} is outside [0, 100]",
            v
        ));
    }
    Ok(())
}

fn check_display_rounding(state: &MeterState) -> Result<(), String> {
    let v = state.display_value;
    if clamp_display(v) != v {
        return Err(format!(
            "[INVARIANT:display_rounding] displayValue {} is not rounded to one decimal",
            v
        ));
    }
    Ok(())
}

fn check_tier_matches(state: &MeterState) -> Result<(), String> {
    let expected = Tier::classify(state.display_value);
    if state.tier != expected {
        return Err(format!(
            "[INVARIANT:tier_matches] tier {} does not match displayValue {} (expected {})",
            state.tier, state.display_value, expected
        ));
    }
    Ok(())
}

fn check_finite_vectors(state: &MeterState) -> Result<(), String> {
    if !state.hidden_state.is_finite() {
        return Err("[INVARIANT:finite_state] hiddenState contains a non-finite value".to_string());
    }
    if let Some(d) = &state.last_delta {
        if !d.is_finite() {
            return Err("[INVARIANT:finite_state] lastDelta contains a non-finite value".to_string());
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Run checks
// ---------------------------------------------------------------------------

fn check_step_range(run: &RunState) -> Result<(), String> {
    if run.current_step < 1 || run.current_step > FINAL_STEP + 1 {
        return Err(format!(
            "[INVARIANT:step_range] currentStep {} is outside 1..={}",
            run.current_step,
            FINAL_STEP + 1
        ));
    }
    Ok(())
}

fn check_history_length(run: &RunState) -> Result<(), String> {
    let expected = usize::from(run.current_step.saturating_sub(1));
    if run.step_history.len() != expected {
        return Err(format!(
            "[INVARIANT:history_length] {} step records for currentStep {}",
            run.step_history.len(),
            run.current_step
        ));
    }
    Ok(())
}

fn check_history_order(run: &RunState) -> Result<(), String> {
    for (idx, record) in run.step_history.iter().enumerate() {
        let expected = idx + 1;
        if usize::from(record.step_id) != expected {
            return Err(format!(
                "[INVARIANT:history_order] record {} has stepId {}, expected {}",
                idx, record.step_id, expected
            ));
        }
    }
    Ok(())
}

fn check_history_tail(run: &RunState) -> Result<(), String> {
    if let Some(last) = run.step_history.last() {
        if last.display_after != run.meter_state.display_value {
            return Err(format!(
                "[INVARIANT:history_tail] last record displayAfter {} != meter displayValue {}",
                last.display_after, run.meter_state.display_value
            ));
        }
        if last.rng_state_after != run.rng_state {
            return Err(
                "[INVARIANT:history_tail] last record rngStateAfter does not match rngState"
                    .to_string(),
            );
        }
    }
    Ok(())
}

fn check_end_time(run: &RunState) -> Result<(), String> {
    if run.end_time.is_some() && !run.is_finished() {
        return Err(format!(
            "[INVARIANT:end_time] endTime set on an unfinished run at step {}",
            run.current_step
        ));
    }
    Ok(())
}
