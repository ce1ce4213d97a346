//! Maps the session's elapsed-time signal onto the schedule's step sequence.
//!
//! The active step at time `t` is the last step whose timestamp has been
//! reached, held until the next timestamp is reached. `resolve` is a pure
//! function of the latest elapsed sample, so clock ticks may arrive late or
//! coalesced without a transition ever firing twice or out of order.

use crate::error::{Error, Result};
use crate::models::ModulationStep;

/// Outcome of resolving an elapsed-time sample against a schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepResolution {
    pub index: usize,
    /// True when `index` differs from the previously applied step. Callers
    /// apply side effects only when this is set.
    pub changed: bool,
}

/// Selects the largest index whose timestamp is at or before `elapsed_sec`.
///
/// Steps sharing a timestamp resolve to the highest index among them (last
/// one defined takes effect); schedules are external input and may contain
/// duplicates. Elapsed time past the final timestamp keeps returning the
/// final index. `NoActiveStep` only fires when even the first step lies in
/// the future, which a validated schedule rules out.
pub fn resolve(
    steps: &[ModulationStep],
    elapsed_sec: f64,
    last_index: Option<usize>,
) -> Result<StepResolution> {
    for (i, step) in steps.iter().enumerate().rev() {
        if step.timestamp_sec <= elapsed_sec {
            return Ok(StepResolution {
                index: i,
                changed: last_index != Some(i),
            });
        }
    }
    Err(Error::NoActiveStep { elapsed_sec })
}
