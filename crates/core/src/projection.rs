//! Countdown derived from the contract fields.

use crate::model::{EpochSecs, RemoteState, StatusSnapshot};

/// Derive the countdown from the contract fields at `now`.
///
/// A chain timestamp ahead of the local clock counts as zero elapsed time, so
/// `time_left_seconds` never exceeds `interval`.
pub fn project(state: &RemoteState, now: EpochSecs) -> StatusSnapshot {
    let elapsed = now.saturating_sub(state.last_transition_timestamp);
    let time_left_seconds = state.interval.saturating_sub(elapsed);
    StatusSnapshot {
        time_left_seconds,
        is_drawing: time_left_seconds == 0,
        observed_at: now,
    }
}
