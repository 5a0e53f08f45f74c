//! Domain types shared by the keeper loop and the status side.

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix epoch seconds.
pub type EpochSecs = u64;

/// The two numeric fields the keeper reads from the lottery contract.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemoteState {
    /// `lastDrawTimestamp()`: when the last draw completed.
    pub last_transition_timestamp: EpochSecs,
    /// `interval()`: seconds between draws. Always non-zero.
    pub interval: u64,
}

/// Where the keeper loop currently is.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum KeeperPhase {
    /// Polling the due predicate on every tick.
    Idle,
    /// Building and broadcasting the upkeep transaction.
    Submitting,
    /// Transaction broadcast; waiting for a receipt.
    AwaitingConfirmation,
    /// Last attempt timed out or reverted; ticks are ignored until the cooldown ends.
    Cooling,
}

/// Lifecycle of a single submission attempt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    /// Still being submitted or awaiting its receipt.
    Pending,
    /// Mined with a success status.
    Confirmed,
    /// Not broadcast, reverted, or abandoned after the timeout.
    Failed,
}

/// How a wait on a broadcast transaction ended.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationOutcome {
    /// Receipt with a success status.
    Confirmed,
    /// No receipt before the deadline.
    TimedOut,
    /// Receipt with a failure status.
    Reverted,
}

/// The one in-flight submission owned by the keeper loop.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubmissionAttempt {
    /// Correlates the attempt across log lines.
    pub id: Ulid,
    /// When the keeper decided to submit.
    pub started_at: EpochSecs,
    /// Final once the attempt is resolved.
    pub status: SubmissionStatus,
    /// Transaction hash, once the node accepted the broadcast.
    pub tx_identifier: Option<String>,
}

impl SubmissionAttempt {
    /// Fresh pending attempt with no transaction yet.
    pub fn pending(id: Ulid, started_at: EpochSecs) -> Self {
        Self {
            id,
            started_at,
            status: SubmissionStatus::Pending,
            tx_identifier: None,
        }
    }
}

/// Derived countdown served to status consumers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusSnapshot {
    /// Seconds until the next draw is due, clamped at zero.
    pub time_left_seconds: u64,
    /// True once the countdown has reached zero.
    pub is_drawing: bool,
    /// When the underlying fields were read.
    pub observed_at: EpochSecs,
}
