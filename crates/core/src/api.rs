//! Wire shapes served by the status API.

use serde::{Deserialize, Serialize};

use crate::model::{EpochSecs, StatusSnapshot};

/// Body of `GET /api/status`.
///
/// Field names follow what the browser front end already consumes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    /// Seconds until the next draw.
    pub time_left: u64,
    /// The draw is due or underway.
    pub is_drawing: bool,
    /// When the contract fields were read.
    pub observed_at: EpochSecs,
}

impl From<StatusSnapshot> for StatusResponse {
    fn from(snap: StatusSnapshot) -> Self {
        Self {
            time_left: snap.time_left_seconds,
            is_drawing: snap.is_drawing,
            observed_at: snap.observed_at,
        }
    }
}

/// Error body returned by the status server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    /// Human-readable reason.
    pub error: String,
}
