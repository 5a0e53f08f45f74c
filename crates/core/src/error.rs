//! Errors raised by calls against the remote contract.

use thiserror::Error;

/// Failure of a call against the remote contract.
///
/// Every variant is treated as transient by the periodic tasks: it is logged
/// and the next tick tries again.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    /// Transport failure or node-side error while reading.
    #[error("remote unavailable: {0}")]
    Unavailable(String),
    /// The node answered with something we could not interpret.
    #[error("remote protocol error: {0}")]
    Protocol(String),
    /// The node refused the submission (revert on estimate, nonce conflict, funds).
    #[error("remote rejected submission: {0}")]
    Rejected(String),
}

impl RemoteError {
    /// Shorthand for [`RemoteError::Unavailable`].
    pub fn unavailable<E: std::fmt::Display>(e: E) -> Self {
        Self::Unavailable(e.to_string())
    }
    /// Shorthand for [`RemoteError::Protocol`].
    pub fn protocol<E: std::fmt::Display>(e: E) -> Self {
        Self::Protocol(e.to_string())
    }
    /// Shorthand for [`RemoteError::Rejected`].
    pub fn rejected<E: std::fmt::Display>(e: E) -> Self {
        Self::Rejected(e.to_string())
    }
}
