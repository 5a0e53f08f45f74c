//! Everything that talks to the chain.

pub mod abi;
mod contract;
pub mod rpc;
pub mod tx;

use std::time::Duration;

use async_trait::async_trait;
use keeper_core::model::{ConfirmationOutcome, RemoteState};
use keeper_core::RemoteError;

pub use contract::{ContractClient, ContractClientOptions};

/// The only capabilities the keeper has against the lottery contract.
///
/// Reads are side-effect free and may run concurrently. `submit` and
/// `await_confirmation` are only ever driven by the keeper loop, which
/// guarantees they never overlap with themselves.
#[async_trait]
pub trait RemoteStateClient: Send + Sync {
    /// Read `lastDrawTimestamp` and `interval`.
    async fn read_fields(&self) -> Result<RemoteState, RemoteError>;

    /// Evaluate the contract's own `checkUpkeep` predicate.
    async fn is_due(&self) -> Result<bool, RemoteError>;

    /// Broadcast one `performUpkeep` transaction and return its hash.
    async fn submit(&self) -> Result<String, RemoteError>;

    /// Wait until `tx` is finalized or `timeout` elapses.
    async fn await_confirmation(
        &self,
        tx: &str,
        timeout: Duration,
    ) -> Result<ConfirmationOutcome, RemoteError>;
}
