use std::time::Duration;

use async_trait::async_trait;
use keeper_core::model::{ConfirmationOutcome, RemoteState};
use keeper_core::RemoteError;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::abi::{self, format_hex_prefixed, parse_hex_prefixed};
use super::rpc::{RpcClient, RpcError};
use super::tx::{format_address, Address, LegacyTransaction, Signer};
use super::RemoteStateClient;

/// Tuning knobs for [`ContractClient`].
#[derive(Debug, Clone)]
pub struct ContractClientOptions {
    /// Delay between `eth_getTransactionReceipt` polls.
    pub receipt_poll_interval: Duration,
    /// Extra gas on top of `eth_estimateGas`, in percent.
    pub gas_buffer_percent: u64,
}

impl Default for ContractClientOptions {
    fn default() -> Self {
        Self {
            receipt_poll_interval: Duration::from_secs(2),
            gas_buffer_percent: 20,
        }
    }
}

/// JSON-RPC backed client bound to one lottery contract and one signer.
pub struct ContractClient {
    rpc: RpcClient,
    contract: Address,
    contract_hex: String,
    signer: Signer,
    from_hex: String,
    chain_id: OnceCell<u64>,
    options: ContractClientOptions,
}

impl ContractClient {
    pub fn new(rpc: RpcClient, contract: Address, signer: Signer, options: ContractClientOptions) -> Self {
        let contract_hex = format_address(&contract);
        let from_hex = format_address(signer.address());
        Self {
            rpc,
            contract,
            contract_hex,
            signer,
            from_hex,
            chain_id: OnceCell::new(),
            options,
        }
    }

    /// Address the upkeep transactions are sent from.
    pub fn signer_address(&self) -> &str {
        &self.from_hex
    }

    pub fn contract_address(&self) -> &str {
        &self.contract_hex
    }

    async fn call_view(&self, data: &[u8]) -> Result<Vec<u8>, RemoteError> {
        let out = self
            .rpc
            .call(&self.contract_hex, &format_hex_prefixed(data))
            .await?;
        Ok(parse_hex_prefixed(&out)?)
    }

    async fn read_u64(&self, signature: &str) -> Result<u64, RemoteError> {
        let out = self.call_view(&abi::encode_no_args(signature)).await?;
        Ok(abi::decode_u64_word(&out, 0)?)
    }

    async fn chain_id(&self) -> Result<u64, RemoteError> {
        self.chain_id
            .get_or_try_init(|| async {
                let id = self.rpc.chain_id().await?;
                info!(chain_id = id, "resolved chain id");
                Ok::<_, RemoteError>(id)
            })
            .await
            .copied()
    }

    async fn poll_receipt(&self, tx: &str) -> Result<ConfirmationOutcome, RemoteError> {
        loop {
            match self.rpc.transaction_receipt(tx).await {
                Ok(Some(receipt)) => {
                    return if receipt.succeeded()? {
                        Ok(ConfirmationOutcome::Confirmed)
                    } else {
                        Ok(ConfirmationOutcome::Reverted)
                    };
                }
                Ok(None) => debug!(tx, "receipt not available yet"),
                Err(e) => warn!(tx, error = %e, "receipt poll failed"),
            }
            tokio::time::sleep(self.options.receipt_poll_interval).await;
        }
    }
}

/// On the write path a JSON-RPC error object means the node refused the transaction.
fn rejection(e: RpcError) -> RemoteError {
    match e {
        RpcError::Rpc { .. } => RemoteError::rejected(e),
        other => other.into(),
    }
}

#[async_trait]
impl RemoteStateClient for ContractClient {
    async fn read_fields(&self) -> Result<RemoteState, RemoteError> {
        let (last_transition_timestamp, interval) = tokio::try_join!(
            self.read_u64(abi::LAST_DRAW_TIMESTAMP),
            self.read_u64(abi::INTERVAL),
        )?;
        if interval == 0 {
            return Err(RemoteError::protocol("contract reported a zero interval"));
        }
        Ok(RemoteState {
            last_transition_timestamp,
            interval,
        })
    }

    async fn is_due(&self) -> Result<bool, RemoteError> {
        let out = self
            .call_view(&abi::encode_empty_bytes_arg(abi::CHECK_UPKEEP))
            .await?;
        Ok(abi::decode_bool_word(&out, 0)?)
    }

    async fn submit(&self) -> Result<String, RemoteError> {
        let data = abi::encode_empty_bytes_arg(abi::PERFORM_UPKEEP);
        let data_hex = format_hex_prefixed(&data);

        let chain_id = self.chain_id().await?;
        let (nonce, gas_price) =
            tokio::try_join!(self.rpc.pending_nonce(&self.from_hex), self.rpc.gas_price())?;
        let estimate = self
            .rpc
            .estimate_gas(&self.from_hex, &self.contract_hex, &data_hex)
            .await
            .map_err(rejection)?;
        let gas_limit =
            estimate.saturating_add(estimate.saturating_mul(self.options.gas_buffer_percent) / 100);

        let tx = LegacyTransaction {
            nonce,
            gas_price,
            gas_limit,
            to: self.contract,
            value: 0,
            data,
            chain_id,
        };
        let raw = self.signer.sign(&tx).map_err(RemoteError::protocol)?;
        debug!(nonce, gas_price, gas_limit, "broadcasting performUpkeep");

        let hash = self
            .rpc
            .send_raw_transaction(&format_hex_prefixed(&raw))
            .await
            .map_err(rejection)?;
        Ok(hash)
    }

    async fn await_confirmation(
        &self,
        tx: &str,
        timeout: Duration,
    ) -> Result<ConfirmationOutcome, RemoteError> {
        match tokio::time::timeout(timeout, self.poll_receipt(tx)).await {
            Ok(outcome) => outcome,
            Err(_) => Ok(ConfirmationOutcome::TimedOut),
        }
    }
}
