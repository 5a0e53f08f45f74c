use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use keeper_core::RemoteError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

static RPC_ID: AtomicU64 = AtomicU64::new(1);

/// Transport-level failure of one JSON-RPC call.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("transport: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("HTTP {status} from node")]
    Http { status: u16 },
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("response carried no result")]
    MissingResult,
    #[error("malformed response: {0}")]
    Decode(String),
}

impl From<RpcError> for RemoteError {
    fn from(e: RpcError) -> Self {
        match e {
            RpcError::Transport(_) | RpcError::Http { .. } | RpcError::Rpc { .. } => {
                RemoteError::unavailable(e)
            }
            RpcError::MissingResult | RpcError::Decode(_) => RemoteError::protocol(e),
        }
    }
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a, T> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: T,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// Minimal JSON-RPC 2.0 client over HTTP.
#[derive(Clone)]
pub struct RpcClient {
    url: String,
    client: reqwest::Client,
}

impl RpcClient {
    /// Every request issued through this client is bounded by `timeout`.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, RpcError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }

    /// Call `method`; a `null` result is returned as `None`.
    pub async fn request_optional<P, R>(&self, method: &str, params: P) -> Result<Option<R>, RpcError>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let id = RPC_ID.fetch_add(1, Ordering::Relaxed);
        let payload = JsonRpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };

        let response = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RpcError::Http {
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await?;
        let body: JsonRpcResponse<R> =
            serde_json::from_slice(&bytes).map_err(|e| RpcError::Decode(e.to_string()))?;
        if let Some(error) = body.error {
            return Err(RpcError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        Ok(body.result)
    }

    pub async fn request<P, R>(&self, method: &str, params: P) -> Result<R, RpcError>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        self.request_optional(method, params)
            .await?
            .ok_or(RpcError::MissingResult)
    }

    pub async fn chain_id(&self) -> Result<u64, RpcError> {
        let result: String = self.request("eth_chainId", Vec::<serde_json::Value>::new()).await?;
        parse_quantity(&result).and_then(quantity_to_u64)
    }

    pub async fn gas_price(&self) -> Result<u128, RpcError> {
        let result: String = self.request("eth_gasPrice", Vec::<serde_json::Value>::new()).await?;
        parse_quantity(&result)
    }

    pub async fn pending_nonce(&self, address: &str) -> Result<u64, RpcError> {
        let result: String = self
            .request("eth_getTransactionCount", (address, "pending"))
            .await?;
        parse_quantity(&result).and_then(quantity_to_u64)
    }

    pub async fn call(&self, to: &str, data: &str) -> Result<String, RpcError> {
        let tx = CallRequest { from: None, to, data };
        self.request("eth_call", (tx, "latest")).await
    }

    pub async fn estimate_gas(&self, from: &str, to: &str, data: &str) -> Result<u64, RpcError> {
        let tx = CallRequest {
            from: Some(from),
            to,
            data,
        };
        let result: String = self.request("eth_estimateGas", [tx]).await?;
        parse_quantity(&result).and_then(quantity_to_u64)
    }

    pub async fn send_raw_transaction(&self, raw_tx: &str) -> Result<String, RpcError> {
        self.request("eth_sendRawTransaction", [raw_tx]).await
    }

    /// `None` while the transaction is still pending.
    pub async fn transaction_receipt(&self, tx_hash: &str) -> Result<Option<Receipt>, RpcError> {
        self.request_optional("eth_getTransactionReceipt", [tx_hash])
            .await
    }
}

#[derive(Debug, Serialize)]
struct CallRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    from: Option<&'a str>,
    to: &'a str,
    data: &'a str,
}

/// The subset of a transaction receipt the keeper cares about.
#[derive(Debug, Clone, Deserialize)]
pub struct Receipt {
    /// `0x1` success, `0x0` reverted.
    pub status: Option<String>,
}

impl Receipt {
    pub fn succeeded(&self) -> Result<bool, RpcError> {
        let status = self
            .status
            .as_deref()
            .ok_or_else(|| RpcError::Decode("receipt has no status".into()))?;
        Ok(parse_quantity(status)? == 1)
    }
}

/// Parse a hex `QUANTITY` (`0x` prefixed, no leading zeros required).
pub fn parse_quantity(input: &str) -> Result<u128, RpcError> {
    let raw = input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
        .ok_or_else(|| RpcError::Decode(format!("quantity without 0x prefix: {input}")))?;
    if raw.is_empty() {
        return Err(RpcError::Decode("empty quantity".into()));
    }
    u128::from_str_radix(raw, 16).map_err(|e| RpcError::Decode(format!("{input}: {e}")))
}

fn quantity_to_u64(value: u128) -> Result<u64, RpcError> {
    u64::try_from(value).map_err(|_| RpcError::Decode(format!("quantity {value} overflows u64")))
}
