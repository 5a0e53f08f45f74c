use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use thiserror::Error;

use crate::chain::tx::{parse_address, Address, Signer};

/// Lottery contract the keeper was first deployed against.
pub const DEFAULT_CONTRACT_ADDRESS: &str = "0x8e6b0c11e3c98fcf40001269759083cf0d3ccbfb";

#[derive(Parser, Debug)]
#[command(name = "keeperd", version, about = "Draw keeper: triggers due lottery draws and serves the countdown")]
pub struct Args {
    /// Listen address for the status API, e.g. 127.0.0.1:5000
    #[arg(long, env = "KEEPER_LISTEN", default_value = "127.0.0.1:5000")]
    pub listen: SocketAddr,

    /// JSON-RPC endpoint of the chain node.
    #[arg(long, env = "SEPOLIA_RPC_URL")]
    pub rpc_url: String,

    /// Hex private key used to sign upkeep transactions.
    #[arg(long, env = "PRIVATE_KEY", hide_env_values = true)]
    pub private_key: String,

    /// Lottery contract address.
    #[arg(long, env = "CONTRACT_ADDRESS", default_value = DEFAULT_CONTRACT_ADDRESS)]
    pub contract_address: String,

    /// Seconds between `checkUpkeep` polls.
    #[arg(long, default_value_t = 60)]
    pub poll_interval_secs: u64,

    /// Give up waiting for a receipt after this many seconds.
    #[arg(long, default_value_t = 120)]
    pub confirmation_timeout_secs: u64,

    /// Pause after a timed out or reverted upkeep before polling again.
    #[arg(long, default_value_t = 30)]
    pub cooldown_secs: u64,

    /// Seconds between countdown refreshes for the status API.
    #[arg(long, default_value_t = 5)]
    pub status_refresh_secs: u64,

    /// Milliseconds between receipt polls while awaiting confirmation.
    #[arg(long, default_value_t = 2_000)]
    pub receipt_poll_ms: u64,

    /// Per-request timeout for JSON-RPC calls.
    #[arg(long, default_value_t = 15)]
    pub rpc_timeout_secs: u64,

    /// Extra gas added on top of the node's estimate, in percent.
    #[arg(long, default_value_t = 20)]
    pub gas_buffer_percent: u64,

    /// Log level (env-filter syntax).
    #[arg(long, default_value = "info")]
    pub log: String,
}

/// Startup configuration problems. All of them are fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid rpc url {url:?}: {reason}")]
    InvalidRpcUrl { url: String, reason: String },
    #[error("invalid contract address {address:?}: {reason}")]
    InvalidContractAddress { address: String, reason: String },
    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),
    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
}

/// Holds the raw key text so it never reaches a log line.
#[derive(Clone)]
pub struct SecretKey(String);

impl SecretKey {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(<redacted>)")
    }
}

/// Validated configuration, built once at startup and handed to each component.
#[derive(Debug, Clone)]
pub struct KeeperConfig {
    pub listen: SocketAddr,
    pub rpc_url: reqwest::Url,
    pub private_key: SecretKey,
    pub contract_address: Address,

    pub poll_interval: Duration,
    pub confirmation_timeout: Duration,
    pub cooldown: Duration,
    pub status_refresh: Duration,
    pub receipt_poll: Duration,
    pub rpc_timeout: Duration,
    pub gas_buffer_percent: u64,
}

impl KeeperConfig {
    pub fn from_args(args: &Args) -> Result<Self, ConfigError> {
        let rpc_url = reqwest::Url::parse(&args.rpc_url).map_err(|e| ConfigError::InvalidRpcUrl {
            url: args.rpc_url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(rpc_url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidRpcUrl {
                url: args.rpc_url.clone(),
                reason: format!("unsupported scheme {}", rpc_url.scheme()),
            });
        }

        let contract_address = parse_address(&args.contract_address).map_err(|reason| {
            ConfigError::InvalidContractAddress {
                address: args.contract_address.clone(),
                reason,
            }
        })?;

        // Parse once here so a bad key stops startup instead of the first submission.
        Signer::from_hex(&args.private_key).map_err(|e| ConfigError::InvalidPrivateKey(e.to_string()))?;

        Ok(Self {
            listen: args.listen,
            rpc_url,
            private_key: SecretKey::new(args.private_key.clone()),
            contract_address,
            poll_interval: secs("poll-interval-secs", args.poll_interval_secs)?,
            confirmation_timeout: secs("confirmation-timeout-secs", args.confirmation_timeout_secs)?,
            cooldown: secs("cooldown-secs", args.cooldown_secs)?,
            status_refresh: secs("status-refresh-secs", args.status_refresh_secs)?,
            receipt_poll: nonzero("receipt-poll-ms", args.receipt_poll_ms).map(Duration::from_millis)?,
            rpc_timeout: secs("rpc-timeout-secs", args.rpc_timeout_secs)?,
            gas_buffer_percent: args.gas_buffer_percent,
        })
    }

    pub fn signer(&self) -> Result<Signer, ConfigError> {
        Signer::from_hex(self.private_key.expose())
            .map_err(|e| ConfigError::InvalidPrivateKey(e.to_string()))
    }
}

fn nonzero(name: &'static str, value: u64) -> Result<u64, ConfigError> {
    if value == 0 {
        Err(ConfigError::ZeroDuration(name))
    } else {
        Ok(value)
    }
}

fn secs(name: &'static str, value: u64) -> Result<Duration, ConfigError> {
    nonzero(name, value).map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "0x4646464646464646464646464646464646464646464646464646464646464646";

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec![
            "keeperd",
            "--rpc-url",
            "https://rpc.example.org/v1",
            "--private-key",
            KEY,
        ];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).expect("args parse")
    }

    #[test]
    fn defaults_match_the_documented_cadence() {
        let cfg = KeeperConfig::from_args(&args(&[])).unwrap();
        assert_eq!(cfg.poll_interval, Duration::from_secs(60));
        assert_eq!(cfg.confirmation_timeout, Duration::from_secs(120));
        assert_eq!(cfg.cooldown, Duration::from_secs(30));
        assert_eq!(cfg.status_refresh, Duration::from_secs(5));
        assert_eq!(cfg.receipt_poll, Duration::from_millis(2_000));
        assert_eq!(
            crate::chain::tx::format_address(&cfg.contract_address),
            DEFAULT_CONTRACT_ADDRESS
        );
    }

    #[test]
    fn debug_output_redacts_the_key() {
        let cfg = KeeperConfig::from_args(&args(&[])).unwrap();
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("46464646"));
        assert!(rendered.contains("redacted"));
    }

    #[test]
    fn rejects_malformed_endpoint() {
        let mut a = args(&[]);
        a.rpc_url = "not a url".into();
        assert!(matches!(
            KeeperConfig::from_args(&a),
            Err(ConfigError::InvalidRpcUrl { .. })
        ));

        a.rpc_url = "ftp://node.example.org".into();
        assert!(matches!(
            KeeperConfig::from_args(&a),
            Err(ConfigError::InvalidRpcUrl { .. })
        ));
    }

    #[test]
    fn rejects_bad_key_and_address() {
        let mut a = args(&[]);
        a.private_key = "0xdeadbeef".into();
        assert!(matches!(
            KeeperConfig::from_args(&a),
            Err(ConfigError::InvalidPrivateKey(_))
        ));

        let a = args(&["--contract-address", "0x1234"]);
        assert!(matches!(
            KeeperConfig::from_args(&a),
            Err(ConfigError::InvalidContractAddress { .. })
        ));
    }

    #[test]
    fn rejects_zero_durations() {
        let a = args(&["--cooldown-secs", "0"]);
        assert!(matches!(
            KeeperConfig::from_args(&a),
            Err(ConfigError::ZeroDuration("cooldown-secs"))
        ));
    }
}
