//! Service configuration
//!
//! Every setting is a command-line flag with an environment fallback. Raw
//! arguments ([`Args`]) are validated once at startup into a [`Config`].

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use alloy_primitives::{Address, B256};
use alloy_signer_local::PrivateKeySigner;
use clap::Parser;
use permakey_contracts::polygon;
use permakey_primitives::{DEFAULT_KEY_BITS, DEFAULT_SEED_LABEL, SourceSecret};
use permakey_tx::Winston;
use url::Url;

use crate::orchestrator::{DEFAULT_MAX_PAYLOAD_BYTES, Settings};

/// Command-line and environment arguments.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Address to serve JSON-RPC on
    #[arg(long, env = "PERMAKEY_LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    pub listen_addr: SocketAddr,

    /// Storage-network gateway
    #[arg(long, env = "PERMAKEY_GATEWAY_URL", default_value = "https://arweave.net")]
    pub gateway_url: Url,

    /// Polygon JSON-RPC endpoint
    #[arg(long, env = "PERMAKEY_POLYGON_RPC_URL", default_value = "https://polygon-rpc.com")]
    pub polygon_rpc_url: Url,

    /// everPay bridge endpoint
    #[arg(long, env = "PERMAKEY_BRIDGE_URL", default_value = "https://api.everpay.io/bridge")]
    pub bridge_url: Url,

    /// Swap router, defaults to QuickSwap
    #[arg(long, env = "PERMAKEY_ROUTER_ADDRESS")]
    pub router_address: Option<Address>,

    /// Token received from the swap, defaults to wrapped AR
    #[arg(long, env = "PERMAKEY_WRAPPED_AR_ADDRESS")]
    pub wrapped_ar_address: Option<Address>,

    /// Balance in AR below which a request funds its address
    #[arg(long, env = "PERMAKEY_BALANCE_THRESHOLD", default_value = "0.01")]
    pub balance_threshold: String,

    /// RSA modulus size for derived keys
    #[arg(long, env = "PERMAKEY_KEY_BITS", default_value_t = DEFAULT_KEY_BITS)]
    pub key_bits: usize,

    /// Salt for seed derivation
    #[arg(long, env = "PERMAKEY_SEED_LABEL", default_value = DEFAULT_SEED_LABEL)]
    pub seed_label: String,

    /// Hex private key paying for swaps when a request supplies its own JWK
    #[arg(long, env = "PERMAKEY_FUNDING_KEY", hide_env_values = true)]
    pub funding_key: Option<String>,

    /// Seconds allowed for seed derivation and key generation
    #[arg(long, env = "PERMAKEY_KEYGEN_TIMEOUT", default_value_t = 300)]
    pub keygen_timeout_secs: u64,

    /// Seconds to wait for a swap receipt
    #[arg(long, env = "PERMAKEY_SWAP_TIMEOUT", default_value_t = 180)]
    pub swap_timeout_secs: u64,

    /// Seconds allowed for each gateway or bridge request
    #[arg(long, env = "PERMAKEY_HTTP_TIMEOUT", default_value_t = 30)]
    pub http_timeout_secs: u64,

    /// Largest accepted payload in bytes, after base64 decoding
    #[arg(long, env = "PERMAKEY_MAX_PAYLOAD_BYTES", default_value_t = DEFAULT_MAX_PAYLOAD_BYTES)]
    pub max_payload_bytes: usize,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, env = "PERMAKEY_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Directory for daily rolling log files
    #[arg(long, env = "PERMAKEY_LOG_DIR")]
    pub log_dir: Option<PathBuf>,
}

/// Validated service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Listen address.
    pub listen_addr: SocketAddr,
    /// Storage-network gateway.
    pub gateway_url: Url,
    /// Polygon JSON-RPC endpoint.
    pub polygon_rpc_url: Url,
    /// Bridge endpoint.
    pub bridge_url: Url,
    /// Swap router.
    pub router: Address,
    /// Swap path, starting at the wrapped native token.
    pub swap_path: Vec<Address>,
    /// Pipeline tunables.
    pub settings: Settings,
    /// Deadline for swap receipts.
    pub swap_timeout: Duration,
    /// Deadline for each gateway or bridge request.
    pub http_timeout: Duration,
    /// Level for logs and request traces.
    pub log_level: tracing::Level,
    /// Directory for log files.
    pub log_dir: Option<PathBuf>,
}

/// Errors raised while validating [`Args`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The threshold is not a decimal AR amount.
    #[error("invalid balance threshold {0:?}")]
    Threshold(String),
    /// The funding key is not a usable private key.
    #[error("invalid funding key: {0}")]
    FundingKey(String),
    /// The log level is not recognized.
    #[error("invalid log level {0:?}")]
    LogLevel(String),
    /// A timeout of zero was given.
    #[error("{0} must be greater than zero")]
    ZeroTimeout(&'static str),
    /// A client could not be built.
    #[error("could not build client: {0}")]
    Client(String),
}

fn parse_funding_key(hex: &str) -> Result<PrivateKeySigner, ConfigError> {
    let secret = SourceSecret::from_hex(hex).map_err(|e| ConfigError::FundingKey(e.to_string()))?;
    PrivateKeySigner::from_bytes(&B256::from(*secret.as_bytes()))
        .map_err(|e| ConfigError::FundingKey(e.to_string()))
}

fn seconds(value: u64, name: &'static str) -> Result<Duration, ConfigError> {
    if value == 0 {
        return Err(ConfigError::ZeroTimeout(name));
    }
    Ok(Duration::from_secs(value))
}

impl Config {
    /// Validates `args`.
    pub fn from_args(args: Args) -> Result<Self, ConfigError> {
        let balance_threshold = Winston::from_ar(&args.balance_threshold)
            .map_err(|_| ConfigError::Threshold(args.balance_threshold.clone()))?;
        let funding_wallet = args
            .funding_key
            .as_deref()
            .map(parse_funding_key)
            .transpose()?;
        let log_level = args
            .log_level
            .parse()
            .map_err(|_| ConfigError::LogLevel(args.log_level.clone()))?;

        let wrapped_ar = args
            .wrapped_ar_address
            .unwrap_or(polygon::WRAPPED_AR_TOKEN.address);
        let swap_path = vec![polygon::WRAPPED_NATIVE_TOKEN.address, wrapped_ar];

        Ok(Self {
            listen_addr: args.listen_addr,
            gateway_url: args.gateway_url,
            polygon_rpc_url: args.polygon_rpc_url,
            bridge_url: args.bridge_url,
            router: args
                .router_address
                .unwrap_or(polygon::QUICKSWAP_ROUTER.address),
            swap_path,
            settings: Settings {
                key_bits: args.key_bits,
                seed_label: args.seed_label,
                keygen_timeout: seconds(args.keygen_timeout_secs, "keygen timeout")?,
                balance_threshold,
                funding_wallet,
                max_payload_bytes: args.max_payload_bytes,
            },
            swap_timeout: seconds(args.swap_timeout_secs, "swap timeout")?,
            http_timeout: seconds(args.http_timeout_secs, "http timeout")?,
            log_level,
            log_dir: args.log_dir,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["permakey"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_args(parse(&[])).unwrap();
        assert_eq!(config.settings.balance_threshold, Winston::from(10_000_000_000u64));
        assert_eq!(config.settings.key_bits, DEFAULT_KEY_BITS);
        assert_eq!(config.router, polygon::QUICKSWAP_ROUTER.address);
        assert_eq!(config.swap_path, polygon::swap_path());
        assert_eq!(config.log_level, tracing::Level::INFO);
        assert!(config.settings.funding_wallet.is_none());
    }

    #[test]
    fn test_funding_key() {
        let key = "0x0000000000000000000000000000000000000000000000000000000000000001";
        let config = Config::from_args(parse(&["--funding-key", key])).unwrap();
        let wallet = config.settings.funding_wallet.unwrap();
        assert_eq!(
            wallet.address(),
            "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf"
                .parse::<Address>()
                .unwrap()
        );

        let zero = "0x0000000000000000000000000000000000000000000000000000000000000000";
        assert!(matches!(
            Config::from_args(parse(&["--funding-key", zero])),
            Err(ConfigError::FundingKey(_))
        ));
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            Config::from_args(parse(&["--balance-threshold", "lots"])),
            Err(ConfigError::Threshold(_))
        ));
        assert!(matches!(
            Config::from_args(parse(&["--swap-timeout-secs", "0"])),
            Err(ConfigError::ZeroTimeout(_))
        ));
        assert!(matches!(
            Config::from_args(parse(&["--log-level", "loud"])),
            Err(ConfigError::LogLevel(_))
        ));
    }
}
