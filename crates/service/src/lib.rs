//! Keyless permanent uploads over JSON-RPC.
//!
//! A caller sends an EVM private key (or a storage-network JWK), a funding
//! plan and a base64 payload. The service:
//!
//! 1. derives a deterministic RSA identity from the key
//! 2. reads that identity's balance
//! 3. when it is low, swaps native POL to wrapped AR and bridges it across
//! 4. signs the payload as a data transaction and submits it
//!
//! The pipeline lives in [`orchestrator`]. Every external system sits behind
//! a trait ([`Ledger`], [`SwapExecutor`], [`Bridge`]) with a live client and
//! an in-memory double for tests.
//!
//! ## Example Usage
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use permakey_service::funding::{Funder, MemoryBridge, MemorySwap, SwapOutcome};
//! use permakey_service::ledger::MemoryLedger;
//! use permakey_service::orchestrator::{Orchestrator, Settings};
//!
//! let funder = Funder::new(
//!     MemorySwap::new(SwapOutcome::Confirm),
//!     MemoryBridge::new(),
//!     Duration::from_secs(5),
//! );
//! let state = Arc::new(Orchestrator::new(MemoryLedger::new(), funder, Settings::default()));
//! let _router = permakey_service::http::router(state, tracing::Level::INFO);
//! ```

use std::sync::Arc;

pub mod config;
pub mod error;
pub mod funding;
pub mod http;
pub mod ledger;
pub mod orchestrator;
pub mod process;
pub mod publisher;

pub use config::{Args, Config, ConfigError};
pub use error::{ErrorKind, RequestError};
pub use funding::{Bridge, Funder, SwapExecutor};
pub use ledger::Ledger;
pub use orchestrator::{Orchestrator, Settings};

use funding::{EverpayBridge, RouterSwapExecutor};
use ledger::GatewayClient;

/// The pipeline wired to live services.
pub type LiveOrchestrator = Orchestrator<GatewayClient, RouterSwapExecutor, EverpayBridge>;

/// Builds the live pipeline described by `config`.
pub fn from_config(config: &Config) -> Result<Arc<LiveOrchestrator>, ConfigError> {
    let ledger = GatewayClient::new(&config.gateway_url, config.http_timeout)
        .map_err(|e| ConfigError::Client(e.to_string()))?;
    let bridge = EverpayBridge::new(&config.bridge_url, config.http_timeout)
        .map_err(|e| ConfigError::Client(e.to_string()))?;
    let swap = RouterSwapExecutor::new(
        config.polygon_rpc_url.clone(),
        config.router,
        config.swap_path.clone(),
    );

    let funder = Funder::new(swap, bridge, config.swap_timeout);
    Ok(Arc::new(Orchestrator::new(
        ledger,
        funder,
        config.settings.clone(),
    )))
}
