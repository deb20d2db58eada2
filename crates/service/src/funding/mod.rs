//! Funding a storage address from the EVM side
//!
//! Funding is a two-step, non-atomic sequence:
//!
//! 1. swap native tokens for wrapped AR through a DEX router
//! 2. ask the bridge to release AR to the storage address
//!
//! Once the swap is broadcast it cannot be taken back, so every failure carries
//! the [`FundingStage`] that was reached. Nothing is retried here; callers
//! decide what to do with a partially completed funding.
//!
//! ## Example Usage
//!
//! ```
//! use std::time::Duration;
//!
//! use alloy_primitives::U256;
//! use alloy_signer_local::PrivateKeySigner;
//! use permakey_primitives::StorageAddress;
//! use permakey_service::funding::{
//!     Funder, FundingPlan, MemoryBridge, MemorySwap, SwapOutcome,
//! };
//!
//! # tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap().block_on(async {
//! let funder = Funder::new(
//!     MemorySwap::new(SwapOutcome::Confirm),
//!     MemoryBridge::new(),
//!     Duration::from_secs(60),
//! );
//! let wallet = PrivateKeySigner::random();
//! let plan = FundingPlan::new(U256::from(10u64).pow(U256::from(18u64)), "0.5");
//!
//! let receipt = funder
//!     .fund(&wallet, &plan, &StorageAddress::default())
//!     .await
//!     .unwrap();
//! assert_eq!(receipt.bridge["status"], "ok");
//! # });
//! ```

use std::fmt;
use std::time::Duration;

use alloy_primitives::{TxHash, U256};
use alloy_signer_local::PrivateKeySigner;
use permakey_primitives::StorageAddress;
use permakey_tx::Winston;
use serde::Serialize;
use thiserror::Error;

pub mod bridge;
mod memory;
pub mod swap;

pub use bridge::{Bridge, BridgeError, EverpayBridge};
pub use memory::{MemoryBridge, MemorySwap, SwapOutcome};
pub use swap::{RouterSwapExecutor, SwapError, SwapExecutor};

/// Returns true when `balance` is below `threshold`.
pub fn needs_funding(balance: Winston, threshold: Winston) -> bool {
    balance < threshold
}

/// How far a funding attempt got.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "stage", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum FundingStage {
    /// Nothing has left the process.
    NotStarted,
    /// The swap was sent but is not known to have succeeded.
    SwapBroadcast {
        /// Hash of the swap transaction.
        tx_hash: TxHash,
    },
    /// The swap succeeded and the bridge step did not.
    SwapConfirmed {
        /// Hash of the swap transaction.
        tx_hash: TxHash,
    },
}

impl FundingStage {
    /// The swap transaction hash, once one exists.
    pub const fn tx_hash(&self) -> Option<TxHash> {
        match self {
            Self::NotStarted => None,
            Self::SwapBroadcast { tx_hash } | Self::SwapConfirmed { tx_hash } => Some(*tx_hash),
        }
    }
}

impl fmt::Display for FundingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => f.write_str("not started"),
            Self::SwapBroadcast { tx_hash } => write!(f, "swap {tx_hash} broadcast"),
            Self::SwapConfirmed { tx_hash } => write!(f, "swap {tx_hash} confirmed"),
        }
    }
}

/// The step that failed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FundingFailure {
    /// No EVM wallet is available to pay for the swap.
    #[error("no funding wallet available")]
    NoWallet,

    /// The swap failed.
    #[error(transparent)]
    Swap(#[from] SwapError),

    /// The bridge request failed.
    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

/// A failed funding attempt and the stage it reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FundingError {
    /// Stage reached before the failure.
    pub stage: FundingStage,
    /// What failed.
    pub failure: FundingFailure,
}

impl FundingError {
    /// A failure before anything was sent.
    pub const fn not_started(failure: FundingFailure) -> Self {
        Self {
            stage: FundingStage::NotStarted,
            failure,
        }
    }

    /// Returns true when the swap may or may not have gone through.
    pub const fn is_outcome_unknown(&self) -> bool {
        matches!(
            (&self.stage, &self.failure),
            (
                FundingStage::SwapBroadcast { .. },
                FundingFailure::Swap(SwapError::ConfirmationTimeout { .. } | SwapError::Unacknowledged { .. })
            )
        )
    }

    /// Returns true when nothing was sent and the failure may clear up.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            (&self.stage, &self.failure),
            (
                FundingStage::NotStarted,
                FundingFailure::Swap(SwapError::Prepare(_))
            )
        )
    }

    /// Returns true when the failing step was a timeout.
    pub const fn is_timeout(&self) -> bool {
        match &self.failure {
            FundingFailure::Swap(error) => error.is_timeout(),
            FundingFailure::Bridge(error) => error.is_timeout(),
            FundingFailure::NoWallet => false,
        }
    }
}

impl fmt::Display for FundingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_outcome_unknown() {
            return write!(
                f,
                "funding in unknown state after {}: {}",
                self.stage, self.failure
            );
        }
        match self.stage {
            FundingStage::NotStarted => write!(f, "funding failed before the swap: {}", self.failure),
            FundingStage::SwapBroadcast { .. } => {
                write!(f, "funding failed after {}: {}", self.stage, self.failure)
            }
            FundingStage::SwapConfirmed { .. } => {
                write!(f, "bridge failed after {}: {}", self.stage, self.failure)
            }
        }
    }
}

impl std::error::Error for FundingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.failure)
    }
}

/// Amounts to move when a storage address needs funding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FundingPlan {
    /// Native tokens to swap, in wei.
    pub swap_amount: U256,
    /// Wrapped AR to bridge, as a decimal string.
    pub bridge_amount: String,
}

impl FundingPlan {
    /// A plan swapping `swap_amount` wei and bridging `bridge_amount` AR.
    pub fn new(swap_amount: U256, bridge_amount: impl Into<String>) -> Self {
        Self {
            swap_amount,
            bridge_amount: bridge_amount.into(),
        }
    }
}

/// A completed funding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FundingReceipt {
    /// Hash of the confirmed swap.
    pub swap_tx_hash: TxHash,
    /// What the bridge answered.
    pub bridge: serde_json::Value,
}

/// Logs when a request is abandoned with a swap in flight.
struct InFlight {
    stage: FundingStage,
    target: StorageAddress,
    done: bool,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if !self.done && self.stage != FundingStage::NotStarted {
            tracing::warn!(stage = %self.stage, target = %self.target, "funding abandoned mid-flight");
        }
    }
}

/// Runs the swap-then-bridge sequence.
#[derive(Debug)]
pub struct Funder<S, B> {
    swap: S,
    bridge: B,
    confirmation_timeout: Duration,
}

impl<S: SwapExecutor, B: Bridge> Funder<S, B> {
    /// A funder that waits up to `confirmation_timeout` for the swap.
    pub const fn new(swap: S, bridge: B, confirmation_timeout: Duration) -> Self {
        Self {
            swap,
            bridge,
            confirmation_timeout,
        }
    }

    /// The swap executor.
    pub const fn swap(&self) -> &S {
        &self.swap
    }

    /// The bridge client.
    pub const fn bridge(&self) -> &B {
        &self.bridge
    }

    /// Swaps with `wallet` and bridges to `target`.
    pub async fn fund(
        &self,
        wallet: &PrivateKeySigner,
        plan: &FundingPlan,
        target: &StorageAddress,
    ) -> Result<FundingReceipt, FundingError> {
        let mut flight = InFlight {
            stage: FundingStage::NotStarted,
            target: *target,
            done: false,
        };

        let tx_hash = match self.swap.broadcast(wallet, plan.swap_amount).await {
            Ok(tx_hash) => tx_hash,
            Err(error) => {
                flight.done = true;
                let stage = error
                    .tx_hash()
                    .map_or(FundingStage::NotStarted, |tx_hash| {
                        FundingStage::SwapBroadcast { tx_hash }
                    });
                return Err(FundingError {
                    stage,
                    failure: error.into(),
                });
            }
        };
        flight.stage = FundingStage::SwapBroadcast { tx_hash };
        tracing::info!(%tx_hash, %target, "swap broadcast");

        if let Err(error) = self.swap.confirm(tx_hash, self.confirmation_timeout).await {
            flight.done = true;
            return Err(FundingError {
                stage: flight.stage,
                failure: error.into(),
            });
        }
        flight.stage = FundingStage::SwapConfirmed { tx_hash };
        tracing::info!(%tx_hash, "swap confirmed");

        let bridge = self.bridge.bridge(&plan.bridge_amount, target).await;
        flight.done = true;
        match bridge {
            Ok(bridge) => Ok(FundingReceipt {
                swap_tx_hash: tx_hash,
                bridge,
            }),
            Err(error) => Err(FundingError {
                stage: flight.stage,
                failure: error.into(),
            }),
        }
    }
}
