use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use alloy_primitives::{Address, B256, TxHash, U256};
use alloy_signer_local::PrivateKeySigner;
use parking_lot::Mutex;
use permakey_primitives::StorageAddress;
use reqwest::StatusCode;

use super::bridge::{Bridge, BridgeError};
use super::swap::{SwapError, SwapExecutor};

/// How a [`MemorySwap`] behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SwapOutcome {
    /// Broadcasts and confirms.
    #[default]
    Confirm,
    /// The node refuses the transaction.
    RejectBroadcast,
    /// Broadcasts but never confirms.
    NeverConfirm,
    /// Broadcasts and reverts.
    Revert,
}

/// A swap executor that records broadcasts without touching a chain.
#[derive(Debug, Default)]
pub struct MemorySwap {
    outcome: SwapOutcome,
    next_nonce: AtomicU64,
    broadcasts: Mutex<Vec<(Address, U256)>>,
}

impl MemorySwap {
    /// An executor with the given behavior.
    pub fn new(outcome: SwapOutcome) -> Self {
        Self {
            outcome,
            ..Self::default()
        }
    }

    /// Sender and amount of each broadcast so far.
    pub fn broadcasts(&self) -> Vec<(Address, U256)> {
        self.broadcasts.lock().clone()
    }

    fn next_hash(&self) -> TxHash {
        let nonce = self.next_nonce.fetch_add(1, Ordering::SeqCst);
        let mut bytes = [0u8; 32];
        bytes[24..32].copy_from_slice(&(nonce + 1).to_be_bytes());
        B256::from(bytes)
    }
}

impl SwapExecutor for MemorySwap {
    async fn broadcast(&self, wallet: &PrivateKeySigner, amount: U256) -> Result<TxHash, SwapError> {
        if self.outcome == SwapOutcome::RejectBroadcast {
            return Err(SwapError::Rejected("insufficient funds for gas".into()));
        }
        self.broadcasts.lock().push((wallet.address(), amount));
        Ok(self.next_hash())
    }

    async fn confirm(&self, tx_hash: TxHash, _timeout: Duration) -> Result<(), SwapError> {
        match self.outcome {
            SwapOutcome::Confirm | SwapOutcome::RejectBroadcast => Ok(()),
            SwapOutcome::NeverConfirm => Err(SwapError::ConfirmationTimeout { tx_hash }),
            SwapOutcome::Revert => Err(SwapError::Reverted { tx_hash }),
        }
    }
}

/// A bridge that records requests and answers from memory.
#[derive(Debug, Default)]
pub struct MemoryBridge {
    failing: bool,
    requests: Mutex<Vec<(String, StorageAddress)>>,
}

impl MemoryBridge {
    /// A bridge that accepts every request.
    pub fn new() -> Self {
        Self::default()
    }

    /// A bridge that answers every request with a 502.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    /// Amount and target of each request so far.
    pub fn requests(&self) -> Vec<(String, StorageAddress)> {
        self.requests.lock().clone()
    }
}

impl Bridge for MemoryBridge {
    async fn bridge(
        &self,
        amount: &str,
        target: &StorageAddress,
    ) -> Result<serde_json::Value, BridgeError> {
        self.requests.lock().push((amount.to_string(), *target));
        if self.failing {
            return Err(BridgeError::HttpStatus(
                StatusCode::BAD_GATEWAY,
                "bridge unavailable".into(),
            ));
        }
        Ok(serde_json::json!({
            "status": "ok",
            "token": "AR",
            "amount": amount,
            "target": target.to_string(),
        }))
    }
}
