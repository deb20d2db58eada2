//! Native-token to wrapped-AR swaps on the funding chain

use std::future::Future;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use alloy_network::{Ethereum, EthereumWallet, Network, ReceiptResponse, TransactionBuilder};
use alloy_primitives::{Address, TxHash, U256};
use alloy_provider::{Provider, ProviderBuilder};
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::SolCall;
use permakey_contracts::IUniswapV2Router02;
use permakey_contracts::polygon::{self, SWAP_DEADLINE_SECS};
use thiserror::Error;
use url::Url;

type TransactionRequest = <Ethereum as Network>::TransactionRequest;

/// Interval between receipt polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Errors raised while swapping.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SwapError {
    /// Nonce, gas or signing failed; nothing was sent.
    #[error("swap could not be prepared: {0}")]
    Prepare(String),

    /// The node refused the signed transaction.
    #[error("swap rejected by node: {0}")]
    Rejected(String),

    /// The signed transaction was handed to the node but no answer arrived.
    #[error("swap {tx_hash} sent without acknowledgement: {reason}")]
    Unacknowledged {
        /// Hash of the signed transaction.
        tx_hash: TxHash,
        /// Transport failure.
        reason: String,
    },

    /// The transaction was mined and reverted.
    #[error("swap {tx_hash} reverted")]
    Reverted {
        /// Hash of the reverted transaction.
        tx_hash: TxHash,
    },

    /// No receipt appeared before the confirmation deadline.
    #[error("swap {tx_hash} not confirmed in time")]
    ConfirmationTimeout {
        /// Hash of the unconfirmed transaction.
        tx_hash: TxHash,
    },
}

impl SwapError {
    /// The transaction hash, once a signed transaction has left the process.
    pub const fn tx_hash(&self) -> Option<TxHash> {
        match self {
            Self::Unacknowledged { tx_hash, .. }
            | Self::Reverted { tx_hash }
            | Self::ConfirmationTimeout { tx_hash } => Some(*tx_hash),
            Self::Prepare(_) | Self::Rejected(_) => None,
        }
    }

    /// Returns true when the failure was a deadline.
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::ConfirmationTimeout { .. })
    }
}

/// Broadcasts and confirms funding swaps.
pub trait SwapExecutor: Send + Sync {
    /// Signs and broadcasts a swap of `amount` wei from `wallet`, returning the
    /// transaction hash.
    fn broadcast(
        &self,
        wallet: &PrivateKeySigner,
        amount: U256,
    ) -> impl Future<Output = Result<TxHash, SwapError>> + Send;

    /// Waits up to `timeout` for `tx_hash` to be mined successfully.
    fn confirm(
        &self,
        tx_hash: TxHash,
        timeout: Duration,
    ) -> impl Future<Output = Result<(), SwapError>> + Send;
}

/// Builds `swapExactETHForTokens` calldata paying out to `recipient`.
pub fn swap_calldata(path: Vec<Address>, recipient: Address, deadline: U256) -> Vec<u8> {
    IUniswapV2Router02::swapExactETHForTokensCall {
        amountOutMin: U256::ZERO,
        path,
        to: recipient,
        deadline,
    }
    .abi_encode()
}

fn deadline() -> U256 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default();
    U256::from(now + SWAP_DEADLINE_SECS)
}

/// Swaps through a Uniswap-V2 style router over JSON-RPC.
#[derive(Debug, Clone)]
pub struct RouterSwapExecutor {
    rpc_url: Url,
    router: Address,
    path: Vec<Address>,
    poll_interval: Duration,
}

impl RouterSwapExecutor {
    /// An executor for the QuickSwap router on Polygon.
    pub fn polygon(rpc_url: Url) -> Self {
        Self::new(
            rpc_url,
            polygon::QUICKSWAP_ROUTER.address,
            polygon::swap_path(),
        )
    }

    /// An executor for `router`, swapping along `path`.
    pub fn new(rpc_url: Url, router: Address, path: Vec<Address>) -> Self {
        Self {
            rpc_url,
            router,
            path,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Sets the receipt poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// The router the swap is sent to.
    pub const fn router(&self) -> Address {
        self.router
    }
}

impl SwapExecutor for RouterSwapExecutor {
    async fn broadcast(&self, wallet: &PrivateKeySigner, amount: U256) -> Result<TxHash, SwapError> {
        let recipient = wallet.address();
        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(wallet.clone()))
            .connect_http(self.rpc_url.clone());

        let request = TransactionRequest::default()
            .with_from(recipient)
            .with_to(self.router)
            .with_value(amount)
            .with_input(swap_calldata(self.path.clone(), recipient, deadline()));

        // Fill and sign locally so the hash is known before anything is sent.
        let envelope = provider
            .fill(request)
            .await
            .map_err(|e| SwapError::Prepare(e.to_string()))?
            .try_into_envelope()
            .map_err(|e| SwapError::Prepare(e.to_string()))?;
        let tx_hash = *envelope.tx_hash();

        tracing::info!(%tx_hash, %recipient, %amount, "broadcasting swap");
        match provider.send_tx_envelope(envelope).await {
            Ok(_) => Ok(tx_hash),
            Err(error) if error.is_error_resp() => Err(SwapError::Rejected(error.to_string())),
            Err(error) => Err(SwapError::Unacknowledged {
                tx_hash,
                reason: error.to_string(),
            }),
        }
    }

    async fn confirm(&self, tx_hash: TxHash, timeout: Duration) -> Result<(), SwapError> {
        let provider = ProviderBuilder::new().connect_http(self.rpc_url.clone());
        let poll = async {
            loop {
                match provider.get_transaction_receipt(tx_hash).await {
                    Ok(Some(receipt)) => {
                        return if ReceiptResponse::status(&receipt) {
                            Ok(())
                        } else {
                            Err(SwapError::Reverted { tx_hash })
                        };
                    }
                    Ok(None) => {}
                    Err(error) => tracing::debug!(%tx_hash, %error, "receipt poll failed"),
                }
                tokio::time::sleep(self.poll_interval).await;
            }
        };

        tokio::time::timeout(timeout, poll)
            .await
            .map_err(|_| SwapError::ConfirmationTimeout { tx_hash })?
    }
}
