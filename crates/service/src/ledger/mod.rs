//! Storage-network ledger access
//!
//! The service needs these from a gateway:
//!
//! - a wallet balance
//! - a transaction anchor and a storage price
//! - transaction submission, plus chunk upload for payloads too large to
//!   travel inline
//! - a status lookup for transactions whose submission outcome is unknown
//!
//! [`Ledger`] abstracts those calls so the request pipeline can run against a
//! real gateway ([`GatewayClient`]) or an in-memory ledger ([`MemoryLedger`]).
//!
//! ## Example Usage
//!
//! ```
//! use permakey_primitives::StorageAddress;
//! use permakey_service::ledger::{Ledger, MemoryLedger};
//! use permakey_tx::Winston;
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let address = StorageAddress::default();
//! let ledger = MemoryLedger::new().with_balance(address, Winston::from(7u64));
//! assert_eq!(ledger.balance(&address).await.unwrap(), Winston::from(7u64));
//! # });
//! ```

use std::future::Future;

use permakey_primitives::StorageAddress;
use permakey_tx::{DataChunk, Transaction, TxId, Winston};
use reqwest::StatusCode;
use thiserror::Error;
use url::Url;

mod gateway;
mod memory;

pub use gateway::GatewayClient;
pub use memory::{MemoryLedger, SubmitBehavior};

/// Errors raised by ledger calls.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// The request could not be delivered or its response was lost.
    #[error("gateway request failed: {0}")]
    Transport(String),

    /// The gateway did not answer within the configured timeout.
    #[error("gateway request timed out")]
    Timeout,

    /// The gateway answered with a non-success status.
    #[error("gateway returned {0}: {1}")]
    HttpStatus(StatusCode, String),

    /// The gateway answered with a body that could not be interpreted.
    #[error("unexpected gateway response: {0}")]
    InvalidResponse(String),

    /// An endpoint url could not be built.
    #[error("invalid gateway url: {0}")]
    UrlParse(#[from] url::ParseError),
}

impl LedgerError {
    /// Returns true when the remote side may have acted on the request even
    /// though no answer arrived.
    pub const fn is_outcome_unknown(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout)
    }

    /// Returns true when the failure was a timeout.
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }
}

impl From<reqwest::Error> for LedgerError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport(error.to_string())
        }
    }
}

/// What the gateway knows about a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    /// Mined into a block.
    Confirmed,
    /// Accepted and waiting to be mined.
    Pending,
    /// Unknown to the gateway.
    NotFound,
}

impl TxStatus {
    /// Returns true when the gateway has accepted the transaction.
    pub const fn is_known(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Pending)
    }
}

/// Access to the storage-network ledger.
pub trait Ledger: Send + Sync {
    /// Balance of `address` in winston.
    fn balance(
        &self,
        address: &StorageAddress,
    ) -> impl Future<Output = Result<Winston, LedgerError>> + Send;

    /// Anchor to place in the next transaction.
    fn anchor(&self) -> impl Future<Output = Result<Vec<u8>, LedgerError>> + Send;

    /// Reward required to store `data_size` bytes.
    fn price(&self, data_size: u64) -> impl Future<Output = Result<Winston, LedgerError>> + Send;

    /// Submits a signed transaction.
    fn submit(&self, tx: &Transaction) -> impl Future<Output = Result<(), LedgerError>> + Send;

    /// Uploads one payload chunk of an already submitted transaction.
    fn submit_chunk(
        &self,
        chunk: &DataChunk,
    ) -> impl Future<Output = Result<(), LedgerError>> + Send;

    /// Looks up a previously submitted transaction.
    fn status(&self, id: &TxId) -> impl Future<Output = Result<TxStatus, LedgerError>> + Send;

    /// Where the data of `id` can be fetched once it is accepted.
    fn data_url(&self, id: &TxId) -> Result<Url, LedgerError>;
}
