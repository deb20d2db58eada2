use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use permakey_primitives::StorageAddress;
use permakey_tx::{DataChunk, Transaction, TxId, Winston};
use reqwest::StatusCode;
use url::Url;

use super::{Ledger, LedgerError, TxStatus};

/// How [`MemoryLedger::submit`] responds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubmitBehavior {
    /// Store the transaction and report success.
    #[default]
    Accept,
    /// Refuse the transaction with a 400.
    Reject,
    /// Store the transaction but report a lost response.
    AcceptThenDisconnect,
    /// Drop the transaction and report a lost response.
    Disconnect,
}

/// An in-memory ledger for tests and local runs.
///
/// Balances default to zero. Every call is counted so callers can assert that
/// nothing reached the ledger. Chunks are only accepted for a submitted
/// transaction and only when their proof checks out.
#[derive(Debug)]
pub struct MemoryLedger {
    balances: Mutex<HashMap<StorageAddress, Winston>>,
    submitted: Mutex<Vec<Transaction>>,
    chunks: Mutex<Vec<DataChunk>>,
    lost_chunk_responses: AtomicUsize,
    anchor: Vec<u8>,
    price: Winston,
    submit_behavior: SubmitBehavior,
    unavailable: bool,
    calls: AtomicUsize,
}

impl MemoryLedger {
    /// Creates an empty ledger with a 32-byte anchor and a price of 1 winston.
    pub fn new() -> Self {
        Self {
            balances: Mutex::new(HashMap::new()),
            submitted: Mutex::new(Vec::new()),
            chunks: Mutex::new(Vec::new()),
            lost_chunk_responses: AtomicUsize::new(0),
            anchor: vec![0xa5; 32],
            price: Winston::from(1u64),
            submit_behavior: SubmitBehavior::default(),
            unavailable: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// Sets the balance of `address`.
    pub fn with_balance(self, address: StorageAddress, balance: Winston) -> Self {
        self.balances.lock().insert(address, balance);
        self
    }

    /// Sets the price charged for any size.
    pub fn with_price(mut self, price: Winston) -> Self {
        self.price = price;
        self
    }

    /// Sets how submissions are answered.
    pub fn with_submit_behavior(mut self, behavior: SubmitBehavior) -> Self {
        self.submit_behavior = behavior;
        self
    }

    /// Drops the responses to the next `count` chunk uploads without storing
    /// the chunks.
    pub fn with_lost_chunk_responses(self, count: usize) -> Self {
        self.lost_chunk_responses.store(count, Ordering::SeqCst);
        self
    }

    /// Makes every call fail with a 503.
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    /// Credits `amount` to `address`.
    pub fn credit(&self, address: StorageAddress, amount: Winston) {
        let mut balances = self.balances.lock();
        let balance = balances.entry(address).or_default();
        *balance = Winston::new(balance.get().saturating_add(amount.get()));
    }

    /// Transactions accepted so far.
    pub fn submitted(&self) -> Vec<Transaction> {
        self.submitted.lock().clone()
    }

    /// Chunks accepted so far, in upload order.
    pub fn chunks(&self) -> Vec<DataChunk> {
        self.chunks.lock().clone()
    }

    /// Number of ledger calls made, including failed ones.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn enter(&self) -> Result<(), LedgerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable {
            return Err(LedgerError::HttpStatus(
                StatusCode::SERVICE_UNAVAILABLE,
                "ledger unavailable".into(),
            ));
        }
        Ok(())
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger for MemoryLedger {
    async fn balance(&self, address: &StorageAddress) -> Result<Winston, LedgerError> {
        self.enter()?;
        Ok(self
            .balances
            .lock()
            .get(address)
            .copied()
            .unwrap_or_default())
    }

    async fn anchor(&self) -> Result<Vec<u8>, LedgerError> {
        self.enter()?;
        Ok(self.anchor.clone())
    }

    async fn price(&self, _data_size: u64) -> Result<Winston, LedgerError> {
        self.enter()?;
        Ok(self.price)
    }

    async fn submit(&self, tx: &Transaction) -> Result<(), LedgerError> {
        self.enter()?;
        match self.submit_behavior {
            SubmitBehavior::Accept => {
                self.submitted.lock().push(tx.clone());
                Ok(())
            }
            SubmitBehavior::Reject => Err(LedgerError::HttpStatus(
                StatusCode::BAD_REQUEST,
                "transaction rejected".into(),
            )),
            SubmitBehavior::AcceptThenDisconnect => {
                self.submitted.lock().push(tx.clone());
                Err(LedgerError::Transport("connection reset".into()))
            }
            SubmitBehavior::Disconnect => Err(LedgerError::Transport("connection reset".into())),
        }
    }

    async fn submit_chunk(&self, chunk: &DataChunk) -> Result<(), LedgerError> {
        self.enter()?;
        let lost = self
            .lost_chunk_responses
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if lost {
            return Err(LedgerError::Transport("connection reset".into()));
        }

        let known_root = self
            .submitted
            .lock()
            .iter()
            .any(|tx| tx.data_root() == chunk.data_root.as_slice());
        if !known_root {
            return Err(LedgerError::HttpStatus(
                StatusCode::BAD_REQUEST,
                "data_root_not_found".into(),
            ));
        }
        chunk
            .verify()
            .map_err(|e| LedgerError::HttpStatus(StatusCode::BAD_REQUEST, e.to_string()))?;
        self.chunks.lock().push(chunk.clone());
        Ok(())
    }

    async fn status(&self, id: &TxId) -> Result<TxStatus, LedgerError> {
        self.enter()?;
        let known = self
            .submitted
            .lock()
            .iter()
            .any(|tx| tx.id().is_ok_and(|submitted| submitted == *id));
        Ok(if known {
            TxStatus::Pending
        } else {
            TxStatus::NotFound
        })
    }

    fn data_url(&self, id: &TxId) -> Result<Url, LedgerError> {
        Ok(Url::parse(&format!("memory://ledger/{id}"))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_balances_default_to_zero() {
        let ledger = MemoryLedger::new();
        let address = StorageAddress::new([1u8; 32]);
        assert_eq!(ledger.balance(&address).await.unwrap(), Winston::ZERO);

        ledger.credit(address, Winston::from(5u64));
        ledger.credit(address, Winston::from(5u64));
        assert_eq!(ledger.balance(&address).await.unwrap(), Winston::from(10u64));
        assert_eq!(ledger.calls(), 2);
    }

    #[tokio::test]
    async fn test_unavailable_counts_calls() {
        let ledger = MemoryLedger::new().unavailable();
        assert!(matches!(
            ledger.anchor().await.unwrap_err(),
            LedgerError::HttpStatus(StatusCode::SERVICE_UNAVAILABLE, _)
        ));
        assert_eq!(ledger.calls(), 1);
    }

    #[tokio::test]
    async fn test_chunks_need_a_submitted_root() {
        let ledger = MemoryLedger::new();
        let tx = Transaction::new(vec![8u8; permakey_tx::MAX_INLINE_DATA_SIZE + 40_000]);
        let chunks = tx.data_chunks();

        assert!(matches!(
            ledger.submit_chunk(&chunks[0]).await.unwrap_err(),
            LedgerError::HttpStatus(StatusCode::BAD_REQUEST, _)
        ));

        ledger.submit(&tx.header()).await.unwrap();
        for chunk in &chunks {
            ledger.submit_chunk(chunk).await.unwrap();
        }
        assert_eq!(ledger.chunks(), chunks);
    }

    #[tokio::test]
    async fn test_lost_chunk_responses_are_counted_down() {
        let ledger = MemoryLedger::new().with_lost_chunk_responses(1);
        let tx = Transaction::new(vec![8u8; 10]);
        ledger.submit(&tx).await.unwrap();
        let chunk = &tx.data_chunks()[0];

        assert!(ledger.submit_chunk(chunk).await.unwrap_err().is_outcome_unknown());
        ledger.submit_chunk(chunk).await.unwrap();
        assert_eq!(ledger.chunks().len(), 1);
    }

    #[tokio::test]
    async fn test_data_url() {
        let ledger = MemoryLedger::new();
        let id = TxId::from_signature(b"sig");
        assert_eq!(
            ledger.data_url(&id).unwrap().as_str(),
            format!("memory://ledger/{id}")
        );
    }
}
