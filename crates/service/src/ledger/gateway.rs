use std::time::Duration;

use permakey_primitives::StorageAddress;
use permakey_tx::{DataChunk, Transaction, TxId, Winston};
use reqwest::{Client, Response, StatusCode};
use serde::Serialize;
use url::Url;

use super::{Ledger, LedgerError, TxStatus};

/// HTTP client for a storage-network gateway.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    remote: Url,
    client: Client,
}

impl GatewayClient {
    /// Builds a client for the gateway at `remote` whose requests give up
    /// after `timeout`.
    pub fn new(remote: &Url, timeout: Duration) -> Result<Self, LedgerError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            remote: remote.clone(),
            client,
        })
    }

    /// The gateway base url.
    pub const fn remote(&self) -> &Url {
        &self.remote
    }

    fn endpoint(&self, path: &str) -> Result<Url, LedgerError> {
        Ok(self.remote.join(path)?)
    }

    async fn get(&self, path: &str) -> Result<Response, LedgerError> {
        let url = self.endpoint(path)?;
        tracing::debug!(%url, "gateway request");
        Ok(self.client.get(url).send().await?)
    }

    async fn get_text(&self, path: &str) -> Result<String, LedgerError> {
        let response = self.get(path).await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(LedgerError::HttpStatus(status, body));
        }
        Ok(body)
    }

    async fn post<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<(), LedgerError> {
        let url = self.endpoint(path)?;
        let response = self.client.post(url).json(body).send().await?;
        let status = response.status();
        // includes 208, sent when the gateway already holds the item
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(LedgerError::HttpStatus(status, body))
    }

    async fn get_winston(&self, path: &str) -> Result<Winston, LedgerError> {
        let body = self.get_text(path).await?;
        body.trim()
            .parse()
            .map_err(|_| LedgerError::InvalidResponse(format!("not an integer amount: {body:?}")))
    }
}

impl Ledger for GatewayClient {
    async fn balance(&self, address: &StorageAddress) -> Result<Winston, LedgerError> {
        self.get_winston(&format!("wallet/{address}/balance")).await
    }

    async fn anchor(&self) -> Result<Vec<u8>, LedgerError> {
        let body = self.get_text("tx_anchor").await?;
        permakey_tx::b64url_decode("anchor", body.trim())
            .map_err(|e| LedgerError::InvalidResponse(format!("anchor: {e}")))
    }

    async fn price(&self, data_size: u64) -> Result<Winston, LedgerError> {
        self.get_winston(&format!("price/{data_size}")).await
    }

    async fn submit(&self, tx: &Transaction) -> Result<(), LedgerError> {
        self.post("tx", tx).await
    }

    async fn submit_chunk(&self, chunk: &DataChunk) -> Result<(), LedgerError> {
        self.post("chunk", chunk).await
    }

    async fn status(&self, id: &TxId) -> Result<TxStatus, LedgerError> {
        let response = self.get(&format!("tx/{id}/status")).await?;
        match response.status() {
            StatusCode::OK => Ok(TxStatus::Confirmed),
            StatusCode::ACCEPTED => Ok(TxStatus::Pending),
            StatusCode::NOT_FOUND => Ok(TxStatus::NotFound),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(LedgerError::HttpStatus(status, body))
            }
        }
    }

    fn data_url(&self, id: &TxId) -> Result<Url, LedgerError> {
        self.endpoint(&id.to_string())
    }
}
