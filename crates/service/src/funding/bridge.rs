//! Bridging wrapped AR back to the storage network

use std::future::Future;
use std::time::Duration;

use permakey_primitives::StorageAddress;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use thiserror::Error;
use url::Url;

/// Token symbol sent to the bridge.
pub const BRIDGE_TOKEN: &str = "AR";

/// Errors raised by a bridge call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// The request could not be delivered or its response was lost.
    #[error("bridge request failed: {0}")]
    Transport(String),

    /// The bridge did not answer in time.
    #[error("bridge request timed out")]
    Timeout,

    /// The bridge answered with a non-success status.
    #[error("bridge returned {0}: {1}")]
    HttpStatus(StatusCode, String),

    /// The bridge answered with something other than JSON.
    #[error("unexpected bridge response: {0}")]
    InvalidResponse(String),
}

impl BridgeError {
    /// Returns true when the failure was a timeout.
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }
}

impl From<reqwest::Error> for BridgeError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport(error.to_string())
        }
    }
}

/// Moves wrapped AR to a storage address.
pub trait Bridge: Send + Sync {
    /// Bridges `amount` (decimal AR) to `target`, returning the bridge's answer.
    fn bridge(
        &self,
        amount: &str,
        target: &StorageAddress,
    ) -> impl Future<Output = Result<serde_json::Value, BridgeError>> + Send;
}

#[derive(Debug, Serialize)]
struct BridgeRequest<'a> {
    token: &'a str,
    amount: &'a str,
    target: String,
}

/// Client for the everPay bridge endpoint.
#[derive(Debug, Clone)]
pub struct EverpayBridge {
    endpoint: Url,
    client: Client,
}

impl EverpayBridge {
    /// A client posting to `endpoint`.
    pub fn new(endpoint: &Url, timeout: Duration) -> Result<Self, BridgeError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            endpoint: endpoint.clone(),
            client,
        })
    }
}

impl Bridge for EverpayBridge {
    async fn bridge(
        &self,
        amount: &str,
        target: &StorageAddress,
    ) -> Result<serde_json::Value, BridgeError> {
        let request = BridgeRequest {
            token: BRIDGE_TOKEN,
            amount,
            target: target.to_string(),
        };
        tracing::info!(%target, amount, "bridging to storage address");

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(BridgeError::HttpStatus(status, body));
        }
        serde_json::from_str(&body).map_err(|e| BridgeError::InvalidResponse(e.to_string()))
    }
}
