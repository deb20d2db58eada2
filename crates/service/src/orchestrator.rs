//! The upload pipeline
//!
//! One request runs strictly in order:
//!
//! ```text
//! secret -> seed -> RSA key ┐
//!                 JWK ------┴-> address -> balance -> [swap -> bridge] -> sign -> submit
//! ```
//!
//! Key generation is CPU-bound and runs on the blocking pool under a deadline.
//! Funding only happens when the balance is below the configured threshold.

use std::time::Duration;

use alloy_primitives::B256;
use alloy_signer_local::PrivateKeySigner;
use bytes::Bytes;
use permakey_primitives::{
    CancelFlag, DEFAULT_KEY_BITS, DEFAULT_SEED_LABEL, Jwk, RsaKeyGenerator, RsaKeyPair,
    SourceSecret, StorageAddress,
};
use permakey_tx::Winston;

use crate::error::RequestError;
use crate::funding::{
    Bridge, Funder, FundingError, FundingFailure, FundingPlan, FundingReceipt, SwapExecutor,
    needs_funding,
};
use crate::ledger::Ledger;
use crate::publisher::{Publication, Publisher};

/// Default cap on decoded payloads (12 MiB).
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 12 * 1024 * 1024;

/// Default deadline for seed derivation plus key generation.
pub const DEFAULT_KEYGEN_TIMEOUT: Duration = Duration::from_secs(300);

/// Where the request's RSA key comes from.
#[derive(Debug, Clone)]
pub enum KeySource {
    /// Derive it from an EVM private key.
    Derive(SourceSecret),
    /// Use a caller-supplied key.
    Supplied(Box<Jwk>),
}

/// A validated upload request.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Key material.
    pub key: KeySource,
    /// What to swap and bridge if the balance is too low.
    pub funding: FundingPlan,
    /// Data to publish.
    pub payload: Bytes,
}

/// The result of a successful upload.
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    /// The published transaction.
    pub publication: Publication,
    /// Storage address that paid for it.
    pub address: StorageAddress,
    /// Balance observed before any funding.
    pub balance: Winston,
    /// Funding performed for this request, if any.
    pub funding: Option<FundingReceipt>,
    /// The derived key, in derive mode.
    pub jwk: Option<Jwk>,
}

impl UploadOutcome {
    /// Returns true when the request swapped and bridged.
    pub const fn used_funding(&self) -> bool {
        self.funding.is_some()
    }
}

/// Tunables of the pipeline.
#[derive(Debug, Clone)]
pub struct Settings {
    /// RSA modulus size for derived keys.
    pub key_bits: usize,
    /// PBKDF2 salt.
    pub seed_label: String,
    /// Deadline for deriving a key.
    pub keygen_timeout: Duration,
    /// Balances strictly below this trigger funding.
    pub balance_threshold: Winston,
    /// Wallet paying for swaps when the key is supplied.
    pub funding_wallet: Option<PrivateKeySigner>,
    /// Largest decoded payload accepted.
    pub max_payload_bytes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            key_bits: DEFAULT_KEY_BITS,
            seed_label: DEFAULT_SEED_LABEL.to_string(),
            keygen_timeout: DEFAULT_KEYGEN_TIMEOUT,
            // 0.01 AR
            balance_threshold: Winston::from(10_000_000_000u64),
            funding_wallet: None,
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
        }
    }
}

/// Raises the flag when dropped, so an abandoned request stops its key search.
struct CancelOnDrop(CancelFlag);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

/// A resolved identity.
struct Identity {
    key: RsaKeyPair,
    address: StorageAddress,
    wallet: Option<PrivateKeySigner>,
    jwk: Option<Jwk>,
}

/// Runs upload requests.
#[derive(Debug)]
pub struct Orchestrator<L, S, B> {
    publisher: Publisher<L>,
    funder: Funder<S, B>,
    settings: Settings,
}

impl<L, S, B> Orchestrator<L, S, B>
where
    L: Ledger,
    S: SwapExecutor,
    B: Bridge,
{
    /// Assembles a pipeline.
    pub const fn new(ledger: L, funder: Funder<S, B>, settings: Settings) -> Self {
        Self {
            publisher: Publisher::new(ledger),
            funder,
            settings,
        }
    }

    /// The ledger used for balances and submission.
    pub const fn ledger(&self) -> &L {
        self.publisher.ledger()
    }

    /// The funding sequence.
    pub const fn funder(&self) -> &Funder<S, B> {
        &self.funder
    }

    /// The pipeline tunables.
    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Runs `request` to completion.
    pub async fn upload(&self, request: UploadRequest) -> Result<UploadOutcome, RequestError> {
        let identity = self.resolve(request.key).await?;
        let address = identity.address;
        tracing::info!(%address, derived = identity.jwk.is_some(), "identity resolved");

        let balance = self
            .ledger()
            .balance(&address)
            .await
            .map_err(RequestError::LedgerQuery)?;

        let funding = if needs_funding(balance, self.settings.balance_threshold) {
            tracing::info!(%address, %balance, threshold = %self.settings.balance_threshold, "balance below threshold, funding");
            let wallet = identity
                .wallet
                .as_ref()
                .ok_or_else(|| FundingError::not_started(FundingFailure::NoWallet))?;
            Some(self.funder.fund(wallet, &request.funding, &address).await?)
        } else {
            None
        };

        let publication = self
            .publisher
            .publish(request.payload, &identity.key)
            .await?;
        tracing::info!(id = %publication.identifier, url = %publication.url, "published");

        Ok(UploadOutcome {
            publication,
            address,
            balance,
            funding,
            jwk: identity.jwk,
        })
    }

    async fn resolve(&self, source: KeySource) -> Result<Identity, RequestError> {
        match source {
            KeySource::Derive(secret) => {
                let wallet = PrivateKeySigner::from_bytes(&B256::from(*secret.as_bytes()))
                    .map_err(|e| {
                        RequestError::RequestValidation(format!(
                            "sourceSecret is not a valid EVM private key: {e}"
                        ))
                    })?;
                let key = self.derive(secret).await?;
                let jwk = Jwk::from(&key);
                Ok(Identity {
                    address: StorageAddress::from_keypair(&key),
                    key,
                    wallet: Some(wallet),
                    jwk: Some(jwk),
                })
            }
            KeySource::Supplied(jwk) => {
                let key = jwk.to_keypair().map_err(RequestError::KeyDecoding)?;
                Ok(Identity {
                    address: StorageAddress::from_keypair(&key),
                    key,
                    wallet: self.settings.funding_wallet.clone(),
                    jwk: None,
                })
            }
        }
    }

    async fn derive(&self, secret: SourceSecret) -> Result<RsaKeyPair, RequestError> {
        let generator = RsaKeyGenerator::new(self.settings.key_bits)
            .map_err(RequestError::KeyDerivation)?;
        let cancel = CancelFlag::new();
        let generator = generator.with_cancel(cancel.clone());
        let _guard = CancelOnDrop(cancel);

        let label = self.settings.seed_label.clone();
        let task = tokio::task::spawn_blocking(move || {
            let seed = secret.derive_seed(&label);
            generator.generate_from_seed(&seed)
        });

        let timeout = self.settings.keygen_timeout;
        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(result)) => result.map_err(RequestError::KeyDerivation),
            Ok(Err(join)) => Err(RequestError::Internal(format!("key generation task: {join}"))),
            Err(_) => {
                tracing::warn!(?timeout, "key generation deadline exceeded");
                Err(RequestError::KeyDerivationTimeout(timeout))
            }
        }
    }
}
