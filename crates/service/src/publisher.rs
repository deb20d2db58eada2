//! Building, signing and submitting data transactions
//!
//! Publishing is: detect the payload's content type, fetch an anchor and a
//! price, sign, submit. Payloads larger than one chunk are submitted as a
//! data-free header followed by their chunks.
//!
//! A submission whose response is lost is checked once against the gateway;
//! if the gateway still does not know the transaction the outcome is reported
//! as unknown together with its identifier, so the caller can look it up later
//! instead of publishing a duplicate.

use bytes::Bytes;
use permakey_primitives::RsaKeyPair;
use permakey_tx::{ContentType, Tag, Transaction, TxError, TxId, Winston, content_type};
use thiserror::Error;
use url::Url;

use crate::ledger::{Ledger, LedgerError};

/// Tries per chunk when the gateway's answer is lost.
pub const CHUNK_ATTEMPTS: usize = 3;

/// Errors raised while publishing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PublicationError {
    /// Anchor or price could not be fetched; nothing was submitted.
    #[error("could not prepare transaction: {0}")]
    Prepare(#[source] LedgerError),

    /// The transaction could not be signed.
    #[error("could not sign transaction: {0}")]
    Signing(#[from] TxError),

    /// The gateway refused the transaction.
    #[error("transaction {id} rejected: {source}")]
    Rejected {
        /// Identifier of the refused transaction.
        id: TxId,
        /// Gateway answer.
        source: LedgerError,
    },

    /// The submission's outcome could not be determined.
    #[error("transaction {id} submitted with unknown outcome: {source}")]
    Unknown {
        /// Identifier to look up later.
        id: TxId,
        /// The transport failure.
        source: LedgerError,
    },

    /// The header was accepted but a chunk could not be uploaded.
    #[error("transaction {id} accepted but chunk {index} of {total} failed: {source}")]
    IncompleteUpload {
        /// Identifier of the accepted header.
        id: TxId,
        /// Zero-based index of the failing chunk.
        index: usize,
        /// Number of chunks in the payload.
        total: usize,
        /// Gateway answer.
        source: LedgerError,
    },
}

impl PublicationError {
    /// Identifier of the transaction, when one was signed.
    pub const fn id(&self) -> Option<&TxId> {
        match self {
            Self::Rejected { id, .. }
            | Self::Unknown { id, .. }
            | Self::IncompleteUpload { id, .. } => Some(id),
            Self::Prepare(_) | Self::Signing(_) => None,
        }
    }

    /// Returns true when the gateway may hold the transaction.
    pub const fn maybe_accepted(&self) -> bool {
        matches!(self, Self::Unknown { .. } | Self::IncompleteUpload { .. })
    }

    /// Returns true when publishing again cannot produce a second copy.
    pub const fn is_retryable(&self) -> bool {
        !self.maybe_accepted()
    }

    /// Returns true when the failing call timed out.
    pub const fn is_timeout(&self) -> bool {
        match self {
            Self::Prepare(error)
            | Self::Rejected { source: error, .. }
            | Self::Unknown { source: error, .. }
            | Self::IncompleteUpload { source: error, .. } => error.is_timeout(),
            Self::Signing(_) => false,
        }
    }
}

/// A published payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publication {
    /// Transaction identifier.
    pub identifier: TxId,
    /// Detected content type.
    pub content_type: ContentType,
    /// Where the data can be fetched.
    pub url: Url,
    /// Reward paid.
    pub reward: Winston,
}

/// Publishes payloads through a [`Ledger`].
#[derive(Debug)]
pub struct Publisher<L> {
    ledger: L,
}

impl<L: Ledger> Publisher<L> {
    /// A publisher submitting to `ledger`.
    pub const fn new(ledger: L) -> Self {
        Self { ledger }
    }

    /// The underlying ledger.
    pub const fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Builds and signs the transaction for `payload` without submitting it.
    pub async fn prepare(
        &self,
        payload: Bytes,
        key: &RsaKeyPair,
    ) -> Result<(Transaction, ContentType), PublicationError> {
        let kind = content_type::detect(&payload);
        let data_size = payload.len() as u64;

        let anchor = self.ledger.anchor().await.map_err(PublicationError::Prepare)?;
        let reward = self
            .ledger
            .price(data_size)
            .await
            .map_err(PublicationError::Prepare)?;

        let mut tx = Transaction::new(payload)
            .with_tag(Tag::content_type(kind.mime))
            .with_anchor(anchor)
            .with_reward(reward);
        tx.sign(key)?;
        Ok((tx, kind))
    }

    /// Signs `payload` with `key` and submits it.
    pub async fn publish(
        &self,
        payload: Bytes,
        key: &RsaKeyPair,
    ) -> Result<Publication, PublicationError> {
        let (tx, kind) = self.prepare(payload, key).await?;
        let id = tx.id()?;
        tracing::info!(%id, content_type = kind.mime, data_size = tx.data_size(), "submitting transaction");

        let header = (!tx.carries_data_inline()).then(|| tx.header());
        if let Err(error) = self.ledger.submit(header.as_ref().unwrap_or(&tx)).await {
            if !error.is_outcome_unknown() {
                return Err(PublicationError::Rejected { id, source: error });
            }
            tracing::warn!(%id, %error, "submission response lost, checking status");
            match self.ledger.status(&id).await {
                Ok(status) if status.is_known() => {
                    tracing::info!(%id, ?status, "transaction found after lost response");
                }
                _ => return Err(PublicationError::Unknown { id, source: error }),
            }
        }

        if header.is_some() {
            self.upload_chunks(&tx, id).await?;
        }

        let url = self
            .ledger
            .data_url(&id)
            .map_err(|source| PublicationError::Unknown { id, source })?;
        Ok(Publication {
            identifier: id,
            content_type: kind,
            url,
            reward: tx.reward(),
        })
    }

    async fn upload_chunks(&self, tx: &Transaction, id: TxId) -> Result<(), PublicationError> {
        let chunks = tx.data_chunks();
        let total = chunks.len();

        for (index, chunk) in chunks.iter().enumerate() {
            let mut attempt = 1;
            loop {
                match self.ledger.submit_chunk(chunk).await {
                    Ok(()) => break,
                    Err(error) if error.is_outcome_unknown() && attempt < CHUNK_ATTEMPTS => {
                        tracing::warn!(%id, index, attempt, %error, "chunk upload failed, retrying");
                        attempt += 1;
                    }
                    Err(source) => {
                        return Err(PublicationError::IncompleteUpload {
                            id,
                            index,
                            total,
                            source,
                        });
                    }
                }
            }
        }
        tracing::debug!(%id, total, "chunks uploaded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::LazyLock;

    use permakey_primitives::{Seed, generate_keypair};

    use super::*;
    use crate::ledger::{MemoryLedger, SubmitBehavior};

    static KEY: LazyLock<RsaKeyPair> =
        LazyLock::new(|| generate_keypair(&Seed::new([5u8; 32]), 512).unwrap());

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\x00\x00\x00\rIHDR";

    #[tokio::test]
    async fn test_publish_signs_and_tags() {
        let publisher = Publisher::new(MemoryLedger::new().with_price(Winston::from(99u64)));
        let publication = publisher.publish(Bytes::from_static(PNG), &KEY).await.unwrap();

        assert_eq!(publication.content_type.mime, "image/png");
        assert_eq!(publication.reward, Winston::from(99u64));

        let submitted = publisher.ledger().submitted();
        assert_eq!(submitted.len(), 1);
        let tx = &submitted[0];
        tx.verify().unwrap();
        assert_eq!(tx.id().unwrap(), publication.identifier);
        assert_eq!(tx.content_type(), Some("image/png"));
        assert!(
            publication
                .url
                .as_str()
                .ends_with(&publication.identifier.to_string())
        );
    }

    #[tokio::test]
    async fn test_unknown_payload_is_octet_stream() {
        let publisher = Publisher::new(MemoryLedger::new());
        let publication = publisher
            .publish(Bytes::from_static(b"just text"), &KEY)
            .await
            .unwrap();
        assert_eq!(publication.content_type.mime, "application/octet-stream");
    }

    #[tokio::test]
    async fn test_rejection_is_not_ambiguous() {
        let publisher =
            Publisher::new(MemoryLedger::new().with_submit_behavior(SubmitBehavior::Reject));
        let error = publisher
            .publish(Bytes::from_static(PNG), &KEY)
            .await
            .unwrap_err();
        assert!(matches!(error, PublicationError::Rejected { .. }));
        assert!(!error.maybe_accepted());
        assert!(error.is_retryable());
    }

    #[tokio::test]
    async fn test_lost_response_with_accepted_tx_succeeds() {
        let publisher = Publisher::new(
            MemoryLedger::new().with_submit_behavior(SubmitBehavior::AcceptThenDisconnect),
        );
        let publication = publisher.publish(Bytes::from_static(PNG), &KEY).await.unwrap();
        assert_eq!(
            publisher.ledger().submitted()[0].id().unwrap(),
            publication.identifier
        );
    }

    #[tokio::test]
    async fn test_lost_response_reports_identifier() {
        let publisher =
            Publisher::new(MemoryLedger::new().with_submit_behavior(SubmitBehavior::Disconnect));
        let error = publisher
            .publish(Bytes::from_static(PNG), &KEY)
            .await
            .unwrap_err();
        assert!(error.maybe_accepted());
        assert!(error.id().is_some());
        assert!(!error.is_retryable());
    }

    fn large_payload() -> Bytes {
        let mut data = PNG.to_vec();
        data.resize(2 * permakey_tx::MAX_INLINE_DATA_SIZE + 10_000, 0x5a);
        Bytes::from(data)
    }

    #[tokio::test]
    async fn test_large_payload_is_uploaded_in_chunks() {
        let publisher = Publisher::new(MemoryLedger::new().with_lost_chunk_responses(1));
        let payload = large_payload();
        let publication = publisher.publish(payload.clone(), &KEY).await.unwrap();
        assert_eq!(publication.content_type.mime, "image/png");

        let submitted = publisher.ledger().submitted();
        assert_eq!(submitted.len(), 1);
        assert!(submitted[0].data().is_empty());
        assert_eq!(submitted[0].data_size(), payload.len() as u64);
        submitted[0].verify().unwrap();

        let uploaded: Vec<u8> = publisher
            .ledger()
            .chunks()
            .iter()
            .flat_map(|chunk| chunk.chunk.to_vec())
            .collect();
        assert_eq!(uploaded, payload);
    }

    #[tokio::test]
    async fn test_failed_chunk_is_not_retryable() {
        let publisher = Publisher::new(MemoryLedger::new().with_lost_chunk_responses(CHUNK_ATTEMPTS));
        let error = publisher.publish(large_payload(), &KEY).await.unwrap_err();

        match &error {
            PublicationError::IncompleteUpload { index, total, .. } => {
                assert_eq!(*index, 0);
                assert_eq!(*total, 3);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(error.maybe_accepted());
        assert!(!error.is_retryable());
        assert_eq!(publisher.ledger().submitted().len(), 1);
    }

    #[tokio::test]
    async fn test_prepare_failure_submits_nothing() {
        let publisher = Publisher::new(MemoryLedger::new().unavailable());
        let error = publisher
            .publish(Bytes::from_static(PNG), &KEY)
            .await
            .unwrap_err();
        assert!(matches!(error, PublicationError::Prepare(_)));
        assert!(error.is_retryable());
        assert_eq!(publisher.ledger().calls(), 1);
    }
}
