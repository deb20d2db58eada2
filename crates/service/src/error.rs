//! Request-level errors and their HTTP rendering
//!
//! Every failure of the upload pipeline is a [`RequestError`]. Each variant
//! keeps the component error that caused it and maps to:
//!
//! - a stable `kind` string for clients
//! - an HTTP status
//! - a `retryable` flag saying whether sending the same request again is safe
//!
//! Funding failures also carry the [`FundingStage`] reached and a `usedFunding`
//! flag: `false` when nothing was broadcast, `null` once a swap was broadcast
//! and may have spent funds.

use std::time::Duration;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use permakey_primitives::KeyError;
use serde::Serialize;
use strum::IntoStaticStr;
use thiserror::Error;

use crate::funding::{FundingError, FundingFailure, FundingStage};
use crate::ledger::LedgerError;
use crate::publisher::PublicationError;

/// Stable error kinds reported to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr, strum::Display)]
pub enum ErrorKind {
    /// Missing or malformed request fields.
    #[strum(serialize = "RequestValidationError")]
    RequestValidation,
    /// The secret was malformed or key generation failed.
    #[strum(serialize = "KeyDerivationError")]
    KeyDerivation,
    /// The supplied JWK was malformed or inconsistent.
    #[strum(serialize = "KeyDecodingError")]
    KeyDecoding,
    /// The balance could not be read.
    #[strum(serialize = "LedgerQueryError")]
    LedgerQuery,
    /// Swap or bridge failed.
    #[strum(serialize = "FundingError")]
    Funding,
    /// Signing or submission failed.
    #[strum(serialize = "PublicationError")]
    Publication,
    /// A bug or runtime failure in the service itself.
    #[strum(serialize = "InternalError")]
    Internal,
}

/// Errors returned by the upload pipeline.
#[derive(Debug, Error)]
pub enum RequestError {
    /// Missing or malformed request fields.
    #[error("invalid request: {0}")]
    RequestValidation(String),

    /// The secret was malformed or key generation failed.
    #[error("key derivation failed: {0}")]
    KeyDerivation(#[source] KeyError),

    /// Key generation did not finish in time.
    #[error("key derivation did not finish within {0:?}")]
    KeyDerivationTimeout(Duration),

    /// The supplied JWK was malformed or inconsistent.
    #[error("invalid key: {0}")]
    KeyDecoding(#[source] KeyError),

    /// The balance could not be read.
    #[error("balance query failed: {0}")]
    LedgerQuery(#[source] LedgerError),

    /// Swap or bridge failed.
    #[error(transparent)]
    Funding(#[from] FundingError),

    /// Signing or submission failed.
    #[error("publication failed: {0}")]
    Publication(#[from] PublicationError),

    /// A bug or runtime failure in the service itself.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RequestError {
    /// The client-facing kind.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::RequestValidation(_) => ErrorKind::RequestValidation,
            Self::KeyDerivation(_) | Self::KeyDerivationTimeout(_) => ErrorKind::KeyDerivation,
            Self::KeyDecoding(_) => ErrorKind::KeyDecoding,
            Self::LedgerQuery(_) => ErrorKind::LedgerQuery,
            Self::Funding(_) => ErrorKind::Funding,
            Self::Publication(_) => ErrorKind::Publication,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// The HTTP status for this error.
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::RequestValidation(_) | Self::KeyDecoding(_) => StatusCode::BAD_REQUEST,
            Self::KeyDerivation(
                KeyError::InvalidSecretLength { .. } | KeyError::InvalidSecretEncoding(_),
            ) => StatusCode::BAD_REQUEST,
            Self::KeyDerivation(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::KeyDerivationTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::LedgerQuery(error) => {
                if error.is_timeout() {
                    StatusCode::GATEWAY_TIMEOUT
                } else {
                    StatusCode::BAD_GATEWAY
                }
            }
            Self::Funding(error) => {
                if matches!(error.failure, FundingFailure::NoWallet) {
                    StatusCode::BAD_REQUEST
                } else if error.is_timeout() {
                    StatusCode::GATEWAY_TIMEOUT
                } else {
                    StatusCode::BAD_GATEWAY
                }
            }
            Self::Publication(PublicationError::Signing(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Publication(error) => {
                if error.is_timeout() {
                    StatusCode::GATEWAY_TIMEOUT
                } else {
                    StatusCode::BAD_GATEWAY
                }
            }
        }
    }

    /// Returns true when sending the same request again cannot cause a
    /// duplicate side effect.
    pub const fn retryable(&self) -> bool {
        match self {
            Self::RequestValidation(_)
            | Self::KeyDerivation(_)
            | Self::KeyDerivationTimeout(_)
            | Self::KeyDecoding(_)
            | Self::Internal(_) => false,
            Self::LedgerQuery(_) => true,
            Self::Funding(error) => error.is_retryable(),
            Self::Publication(error) => !error.maybe_accepted(),
        }
    }

    /// The funding stage reached, for funding failures.
    pub const fn funding_stage(&self) -> Option<&FundingStage> {
        match self {
            Self::Funding(error) => Some(&error.stage),
            _ => None,
        }
    }

    /// Whether funds were spent, for funding failures.
    ///
    /// `Some(None)` means a swap was broadcast and the outcome is unknown.
    pub const fn used_funding(&self) -> Option<Option<bool>> {
        match self {
            Self::Funding(error) => {
                if matches!(error.stage, FundingStage::NotStarted) {
                    Some(Some(false))
                } else {
                    Some(None)
                }
            }
            _ => None,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorDetail<'a> {
    kind: &'static str,
    message: String,
    retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    funding_stage: Option<&'a FundingStage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    used_funding: Option<Option<bool>>,
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: ErrorDetail<'a>,
}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        let status = self.status();
        let kind: &'static str = self.kind().into();
        if status.is_server_error() {
            tracing::error!(kind, %status, error = %self, "request failed");
        } else {
            tracing::warn!(kind, %status, error = %self, "request rejected");
        }

        let body = ErrorBody {
            error: ErrorDetail {
                kind,
                message: self.to_string(),
                retryable: self.retryable(),
                funding_stage: self.funding_stage(),
                used_funding: self.used_funding(),
            },
        };
        (status, Json(body)).into_response()
    }
}
