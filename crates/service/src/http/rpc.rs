//! The `autoSwapUpload` JSON-RPC method

use std::sync::Arc;

use alloy_primitives::U256;
use alloy_primitives::utils::parse_ether;
use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use permakey_primitives::{Jwk, SourceSecret};
use permakey_tx::Winston;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::RequestError;
use crate::funding::{Bridge, FundingPlan, SwapExecutor};
use crate::ledger::Ledger;
use crate::orchestrator::{KeySource, Orchestrator, UploadOutcome, UploadRequest};

/// The only supported method.
pub const UPLOAD_METHOD: &str = "autoSwapUpload";

/// A JSON-RPC style envelope.
#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    /// Method name.
    pub method: String,
    /// Method parameters.
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Parameters of [`UPLOAD_METHOD`].
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadParams {
    /// Hex EVM private key.
    #[serde(default, alias = "privateKey")]
    pub source_secret: Option<String>,
    /// A storage-network key, instead of a secret.
    #[serde(default)]
    pub jwk: Option<serde_json::Value>,
    /// Native tokens to swap, decimal.
    #[serde(default, alias = "maticAmount", deserialize_with = "string_or_number")]
    pub funding_amount: Option<String>,
    /// Wrapped AR to bridge, decimal.
    #[serde(default, alias = "warAmount", deserialize_with = "string_or_number")]
    pub bridge_amount: Option<String>,
    /// Base64 data to publish.
    #[serde(default, alias = "fileData")]
    pub payload: Option<String>,
}

fn string_or_number<'de, D: Deserializer<'de>>(de: D) -> Result<Option<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Amount {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(Option::<Amount>::deserialize(de)?.map(|amount| match amount {
        Amount::Text(text) => text,
        Amount::Number(number) => number.to_string(),
    }))
}

fn invalid(message: impl Into<String>) -> RequestError {
    RequestError::RequestValidation(message.into())
}

fn required(value: Option<String>, name: &str) -> Result<String, RequestError> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        _ => Err(invalid(format!("{name} is required"))),
    }
}

fn decode_payload(encoded: &str, limit: usize) -> Result<Bytes, RequestError> {
    let bytes = STANDARD
        .decode(encoded)
        .or_else(|_| URL_SAFE_NO_PAD.decode(encoded.trim_end_matches('=')))
        .map_err(|e| invalid(format!("payload is not valid base64: {e}")))?;
    if bytes.len() > limit {
        return Err(invalid(format!(
            "payload of {} bytes exceeds the {limit} byte limit",
            bytes.len()
        )));
    }
    Ok(Bytes::from(bytes))
}

impl UploadParams {
    /// Validates the parameters into a pipeline request. A JWK is only checked
    /// for shape here; its integers are decoded by the pipeline.
    pub fn into_request(self, payload_limit: usize) -> Result<UploadRequest, RequestError> {
        let key = match (self.source_secret, self.jwk) {
            (Some(_), Some(_)) => return Err(invalid("supply either sourceSecret or jwk, not both")),
            (None, None) => return Err(invalid("sourceSecret or jwk is required")),
            (Some(secret), None) => KeySource::Derive(
                SourceSecret::from_hex(secret.trim()).map_err(RequestError::KeyDerivation)?,
            ),
            (None, Some(jwk)) => KeySource::Supplied(Box::new(
                serde_json::from_value::<Jwk>(jwk).map_err(|e| {
                    RequestError::KeyDecoding(permakey_primitives::KeyError::MalformedKey {
                        field: "jwk",
                        reason: e.to_string(),
                    })
                })?,
            )),
        };

        let funding_amount = required(self.funding_amount, "fundingAmount")?;
        let swap_amount = parse_ether(&funding_amount)
            .map_err(|e| invalid(format!("fundingAmount {funding_amount:?}: {e}")))?;
        if swap_amount == U256::ZERO {
            return Err(invalid("fundingAmount must be positive"));
        }

        let bridge_amount = required(self.bridge_amount, "bridgeAmount")?;
        let bridged = Winston::from_ar(&bridge_amount)
            .map_err(|e| invalid(format!("bridgeAmount {bridge_amount:?}: {e}")))?;
        if bridged == Winston::ZERO {
            return Err(invalid("bridgeAmount must be positive"));
        }

        let payload = decode_payload(&required(self.payload, "payload")?, payload_limit)?;

        Ok(UploadRequest {
            key,
            funding: FundingPlan::new(swap_amount, bridge_amount),
            payload,
        })
    }
}

/// Body of a successful upload.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    /// Transaction identifier.
    pub identifier: String,
    /// Detected MIME type.
    pub content_type: &'static str,
    /// Where the data can be fetched.
    pub url: String,
    /// Storage address that paid.
    pub address: String,
    /// Balance before funding, in AR.
    pub balance: String,
    /// Balance before funding, in winston.
    pub balance_winston: String,
    /// Whether the request swapped and bridged.
    pub used_funding: bool,
    /// Swap hash and bridge answer, when funding ran.
    pub funding_result: Option<serde_json::Value>,
    /// The derived key, in derive mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwk: Option<Jwk>,
}

impl From<UploadOutcome> for UploadResponse {
    fn from(outcome: UploadOutcome) -> Self {
        let used_funding = outcome.used_funding();
        Self {
            identifier: outcome.publication.identifier.to_string(),
            content_type: outcome.publication.content_type.mime,
            url: outcome.publication.url.to_string(),
            address: outcome.address.to_string(),
            balance: outcome.balance.to_ar_string(),
            balance_winston: outcome.balance.to_string(),
            used_funding,
            funding_result: outcome
                .funding
                .and_then(|receipt| serde_json::to_value(receipt).ok()),
            jwk: outcome.jwk,
        }
    }
}

/// Dispatches a JSON-RPC call.
pub async fn handler<L, S, B>(
    State(state): State<Arc<Orchestrator<L, S, B>>>,
    body: Bytes,
) -> Result<Response, RequestError>
where
    L: Ledger + 'static,
    S: SwapExecutor + 'static,
    B: Bridge + 'static,
{
    let request: RpcRequest = serde_json::from_slice(&body)
        .map_err(|e| invalid(format!("body is not a JSON-RPC request: {e}")))?;
    if request.method != UPLOAD_METHOD {
        return Err(invalid(format!("unknown method {:?}", request.method)));
    }

    let params: UploadParams = serde_json::from_value(request.params)
        .map_err(|e| invalid(format!("invalid params: {e}")))?;
    let upload = params.into_request(state.settings().max_payload_bytes)?;

    tracing::info!(
        method = UPLOAD_METHOD,
        payload_bytes = upload.payload.len(),
        derive = matches!(upload.key, KeySource::Derive(_)),
        "upload requested"
    );
    let outcome = state.upload(upload).await?;
    Ok(Json(UploadResponse::from(outcome)).into_response())
}
