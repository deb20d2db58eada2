//! The JSON-RPC surface driven end to end against in-memory services.
#![allow(missing_docs)]

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::U256;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use permakey_primitives::{DEFAULT_SEED_LABEL, Jwk, RsaKeyGenerator, SourceSecret, StorageAddress};
use permakey_service::funding::{Funder, MemoryBridge, MemorySwap, SwapOutcome};
use permakey_service::http;
use permakey_service::ledger::{MemoryLedger, SubmitBehavior};
use permakey_service::orchestrator::{Orchestrator, Settings};
use permakey_tx::{MAX_INLINE_DATA_SIZE, Winston};
use serde_json::{Value, json};
use tower::ServiceExt;

const SECRET: &str = "0x0000000000000000000000000000000000000000000000000000000000000001";
const KEY_BITS: usize = 512;
const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\x00\x00\x00\rIHDR";

type State = Arc<Orchestrator<MemoryLedger, MemorySwap, MemoryBridge>>;

fn settings() -> Settings {
    Settings {
        key_bits: KEY_BITS,
        keygen_timeout: Duration::from_secs(120),
        ..Settings::default()
    }
}

fn derived_key() -> (Jwk, StorageAddress) {
    let secret = SourceSecret::from_hex(SECRET).unwrap();
    let key = RsaKeyGenerator::new(KEY_BITS)
        .unwrap()
        .generate_from_seed(&secret.derive_seed(DEFAULT_SEED_LABEL))
        .unwrap();
    (Jwk::from(&key), StorageAddress::from_keypair(&key))
}

fn state(ledger: MemoryLedger, swap: SwapOutcome, settings: Settings) -> State {
    let funder = Funder::new(MemorySwap::new(swap), MemoryBridge::new(), Duration::from_secs(5));
    Arc::new(Orchestrator::new(ledger, funder, settings))
}

fn upload_body(key: (&str, Value)) -> Value {
    let mut params = json!({
        "fundingAmount": "0.5",
        "bridgeAmount": "0.02",
        "payload": STANDARD.encode(PNG),
    });
    params[key.0] = key.1;
    json!({"method": "autoSwapUpload", "params": params})
}

async fn call(state: &State, method: &str, path: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(path)
        .header("content-type", "application/json")
        .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
        .unwrap();

    let response = http::router(state.clone(), tracing::Level::DEBUG)
        .oneshot(request)
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn test_funded_address_skips_swap() {
    let (jwk, address) = derived_key();
    let ledger = MemoryLedger::new().with_balance(address, Winston::from_ar("0.02").unwrap());
    let state = state(ledger, SwapOutcome::Confirm, settings());

    let (status, body) = call(&state, "POST", "/", Some(upload_body(("sourceSecret", json!(SECRET))))).await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["usedFunding"], false);
    assert_eq!(body["fundingResult"], Value::Null);
    assert_eq!(body["contentType"], "image/png");
    assert_eq!(body["address"], address.to_string());
    assert_eq!(body["balanceWinston"], "20000000000");
    assert_eq!(body["jwk"]["n"], jwk.n);
    assert!(state.funder().swap().broadcasts().is_empty());

    let submitted = state.ledger().submitted();
    assert_eq!(submitted.len(), 1);
    submitted[0].verify().unwrap();
    assert_eq!(body["identifier"], submitted[0].id().unwrap().to_string());
}

#[tokio::test]
async fn test_large_payload_is_chunked() {
    let (_, address) = derived_key();
    let ledger = MemoryLedger::new().with_balance(address, Winston::from_ar("1").unwrap());
    let state = state(ledger, SwapOutcome::Confirm, settings());

    let mut payload = PNG.to_vec();
    payload.resize(3 * MAX_INLINE_DATA_SIZE, 7);
    let mut body = upload_body(("sourceSecret", json!(SECRET)));
    body["params"]["payload"] = json!(STANDARD.encode(&payload));

    let (status, body) = call(&state, "POST", "/", Some(body)).await;

    assert_eq!(status, StatusCode::OK, "{body}");
    let submitted = state.ledger().submitted();
    assert_eq!(submitted.len(), 1);
    assert!(submitted[0].data().is_empty());
    assert_eq!(body["identifier"], submitted[0].id().unwrap().to_string());

    let chunks = state.ledger().chunks();
    assert_eq!(chunks.len(), 3);
    let uploaded: Vec<u8> = chunks.iter().flat_map(|c| c.chunk.to_vec()).collect();
    assert_eq!(uploaded, payload);
}

#[tokio::test]
async fn test_low_balance_swaps_then_bridges() {
    let (_, address) = derived_key();
    let state = state(MemoryLedger::new(), SwapOutcome::Confirm, settings());

    let (status, body) = call(&state, "POST", "/rpc", Some(upload_body(("privateKey", json!(SECRET))))).await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["usedFunding"], true);
    assert!(body["fundingResult"]["swapTxHash"].is_string());

    let broadcasts = state.funder().swap().broadcasts();
    assert_eq!(broadcasts.len(), 1);
    assert_eq!(broadcasts[0].1, U256::from(500_000_000_000_000_000u128));

    let requests = state.funder().bridge().requests();
    assert_eq!(requests, vec![("0.02".to_string(), address)]);
    assert_eq!(state.ledger().submitted().len(), 1);
}

#[tokio::test]
async fn test_unconfirmed_swap_reports_stage() {
    let state = state(MemoryLedger::new(), SwapOutcome::NeverConfirm, settings());

    let (status, body) = call(&state, "POST", "/", Some(upload_body(("sourceSecret", json!(SECRET))))).await;

    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body["error"]["kind"], "FundingError");
    assert_eq!(body["error"]["retryable"], false);
    assert_eq!(body["error"]["fundingStage"]["stage"], "swapBroadcast");
    assert!(body["error"]["fundingStage"]["txHash"].is_string());
    assert!(body["error"].get("usedFunding").is_some_and(Value::is_null));
    assert!(state.funder().bridge().requests().is_empty());
    assert!(state.ledger().submitted().is_empty());
}

#[tokio::test]
async fn test_rejected_broadcast_reports_not_started() {
    let state = state(MemoryLedger::new(), SwapOutcome::RejectBroadcast, settings());

    let (status, body) = call(&state, "POST", "/", Some(upload_body(("sourceSecret", json!(SECRET))))).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["fundingStage"]["stage"], "notStarted");
    assert_eq!(body["error"]["usedFunding"], false);
    assert_eq!(body["error"]["retryable"], false);
    assert!(state.funder().bridge().requests().is_empty());
    assert!(state.ledger().submitted().is_empty());
}

#[tokio::test]
async fn test_lost_submission_is_not_retryable() {
    let (_, address) = derived_key();
    let ledger = MemoryLedger::new()
        .with_balance(address, Winston::from_ar("1").unwrap())
        .with_submit_behavior(SubmitBehavior::Disconnect);
    let state = state(ledger, SwapOutcome::Confirm, settings());

    let (status, body) = call(&state, "POST", "/", Some(upload_body(("sourceSecret", json!(SECRET))))).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["kind"], "PublicationError");
    assert_eq!(body["error"]["retryable"], false);
}

#[tokio::test]
async fn test_supplied_key_is_used_as_is() {
    let (jwk, address) = derived_key();
    let ledger = MemoryLedger::new().with_balance(address, Winston::from_ar("1").unwrap());
    let state = state(ledger, SwapOutcome::Confirm, settings());

    let (status, body) = call(
        &state,
        "POST",
        "/",
        Some(upload_body(("jwk", serde_json::to_value(&jwk).unwrap()))),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["address"], address.to_string());
    assert!(body.get("jwk").is_none());
}

#[tokio::test]
async fn test_malformed_jwk_never_reaches_ledger() {
    let state = state(MemoryLedger::new(), SwapOutcome::Confirm, settings());
    let (mut jwk, _) = derived_key();
    jwk.p = "not*base64url".into();
    let jwk = serde_json::to_value(&jwk).unwrap();

    let (status, body) = call(&state, "POST", "/", Some(upload_body(("jwk", jwk)))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "KeyDecodingError");
    assert_eq!(state.ledger().calls(), 0);
}

#[tokio::test]
async fn test_supplied_key_without_funding_wallet() {
    let (jwk, _) = derived_key();
    let state = state(MemoryLedger::new(), SwapOutcome::Confirm, settings());

    let (status, body) = call(
        &state,
        "POST",
        "/",
        Some(upload_body(("jwk", serde_json::to_value(&jwk).unwrap()))),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "FundingError");
    assert_eq!(body["error"]["fundingStage"]["stage"], "notStarted");
    assert!(state.funder().swap().broadcasts().is_empty());
}

#[tokio::test]
async fn test_unavailable_ledger_is_retryable() {
    let state = state(MemoryLedger::new().unavailable(), SwapOutcome::Confirm, settings());

    let (status, body) = call(&state, "POST", "/", Some(upload_body(("sourceSecret", json!(SECRET))))).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["kind"], "LedgerQueryError");
    assert_eq!(body["error"]["retryable"], true);
}

#[tokio::test]
async fn test_zero_secret_is_rejected() {
    let state = state(MemoryLedger::new(), SwapOutcome::Confirm, settings());
    let zero = "0x0000000000000000000000000000000000000000000000000000000000000000";

    let (status, body) = call(&state, "POST", "/", Some(upload_body(("sourceSecret", json!(zero))))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "RequestValidationError");
    assert_eq!(state.ledger().calls(), 0);
}

#[tokio::test]
async fn test_keygen_deadline() {
    let settings = Settings {
        key_bits: 4096,
        keygen_timeout: Duration::from_millis(1),
        ..Settings::default()
    };
    let state = state(MemoryLedger::new(), SwapOutcome::Confirm, settings);

    let (status, body) = call(&state, "POST", "/", Some(upload_body(("sourceSecret", json!(SECRET))))).await;

    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body["error"]["kind"], "KeyDerivationError");
    assert_eq!(state.ledger().calls(), 0);
}

#[tokio::test]
async fn test_envelope_errors() {
    let state = state(MemoryLedger::new(), SwapOutcome::Confirm, settings());

    let (status, _) = call(&state, "GET", "/", None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

    let (status, body) = call(&state, "POST", "/", Some(json!({"method": "eth_call"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["message"].as_str().unwrap().contains("unknown method"));

    let (status, body) = call(&state, "POST", "/", Some(json!([1, 2, 3]))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "RequestValidationError");
}

#[tokio::test]
async fn test_status_routes() {
    let state = state(MemoryLedger::new(), SwapOutcome::Confirm, settings());

    let (status, body) = call(&state, "GET", "/_status/livez", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = call(&state, "GET", "/_status/version", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "permakey-service");
}
