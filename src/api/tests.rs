use super::*;
use crate::{
    api::test_helpers::{sample_block, test_context, MockEngine, RecordingProvider},
    config::{parse_blacklist, BlacklistSettings},
    relay::{eip712::TypedData, INVALID_SIGNATURE, META_CALL_GAS},
    rpc::{Dispatcher, MethodRegistry},
};
use alloy_primitives::{Address, U256};
use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use k256::ecdsa::SigningKey;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceExt;

struct TestApp {
    router: Router,
    engine: Arc<MockEngine>,
    provider: Arc<RecordingProvider>,
}

fn create_test_app_with(network_id: &str, provider: RecordingProvider) -> TestApp {
    let engine = Arc::new(MockEngine::new(network_id));
    let provider = Arc::new(provider);
    let context = test_context(network_id, engine.clone(), provider.clone());
    let dispatcher = Dispatcher::new(Arc::new(MethodRegistry::standard()), context);
    let blacklist = parse_blacklist(&BlacklistSettings {
        ipv4: vec!["10.1.2.3".to_string()],
        ipv6: vec![],
    })
    .unwrap();

    TestApp {
        router: create_router(AppState::new(dispatcher, blacklist)),
        engine,
        provider,
    }
}

fn create_test_app() -> TestApp {
    create_test_app_with("testnet", RecordingProvider::default())
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn rpc_call(app: &TestApp, method: &str, params: Value) -> Value {
    let response = app
        .router
        .clone()
        .oneshot(post_json("/", &json!({ "jsonrpc": "2.0", "id": 1, "method": method, "params": params })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    read_body(response).await
}

/// Signs `data` with a fixed key whose address is written into `message.sender`.
fn signed_relay_body(mut data: Value) -> Value {
    let key = SigningKey::from_slice(&[7u8; 32]).unwrap();
    let point = key.verifying_key().to_encoded_point(false);
    let sender = Address::from_raw_public_key(&point.as_bytes()[1..]);
    data["message"]["sender"] = json!(sender.to_string());

    let typed: TypedData = serde_json::from_value(data.clone()).unwrap();
    let hash = typed.eip712_signing_hash().unwrap();
    let (signature, recovery_id) = key.sign_prehash_recoverable(hash.as_slice()).unwrap();
    let mut bytes = signature.to_bytes().to_vec();
    bytes.push(recovery_id.to_byte() + 27);

    json!({ "id": 11, "data": data, "signature": format!("0x{}", hex::encode(bytes)) })
}

fn meta_call_data() -> Value {
    json!({
        "types": {
            "NearTx": [
                { "name": "sender", "type": "address" },
                { "name": "nonce", "type": "uint256" },
                { "name": "feeAmount", "type": "uint256" },
                { "name": "feeAddress", "type": "address" },
                { "name": "contractAddress", "type": "address" },
                { "name": "contractMethod", "type": "string" },
                { "name": "value", "type": "uint256" },
                { "name": "arguments", "type": "Arguments" }
            ],
            "Arguments": [
                { "name": "petId", "type": "uint256" }
            ]
        },
        "primaryType": "NearTx",
        "domain": {
            "name": "Aurora",
            "version": "1",
            "chainId": 1313161555,
            "verifyingContract": "0x0000000000000000000000000000000000000000"
        },
        "message": {
            "sender": "0x0000000000000000000000000000000000000000",
            "nonce": "0",
            "feeAmount": "0",
            "feeAddress": "0x0000000000000000000000000000000000000000",
            "contractAddress": "0x00000000000000000000000000000000000000aa",
            "contractMethod": "adopt(uint256 petId)",
            "value": "0",
            "arguments": { "petId": "3" }
        }
    })
}

#[tokio::test]
async fn test_root_endpoint() -> Result<(), anyhow::Error> {
    let app = create_test_app();

    let response = app
        .router
        .oneshot(
            Request::builder()
                .uri("/")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json: Value = read_body(response).await;
    assert_eq!(
        json,
        json!({"message": "Aurora relayer is running on TestNet"})
    );
    Ok(())
}

#[tokio::test]
async fn test_net_version_on_testnet() {
    let app = create_test_app();
    let json = rpc_call(&app, "net_version", json!([])).await;
    assert_eq!(json, json!({ "jsonrpc": "2.0", "id": 1, "result": "1313161555" }));
}

#[tokio::test]
async fn test_rpc_path_alias() {
    let app = create_test_app();
    let response = app
        .router
        .oneshot(post_json("/rpc", &json!({ "jsonrpc": "2.0", "id": "x", "method": "eth_chainId" })))
        .await
        .unwrap();
    let json: Value = read_body(response).await;
    assert_eq!(json["result"], "0x4e454153");
    assert_eq!(json["id"], "x");
}

#[tokio::test]
async fn test_unknown_method() {
    let app = create_test_app();
    let json = rpc_call(&app, "eth_mineMeABlock", json!([])).await;
    assert_eq!(json["error"]["code"], -32601);
    assert!(json.get("result").is_none());
}

#[tokio::test]
async fn test_parse_error() {
    let app = create_test_app();
    let response = app
        .router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/")
                .body(Body::from("{\"jsonrpc\": "))
                .unwrap(),
        )
        .await
        .unwrap();
    let json: Value = read_body(response).await;
    assert_eq!(json["error"]["code"], -32700);
    assert_eq!(json["id"], Value::Null);
}

#[tokio::test]
async fn test_batch_request() {
    let app = create_test_app();
    let body = json!([
        { "jsonrpc": "2.0", "id": 1, "method": "net_listening" },
        { "jsonrpc": "2.0", "id": 2, "method": "nope" },
        { "jsonrpc": "2.0", "id": 3, "method": "eth_gasPrice" }
    ]);
    let response = app.router.oneshot(post_json("/", &body)).await.unwrap();
    let json: Value = read_body(response).await;

    let items = json.as_array().unwrap();
    assert_eq!(items.len(), 3);
    assert_eq!(items[0]["result"], true);
    assert_eq!(items[1]["error"]["code"], -32601);
    assert_eq!(items[2]["result"], "0x0");
}

#[tokio::test]
async fn test_get_balance() {
    let app = create_test_app();
    let address: Address = "0x00000000000000000000000000000000000000bb".parse().unwrap();
    app.engine.set_balance(address, U256::from(1_000u64));

    let json = rpc_call(&app, "eth_getBalance", json!([address.to_string(), "latest"])).await;
    assert_eq!(json["result"], "0x3e8");

    let invalid = rpc_call(&app, "eth_getBalance", json!(["0x1234"])).await;
    assert_eq!(invalid["error"]["code"], -32602);
}

#[tokio::test]
async fn test_reverted_call_carries_data() {
    let app = create_test_app();
    app.engine.set_view_result(Err(vec![0x08, 0xc3, 0x79, 0xa0]));

    let json = rpc_call(
        &app,
        "eth_call",
        json!([{ "to": "0x00000000000000000000000000000000000000bb", "data": "0x70a08231" }, "latest"]),
    )
    .await;
    assert_eq!(json["error"]["code"], 3);
    assert_eq!(json["error"]["message"], "execution reverted");
    assert_eq!(json["error"]["data"], "0x08c379a0");
    assert_eq!(app.engine.views()[0].data, vec![0x70, 0xa0, 0x82, 0x31]);
}

#[tokio::test]
async fn test_malformed_call_data_is_invalid_params() {
    let app = create_test_app();
    for data in ["0x70a0823", "70a08231"] {
        let json = rpc_call(
            &app,
            "eth_call",
            json!([{ "to": "0x00000000000000000000000000000000000000bb", "data": data }, "latest"]),
        )
        .await;
        assert_eq!(json["error"]["code"], -32602, "{}", data);
    }
    assert!(app.engine.views().is_empty());
}

#[tokio::test]
async fn test_block_by_number() {
    let app = create_test_app();
    app.engine.push_block(sample_block(5, 2));

    let json = rpc_call(&app, "eth_getBlockByNumber", json!(["0x5", false])).await;
    let block = &json["result"];
    assert_eq!(block["number"], "0x5");
    assert_eq!(block["transactions"].as_array().unwrap().len(), 2);
    assert!(block["hash"].as_str().unwrap().starts_with("0x0505"));

    let skipped = rpc_call(&app, "eth_getBlockByNumber", json!(["0x3", false])).await;
    assert_eq!(skipped["result"], Value::Null);

    let count = rpc_call(&app, "eth_getBlockTransactionCountByNumber", json!(["latest"])).await;
    assert_eq!(count["result"], "0x2");

    let tx = rpc_call(&app, "eth_getTransactionByBlockNumberAndIndex", json!(["0x5", "0x1"])).await;
    assert_eq!(tx["result"]["transactionIndex"], "0x1");
    let missing = rpc_call(&app, "eth_getTransactionByBlockNumberAndIndex", json!(["0x5", "0x9"])).await;
    assert_eq!(missing["result"], Value::Null);
}

#[tokio::test]
async fn test_transaction_by_index_fetches_block_once() {
    let app = create_test_app();
    app.engine.push_block(sample_block(5, 2));

    let tx = rpc_call(&app, "eth_getTransactionByBlockNumberAndIndex", json!(["0x5", "0x0"])).await;
    assert_eq!(tx["result"]["blockNumber"], "0x5");
    assert_eq!(app.engine.fetches(), vec![5]);

    let skipped = rpc_call(&app, "eth_getTransactionByBlockNumberAndIndex", json!(["0x3", "0x0"])).await;
    assert_eq!(skipped["result"], Value::Null);
    assert_eq!(app.engine.fetches(), vec![5, 3]);
}

#[tokio::test]
async fn test_send_raw_transaction_submits() {
    let app = create_test_app();
    let json = rpc_call(&app, "eth_sendRawTransaction", json!(["0xf86b01"])).await;

    let expected = alloy_primitives::keccak256([0xf8, 0x6b, 0x01]);
    assert_eq!(json["result"], format!("0x{}", hex::encode(expected)));
    let calls = app.provider.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].method, "submit");
    assert_eq!(calls[0].contract_id, "aurora");
    assert_eq!(calls[0].args, vec![0xf8, 0x6b, 0x01]);
}

#[tokio::test]
async fn test_relay_rejects_bad_signature() {
    let app = create_test_app();
    let body = json!({ "id": 4, "data": meta_call_data(), "signature": "0xdeadbeef" });

    let response = app.router.clone().oneshot(post_json("/relay", &body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json: Value = read_body(response).await;

    assert_eq!(
        json,
        json!({
            "jsonrpc": "2.0",
            "id": 4,
            "error": { "code": -32000, "message": INVALID_SIGNATURE }
        })
    );
    assert!(app.provider.calls().is_empty());
}

#[tokio::test]
async fn test_relay_rejects_missing_fields_and_garbage() {
    let app = create_test_app();

    let response = app
        .router
        .clone()
        .oneshot(post_json("/relay", &json!({ "data": meta_call_data() })))
        .await
        .unwrap();
    let json: Value = read_body(response).await;
    assert_eq!(json["error"]["message"], INVALID_SIGNATURE);

    let response = app
        .router
        .clone()
        .oneshot(Request::builder().method("POST").uri("/relay").body(Body::from("nonsense")).unwrap())
        .await
        .unwrap();
    let json: Value = read_body(response).await;
    assert_eq!(json["error"]["code"], -32000);
    assert!(app.provider.calls().is_empty());
}

#[tokio::test]
async fn test_relay_rejects_signer_mismatch() {
    let app = create_test_app();
    let mut body = signed_relay_body(meta_call_data());
    body["data"]["message"]["sender"] = json!("0x00000000000000000000000000000000000000cc");

    let response = app.router.clone().oneshot(post_json("/relay", &body)).await.unwrap();
    let json: Value = read_body(response).await;
    assert_eq!(json["error"]["message"], INVALID_SIGNATURE);
    assert!(app.provider.calls().is_empty());
}

#[tokio::test]
async fn test_relay_submits_valid_meta_call() {
    let app = create_test_app();
    let body = signed_relay_body(meta_call_data());

    let response = app.router.clone().oneshot(post_json("/relay", &body)).await.unwrap();
    let json: Value = read_body(response).await;

    assert_eq!(json["id"], 11);
    assert_eq!(json["result"], json!({ "status": { "SuccessValue": "" } }));
    let calls = app.provider.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].method, "meta_call");
    assert_eq!(calls[0].gas, META_CALL_GAS);
    assert_eq!(calls[0].deposit, 0);
    // v || r || s, then the RLP body
    assert!(calls[0].args.len() > 65);
    assert!(calls[0].args[0] <= 1);
}

#[tokio::test]
async fn test_relay_accepts_high_s_signature() {
    let app = create_test_app();
    let mut body = signed_relay_body(meta_call_data());

    let n = U256::from_str_radix(
        "fffffffffffffffffffffffffffffffebaaedce6af48a03bbfd25e8cd0364141",
        16,
    )
    .unwrap();
    let raw = body["signature"].as_str().unwrap().to_string();
    let mut bytes = hex::decode(&raw[2..]).unwrap();
    let s = U256::from_be_slice(&bytes[32..64]);
    bytes[32..64].copy_from_slice(&(n - s).to_be_bytes::<32>());
    bytes[64] = if bytes[64] == 27 { 28 } else { 27 };
    body["signature"] = json!(format!("0x{}", hex::encode(&bytes)));

    let response = app.router.clone().oneshot(post_json("/relay", &body)).await.unwrap();
    let json: Value = read_body(response).await;

    assert_eq!(json["result"], json!({ "status": { "SuccessValue": "" } }));
    let calls = app.provider.calls();
    assert_eq!(calls.len(), 1);
    // forwarded in low-S form
    assert_eq!(&calls[0].args[33..65], &s.to_be_bytes::<32>());
}

#[tokio::test]
async fn test_relay_reports_submission_failure() {
    let app = create_test_app_with("testnet", RecordingProvider::failing("Exceeded the prepaid gas"));
    let body = signed_relay_body(meta_call_data());

    let response = app.router.clone().oneshot(post_json("/relay", &body)).await.unwrap();
    let json: Value = read_body(response).await;
    assert_eq!(json["error"]["code"], -32000);
    assert_eq!(json["error"]["message"], "Exceeded the prepaid gas");
    assert_eq!(app.provider.calls().len(), 1);
}

#[tokio::test]
async fn test_blacklisted_peer_is_forbidden() {
    let app = create_test_app();

    let mut request = post_json("/", &json!({ "jsonrpc": "2.0", "id": 1, "method": "net_version" }));
    request
        .extensions_mut()
        .insert(ConnectInfo("10.1.2.3:5555".parse::<SocketAddr>().unwrap()));
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body: Value = read_body(response).await;
    assert_eq!(body, json!({ "error": "Forbidden" }));

    let mut request = post_json("/", &json!({ "jsonrpc": "2.0", "id": 1, "method": "net_version" }));
    request
        .extensions_mut()
        .insert(ConnectInfo("[::ffff:10.1.2.4]:5555".parse::<SocketAddr>().unwrap()));
    let response = app.router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_request_id_and_security_headers() {
    let app = create_test_app();

    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let generated = response.headers().get(&REQUEST_ID).unwrap().to_str().unwrap();
    assert_eq!(generated.len(), 36);
    assert_eq!(response.headers()[header::X_CONTENT_TYPE_OPTIONS], "nosniff");

    let response = app
        .router
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("x-request-id", "client-42")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.headers()[&REQUEST_ID], "client-42");
}

#[derive(Clone, Default)]
struct CapturedLogs(Arc<std::sync::Mutex<Vec<u8>>>);

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_requests_are_traced() {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let app = create_test_app();
    let response = app
        .router
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
    assert!(output.contains("finished processing request"), "{}", output);
    assert!(output.contains("/health"), "{}", output);
}

#[tokio::test]
async fn test_health() {
    let app = create_test_app();
    let response = app
        .router
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let health: HealthResponse = read_body(response).await;
    assert_eq!(health.status, "ok");
    assert_eq!(health.network, "testnet");
    assert_eq!(health.chain_id, 1313161555);
    assert_eq!(health.engine, "aurora");
}

async fn read_body<T>(response: Response) -> T
where
    T: serde::de::DeserializeOwned,
{
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
