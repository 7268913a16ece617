//! HTTP API tests
//!
//! Run requests through the full router (CORS, tracing, nesting) without
//! binding a socket.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use gatepost::chain::{Chain, MockChainReader, SnapshotCollector};
use gatepost::challenge::signature::{address_of, sign_personal_message};
use gatepost::challenge::ChallengeConfig;
use gatepost::credential::{CredentialTokenConfig, InMemoryCredentialRepository};
use gatepost::gating::{Amount, CategoryRegistry, InMemoryLockRepository};
use gatepost::http_server::{GateService, HttpServer, HttpServerConfig};
use k256::ecdsa::SigningKey;
use serde_json::{json, Value};
use tower::ServiceExt;

// =============================================================================
// Test Utilities
// =============================================================================

const ADMIN: &str = "test-admin-token";

fn app(reader: Arc<MockChainReader>) -> Router {
    let service = GateService::new(
        CategoryRegistry::with_defaults(),
        InMemoryLockRepository::new(),
        InMemoryCredentialRepository::new(),
        SnapshotCollector::new().with_reader(reader),
        CredentialTokenConfig {
            secret: "http_test_secret_value".to_string(),
            ..Default::default()
        },
        ChallengeConfig::default(),
    );
    let config = HttpServerConfig {
        admin_token: Some(ADMIN.to_string()),
        ..Default::default()
    };
    HttpServer::new(config, service).router()
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    headers: &[(&str, &str)],
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn lock_body() -> Value {
    json!({
        "fulfillment": "all",
        "categories": [{
            "category_type": "ethereum_profile",
            "config": {
                "requirements": [{ "type": "eth_balance", "min": "1000000000000000000" }]
            }
        }]
    })
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn test_health_and_categories() {
    let app = app(Arc::new(MockChainReader::new(Chain::Ethereum)));

    let (status, body) = send(&app, "GET", "/health", &[], None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = send(&app, "GET", "/gating/categories", &[], None).await;
    assert_eq!(status, StatusCode::OK);
    let types: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|c| c["category_type"].as_str())
        .collect();
    assert!(types.contains(&"ethereum_profile"));
    assert!(types.contains(&"universal_profile"));
}

#[tokio::test]
async fn test_lock_writes_require_admin_token() {
    let app = app(Arc::new(MockChainReader::new(Chain::Ethereum)));

    let (status, body) = send(&app, "PUT", "/gating/posts/p1/lock", &[], Some(lock_body())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], 401);

    let (status, body) = send(
        &app,
        "PUT",
        "/gating/posts/p1/lock",
        &[("x-admin-token", ADMIN)],
        Some(lock_body()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let fingerprint = body["fingerprint"].as_str().unwrap().to_string();

    let (status, body) = send(&app, "GET", "/gating/posts/p1/lock", &[], None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["fingerprint"], fingerprint.as_str());

    let (status, _) = send(
        &app,
        "DELETE",
        "/gating/posts/p1/lock",
        &[("x-admin-token", ADMIN)],
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, "GET", "/gating/posts/p1/lock", &[], None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_body_is_json_error() {
    let app = app(Arc::new(MockChainReader::new(Chain::Ethereum)));

    let (status, body) = send(
        &app,
        "POST",
        "/gating/posts/p1/challenge",
        &[],
        Some(json!({ "claims": "nope" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 400);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_challenge_verify_access_round() {
    let reader = Arc::new(MockChainReader::new(Chain::Ethereum));
    let key = SigningKey::from_slice(&[0x5a; 32]).unwrap();
    let wallet = address_of(key.verifying_key());
    reader
        .update(|s| s.account_mut(wallet).native_balance = Amount(2_000_000_000_000_000_000))
        .unwrap();
    let app = app(reader);

    send(
        &app,
        "PUT",
        "/gating/posts/p1/lock",
        &[("x-admin-token", ADMIN)],
        Some(lock_body()),
    )
    .await;

    let (status, body) = send(
        &app,
        "POST",
        "/gating/posts/p1/status",
        &[],
        Some(json!({ "addresses": { "ethereum_profile": wallet.to_checksum() } })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["can_comment"], true);

    let (status, access) = send(&app, "GET", "/gating/posts/p1/access", &[], None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(access["code"], 401);

    let (status, challenge) = send(
        &app,
        "POST",
        "/gating/posts/p1/challenge",
        &[],
        Some(json!({
            "claims": [{ "category_type": "ethereum_profile", "address": wallet.to_checksum() }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let message = challenge["messages"][0]["message"].as_str().unwrap();
    let signature = sign_personal_message(&key, message).unwrap();

    let verify_body = json!({
        "nonce": challenge["nonce"],
        "claims": [{
            "category_type": "ethereum_profile",
            "address": wallet.to_checksum(),
            "signature": signature
        }]
    });
    let (status, verified) = send(
        &app,
        "POST",
        "/gating/posts/p1/verify",
        &[],
        Some(verify_body.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(verified["token_type"], "bearer");
    let token = verified["token"].as_str().unwrap().to_string();

    let (status, replay) =
        send(&app, "POST", "/gating/posts/p1/verify", &[], Some(verify_body)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(replay["error"], "Invalid or expired nonce");

    let bearer = format!("Bearer {}", token);
    let (status, access) = send(
        &app,
        "GET",
        "/gating/posts/p1/access",
        &[("authorization", bearer.as_str())],
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(access["can_comment"], true);

    let credential_id = verified["credential"]["id"].as_str().unwrap();
    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/gating/credentials/{}", credential_id),
        &[("x-admin-token", ADMIN)],
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, revoked) = send(
        &app,
        "GET",
        "/gating/posts/p1/access",
        &[("authorization", bearer.as_str())],
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(revoked["error"], "Credential has been revoked");

    let (status, metrics) = send(&app, "GET", "/metrics", &[], None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(metrics["verifications_passed"], 1);
}
