//! API Integration Tests

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use tower::util::ServiceExt;

use lucky_envelope::api::{self, AppState};

mod common;

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
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
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => s.parse().unwrap(),
        other => other.to_string().parse().unwrap(),
    }
}

async fn create_account(app: &Router, prefix: &str, opening_balance: &str) -> (String, String) {
    let user_id = common::unique(prefix);
    let (status, body) = call(
        app,
        "POST",
        "/api/v1/accounts",
        Some(json!({
            "user_id": user_id,
            "username": prefix,
            "opening_balance": opening_balance,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "account creation failed: {}", body);
    (user_id, body["account_no"].as_str().unwrap().to_string())
}

#[tokio::test]
async fn test_envelope_flow_e2e() {
    let Some(pool) = common::setup_test_db().await else {
        return;
    };
    let app = api::build_app(AppState::new(pool.clone(), common::distributor(&pool)));

    // 1. Sender and two receivers
    let (sender_id, sender_account) = create_account(&app, "alice", "10.00").await;
    let (bob_id, bob_account) = create_account(&app, "bob", "").await;
    let (carol_id, _) = create_account(&app, "carol", "").await;

    // 2. Top up the sender
    let (status, entry) = call(
        &app,
        "POST",
        &format!("/api/v1/accounts/{}/deposits", sender_account),
        Some(json!({ "amount": "2.00" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(decimal(&entry["balance"]), dec!(12.00));

    // 3. Send a general pool of 2 x 3.00
    let (status, activity) = call(
        &app,
        "POST",
        "/api/v1/envelopes",
        Some(json!({
            "user_id": sender_id,
            "username": "alice",
            "envelope_type": "general",
            "amount": "3.00",
            "quantity": 2,
            "blessing": "good luck",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "send failed: {}", activity);
    let envelope_no = activity["envelope_no"].as_str().unwrap().to_string();
    assert!(activity["link"].as_str().unwrap().ends_with(&envelope_no));
    assert_eq!(decimal(&activity["amount"]), dec!(6.00));

    // 4. Both receivers claim
    for (user_id, username) in [(&bob_id, "bob"), (&carol_id, "carol")] {
        let (status, claim) = call(
            &app,
            "POST",
            &format!("/api/v1/envelopes/{}/receive", envelope_no),
            Some(json!({ "user_id": user_id, "username": username })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "claim failed: {}", claim);
        assert_eq!(decimal(&claim["amount"]), dec!(3.00));
    }

    // 5. The pool is exhausted
    let (dave_id, _) = create_account(&app, "dave", "").await;
    let (status, error) = call(
        &app,
        "POST",
        &format!("/api/v1/envelopes/{}/receive", envelope_no),
        Some(json!({ "user_id": dave_id, "username": "dave" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error["error_code"], "envelope_depleted");

    // 6. Balances and claim listing
    let (status, sender) = call(&app, "GET", &format!("/api/v1/accounts/{}", sender_account), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decimal(&sender["balance"]), dec!(6.00));

    let (_, bob) = call(&app, "GET", &format!("/api/v1/accounts/{}", bob_account), None).await;
    assert_eq!(decimal(&bob["balance"]), dec!(3.00));

    let (status, claims) = call(
        &app,
        "GET",
        &format!("/api/v1/envelopes/{}/claims", envelope_no),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let claims = claims.as_array().unwrap();
    assert_eq!(claims.len(), 2);
    assert!(claims.iter().all(|c| c["is_luckiest"] == json!(false)));

    let (status, logs) = call(
        &app,
        "GET",
        &format!("/api/v1/accounts/{}/logs", sender_account),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(logs.as_array().unwrap().len(), 3);

    let (status, sent) = call(
        &app,
        "GET",
        &format!("/api/v1/users/{}/envelopes?page=1&size=10", sender_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(sent.as_array().unwrap().len(), 1);

    let (status, received) = call(&app, "GET", &format!("/api/v1/users/{}/claims", bob_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(received.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_error_mapping() {
    let Some(pool) = common::setup_test_db().await else {
        return;
    };
    let app = api::build_app(AppState::new(pool.clone(), common::distributor(&pool)));

    let (status, error) = call(&app, "GET", "/api/v1/envelopes/does-not-exist", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error["error_code"], "envelope_not_found");

    let (status, error) = call(&app, "GET", "/api/v1/accounts/does-not-exist", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error["error_code"], "account_not_found");

    let (user_id, _) = create_account(&app, "erin", "1.00").await;

    let (status, error) = call(
        &app,
        "POST",
        "/api/v1/accounts",
        Some(json!({ "user_id": user_id, "username": "erin" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error["error_code"], "duplicate_account");

    let (status, error) = call(
        &app,
        "POST",
        "/api/v1/envelopes",
        Some(json!({
            "user_id": user_id,
            "username": "erin",
            "envelope_type": "lucky",
            "amount": "5.00",
            "quantity": 2,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["error_code"], "insufficient_funds");

    let (status, error) = call(
        &app,
        "POST",
        "/api/v1/envelopes",
        Some(json!({
            "user_id": user_id,
            "username": "erin",
            "envelope_type": "lucky",
            "amount": "0.50",
            "quantity": 0,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["error_code"], "validation_error");
}

#[tokio::test]
async fn test_health_and_request_id() {
    let Some(pool) = common::setup_test_db().await else {
        return;
    };
    let app = api::build_app(AppState::new(pool.clone(), common::distributor(&pool)));

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_longest_accepted_names_persist() {
    let Some(pool) = common::setup_test_db().await else {
        return;
    };
    let app = api::build_app(AppState::new(pool.clone(), common::distributor(&pool)));

    let sender_name = "y".repeat(64);
    let sender_id = common::unique("long");
    let (status, account) = call(
        &app,
        "POST",
        "/api/v1/accounts",
        Some(json!({
            "user_id": sender_id,
            "username": sender_name,
            "opening_balance": "5.00",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "account creation failed: {}", account);
    assert_eq!(account["username"], json!(sender_name));
    assert!(account["account_name"].as_str().unwrap().chars().count() <= 64);

    let receiver_name = "z".repeat(64);
    let receiver_id = common::unique("long");
    let (status, _) = call(
        &app,
        "POST",
        "/api/v1/accounts",
        Some(json!({ "user_id": receiver_id, "username": receiver_name })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, activity) = call(
        &app,
        "POST",
        "/api/v1/envelopes",
        Some(json!({
            "user_id": sender_id,
            "username": sender_name,
            "envelope_type": "general",
            "amount": "1.00",
            "quantity": 1,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "send failed: {}", activity);
    let envelope_no = activity["envelope_no"].as_str().unwrap().to_string();

    let (status, claim) = call(
        &app,
        "POST",
        &format!("/api/v1/envelopes/{}/receive", envelope_no),
        Some(json!({ "user_id": receiver_id, "username": receiver_name })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "claim failed: {}", claim);

    // One character over is rejected before anything is written
    let (status, error) = call(
        &app,
        "POST",
        "/api/v1/envelopes",
        Some(json!({
            "user_id": sender_id,
            "username": "y".repeat(65),
            "envelope_type": "general",
            "amount": "1.00",
            "quantity": 1,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["error_code"], "validation_error");

    let (status, error) = call(
        &app,
        "POST",
        &format!("/api/v1/envelopes/{}/receive", envelope_no),
        Some(json!({ "user_id": receiver_id, "username": "z".repeat(65) })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["error_code"], "validation_error");

    let (_, account) = call(&app, "GET", &format!("/api/v1/accounts/{}", account["account_no"].as_str().unwrap()), None).await;
    assert_eq!(decimal(&account["balance"]), dec!(4.00));
}
