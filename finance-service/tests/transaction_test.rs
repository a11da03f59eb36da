//! Transaction ledger integration tests.
//!
//! Require a PostgreSQL instance via TEST_DATABASE_URL; run with
//! `cargo test -- --ignored`.

mod common;

use common::{create_test_transaction, decimal_field, unique_id, TestApp};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use uuid::Uuid;

fn assert_receipt_shape(receipt: &str, prefix: &str) {
    let parts: Vec<&str> = receipt.split('-').collect();
    assert_eq!(parts.len(), 3, "unexpected receipt shape: {receipt}");
    assert_eq!(parts[0], prefix);
    assert_eq!(parts[1].len(), 8);
    assert_eq!(parts[2].len(), 4);
    assert!(parts[2].chars().all(|c| c.is_ascii_digit()));
}

#[tokio::test]
#[ignore]
async fn create_transaction_starts_pending_with_receipt_number() {
    let app = TestApp::spawn().await;
    let student_id = unique_id("student");

    let transaction = create_test_transaction(&app, &student_id, 500).await;

    assert_eq!(transaction["status"], "pending");
    assert_eq!(transaction["transaction_type"], "payment");
    assert_eq!(decimal_field(&transaction["amount"]), Decimal::from(500));
    assert!(transaction["paid_at"].is_null());
    assert_receipt_shape(transaction["receipt_number"].as_str().unwrap(), "REC");
}

#[tokio::test]
#[ignore]
async fn create_transaction_without_student_is_rejected() {
    let app = TestApp::spawn().await;

    let response = app
        .post_action(json!({
            "action": "create_transaction",
            "amount": 500,
        }))
        .await;
    assert_eq!(response.status(), 400);

    let response = app
        .post_action(json!({
            "action": "create_transaction",
            "student_id": "",
            "amount": 500,
        }))
        .await;
    assert!(response.status().is_client_error());
}

#[tokio::test]
#[ignore]
async fn create_transaction_without_amount_is_rejected() {
    let app = TestApp::spawn().await;

    let response = app
        .post_action(json!({
            "action": "create_transaction",
            "student_id": unique_id("student"),
        }))
        .await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
#[ignore]
async fn complete_transaction_stamps_paid_at() {
    let app = TestApp::spawn().await;
    let transaction = create_test_transaction(&app, &unique_id("student"), 500).await;
    let transaction_id = transaction["transaction_id"].as_str().unwrap();

    let response = app
        .post_action(json!({
            "action": "complete_transaction",
            "transaction_id": transaction_id,
        }))
        .await;
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();

    assert_eq!(body["data"]["status"], "completed");
    assert!(!body["data"]["paid_at"].is_null());
    assert!(body.get("warning").is_none());
}

#[tokio::test]
#[ignore]
async fn completing_twice_warns_and_restamps() {
    let app = TestApp::spawn().await;
    let transaction = create_test_transaction(&app, &unique_id("student"), 100).await;
    let transaction_id = transaction["transaction_id"].as_str().unwrap();

    let complete = json!({
        "action": "complete_transaction",
        "transaction_id": transaction_id,
    });

    let first = app.post_action(complete.clone()).await;
    assert_eq!(first.status(), 200);

    let second = app.post_action(complete).await;
    assert_eq!(second.status(), 200);
    let body: Value = second.json().await.unwrap();
    assert_eq!(body["data"]["status"], "completed");
    assert!(body["warning"].as_str().is_some());
}

#[tokio::test]
#[ignore]
async fn completing_unknown_transaction_is_not_found() {
    let app = TestApp::spawn().await;

    let response = app
        .post_action(json!({
            "action": "complete_transaction",
            "transaction_id": Uuid::new_v4(),
        }))
        .await;
    assert_eq!(response.status(), 404);
}

#[tokio::test]
#[ignore]
async fn refund_creates_completed_refund_and_marks_original() {
    let app = TestApp::spawn().await;
    let transaction = create_test_transaction(&app, &unique_id("student"), 500).await;
    let transaction_id = transaction["transaction_id"].as_str().unwrap();
    let original_receipt = transaction["receipt_number"].as_str().unwrap().to_string();

    app.post_action(json!({
        "action": "complete_transaction",
        "transaction_id": transaction_id,
    }))
    .await;

    let response = app
        .post_action(json!({
            "action": "refund_transaction",
            "transaction_id": transaction_id,
            "amount": 200,
        }))
        .await;
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    let refund = &body["data"];

    assert_eq!(refund["transaction_type"], "refund");
    assert_eq!(refund["status"], "completed");
    assert_eq!(decimal_field(&refund["amount"]), Decimal::from(200));
    assert!(!refund["paid_at"].is_null());
    assert!(refund["notes"]
        .as_str()
        .unwrap()
        .contains(&original_receipt));

    // Original flipped to refunded, never deleted.
    let original = app
        .db
        .get_transaction(Uuid::parse_str(transaction_id).unwrap())
        .await
        .unwrap()
        .expect("original transaction must survive the refund");
    assert_eq!(original.status, "refunded");
}

#[tokio::test]
#[ignore]
async fn refund_defaults_to_the_original_amount() {
    let app = TestApp::spawn().await;
    let transaction = create_test_transaction(&app, &unique_id("student"), 350).await;
    let transaction_id = transaction["transaction_id"].as_str().unwrap();

    app.post_action(json!({
        "action": "complete_transaction",
        "transaction_id": transaction_id,
    }))
    .await;

    let response = app
        .post_action(json!({
            "action": "refund_transaction",
            "transaction_id": transaction_id,
        }))
        .await;
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(decimal_field(&body["data"]["amount"]), Decimal::from(350));
}

#[tokio::test]
#[ignore]
async fn refunding_a_pending_transaction_is_rejected() {
    let app = TestApp::spawn().await;
    let transaction = create_test_transaction(&app, &unique_id("student"), 500).await;

    let response = app
        .post_action(json!({
            "action": "refund_transaction",
            "transaction_id": transaction["transaction_id"],
        }))
        .await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
#[ignore]
async fn refund_exceeding_original_is_rejected() {
    let app = TestApp::spawn().await;
    let transaction = create_test_transaction(&app, &unique_id("student"), 100).await;
    let transaction_id = transaction["transaction_id"].as_str().unwrap();

    app.post_action(json!({
        "action": "complete_transaction",
        "transaction_id": transaction_id,
    }))
    .await;

    let response = app
        .post_action(json!({
            "action": "refund_transaction",
            "transaction_id": transaction_id,
            "amount": 500,
        }))
        .await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
#[ignore]
async fn retried_refund_returns_the_existing_refund() {
    let app = TestApp::spawn().await;
    let transaction = create_test_transaction(&app, &unique_id("student"), 500).await;
    let transaction_id = transaction["transaction_id"].as_str().unwrap();

    app.post_action(json!({
        "action": "complete_transaction",
        "transaction_id": transaction_id,
    }))
    .await;

    let refund_request = json!({
        "action": "refund_transaction",
        "transaction_id": transaction_id,
    });

    let first = app.post_action(refund_request.clone()).await;
    assert_eq!(first.status(), 200);
    let first_body: Value = first.json().await.unwrap();

    let second = app.post_action(refund_request).await;
    assert_eq!(second.status(), 200);
    let second_body: Value = second.json().await.unwrap();

    assert_eq!(
        first_body["data"]["transaction_id"],
        second_body["data"]["transaction_id"],
        "retry must not create a second refund"
    );
    assert!(second_body["warning"].as_str().is_some());
}

#[tokio::test]
#[ignore]
async fn completing_a_refunded_transaction_is_rejected() {
    let app = TestApp::spawn().await;
    let transaction = create_test_transaction(&app, &unique_id("student"), 500).await;
    let transaction_id = transaction["transaction_id"].as_str().unwrap();

    app.post_action(json!({
        "action": "complete_transaction",
        "transaction_id": transaction_id,
    }))
    .await;
    app.post_action(json!({
        "action": "refund_transaction",
        "transaction_id": transaction_id,
    }))
    .await;

    let response = app
        .post_action(json!({
            "action": "complete_transaction",
            "transaction_id": transaction_id,
        }))
        .await;
    assert_eq!(response.status(), 409);
}

#[tokio::test]
#[ignore]
async fn refunding_unknown_transaction_is_not_found() {
    let app = TestApp::spawn().await;

    let response = app
        .post_action(json!({
            "action": "refund_transaction",
            "transaction_id": Uuid::new_v4(),
        }))
        .await;
    assert_eq!(response.status(), 404);
}
