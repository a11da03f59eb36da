//! Gateway dispatch and authorization integration tests.
//!
//! Require a PostgreSQL instance via TEST_DATABASE_URL; run with
//! `cargo test -- --ignored`.

mod common;

use common::{unique_id, TestApp};
use serde_json::{json, Value};

#[tokio::test]
#[ignore]
async fn unknown_action_returns_invalid_action() {
    let app = TestApp::spawn().await;

    let response = app
        .post_action(json!({
            "action": "mint_money",
        }))
        .await;
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Invalid action");
}

#[tokio::test]
#[ignore]
async fn missing_action_field_is_rejected() {
    let app = TestApp::spawn().await;

    let response = app
        .post_action(json!({
            "student_id": unique_id("student"),
            "amount": 500,
        }))
        .await;
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Invalid action");
}

#[tokio::test]
#[ignore]
async fn non_admin_caller_is_forbidden() {
    let app = TestApp::spawn().await;

    let response = app
        .post_action_as(
            json!({
                "action": "create_transaction",
                "student_id": unique_id("student"),
                "amount": 500,
            }),
            Some("student-1"),
            Some("student"),
        )
        .await;
    assert_eq!(response.status(), 403);
}

#[tokio::test]
#[ignore]
async fn missing_identity_headers_are_forbidden() {
    let app = TestApp::spawn().await;

    let response = app
        .post_action_as(
            json!({
                "action": "create_transaction",
                "student_id": unique_id("student"),
                "amount": 500,
            }),
            None,
            None,
        )
        .await;
    assert_eq!(response.status(), 403);
}

#[tokio::test]
#[ignore]
async fn health_endpoint_reports_ok() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .get(format!("{}/health", app.address))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "finance-service");
}
