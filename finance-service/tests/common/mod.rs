//! Common test utilities for finance-service integration tests.

use finance_service::config::{DatabaseConfig, FinanceConfig};
use finance_service::services::Database;
use finance_service::startup::Application;
use rust_decimal::Decimal;
use serde_json::Value;
use service_core::config::Config as CommonConfig;
use std::str::FromStr;
use std::sync::Once;
use uuid::Uuid;

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,finance_service=debug,sqlx=warn")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// A running finance-service instance plus a client for driving it.
pub struct TestApp {
    pub address: String,
    pub client: reqwest::Client,
    pub db: Database,
}

impl TestApp {
    /// Boot the real application on a random port against TEST_DATABASE_URL.
    pub async fn spawn() -> Self {
        init_tracing();

        let database_url = std::env::var("TEST_DATABASE_URL")
            .expect("TEST_DATABASE_URL must be set to run integration tests");

        let config = FinanceConfig {
            common: CommonConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
            },
            service_name: "finance-service-test".to_string(),
            service_version: "test".to_string(),
            log_level: "debug".to_string(),
            json_logs: false,
            database: DatabaseConfig {
                url: database_url,
                max_connections: 2,
                min_connections: 1,
            },
        };

        let app = Application::build(config)
            .await
            .expect("Failed to build application");
        let port = app.port();
        let db = app.db().clone();

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        TestApp {
            address: format!("http://127.0.0.1:{}", port),
            client: reqwest::Client::new(),
            db,
        }
    }

    /// Post a ledger action as a verified admin.
    pub async fn post_action(&self, body: Value) -> reqwest::Response {
        self.client
            .post(format!("{}/api/ledger", self.address))
            .header("x-user-id", "admin-test")
            .header("x-user-role", "admin")
            .json(&body)
            .send()
            .await
            .expect("Failed to send request")
    }

    /// Post a ledger action with arbitrary identity headers.
    pub async fn post_action_as(
        &self,
        body: Value,
        user_id: Option<&str>,
        role: Option<&str>,
    ) -> reqwest::Response {
        let mut request = self.client.post(format!("{}/api/ledger", self.address));
        if let Some(user_id) = user_id {
            request = request.header("x-user-id", user_id);
        }
        if let Some(role) = role {
            request = request.header("x-user-role", role);
        }
        request
            .json(&body)
            .send()
            .await
            .expect("Failed to send request")
    }

    /// Seed a platform session row (owned by the scheduling module in prod).
    pub async fn seed_session(&self, teacher_id: &str, date: &str, status: &str) -> String {
        let session_id = format!("sess-{}", Uuid::new_v4());
        sqlx::query(
            r#"
            INSERT INTO sessions (session_id, teacher_id, session_date, status)
            VALUES ($1, $2, $3::date, $4)
            "#,
        )
        .bind(&session_id)
        .bind(teacher_id)
        .bind(date)
        .bind(status)
        .execute(self.db.pool())
        .await
        .expect("Failed to seed session");
        session_id
    }

    /// Seed (or update) a teacher profile hourly rate.
    pub async fn seed_teacher_rate(&self, teacher_id: &str, hourly_rate: Decimal) {
        sqlx::query(
            r#"
            INSERT INTO teacher_profiles (teacher_id, hourly_rate)
            VALUES ($1, $2)
            ON CONFLICT (teacher_id) DO UPDATE SET hourly_rate = EXCLUDED.hourly_rate
            "#,
        )
        .bind(teacher_id)
        .bind(hourly_rate)
        .execute(self.db.pool())
        .await
        .expect("Failed to seed teacher profile");
    }
}

/// Fresh opaque ID so tests sharing a database never collide.
pub fn unique_id(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4())
}

/// Parse a Decimal out of a JSON response field (serialized as a string).
pub fn decimal_field(value: &Value) -> Decimal {
    Decimal::from_str(value.as_str().expect("expected decimal string"))
        .expect("expected parseable decimal")
}

/// Create a pending transaction via the gateway and return its `data` object.
pub async fn create_test_transaction(app: &TestApp, student_id: &str, amount: i64) -> Value {
    let response = app
        .post_action(serde_json::json!({
            "action": "create_transaction",
            "student_id": student_id,
            "amount": amount,
        }))
        .await;
    assert_eq!(response.status(), 200, "create_transaction should succeed");
    let body: Value = response.json().await.expect("invalid JSON");
    body["data"].clone()
}
