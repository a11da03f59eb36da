//! Tuition transaction model.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Kind of financial event recorded against a student.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Payment,
    Refund,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Payment => "payment",
            TransactionType::Refund => "refund",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "refund" => TransactionType::Refund,
            _ => TransactionType::Payment,
        }
    }
}

/// Transaction lifecycle: `pending -> completed -> refunded`.
///
/// `refunded` is terminal; reaching it spawns a new completed refund
/// transaction rather than mutating history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Refunded,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Refunded => "refunded",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "completed" => TransactionStatus::Completed,
            "refunded" => TransactionStatus::Refunded,
            _ => TransactionStatus::Pending,
        }
    }
}

/// A recorded payment or refund event tied to a student.
///
/// Refund rows always reference the original receipt number in `notes`;
/// the original row is never deleted.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Transaction {
    pub transaction_id: Uuid,
    pub receipt_number: String,
    pub student_id: String,
    pub batch_id: Option<String>,
    pub course_id: Option<String>,
    pub amount: Decimal,
    pub transaction_type: String,
    pub status: String,
    pub notes: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_utc: DateTime<Utc>,
}

impl Transaction {
    pub fn parsed_type(&self) -> TransactionType {
        TransactionType::from_string(&self.transaction_type)
    }

    pub fn parsed_status(&self) -> TransactionStatus {
        TransactionStatus::from_string(&self.status)
    }
}

/// Input for recording a transaction.
#[derive(Debug, Clone)]
pub struct CreateTransaction {
    pub student_id: String,
    pub batch_id: Option<String>,
    pub course_id: Option<String>,
    pub amount: Decimal,
    /// Defaults to `pending`; admin entry of historical payments may
    /// override.
    pub status: Option<TransactionStatus>,
    pub notes: Option<String>,
}
