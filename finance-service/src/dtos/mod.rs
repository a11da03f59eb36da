//! Gateway request payloads.
//!
//! One struct per ledger action; the gateway deserializes the action-specific
//! fields out of the request body after reading the `action` discriminator.

use crate::models::{SalaryItemType, TransactionStatus};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTransactionRequest {
    #[validate(length(min = 1, message = "student_id is required"))]
    pub student_id: String,
    pub batch_id: Option<String>,
    pub course_id: Option<String>,
    pub amount: Decimal,
    pub status: Option<TransactionStatus>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CompleteTransactionRequest {
    pub transaction_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct RefundTransactionRequest {
    pub transaction_id: Uuid,
    /// Partial refund amount; defaults to the original amount.
    pub amount: Option<Decimal>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct GenerateSalaryRequest {
    #[validate(length(min = 1, message = "teacher_id is required"))]
    pub teacher_id: String,
    pub month: i32,
    pub year: i32,
}

#[derive(Debug, Deserialize)]
pub struct SalaryItemPayload {
    pub description: String,
    pub item_type: SalaryItemType,
    pub amount: Decimal,
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateSalaryRequest {
    #[validate(length(min = 1, message = "teacher_id is required"))]
    pub teacher_id: String,
    pub month: i32,
    pub year: i32,
    #[serde(default)]
    pub sessions_count: i32,
    #[serde(default)]
    pub session_earnings: Decimal,
    pub total_amount: Decimal,
    pub notes: Option<String>,
    #[serde(default)]
    pub items: Vec<SalaryItemPayload>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PaySalaryRequest {
    pub salary_id: Uuid,
    #[validate(length(min = 1, message = "payment_method is required"))]
    pub payment_method: String,
    pub payment_reference: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AdjustmentRequest {
    pub salary_id: Uuid,
    pub amount: Decimal,
    #[validate(length(min = 1, message = "description is required"))]
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct InvoiceItemPayload {
    pub description: String,
    pub amount: Decimal,
    #[serde(default)]
    pub sort_order: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateInvoiceRequest {
    #[validate(length(min = 1, message = "teacher_id is required"))]
    pub teacher_id: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub subtotal: Decimal,
    #[serde(default)]
    pub custom_amount: Decimal,
    pub total_amount: Decimal,
    pub notes: Option<String>,
    #[serde(default)]
    pub items: Vec<InvoiceItemPayload>,
}

impl CreateInvoiceRequest {
    /// Totals arrive caller-computed; recompute and reject mismatches rather
    /// than storing numbers the item list contradicts.
    pub fn check_totals(&self) -> Result<(), service_core::error::AppError> {
        use service_core::error::AppError;

        if !self.items.is_empty() {
            let item_sum: Decimal = self.items.iter().map(|i| i.amount).sum();
            if item_sum != self.subtotal {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Subtotal {} does not match the sum of line items {}",
                    self.subtotal,
                    item_sum
                )));
            }
        }

        if self.total_amount != self.subtotal + self.custom_amount {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Total amount {} must equal subtotal {} plus custom amount {}",
                self.total_amount,
                self.subtotal,
                self.custom_amount
            )));
        }

        Ok(())
    }
}
