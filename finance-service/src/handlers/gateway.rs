//! Ledger gateway: the single admin-facing entry point.
//!
//! Requests carry an `action` discriminator plus action-specific fields; the
//! handler unpacks arguments, validates them, calls the matching ledger
//! operation, and shapes the `{data, warning?}` / `{error}` response. No
//! business logic lives here.

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use validator::Validate;

use crate::dtos::{
    AdjustmentRequest, CompleteTransactionRequest, CreateInvoiceRequest, CreateSalaryRequest,
    CreateTransactionRequest, GenerateSalaryRequest, PaySalaryRequest, RefundTransactionRequest,
};
use crate::middleware::AdminContext;
use crate::models::{
    AdjustmentKind, CreateInvoice, CreateInvoiceItem, CreateSalaryItem, CreateTransaction,
    Invoice, InvoiceItem, Salary, SalaryItem, SalaryStatus, TransactionStatus, UpsertSalary,
};
use crate::services::metrics::{ERRORS_TOTAL, GATEWAY_REQUESTS_TOTAL, GATEWAY_REQUEST_DURATION};
use crate::startup::AppState;
use service_core::error::AppError;

const ACTIONS: &[&str] = &[
    "create_transaction",
    "complete_transaction",
    "refund_transaction",
    "generate_salary",
    "create_salary",
    "pay_salary",
    "add_bonus",
    "add_deduction",
    "create_invoice",
];

/// Success envelope. `warning` flags a non-fatal secondary condition while
/// the primary record is still returned.
#[derive(Serialize)]
struct Envelope<T: Serialize> {
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<String>,
}

fn respond<T: Serialize>(data: T, warning: Option<String>) -> Response {
    Json(Envelope { data, warning }).into_response()
}

/// Salary record together with its item ledger.
#[derive(Serialize)]
struct SalaryWithItems {
    #[serde(flatten)]
    salary: Salary,
    items: Vec<SalaryItem>,
}

/// Salary record together with the adjustment item just applied.
#[derive(Serialize)]
struct AdjustedSalary {
    #[serde(flatten)]
    salary: Salary,
    item: SalaryItem,
}

/// Invoice record together with its line items.
#[derive(Serialize)]
struct InvoiceWithItems {
    #[serde(flatten)]
    invoice: Invoice,
    items: Vec<InvoiceItem>,
}

fn parse<T: DeserializeOwned>(body: Value) -> Result<T, AppError> {
    serde_json::from_value(body)
        .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Invalid payload: {}", e)))
}

/// `POST /api/ledger`: dispatch on the `action` field.
pub async fn ledger_gateway(
    State(state): State<AppState>,
    admin: AdminContext,
    Json(body): Json<Value>,
) -> Result<Response, AppError> {
    let action = body
        .get("action")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Invalid action")))?;

    // Unknown actions share one metric label to keep cardinality bounded.
    let metric_action = if ACTIONS.contains(&action.as_str()) {
        action.clone()
    } else {
        "invalid".to_string()
    };

    tracing::info!(
        action = %action,
        user_id = %admin.user_id,
        "Ledger action received"
    );

    let timer = GATEWAY_REQUEST_DURATION
        .with_label_values(&[metric_action.as_str()])
        .start_timer();

    let result = dispatch(&state, &action, body).await;

    timer.observe_duration();

    let outcome = if result.is_ok() { "ok" } else { "error" };
    GATEWAY_REQUESTS_TOTAL
        .with_label_values(&[metric_action.as_str(), outcome])
        .inc();

    if let Err(ref error) = result {
        ERRORS_TOTAL.with_label_values(&[error_label(error)]).inc();
    }

    result
}

fn error_label(error: &AppError) -> &'static str {
    match error {
        AppError::ValidationError(_) | AppError::BadRequest(_) => "validation_error",
        AppError::NotFound(_) => "not_found",
        AppError::Forbidden(_) => "forbidden",
        AppError::Conflict(_) => "conflict",
        AppError::DatabaseError(_) => "db_error",
        _ => "internal_error",
    }
}

async fn dispatch(state: &AppState, action: &str, body: Value) -> Result<Response, AppError> {
    match action {
        "create_transaction" => create_transaction(state, parse(body)?).await,
        "complete_transaction" => complete_transaction(state, parse(body)?).await,
        "refund_transaction" => refund_transaction(state, parse(body)?).await,
        "generate_salary" => generate_salary(state, parse(body)?).await,
        "create_salary" => create_salary(state, parse(body)?).await,
        "pay_salary" => pay_salary(state, parse(body)?).await,
        "add_bonus" => apply_adjustment(state, parse(body)?, AdjustmentKind::Bonus).await,
        "add_deduction" => apply_adjustment(state, parse(body)?, AdjustmentKind::Deduction).await,
        "create_invoice" => create_invoice(state, parse(body)?).await,
        _ => Err(AppError::BadRequest(anyhow::anyhow!("Invalid action"))),
    }
}

async fn create_transaction(
    state: &AppState,
    req: CreateTransactionRequest,
) -> Result<Response, AppError> {
    req.validate()?;

    let transaction = state
        .db
        .create_transaction(&CreateTransaction {
            student_id: req.student_id,
            batch_id: req.batch_id,
            course_id: req.course_id,
            amount: req.amount,
            status: req.status,
            notes: req.notes,
        })
        .await?;

    Ok(respond(transaction, None))
}

async fn complete_transaction(
    state: &AppState,
    req: CompleteTransactionRequest,
) -> Result<Response, AppError> {
    let (transaction, previous_status) = state.db.complete_transaction(req.transaction_id).await?;

    let warning = (previous_status == TransactionStatus::Completed)
        .then(|| "Transaction was already completed; paid_at was re-stamped".to_string());

    Ok(respond(transaction, warning))
}

async fn refund_transaction(
    state: &AppState,
    req: RefundTransactionRequest,
) -> Result<Response, AppError> {
    let (refund, already_existed) = state
        .db
        .refund_transaction(req.transaction_id, req.amount)
        .await?;

    let warning = already_existed
        .then(|| "A refund for this transaction was already recorded; returning it".to_string());

    Ok(respond(refund, warning))
}

async fn generate_salary(
    state: &AppState,
    req: GenerateSalaryRequest,
) -> Result<Response, AppError> {
    req.validate()?;

    let (salary, items) = state
        .db
        .generate_salary(&req.teacher_id, req.month, req.year)
        .await?;

    Ok(respond(SalaryWithItems { salary, items }, None))
}

async fn create_salary(state: &AppState, req: CreateSalaryRequest) -> Result<Response, AppError> {
    req.validate()?;

    let items: Vec<CreateSalaryItem> = req
        .items
        .iter()
        .map(|item| CreateSalaryItem {
            description: item.description.clone(),
            item_type: item.item_type,
            amount: item.amount,
            session_id: item.session_id.clone(),
        })
        .collect();

    let (salary, items) = state
        .db
        .create_or_update_salary(
            &UpsertSalary {
                teacher_id: req.teacher_id,
                month: req.month,
                year: req.year,
                sessions_count: req.sessions_count,
                session_earnings: req.session_earnings,
                total_amount: req.total_amount,
                notes: req.notes,
            },
            &items,
        )
        .await?;

    Ok(respond(SalaryWithItems { salary, items }, None))
}

async fn pay_salary(state: &AppState, req: PaySalaryRequest) -> Result<Response, AppError> {
    req.validate()?;

    let (salary, previous_status) = state
        .db
        .pay_salary(
            req.salary_id,
            &req.payment_method,
            req.payment_reference.as_deref(),
        )
        .await?;

    let warning = (previous_status == SalaryStatus::Paid)
        .then(|| "Salary was already marked paid; payment was re-stamped".to_string());

    Ok(respond(salary, warning))
}

async fn apply_adjustment(
    state: &AppState,
    req: AdjustmentRequest,
    kind: AdjustmentKind,
) -> Result<Response, AppError> {
    req.validate()?;

    let (salary, item) = state
        .db
        .apply_adjustment(req.salary_id, kind, req.amount, &req.description)
        .await?;

    Ok(respond(AdjustedSalary { salary, item }, None))
}

async fn create_invoice(
    state: &AppState,
    req: CreateInvoiceRequest,
) -> Result<Response, AppError> {
    req.validate()?;
    req.check_totals()?;

    let items: Vec<CreateInvoiceItem> = req
        .items
        .iter()
        .map(|item| CreateInvoiceItem {
            description: item.description.clone(),
            amount: item.amount,
            sort_order: item.sort_order,
        })
        .collect();

    let (invoice, items) = state
        .db
        .create_invoice(
            &CreateInvoice {
                teacher_id: req.teacher_id,
                period_start: req.period_start,
                period_end: req.period_end,
                subtotal: req.subtotal,
                custom_amount: req.custom_amount,
                total_amount: req.total_amount,
                notes: req.notes,
            },
            &items,
        )
        .await?;

    Ok(respond(InvoiceWithItems { invoice, items }, None))
}
