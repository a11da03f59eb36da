//! Database service for finance-service.

use crate::models::{
    AdjustmentKind, CreateInvoice, CreateInvoiceItem, CreateSalaryItem, CreateTransaction,
    Invoice, InvoiceItem, Salary, SalaryItem, SalaryItemType, SalaryStatus, Transaction,
    TransactionStatus, TransactionType, UpsertSalary,
};
use crate::services::metrics::{DB_QUERY_DURATION, SALARIES_GENERATED_TOTAL, TRANSACTIONS_TOTAL};
use crate::services::payroll;
use crate::utils::{generate_invoice_number, generate_receipt_number};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

const TRANSACTION_COLUMNS: &str = "transaction_id, receipt_number, student_id, batch_id, \
     course_id, amount, transaction_type, status, notes, paid_at, created_utc";

const SALARY_COLUMNS: &str = "salary_id, teacher_id, month, year, sessions_count, \
     session_earnings, total_amount, bonus, deductions, status, paid_at, payment_method, \
     payment_reference, notes, created_utc";

const SALARY_ITEM_COLUMNS: &str =
    "item_id, salary_id, description, item_type, amount, session_id, created_utc";

const INVOICE_COLUMNS: &str = "invoice_id, invoice_number, teacher_id, period_start, \
     period_end, subtotal, custom_amount, total_amount, notes, status, created_utc";

const INVOICE_ITEM_COLUMNS: &str =
    "item_id, invoice_id, description, amount, sort_order, created_utc";

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "finance-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Transaction Ledger
    // -------------------------------------------------------------------------

    /// Record a tuition transaction with a freshly generated receipt number.
    /// Status defaults to `pending` unless the caller overrides.
    #[instrument(skip(self, input), fields(student_id = %input.student_id))]
    pub async fn create_transaction(
        &self,
        input: &CreateTransaction,
    ) -> Result<Transaction, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_transaction"])
            .start_timer();

        if input.amount <= Decimal::ZERO {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Transaction amount must be positive"
            )));
        }

        let status = input.status.unwrap_or(TransactionStatus::Pending);
        let receipt_number = generate_receipt_number();
        let transaction_id = Uuid::new_v4();

        let transaction = sqlx::query_as::<_, Transaction>(&format!(
            r#"
            INSERT INTO transactions (transaction_id, receipt_number, student_id, batch_id, course_id, amount, transaction_type, status, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {TRANSACTION_COLUMNS}
            "#,
        ))
        .bind(transaction_id)
        .bind(&receipt_number)
        .bind(&input.student_id)
        .bind(&input.batch_id)
        .bind(&input.course_id)
        .bind(input.amount)
        .bind(TransactionType::Payment.as_str())
        .bind(status.as_str())
        .bind(&input.notes)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!(
                    "Receipt number '{}' already exists; retry the request",
                    receipt_number
                ))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create transaction: {}", e)),
        })?;

        timer.observe_duration();

        TRANSACTIONS_TOTAL.with_label_values(&["payment"]).inc();

        info!(
            transaction_id = %transaction.transaction_id,
            receipt_number = %transaction.receipt_number,
            amount = %transaction.amount,
            "Transaction recorded"
        );

        Ok(transaction)
    }

    /// Get a transaction by ID.
    #[instrument(skip(self), fields(transaction_id = %transaction_id))]
    pub async fn get_transaction(
        &self,
        transaction_id: Uuid,
    ) -> Result<Option<Transaction>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_transaction"])
            .start_timer();

        let transaction = sqlx::query_as::<_, Transaction>(&format!(
            r#"
            SELECT {TRANSACTION_COLUMNS}
            FROM transactions
            WHERE transaction_id = $1
            "#,
        ))
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get transaction: {}", e)))?;

        timer.observe_duration();

        Ok(transaction)
    }

    /// Mark a transaction completed and stamp `paid_at`.
    ///
    /// Returns the updated row plus the status it held before, so callers can
    /// surface a warning when a completed transaction gets re-stamped.
    #[instrument(skip(self), fields(transaction_id = %transaction_id))]
    pub async fn complete_transaction(
        &self,
        transaction_id: Uuid,
    ) -> Result<(Transaction, TransactionStatus), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["complete_transaction"])
            .start_timer();

        let existing = self
            .get_transaction(transaction_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Transaction not found")))?;
        let previous_status = existing.parsed_status();

        // No transition leaves `refunded`.
        if previous_status == TransactionStatus::Refunded {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Refunded transactions cannot be completed"
            )));
        }

        let transaction = sqlx::query_as::<_, Transaction>(&format!(
            r#"
            UPDATE transactions
            SET status = $2, paid_at = now()
            WHERE transaction_id = $1
            RETURNING {TRANSACTION_COLUMNS}
            "#,
        ))
        .bind(transaction_id)
        .bind(TransactionStatus::Completed.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to complete transaction: {}", e))
        })?;

        timer.observe_duration();

        info!(
            transaction_id = %transaction.transaction_id,
            receipt_number = %transaction.receipt_number,
            "Transaction completed"
        );

        Ok((transaction, previous_status))
    }

    /// Refund a completed transaction.
    ///
    /// Creates one refund transaction referencing the original receipt number
    /// and flips the original to `refunded`, both inside a single database
    /// transaction. A retried call finds the existing refund and returns it
    /// instead of duplicating it; the boolean is true when that happened.
    #[instrument(skip(self), fields(transaction_id = %transaction_id))]
    pub async fn refund_transaction(
        &self,
        transaction_id: Uuid,
        amount: Option<Decimal>,
    ) -> Result<(Transaction, bool), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["refund_transaction"])
            .start_timer();

        let original = self
            .get_transaction(transaction_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Transaction not found")))?;

        if original.parsed_type() == TransactionType::Refund {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Refund transactions cannot be refunded"
            )));
        }

        let refund_notes = format!("Refund for receipt {}", original.receipt_number);

        match original.parsed_status() {
            TransactionStatus::Refunded => {
                // Retried refund: hand back the refund already on record.
                if let Some(existing) = self.find_refund_by_notes(&refund_notes).await? {
                    timer.observe_duration();
                    return Ok((existing, true));
                }
                return Err(AppError::Conflict(anyhow::anyhow!(
                    "Transaction {} is already refunded",
                    original.receipt_number
                )));
            }
            TransactionStatus::Pending => {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Only completed transactions can be refunded"
                )));
            }
            TransactionStatus::Completed => {}
        }

        let refund_amount = amount.unwrap_or(original.amount);
        if refund_amount <= Decimal::ZERO {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Refund amount must be positive"
            )));
        }
        if refund_amount > original.amount {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Refund amount {} exceeds original amount {}",
                refund_amount,
                original.amount
            )));
        }

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        // A previous attempt may have inserted the refund and died before
        // flipping the original; finish that work instead of duplicating it.
        let prior = sqlx::query_as::<_, Transaction>(&format!(
            r#"
            SELECT {TRANSACTION_COLUMNS}
            FROM transactions
            WHERE transaction_type = $1 AND notes = $2
            ORDER BY created_utc DESC
            LIMIT 1
            "#,
        ))
        .bind(TransactionType::Refund.as_str())
        .bind(&refund_notes)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to check existing refund: {}", e))
        })?;

        if let Some(existing) = prior {
            self.mark_refunded(&mut tx, transaction_id).await?;
            tx.commit().await.map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to commit refund: {}", e))
            })?;
            timer.observe_duration();
            return Ok((existing, true));
        }

        let refund = sqlx::query_as::<_, Transaction>(&format!(
            r#"
            INSERT INTO transactions (transaction_id, receipt_number, student_id, batch_id, course_id, amount, transaction_type, status, notes, paid_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, now())
            RETURNING {TRANSACTION_COLUMNS}
            "#,
        ))
        .bind(Uuid::new_v4())
        .bind(generate_receipt_number())
        .bind(&original.student_id)
        .bind(&original.batch_id)
        .bind(&original.course_id)
        .bind(refund_amount)
        .bind(TransactionType::Refund.as_str())
        .bind(TransactionStatus::Completed.as_str())
        .bind(&refund_notes)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!(
                    "Receipt number collision while creating refund; retry the request"
                ))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create refund: {}", e)),
        })?;

        self.mark_refunded(&mut tx, transaction_id).await?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit refund: {}", e))
        })?;

        timer.observe_duration();

        TRANSACTIONS_TOTAL.with_label_values(&["refund"]).inc();

        info!(
            refund_id = %refund.transaction_id,
            original_receipt = %original.receipt_number,
            amount = %refund.amount,
            "Refund recorded"
        );

        Ok((refund, false))
    }

    async fn mark_refunded(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        transaction_id: Uuid,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE transactions SET status = $2 WHERE transaction_id = $1")
            .bind(transaction_id)
            .bind(TransactionStatus::Refunded.as_str())
            .execute(&mut **tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to mark refunded: {}", e))
            })?;
        Ok(())
    }

    async fn find_refund_by_notes(&self, notes: &str) -> Result<Option<Transaction>, AppError> {
        let refund = sqlx::query_as::<_, Transaction>(&format!(
            r#"
            SELECT {TRANSACTION_COLUMNS}
            FROM transactions
            WHERE transaction_type = $1 AND notes = $2
            ORDER BY created_utc DESC
            LIMIT 1
            "#,
        ))
        .bind(TransactionType::Refund.as_str())
        .bind(notes)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to find refund: {}", e)))?;
        Ok(refund)
    }

    // -------------------------------------------------------------------------
    // Payroll reads (platform data)
    // -------------------------------------------------------------------------

    /// Hourly rate from the teacher profile, if configured.
    #[instrument(skip(self), fields(teacher_id = %teacher_id))]
    pub async fn get_teacher_hourly_rate(
        &self,
        teacher_id: &str,
    ) -> Result<Option<Decimal>, AppError> {
        let rate: Option<Option<Decimal>> = sqlx::query_scalar(
            "SELECT hourly_rate FROM teacher_profiles WHERE teacher_id = $1",
        )
        .bind(teacher_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to get teacher rate: {}", e))
        })?;

        Ok(rate.flatten())
    }

    /// IDs of a teacher's completed sessions within an inclusive date range.
    #[instrument(skip(self), fields(teacher_id = %teacher_id))]
    pub async fn list_completed_sessions(
        &self,
        teacher_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<String>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_completed_sessions"])
            .start_timer();

        let session_ids: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT session_id
            FROM sessions
            WHERE teacher_id = $1
              AND status = 'completed'
              AND session_date >= $2
              AND session_date <= $3
            ORDER BY session_date, session_id
            "#,
        )
        .bind(teacher_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list sessions: {}", e)))?;

        timer.observe_duration();

        Ok(session_ids)
    }

    // -------------------------------------------------------------------------
    // Salary Ledger
    // -------------------------------------------------------------------------

    /// Derive and persist a teacher's salary for one month.
    ///
    /// Upserts the salary row keyed on (teacher, month, year) and replaces
    /// the derived `session`/`course_revenue` items, all in one database
    /// transaction. Manual bonus/deduction items and their running aggregates
    /// survive regeneration; repeated runs converge to the same item set.
    #[instrument(skip(self), fields(teacher_id = %teacher_id, month = month, year = year))]
    pub async fn generate_salary(
        &self,
        teacher_id: &str,
        month: i32,
        year: i32,
    ) -> Result<(Salary, Vec<SalaryItem>), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["generate_salary"])
            .start_timer();

        let earnings = payroll::compute_session_earnings(self, teacher_id, month, year).await?;
        let revenue = payroll::compute_course_revenue(self, teacher_id, month, year).await?;
        let derived_total = earnings.session_earnings + revenue.revenue;

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let salary = sqlx::query_as::<_, Salary>(&format!(
            r#"
            INSERT INTO salaries (salary_id, teacher_id, month, year, sessions_count, session_earnings, total_amount, bonus, deductions, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 0, 0, $8)
            ON CONFLICT (teacher_id, month, year) DO UPDATE
            SET sessions_count = EXCLUDED.sessions_count,
                session_earnings = EXCLUDED.session_earnings,
                total_amount = EXCLUDED.total_amount + salaries.bonus - salaries.deductions
            RETURNING {SALARY_COLUMNS}
            "#,
        ))
        .bind(Uuid::new_v4())
        .bind(teacher_id)
        .bind(month)
        .bind(year)
        .bind(earnings.sessions_count)
        .bind(earnings.session_earnings)
        .bind(derived_total)
        .bind(SalaryStatus::Pending.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to upsert salary: {}", e)))?;

        self.replace_derived_items(&mut tx, salary.salary_id, |salary_id| {
            let mut items = Vec::with_capacity(earnings.session_ids.len() + 1);
            for session_id in &earnings.session_ids {
                items.push(NewItemRow {
                    salary_id,
                    description: format!("Session {}", session_id),
                    item_type: SalaryItemType::Session,
                    amount: earnings.hourly_rate,
                    session_id: Some(session_id.clone()),
                });
            }
            if revenue.revenue > Decimal::ZERO {
                items.push(NewItemRow {
                    salary_id,
                    description: "Course revenue share".to_string(),
                    item_type: SalaryItemType::CourseRevenue,
                    amount: revenue.revenue,
                    session_id: None,
                });
            }
            items
        })
        .await?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit salary generation: {}", e))
        })?;

        let items = self.list_salary_items(salary.salary_id).await?;

        timer.observe_duration();

        SALARIES_GENERATED_TOTAL
            .with_label_values(&["derived"])
            .inc();

        info!(
            salary_id = %salary.salary_id,
            sessions_count = earnings.sessions_count,
            session_earnings = %earnings.session_earnings,
            total_amount = %salary.total_amount,
            "Salary generated"
        );

        Ok((salary, items))
    }

    /// Manual salary entry: upsert caller-supplied aggregates and replace the
    /// derived items with the supplied list. Same idempotent replace
    /// semantics as [`generate_salary`], but nothing is derived here.
    #[instrument(skip(self, input, items), fields(teacher_id = %input.teacher_id))]
    pub async fn create_or_update_salary(
        &self,
        input: &UpsertSalary,
        items: &[CreateSalaryItem],
    ) -> Result<(Salary, Vec<SalaryItem>), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_or_update_salary"])
            .start_timer();

        if !(1..=12).contains(&input.month) {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Month must be between 1 and 12, got {}",
                input.month
            )));
        }

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let salary = sqlx::query_as::<_, Salary>(&format!(
            r#"
            INSERT INTO salaries (salary_id, teacher_id, month, year, sessions_count, session_earnings, total_amount, bonus, deductions, status, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 0, 0, $8, $9)
            ON CONFLICT (teacher_id, month, year) DO UPDATE
            SET sessions_count = EXCLUDED.sessions_count,
                session_earnings = EXCLUDED.session_earnings,
                total_amount = EXCLUDED.total_amount,
                notes = EXCLUDED.notes
            RETURNING {SALARY_COLUMNS}
            "#,
        ))
        .bind(Uuid::new_v4())
        .bind(&input.teacher_id)
        .bind(input.month)
        .bind(input.year)
        .bind(input.sessions_count)
        .bind(input.session_earnings)
        .bind(input.total_amount)
        .bind(SalaryStatus::Pending.as_str())
        .bind(&input.notes)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to upsert salary: {}", e)))?;

        self.replace_derived_items(&mut tx, salary.salary_id, |salary_id| {
            items
                .iter()
                .map(|item| NewItemRow {
                    salary_id,
                    description: item.description.clone(),
                    item_type: item.item_type,
                    amount: item.amount,
                    session_id: item.session_id.clone(),
                })
                .collect()
        })
        .await?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit salary upsert: {}", e))
        })?;

        let stored_items = self.list_salary_items(salary.salary_id).await?;

        timer.observe_duration();

        SALARIES_GENERATED_TOTAL
            .with_label_values(&["manual"])
            .inc();

        Ok((salary, stored_items))
    }

    /// Apply a bonus or deduction to a salary.
    ///
    /// The item insert and the aggregate update run in one database
    /// transaction, and the aggregates move by in-place increments, so
    /// concurrent adjustments serialize on the salary row instead of losing
    /// updates.
    #[instrument(skip(self, description), fields(salary_id = %salary_id, kind = ?kind))]
    pub async fn apply_adjustment(
        &self,
        salary_id: Uuid,
        kind: AdjustmentKind,
        amount: Decimal,
        description: &str,
    ) -> Result<(Salary, SalaryItem), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["apply_adjustment"])
            .start_timer();

        if amount <= Decimal::ZERO {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Adjustment amount must be positive"
            )));
        }

        let signed_amount = kind.signed_amount(amount);
        let (bonus_delta, deduction_delta) = match kind {
            AdjustmentKind::Bonus => (amount, Decimal::ZERO),
            AdjustmentKind::Deduction => (Decimal::ZERO, amount),
        };

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        // Locks the salary row for the rest of the transaction.
        let salary = sqlx::query_as::<_, Salary>(&format!(
            r#"
            UPDATE salaries
            SET total_amount = total_amount + $2,
                bonus = bonus + $3,
                deductions = deductions + $4
            WHERE salary_id = $1
            RETURNING {SALARY_COLUMNS}
            "#,
        ))
        .bind(salary_id)
        .bind(signed_amount)
        .bind(bonus_delta)
        .bind(deduction_delta)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update salary: {}", e)))?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Salary not found")))?;

        let item = sqlx::query_as::<_, SalaryItem>(&format!(
            r#"
            INSERT INTO salary_items (item_id, salary_id, description, item_type, amount)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {SALARY_ITEM_COLUMNS}
            "#,
        ))
        .bind(Uuid::new_v4())
        .bind(salary_id)
        .bind(description)
        .bind(kind.item_type().as_str())
        .bind(signed_amount)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to insert adjustment: {}", e))
        })?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit adjustment: {}", e))
        })?;

        timer.observe_duration();

        info!(
            salary_id = %salary_id,
            item_id = %item.item_id,
            amount = %signed_amount,
            total_amount = %salary.total_amount,
            "Adjustment applied"
        );

        Ok((salary, item))
    }

    /// Mark a salary paid and record how.
    ///
    /// Returns the updated row plus the status it held before; re-paying is
    /// allowed and re-stamps `paid_at`.
    #[instrument(skip(self), fields(salary_id = %salary_id))]
    pub async fn pay_salary(
        &self,
        salary_id: Uuid,
        payment_method: &str,
        payment_reference: Option<&str>,
    ) -> Result<(Salary, SalaryStatus), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["pay_salary"])
            .start_timer();

        let existing = self
            .get_salary(salary_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Salary not found")))?;
        let previous_status = existing.parsed_status();

        let salary = sqlx::query_as::<_, Salary>(&format!(
            r#"
            UPDATE salaries
            SET status = $2, paid_at = now(), payment_method = $3, payment_reference = $4
            WHERE salary_id = $1
            RETURNING {SALARY_COLUMNS}
            "#,
        ))
        .bind(salary_id)
        .bind(SalaryStatus::Paid.as_str())
        .bind(payment_method)
        .bind(payment_reference)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to pay salary: {}", e)))?;

        timer.observe_duration();

        info!(
            salary_id = %salary.salary_id,
            payment_method = %payment_method,
            "Salary paid"
        );

        Ok((salary, previous_status))
    }

    /// Get a salary by ID.
    #[instrument(skip(self), fields(salary_id = %salary_id))]
    pub async fn get_salary(&self, salary_id: Uuid) -> Result<Option<Salary>, AppError> {
        let salary = sqlx::query_as::<_, Salary>(&format!(
            r#"
            SELECT {SALARY_COLUMNS}
            FROM salaries
            WHERE salary_id = $1
            "#,
        ))
        .bind(salary_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get salary: {}", e)))?;

        Ok(salary)
    }

    /// All line items for a salary, oldest first.
    #[instrument(skip(self), fields(salary_id = %salary_id))]
    pub async fn list_salary_items(&self, salary_id: Uuid) -> Result<Vec<SalaryItem>, AppError> {
        let items = sqlx::query_as::<_, SalaryItem>(&format!(
            r#"
            SELECT {SALARY_ITEM_COLUMNS}
            FROM salary_items
            WHERE salary_id = $1
            ORDER BY created_utc, item_id
            "#,
        ))
        .bind(salary_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list salary items: {}", e))
        })?;

        Ok(items)
    }

    /// Delete the derived (session/course_revenue) items for a salary and
    /// insert the replacement rows. Runs inside the caller's transaction so
    /// regeneration never exposes a zero-item window.
    async fn replace_derived_items<F>(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        salary_id: Uuid,
        build_rows: F,
    ) -> Result<(), AppError>
    where
        F: FnOnce(Uuid) -> Vec<NewItemRow>,
    {
        sqlx::query(
            "DELETE FROM salary_items WHERE salary_id = $1 AND item_type = ANY($2)",
        )
        .bind(salary_id)
        .bind(vec![
            SalaryItemType::Session.as_str(),
            SalaryItemType::CourseRevenue.as_str(),
        ])
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to clear derived items: {}", e))
        })?;

        for row in build_rows(salary_id) {
            sqlx::query(
                r#"
                INSERT INTO salary_items (item_id, salary_id, description, item_type, amount, session_id)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(row.salary_id)
            .bind(&row.description)
            .bind(row.item_type.as_str())
            .bind(row.amount)
            .bind(&row.session_id)
            .execute(&mut **tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to insert salary item: {}", e))
            })?;
        }

        Ok(())
    }

    // -------------------------------------------------------------------------
    // Invoice Generator
    // -------------------------------------------------------------------------

    /// Create an invoice with a generated number and its full item list, in
    /// one database transaction.
    #[instrument(skip(self, input, items), fields(teacher_id = %input.teacher_id, item_count = items.len()))]
    pub async fn create_invoice(
        &self,
        input: &CreateInvoice,
        items: &[CreateInvoiceItem],
    ) -> Result<(Invoice, Vec<InvoiceItem>), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_invoice"])
            .start_timer();

        if input.period_end < input.period_start {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Invoice period end predates period start"
            )));
        }

        let invoice_number = generate_invoice_number();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            INSERT INTO invoices (invoice_id, invoice_number, teacher_id, period_start, period_end, subtotal, custom_amount, total_amount, notes, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {INVOICE_COLUMNS}
            "#,
        ))
        .bind(Uuid::new_v4())
        .bind(&invoice_number)
        .bind(&input.teacher_id)
        .bind(input.period_start)
        .bind(input.period_end)
        .bind(input.subtotal)
        .bind(input.custom_amount)
        .bind(input.total_amount)
        .bind(&input.notes)
        .bind("pending")
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!(
                    "Invoice number '{}' already exists; retry the request",
                    invoice_number
                ))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create invoice: {}", e)),
        })?;

        let mut stored_items = Vec::with_capacity(items.len());
        for item in items {
            let stored = sqlx::query_as::<_, InvoiceItem>(&format!(
                r#"
                INSERT INTO invoice_items (item_id, invoice_id, description, amount, sort_order)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING {INVOICE_ITEM_COLUMNS}
                "#,
            ))
            .bind(Uuid::new_v4())
            .bind(invoice.invoice_id)
            .bind(&item.description)
            .bind(item.amount)
            .bind(item.sort_order)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to insert invoice item: {}", e))
            })?;
            stored_items.push(stored);
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit invoice: {}", e))
        })?;

        timer.observe_duration();

        info!(
            invoice_id = %invoice.invoice_id,
            invoice_number = %invoice.invoice_number,
            total_amount = %invoice.total_amount,
            "Invoice created"
        );

        Ok((invoice, stored_items))
    }
}

/// Replacement row for the derived portion of a salary's item ledger.
struct NewItemRow {
    salary_id: Uuid,
    description: String,
    item_type: SalaryItemType,
    amount: Decimal,
    session_id: Option<String>,
}
