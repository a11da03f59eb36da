//! Payroll derivations.
//!
//! Read-only calculations over platform data (completed sessions, teacher
//! rates). Nothing here writes; the salary ledger persists the results.

use crate::services::Database;
use chrono::{Months, NaiveDate};
use rust_decimal::Decimal;
use service_core::error::AppError;

/// Hourly rate used when a teacher profile has no rate configured.
pub const DEFAULT_HOURLY_RATE: u32 = 100;

/// Session-based earnings for one teacher-month.
#[derive(Debug, Clone)]
pub struct SessionEarnings {
    pub sessions_count: i32,
    pub hourly_rate: Decimal,
    pub session_earnings: Decimal,
    pub session_ids: Vec<String>,
}

/// Course revenue share for one teacher-month.
#[derive(Debug, Clone)]
pub struct CourseRevenue {
    pub revenue: Decimal,
}

/// Inclusive first/last day of a calendar month.
pub fn month_date_range(month: i32, year: i32) -> Result<(NaiveDate, NaiveDate), AppError> {
    if !(1..=12).contains(&month) {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Month must be between 1 and 12, got {}",
            month
        )));
    }
    let start = NaiveDate::from_ymd_opt(year, month as u32, 1).ok_or_else(|| {
        AppError::BadRequest(anyhow::anyhow!("Invalid month/year: {}/{}", month, year))
    })?;
    let end = start
        .checked_add_months(Months::new(1))
        .and_then(|d| d.pred_opt())
        .ok_or_else(|| {
            AppError::BadRequest(anyhow::anyhow!("Invalid month/year: {}/{}", month, year))
        })?;
    Ok((start, end))
}

/// Derive a teacher's session earnings for a month:
/// `sessions_count * hourly_rate` over completed sessions in range.
pub async fn compute_session_earnings(
    db: &Database,
    teacher_id: &str,
    month: i32,
    year: i32,
) -> Result<SessionEarnings, AppError> {
    let (start, end) = month_date_range(month, year)?;

    let hourly_rate = db
        .get_teacher_hourly_rate(teacher_id)
        .await?
        .unwrap_or_else(|| Decimal::from(DEFAULT_HOURLY_RATE));

    let session_ids = db
        .list_completed_sessions(teacher_id, start, end)
        .await?;

    let sessions_count = session_ids.len() as i32;
    let session_earnings = hourly_rate * Decimal::from(sessions_count);

    tracing::debug!(
        teacher_id = %teacher_id,
        month = month,
        year = year,
        sessions_count = sessions_count,
        %hourly_rate,
        %session_earnings,
        "Computed session earnings"
    );

    Ok(SessionEarnings {
        sessions_count,
        hourly_rate,
        session_earnings,
        session_ids,
    })
}

/// Course revenue share for a teacher-month.
///
/// Stub: the platform has no teacher->course enrollment join yet, and the
/// revenue-share formula is undecided, so this returns zero rather than a
/// guessed number. Wire the real derivation in once the enrollment data
/// lands.
pub async fn compute_course_revenue(
    _db: &Database,
    teacher_id: &str,
    month: i32,
    year: i32,
) -> Result<CourseRevenue, AppError> {
    let _ = month_date_range(month, year)?;

    tracing::debug!(
        teacher_id = %teacher_id,
        month = month,
        year = year,
        "Course revenue derivation not available; returning zero"
    );

    Ok(CourseRevenue {
        revenue: Decimal::ZERO,
    })
}
