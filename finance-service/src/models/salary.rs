//! Teacher salary models.
//!
//! One `Salary` row per (teacher, month, year). Line items carry signed
//! contributions: a deduction's stored amount is negative even though the
//! admin enters a positive magnitude.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Salary lifecycle: `pending -> paid`. Re-paying is allowed and re-stamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SalaryStatus {
    Pending,
    Paid,
}

impl SalaryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SalaryStatus::Pending => "pending",
            SalaryStatus::Paid => "paid",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "paid" => SalaryStatus::Paid,
            _ => SalaryStatus::Pending,
        }
    }
}

/// Kind of contribution a line item makes to a salary total.
///
/// `session` and `course_revenue` items are derived facts, replaced wholesale
/// on regeneration. `bonus` and `deduction` items are additive admin events
/// that regeneration never touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SalaryItemType {
    Session,
    CourseRevenue,
    Bonus,
    Deduction,
}

impl SalaryItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SalaryItemType::Session => "session",
            SalaryItemType::CourseRevenue => "course_revenue",
            SalaryItemType::Bonus => "bonus",
            SalaryItemType::Deduction => "deduction",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "course_revenue" => SalaryItemType::CourseRevenue,
            "bonus" => SalaryItemType::Bonus,
            "deduction" => SalaryItemType::Deduction,
            _ => SalaryItemType::Session,
        }
    }

    /// Whether regeneration owns items of this type.
    pub fn is_derived(&self) -> bool {
        matches!(self, SalaryItemType::Session | SalaryItemType::CourseRevenue)
    }
}

/// Manual adjustment applied to a salary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentKind {
    Bonus,
    Deduction,
}

impl AdjustmentKind {
    pub fn item_type(&self) -> SalaryItemType {
        match self {
            AdjustmentKind::Bonus => SalaryItemType::Bonus,
            AdjustmentKind::Deduction => SalaryItemType::Deduction,
        }
    }

    /// Signed contribution to the total for a positive magnitude.
    pub fn signed_amount(&self, magnitude: Decimal) -> Decimal {
        match self {
            AdjustmentKind::Bonus => magnitude,
            AdjustmentKind::Deduction => -magnitude,
        }
    }
}

/// A teacher's aggregate payroll record for one calendar month.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Salary {
    pub salary_id: Uuid,
    pub teacher_id: String,
    pub month: i32,
    pub year: i32,
    pub sessions_count: i32,
    pub session_earnings: Decimal,
    pub total_amount: Decimal,
    /// Cumulative bonus magnitude applied so far.
    pub bonus: Decimal,
    /// Cumulative deduction magnitude applied so far.
    pub deductions: Decimal,
    pub status: String,
    pub paid_at: Option<DateTime<Utc>>,
    pub payment_method: Option<String>,
    pub payment_reference: Option<String>,
    pub notes: Option<String>,
    pub created_utc: DateTime<Utc>,
}

impl Salary {
    pub fn parsed_status(&self) -> SalaryStatus {
        SalaryStatus::from_string(&self.status)
    }
}

/// One itemized contribution to a salary's total.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SalaryItem {
    pub item_id: Uuid,
    pub salary_id: Uuid,
    pub description: String,
    pub item_type: String,
    /// Signed: bonuses positive, deductions negative.
    pub amount: Decimal,
    pub session_id: Option<String>,
    pub created_utc: DateTime<Utc>,
}

impl SalaryItem {
    pub fn parsed_type(&self) -> SalaryItemType {
        SalaryItemType::from_string(&self.item_type)
    }
}

/// Caller-supplied aggregate figures for manual salary entry.
#[derive(Debug, Clone)]
pub struct UpsertSalary {
    pub teacher_id: String,
    pub month: i32,
    pub year: i32,
    pub sessions_count: i32,
    pub session_earnings: Decimal,
    pub total_amount: Decimal,
    pub notes: Option<String>,
}

/// Input for one salary line item.
#[derive(Debug, Clone)]
pub struct CreateSalaryItem {
    pub description: String,
    pub item_type: SalaryItemType,
    pub amount: Decimal,
    pub session_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bonus_signs_positive_deduction_negative() {
        assert_eq!(
            AdjustmentKind::Bonus.signed_amount(Decimal::from(50)),
            Decimal::from(50)
        );
        assert_eq!(
            AdjustmentKind::Deduction.signed_amount(Decimal::from(20)),
            Decimal::from(-20)
        );
    }

    #[test]
    fn derived_types_exclude_manual_adjustments() {
        assert!(SalaryItemType::Session.is_derived());
        assert!(SalaryItemType::CourseRevenue.is_derived());
        assert!(!SalaryItemType::Bonus.is_derived());
        assert!(!SalaryItemType::Deduction.is_derived());
    }

    #[test]
    fn item_type_strings_round_trip() {
        for t in [
            SalaryItemType::Session,
            SalaryItemType::CourseRevenue,
            SalaryItemType::Bonus,
            SalaryItemType::Deduction,
        ] {
            assert_eq!(SalaryItemType::from_string(t.as_str()), t);
        }
    }
}
