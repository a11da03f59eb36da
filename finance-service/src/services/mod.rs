//! Service layer for finance-service.

pub mod database;
pub mod metrics;
pub mod payroll;

pub use database::Database;
pub use metrics::{get_metrics, init_metrics};
