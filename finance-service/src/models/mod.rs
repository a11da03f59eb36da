//! Domain models for finance-service.

mod invoice;
mod salary;
mod transaction;

pub use invoice::{CreateInvoice, CreateInvoiceItem, Invoice, InvoiceItem, InvoiceStatus};
pub use salary::{
    AdjustmentKind, CreateSalaryItem, Salary, SalaryItem, SalaryItemType, SalaryStatus,
    UpsertSalary,
};
pub use transaction::{CreateTransaction, Transaction, TransactionStatus, TransactionType};
