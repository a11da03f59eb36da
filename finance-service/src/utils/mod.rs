//! Document number generation.
//!
//! Receipt and invoice numbers are date-stamped with a 4-digit random suffix:
//! `REC-20240315-0482`, `INV-20240315-9917`. Uniqueness is enforced by the
//! database constraint, not here; a collision surfaces as a conflict and the
//! admin retries.

use chrono::Utc;
use rand::Rng;

const RECEIPT_PREFIX: &str = "REC";
const INVOICE_PREFIX: &str = "INV";

fn generate_number(prefix: &str) -> String {
    let date = Utc::now().format("%Y%m%d");
    let suffix: u16 = rand::thread_rng().gen_range(0..10000);
    format!("{prefix}-{date}-{suffix:04}")
}

/// Receipt number for a new transaction: `REC-<YYYYMMDD>-<4 digits>`.
pub fn generate_receipt_number() -> String {
    generate_number(RECEIPT_PREFIX)
}

/// Invoice number for a new invoice: `INV-<YYYYMMDD>-<4 digits>`.
pub fn generate_invoice_number() -> String {
    generate_number(INVOICE_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_number_shape(number: &str, prefix: &str) {
        let parts: Vec<&str> = number.split('-').collect();
        assert_eq!(parts.len(), 3, "expected PREFIX-DATE-SUFFIX in {number}");
        assert_eq!(parts[0], prefix);
        assert_eq!(parts[1].len(), 8);
        assert!(parts[1].chars().all(|c| c.is_ascii_digit()));
        assert_eq!(parts[2].len(), 4);
        assert!(parts[2].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn receipt_numbers_match_pattern() {
        assert_number_shape(&generate_receipt_number(), "REC");
    }

    #[test]
    fn invoice_numbers_match_pattern() {
        assert_number_shape(&generate_invoice_number(), "INV");
    }

    #[test]
    fn numbers_embed_todays_date() {
        let today = Utc::now().format("%Y%m%d").to_string();
        let number = generate_receipt_number();
        assert_eq!(number.split('-').nth(1), Some(today.as_str()));
    }
}
